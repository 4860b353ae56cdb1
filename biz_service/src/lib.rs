pub mod biz_service;
pub mod entitys;
