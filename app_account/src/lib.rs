pub mod protocol;
pub mod result;
pub mod service;
