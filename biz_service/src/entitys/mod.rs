pub mod user_profile_entity;
