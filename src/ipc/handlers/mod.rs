pub mod attendance;
pub mod auth;
pub mod backup_exchange;
pub mod cloud;
pub mod core;
pub mod fichas;
pub mod grades;
pub mod sessions;
pub mod settings;
pub mod students;
