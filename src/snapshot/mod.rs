pub mod backup_config;
pub mod cloud;
pub mod command;
pub mod engine;
pub mod freezer;
pub mod notifications;
pub mod redacted;
pub mod result_error;
pub mod retention;
pub mod tier;
pub mod topology;
pub mod volume;
