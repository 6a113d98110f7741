pub mod chat;
pub mod config;
pub mod config_env;
pub mod llm;
pub mod models;
pub mod store;
