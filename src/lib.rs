pub mod client;
pub mod config;
pub mod input;
pub mod reporter;
pub mod store;
pub mod types;
