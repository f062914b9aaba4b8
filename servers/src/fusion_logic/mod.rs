pub mod config;
pub mod shutdown;
