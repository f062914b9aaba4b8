pub mod config;
pub mod path;
pub mod upstream;
