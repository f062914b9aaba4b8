/// Implements process-wide `tracing` setup with console and rotating file output.
pub mod loggerlocal;

pub use loggerlocal::{rotate_logs, LoggerError, LoggerLocal, LoggerLocalOptions};
