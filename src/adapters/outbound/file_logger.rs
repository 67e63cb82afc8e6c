use crate::config::LoggingConfig;
use crate::domains::logger::{DomainLogger, DynLogger, FileLogger};
use std::sync::Arc;

use super::console_logger::init_console_logger;

/// Initialise fast_log for `path` and return the logger that writes through it.
pub fn init_file_logger(path: &str) -> Result<DynLogger, String> {
    FileLogger::init(path).map_err(|e| format!("Failed to initialize fast_log: {}", e))?;
    Ok(Arc::new(FileLogger))
}

/// Sends every message to each of its sinks in order.
pub struct FanoutLogger {
    sinks: Vec<DynLogger>,
}

impl FanoutLogger {
    pub fn new(sinks: Vec<DynLogger>) -> Self {
        Self { sinks }
    }
}

impl DomainLogger for FanoutLogger {
    fn info(&self, msg: &str) {
        self.sinks.iter().for_each(|s| s.info(msg));
    }

    fn warn(&self, msg: &str) {
        self.sinks.iter().for_each(|s| s.warn(msg));
    }

    fn error(&self, msg: &str) {
        self.sinks.iter().for_each(|s| s.error(msg));
    }
}

/// File plus console; console alone when the file logger cannot be set up.
pub fn init_combined_logger(path: &str) -> DynLogger {
    let console = init_console_logger();
    match init_file_logger(path) {
        Ok(file) => Arc::new(FanoutLogger::new(vec![file, console])),
        Err(e) => {
            console.warn(&format!("{}; logging to console only", e));
            console
        }
    }
}

/// Logger described by the `[logging]` section.
pub fn init_logger(config: &LoggingConfig) -> DynLogger {
    match &config.file {
        Some(path) => init_combined_logger(path),
        None => init_console_logger(),
    }
}
