use crate::domains::logger::{DomainLogger, DynLogger};
use std::sync::Arc;

/// Forwards to `tracing`, so planner messages land in whatever subscriber the binary set up.
struct TracingBridge;

impl DomainLogger for TracingBridge {
    fn info(&self, msg: &str) {
        tracing::info!(target: "planner", "{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!(target: "planner", "{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!(target: "planner", "{}", msg);
    }
}

pub fn init_console_logger() -> DynLogger {
    Arc::new(TracingBridge)
}

struct NoOp;

impl DomainLogger for NoOp {
    fn info(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}

/// Discards everything; the default in tests.
pub fn init_noop_logger() -> DynLogger {
    Arc::new(NoOp)
}
