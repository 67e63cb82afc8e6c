use chrono::Utc;
use log::{error as log_error, info as log_info, warn as log_warn};
use std::sync::Arc;

/// Logging port handed to the planner, its worker and the caller facade.
/// Infallible from the planner's point of view.
pub trait DomainLogger: Send + Sync + 'static {
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

pub type DynLogger = Arc<dyn DomainLogger>;

/// File adapter backed by `fast_log`; records go through the `log` facade.
pub struct FileLogger;

impl FileLogger {
    /// Initialise fast_log with a file appender at `path`.
    pub fn init(path: &str) -> Result<(), Box<dyn std::error::Error>> {
        fast_log::init(
            fast_log::config::Config::new()
                .file(path)
                .level(log::LevelFilter::Info),
        )?;
        Ok(())
    }
}

impl DomainLogger for FileLogger {
    fn info(&self, msg: &str) {
        log_info!("{} - {}", Utc::now().to_rfc3339(), msg);
    }

    fn warn(&self, msg: &str) {
        log_warn!("{} - {}", Utc::now().to_rfc3339(), msg);
    }

    fn error(&self, msg: &str) {
        log_error!("{} - {}", Utc::now().to_rfc3339(), msg);
    }
}

/// Prefixes every message with a component tag, e.g. `[planner-worker] map rebuilt`.
struct ScopedLogger {
    scope: String,
    inner: DynLogger,
}

impl DomainLogger for ScopedLogger {
    fn info(&self, msg: &str) {
        self.inner.info(&format!("[{}] {}", self.scope, msg));
    }

    fn warn(&self, msg: &str) {
        self.inner.warn(&format!("[{}] {}", self.scope, msg));
    }

    fn error(&self, msg: &str) {
        self.inner.error(&format!("[{}] {}", self.scope, msg));
    }
}

pub fn scoped(logger: DynLogger, scope: &str) -> DynLogger {
    Arc::new(ScopedLogger {
        scope: scope.to_string(),
        inner: logger,
    })
}
