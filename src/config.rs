use crate::command::DEFAULT_ID_BASE;
use crate::logging::{LogFormat, LoggingConfig};
use tracing::warn;

pub const DEFAULT_TASK_QUEUE: &str = "default";
pub const DEFAULT_MAX_BATCH: usize = 256;

pub const ENV_TASK_QUEUE: &str = "DURABLE_WORKER_TASK_QUEUE";
pub const ENV_ID_BASE: &str = "DURABLE_WORKER_ID_BASE";
pub const ENV_MAX_BATCH: &str = "DURABLE_WORKER_MAX_BATCH";
pub const ENV_LOG_LEVEL: &str = "DURABLE_WORKER_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "DURABLE_WORKER_LOG_FORMAT";

/// Worker configuration.
///
/// # Example
///
/// ```rust
/// # use durable_worker::WorkerOptions;
/// let options = WorkerOptions {
///     task_queue: "billing".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(options.id_base, 9000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Task queue this worker serves; reported by `GetWorkerInfo`.
    pub task_queue: String,
    /// Correlation id counter base. Values below 9000 are raised to 9000.
    pub id_base: u64,
    /// Maximum number of commands sent per outbound frame.
    pub max_batch: usize,
    pub logging: LoggingConfig,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            task_queue: DEFAULT_TASK_QUEUE.to_string(),
            id_base: DEFAULT_ID_BASE,
            max_batch: DEFAULT_MAX_BATCH,
            logging: LoggingConfig::default(),
        }
    }
}

impl WorkerOptions {
    /// Options from `DURABLE_WORKER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Options from an arbitrary key lookup. Unparseable values are logged and
    /// replaced by their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        if let Some(queue) = lookup(ENV_TASK_QUEUE).filter(|q| !q.is_empty()) {
            options.task_queue = queue;
        }
        if let Some(raw) = lookup(ENV_ID_BASE) {
            match raw.parse::<u64>() {
                Ok(base) => options.id_base = base,
                Err(e) => warn!(key = ENV_ID_BASE, value = %raw, error = %e, "ignoring invalid id base"),
            }
        }
        if let Some(raw) = lookup(ENV_MAX_BATCH) {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => options.max_batch = n,
                _ => warn!(key = ENV_MAX_BATCH, value = %raw, "ignoring invalid batch size"),
            }
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|l| !l.is_empty()) {
            options.logging.level = level;
        }
        if let Some(raw) = lookup(ENV_LOG_FORMAT) {
            match raw.parse::<LogFormat>() {
                Ok(format) => options.logging.format = format,
                Err(e) => warn!(key = ENV_LOG_FORMAT, error = %e, "ignoring invalid log format"),
            }
        }
        options.normalized()
    }

    /// Clamp values into their valid ranges.
    pub fn normalized(mut self) -> Self {
        self.id_base = self.id_base.max(DEFAULT_ID_BASE);
        self.max_batch = self.max_batch.max(1);
        self
    }
}
