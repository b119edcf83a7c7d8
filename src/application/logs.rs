//! Per-request timing records.

use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;

use crate::domain::ApiMode;
use crate::query::QueryType;
use crate::util::lock::mutex_lock;

const SOURCE: &str = "application::logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogType {
    /// Served from the primary cache.
    Cache,
    /// Served from the fallback cache.
    Fallback,
    /// Fetched over HTTP.
    Fetch,
    Failure,
}

impl LogType {
    pub fn as_str(self) -> &'static str {
        match self {
            LogType::Cache => "cache",
            LogType::Fallback => "fallback",
            LogType::Fetch => "fetch",
            LogType::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestLog {
    pub description: String,
    pub cache_hit: bool,
    pub duration: Duration,
    pub log_type: LogType,
    pub resource_type: QueryType,
    pub api_mode: ApiMode,
}

/// Observer for completed requests. Never affects control flow.
pub trait RequestLogSink: Send + Sync {
    fn record(&self, log: RequestLog);
    fn logs(&self) -> Vec<RequestLog>;
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    logs: Mutex<Vec<RequestLog>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestLogSink for MemoryLogSink {
    fn record(&self, log: RequestLog) {
        debug!(
            description = %log.description,
            cache_hit = log.cache_hit,
            duration_ms = log.duration.as_millis() as u64,
            log_type = log.log_type.as_str(),
            resource_type = log.resource_type.as_str(),
            api_mode = log.api_mode.as_str(),
            "request completed"
        );
        mutex_lock(&self.logs, SOURCE, "record").push(log);
    }

    fn logs(&self) -> Vec<RequestLog> {
        mutex_lock(&self.logs, SOURCE, "logs").clone()
    }
}
