use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failures contained within a single check cycle.
///
/// None of these stop the process. They are recorded on the cycle report and
/// logged; the next cycle starts from whatever in-memory state survived.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The source could not be fetched. Retried on the next cycle.
    #[error("fetching listings from {source_name} failed: {reason}")]
    FetchFailed { source_name: String, reason: String },

    /// The seen set could not be written. In-memory state stays valid.
    #[error("persisting seen listings failed: {0}")]
    PersistFailed(String),

    /// Delivery failed. Not retried within the cycle.
    #[error("sending notification for {count} listing(s) failed: {reason}")]
    NotifyFailed { count: usize, reason: String },

    /// Anything that escaped the cycle, caught at the scheduler boundary.
    #[error("cycle aborted: {0}")]
    Unknown(String),
}

impl CycleError {
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::FetchFailed { .. } => "fetch_failed",
            CycleError::PersistFailed(_) => "persist_failed",
            CycleError::NotifyFailed { .. } => "notify_failed",
            CycleError::Unknown(_) => "unknown",
        }
    }
}
