use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cron expression could not be parsed or describes no future fires.
    #[error("Invalid schedule \"{expr}\": {detail}")]
    ScheduleInvalid { expr: String, detail: String },

    /// The job carries no recurring schedule and so cannot be auto-started.
    #[error("Job \"{name}\" has no recurring schedule to start")]
    NotArmable { name: String },

    /// The registry has replaced or removed this instance; a fresh job must
    /// be registered instead of re-arming the stale handle.
    #[error("Job \"{name}\" is no longer registered and cannot be armed")]
    Displaced { name: String },

    /// Failure in the backing guild store while persisting job metadata.
    #[error(transparent)]
    Store(#[from] scrib_store::StoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
