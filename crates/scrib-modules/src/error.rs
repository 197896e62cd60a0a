use thiserror::Error;

/// Errors crossing the feature-module boundary.
///
/// Every variant's `Display` output is written for the person who issued the
/// command; the bot frontend forwards it verbatim.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("{0}")]
    Store(#[from] scrib_store::StoreError),

    #[error("{0}")]
    Scheduler(#[from] scrib_scheduler::SchedulerError),

    /// The command was well-formed but cannot be honoured right now.
    #[error("{0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, ModuleError>;
