//! Error types for the alerts engine.

/// Top-level error type for alert scheduling and persistence.
#[derive(Debug, thiserror::Error)]
pub enum AlertsError {
    /// Alert fields failed validation (empty token, unrepresentable time).
    #[error("invalid alert: {0}")]
    InvalidAlert(String),

    /// Alert is already past its due window.
    #[error("alert {token} is past due")]
    PastDue { token: String },

    /// No alert with this token is known to the scheduler.
    #[error("unknown alert: {0}")]
    UnknownAlert(String),

    /// Operation requires the alert to be the active one.
    #[error("alert {0} is not active")]
    NotActive(String),

    /// Alert state machine rejected the requested operation.
    #[error("cannot {operation} alert {token} in state {state}")]
    InvalidTransition {
        token: String,
        state: String,
        operation: &'static str,
    },

    /// Alert storage failure outside of SQLite itself.
    #[error("storage error: {0}")]
    Storage(String),

    /// Storage exists but cannot hold alerts (missing, foreign or corrupt file).
    #[error("unusable alert storage: {0}")]
    StorageUnusable(String),

    /// SQLite failure.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Current time could not be determined.
    #[error("clock error: {0}")]
    Clock(String),

    /// Timer could not be armed.
    #[error("timer error: {0}")]
    Timer(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Scheduler has not been initialized.
    #[error("scheduler is not initialized")]
    NotInitialized,

    /// Scheduler has been shut down.
    #[error("scheduler is shut down")]
    ShutDown,
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AlertsError>;
