pub mod prober;
pub mod scheduler;

pub use prober::{HealthProber, ProbeBatch, classify_response};
pub use scheduler::spawn_health_scheduler;

use thiserror::Error;

use crate::logging::HealthStatus;

/// Ways a single probe can fail. Each one implies the classification that
/// was written back to the provider.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("provider {0} not found")]
    NotFound(i64),

    #[error("invalid provider config: {0}")]
    Config(String),

    #[error("provider unreachable: {0}")]
    Transport(String),

    #[error("provider rejected the credentials (status {0})")]
    AuthRejected(u16),

    #[error("provider answered without usable content")]
    Unusable,

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl ProbeError {
    pub fn health_status(&self) -> HealthStatus {
        match self {
            ProbeError::AuthRejected(_) | ProbeError::Unusable => HealthStatus::Degraded,
            ProbeError::Config(_) | ProbeError::Transport(_) | ProbeError::Status(_) => {
                HealthStatus::Unhealthy
            }
            ProbeError::NotFound(_) | ProbeError::Db(_) => HealthStatus::Unknown,
        }
    }
}
