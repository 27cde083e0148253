use thiserror::Error;

use crate::types::ProcessRecord;

/// Error taxonomy shared across the engine, the management types and the
/// backend client. `refresh()` absorbs all of these internally; patch,
/// restart and management operations surface them to the transport layer.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("identity markers are not portable across management types: {0}")]
    Incompatible(String),

    #[error("monitoring settings unavailable: {0}")]
    MonitoringSettings(String),

    #[error("failed to start process {}: {reason}", .record.id)]
    Start {
        record: Box<ProcessRecord>,
        reason: String,
    },

    #[error("failed to stop process {}: {reason}", .record.id)]
    Stop {
        record: Box<ProcessRecord>,
        reason: String,
    },

    #[error("backend unreachable: {0}")]
    Connection(String),
}

impl AgentError {
    pub fn start(record: &ProcessRecord, reason: impl Into<String>) -> Self {
        AgentError::Start {
            record: Box::new(record.clone()),
            reason: reason.into(),
        }
    }

    pub fn stop(record: &ProcessRecord, reason: impl Into<String>) -> Self {
        AgentError::Stop {
            record: Box::new(record.clone()),
            reason: reason.into(),
        }
    }
}
