use crate::domain::models::{DomainFailure, SourceDomain};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Malformed date {0}")]
    MalformedDate(String),
    #[error("Malformed time '{0}': expected HH:MM")]
    MalformedTime(String),
    #[error("{domain} source error: {message}")]
    SourceAdapter {
        domain: SourceDomain,
        message: String,
    },
    #[error("All sources failed: {}", join_failures(.0))]
    AllSourcesFailed(Vec<DomainFailure>),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PlannerError {
    /// Scopes an adapter failure to the domain that was fetched. A scope the
    /// adapter attached itself is replaced; only its message is kept.
    pub fn source(domain: SourceDomain, error: PlannerError) -> Self {
        PlannerError::SourceAdapter {
            domain,
            message: error.adapter_message(),
        }
    }

    pub fn domain_failure(&self, domain: SourceDomain) -> DomainFailure {
        DomainFailure {
            domain,
            message: self.adapter_message(),
        }
    }

    fn adapter_message(&self) -> String {
        match self {
            PlannerError::SourceAdapter { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

fn join_failures(failures: &[DomainFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
