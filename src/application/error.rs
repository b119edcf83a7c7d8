use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::cache::IncompleteParameter;
use crate::domain::error::{BoxError, DomainError};
use crate::infra::error::InfraError;

/// Flattened error chain, outermost message first.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages.join(": "))
    }
}

/// Failures surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network, HTTP or validation failure with no usable fallback.
    #[error("resource unavailable: {message}")]
    ResourceUnavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unresolvable parameter: {0}")]
    UnresolvableParameter(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// A stored payload could not be decoded; retrying will not help.
    #[error("logic error: {0}")]
    Logic(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl ClientError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn unavailable_because(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::ResourceUnavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ClientError::ResourceUnavailable { .. })
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::ClientError", self)
    }

    /// Codec faults become logic errors; other infra faults pass through.
    pub(crate) fn from_cache(err: InfraError) -> Self {
        match err {
            InfraError::Codec(message) => Self::Logic(message),
            other => Self::Infra(other),
        }
    }
}

impl From<IncompleteParameter> for ClientError {
    fn from(err: IncompleteParameter) -> Self {
        Self::UnresolvableParameter(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_walks_the_source_chain() {
        let err = ClientError::unavailable_because(
            "entry `nyancat` could not be fetched",
            InfraError::transport("connection refused"),
        );
        let report = err.report();
        assert_eq!(report.messages.len(), 2);
        assert_eq!(
            report.to_string(),
            "resource unavailable: entry `nyancat` could not be fetched: transport error: connection refused"
        );
    }

    #[test]
    fn codec_faults_are_logic_errors() {
        let err = ClientError::from_cache(InfraError::codec("bad base64"));
        assert!(matches!(err, ClientError::Logic(_)));
        let err = ClientError::from_cache(InfraError::cache("backend down"));
        assert!(matches!(err, ClientError::Infra(InfraError::Cache(_))));
    }
}
