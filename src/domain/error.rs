use std::error::Error as StdError;

use thiserror::Error;

use super::types::ResourceKind;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain entity `{entity}` not found")]
    NotFound { entity: String },
    #[error("invalid resource data: {message}")]
    InvalidInput { message: String },
    #[error("link to {link_type} `{id}` could not be resolved")]
    LinkUnresolvable {
        link_type: ResourceKind,
        id: String,
        #[source]
        source: BoxError,
    },
}

impl DomainError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn link_unresolvable(
        link_type: ResourceKind,
        id: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::LinkUnresolvable {
            link_type,
            id: id.into(),
            source: source.into(),
        }
    }
}
