//! Unresolved references and the callback that resolves them.

use async_trait::async_trait;

use super::{error::DomainError, metadata::Metadata, resource::Resource, types::ResourceKind};

/// A placeholder for a resource that has not been built yet.
#[derive(Debug, Clone)]
pub struct Link {
    pub metadata: Metadata,
    /// Name of the configured space this link was read under.
    pub space_name: String,
}

impl Link {
    pub fn new(metadata: Metadata, space_name: impl Into<String>) -> Self {
        Self {
            metadata,
            space_name: space_name.into(),
        }
    }

    /// Convenience constructor for a link with no further metadata.
    pub fn to(link_type: ResourceKind, id: impl Into<String>, space_name: impl Into<String>) -> Self {
        Self::new(
            Metadata::new(id, ResourceKind::Link).with_link_type(link_type),
            space_name,
        )
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Kind of resource the link points at; defaults to `Entry` when absent.
    pub fn link_type(&self) -> ResourceKind {
        self.metadata.link_type.unwrap_or(ResourceKind::Entry)
    }
}

/// Turns a [`Link`] into the resource it references, fetching it if needed.
///
/// Entries hold one of these so link-valued fields resolve on first access.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve_link(&self, link: &Link, locale: Option<&str>) -> Result<Resource, DomainError>;
}
