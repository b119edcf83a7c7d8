//! Link resolution through the client.

use std::sync::Weak;

use async_trait::async_trait;

use crate::domain::{DomainError, Link, LinkResolver, Resource, ResourceKind};

use super::{client::ClientInner, error::ClientError};

/// Resolver handed to every entry built for one space.
///
/// Holds the client weakly: entries may outlive it, and a strong handle
/// would keep the client alive through its own envelope.
pub(crate) struct ClientLinkResolver {
    inner: Weak<ClientInner>,
    space: String,
}

impl ClientLinkResolver {
    pub(crate) fn new(inner: Weak<ClientInner>, space: String) -> Self {
        Self { inner, space }
    }
}

#[async_trait]
impl LinkResolver for ClientLinkResolver {
    async fn resolve_link(&self, link: &Link, locale: Option<&str>) -> Result<Resource, DomainError> {
        let Some(inner) = self.inner.upgrade() else {
            return Err(DomainError::link_unresolvable(
                link.link_type(),
                link.id(),
                ClientError::unavailable("the client has been dropped"),
            ));
        };
        inner.resolve_link(&self.space, link, locale).await
    }
}

impl ClientInner {
    /// Envelope first, then a fetch dispatched on the link type.
    pub(crate) async fn resolve_link(
        &self,
        space: &str,
        link: &Link,
        locale: Option<&str>,
    ) -> Result<Resource, DomainError> {
        let link_type = link.link_type();
        let id = link.id();
        let envelope = self.pool.get_envelope_for_space(space)?;

        let cached = match link_type {
            ResourceKind::Entry => envelope.find_entry(id, locale).map(Resource::Entry),
            ResourceKind::Asset => envelope.find_asset(id, locale).map(Resource::Asset),
            ResourceKind::ContentType => envelope.find_content_type(id).map(Resource::ContentType),
            _ => None,
        };
        if let Some(resource) = cached {
            return Ok(resource);
        }

        let fetched = match link_type {
            ResourceKind::Entry => self
                .get_entry(space, id, locale)
                .await
                .map(Resource::Entry),
            ResourceKind::Asset => self
                .get_asset(space, id, locale)
                .await
                .map(Resource::Asset),
            ResourceKind::ContentType => self
                .get_content_type(space, id)
                .await
                .map(Resource::ContentType),
            ResourceKind::Space => self.get_space(space).await.map(Resource::Space),
            other => Err(ClientError::InvalidInput(format!(
                "links to {other} cannot be resolved"
            ))),
        };
        fetched.map_err(|err| DomainError::link_unresolvable(link_type, id, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_client_reports_unresolvable_links() {
        let resolver = ClientLinkResolver::new(Weak::new(), "main".to_string());
        let link = Link::to(ResourceKind::Entry, "nyancat", "main");

        let err = resolver
            .resolve_link(&link, None)
            .await
            .expect_err("client gone");
        assert!(matches!(
            err,
            DomainError::LinkUnresolvable {
                link_type: ResourceKind::Entry,
                ..
            }
        ));
    }
}
