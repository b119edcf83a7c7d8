//! The built resource graph.

use std::sync::Arc;

use super::{
    asset::Asset, content_type::ContentType, entry::Entry, envelope::ResourceEnvelope, link::Link,
    space::Space, types::ResourceKind,
};

/// Any value the builder can produce.
///
/// Variants share their payload through `Arc`, so cloning a resource keeps
/// its identity; two clones of the same entry are `same_instance`.
#[derive(Debug, Clone)]
pub enum Resource {
    Entry(Arc<Entry>),
    Asset(Arc<Asset>),
    ContentType(Arc<ContentType>),
    Space(Arc<Space>),
    Link(Arc<Link>),
    Array(Arc<ResourceArray>),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Entry(_) => ResourceKind::Entry,
            Resource::Asset(_) => ResourceKind::Asset,
            Resource::ContentType(_) => ResourceKind::ContentType,
            Resource::Space(_) => ResourceKind::Space,
            Resource::Link(_) => ResourceKind::Link,
            Resource::Array(_) => ResourceKind::Array,
        }
    }

    /// Resource id; arrays have none and report an empty string.
    pub fn id(&self) -> &str {
        match self {
            Resource::Entry(entry) => &entry.metadata.id,
            Resource::Asset(asset) => &asset.metadata.id,
            Resource::ContentType(content_type) => &content_type.metadata.id,
            Resource::Space(space) => &space.metadata.id,
            Resource::Link(link) => &link.metadata.id,
            Resource::Array(_) => "",
        }
    }

    pub fn locale(&self) -> Option<&str> {
        match self {
            Resource::Entry(entry) => entry.metadata.locale.as_deref(),
            Resource::Asset(asset) => asset.metadata.locale.as_deref(),
            Resource::ContentType(content_type) => content_type.metadata.locale.as_deref(),
            Resource::Space(space) => space.metadata.locale.as_deref(),
            Resource::Link(link) => link.metadata.locale.as_deref(),
            Resource::Array(_) => None,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Resource::Link(_))
    }

    pub fn as_entry(&self) -> Option<&Arc<Entry>> {
        match self {
            Resource::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_asset(&self) -> Option<&Arc<Asset>> {
        match self {
            Resource::Asset(asset) => Some(asset),
            _ => None,
        }
    }

    pub fn as_content_type(&self) -> Option<&Arc<ContentType>> {
        match self {
            Resource::ContentType(content_type) => Some(content_type),
            _ => None,
        }
    }

    pub fn as_space(&self) -> Option<&Arc<Space>> {
        match self {
            Resource::Space(space) => Some(space),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&Arc<Link>> {
        match self {
            Resource::Link(link) => Some(link),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Arc<ResourceArray>> {
        match self {
            Resource::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Whether both values point at the same built instance.
    pub fn same_instance(&self, other: &Resource) -> bool {
        match (self, other) {
            (Resource::Entry(a), Resource::Entry(b)) => Arc::ptr_eq(a, b),
            (Resource::Asset(a), Resource::Asset(b)) => Arc::ptr_eq(a, b),
            (Resource::ContentType(a), Resource::ContentType(b)) => Arc::ptr_eq(a, b),
            (Resource::Space(a), Resource::Space(b)) => Arc::ptr_eq(a, b),
            (Resource::Link(a), Resource::Link(b)) => Arc::ptr_eq(a, b),
            (Resource::Array(a), Resource::Array(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// One page of a collection query.
#[derive(Debug, Clone)]
pub struct ResourceArray {
    pub items: Vec<Resource>,
    /// Full result count reported by the server; never below `items.len()`.
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
    /// The includes graph that was available when this page was built.
    pub envelope: Arc<ResourceEnvelope>,
}

impl ResourceArray {
    pub fn new(
        items: Vec<Resource>,
        total: u64,
        skip: u64,
        limit: u64,
        envelope: Arc<ResourceEnvelope>,
    ) -> Self {
        let total = total.max(items.len() as u64);
        Self {
            items,
            total,
            skip,
            limit,
            envelope,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.items.iter()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Arc<Entry>> {
        self.items.iter().filter_map(Resource::as_entry)
    }
}

impl<'a> IntoIterator for &'a ResourceArray {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
