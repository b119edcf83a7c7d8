//! Turns raw API payloads into linked resource graphs.
//!
//! Every concrete entry, asset and content type the builder produces is
//! indexed in the space's envelope, and links to resources already in the
//! envelope are replaced by the resource itself. Links that cannot be
//! satisfied locally stay links and are resolved when the field is read.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, join_all, try_join_all};
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use tracing::{debug, warn};

use crate::domain::{
    Asset, AssetDecorator, AssetFile, ContentType, ContentTypeField, DomainError, Entry,
    FieldValue, IdentityDecorator, Link, LinkResolver, Locale, Metadata, Resource, ResourceArray,
    ResourceEnvelope, ResourceKind, Space,
    content_type::RawContentTypeField,
    metadata::{RawSys, is_resource_shaped},
};

/// Result of one build.
#[derive(Debug, Clone)]
pub enum Built {
    One(Resource),
    /// A top-level JSON array of resources.
    Many(Vec<Resource>),
    /// The payload described nothing this client knows how to build.
    Empty,
}

impl Built {
    pub fn is_truthy(&self) -> bool {
        match self {
            Built::One(_) => true,
            Built::Many(items) => !items.is_empty(),
            Built::Empty => false,
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Built::One(resource) => Some(resource),
            _ => None,
        }
    }

    pub fn into_resource(self) -> Option<Resource> {
        match self {
            Built::One(resource) => Some(resource),
            _ => None,
        }
    }
}

impl From<Option<Resource>> for Built {
    fn from(resource: Option<Resource>) -> Self {
        resource.map_or(Built::Empty, Built::One)
    }
}

pub struct ResourceBuilder {
    envelope: Arc<ResourceEnvelope>,
    space_name: String,
    resolver: Option<Arc<dyn LinkResolver>>,
    decorator: Arc<dyn AssetDecorator>,
    typed: bool,
}

impl ResourceBuilder {
    pub fn new(envelope: Arc<ResourceEnvelope>, space_name: impl Into<String>) -> Self {
        Self {
            envelope,
            space_name: space_name.into(),
            resolver: None,
            decorator: Arc::new(IdentityDecorator),
            typed: false,
        }
    }

    /// Resolver attached to every built entry.
    pub fn with_resolver(mut self, resolver: Arc<dyn LinkResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_decorator(mut self, decorator: Arc<dyn AssetDecorator>) -> Self {
        self.decorator = decorator;
        self
    }

    /// Attach each entry's content type so its fields are coerced on read.
    pub fn typed(mut self, typed: bool) -> Self {
        self.typed = typed;
        self
    }

    pub fn envelope(&self) -> &Arc<ResourceEnvelope> {
        &self.envelope
    }

    /// Build a raw payload: one resource, or a JSON array of resources.
    pub async fn build(&self, raw: &Json) -> Result<Built, DomainError> {
        if let Json::Array(items) = raw {
            if !items.iter().all(is_resource_shaped) {
                return Err(DomainError::invalid_input(
                    "array payload contains values that are not resources",
                ));
            }
            let built = try_join_all(items.iter().map(|item| self.build_resource(item, None)))
                .await?;
            return Ok(Built::Many(built.into_iter().flatten().collect()));
        }

        Ok(self.build_resource(raw, None).await?.into())
    }

    /// `locale` is the locale of the enclosing resource, used for link lookups.
    fn build_resource<'a>(
        &'a self,
        raw: &'a Json,
        locale: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Option<Resource>, DomainError>> {
        async move {
            let mut sys = RawSys::from_resource(raw)?;
            let Some(kind) = sys.kind()? else {
                debug!(sys_type = ?sys.kind, "skipping resource of unknown type");
                return Ok(None);
            };

            let space = sys.space.take();
            let content_type = sys.content_type.take();
            let mut metadata = sys.into_metadata(kind)?;
            if let Some(space) = space.as_ref().filter(|raw| is_resource_shaped(raw)) {
                metadata.space = self.build_resource(space, None).await?;
            }
            if let Some(content_type) = content_type.as_ref().filter(|raw| is_resource_shaped(raw))
            {
                metadata.content_type = self.build_resource(content_type, None).await?;
            }

            let resource = match kind {
                ResourceKind::Space => Some(build_space(raw, metadata)?),
                ResourceKind::Entry => Some(self.build_entry(raw, metadata).await?),
                ResourceKind::Asset => Some(self.build_asset(raw, metadata)),
                ResourceKind::ContentType => Some(self.build_content_type(raw, metadata)?),
                ResourceKind::Link => self.build_link(metadata, locale),
                ResourceKind::Array => Some(self.build_array(raw).await?),
            };
            Ok(resource)
        }
        .boxed()
    }

    async fn build_entry(&self, raw: &Json, metadata: Metadata) -> Result<Resource, DomainError> {
        let id = metadata.id.clone();
        let locale = metadata.locale.clone();
        if !self.envelope.begin_entry(&id, locale.as_deref()) {
            debug!(entry_id = %id, "entry already under construction; keeping a link");
            return Ok(self.link_to(ResourceKind::Entry, id, locale));
        }

        let built = self.assemble_entry(raw, metadata).await;
        self.envelope.finish_entry(&id, locale.as_deref());
        let entry = Arc::new(built?);
        self.envelope.insert_entry(Arc::clone(&entry));
        Ok(Resource::Entry(entry))
    }

    async fn assemble_entry(&self, raw: &Json, metadata: Metadata) -> Result<Entry, DomainError> {
        let locale = metadata.locale.as_deref();
        let empty = Map::new();
        let raw_fields = raw.get("fields").and_then(Json::as_object).unwrap_or(&empty);

        let built = try_join_all(raw_fields.iter().map(|(name, value)| async move {
            let value = self.build_field(value, locale).await?;
            Ok::<_, DomainError>((name.clone(), value))
        }))
        .await?;
        let fields: BTreeMap<String, FieldValue> = built.into_iter().collect();

        let schema = if self.typed {
            self.schema_for(&metadata).await
        } else {
            None
        };

        let mut entry = Entry::new(metadata, fields);
        if let Some(resolver) = self.resolver.as_ref() {
            entry = entry.with_resolver(Arc::clone(resolver));
        }
        if let Some(schema) = schema {
            entry = entry.with_schema(schema);
        }
        Ok(entry)
    }

    async fn build_field(&self, value: &Json, locale: Option<&str>) -> Result<FieldValue, DomainError> {
        if is_resource_shaped(value) {
            return Ok(match self.build_resource(value, locale).await? {
                Some(resource) => resource.into(),
                None => FieldValue::Json(value.clone()),
            });
        }

        match value {
            Json::Array(items) if !items.is_empty() && items.iter().all(is_resource_shaped) => {
                let built =
                    try_join_all(items.iter().map(|item| self.build_resource(item, locale))).await?;
                Ok(FieldValue::List(
                    built.into_iter().flatten().map(FieldValue::from).collect(),
                ))
            }
            other => Ok(FieldValue::Json(other.clone())),
        }
    }

    /// Content type of an entry, following a link when needed.
    ///
    /// A content type that cannot be resolved leaves the entry untyped.
    async fn schema_for(&self, metadata: &Metadata) -> Option<Arc<ContentType>> {
        match metadata.content_type.as_ref()? {
            Resource::ContentType(content_type) => Some(Arc::clone(content_type)),
            Resource::Link(link) => {
                if let Some(content_type) = self.envelope.find_content_type(link.id()) {
                    return Some(content_type);
                }
                let resolver = self.resolver.as_ref()?;
                match resolver.resolve_link(link, None).await {
                    Ok(Resource::ContentType(content_type)) => Some(content_type),
                    Ok(other) => {
                        warn!(
                            entry_id = %metadata.id,
                            resolved_kind = %other.kind(),
                            "content type link resolved to another kind; entry stays untyped"
                        );
                        None
                    }
                    Err(err) => {
                        warn!(
                            entry_id = %metadata.id,
                            content_type_id = %link.id(),
                            error = %err,
                            "content type could not be resolved; entry stays untyped"
                        );
                        None
                    }
                }
            }
            _ => None,
        }
    }

    fn build_asset(&self, raw: &Json, metadata: Metadata) -> Resource {
        let fields = raw.get("fields");
        let text = |name: &str| {
            fields
                .and_then(|fields| fields.get(name))
                .and_then(Json::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let file = fields.and_then(|fields| fields.get("file"));
        let file_text = |name: &str| {
            file.and_then(|file| file.get(name))
                .and_then(Json::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let asset = Asset {
            title: text("title"),
            description: text("description"),
            file: AssetFile {
                file_name: file_text("fileName"),
                content_type: file_text("contentType"),
                details: file
                    .and_then(|file| file.get("details"))
                    .and_then(Json::as_object)
                    .cloned()
                    .unwrap_or_default(),
                url: file_text("url"),
            },
            metadata,
        };

        let asset = Arc::new(self.decorator.decorate(asset));
        self.envelope.insert_asset(Arc::clone(&asset));
        Resource::Asset(asset)
    }

    fn build_content_type(&self, raw: &Json, metadata: Metadata) -> Result<Resource, DomainError> {
        let fields = match raw.get("fields") {
            Some(fields) => Vec::<RawContentTypeField>::deserialize(fields).map_err(|err| {
                DomainError::invalid_input(format!(
                    "content type `{}` has malformed fields: {err}",
                    metadata.id
                ))
            })?,
            None => Vec::new(),
        };

        let content_type = Arc::new(ContentType {
            name: string_field(raw, "name").unwrap_or_default(),
            description: string_field(raw, "description"),
            fields: fields.into_iter().map(ContentTypeField::from).collect(),
            display_field: string_field(raw, "displayField"),
            metadata,
        });
        self.envelope.insert_content_type(Arc::clone(&content_type));
        Ok(Resource::ContentType(content_type))
    }

    fn build_link(&self, metadata: Metadata, context_locale: Option<&str>) -> Option<Resource> {
        let Some(link_type) = metadata.link_type else {
            debug!(link_id = %metadata.id, "link without a link type");
            return Some(Resource::Link(Arc::new(Link::new(
                metadata,
                self.space_name.clone(),
            ))));
        };
        let locale = metadata.locale.as_deref().or(context_locale);

        match link_type {
            ResourceKind::Space => {
                let space = Metadata::new(metadata.id, ResourceKind::Space);
                return Some(Resource::Space(Arc::new(Space::new(space, None, Vec::new()))));
            }
            ResourceKind::Entry => {
                if let Some(entry) = self.envelope.find_entry(&metadata.id, locale) {
                    return Some(Resource::Entry(entry));
                }
            }
            ResourceKind::Asset => {
                if let Some(asset) = self.envelope.find_asset(&metadata.id, locale) {
                    return Some(Resource::Asset(asset));
                }
            }
            _ => {}
        }

        Some(Resource::Link(Arc::new(Link::new(
            metadata,
            self.space_name.clone(),
        ))))
    }

    async fn build_array(&self, raw: &Json) -> Result<Resource, DomainError> {
        let built_here = match raw.get("includes") {
            Some(includes) => self.merge_includes(includes).await?,
            None => HashSet::new(),
        };

        let items = match raw.get("items") {
            Some(Json::Array(items)) => items.as_slice(),
            Some(_) => {
                return Err(DomainError::invalid_input("array `items` is not a list"));
            }
            None => &[],
        };
        let built =
            try_join_all(items.iter().map(|item| self.build_item(item, &built_here))).await?;
        let items: Vec<Resource> = built.into_iter().flatten().collect();

        let count = |name: &str| raw.get(name).and_then(Json::as_u64);
        let total = count("total").unwrap_or(items.len() as u64);
        let skip = count("skip").unwrap_or(0);
        let limit = count("limit").unwrap_or(items.len() as u64);

        Ok(Resource::Array(Arc::new(ResourceArray::new(
            items,
            total,
            skip,
            limit,
            Arc::clone(&self.envelope),
        ))))
    }

    /// Index side-loaded resources, returning the keys built from this payload.
    ///
    /// Assets go first since entries may link to them.
    async fn merge_includes(&self, includes: &Json) -> Result<HashSet<BuildKey>, DomainError> {
        let mut built_here = HashSet::new();
        for kind in ["Asset", "Entry"] {
            let Some(Json::Array(resources)) = includes.get(kind) else {
                continue;
            };
            let pending: Vec<&Json> = resources
                .iter()
                .filter(|raw| {
                    is_resource_shaped(raw) && self.find_reusable(raw, &built_here).is_none()
                })
                .collect();
            let results =
                join_all(pending.into_iter().map(|raw| self.build_resource(raw, None))).await;
            for result in results {
                if let Some(resource) = result? {
                    built_here.insert(build_key(resource.id(), resource.locale()));
                }
            }
        }
        Ok(built_here)
    }

    async fn build_item(
        &self,
        raw: &Json,
        built_here: &HashSet<BuildKey>,
    ) -> Result<Option<Resource>, DomainError> {
        if let Some(existing) = self.find_reusable(raw, built_here) {
            return Ok(Some(existing));
        }
        self.build_resource(raw, None).await
    }

    /// An indexed copy that may stand in for `raw`.
    ///
    /// The copy qualifies when it was built from the current payload or its
    /// revision is at least the incoming one. Anything else is rebuilt and
    /// replaces the indexed copy.
    fn find_reusable(&self, raw: &Json, built_here: &HashSet<BuildKey>) -> Option<Resource> {
        let sys = RawSys::from_resource(raw).ok()?;
        let id = sys.id.as_deref()?;
        let locale = sys.locale.as_deref();
        let (existing, kept_revision) = match sys.kind.as_deref().and_then(ResourceKind::parse)? {
            ResourceKind::Entry => {
                let entry = self.envelope.find_entry(id, locale)?;
                let revision = entry.metadata.revision;
                (Resource::Entry(entry), revision)
            }
            ResourceKind::Asset => {
                let asset = self.envelope.find_asset(id, locale)?;
                let revision = asset.metadata.revision;
                (Resource::Asset(asset), revision)
            }
            _ => return None,
        };

        let current = built_here.contains(&build_key(id, locale))
            || matches!(
                (kept_revision, sys.revision),
                (Some(kept), Some(incoming)) if kept >= incoming
            );
        if !current {
            debug!(resource_id = id, "indexed copy may be stale; rebuilding");
        }
        current.then_some(existing)
    }

    fn link_to(&self, link_type: ResourceKind, id: String, locale: Option<String>) -> Resource {
        let mut metadata = Metadata::new(id, ResourceKind::Link).with_link_type(link_type);
        metadata.locale = locale;
        Resource::Link(Arc::new(Link::new(metadata, self.space_name.clone())))
    }
}

/// `(id, locale)` of a resource built while assembling one payload.
type BuildKey = (String, Option<String>);

fn build_key(id: &str, locale: Option<&str>) -> BuildKey {
    (id.to_string(), locale.map(str::to_string))
}

fn build_space(raw: &Json, metadata: Metadata) -> Result<Resource, DomainError> {
    let locales = match raw.get("locales") {
        Some(locales) => Vec::<Locale>::deserialize(locales).map_err(|err| {
            DomainError::invalid_input(format!("space `{}` has malformed locales: {err}", metadata.id))
        })?,
        None => Vec::new(),
    };
    let name = string_field(raw, "name");
    Ok(Resource::Space(Arc::new(Space::new(metadata, name, locales))))
}

fn string_field(raw: &Json, name: &str) -> Option<String> {
    raw.get(name).and_then(Json::as_str).map(str::to_string)
}
