//! System properties (`sys`) shared by every resource.

use serde::Deserialize;
use serde_json::Value as Json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use super::{error::DomainError, resource::Resource, types::ResourceKind};

/// The `sys` block of a resource, with `space` and `contentType` already built.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub id: String,
    pub kind: ResourceKind,
    /// Owning space, either built inline or left as a link.
    pub space: Option<Resource>,
    /// Content type of an entry, either resolved or left as a link.
    pub content_type: Option<Resource>,
    /// Target kind; only present when `kind` is [`ResourceKind::Link`].
    pub link_type: Option<ResourceKind>,
    pub revision: Option<i64>,
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
    pub locale: Option<String>,
}

impl Metadata {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            space: None,
            content_type: None,
            link_type: None,
            revision: None,
            created_at: None,
            updated_at: None,
            locale: None,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_link_type(mut self, link_type: ResourceKind) -> Self {
        self.link_type = Some(link_type);
        self
    }

    pub fn with_space(mut self, space: Resource) -> Self {
        self.space = Some(space);
        self
    }

    pub fn with_content_type(mut self, content_type: Resource) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Id of the owning space, whether it was built or left as a link.
    pub fn space_id(&self) -> Option<&str> {
        self.space.as_ref().map(Resource::id)
    }

    /// Id of the entry's content type, whether it was resolved or left as a link.
    pub fn content_type_id(&self) -> Option<&str> {
        self.content_type.as_ref().map(Resource::id)
    }
}

/// Scalar part of a raw `sys` block, before the nested links are built.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSys {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub link_type: Option<String>,
    pub revision: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub locale: Option<String>,
    pub space: Option<Json>,
    pub content_type: Option<Json>,
}

impl RawSys {
    /// Read the `sys` block of a raw resource object.
    pub fn from_resource(raw: &Json) -> Result<Self, DomainError> {
        let sys = raw
            .get("sys")
            .ok_or_else(|| DomainError::invalid_input("resource has no `sys` block"))?;
        serde_json::from_value(sys.clone())
            .map_err(|err| DomainError::invalid_input(format!("malformed `sys` block: {err}")))
    }

    pub fn kind(&self) -> Result<Option<ResourceKind>, DomainError> {
        let kind = self
            .kind
            .as_deref()
            .ok_or_else(|| DomainError::invalid_input("`sys.type` is missing"))?;
        Ok(ResourceKind::parse(kind))
    }

    /// Build the scalar metadata; `space` and `contentType` are attached by the caller.
    pub fn into_metadata(self, kind: ResourceKind) -> Result<Metadata, DomainError> {
        let created_at = parse_timestamp(self.created_at.as_deref(), "createdAt")?;
        let updated_at = parse_timestamp(self.updated_at.as_deref(), "updatedAt")?;
        Ok(Metadata {
            id: self.id.unwrap_or_default(),
            kind,
            space: None,
            content_type: None,
            link_type: self.link_type.as_deref().and_then(ResourceKind::parse),
            revision: self.revision,
            created_at,
            updated_at,
            locale: self.locale,
        })
    }
}

fn parse_timestamp(
    value: Option<&str>,
    field: &'static str,
) -> Result<Option<OffsetDateTime>, DomainError> {
    value
        .map(|raw| {
            OffsetDateTime::parse(raw, &Rfc3339).map_err(|err| {
                DomainError::invalid_input(format!("`sys.{field}` is not RFC 3339: {err}"))
            })
        })
        .transpose()
}

/// Whether a raw JSON value looks like a resource (an object with a `sys` block).
pub fn is_resource_shaped(raw: &Json) -> bool {
    raw.get("sys").is_some_and(Json::is_object)
}
