//! Content type schemas.

use serde::Deserialize;

use super::metadata::Metadata;

/// Declared type of a content type field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Symbol,
    Text,
    Integer,
    Number,
    Boolean,
    Date,
    Location,
    Link,
    Array,
    Object,
    RichText,
    Other(String),
}

impl FieldType {
    pub fn parse(value: &str) -> Self {
        match value {
            "Symbol" => Self::Symbol,
            "Text" => Self::Text,
            "Integer" => Self::Integer,
            "Number" | "Float" => Self::Number,
            "Boolean" => Self::Boolean,
            "Date" => Self::Date,
            "Location" => Self::Location,
            "Link" => Self::Link,
            "Array" => Self::Array,
            "Object" => Self::Object,
            "RichText" => Self::RichText,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Item declaration of an `Array` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldItems {
    pub field_type: FieldType,
    pub link_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ContentTypeField {
    pub id: String,
    pub name: String,
    pub field_type: FieldType,
    pub items: Option<FieldItems>,
    pub required: bool,
    pub localized: bool,
}

impl ContentTypeField {
    pub fn new(id: impl Into<String>, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            field_type,
            items: None,
            required: true,
            localized: false,
        }
    }
}

/// Raw shape of one entry in a content type's `fields[]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContentTypeField {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub items: Option<RawFieldItems>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub localized: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFieldItems {
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub link_type: Option<String>,
}

fn default_required() -> bool {
    true
}

impl From<RawContentTypeField> for ContentTypeField {
    fn from(raw: RawContentTypeField) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            field_type: FieldType::parse(&raw.field_type),
            items: raw.items.map(|items| FieldItems {
                field_type: FieldType::parse(&items.field_type),
                link_type: items.link_type,
            }),
            required: raw.required,
            localized: raw.localized,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentType {
    pub metadata: Metadata,
    pub name: String,
    pub description: Option<String>,
    /// Field definitions in declaration order.
    pub fields: Vec<ContentTypeField>,
    /// Id of the field used as an entry's title.
    pub display_field: Option<String>,
}

impl ContentType {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn field(&self, id: &str) -> Option<&ContentTypeField> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn display_field(&self) -> Option<&ContentTypeField> {
        self.display_field
            .as_deref()
            .and_then(|id| self.field(id))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::types::ResourceKind;

    #[test]
    fn raw_field_defaults_required_and_localized() {
        let raw: RawContentTypeField =
            serde_json::from_value(json!({ "id": "title", "name": "Title", "type": "Symbol" }))
                .expect("valid field");
        let field = ContentTypeField::from(raw);
        assert!(field.required);
        assert!(!field.localized);
        assert_eq!(field.field_type, FieldType::Symbol);
    }

    #[test]
    fn array_items_are_parsed() {
        let raw: RawContentTypeField = serde_json::from_value(json!({
            "id": "related",
            "type": "Array",
            "required": false,
            "items": { "type": "Link", "linkType": "Entry" }
        }))
        .expect("valid field");
        let field = ContentTypeField::from(raw);
        let items = field.items.expect("items");
        assert_eq!(items.field_type, FieldType::Link);
        assert_eq!(items.link_type.as_deref(), Some("Entry"));
        assert!(!field.required);
    }

    #[test]
    fn display_field_resolves_against_fields() {
        let content_type = ContentType {
            metadata: Metadata::new("cat", ResourceKind::ContentType),
            name: "Cat".into(),
            description: None,
            fields: vec![
                ContentTypeField::new("name", "Name", FieldType::Symbol),
                ContentTypeField::new("lives", "Lives", FieldType::Integer),
            ],
            display_field: Some("name".into()),
        };
        assert_eq!(
            content_type.display_field().map(|field| field.name.as_str()),
            Some("Name")
        );
        assert!(content_type.field("missing").is_none());
    }
}
