//! Typed field values and content-type-aware coercion.

use std::sync::Arc;

use serde_json::Value as Json;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
    format_description::well_known::Rfc3339, macros::format_description,
};

use super::{
    content_type::{ContentType, ContentTypeField, FieldType},
    entry::{Entry, FieldValue},
    link::Link,
    resource::Resource,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    /// Parse a `"lat,lon"` string.
    pub fn parse(raw: &str) -> Option<Self> {
        let (lat, lon) = raw.split_once(',')?;
        Some(Self {
            lat: lat.trim().parse().ok()?,
            lon: lon.trim().parse().ok()?,
        })
    }
}

/// A field value as exposed to callers.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(OffsetDateTime),
    Location(Location),
    /// A link that could not be resolved because no resolver was attached.
    Link(Arc<Link>),
    Resource(Resource),
    List(Vec<Value>),
    /// Raw JSON passed through without coercion.
    Json(Json),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            Value::Json(Json::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            Value::Json(json) => json.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Integer(value) => Some(*value as f64),
            Value::Json(json) => json.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            Value::Json(json) => json.as_bool(),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Value::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    pub fn as_entry(&self) -> Option<&Arc<Entry>> {
        self.as_resource().and_then(Resource::as_entry)
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Json(Json::Null))
    }
}

type Coercion = fn(&Json) -> Option<Value>;

/// Coercion function for a declared field type; `None` means pass through.
fn coercion_for(field_type: &FieldType) -> Option<Coercion> {
    match field_type {
        FieldType::Symbol | FieldType::Text => Some(coerce_string),
        FieldType::Integer => Some(coerce_integer),
        FieldType::Number => Some(coerce_float),
        FieldType::Boolean => Some(coerce_bool),
        FieldType::Date => Some(coerce_date),
        FieldType::Location => Some(coerce_location),
        _ => None,
    }
}

fn coerce_string(raw: &Json) -> Option<Value> {
    raw.as_str().map(|value| Value::String(value.to_string()))
}

fn coerce_integer(raw: &Json) -> Option<Value> {
    match raw {
        Json::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value as i64)),
        Json::String(value) => value.trim().parse().ok(),
        _ => None,
    }
    .map(Value::Integer)
}

fn coerce_float(raw: &Json) -> Option<Value> {
    match raw {
        Json::Number(number) => number.as_f64(),
        Json::String(value) => value.trim().parse().ok(),
        _ => None,
    }
    .map(Value::Float)
}

fn coerce_bool(raw: &Json) -> Option<Value> {
    match raw {
        Json::Bool(value) => Some(*value),
        Json::String(value) => match value.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Json::Number(number) => number.as_i64().map(|value| value != 0),
        _ => None,
    }
    .map(Value::Bool)
}

fn coerce_date(raw: &Json) -> Option<Value> {
    raw.as_str().and_then(parse_date).map(Value::Date)
}

fn coerce_location(raw: &Json) -> Option<Value> {
    match raw {
        Json::String(value) => Location::parse(value),
        Json::Object(map) => Some(Location {
            lat: map.get("lat")?.as_f64()?,
            lon: map.get("lon")?.as_f64()?,
        }),
        _ => None,
    }
    .map(Value::Location)
}

/// Parse a date field: full RFC 3339, a local date-time (assumed UTC), or a bare date.
pub fn parse_date(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed.to_offset(UtcOffset::UTC));
    }
    let local_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Ok(parsed) = PrimitiveDateTime::parse(raw, local_seconds) {
        return Some(parsed.assume_utc());
    }
    let local_minutes = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    if let Ok(parsed) = PrimitiveDateTime::parse(raw, local_minutes) {
        return Some(parsed.assume_utc());
    }
    let date_only = format_description!("[year]-[month]-[day]");
    Date::parse(raw, date_only)
        .ok()
        .map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc())
}

/// Convert an already-resolved field value without a schema.
pub fn untyped(value: &FieldValue) -> Value {
    match value {
        FieldValue::Json(json) => Value::Json(json.clone()),
        FieldValue::Link(link) => Value::Link(Arc::clone(link)),
        FieldValue::Resource(resource) => Value::Resource(resource.clone()),
        FieldValue::List(items) => Value::List(items.iter().map(untyped).collect()),
    }
}

/// An entry viewed through its content type's field declarations.
///
/// Declared scalar fields are coerced into typed [`Value`]s; undeclared
/// fields and values that do not fit their declaration pass through.
#[derive(Debug, Clone, Copy)]
pub struct DynamicEntry<'a> {
    entry: &'a Entry,
    content_type: &'a ContentType,
}

impl<'a> DynamicEntry<'a> {
    pub fn new(entry: &'a Entry, content_type: &'a ContentType) -> Self {
        Self {
            entry,
            content_type,
        }
    }

    pub fn entry(&self) -> &'a Entry {
        self.entry
    }

    pub fn content_type(&self) -> &'a ContentType {
        self.content_type
    }

    /// Resolved, coerced value of a field.
    pub async fn get(&self, name: &str) -> Option<Value> {
        self.entry.field(name).await
    }

    /// Coerce one stored value according to the declaration of `name`.
    pub fn coerce(&self, name: &str, value: &FieldValue) -> Value {
        match self.content_type.field(name) {
            Some(field) => coerce_declared(field, value),
            None => untyped(value),
        }
    }
}

fn coerce_declared(field: &ContentTypeField, value: &FieldValue) -> Value {
    match (value, &field.field_type) {
        (FieldValue::Json(Json::Array(items)), FieldType::Array) => {
            let coercion = field
                .items
                .as_ref()
                .and_then(|items| coercion_for(&items.field_type));
            Value::List(
                items
                    .iter()
                    .map(|item| apply(coercion, item))
                    .collect(),
            )
        }
        (FieldValue::Json(json), field_type) => apply(coercion_for(field_type), json),
        (other, _) => untyped(other),
    }
}

fn apply(coercion: Option<Coercion>, raw: &Json) -> Value {
    if raw.is_null() {
        return Value::Null;
    }
    coercion
        .and_then(|coerce| coerce(raw))
        .unwrap_or_else(|| Value::Json(raw.clone()))
}
