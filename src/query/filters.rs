//! Concrete query parameters.

use std::fmt;

use time::{Duration, OffsetDateTime, format_description::well_known::Rfc3339};

use super::{Completion, QueryParameter};

/// Comparison operators for ranged filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Comparison {
    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::LessThan => "lt",
            Comparison::LessThanOrEqual => "lte",
            Comparison::GreaterThan => "gt",
            Comparison::GreaterThanOrEqual => "gte",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `field=value`
#[derive(Debug, Clone)]
pub struct Equals {
    field: String,
    value: String,
}

impl Equals {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl QueryParameter for Equals {
    fn name(&self) -> &'static str {
        "equals"
    }

    fn key(&self) -> String {
        self.field.clone()
    }

    fn value(&self) -> String {
        self.value.clone()
    }
}

/// `field[ne]=value`
#[derive(Debug, Clone)]
pub struct NotEquals {
    field: String,
    value: String,
}

impl NotEquals {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl QueryParameter for NotEquals {
    fn name(&self) -> &'static str {
        "not_equals"
    }

    fn key(&self) -> String {
        format!("{}[ne]", self.field)
    }

    fn value(&self) -> String {
        self.value.clone()
    }
}

/// `field[in]=a,b,c`
#[derive(Debug, Clone)]
pub struct In {
    field: String,
    values: Vec<String>,
}

impl In {
    pub fn new<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl QueryParameter for In {
    fn name(&self) -> &'static str {
        "in"
    }

    fn key(&self) -> String {
        format!("{}[in]", self.field)
    }

    fn value(&self) -> String {
        self.values.join(",")
    }
}

/// `field[nin]=a,b,c`
#[derive(Debug, Clone)]
pub struct NotIn {
    field: String,
    values: Vec<String>,
}

impl NotIn {
    pub fn new<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl QueryParameter for NotIn {
    fn name(&self) -> &'static str {
        "not_in"
    }

    fn key(&self) -> String {
        format!("{}[nin]", self.field)
    }

    fn value(&self) -> String {
        self.values.join(",")
    }
}

/// `field[exists]=true|false`
#[derive(Debug, Clone)]
pub struct Exists {
    field: String,
    exists: bool,
}

impl Exists {
    pub fn new(field: impl Into<String>, exists: bool) -> Self {
        Self {
            field: field.into(),
            exists,
        }
    }
}

impl QueryParameter for Exists {
    fn name(&self) -> &'static str {
        "exists"
    }

    fn key(&self) -> String {
        format!("{}[exists]", self.field)
    }

    fn value(&self) -> String {
        self.exists.to_string()
    }
}

/// `field[lt|lte|gt|gte]=value`
#[derive(Debug, Clone)]
pub struct Compare {
    field: String,
    comparison: Comparison,
    value: String,
}

impl Compare {
    pub fn new(field: impl Into<String>, comparison: Comparison, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            comparison,
            value: value.into(),
        }
    }
}

impl QueryParameter for Compare {
    fn name(&self) -> &'static str {
        "compare"
    }

    fn key(&self) -> String {
        format!("{}[{}]", self.field, self.comparison)
    }

    fn value(&self) -> String {
        self.value.clone()
    }
}

/// Compares a date field against "now plus an offset".
///
/// The query-string value depends on the clock, so the cache-key fragment
/// is built from the offset instead.
#[derive(Debug, Clone)]
pub struct RelativeTime {
    field: String,
    comparison: Comparison,
    offset: Duration,
}

impl RelativeTime {
    pub fn new(field: impl Into<String>, comparison: Comparison, offset: Duration) -> Self {
        Self {
            field: field.into(),
            comparison,
            offset,
        }
    }

    fn target(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc() + self.offset
    }
}

impl QueryParameter for RelativeTime {
    fn name(&self) -> &'static str {
        "relative_time"
    }

    fn key(&self) -> String {
        format!("{}[{}]", self.field, self.comparison)
    }

    fn value(&self) -> String {
        self.target()
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.target().unix_timestamp().to_string())
    }

    fn cache_key(&self) -> Option<String> {
        Some(format!(
            "|relative_time|{}↦{}s",
            self.key(),
            self.offset.whole_seconds()
        ))
    }
}

/// Full-text search across all text fields.
#[derive(Debug, Clone)]
pub struct FullText(pub String);

impl QueryParameter for FullText {
    fn name(&self) -> &'static str {
        "full_text"
    }

    fn key(&self) -> String {
        "query".to_string()
    }

    fn value(&self) -> String {
        self.0.clone()
    }
}

/// Restrict entries to one content type, by id.
#[derive(Debug, Clone)]
pub struct ContentTypeFilter {
    id: String,
}

impl ContentTypeFilter {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl QueryParameter for ContentTypeFilter {
    fn name(&self) -> &'static str {
        "content_type"
    }

    fn key(&self) -> String {
        "content_type".to_string()
    }

    fn value(&self) -> String {
        self.id.clone()
    }
}

/// Restrict entries to one content type, by name.
///
/// Incomplete: the client swaps it for a [`ContentTypeFilter`] once it has
/// looked the id up.
#[derive(Debug, Clone)]
pub struct ContentTypeNameFilter {
    name: String,
}

impl ContentTypeNameFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl QueryParameter for ContentTypeNameFilter {
    fn name(&self) -> &'static str {
        "content_type"
    }

    fn key(&self) -> String {
        "content_type".to_string()
    }

    fn value(&self) -> String {
        self.name.clone()
    }

    fn completion(&self) -> Option<Completion> {
        Some(Completion::ContentTypeName(self.name.clone()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Limit(pub u32);

impl QueryParameter for Limit {
    fn name(&self) -> &'static str {
        "limit"
    }

    fn key(&self) -> String {
        "limit".to_string()
    }

    fn value(&self) -> String {
        self.0.to_string()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Skip(pub u32);

impl QueryParameter for Skip {
    fn name(&self) -> &'static str {
        "skip"
    }

    fn key(&self) -> String {
        "skip".to_string()
    }

    fn value(&self) -> String {
        self.0.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Order {
    field: String,
    reverse: bool,
}

impl Order {
    pub fn new(field: impl Into<String>, reverse: bool) -> Self {
        Self {
            field: field.into(),
            reverse,
        }
    }
}

impl QueryParameter for Order {
    fn name(&self) -> &'static str {
        "order"
    }

    fn key(&self) -> String {
        "order".to_string()
    }

    fn value(&self) -> String {
        if self.reverse {
            format!("-{}", self.field)
        } else {
            self.field.clone()
        }
    }
}

/// Link expansion depth.
#[derive(Debug, Clone, Copy)]
pub struct Include(pub u8);

impl QueryParameter for Include {
    fn name(&self) -> &'static str {
        "include"
    }

    fn key(&self) -> String {
        "include".to_string()
    }

    fn value(&self) -> String {
        self.0.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct LocaleParam {
    code: String,
}

impl LocaleParam {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

impl QueryParameter for LocaleParam {
    fn name(&self) -> &'static str {
        "locale"
    }

    fn key(&self) -> String {
        "locale".to_string()
    }

    fn value(&self) -> String {
        self.code.clone()
    }
}

/// Entries linking to the given entry.
#[derive(Debug, Clone)]
pub struct LinksToEntry(pub String);

impl QueryParameter for LinksToEntry {
    fn name(&self) -> &'static str {
        "links_to_entry"
    }

    fn key(&self) -> String {
        "links_to_entry".to_string()
    }

    fn value(&self) -> String {
        self.0.clone()
    }
}

/// Entries linking to the given asset.
#[derive(Debug, Clone)]
pub struct LinksToAsset(pub String);

impl QueryParameter for LinksToAsset {
    fn name(&self) -> &'static str {
        "links_to_asset"
    }

    fn key(&self) -> String {
        "links_to_asset".to_string()
    }

    fn value(&self) -> String {
        self.0.clone()
    }
}

/// Return only the listed fields.
#[derive(Debug, Clone)]
pub struct Select(pub Vec<String>);

impl QueryParameter for Select {
    fn name(&self) -> &'static str {
        "select"
    }

    fn key(&self) -> String {
        "select".to_string()
    }

    fn value(&self) -> String {
        self.0.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_operators_render_keys() {
        assert_eq!(NotEquals::new("fields.name", "x").key(), "fields.name[ne]");
        assert_eq!(In::new("sys.id", ["a", "b"]).value(), "a,b");
        assert_eq!(NotIn::new("sys.id", ["a"]).key(), "sys.id[nin]");
        assert_eq!(Exists::new("fields.image", false).value(), "false");
        assert_eq!(
            Compare::new("fields.lives", Comparison::GreaterThanOrEqual, "3").key(),
            "fields.lives[gte]"
        );
        assert_eq!(Order::new("sys.createdAt", true).value(), "-sys.createdAt");
    }

    #[test]
    fn relative_time_cache_key_ignores_clock() {
        let filter = RelativeTime::new(
            "sys.updatedAt",
            Comparison::GreaterThan,
            Duration::days(-1),
        );
        assert_eq!(
            filter.cache_key().as_deref(),
            Some("|relative_time|sys.updatedAt[gt]↦-86400s")
        );
        assert!(filter.value().contains('T'));
    }

    #[test]
    fn content_type_name_is_incomplete() {
        let filter = ContentTypeNameFilter::new("Cat");
        assert_eq!(
            filter.completion(),
            Some(Completion::ContentTypeName("Cat".to_string()))
        );
        assert!(ContentTypeFilter::new("cat").completion().is_none());
    }
}
