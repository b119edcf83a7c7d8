//! Query parameters and the query types they attach to.
//!
//! Parameters are opaque key/value contributors: each adds one query-string
//! pair and one cache-key fragment. A parameter may instead decide its own
//! cache-key fragment, or declare itself incomplete until the client has
//! looked something up on its behalf.

pub mod filters;

use std::fmt;
use std::sync::Arc;

use crate::application::builder::Built;

pub use filters::{
    Comparison, Compare, ContentTypeFilter, ContentTypeNameFilter, Equals, Exists, FullText, In,
    Include, LinksToAsset, LinksToEntry, Limit, LocaleParam, NotEquals, NotIn, Order,
    RelativeTime, Select, Skip,
};

/// What an incomplete parameter needs before it can be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Needs the id of the content type with this name.
    ContentTypeName(String),
}

pub trait QueryParameter: Send + Sync + fmt::Debug {
    /// Parameter family; cache-key fragments are sorted by it first.
    fn name(&self) -> &'static str;
    fn key(&self) -> String;
    fn value(&self) -> String;

    /// Own cache-key fragment, for parameters whose value depends on the clock.
    fn cache_key(&self) -> Option<String> {
        None
    }

    /// `Some` while the parameter still needs to be completed.
    fn completion(&self) -> Option<Completion> {
        None
    }
}

pub type Parameter = Arc<dyn QueryParameter>;

/// Caller-supplied check a built response must pass to be accepted.
pub type Validator = Arc<dyn Fn(&Built) -> bool + Send + Sync>;

/// Kind of request, folded into the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Space,
    Entry,
    Entries,
    Asset,
    Assets,
    ContentType,
    ContentTypes,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Space => "space",
            QueryType::Entry => "entry",
            QueryType::Entries => "entries",
            QueryType::Asset => "asset",
            QueryType::Assets => "assets",
            QueryType::ContentType => "content_type",
            QueryType::ContentTypes => "content_types",
        }
    }

    /// Collection path below `/spaces/{key}`; `None` for the space itself.
    pub fn collection(self) -> Option<&'static str> {
        match self {
            QueryType::Space => None,
            QueryType::Entry | QueryType::Entries => Some("entries"),
            QueryType::Asset | QueryType::Assets => Some("assets"),
            QueryType::ContentType | QueryType::ContentTypes => Some("content_types"),
        }
    }

    pub fn is_collection(self) -> bool {
        matches!(
            self,
            QueryType::Entries | QueryType::Assets | QueryType::ContentTypes
        )
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of parameters plus an optional acceptance test.
#[derive(Clone, Default)]
pub struct Query {
    parameters: Vec<Parameter>,
    test: Option<Validator>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, parameter: impl QueryParameter + 'static) -> Self {
        self.parameters.push(Arc::new(parameter));
        self
    }

    pub fn push(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }

    /// Same acceptance test, no parameters.
    pub fn without_parameters(&self) -> Self {
        Self {
            parameters: Vec::new(),
            test: self.test.clone(),
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn has(&self, name: &str) -> bool {
        self.parameters.iter().any(|parameter| parameter.name() == name)
    }

    /// Accept a response only when `test` returns true for the built result.
    pub fn validate(mut self, test: impl Fn(&Built) -> bool + Send + Sync + 'static) -> Self {
        self.test = Some(Arc::new(test));
        self
    }

    pub fn test(&self) -> Option<&Validator> {
        self.test.as_ref()
    }

    pub fn content_type(self, id: impl Into<String>) -> Self {
        self.with(ContentTypeFilter::new(id))
    }

    pub fn content_type_name(self, name: impl Into<String>) -> Self {
        self.with(ContentTypeNameFilter::new(name))
    }

    pub fn equals(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(Equals::new(field, value))
    }

    pub fn limit(self, limit: u32) -> Self {
        self.with(Limit(limit))
    }

    pub fn skip(self, skip: u32) -> Self {
        self.with(Skip(skip))
    }

    pub fn order(self, field: impl Into<String>, reverse: bool) -> Self {
        self.with(Order::new(field, reverse))
    }

    pub fn include(self, level: u8) -> Self {
        self.with(Include(level))
    }

    pub fn locale(self, locale: impl Into<String>) -> Self {
        self.with(LocaleParam::new(locale))
    }

    /// Query-string pairs in insertion order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.parameters
            .iter()
            .map(|parameter| (parameter.key(), parameter.value()))
            .collect()
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("parameters", &self.parameters)
            .field("has_test", &self.test.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_follow_insertion_order() {
        let query = Query::new().content_type("cat").limit(10).skip(20);
        assert_eq!(
            query.query_pairs(),
            vec![
                ("content_type".to_string(), "cat".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("skip".to_string(), "20".to_string()),
            ]
        );
        assert!(query.has("limit"));
        assert!(!query.has("include"));
    }

    #[test]
    fn collection_paths() {
        assert_eq!(QueryType::Entry.collection(), Some("entries"));
        assert_eq!(QueryType::ContentTypes.collection(), Some("content_types"));
        assert_eq!(QueryType::Space.collection(), None);
        assert!(QueryType::Assets.is_collection());
        assert!(!QueryType::Asset.is_collection());
    }
}
