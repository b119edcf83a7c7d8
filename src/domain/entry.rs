//! Entries and lazy resolution of their link-valued fields.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use futures::future::join_all;
use serde_json::Value as Json;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::util::lock::mutex_lock;

use super::{
    content_type::ContentType,
    fields::{DynamicEntry, Value, untyped},
    link::{Link, LinkResolver},
    metadata::Metadata,
    resource::Resource,
};

const SOURCE: &str = "domain::entry";

/// A field as stored by the builder, before link resolution.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Json(Json),
    Link(Arc<Link>),
    Resource(Resource),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn is_link(&self) -> bool {
        matches!(self, FieldValue::Link(_))
    }

    fn has_link(&self) -> bool {
        match self {
            FieldValue::Link(_) => true,
            FieldValue::List(items) => items.iter().any(FieldValue::is_link),
            _ => false,
        }
    }
}

impl From<Resource> for FieldValue {
    fn from(resource: Resource) -> Self {
        match resource {
            Resource::Link(link) => FieldValue::Link(link),
            other => FieldValue::Resource(other),
        }
    }
}

/// Outcome of a field resolution as kept by the entry.
///
/// Resolved entries are held weakly: two entries linking to each other
/// would otherwise keep one another alive after the envelope lets go.
#[derive(Debug)]
enum Resolved {
    Entry(Weak<Entry>),
    List(Vec<Resolved>),
    Value(Value),
}

impl Resolved {
    fn hold(value: &Value) -> Self {
        match value {
            Value::Resource(Resource::Entry(entry)) => Resolved::Entry(Arc::downgrade(entry)),
            Value::List(items) => Resolved::List(items.iter().map(Resolved::hold).collect()),
            other => Resolved::Value(other.clone()),
        }
    }

    /// The kept value, or `None` once a resolved entry has been dropped.
    fn revive(&self) -> Option<Value> {
        match self {
            Resolved::Entry(entry) => entry
                .upgrade()
                .map(|entry| Value::Resource(Resource::Entry(entry))),
            Resolved::List(items) => items
                .iter()
                .map(Resolved::revive)
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            Resolved::Value(value) => Some(value.clone()),
        }
    }
}

type Memo = Arc<OnceCell<Option<Resolved>>>;

pub struct Entry {
    pub metadata: Metadata,
    fields: BTreeMap<String, FieldValue>,
    schema: Option<Arc<ContentType>>,
    resolver: Option<Arc<dyn LinkResolver>>,
    resolved: Mutex<HashMap<String, Memo>>,
}

impl Entry {
    pub fn new(metadata: Metadata, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            metadata,
            fields,
            schema: None,
            resolver: None,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn LinkResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Attach a content type so field reads are coerced by declared type.
    pub fn with_schema(mut self, content_type: Arc<ContentType>) -> Self {
        self.schema = Some(content_type);
        self
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn locale(&self) -> Option<&str> {
        self.metadata.locale.as_deref()
    }

    pub fn content_type_id(&self) -> Option<&str> {
        self.metadata.content_type_id()
    }

    pub fn schema(&self) -> Option<&Arc<ContentType>> {
        self.schema.as_ref()
    }

    /// Typed view of this entry, when it was built with a schema.
    pub fn dynamic(&self) -> Option<DynamicEntry<'_>> {
        self.schema
            .as_deref()
            .map(|content_type| DynamicEntry::new(self, content_type))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// The stored value, with links left unresolved.
    pub fn raw_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Resolved value of a field.
    ///
    /// Links are resolved through the attached resolver on first access and
    /// the outcome is kept, so the resolver runs once per field while the
    /// resolved targets are alive. Resolved entries are not kept alive by
    /// this entry; once dropped, the next read resolves them again. A link
    /// that cannot be resolved reads as `None`; unresolvable items of a
    /// list are dropped.
    pub async fn field(&self, name: &str) -> Option<Value> {
        let stored = self.fields.get(name)?;
        if !stored.has_link() {
            return Some(self.present(name, stored));
        }

        let memo = {
            let mut resolved = mutex_lock(&self.resolved, SOURCE, "field");
            Arc::clone(resolved.entry(name.to_string()).or_default())
        };
        let mut fresh = None;
        let slot = &mut fresh;
        let kept = memo
            .get_or_init(move || async move {
                let value = self.resolve_field(name, stored).await;
                let kept = value.as_ref().map(Resolved::hold);
                *slot = Some(value);
                kept
            })
            .await;
        if let Some(value) = fresh {
            return value;
        }

        match kept.as_ref()?.revive() {
            Some(value) => Some(value),
            None => {
                debug!(
                    entry_id = %self.metadata.id,
                    field = name,
                    "resolved target was dropped; resolving again"
                );
                self.resolve_field(name, stored).await
            }
        }
    }

    async fn resolve_field(&self, name: &str, stored: &FieldValue) -> Option<Value> {
        match stored {
            FieldValue::Link(link) => self.resolve_link(link).await,
            FieldValue::List(items) => {
                let resolved = join_all(items.iter().map(|item| async move {
                    match item {
                        FieldValue::Link(link) => self.resolve_link(link).await,
                        other => Some(untyped(other)),
                    }
                }))
                .await;
                Some(Value::List(resolved.into_iter().flatten().collect()))
            }
            other => Some(self.present(name, other)),
        }
    }

    async fn resolve_link(&self, link: &Arc<Link>) -> Option<Value> {
        let Some(resolver) = self.resolver.as_ref() else {
            return Some(Value::Link(Arc::clone(link)));
        };

        match resolver.resolve_link(link, self.locale()).await {
            Ok(resource) => Some(Value::Resource(resource)),
            Err(err) => {
                debug!(
                    entry_id = %self.metadata.id,
                    link_id = %link.id(),
                    link_type = %link.link_type(),
                    error = %err,
                    "link could not be resolved; treating as unpublished"
                );
                None
            }
        }
    }

    fn present(&self, name: &str, stored: &FieldValue) -> Value {
        match self.dynamic() {
            Some(dynamic) => dynamic.coerce(name, stored),
            None => untyped(stored),
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("metadata", &self.metadata)
            .field("fields", &self.fields)
            .field(
                "schema",
                &self.schema.as_ref().map(|content_type| content_type.id()),
            )
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}
