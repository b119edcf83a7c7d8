//! Per-space index of already-built resources.
//!
//! The envelope lets the builder hand out one shared instance per
//! `(id, locale)` and satisfy links without another fetch. Entries and
//! assets are indexed twice: under their locale and under a wildcard slot,
//! so a lookup without a locale hint still finds a single-locale resource.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::util::lock::{rw_read, rw_write};

use super::{
    asset::Asset, content_type::ContentType, entry::Entry, error::DomainError, resource::Resource,
};

const SOURCE: &str = "domain::envelope";

/// Resources keyed by id and locale, plus the wildcard slot.
#[derive(Debug)]
struct LocalizedIndex<T> {
    exact: HashMap<(String, String), Arc<T>>,
    /// Wildcard slot per id, remembering which locale filled it.
    wildcard: HashMap<String, (Option<String>, Arc<T>)>,
}

impl<T> Default for LocalizedIndex<T> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            wildcard: HashMap::new(),
        }
    }
}

impl<T> LocalizedIndex<T> {
    fn insert(&mut self, id: &str, locale: Option<&str>, item: Arc<T>) {
        if let Some(locale) = locale {
            self.exact
                .insert((id.to_string(), locale.to_string()), Arc::clone(&item));
        }

        // The wildcard keeps the first locale seen; re-inserting that locale refreshes it.
        let refresh = match self.wildcard.get(id) {
            None => true,
            Some((origin, _)) => origin.as_deref() == locale,
        };
        if refresh {
            self.wildcard
                .insert(id.to_string(), (locale.map(str::to_string), item));
        }
    }

    /// A localized lookup also accepts a resource indexed without a locale,
    /// since such a resource serves every locale.
    fn find(&self, id: &str, locale: Option<&str>) -> Option<Arc<T>> {
        match locale {
            Some(locale) => self
                .exact
                .get(&(id.to_string(), locale.to_string()))
                .or_else(|| match self.wildcard.get(id) {
                    Some((None, item)) => Some(item),
                    _ => None,
                })
                .cloned(),
            None => self.wildcard.get(id).map(|(_, item)| Arc::clone(item)),
        }
    }

    /// Number of distinct `(id, locale)` pairs.
    fn len(&self) -> usize {
        let unlocalized = self
            .wildcard
            .values()
            .filter(|(origin, _)| origin.is_none())
            .count();
        self.exact.len() + unlocalized
    }

    fn clear(&mut self) {
        self.exact.clear();
        self.wildcard.clear();
    }
}

#[derive(Debug, Default)]
struct EnvelopeIndex {
    entries: LocalizedIndex<Entry>,
    assets: LocalizedIndex<Asset>,
    content_types: HashMap<String, Arc<ContentType>>,
    content_type_ids_by_name: HashMap<String, String>,
    all_content_types: Option<Vec<Arc<ContentType>>>,
    in_flight: HashSet<(String, Option<String>)>,
}

/// Index of the resources built for one space.
#[derive(Debug)]
pub struct ResourceEnvelope {
    space: String,
    index: RwLock<EnvelopeIndex>,
}

impl ResourceEnvelope {
    pub fn new(space: impl Into<String>) -> Self {
        Self {
            space: space.into(),
            index: RwLock::new(EnvelopeIndex::default()),
        }
    }

    pub fn space(&self) -> &str {
        &self.space
    }

    pub fn find_entry(&self, id: &str, locale: Option<&str>) -> Option<Arc<Entry>> {
        rw_read(&self.index, SOURCE, "find_entry")
            .entries
            .find(id, locale)
    }

    pub fn has_entry(&self, id: &str, locale: Option<&str>) -> bool {
        self.find_entry(id, locale).is_some()
    }

    pub fn find_asset(&self, id: &str, locale: Option<&str>) -> Option<Arc<Asset>> {
        rw_read(&self.index, SOURCE, "find_asset")
            .assets
            .find(id, locale)
    }

    pub fn has_asset(&self, id: &str, locale: Option<&str>) -> bool {
        self.find_asset(id, locale).is_some()
    }

    pub fn find_content_type(&self, id: &str) -> Option<Arc<ContentType>> {
        rw_read(&self.index, SOURCE, "find_content_type")
            .content_types
            .get(id)
            .cloned()
    }

    pub fn has_content_type(&self, id: &str) -> bool {
        self.find_content_type(id).is_some()
    }

    /// Content types are assumed to have unique names; the first one indexed wins.
    pub fn find_content_type_by_name(&self, name: &str) -> Option<Arc<ContentType>> {
        let index = rw_read(&self.index, SOURCE, "find_content_type_by_name");
        index
            .content_type_ids_by_name
            .get(name)
            .and_then(|id| index.content_types.get(id))
            .cloned()
    }

    pub fn insert_entry(&self, entry: Arc<Entry>) {
        let id = entry.metadata.id.clone();
        let locale = entry.metadata.locale.clone();
        rw_write(&self.index, SOURCE, "insert_entry")
            .entries
            .insert(&id, locale.as_deref(), entry);
    }

    pub fn insert_asset(&self, asset: Arc<Asset>) {
        let id = asset.metadata.id.clone();
        let locale = asset.metadata.locale.clone();
        rw_write(&self.index, SOURCE, "insert_asset")
            .assets
            .insert(&id, locale.as_deref(), asset);
    }

    pub fn insert_content_type(&self, content_type: Arc<ContentType>) {
        let mut index = rw_write(&self.index, SOURCE, "insert_content_type");
        index
            .content_type_ids_by_name
            .entry(content_type.name.clone())
            .or_insert_with(|| content_type.metadata.id.clone());
        index
            .content_types
            .insert(content_type.metadata.id.clone(), content_type);
    }

    /// Index a built resource; arrays recurse, links and spaces are ignored.
    pub fn insert(&self, resource: &Resource) {
        match resource {
            Resource::Array(array) => {
                for item in &array.items {
                    self.insert(item);
                }
            }
            Resource::Entry(entry) => self.insert_entry(Arc::clone(entry)),
            Resource::Asset(asset) => self.insert_asset(Arc::clone(asset)),
            Resource::ContentType(content_type) => {
                self.insert_content_type(Arc::clone(content_type))
            }
            Resource::Link(_) | Resource::Space(_) => {}
        }
    }

    /// Remember a full content type listing so later lookups need no fetch.
    pub fn insert_all_content_types(&self, content_types: Vec<Arc<ContentType>>) {
        for content_type in &content_types {
            self.insert_content_type(Arc::clone(content_type));
        }
        rw_write(&self.index, SOURCE, "insert_all_content_types").all_content_types =
            Some(content_types);
    }

    pub fn all_content_types(&self) -> Option<Vec<Arc<ContentType>>> {
        rw_read(&self.index, SOURCE, "all_content_types")
            .all_content_types
            .clone()
    }

    /// Mark an entry as under construction; returns `false` if it already was.
    pub fn begin_entry(&self, id: &str, locale: Option<&str>) -> bool {
        rw_write(&self.index, SOURCE, "begin_entry")
            .in_flight
            .insert((id.to_string(), locale.map(str::to_string)))
    }

    pub fn finish_entry(&self, id: &str, locale: Option<&str>) {
        rw_write(&self.index, SOURCE, "finish_entry")
            .in_flight
            .remove(&(id.to_string(), locale.map(str::to_string)));
    }

    pub fn entry_count(&self) -> usize {
        rw_read(&self.index, SOURCE, "entry_count").entries.len()
    }

    pub fn asset_count(&self) -> usize {
        rw_read(&self.index, SOURCE, "asset_count").assets.len()
    }

    pub fn content_type_count(&self) -> usize {
        rw_read(&self.index, SOURCE, "content_type_count")
            .content_types
            .len()
    }

    pub fn clear(&self) {
        let mut index = rw_write(&self.index, SOURCE, "clear");
        index.entries.clear();
        index.assets.clear();
        index.content_types.clear();
        index.content_type_ids_by_name.clear();
        index.all_content_types = None;
        index.in_flight.clear();
    }
}

/// One envelope per configured space name.
#[derive(Debug, Default)]
pub struct EnvelopePool {
    envelopes: RwLock<HashMap<String, Arc<ResourceEnvelope>>>,
}

impl EnvelopePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_envelope_for_space(&self, space: &str) -> Result<Arc<ResourceEnvelope>, DomainError> {
        rw_read(&self.envelopes, SOURCE, "get_envelope_for_space")
            .get(space)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("envelope for space `{space}`")))
    }

    /// Register (or replace) the envelope used for `space`.
    pub fn register_envelope_for_space(&self, envelope: Arc<ResourceEnvelope>, space: &str) {
        rw_write(&self.envelopes, SOURCE, "register_envelope_for_space")
            .insert(space.to_string(), envelope);
    }

    pub fn insert_all_content_types_for_space(
        &self,
        content_types: Vec<Arc<ContentType>>,
        space: &str,
    ) -> Result<(), DomainError> {
        self.get_envelope_for_space(space)?
            .insert_all_content_types(content_types);
        Ok(())
    }

    pub fn get_all_content_types_for_space(
        &self,
        space: &str,
    ) -> Result<Option<Vec<Arc<ContentType>>>, DomainError> {
        Ok(self.get_envelope_for_space(space)?.all_content_types())
    }

    pub fn spaces(&self) -> Vec<String> {
        rw_read(&self.envelopes, SOURCE, "spaces")
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{
        content_type::{ContentTypeField, FieldType},
        link::Link,
        metadata::Metadata,
        types::ResourceKind,
    };

    fn entry(id: &str, locale: Option<&str>) -> Arc<Entry> {
        let mut metadata = Metadata::new(id, ResourceKind::Entry);
        metadata.locale = locale.map(str::to_string);
        Arc::new(Entry::new(metadata, BTreeMap::new()))
    }

    fn content_type(id: &str, name: &str) -> Arc<ContentType> {
        Arc::new(ContentType {
            metadata: Metadata::new(id, ResourceKind::ContentType),
            name: name.into(),
            description: None,
            fields: vec![ContentTypeField::new("title", "Title", FieldType::Symbol)],
            display_field: None,
        })
    }

    #[test]
    fn reinserting_same_key_overwrites() {
        let envelope = ResourceEnvelope::new("main");
        let first = entry("e1", Some("en-US"));
        let second = entry("e1", Some("en-US"));

        envelope.insert_entry(Arc::clone(&first));
        envelope.insert_entry(Arc::clone(&second));

        assert_eq!(envelope.entry_count(), 1);
        let found = envelope
            .find_entry("e1", Some("en-US"))
            .expect("entry indexed");
        assert!(Arc::ptr_eq(&found, &second));
        let wildcard = envelope.find_entry("e1", None).expect("wildcard slot");
        assert!(Arc::ptr_eq(&wildcard, &second));
    }

    #[test]
    fn wildcard_keeps_first_locale() {
        let envelope = ResourceEnvelope::new("main");
        let english = entry("e1", Some("en-US"));
        let german = entry("e1", Some("de-DE"));

        envelope.insert_entry(Arc::clone(&english));
        envelope.insert_entry(Arc::clone(&german));

        assert_eq!(envelope.entry_count(), 2);
        let wildcard = envelope.find_entry("e1", None).expect("wildcard slot");
        assert!(Arc::ptr_eq(&wildcard, &english));
        assert!(envelope.has_entry("e1", Some("de-DE")));
        assert!(!envelope.has_entry("e1", Some("fr-FR")));
    }

    #[test]
    fn unlocalized_entries_count_once() {
        let envelope = ResourceEnvelope::new("main");
        envelope.insert_entry(entry("e1", None));
        envelope.insert_entry(entry("e1", None));
        assert_eq!(envelope.entry_count(), 1);
        assert!(envelope.has_entry("e1", None));
    }

    #[test]
    fn unlocalized_entries_serve_any_locale() {
        let envelope = ResourceEnvelope::new("main");
        let shared = entry("e1", None);
        envelope.insert_entry(Arc::clone(&shared));

        let found = envelope.find_entry("e1", Some("en-US")).expect("wildcard match");
        assert!(Arc::ptr_eq(&found, &shared));

        let german = entry("e1", Some("de-DE"));
        envelope.insert_entry(Arc::clone(&german));
        let found = envelope.find_entry("e1", Some("de-DE")).expect("exact match");
        assert!(Arc::ptr_eq(&found, &german));
        let found = envelope.find_entry("e1", Some("fr-FR")).expect("wildcard match");
        assert!(Arc::ptr_eq(&found, &shared));
    }

    #[test]
    fn content_types_found_by_id_and_name() {
        let envelope = ResourceEnvelope::new("main");
        envelope.insert_content_type(content_type("cat", "Cat"));
        envelope.insert_content_type(content_type("dog", "Dog"));

        assert!(envelope.has_content_type("cat"));
        assert_eq!(
            envelope
                .find_content_type_by_name("Dog")
                .map(|ct| ct.metadata.id.clone()),
            Some("dog".to_string())
        );
        assert!(envelope.find_content_type_by_name("Bird").is_none());
    }

    #[test]
    fn polymorphic_insert_skips_links() {
        let envelope = ResourceEnvelope::new("main");
        envelope.insert(&Resource::Link(Arc::new(Link::to(
            ResourceKind::Entry,
            "e1",
            "main",
        ))));
        envelope.insert(&Resource::Entry(entry("e2", None)));
        assert!(!envelope.has_entry("e1", None));
        assert!(envelope.has_entry("e2", None));
    }

    #[test]
    fn all_content_types_are_remembered() {
        let envelope = ResourceEnvelope::new("main");
        assert!(envelope.all_content_types().is_none());
        envelope.insert_all_content_types(vec![content_type("cat", "Cat")]);
        assert_eq!(envelope.all_content_types().map(|all| all.len()), Some(1));
        assert!(envelope.has_content_type("cat"));
    }

    #[test]
    fn in_flight_marker_detects_reentry() {
        let envelope = ResourceEnvelope::new("main");
        assert!(envelope.begin_entry("e1", Some("en-US")));
        assert!(!envelope.begin_entry("e1", Some("en-US")));
        envelope.finish_entry("e1", Some("en-US"));
        assert!(envelope.begin_entry("e1", Some("en-US")));
    }

    #[test]
    fn pool_rejects_unknown_space() {
        let pool = EnvelopePool::new();
        let err = pool
            .get_envelope_for_space("missing")
            .expect_err("unregistered space");
        assert!(matches!(err, DomainError::NotFound { .. }));

        pool.register_envelope_for_space(Arc::new(ResourceEnvelope::new("main")), "main");
        let replacement = Arc::new(ResourceEnvelope::new("main"));
        pool.register_envelope_for_space(Arc::clone(&replacement), "main");
        let found = pool.get_envelope_for_space("main").expect("registered");
        assert!(Arc::ptr_eq(&found, &replacement));
    }
}
