//! Schema index: per-object field and relationship maps.
//!
//! Built from describe metadata, consulted through an optional
//! [`SchemaCache`], and grown breadth-first around an object of interest.
//! Nothing here fails: a describe error leaves an empty entry, and an
//! expansion round that learns nothing simply ends the expansion.

use crate::cache::SchemaCache;
use crate::classify::{is_forbidden, CUSTOM_SUFFIX};
use crate::describe::{DescribeResult, FieldDescribe, ObjectDescriber};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// Identifiers readable on every object.
pub const ALWAYS_ALLOWED: &[&str] = &["Id", "Name"];

/// Suffix of custom relationship names.
const RELATIONSHIP_SUFFIX: &str = "__r";

// ============================================================================
// Entries
// ============================================================================

/// Everything known about one described object.
#[derive(Debug, Clone, Default)]
pub struct SchemaObjectEntry {
    /// Raw payload; `None` when the describe failed
    pub describe: Option<DescribeResult>,
    pub fields: HashMap<String, FieldDescribe>,
    /// Readable field names, always including `Id` and `Name`
    pub readable_fields: BTreeSet<String>,
    /// Relationship name → parent object
    pub parent_relationships: BTreeMap<String, String>,
    /// Relationship name → child object
    pub child_relationships: BTreeMap<String, String>,
}

impl SchemaObjectEntry {
    /// Entry for an object whose describe failed.
    pub fn empty() -> Self {
        Self {
            readable_fields: ALWAYS_ALLOWED.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn from_describe(describe: DescribeResult) -> Self {
        let mut entry = Self::empty();

        for field in &describe.fields {
            if field.is_readable() {
                entry.readable_fields.insert(field.name.clone());
            }

            if let (Some(relationship), Some(target)) =
                (field.relationship_name.as_deref(), field.reference_to.first())
            {
                entry
                    .parent_relationships
                    .insert(relationship.to_string(), target.clone());
                // Account__c is also reachable as Account__r
                if let Some(stem) = field.name.strip_suffix(CUSTOM_SUFFIX) {
                    entry
                        .parent_relationships
                        .entry(format!("{stem}{RELATIONSHIP_SUFFIX}"))
                        .or_insert_with(|| target.clone());
                }
            }

            entry.fields.insert(field.name.clone(), field.clone());
        }

        for child in &describe.child_relationships {
            if let Some(relationship) = child.relationship_name.as_deref() {
                entry
                    .child_relationships
                    .insert(relationship.to_string(), child.child_object.clone());
            }
        }

        entry.describe = Some(describe);
        entry
    }

    pub fn is_described(&self) -> bool {
        self.describe.is_some()
    }

    pub fn label(&self) -> Option<&str> {
        self.describe
            .as_ref()
            .map(|d| d.label.as_str())
            .filter(|l| !l.is_empty())
    }

    pub fn label_plural(&self) -> Option<&str> {
        self.describe
            .as_ref()
            .map(|d| d.label_plural.as_str())
            .filter(|l| !l.is_empty())
    }

    /// Parent and child neighbor object names, parents first.
    pub fn neighbors(&self) -> impl Iterator<Item = &String> {
        self.parent_relationships
            .values()
            .chain(self.child_relationships.values())
    }
}

// ============================================================================
// Index
// ============================================================================

/// Object canonical name → entry, for one org.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    pub org_id: String,
    objects: BTreeMap<String, SchemaObjectEntry>,
}

impl SchemaIndex {
    pub fn new(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            objects: BTreeMap::new(),
        }
    }

    pub fn get(&self, object: &str) -> Option<&SchemaObjectEntry> {
        self.objects.get(object)
    }

    pub fn contains(&self, object: &str) -> bool {
        self.objects.contains_key(object)
    }

    pub fn insert(&mut self, object: impl Into<String>, entry: SchemaObjectEntry) {
        self.objects.insert(object.into(), entry);
    }

    pub fn object_names(&self) -> impl Iterator<Item = &String> {
        self.objects.keys()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Where describes come from: the remote describer, an optional cache, and
/// the org the cache keys are scoped to.
pub struct SchemaSource<'a> {
    pub describer: &'a dyn ObjectDescriber,
    pub cache: Option<&'a dyn SchemaCache>,
    pub org_id: &'a str,
    /// Most objects described per expansion round
    pub batch_limit: usize,
}

impl<'a> SchemaSource<'a> {
    pub fn new(describer: &'a dyn ObjectDescriber, org_id: &'a str) -> Self {
        Self {
            describer,
            cache: None,
            org_id,
            batch_limit: usize::MAX,
        }
    }

    pub fn with_cache(mut self, cache: &'a dyn SchemaCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    async fn describe_entry(&self, object: &str) -> SchemaObjectEntry {
        if let Some(cache) = self.cache {
            if let Some(describe) = cache.get(self.org_id, object) {
                debug!("Describe cache hit for {}", object);
                return SchemaObjectEntry::from_describe(describe);
            }
        }

        match self.describer.describe(object).await {
            Ok(describe) => {
                if let Some(cache) = self.cache {
                    cache.set(self.org_id, object, describe.clone());
                }
                SchemaObjectEntry::from_describe(describe)
            }
            Err(e) => {
                warn!("Describe failed for {}, keeping empty entry: {}", object, e);
                SchemaObjectEntry::empty()
            }
        }
    }

    /// Describe `objects` concurrently and merge them into `index`.
    async fn describe_into(&self, index: &mut SchemaIndex, objects: &[String]) {
        let entries = join_all(objects.iter().map(|object| async move {
            (object.clone(), self.describe_entry(object).await)
        }))
        .await;

        for (object, entry) in entries {
            index.insert(object, entry);
        }
    }
}

/// Build an index for `object_names`. Forbidden names are skipped.
pub async fn build_index(source: &SchemaSource<'_>, object_names: &[String]) -> SchemaIndex {
    let mut index = SchemaIndex::new(source.org_id);
    extend_index(source, &mut index, object_names).await;
    index
}

/// Describe any of `object_names` not already in `index`.
pub async fn extend_index(
    source: &SchemaSource<'_>,
    index: &mut SchemaIndex,
    object_names: &[String],
) {
    let mut seen = HashSet::new();
    let wanted: Vec<String> = object_names
        .iter()
        .filter(|name| !is_forbidden(name) && !index.contains(name))
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect();

    if wanted.is_empty() {
        return;
    }
    debug!("Describing {} objects: {:?}", wanted.len(), wanted);
    source.describe_into(index, &wanted).await;
}

/// Grow `index` breadth-first from `start`, at most `max_depth` rounds.
///
/// Each round describes every unindexed, non-forbidden neighbor of the
/// current frontier (up to the source's batch limit) and makes the newly
/// described objects the next frontier.
pub async fn expand_index(
    source: &SchemaSource<'_>,
    mut index: SchemaIndex,
    start: &str,
    max_depth: usize,
) -> SchemaIndex {
    if is_forbidden(start) {
        return index;
    }
    if !index.contains(start) {
        extend_index(source, &mut index, &[start.to_string()]).await;
    }

    let mut frontier: Vec<String> = vec![start.to_string()];

    for depth in 0..max_depth {
        let mut next: Vec<String> = Vec::new();
        for object in &frontier {
            let Some(entry) = index.get(object) else {
                continue;
            };
            for neighbor in entry.neighbors() {
                if !index.contains(neighbor)
                    && !is_forbidden(neighbor)
                    && !next.contains(neighbor)
                {
                    next.push(neighbor.clone());
                }
            }
        }

        if next.is_empty() {
            debug!("Expansion from {} settled after {} rounds", start, depth);
            break;
        }
        if next.len() > source.batch_limit {
            debug!(
                "Expansion round {} truncated from {} to {} objects",
                depth + 1,
                next.len(),
                source.batch_limit
            );
            next.truncate(source.batch_limit);
        }

        source.describe_into(&mut index, &next).await;
        frontier = next;
    }

    index
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::InMemorySchemaCache;
    use crate::describe::ChildRelationship;
    use crate::error::{ResolverError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn field(name: &str, readable: bool) -> FieldDescribe {
        FieldDescribe {
            name: name.to_string(),
            label: name.trim_end_matches("__c").replace('_', " "),
            field_type: "string".to_string(),
            queryable: readable,
            ..Default::default()
        }
    }

    pub(crate) fn lookup(name: &str, relationship: &str, target: &str) -> FieldDescribe {
        FieldDescribe {
            name: name.to_string(),
            label: name.trim_end_matches("__c").trim_end_matches("Id").replace('_', " "),
            field_type: "reference".to_string(),
            queryable: true,
            reference_to: vec![target.to_string()],
            relationship_name: Some(relationship.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn child(child_object: &str, relationship: &str) -> ChildRelationship {
        ChildRelationship {
            child_object: child_object.to_string(),
            field: String::new(),
            relationship_name: Some(relationship.to_string()),
        }
    }

    /// Describer over a fixed map; unknown objects fail.
    pub(crate) struct MapDescriber {
        pub describes: HashMap<String, DescribeResult>,
        pub calls: AtomicUsize,
    }

    impl MapDescriber {
        pub(crate) fn new(describes: Vec<DescribeResult>) -> Self {
            Self {
                describes: describes.into_iter().map(|d| (d.name.clone(), d)).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ObjectDescriber for MapDescriber {
        async fn describe(&self, object_name: &str) -> Result<DescribeResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.describes
                .get(object_name)
                .cloned()
                .ok_or_else(|| ResolverError::Describe {
                    object: object_name.to_string(),
                    message: "simulated failure".to_string(),
                })
        }
    }

    fn item_describe() -> DescribeResult {
        DescribeResult {
            name: "demo__Item__c".to_string(),
            label: "Item".to_string(),
            label_plural: "Items".to_string(),
            fields: vec![
                field("Id", false),
                field("Name", true),
                field("demo__Sku__c", true),
                field("demo__Secret__c", false),
                lookup("demo__Lot__c", "demo__Lot__r", "demo__Lot__c"),
            ],
            child_relationships: vec![child("demo__Movement__c", "demo__Movements__r")],
        }
    }

    fn lot_describe() -> DescribeResult {
        DescribeResult {
            name: "demo__Lot__c".to_string(),
            label: "Lot".to_string(),
            label_plural: "Lots".to_string(),
            fields: vec![field("Name", true), lookup("OwnerId", "Owner", "User")],
            child_relationships: vec![child("demo__Item__c", "demo__Items__r")],
        }
    }

    #[test]
    fn test_entry_from_describe() {
        let entry = SchemaObjectEntry::from_describe(item_describe());

        assert!(entry.readable_fields.contains("demo__Sku__c"));
        assert!(!entry.readable_fields.contains("demo__Secret__c"));
        // always allowed even though the payload does not flag Id
        assert!(entry.readable_fields.contains("Id"));
        assert_eq!(entry.parent_relationships["demo__Lot__r"], "demo__Lot__c");
        assert_eq!(entry.child_relationships["demo__Movements__r"], "demo__Movement__c");
        assert_eq!(entry.label(), Some("Item"));
    }

    #[test]
    fn test_readable_fields_subset_of_fields() {
        let entry = SchemaObjectEntry::from_describe(item_describe());
        for name in &entry.readable_fields {
            assert!(entry.fields.contains_key(name) || ALWAYS_ALLOWED.contains(&name.as_str()));
        }
    }

    #[test]
    fn test_custom_lookup_registers_r_synonym() {
        let describe = DescribeResult {
            name: "Shipment__c".to_string(),
            fields: vec![lookup("Warehouse__c", "Warehouse_Ref__r", "Warehouse__c")],
            ..Default::default()
        };
        let entry = SchemaObjectEntry::from_describe(describe);
        assert_eq!(entry.parent_relationships["Warehouse_Ref__r"], "Warehouse__c");
        assert_eq!(entry.parent_relationships["Warehouse__r"], "Warehouse__c");
    }

    #[tokio::test]
    async fn test_build_index_records_failures_as_empty_entries() {
        let describer = MapDescriber::new(vec![item_describe()]);
        let source = SchemaSource::new(&describer, "00D1");
        let names = vec!["demo__Item__c".to_string(), "Missing__c".to_string()];
        let index = build_index(&source, &names).await;

        assert_eq!(index.len(), 2);
        assert!(index.get("demo__Item__c").unwrap().is_described());
        let missing = index.get("Missing__c").unwrap();
        assert!(!missing.is_described());
        assert!(missing.fields.is_empty());
        assert!(missing.parent_relationships.is_empty());
    }

    #[tokio::test]
    async fn test_build_index_skips_forbidden() {
        let describer = MapDescriber::new(vec![item_describe()]);
        let source = SchemaSource::new(&describer, "00D1");
        let names = vec!["ProcessInstance".to_string()];
        let index = build_index(&source, &names).await;
        assert!(index.is_empty());
        assert_eq!(describer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_short_circuits_describer() {
        let describer = MapDescriber::new(vec![item_describe()]);
        let cache = InMemorySchemaCache::default();
        let source = SchemaSource::new(&describer, "00D1").with_cache(&cache);
        let names = vec!["demo__Item__c".to_string()];

        build_index(&source, &names).await;
        build_index(&source, &names).await;

        assert_eq!(describer.calls.load(Ordering::SeqCst), 1);
        assert!(cache.get("00D1", "demo__Item__c").is_some());
    }

    #[tokio::test]
    async fn test_expand_one_level() {
        let describer = MapDescriber::new(vec![item_describe(), lot_describe()]);
        let source = SchemaSource::new(&describer, "00D1");
        let index = build_index(&source, &["demo__Item__c".to_string()]).await;

        let index = expand_index(&source, index, "demo__Item__c", 1).await;

        // parent described, child failed into an empty entry
        assert!(index.get("demo__Lot__c").unwrap().is_described());
        assert!(!index.get("demo__Movement__c").unwrap().is_described());
        // depth 1 stops before the Lot's own neighbors
        assert!(!index.contains("User"));
    }

    #[tokio::test]
    async fn test_expand_stops_when_nothing_new() {
        let describer = MapDescriber::new(vec![item_describe(), lot_describe()]);
        let source = SchemaSource::new(&describer, "00D1");
        let index = expand_index(&source, SchemaIndex::new("00D1"), "demo__Item__c", 10).await;

        // Item, Lot, Movement, then User from Lot's owner lookup
        assert_eq!(index.len(), 4);
        assert_eq!(describer.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_expand_respects_batch_limit() {
        let describer = MapDescriber::new(vec![item_describe(), lot_describe()]);
        let source = SchemaSource::new(&describer, "00D1").with_batch_limit(1);
        let index = expand_index(&source, SchemaIndex::new("00D1"), "demo__Item__c", 1).await;
        assert_eq!(index.len(), 2);
        assert!(index.contains("demo__Lot__c"));
    }
}
