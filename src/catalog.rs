//! Catalog index: normalized name variants → candidate descriptors.
//!
//! Built per resolution from the remote object list. Each surviving object is
//! registered under several lowercase variants (API name, label, plural label,
//! suffix-stripped name, label without spaces). Collisions between objects
//! are kept: two objects sharing a label both answer for it.

use crate::classify::{is_custom_name, is_forbidden, is_system_object, CUSTOM_SUFFIX};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

// ============================================================================
// Remote object list
// ============================================================================

/// One entry of the remote object list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub label_plural: String,
    #[serde(default)]
    pub custom: bool,
}

/// Lists every object visible to the org.
#[async_trait]
pub trait ObjectLister: Send + Sync {
    async fn list_objects(&self) -> Result<Vec<ObjectSummary>>;
}

// ============================================================================
// Index types
// ============================================================================

/// A catalog object as seen through one name variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescriptor {
    pub canonical_name: String,
    pub display_label: String,
    pub display_label_plural: String,
    pub is_custom_definition: bool,
    /// The variant key this descriptor was registered under
    pub matched_by_variant: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogOptions {
    pub include_system_objects: bool,
}

/// Lowercase variant → descriptors, in a stable key order.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    entries: BTreeMap<String, Vec<CandidateDescriptor>>,
    object_count: usize,
    /// Set when the remote object list could not be fetched
    listing_failed: bool,
}

impl CatalogIndex {
    /// Build from an already fetched object list.
    pub fn from_objects(objects: &[ObjectSummary], options: CatalogOptions) -> Self {
        let mut index = CatalogIndex::default();
        let mut skipped_forbidden = 0usize;
        let mut skipped_system = 0usize;

        for object in objects {
            if is_forbidden(&object.name) {
                skipped_forbidden += 1;
                continue;
            }
            if !options.include_system_objects && is_system_object(&object.name) {
                skipped_system += 1;
                continue;
            }
            index.register(object);
        }

        debug!(
            "Catalog built: {} objects, {} keys ({} forbidden, {} system skipped)",
            index.object_count,
            index.entries.len(),
            skipped_forbidden,
            skipped_system
        );
        index
    }

    fn register(&mut self, object: &ObjectSummary) {
        self.object_count += 1;
        let custom = object.custom || is_custom_name(&object.name);

        for variant in name_variants(object) {
            let bucket = self.entries.entry(variant.clone()).or_default();
            if bucket.iter().any(|d| d.canonical_name == object.name) {
                continue;
            }
            bucket.push(CandidateDescriptor {
                canonical_name: object.name.clone(),
                display_label: display_label(object),
                display_label_plural: object.label_plural.clone(),
                is_custom_definition: custom,
                matched_by_variant: variant,
            });
        }
    }

    /// Descriptors registered under `key` (already lowercase).
    pub fn get(&self, key: &str) -> &[CandidateDescriptor] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// All `(key, descriptors)` pairs in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Vec<CandidateDescriptor>)> {
        self.entries.iter()
    }

    /// Descriptors of the object whose lowercase canonical name is `name`.
    pub fn by_canonical(&self, name: &str) -> Option<&CandidateDescriptor> {
        self.get(&name.to_lowercase())
            .iter()
            .find(|d| d.canonical_name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of objects that survived classification.
    pub fn object_count(&self) -> usize {
        self.object_count
    }

    /// True if the index is empty because listing failed, not because every
    /// listed object was filtered out.
    pub fn listing_failed(&self) -> bool {
        self.listing_failed
    }
}

fn display_label(object: &ObjectSummary) -> String {
    if object.label.is_empty() {
        object.name.clone()
    } else {
        object.label.clone()
    }
}

/// Lowercase keys an object answers to, deduplicated, in registration order.
fn name_variants(object: &ObjectSummary) -> Vec<String> {
    let mut variants: Vec<String> = Vec::new();
    let mut push = |v: String| {
        let v = v.trim().to_string();
        if !v.is_empty() && !variants.contains(&v) {
            variants.push(v);
        }
    };

    let name = object.name.to_lowercase();
    push(name.clone());
    push(object.label.to_lowercase());
    push(object.label_plural.to_lowercase());

    if let Some(stem) = name.strip_suffix(CUSTOM_SUFFIX) {
        push(stem.to_string());
        // demo__item__c → item
        if let Some((_, local)) = stem.split_once("__") {
            push(local.to_string());
        }
    }

    push(
        object
            .label
            .split_whitespace()
            .collect::<String>()
            .to_lowercase(),
    );

    variants
}

/// Fetch the object list and index it.
///
/// A lister failure yields an empty index; resolution then reports that
/// nothing matched instead of failing the caller.
pub async fn build_catalog(lister: &dyn ObjectLister, options: CatalogOptions) -> CatalogIndex {
    match lister.list_objects().await {
        Ok(objects) => CatalogIndex::from_objects(&objects, options),
        Err(e) => {
            warn!("Object list unavailable, using empty catalog: {}", e);
            CatalogIndex {
                listing_failed: true,
                ..Default::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolverError;

    fn object(name: &str, label: &str, plural: &str, custom: bool) -> ObjectSummary {
        ObjectSummary {
            name: name.to_string(),
            label: label.to_string(),
            label_plural: plural.to_string(),
            custom,
        }
    }

    fn sample_objects() -> Vec<ObjectSummary> {
        vec![
            object("Account", "Account", "Accounts", false),
            object("demo__Item__c", "Item", "Items", true),
            object("Lot_Location__c", "Lot Location", "Lot Locations", true),
            object("AccountShare", "Account Share", "Account Share", false),
            object("FlowOrchestrationWorkItem", "Work Item", "Work Items", false),
        ]
    }

    struct FailingLister;

    #[async_trait]
    impl ObjectLister for FailingLister {
        async fn list_objects(&self) -> Result<Vec<ObjectSummary>> {
            Err(ResolverError::ObjectList("rate limited".to_string()))
        }
    }

    #[test]
    fn test_variants_registered() {
        let index = CatalogIndex::from_objects(&sample_objects(), CatalogOptions::default());

        assert_eq!(index.get("account")[0].canonical_name, "Account");
        assert_eq!(index.get("accounts")[0].canonical_name, "Account");
        assert_eq!(index.get("item")[0].canonical_name, "demo__Item__c");
        assert_eq!(index.get("items")[0].canonical_name, "demo__Item__c");
        assert_eq!(index.get("demo__item")[0].canonical_name, "demo__Item__c");
        assert_eq!(index.get("lotlocation")[0].canonical_name, "Lot_Location__c");
        assert_eq!(index.get("lot_location")[0].canonical_name, "Lot_Location__c");
        assert!(index.get("item")[0].is_custom_definition);
    }

    #[test]
    fn test_one_descriptor_per_key_and_object() {
        let index = CatalogIndex::from_objects(&sample_objects(), CatalogOptions::default());
        // name and label both lowercase to "account"
        assert_eq!(index.get("account").len(), 1);
    }

    #[test]
    fn test_label_collisions_are_kept() {
        let objects = vec![
            object("Asset", "Asset", "Assets", false),
            object("demo__Asset__c", "Asset", "Assets", true),
        ];
        let index = CatalogIndex::from_objects(&objects, CatalogOptions::default());
        let names: Vec<_> = index.get("asset").iter().map(|d| d.canonical_name.as_str()).collect();
        assert_eq!(names, vec!["Asset", "demo__Asset__c"]);
    }

    #[test]
    fn test_system_objects_excluded_by_default() {
        let index = CatalogIndex::from_objects(&sample_objects(), CatalogOptions::default());
        assert!(index.get("accountshare").is_empty());
        assert_eq!(index.object_count(), 3);

        let with_system = CatalogIndex::from_objects(
            &sample_objects(),
            CatalogOptions {
                include_system_objects: true,
            },
        );
        assert_eq!(with_system.get("accountshare")[0].canonical_name, "AccountShare");
    }

    #[test]
    fn test_forbidden_objects_never_indexed() {
        for include_system_objects in [false, true] {
            let index = CatalogIndex::from_objects(
                &sample_objects(),
                CatalogOptions {
                    include_system_objects,
                },
            );
            let leaked = index
                .entries()
                .flat_map(|(_, ds)| ds.iter())
                .any(|d| d.canonical_name == "FlowOrchestrationWorkItem");
            assert!(!leaked);
        }
    }

    #[tokio::test]
    async fn test_lister_failure_yields_empty_catalog() {
        let index = build_catalog(&FailingLister, CatalogOptions::default()).await;
        assert!(index.is_empty());
        assert_eq!(index.object_count(), 0);
        assert!(index.listing_failed());
    }

    #[test]
    fn test_filtered_out_catalog_is_not_a_listing_failure() {
        let objects = vec![
            object("AccountShare", "Account Share", "Account Share", false),
            object("FlowOrchestrationWorkItem", "Work Item", "Work Items", false),
        ];
        let index = CatalogIndex::from_objects(&objects, CatalogOptions::default());
        assert!(index.is_empty());
        assert!(!index.listing_failed());
    }
}
