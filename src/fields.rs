//! Field and filter selection against the schema index.
//!
//! [`filter_allowed_fields`] is the last check before a field name lands in a
//! generated query: anything not readable, not registered, or reaching a
//! forbidden object is dropped.

use crate::classify::{is_forbidden, CUSTOM_SUFFIX};
use crate::schema::{SchemaIndex, ALWAYS_ALLOWED};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Preferred default ordering fields, in order.
const ORDER_BY_PREFERENCE: &[&str] = &["CreatedDate", "LastModifiedDate", "SystemModstamp"];

/// Administrative lookups never used as a grouping dimension.
pub const SKIPPED_LOOKUPS: &[&str] = &[
    "OwnerId",
    "CreatedById",
    "LastModifiedById",
    "RecordTypeId",
];

const SUBSTRING_HIT: f64 = 3.0;
const WORD_HIT: f64 = 4.0;
const TARGET_HIT: f64 = 2.0;

/// Names at or above this length get no brevity bonus.
const BREVITY_BASELINE: usize = 40;
const BREVITY_WEIGHT: f64 = 0.01;

/// True if `field` may be selected on `object`.
///
/// `rel.Name` needs a registered parent relationship to a non-forbidden
/// object; plain names must be readable or one of `Id`/`Name`.
pub fn is_field_allowed(index: &SchemaIndex, object: &str, field: &str) -> bool {
    if is_forbidden(object) {
        return false;
    }
    let entry = index.get(object);

    if let Some((relationship, terminal)) = field.split_once('.') {
        if terminal != "Name" {
            return false;
        }
        return entry
            .and_then(|e| e.parent_relationships.get(relationship))
            .is_some_and(|target| !is_forbidden(target));
    }

    if ALWAYS_ALLOWED.contains(&field) {
        return true;
    }
    entry.is_some_and(|e| e.readable_fields.contains(field))
}

/// Order-preserving, deduplicated subset of `fields` that passes [`is_field_allowed`].
pub fn filter_allowed_fields<S: AsRef<str>>(
    index: &SchemaIndex,
    object: &str,
    fields: &[S],
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dropped = Vec::new();
    let mut allowed = Vec::new();

    for field in fields.iter().map(AsRef::as_ref) {
        if !seen.insert(field) {
            continue;
        }
        if is_field_allowed(index, object, field) {
            allowed.push(field.to_string());
        } else {
            dropped.push(field);
        }
    }

    if !dropped.is_empty() {
        debug!("Dropped fields not allowed on {}: {:?}", object, dropped);
    }
    allowed
}

/// Default ordering field for `object`, falling back to `Id`.
pub fn choose_order_by(index: &SchemaIndex, object: &str) -> String {
    ORDER_BY_PREFERENCE
        .iter()
        .find(|f| is_field_allowed(index, object, f))
        .unwrap_or(&"Id")
        .to_string()
}

/// A lookup field chosen as the grouping dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupByLookup {
    /// Raw reference field, e.g. `demo__Lot__c`
    pub field: String,
    pub relationship_name: String,
    /// `relationship.Name`, the field to display and group on
    pub display_field: String,
    pub target_object: String,
    pub score: f64,
}

/// Best lookup on `object` to group by, given lowercase `keywords`.
///
/// `None` is an expected outcome: no lookup scored, or the best one is not
/// selectable.
pub fn pick_group_by_lookup(
    index: &SchemaIndex,
    object: &str,
    keywords: &[String],
) -> Option<GroupByLookup> {
    let entry = index.get(object)?;
    if is_forbidden(object) || keywords.is_empty() {
        return None;
    }

    let word_patterns: Vec<Option<Regex>> = keywords
        .iter()
        .map(|kw| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw))).ok())
        .collect();

    let mut best: Option<GroupByLookup> = None;

    // sorted for a deterministic winner among equal scores
    let mut names: Vec<&String> = entry.fields.keys().collect();
    names.sort();

    for name in names {
        let field = &entry.fields[name];
        if !field.is_reference() || SKIPPED_LOOKUPS.contains(&name.as_str()) {
            continue;
        }
        let (Some(relationship), Some(target)) =
            (field.relationship_name.as_deref(), field.reference_to.first())
        else {
            continue;
        };
        if is_forbidden(target) {
            continue;
        }

        let haystack = format!("{} {} {}", name, field.label, relationship).to_lowercase();
        let words = haystack.replace('_', " ");
        let lower_target = target.to_lowercase();
        let target_stem = lower_target.strip_suffix(CUSTOM_SUFFIX).unwrap_or(&lower_target);

        let mut score = 0.0;
        for (kw, word_re) in keywords.iter().zip(word_patterns.iter()) {
            if haystack.contains(kw.as_str()) {
                score += SUBSTRING_HIT;
            }
            if word_re.as_ref().is_some_and(|re| re.is_match(&words)) {
                score += WORD_HIT;
            }
            if lower_target == kw.as_str() || target_stem == kw.as_str() {
                score += TARGET_HIT;
            }
        }
        if score <= 0.0 {
            continue;
        }
        score += BREVITY_BASELINE.saturating_sub(name.len()) as f64 * BREVITY_WEIGHT;

        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(GroupByLookup {
                field: name.clone(),
                relationship_name: relationship.to_string(),
                display_field: format!("{relationship}.Name"),
                target_object: target.clone(),
                score,
            });
        }
    }

    best.filter(|b| is_field_allowed(index, object, &b.field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::DescribeResult;
    use crate::schema::tests::{field, lookup};
    use crate::schema::SchemaObjectEntry;

    fn movement_index() -> SchemaIndex {
        let mut secret_lookup = lookup("demo__Auditor__c", "demo__Auditor__r", "demo__Auditor__c");
        secret_lookup.queryable = false;

        let describe = DescribeResult {
            name: "demo__Movement__c".to_string(),
            label: "Movement".to_string(),
            label_plural: "Movements".to_string(),
            fields: vec![
                field("Name", true),
                field("CreatedDate", true),
                field("demo__Quantity__c", true),
                field("demo__Cost__c", false),
                lookup("demo__Item__c", "demo__Item__r", "demo__Item__c"),
                lookup("demo__Lot_Location__c", "demo__Lot_Location__r", "demo__Lot_Location__c"),
                lookup("OwnerId", "Owner", "User"),
                lookup("CreatedById", "CreatedBy", "User"),
                lookup("demo__Approval__c", "demo__Approval__r", "ProcessInstance"),
                secret_lookup,
            ],
            ..Default::default()
        };
        let mut index = SchemaIndex::new("00D1");
        index.insert("demo__Movement__c", SchemaObjectEntry::from_describe(describe));
        index
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_simple_fields() {
        let index = movement_index();
        let object = "demo__Movement__c";
        assert!(is_field_allowed(&index, object, "Id"));
        assert!(is_field_allowed(&index, object, "demo__Quantity__c"));
        assert!(!is_field_allowed(&index, object, "demo__Cost__c"));
        assert!(!is_field_allowed(&index, object, "Nonexistent__c"));
    }

    #[test]
    fn test_relationship_fields() {
        let index = movement_index();
        let object = "demo__Movement__c";
        assert!(is_field_allowed(&index, object, "demo__Item__r.Name"));
        assert!(!is_field_allowed(&index, object, "demo__Item__r.demo__Sku__c"));
        assert!(!is_field_allowed(&index, object, "Unknown__r.Name"));
        // registered, but the target is forbidden
        assert!(!is_field_allowed(&index, object, "demo__Approval__r.Name"));
    }

    #[test]
    fn test_unindexed_and_forbidden_objects() {
        let index = movement_index();
        assert!(is_field_allowed(&index, "Unindexed__c", "Name"));
        assert!(!is_field_allowed(&index, "Unindexed__c", "Status__c"));
        assert!(!is_field_allowed(&index, "ProcessInstance", "Id"));
    }

    #[test]
    fn test_filter_is_ordered_subset() {
        let index = movement_index();
        let requested = [
            "Name",
            "demo__Cost__c",
            "demo__Quantity__c",
            "Name",
            "demo__Item__r.Name",
            "Bogus.Field",
        ];
        let allowed = filter_allowed_fields(&index, "demo__Movement__c", &requested);
        assert_eq!(allowed, vec!["Name", "demo__Quantity__c", "demo__Item__r.Name"]);
        for f in &allowed {
            assert!(requested.contains(&f.as_str()));
            assert!(is_field_allowed(&index, "demo__Movement__c", f));
        }
    }

    #[test]
    fn test_order_by_preference() {
        let index = movement_index();
        assert_eq!(choose_order_by(&index, "demo__Movement__c"), "CreatedDate");
        assert_eq!(choose_order_by(&index, "Unindexed__c"), "Id");
    }

    #[test]
    fn test_group_by_prefers_keyword_lookup() {
        let index = movement_index();
        let pick =
            pick_group_by_lookup(&index, "demo__Movement__c", &keywords(&["location"])).unwrap();
        assert_eq!(pick.field, "demo__Lot_Location__c");
        assert_eq!(pick.display_field, "demo__Lot_Location__r.Name");
        assert_eq!(pick.target_object, "demo__Lot_Location__c");
    }

    #[test]
    fn test_group_by_never_picks_admin_lookups() {
        let index = movement_index();
        for words in [&["owner"][..], &["created"], &["user"], &["approval"]] {
            let pick = pick_group_by_lookup(&index, "demo__Movement__c", &keywords(words));
            if let Some(p) = pick {
                assert!(!SKIPPED_LOOKUPS.contains(&p.field.as_str()));
                assert!(!is_forbidden(&p.target_object));
            }
        }
    }

    #[test]
    fn test_group_by_none_when_nothing_scores() {
        let index = movement_index();
        let region = pick_group_by_lookup(&index, "demo__Movement__c", &keywords(&["region"]));
        assert!(region.is_none());
        assert!(pick_group_by_lookup(&index, "Unindexed__c", &keywords(&["item"])).is_none());
    }

    #[test]
    fn test_group_by_requires_readable_field() {
        let index = movement_index();
        let auditor = pick_group_by_lookup(&index, "demo__Movement__c", &keywords(&["auditor"]));
        assert!(auditor.is_none());
    }
}
