//! Query planning: resolution, schema discovery, pivoting and field
//! selection composed into one [`QueryPlan`].
//!
//! The plan is validated (every field passed [`filter_allowed_fields`]) but
//! never executed here.

use crate::cache::SchemaCache;
use crate::catalog::ObjectLister;
use crate::config::ResolverConfig;
use crate::describe::ObjectDescriber;
use crate::fields::{choose_order_by, filter_allowed_fields, pick_group_by_lookup, GroupByLookup};
use crate::planner::{plan_path, score_object, RelationshipPathResult};
use crate::resolver::{EntityResolver, OrgProfile, ResolutionResult, ResolveOptions};
use crate::schema::{expand_index, SchemaIndex, SchemaSource};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

lazy_static! {
    static ref RE_AGGREGATE: Regex = Regex::new(
        r"(?i)\b(how many|count|number of|total|sum|average|avg|group(ed)? by|breakdown|per)\b"
    )
    .unwrap();
    static ref RE_LIST_RELATED: Regex = Regex::new(
        r"(?i)\b(with (their|its|the) \w+|related|associated|linked|belonging to|for each)\b"
    )
    .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryIntent {
    /// Plain record listing
    List,
    /// Counts or totals, usually grouped
    Aggregate,
    /// Records of an object related to the one named
    ListRelated,
}

/// Classify what kind of query the question asks for.
pub fn detect_intent(question: &str) -> QueryIntent {
    if RE_AGGREGATE.is_match(question) {
        QueryIntent::Aggregate
    } else if RE_LIST_RELATED.is_match(question) {
        QueryIntent::ListRelated
    } else {
        QueryIntent::List
    }
}

/// A validated query plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub intent: QueryIntent,
    pub object: String,
    pub fields: Vec<String>,
    pub order_by: String,
    pub order_descending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<GroupByLookup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_path: Option<RelationshipPathResult>,
    pub limit: usize,
}

impl QueryPlan {
    /// Render as a SOQL-style statement.
    pub fn to_query_string(&self) -> String {
        if let Some(group) = &self.group_by {
            return format!(
                "SELECT {field}, COUNT(Id) FROM {object} GROUP BY {field} \
                 ORDER BY COUNT(Id) DESC LIMIT {limit}",
                field = group.display_field,
                object = self.object,
                limit = self.limit
            );
        }
        let direction = if self.order_descending { "DESC" } else { "ASC" };
        format!(
            "SELECT {} FROM {} ORDER BY {} {} LIMIT {}",
            self.fields.join(", "),
            self.object,
            self.order_by,
            direction,
            self.limit
        )
    }
}

/// Resolution plus the plan built from it, if any object was resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutcome {
    pub resolution: ResolutionResult,
    pub plan: Option<QueryPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

pub struct QueryPlanner<'a> {
    config: &'a ResolverConfig,
    lister: &'a dyn ObjectLister,
    describer: &'a dyn ObjectDescriber,
    cache: Option<&'a dyn SchemaCache>,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(
        config: &'a ResolverConfig,
        lister: &'a dyn ObjectLister,
        describer: &'a dyn ObjectDescriber,
    ) -> Self {
        Self {
            config,
            lister,
            describer,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a dyn SchemaCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Resolve `question` and, when an object is found, plan a query on it.
    ///
    /// A plan is produced even when the resolution asks for clarification;
    /// the caller decides whether to confirm first.
    pub async fn plan(
        &self,
        question: &str,
        org: &OrgProfile,
        options: &ResolveOptions,
    ) -> PlanOutcome {
        let resolution = EntityResolver::new(self.config)
            .resolve(question, self.lister, org, options)
            .await;

        let Some(primary) = resolution.primary_match.as_ref() else {
            return PlanOutcome {
                resolution,
                plan: None,
                query: None,
            };
        };
        let primary = primary.canonical_name().to_string();
        let intent = detect_intent(question);
        debug!("Planning {:?} query on {}", intent, primary);

        let schema = &self.config.schema;
        let mut source = SchemaSource::new(self.describer, &org.org_id)
            .with_batch_limit(schema.expansion_batch_limit);
        if let Some(cache) = self.cache {
            source = source.with_cache(cache);
        }
        let depth = match intent {
            QueryIntent::List => 0,
            _ => schema.expansion_depth,
        };
        let seed = SchemaIndex::new(org.org_id.as_str());
        let index = expand_index(&source, seed, &primary, depth).await;

        let plan = self.build_plan(&index, &primary, intent, &resolution.keywords);
        let query = plan.to_query_string();
        info!("Planned query: {}", query);

        PlanOutcome {
            resolution,
            plan: Some(plan),
            query: Some(query),
        }
    }

    /// Pure planning step over an already expanded index.
    pub fn build_plan(
        &self,
        index: &SchemaIndex,
        primary: &str,
        intent: QueryIntent,
        keywords: &[String],
    ) -> QueryPlan {
        let schema = &self.config.schema;
        let planning = &self.config.planning;

        let mut object = primary.to_string();
        let mut relationship_path = None;

        if intent != QueryIntent::List {
            let own_score = score_object(index, primary, keywords);
            if let Some(path) = plan_path(index, primary, keywords, schema.max_path_depth) {
                if path.object_name != primary && path.score > own_score {
                    debug!(
                        "Pivoting from {} to {} via {} hops",
                        primary, path.object_name, path.depth
                    );
                    object = path.object_name.clone();
                    relationship_path = Some(path);
                }
            }
        }

        let group_by = match intent {
            QueryIntent::Aggregate => pick_group_by_lookup(index, &object, keywords),
            _ => None,
        };

        let mut requested: Vec<String> = vec!["Id".to_string(), "Name".to_string()];
        if let Some(entry) = index.get(&object) {
            let extra = entry
                .readable_fields
                .iter()
                .filter(|name| {
                    let label = entry
                        .fields
                        .get(*name)
                        .map(|f| f.label.to_lowercase())
                        .unwrap_or_default();
                    let lower = name.to_lowercase();
                    keywords
                        .iter()
                        .any(|kw| lower.contains(kw.as_str()) || label.contains(kw.as_str()))
                })
                .take(planning.max_fields.saturating_sub(requested.len()));
            requested.extend(extra.cloned());
        }
        if let Some(group) = &group_by {
            requested.push(group.display_field.clone());
        }

        let fields = filter_allowed_fields(index, &object, &requested);
        let order_by = choose_order_by(index, &object);

        QueryPlan {
            intent,
            object,
            fields,
            order_by,
            order_descending: true,
            group_by,
            relationship_path,
            limit: planning.default_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::DescribeResult;
    use crate::schema::tests::{child, field, lookup};
    use crate::schema::SchemaObjectEntry;

    #[test]
    fn test_detect_intent() {
        assert_eq!(detect_intent("how many items per location"), QueryIntent::Aggregate);
        assert_eq!(detect_intent("count open cases"), QueryIntent::Aggregate);
        assert_eq!(detect_intent("accounts with their contacts"), QueryIntent::ListRelated);
        assert_eq!(detect_intent("show me items"), QueryIntent::List);
    }

    fn index() -> SchemaIndex {
        let mut index = SchemaIndex::new("00D1");
        index.insert(
            "demo__Item__c",
            SchemaObjectEntry::from_describe(DescribeResult {
                name: "demo__Item__c".to_string(),
                label: "Item".to_string(),
                label_plural: "Items".to_string(),
                fields: vec![
                    field("Name", true),
                    field("CreatedDate", true),
                    field("demo__Sku__c", true),
                ],
                child_relationships: vec![child("demo__Stock__c", "demo__Stocks__r")],
            }),
        );
        index.insert(
            "demo__Stock__c",
            SchemaObjectEntry::from_describe(DescribeResult {
                name: "demo__Stock__c".to_string(),
                label: "Stock".to_string(),
                label_plural: "Stocks".to_string(),
                fields: vec![
                    field("Name", true),
                    field("demo__Quantity__c", true),
                    lookup("demo__Item__c", "demo__Item__r", "demo__Item__c"),
                    lookup("demo__Warehouse__c", "demo__Warehouse__r", "demo__Warehouse__c"),
                ],
                ..Default::default()
            }),
        );
        index
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    struct NoLister;

    #[async_trait::async_trait]
    impl ObjectLister for NoLister {
        async fn list_objects(&self) -> crate::error::Result<Vec<crate::catalog::ObjectSummary>> {
            Ok(Vec::new())
        }
    }

    struct NoDescriber;

    #[async_trait::async_trait]
    impl ObjectDescriber for NoDescriber {
        async fn describe(&self, object_name: &str) -> crate::error::Result<DescribeResult> {
            Err(crate::error::ResolverError::UnknownObject(object_name.to_string()))
        }
    }

    #[test]
    fn test_list_plan_on_primary() {
        let config = ResolverConfig::default();
        let planner = QueryPlanner::new(&config, &NoLister, &NoDescriber);
        let keywords = keywords(&["item", "sku"]);
        let plan = planner.build_plan(&index(), "demo__Item__c", QueryIntent::List, &keywords);

        assert_eq!(plan.object, "demo__Item__c");
        assert_eq!(plan.fields, vec!["Id", "Name", "demo__Sku__c"]);
        assert_eq!(plan.order_by, "CreatedDate");
        assert!(plan.relationship_path.is_none());
        assert_eq!(
            plan.to_query_string(),
            "SELECT Id, Name, demo__Sku__c FROM demo__Item__c ORDER BY CreatedDate DESC LIMIT 200"
        );
    }

    #[test]
    fn test_aggregate_plan_pivots_and_groups() {
        let config = ResolverConfig::default();
        let planner = QueryPlanner::new(&config, &NoLister, &NoDescriber);
        let plan = planner.build_plan(
            &index(),
            "demo__Item__c",
            QueryIntent::Aggregate,
            &keywords(&["stock", "warehouse"]),
        );

        assert_eq!(plan.object, "demo__Stock__c");
        assert_eq!(plan.relationship_path.as_ref().unwrap().depth, 1);
        let group = plan.group_by.as_ref().unwrap();
        assert_eq!(group.field, "demo__Warehouse__c");
        assert!(plan.fields.contains(&"demo__Warehouse__r.Name".to_string()));
        assert_eq!(plan.order_by, "Id");
        assert_eq!(
            plan.to_query_string(),
            concat!(
                "SELECT demo__Warehouse__r.Name, COUNT(Id) FROM demo__Stock__c ",
                "GROUP BY demo__Warehouse__r.Name ORDER BY COUNT(Id) DESC LIMIT 200"
            )
        );
    }

    #[tokio::test]
    async fn test_no_catalog_means_no_plan() {
        let config = ResolverConfig::default();
        let planner = QueryPlanner::new(&config, &NoLister, &NoDescriber);
        let outcome = planner
            .plan("show me items", &OrgProfile::default(), &ResolveOptions::default())
            .await;
        assert!(!outcome.resolution.success);
        assert!(outcome.plan.is_none());
        assert!(outcome.query.is_none());
    }
}
