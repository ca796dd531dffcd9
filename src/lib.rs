//! Object Resolver - natural-language entity resolution and schema-aware
//! query planning over dynamically described org metadata.
//!
//! A question flows through:
//! - [`resolver::EntityResolver`]: keywords → exact / partial / fuzzy catalog
//!   matches, re-ranked with org and user context
//! - [`schema`]: describe-backed index of fields and relationships, grown
//!   breadth-first behind an optional [`cache::SchemaCache`]
//! - [`planner::plan_path`]: bounded search for a better related object
//! - [`fields`]: allowed fields, default ordering, group-by lookup
//! - [`query_plan::QueryPlanner`]: all of the above composed into a plan
//!
//! Remote metadata is reached only through [`catalog::ObjectLister`] and
//! [`describe::ObjectDescriber`]. Queries are planned, never executed.

pub mod cache;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod describe;
pub mod error;
pub mod fields;
pub mod keywords;
pub mod planner;
pub mod query_plan;
pub mod rerank;
pub mod resolver;
pub mod schema;
pub mod similarity;
pub mod snapshot;

pub use cache::{InMemorySchemaCache, SchemaCache};
pub use catalog::{
    build_catalog, CandidateDescriptor, CatalogIndex, CatalogOptions, ObjectLister, ObjectSummary,
};
pub use classify::{is_forbidden, is_system_object};
pub use config::ResolverConfig;
pub use describe::{ChildRelationship, DescribeResult, FieldDescribe, ObjectDescriber};
pub use error::{ResolverError, Result};
pub use fields::{
    choose_order_by, filter_allowed_fields, is_field_allowed, pick_group_by_lookup, GroupByLookup,
};
pub use planner::{plan_path, HopType, PathHop, RelationshipPathResult};
pub use query_plan::{detect_intent, PlanOutcome, QueryIntent, QueryPlan, QueryPlanner};
pub use resolver::{
    EntityResolver, MatchCandidate, MatchType, OrgProfile, ResolutionResult, ResolveOptions,
    UserPreference,
};
pub use schema::{
    build_index, expand_index, extend_index, SchemaIndex, SchemaObjectEntry, SchemaSource,
};
pub use similarity::{edit_distance, similarity};
pub use snapshot::MetadataSnapshot;
