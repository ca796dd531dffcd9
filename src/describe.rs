//! Describe metadata: the remote schema description of one object.
//!
//! Payloads are loosely structured upstream; every member that may be absent
//! is either `Option` or defaulted here, so callers never rely on truthiness.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DescribeResult {
    pub name: String,
    pub label: String,
    pub label_plural: String,
    pub fields: Vec<FieldDescribe>,
    pub child_relationships: Vec<ChildRelationship>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldDescribe {
    pub name: String,
    pub label: String,
    /// Field type as reported upstream: string, reference, datetime, ...
    #[serde(rename = "type")]
    pub field_type: String,
    pub queryable: bool,
    pub updateable: bool,
    pub permissionable: bool,
    pub custom: bool,
    /// Target objects of a reference field
    pub reference_to: Vec<String>,
    pub relationship_name: Option<String>,
}

impl FieldDescribe {
    /// Flagged as readable by the describe payload.
    pub fn is_readable(&self) -> bool {
        self.queryable || self.updateable || self.permissionable
    }

    pub fn is_reference(&self) -> bool {
        self.field_type.eq_ignore_ascii_case("reference") || !self.reference_to.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChildRelationship {
    #[serde(alias = "childSObject")]
    pub child_object: String,
    /// Lookup field on the child pointing back at the parent
    pub field: String,
    pub relationship_name: Option<String>,
}

/// Describes one object remotely.
#[async_trait]
pub trait ObjectDescriber: Send + Sync {
    async fn describe(&self, object_name: &str) -> Result<DescribeResult>;
}
