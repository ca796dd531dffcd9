//! Offline metadata: an object list plus describes, loaded from JSON.
//!
//! Stands in for the remote listing and describe calls in the CLI and in
//! tests. Objects listed without a describe behave like a failed describe.

use crate::catalog::{ObjectLister, ObjectSummary};
use crate::describe::{DescribeResult, ObjectDescriber};
use crate::error::{ResolverError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetadataSnapshot {
    pub objects: Vec<ObjectSummary>,
    /// Canonical object name → describe payload
    pub describes: HashMap<String, DescribeResult>,
}

impl MetadataSnapshot {
    pub fn new(objects: Vec<ObjectSummary>, describes: Vec<DescribeResult>) -> Self {
        Self {
            objects,
            describes: describes.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }
}

#[async_trait]
impl ObjectLister for MetadataSnapshot {
    async fn list_objects(&self) -> Result<Vec<ObjectSummary>> {
        Ok(self.objects.clone())
    }
}

#[async_trait]
impl ObjectDescriber for MetadataSnapshot {
    async fn describe(&self, object_name: &str) -> Result<DescribeResult> {
        let mut describe = self
            .describes
            .get(object_name)
            .cloned()
            .ok_or_else(|| ResolverError::UnknownObject(object_name.to_string()))?;
        if describe.name.is_empty() {
            describe.name = object_name.to_string();
        }
        Ok(describe)
    }
}
