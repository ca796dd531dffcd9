//! Describe cache keyed by `(org id, object name)` with a TTL.
//!
//! Writers overwrite wholesale; readers treat expired entries as misses.
//! Entries are independent, so last-writer-wins is all the coordination
//! needed.

use crate::describe::DescribeResult;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Injectable describe cache.
pub trait SchemaCache: Send + Sync {
    fn get(&self, org_id: &str, object_name: &str) -> Option<DescribeResult>;
    fn set(&self, org_id: &str, object_name: &str, describe: DescribeResult);
    fn ttl(&self) -> Duration;
}

struct CachedDescribe {
    stored_at: DateTime<Utc>,
    describe: DescribeResult,
}

/// Process-local [`SchemaCache`].
pub struct InMemorySchemaCache {
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), CachedDescribe>>,
}

impl InMemorySchemaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_ttl_minutes(minutes: i64) -> Self {
        Self::new(Duration::minutes(minutes))
    }

    fn is_expired(&self, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - stored_at >= self.ttl
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, cached| !self.is_expired(cached.stored_at, now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Purged {} expired describe entries", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySchemaCache {
    fn default() -> Self {
        Self::with_ttl_minutes(10)
    }
}

impl SchemaCache for InMemorySchemaCache {
    fn get(&self, org_id: &str, object_name: &str) -> Option<DescribeResult> {
        // a poisoned lock reads as a miss
        let entries = self.entries.read().ok()?;
        let cached = entries.get(&(org_id.to_string(), object_name.to_string()))?;
        if self.is_expired(cached.stored_at, Utc::now()) {
            return None;
        }
        Some(cached.describe.clone())
    }

    fn set(&self, org_id: &str, object_name: &str, describe: DescribeResult) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                (org_id.to_string(), object_name.to_string()),
                CachedDescribe {
                    stored_at: Utc::now(),
                    describe,
                },
            );
        }
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
