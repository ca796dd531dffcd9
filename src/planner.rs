//! Relationship planner: bounded search for the related object that best
//! fits the question's keywords.
//!
//! Depth-first, iterative (explicit stack), with a visited set and a hard
//! depth cap so self-referencing lookups cannot loop. The first exploration
//! order decides which path reaches an object, so the result is the best
//! node of that exploration, not a global optimum.

use crate::classify::is_forbidden;
use crate::schema::SchemaIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Default traversal depth.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Score for a keyword in the object's own name or labels.
const DIRECT_HIT: f64 = 1.0;

/// Score for a keyword in one of the object's relationship names.
const NEIGHBOR_HIT: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopType {
    Parent,
    Child,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathHop {
    pub hop_type: HopType,
    pub relationship_name: String,
    pub target_object: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipPathResult {
    pub object_name: String,
    pub path: Vec<PathHop>,
    pub score: f64,
    pub depth: usize,
}

/// Score `object` against lowercase `keywords`.
pub fn score_object(index: &SchemaIndex, object: &str, keywords: &[String]) -> f64 {
    let entry = index.get(object);

    let mut text = object.to_lowercase();
    if let Some(entry) = entry {
        for label in [entry.label(), entry.label_plural()].into_iter().flatten() {
            text.push(' ');
            text.push_str(&label.to_lowercase());
        }
    }

    let relationship_text: String = entry
        .map(|e| {
            e.parent_relationships
                .keys()
                .chain(e.child_relationships.keys())
                .map(|r| r.to_lowercase())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    keywords
        .iter()
        .map(|kw| {
            let mut score = 0.0;
            if text.contains(kw.as_str()) {
                score += DIRECT_HIT;
            }
            if relationship_text.contains(kw.as_str()) {
                score += NEIGHBOR_HIT;
            }
            score
        })
        .sum()
}

/// Best-scoring object reachable from `start` within `max_depth` hops.
///
/// Returns `None` when `start` is forbidden, there are no keywords, or no
/// visited object scores above zero.
pub fn plan_path(
    index: &SchemaIndex,
    start: &str,
    keywords: &[String],
    max_depth: usize,
) -> Option<RelationshipPathResult> {
    if is_forbidden(start) || keywords.is_empty() {
        return None;
    }
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    let mut stack: Vec<(String, usize, Vec<PathHop>)> = vec![(start.to_string(), 0, Vec::new())];
    let mut visited: HashSet<String> = HashSet::new();
    let mut best: Option<RelationshipPathResult> = None;

    while let Some((object, depth, path)) = stack.pop() {
        if is_forbidden(&object) || !visited.insert(object.clone()) {
            continue;
        }

        let score = score_object(index, &object, &keywords);
        let better = match &best {
            None => score > 0.0,
            Some(b) => score > b.score || (score == b.score && depth < b.depth),
        };
        if better {
            best = Some(RelationshipPathResult {
                object_name: object.clone(),
                path: path.clone(),
                score,
                depth,
            });
        }

        if depth >= max_depth {
            continue;
        }
        let Some(entry) = index.get(&object) else {
            continue;
        };

        let hops = entry
            .parent_relationships
            .iter()
            .map(|(r, t)| (HopType::Parent, r, t))
            .chain(
                entry
                    .child_relationships
                    .iter()
                    .map(|(r, t)| (HopType::Child, r, t)),
            );

        let mut next: Vec<(String, usize, Vec<PathHop>)> = Vec::new();
        for (hop_type, relationship, target) in hops {
            if is_forbidden(target) || visited.contains(target) {
                continue;
            }
            let mut hop_path = path.clone();
            hop_path.push(PathHop {
                hop_type,
                relationship_name: relationship.clone(),
                target_object: target.clone(),
            });
            next.push((target.clone(), depth + 1, hop_path));
        }
        // reversed so the first relationship is explored first
        stack.extend(next.into_iter().rev());
    }

    if let Some(b) = &best {
        debug!(
            "Best related object from {}: {} (score {:.1}, depth {})",
            start, b.object_name, b.score, b.depth
        );
    }
    best
}
