//! Resolver configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config. The
//! deployment-specific parts (hint rules, preferred namespace) are empty by
//! default and need recalibration per org.

use crate::error::{ResolverError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name under the platform config dir.
const CONFIG_DIR: &str = "object-resolver";

/// Default config file name.
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    pub matching: MatchingConfig,
    pub weights: ContextWeights,
    /// Phrase-triggered boosts tuned for one deployment's naming.
    pub hint_rules: Vec<HintRule>,
    /// Namespace whose custom objects get [`ContextWeights::namespace`].
    pub preferred_namespace: Option<String>,
    pub schema: SchemaConfig,
    pub planning: PlanningConfig,
}

/// Thresholds of the matching stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchingConfig {
    /// Minimum similarity kept by the fuzzy stage
    pub fuzzy_threshold: f64,
    pub max_suggestions: usize,
    /// Below this top confidence, more than one survivor asks for clarification
    pub disambiguation_threshold: f64,
    /// The fuzzy stage only runs if no candidate is above this
    pub fuzzy_gate: f64,
    /// Similarity at which an unmatched question word counts as a misspelled business term
    pub typo_similarity: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.6,
            max_suggestions: 5,
            disambiguation_threshold: 0.9,
            fuzzy_gate: 0.7,
            typo_similarity: 0.8,
        }
    }
}

/// Additive re-ranking weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextWeights {
    /// Business term in the question maps to this standard object
    pub business_term: f64,
    /// Object is on the org's frequently-used list
    pub frequently_used: f64,
    /// Per recorded use, capped at `usage_cap`
    pub usage_per_use: f64,
    pub usage_cap: f64,
    /// Scaled by the preference's success rate
    pub success_rate: f64,
    /// Decays linearly to zero over `recency_window_days`
    pub recency: f64,
    pub recency_window_days: f64,
    /// Domain phrasing (inventory, revenue, support) matches the object name
    pub domain_keyword: f64,
    /// Custom object name contains a generic term also in the question
    pub custom_generic_term: f64,
    /// Custom object lives in the preferred namespace
    pub namespace: f64,
    pub forbidden_penalty: f64,
    pub system_penalty: f64,
    /// Question says "business" or "custom" and the object is custom
    pub custom_phrasing: f64,
}

impl Default for ContextWeights {
    fn default() -> Self {
        Self {
            business_term: 0.2,
            frequently_used: 0.15,
            usage_per_use: 0.05,
            usage_cap: 0.3,
            success_rate: 0.2,
            recency: 0.1,
            recency_window_days: 10.0,
            domain_keyword: 0.25,
            custom_generic_term: 0.5,
            namespace: 0.3,
            forbidden_penalty: -2.0,
            system_penalty: -0.5,
            custom_phrasing: 0.1,
        }
    }
}

/// Boost `object` by `boost` when the question contains any of `phrases`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintRule {
    pub phrases: Vec<String>,
    pub object: String,
    #[serde(default = "default_hint_boost")]
    pub boost: f64,
}

fn default_hint_boost() -> f64 {
    3.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaConfig {
    pub cache_ttl_minutes: i64,
    /// Breadth-first rounds around the resolved object
    pub expansion_depth: usize,
    pub max_path_depth: usize,
    /// Most objects described in one expansion round
    pub expansion_batch_limit: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            cache_ttl_minutes: 10,
            expansion_depth: 2,
            max_path_depth: 3,
            expansion_batch_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlanningConfig {
    pub default_limit: usize,
    pub max_fields: usize,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            default_limit: 200,
            max_fields: 10,
        }
    }
}

impl ResolverConfig {
    /// Load from `path`, or from the default location, or fall back to defaults.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p),
                _ => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ResolverError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: ResolverConfig =
            serde_json::from_str(&content).map_err(|e| ResolverError::ConfigParse(e.to_string()))?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }
}

/// `<config_dir>/object-resolver/config.json`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}
