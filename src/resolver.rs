//! Entity resolver: question text → ranked object candidates.
//!
//! Stages run in order: exact catalog hits, substring containment, and (only
//! when nothing scored above the fuzzy gate) similarity matching. Candidates
//! are then re-ranked with org/user context, sorted, deduplicated per object
//! and cut to the suggestion limit. Resolution never fails; missing remote
//! data shows up as `success: false` with a message.

use crate::catalog::{
    build_catalog, CandidateDescriptor, CatalogIndex, CatalogOptions, ObjectLister,
};
use crate::classify::is_forbidden;
use crate::config::ResolverConfig;
use crate::keywords::{extract_keywords, BUSINESS_TERMS};
use crate::rerank::RerankContext;
use crate::similarity::similarity;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Alternatives listed in a clarification message.
const MAX_LISTED_ALTERNATIVES: usize = 3;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Partial,
    Fuzzy,
}

/// A descriptor with the confidence of the stage that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    #[serde(flatten)]
    pub descriptor: CandidateDescriptor,
    /// 0.0 to 1.0
    pub confidence: f64,
    /// Unclamped score after re-ranking; candidates are ordered by it
    #[serde(skip)]
    pub rank_score: f64,
    pub match_type: MatchType,
    pub matched_keyword: String,
}

impl MatchCandidate {
    fn new(
        descriptor: &CandidateDescriptor,
        confidence: f64,
        match_type: MatchType,
        keyword: &str,
    ) -> Self {
        Self {
            descriptor: descriptor.clone(),
            confidence,
            rank_score: confidence,
            match_type,
            matched_keyword: keyword.to_string(),
        }
    }

    pub fn canonical_name(&self) -> &str {
        &self.descriptor.canonical_name
    }
}

/// Org-level context supplied by the surrounding service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrgProfile {
    pub org_id: String,
    /// Objects this org queries most
    pub frequently_used: Vec<String>,
    /// Org vocabulary: synonym → object canonical name
    pub synonyms: HashMap<String, String>,
}

/// A user's history with one object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
    pub object_name: String,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub success_count: u32,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub threshold: f64,
    pub max_suggestions: usize,
    pub include_system_objects: bool,
    pub session_preferences: Vec<UserPreference>,
    /// Clock for recency decay; `None` means now
    pub now: Option<DateTime<Utc>>,
}

impl ResolveOptions {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            threshold: config.matching.fuzzy_threshold,
            max_suggestions: config.matching.max_suggestions,
            include_system_objects: false,
            session_preferences: Vec::new(),
            now: None,
        }
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub success: bool,
    pub primary_match: Option<MatchCandidate>,
    pub suggestions: Vec<MatchCandidate>,
    pub confidence: f64,
    pub needs_clarification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_message: Option<String>,
    /// Keywords extracted from the question
    pub keywords: Vec<String>,
}

impl ResolutionResult {
    fn failure(keywords: Vec<String>, message: String) -> Self {
        Self {
            success: false,
            primary_match: None,
            suggestions: Vec::new(),
            confidence: 0.0,
            needs_clarification: false,
            clarification_message: Some(message),
            keywords,
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

pub struct EntityResolver<'a> {
    config: &'a ResolverConfig,
}

impl<'a> EntityResolver<'a> {
    pub fn new(config: &'a ResolverConfig) -> Self {
        Self { config }
    }

    /// Fetch the catalog through `lister` and resolve `question` against it.
    pub async fn resolve(
        &self,
        question: &str,
        lister: &dyn ObjectLister,
        org: &OrgProfile,
        options: &ResolveOptions,
    ) -> ResolutionResult {
        let catalog = build_catalog(
            lister,
            CatalogOptions {
                include_system_objects: options.include_system_objects,
            },
        )
        .await;
        self.resolve_with_catalog(question, &catalog, org, options)
    }

    /// Resolve against an already built catalog.
    pub fn resolve_with_catalog(
        &self,
        question: &str,
        catalog: &CatalogIndex,
        org: &OrgProfile,
        options: &ResolveOptions,
    ) -> ResolutionResult {
        let matching = &self.config.matching;
        let keywords = extract_keywords(question, &org.synonyms, matching.typo_similarity);
        debug!("Extracted keywords: {:?}", keywords);

        if catalog.is_empty() {
            let message = if catalog.listing_failed() {
                "Object metadata for this org could not be loaded right now. \
                 Please try again shortly."
            } else {
                "This org has no searchable objects. \
                 Restricted and system objects are excluded."
            };
            return ResolutionResult::failure(keywords, message.to_string());
        }
        if keywords.is_empty() {
            return ResolutionResult::failure(
                keywords,
                "I couldn't identify an object in your question. Try naming the records \
                 you want, e.g. \"accounts\" or \"open cases\"."
                    .to_string(),
            );
        }

        let mut candidates = exact_matches(&keywords, catalog);
        candidates.extend(partial_matches(&keywords, catalog));

        let gate = matching.fuzzy_gate;
        if !candidates.iter().any(|c| c.confidence > gate) {
            let fuzzy = fuzzy_matches(&keywords, catalog, options.threshold);
            debug!("Fuzzy stage produced {} candidates", fuzzy.len());
            candidates.extend(fuzzy);
        }
        debug!("{} raw candidates before re-ranking", candidates.len());

        let ctx = RerankContext {
            question,
            org,
            preferences: &options.session_preferences,
            weights: &self.config.weights,
            hint_rules: &self.config.hint_rules,
            preferred_namespace: self.config.preferred_namespace.as_deref(),
            now: options.now.unwrap_or_else(Utc::now),
        };
        ctx.apply(&mut candidates);

        // stable: equal scores keep stage order
        candidates.sort_by(|a, b| b.rank_score.total_cmp(&a.rank_score));
        let survivors = dedupe(candidates);

        let suggestions: Vec<MatchCandidate> =
            survivors.into_iter().take(options.max_suggestions).collect();
        self.select(keywords, suggestions)
    }

    fn select(&self, keywords: Vec<String>, suggestions: Vec<MatchCandidate>) -> ResolutionResult {
        let Some(top) = suggestions.first().cloned() else {
            return ResolutionResult::failure(
                keywords.clone(),
                format!(
                    "I couldn't find an object matching \"{}\". \
                     Try using the object's label or API name.",
                    keywords.join(", ")
                ),
            );
        };

        let needs_clarification =
            suggestions.len() > 1 && top.confidence < self.config.matching.disambiguation_threshold;
        let clarification_message =
            needs_clarification.then(|| clarification_message(&suggestions));

        info!(
            "Resolved {} ({:.2}, {:?}) from {} suggestions",
            top.canonical_name(),
            top.confidence,
            top.match_type,
            suggestions.len()
        );

        ResolutionResult {
            success: true,
            confidence: top.confidence,
            primary_match: Some(top),
            suggestions,
            needs_clarification,
            clarification_message,
            keywords,
        }
    }
}

// ============================================================================
// Stages
// ============================================================================

fn exact_matches(keywords: &[String], catalog: &CatalogIndex) -> Vec<MatchCandidate> {
    keywords
        .iter()
        .flat_map(|kw| {
            catalog
                .get(kw)
                .iter()
                .map(move |d| MatchCandidate::new(d, 1.0, MatchType::Exact, kw))
        })
        .collect()
}

fn partial_matches(keywords: &[String], catalog: &CatalogIndex) -> Vec<MatchCandidate> {
    let entries: Vec<(&String, &Vec<CandidateDescriptor>)> = catalog.entries().collect();

    keywords
        .iter()
        .flat_map(|kw| {
            entries
                .par_iter()
                .filter(|(key, _)| {
                    key.as_str() != kw.as_str()
                        && (key.contains(kw.as_str()) || kw.contains(key.as_str()))
                })
                .flat_map_iter(|(key, descriptors)| {
                    let (a, b) = (kw.chars().count(), key.chars().count());
                    let confidence = a.min(b) as f64 / a.max(b) as f64;
                    descriptors
                        .iter()
                        .map(move |d| MatchCandidate::new(d, confidence, MatchType::Partial, kw))
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn fuzzy_matches(
    keywords: &[String],
    catalog: &CatalogIndex,
    threshold: f64,
) -> Vec<MatchCandidate> {
    let entries: Vec<(&String, &Vec<CandidateDescriptor>)> = catalog.entries().collect();
    let mut out = Vec::new();

    for kw in keywords {
        let hits: Vec<MatchCandidate> = entries
            .par_iter()
            .filter_map(|(key, descriptors)| {
                let score = similarity(kw, key);
                (score >= threshold).then_some((score, descriptors))
            })
            .flat_map_iter(|(score, descriptors)| {
                descriptors
                    .iter()
                    .map(move |d| MatchCandidate::new(d, score, MatchType::Fuzzy, kw))
            })
            .collect();
        out.extend(hits);

        // misspelled business vocabulary reaches the cluster's standard objects
        for term in BUSINESS_TERMS.iter().filter(|t| !t.objects.is_empty()) {
            let best = term
                .terms
                .iter()
                .map(|t| similarity(kw, t))
                .fold(0.0_f64, f64::max);
            if best < threshold {
                continue;
            }
            for object in term.objects {
                for d in catalog.get(object) {
                    out.push(MatchCandidate::new(d, best, MatchType::Fuzzy, kw));
                }
            }
        }
    }

    out
}

/// One candidate per object, first occurrence wins. Forbidden objects and
/// candidates penalized to zero are dropped.
fn dedupe(candidates: Vec<MatchCandidate>) -> Vec<MatchCandidate> {
    let mut seen: HashSet<String> = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| c.confidence > 0.0 && !is_forbidden(c.canonical_name()))
        .filter(|c| seen.insert(c.canonical_name().to_string()))
        .collect()
}

fn clarification_message(suggestions: &[MatchCandidate]) -> String {
    let options: Vec<String> = suggestions
        .iter()
        .take(MAX_LISTED_ALTERNATIVES)
        .map(|s| format!("{} ({})", s.descriptor.display_label, s.canonical_name()))
        .collect();
    format!(
        "I found several objects that could match your question. Did you mean: {}?",
        options.join(", ")
    )
}
