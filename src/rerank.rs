//! Context re-ranking of match candidates.
//!
//! Each signal contributes an additive adjustment; the sum is added to the
//! stage confidence and the result clamped to `[0, 1]`. Weights live in
//! [`ContextWeights`] so deployments can recalibrate them.

use crate::classify::{is_forbidden, is_system_object};
use crate::config::{ContextWeights, HintRule};
use crate::keywords::matched_clusters;
use crate::resolver::{MatchCandidate, OrgProfile, UserPreference};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_BUSINESS_PHRASING: Regex = Regex::new(r"(?i)\b(business|custom)\b").unwrap();
}

/// Question phrasing that points at objects whose name contains one of the fragments.
struct DomainHint {
    phrasing: &'static str,
    name_fragments: &'static [&'static str],
}

const DOMAIN_HINTS: &[DomainHint] = &[
    DomainHint {
        phrasing: r"(?i)\b(inventory|stock|on hand|warehouse)\b",
        name_fragments: &["item", "product", "inventory", "stock"],
    },
    DomainHint {
        phrasing: r"(?i)\b(revenue|sales|won|closing|forecast)\b",
        name_fragments: &["opportunity", "order", "invoice"],
    },
    DomainHint {
        phrasing: r"(?i)\b(support|issue|escalat\w*|resolved)\b",
        name_fragments: &["case", "ticket"],
    },
    DomainHint {
        phrasing: r"(?i)\b(shipped|shipment|delivery|deliveries)\b",
        name_fragments: &["shipment", "order", "delivery"],
    },
];

/// Terms that, shared by the question and a custom object's name, mark the
/// custom object as the likely answer.
const GENERIC_TERMS: &[&str] = &[
    "item", "product", "order", "invoice", "lot", "location", "asset", "project", "inventory",
    "shipment", "warehouse", "bin",
];

lazy_static! {
    static ref DOMAIN_PATTERNS: Vec<Regex> = DOMAIN_HINTS
        .iter()
        .map(|h| Regex::new(h.phrasing).unwrap())
        .collect();

    /// Whole-word question matchers aligned with [`GENERIC_TERMS`], plurals included.
    static ref GENERIC_TERM_PATTERNS: Vec<Regex> = GENERIC_TERMS
        .iter()
        .map(|t| Regex::new(&format!(r"(?i)\b{t}(s|es)?\b")).unwrap())
        .collect();
}

/// Everything the re-ranker needs besides the candidate itself.
pub struct RerankContext<'a> {
    pub question: &'a str,
    pub org: &'a OrgProfile,
    pub preferences: &'a [UserPreference],
    pub weights: &'a ContextWeights,
    pub hint_rules: &'a [HintRule],
    pub preferred_namespace: Option<&'a str>,
    pub now: DateTime<Utc>,
}

impl RerankContext<'_> {
    /// Apply every adjustment to every candidate, in place.
    pub fn apply(&self, candidates: &mut [MatchCandidate]) {
        let question = self.question.to_lowercase();
        for candidate in candidates.iter_mut() {
            let adjusted = candidate.confidence + self.adjustment(&question, candidate);
            candidate.rank_score = adjusted;
            candidate.confidence = adjusted.clamp(0.0, 1.0);
        }
    }

    fn adjustment(&self, question: &str, candidate: &MatchCandidate) -> f64 {
        let w = self.weights;
        let name = &candidate.descriptor.canonical_name;
        let lower_name = name.to_lowercase();
        let custom = candidate.descriptor.is_custom_definition;
        let mut boost = 0.0;

        // business term → standard object
        if matched_clusters(question).any(|t| t.objects.contains(&lower_name.as_str())) {
            boost += w.business_term;
        }

        if self
            .org
            .frequently_used
            .iter()
            .any(|o| o.eq_ignore_ascii_case(name))
        {
            boost += w.frequently_used;
        }

        if let Some(pref) = self
            .preferences
            .iter()
            .find(|p| p.object_name.eq_ignore_ascii_case(name))
        {
            boost += self.preference_boost(pref);
        }

        for (hint, re) in DOMAIN_HINTS.iter().zip(DOMAIN_PATTERNS.iter()) {
            if re.is_match(question) && hint.name_fragments.iter().any(|f| lower_name.contains(f)) {
                boost += w.domain_keyword;
                break;
            }
        }

        if custom {
            let shares_generic_term = GENERIC_TERMS
                .iter()
                .zip(GENERIC_TERM_PATTERNS.iter())
                .any(|(t, re)| lower_name.contains(t) && re.is_match(question));
            if shares_generic_term {
                boost += w.custom_generic_term;
                if let Some(ns) = self.preferred_namespace {
                    if lower_name.starts_with(&format!("{}__", ns.to_lowercase())) {
                        boost += w.namespace;
                    }
                }
            }
        }

        for rule in self.hint_rules {
            if rule.object.eq_ignore_ascii_case(name)
                && rule
                    .phrases
                    .iter()
                    .any(|p| !p.is_empty() && question.contains(&p.to_lowercase()))
            {
                boost += rule.boost;
            }
        }

        if is_forbidden(name) {
            boost += w.forbidden_penalty;
        } else if is_system_object(name) {
            boost += w.system_penalty;
        }

        if custom && RE_BUSINESS_PHRASING.is_match(question) {
            boost += w.custom_phrasing;
        }

        boost
    }

    fn preference_boost(&self, pref: &UserPreference) -> f64 {
        let w = self.weights;
        let mut boost = (pref.usage_count as f64 * w.usage_per_use).min(w.usage_cap);

        if pref.usage_count > 0 {
            let rate = (pref.success_count.min(pref.usage_count)) as f64 / pref.usage_count as f64;
            boost += rate * w.success_rate;
        }

        if let Some(last_used) = pref.last_used {
            let days = (self.now - last_used).num_seconds().max(0) as f64 / 86_400.0;
            if w.recency_window_days > 0.0 {
                let decay = (1.0 - days / w.recency_window_days).max(0.0);
                boost += decay * w.recency;
            }
        }

        boost
    }
}
