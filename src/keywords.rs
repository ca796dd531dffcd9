//! Keyword extraction from a free-text question.
//!
//! Sources, in order:
//! 1. business-term synonym clusters (customer → account, ...)
//! 2. custom-object style identifiers (`ns__Thing__c`)
//! 3. the org's own synonym table
//! 4. misspelled business terms ("custmers"), kept verbatim for the fuzzy stage
//!
//! Output is lowercase, deduplicated, in discovery order, and never contains
//! tokens shorter than [`MIN_KEYWORD_LEN`].

use crate::classify::CUSTOM_SUFFIX;
use crate::similarity::similarity;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

/// Shorter tokens are dropped.
pub const MIN_KEYWORD_LEN: usize = 3;

/// Shortest question word considered for misspelling recovery.
const MIN_TYPO_WORD_LEN: usize = 4;

// ============================================================================
// Business term clusters
// ============================================================================

/// A synonym cluster of business vocabulary.
#[derive(Debug)]
pub struct BusinessTerm {
    /// Keyword added whenever any term of the cluster appears
    pub keyword: Option<&'static str>,
    /// Standard objects the cluster points at (lowercase API names)
    pub objects: &'static [&'static str],
    /// Surface forms, singular and plural
    pub terms: &'static [&'static str],
}

pub const BUSINESS_TERMS: &[BusinessTerm] = &[
    BusinessTerm {
        keyword: Some("account"),
        objects: &["account"],
        terms: &[
            "account", "accounts", "customer", "customers", "client", "clients", "company",
            "companies", "organization", "organizations", "vendor", "vendors",
        ],
    },
    BusinessTerm {
        keyword: Some("contact"),
        objects: &["contact"],
        terms: &["contact", "contacts", "people", "person", "persons", "individual", "individuals"],
    },
    BusinessTerm {
        keyword: Some("opportunity"),
        objects: &["opportunity"],
        terms: &["opportunity", "opportunities", "deal", "deals", "pipeline"],
    },
    BusinessTerm {
        keyword: Some("lead"),
        objects: &["lead"],
        terms: &["lead", "leads", "prospect", "prospects"],
    },
    BusinessTerm {
        keyword: Some("case"),
        objects: &["case"],
        terms: &["case", "cases", "ticket", "tickets", "complaint", "complaints"],
    },
    BusinessTerm {
        keyword: Some("order"),
        objects: &["order"],
        terms: &["order", "orders", "purchase", "purchases"],
    },
    BusinessTerm {
        keyword: Some("product"),
        objects: &["product2"],
        terms: &["product", "products", "sku", "skus"],
    },
    BusinessTerm {
        keyword: Some("campaign"),
        objects: &["campaign"],
        terms: &["campaign", "campaigns"],
    },
    BusinessTerm {
        keyword: None,
        objects: &[],
        terms: &[
            "item", "items", "inventory", "stock", "lot", "lots", "location", "locations",
            "warehouse", "warehouses",
        ],
    },
    BusinessTerm {
        keyword: None,
        objects: &[],
        terms: &["invoice", "invoices", "bill", "bills", "payment", "payments"],
    },
    BusinessTerm {
        keyword: None,
        objects: &[],
        terms: &[
            "task", "tasks", "activity", "activities", "event", "events", "meeting", "meetings",
        ],
    },
];

lazy_static! {
    /// One word-boundary regex per cluster, aligned with [`BUSINESS_TERMS`].
    pub static ref BUSINESS_PATTERNS: Vec<Regex> = BUSINESS_TERMS
        .iter()
        .map(|term| Regex::new(&format!(r"(?i)\b({})\b", term.terms.join("|"))).unwrap())
        .collect();

    static ref RE_CUSTOM_IDENT: Regex = Regex::new(r"\b([A-Za-z][A-Za-z0-9_]*__c)\b").unwrap();
    static ref RE_WORD: Regex = Regex::new(r"[A-Za-z][A-Za-z0-9_]*").unwrap();
}

/// Naive singular form of a business term.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if word.ends_with("ss") {
        return word.to_string();
    }
    word.strip_suffix('s').unwrap_or(word).to_string()
}

// ============================================================================
// Extraction
// ============================================================================

#[derive(Default)]
struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    fn add(&mut self, word: &str) {
        let word = word.trim().to_lowercase();
        if word.chars().count() < MIN_KEYWORD_LEN || self.keywords.contains(&word) {
            return;
        }
        self.keywords.push(word);
    }
}

/// Extract lowercase keywords from `question`.
///
/// `org_synonyms` maps a synonym (any case) to an object canonical name.
/// `typo_similarity` is the bar for treating an unmatched word as a
/// misspelled business term.
pub fn extract_keywords(
    question: &str,
    org_synonyms: &HashMap<String, String>,
    typo_similarity: f64,
) -> Vec<String> {
    let mut set = KeywordSet::default();
    let lower = question.to_lowercase();

    for (term, re) in BUSINESS_TERMS.iter().zip(BUSINESS_PATTERNS.iter()) {
        let mut hit = false;
        for m in re.find_iter(&lower) {
            hit = true;
            set.add(m.as_str());
            set.add(&singularize(m.as_str()));
        }
        if hit {
            if let Some(keyword) = term.keyword {
                set.add(keyword);
            }
        }
    }

    for cap in RE_CUSTOM_IDENT.captures_iter(question) {
        let ident = cap[1].to_lowercase();
        set.add(&ident);
        if let Some(stem) = ident.strip_suffix(CUSTOM_SUFFIX) {
            set.add(stem);
        }
    }

    // sorted so the keyword order does not depend on map iteration
    let mut synonyms: Vec<(&String, &String)> = org_synonyms.iter().collect();
    synonyms.sort();
    for (synonym, canonical) in synonyms {
        let synonym = synonym.to_lowercase();
        if !synonym.is_empty() && lower.contains(&synonym) {
            set.add(&synonym);
            set.add(canonical);
        }
    }

    for word in RE_WORD.find_iter(&lower).map(|m| m.as_str()) {
        if word.chars().count() < MIN_TYPO_WORD_LEN || is_business_term(word) {
            continue;
        }
        let near_term = BUSINESS_TERMS
            .iter()
            .flat_map(|t| t.terms.iter())
            .any(|t| similarity(word, t) >= typo_similarity);
        if near_term {
            set.add(word);
        }
    }

    set.keywords
}

/// True if `word` is literally one of the cluster terms.
pub fn is_business_term(word: &str) -> bool {
    BUSINESS_TERMS.iter().any(|t| t.terms.contains(&word))
}

/// Clusters whose pattern matches somewhere in `question`.
pub fn matched_clusters(question: &str) -> impl Iterator<Item = &'static BusinessTerm> + '_ {
    BUSINESS_TERMS
        .iter()
        .zip(BUSINESS_PATTERNS.iter())
        .filter(move |(_, re)| re.is_match(question))
        .map(|(term, _)| term)
}
