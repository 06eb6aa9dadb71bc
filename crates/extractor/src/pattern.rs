//! Pattern tier (spec §4.1 step 1): a fixed ordered set of regular
//! expressions recognizing common invoice-reference formats. Never fails —
//! absence of matches is a valid, confident result (`confidence=0`).

use std::sync::OnceLock;

use regex::Regex;

use crate::normalize::dedupe_preserving_order;

struct CompiledPatterns {
    /// Bounded formats (e.g. `INV-YYYY-NNNN`) get the strictness bonus in the
    /// confidence heuristic (spec §4.1: "bounded_format_strictness").
    bounded: Vec<Regex>,
    loose: Vec<Regex>,
}

static PATTERNS: OnceLock<CompiledPatterns> = OnceLock::new();

fn patterns() -> &'static CompiledPatterns {
    PATTERNS.get_or_init(|| CompiledPatterns {
        bounded: vec![
            Regex::new(r"(?i)\bINV-\d{4}-\d{4,}\b").unwrap(),
            Regex::new(r"(?i)\bPO[-_ ]?\d{4}-\d{4,}\b").unwrap(),
        ],
        loose: vec![
            Regex::new(r"(?i)\bINV[-_ ]\d{3,}\b").unwrap(),
            Regex::new(r"(?i)\bINV\d{4,}\b").unwrap(),
            Regex::new(r"(?i)invoice\s*#\s*:?\s*([A-Z0-9-]{3,})").unwrap(),
            Regex::new(r"(?i)bill\s*#\s*:?\s*([A-Z0-9-]{3,})").unwrap(),
            Regex::new(r"(?i)\bPO[-_ ]?\d{3,}\b").unwrap(),
        ],
    })
}

/// Result of a pattern-tier pass: de-duplicated, normalized ids plus whether
/// any bounded-format pattern fired (used by the confidence heuristic).
pub struct PatternHits {
    pub ids: Vec<String>,
    pub matches_found: usize,
    pub bounded_format_strictness: bool,
}

pub fn scan(text: &str) -> PatternHits {
    let p = patterns();
    let mut raw_ids = Vec::new();
    let mut matches_found = 0usize;
    let mut bounded_format_strictness = false;

    for re in &p.bounded {
        for m in re.find_iter(text) {
            raw_ids.push(m.as_str().to_owned());
            matches_found += 1;
            bounded_format_strictness = true;
        }
    }
    for re in &p.loose {
        for caps in re.captures_iter(text) {
            let hit = caps
                .get(1)
                .or_else(|| caps.get(0))
                .expect("pattern always has group 0")
                .as_str();
            raw_ids.push(hit.to_owned());
            matches_found += 1;
        }
    }

    PatternHits {
        ids: dedupe_preserving_order(raw_ids),
        matches_found,
        bounded_format_strictness,
    }
}

/// Confidence heuristic, spec §4.1: `min(1.0, 0.5 + 0.1*matches + 0.2*bounded)`.
pub fn confidence(hits: &PatternHits) -> f64 {
    if hits.ids.is_empty() {
        return 0.0;
    }
    let bounded_bonus = if hits.bounded_format_strictness { 0.2 } else { 0.0 };
    (0.5 + 0.1 * hits.matches_found as f64 + bounded_bonus).min(1.0)
}
