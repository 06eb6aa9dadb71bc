//! Invoice-id normalization (spec §4.1 edge cases): trim, uppercase, strip
//! surrounding punctuation, de-duplicate preserving first-seen order.

/// Idempotent: `normalize(normalize(x)) == normalize(x)` (spec §8).
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() && c != '-' && c != '_')
        .to_uppercase()
}

pub fn dedupe_preserving_order(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for id in ids {
        let normalized = normalize(&id);
        if normalized.is_empty() {
            continue;
        }
        if seen.insert(normalized.clone()) {
            out.push(normalized);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let raw = "  inv-12345,  ";
        let once = normalize(raw);
        let twice = normalize(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "INV-12345");
    }

    #[test]
    fn dedupe_preserves_first_seen_order() {
        let ids = vec![
            "INV-1".to_owned(),
            "inv-2".to_owned(),
            "INV-1,".to_owned(),
            "INV-3".to_owned(),
        ];
        assert_eq!(
            dedupe_preserving_order(ids),
            vec!["INV-1", "INV-2", "INV-3"]
        );
    }

    #[test]
    fn dedupe_drops_empty_after_normalization() {
        let ids = vec!["   ".to_owned(), ",,,".to_owned(), "INV-9".to_owned()];
        assert_eq!(dedupe_preserving_order(ids), vec!["INV-9"]);
    }
}
