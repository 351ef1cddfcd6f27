//! Inter-run stability analysis.
//!
//! The same document is parsed independently several times upstream; a field
//! whose value survives every attempt is more trustworthy than one that
//! drifts between runs. This module reduces the per-run values of a field to
//! a single agreement score.

use serde_json::Value;

use crate::schema::ConfidenceComponent;

/// Similarity of two strings after extraction-noise normalization.
///
/// Literal identity scores 1.0; identity after normalization scores 0.95 so
/// a casing or suffix difference stays distinguishable from an exact match;
/// everything else is normalized Levenshtein similarity.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let left = normalize_for_comparison(a);
    let right = normalize_for_comparison(b);

    if left == right {
        return 0.95;
    }

    let max_len = left.chars().count().max(right.chars().count());
    if max_len == 0 {
        return 0.95;
    }

    let distance = strsim::levenshtein(&left, &right);
    1.0 - distance as f64 / max_len as f64
}

/// Lowercase, collapse runs of whitespace, and drop one trailing
/// parenthetical suffix ("Acme Corp (US)" -> "acme corp").
fn normalize_for_comparison(raw: &str) -> String {
    let mut text = raw.trim().to_lowercase();

    if text.ends_with(')') {
        if let Some(open) = text.rfind('(') {
            text.truncate(open);
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn as_strings(values: &[Value]) -> Option<Vec<&str>> {
    values.iter().map(|v| v.as_str()).collect()
}

fn serialize(value: &Value) -> String {
    value.to_string()
}

/// Score a field's agreement across N independent parse attempts.
///
/// Nulls are treated as absent and excluded before scoring.
pub fn stability_component(field: &str, values: &[Value]) -> ConfidenceComponent {
    let present: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
    let owned: Vec<Value> = present.iter().map(|v| (*v).clone()).collect();

    let (score, notes) = match owned.len() {
        0 => (0.7, "no extracted values to compare".to_string()),
        1 => (0.8, "single run, no comparison possible".to_string()),
        2 => score_pair(&owned),
        3 => score_triple(&owned),
        n => (0.7, format!("unsupported run count {}", n)),
    };

    ConfidenceComponent::new(format!("{}_stability", field), score, notes)
}

fn score_pair(values: &[Value]) -> (f64, String) {
    let similarity = match as_strings(values) {
        Some(strings) => string_similarity(strings[0], strings[1]),
        None => {
            if serialize(&values[0]) == serialize(&values[1]) {
                1.0
            } else {
                0.0
            }
        }
    };

    let score = if similarity >= 0.9 {
        0.9
    } else if similarity >= 0.7 {
        0.7
    } else {
        0.6
    };

    (
        score,
        format!("2 runs, similarity {:.2}", similarity),
    )
}

fn score_triple(values: &[Value]) -> (f64, String) {
    if let Some(strings) = as_strings(values) {
        let pairwise = [
            string_similarity(strings[0], strings[1]),
            string_similarity(strings[0], strings[2]),
            string_similarity(strings[1], strings[2]),
        ];
        let average = pairwise.iter().sum::<f64>() / pairwise.len() as f64;

        let score = if average >= 0.95 {
            1.0
        } else if average >= 0.85 {
            0.9
        } else if average >= 0.70 {
            0.7
        } else {
            0.4
        };

        return (
            score,
            format!("3 runs, average pairwise similarity {:.2}", average),
        );
    }

    let mut serialized: Vec<String> = values.iter().map(serialize).collect();
    serialized.sort();
    serialized.dedup();

    let (score, agreement) = match serialized.len() {
        1 => (1.0, "all runs agree"),
        2 => (0.7, "two distinct values"),
        _ => (0.4, "all runs disagree"),
    };

    (score, format!("3 runs, {}", agreement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_similarity_literal_vs_normalized_identity() {
        assert_eq!(string_similarity("Taco Bell", "Taco Bell"), 1.0);
        assert_eq!(string_similarity("Taco Bell", "TACO BELL"), 0.95);
        assert_eq!(string_similarity("Acme Corp (US)", "acme  corp"), 0.95);
    }

    #[test]
    fn test_no_values_is_neutral() {
        let component = stability_component("advertiser_name", &[]);
        assert_eq!(component.score, 0.7);

        let nulls = vec![json!(null), json!(null)];
        let component = stability_component("advertiser_name", &nulls);
        assert_eq!(component.score, 0.7);
    }

    #[test]
    fn test_single_value() {
        let component = stability_component("po_number", &[json!("40104")]);
        assert_eq!(component.score, 0.8);
    }

    #[test]
    fn test_two_matching_numbers() {
        let component = stability_component("total", &[json!(1_000_000), json!(1_000_000)]);
        assert_eq!(component.score, 0.9);
    }

    #[test]
    fn test_two_conflicting_numbers() {
        let component = stability_component("total", &[json!(1_000_000), json!(999_990)]);
        assert_eq!(component.score, 0.6);
    }

    #[test]
    fn test_three_string_runs_taco_bell() {
        // "Taco Bell" / "TACO BELL" / "Taco Bell Corp": the first pair
        // normalizes identical (0.95), the others land near 0.64, so the
        // average sits in the 0.70-0.85 band.
        let values = vec![json!("Taco Bell"), json!("TACO BELL"), json!("Taco Bell Corp")];
        let component = stability_component("advertiser_name", &values);
        assert_eq!(component.score, 0.7);
    }

    #[test]
    fn test_three_identical_strings() {
        let values = vec![json!("Taco Bell"), json!("Taco Bell"), json!("Taco Bell")];
        let component = stability_component("advertiser_name", &values);
        assert_eq!(component.score, 1.0);
    }

    #[test]
    fn test_three_divergent_strings() {
        let values = vec![json!("Taco Bell"), json!("Pepsi"), json!("Initech")];
        let component = stability_component("advertiser_name", &values);
        assert_eq!(component.score, 0.4);
    }

    #[test]
    fn test_three_numbers_distinct_counting() {
        let all_same = vec![json!(100), json!(100), json!(100)];
        assert_eq!(stability_component("n", &all_same).score, 1.0);

        let two_distinct = vec![json!(100), json!(100), json!(99)];
        assert_eq!(stability_component("n", &two_distinct).score, 0.7);

        let all_distinct = vec![json!(100), json!(99), json!(98)];
        assert_eq!(stability_component("n", &all_distinct).score, 0.4);
    }

    #[test]
    fn test_mixed_types_use_distinct_counting() {
        let values = vec![json!("100"), json!(100), json!(100)];
        let component = stability_component("n", &values);
        // "100" serializes differently from 100: two distinct values.
        assert_eq!(component.score, 0.7);
    }
}
