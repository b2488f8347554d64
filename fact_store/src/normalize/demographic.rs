//! Demographic field parsing: sex categories, age bands, counts.

use serde_json::Value;

/// Maps an already-canonicalized sex string onto the stored categories
/// M/F/O/Total. Unknown non-empty strings map to "O" rather than leaking
/// arbitrary upstream codes into the natural key.
pub fn normalize_sex(sex: Option<String>) -> Option<String> {
    let s = sex?;
    let lowered = s.trim().to_lowercase();
    let mapped = match lowered.as_str() {
        "m" | "male" | "men" => "M",
        "f" | "female" | "women" => "F",
        "t" | "total" | "all" | "both" => "Total",
        "o" | "other" | "unknown" | "unspecified" => "O",
        "" => return None,
        _ => "O",
    };
    Some(mapped.to_string())
}

/// Parses an age band string into `(min, max)` with an exclusive upper
/// bound: `"0-4"` -> `(0, 5)`, `"85+"` -> `(85, None)`, `"under 5"` ->
/// `(0, 5)`, `"7"` -> `(7, 8)`. Returns `None` for unparseable bands.
pub fn parse_age_band(band: &str) -> Option<(Option<i32>, Option<i32>)> {
    let s = band.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }

    if let Some(rest) = s.strip_suffix('+') {
        let min: i32 = rest.trim().parse().ok()?;
        return Some((Some(min), None));
    }
    if let Some(rest) = s.strip_prefix("under") {
        let max: i32 = rest.trim().parse().ok()?;
        return Some((Some(0), Some(max)));
    }
    if let Some(rest) = s.strip_prefix("over") {
        let min: i32 = rest.trim().parse().ok()?;
        return Some((Some(min), None));
    }

    let numbers: Vec<i32> = split_numbers(&s);
    match numbers.as_slice() {
        [age] => Some((Some(*age), Some(age + 1))),
        [min, max, ..] if min <= max => Some((Some(*min), Some(max + 1))),
        _ => None,
    }
}

fn split_numbers(s: &str) -> Vec<i32> {
    s.split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
        .collect()
}

/// Parses a population count from a JSON observation value.
///
/// Accepts numbers and numeric strings; anything else (including the
/// upstream "N/A" marker) yields `None`.
pub fn parse_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let t = s.trim();
            t.parse::<i64>()
                .ok()
                .or_else(|| t.parse::<f64>().ok().map(|f| f.round() as i64))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn sex_mapping() {
        assert_eq!(normalize_sex(Some("M".into())).as_deref(), Some("M"));
        assert_eq!(normalize_sex(Some("Female".into())).as_deref(), Some("F"));
        assert_eq!(normalize_sex(Some("total".into())).as_deref(), Some("Total"));
        assert_eq!(normalize_sex(Some("diverse".into())).as_deref(), Some("O"));
        assert_eq!(normalize_sex(Some("  ".into())), None);
        assert_eq!(normalize_sex(None), None);
    }

    #[test]
    fn age_band_shapes() {
        assert_eq!(parse_age_band("0-4"), Some((Some(0), Some(5))));
        assert_eq!(parse_age_band("5 to 9"), Some((Some(5), Some(10))));
        assert_eq!(parse_age_band("85+"), Some((Some(85), None)));
        assert_eq!(parse_age_band("under 5"), Some((Some(0), Some(5))));
        assert_eq!(parse_age_band("over 65"), Some((Some(65), None)));
        assert_eq!(parse_age_band("7"), Some((Some(7), Some(8))));
        assert_eq!(parse_age_band("no ages here"), None);
        assert_eq!(parse_age_band(""), None);
    }

    #[test]
    fn count_parsing() {
        assert_eq!(parse_count(&json!(2_000_000)), Some(2_000_000));
        assert_eq!(parse_count(&json!(12.6)), Some(13));
        assert_eq!(parse_count(&json!("1234")), Some(1234));
        assert_eq!(parse_count(&json!("N/A")), None);
        assert_eq!(parse_count(&json!(null)), None);
        assert_eq!(parse_count(&json!([1])), None);
    }

    proptest! {
        // Any well-formed "a-b" range parses to an exclusive upper bound.
        #[test]
        fn range_upper_bound_is_exclusive(min in 0i32..120, span in 0i32..30) {
            let max = min + span;
            let parsed = parse_age_band(&format!("{min}-{max}"));
            prop_assert_eq!(parsed, Some((Some(min), Some(max + 1))));
        }

        // A single age always covers exactly one year.
        #[test]
        fn single_age_is_one_year(age in 0i32..120) {
            let parsed = parse_age_band(&age.to_string());
            prop_assert_eq!(parsed, Some((Some(age), Some(age + 1))));
        }
    }
}
