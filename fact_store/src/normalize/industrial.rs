//! Industrial field parsing: time periods, NACE codes, observation values.

use serde_json::Value;

/// Parses a time period into `(year, month)`.
///
/// Accepts `2023M01`, `2023-01`, `202301`, and bare `2023` (annual, month
/// `None`). Months outside 1-12 make the period unparseable.
pub fn parse_time_period(time: &str) -> Option<(i32, Option<u32>)> {
    let s = time.trim();
    let bytes = s.as_bytes();
    if bytes.len() < 4 || !bytes[..4].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let year: i32 = s[..4].parse().ok()?;

    let rest = &s[4..];
    if rest.is_empty() {
        return Some((year, None));
    }

    let month_part: String = rest
        .trim_start_matches(['M', 'm', '-'])
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if month_part.is_empty() {
        return None;
    }
    let month: u32 = month_part.parse().ok()?;
    if (1..=12).contains(&month) {
        Some((year, Some(month)))
    } else {
        None
    }
}

/// Normalizes a NACE activity code: trims, uppercases, strips a `NACE_`
/// prefix. Empty and "TOTAL" codes mean all activities and return `None`.
pub fn normalize_nace_code(nace: &str) -> Option<String> {
    let mut code = nace.trim().to_uppercase();
    if let Some(stripped) = code.strip_prefix("NACE_") {
        code = stripped.to_string();
    } else if let Some(stripped) = code.strip_prefix("NACE") {
        code = stripped.to_string();
    }
    if code.is_empty() || code == "TOTAL" {
        None
    } else {
        Some(code)
    }
}

/// Parses an observation value from a JSON number or numeric string.
pub fn parse_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn monthly_periods() {
        assert_eq!(parse_time_period("2023M01"), Some((2023, Some(1))));
        assert_eq!(parse_time_period("2023-11"), Some((2023, Some(11))));
        assert_eq!(parse_time_period("202307"), Some((2023, Some(7))));
    }

    #[test]
    fn annual_periods() {
        assert_eq!(parse_time_period("2023"), Some((2023, None)));
        assert_eq!(parse_time_period(" 1999 "), Some((1999, None)));
    }

    #[test]
    fn invalid_periods() {
        assert_eq!(parse_time_period("2023M13"), None);
        assert_eq!(parse_time_period("23M01"), None);
        assert_eq!(parse_time_period("soon"), None);
    }

    #[test]
    fn nace_normalization() {
        assert_eq!(normalize_nace_code("C").as_deref(), Some("C"));
        assert_eq!(normalize_nace_code("nace_b-d").as_deref(), Some("B-D"));
        assert_eq!(normalize_nace_code(" c10-c12 ").as_deref(), Some("C10-C12"));
        assert_eq!(normalize_nace_code("TOTAL"), None);
        assert_eq!(normalize_nace_code("  "), None);
    }

    #[test]
    fn value_parsing() {
        assert_eq!(parse_value(&json!(104.2)), Some(104.2));
        assert_eq!(parse_value(&json!("99.5")), Some(99.5));
        assert_eq!(parse_value(&json!(":")), None);
        assert_eq!(parse_value(&json!(null)), None);
    }
}
