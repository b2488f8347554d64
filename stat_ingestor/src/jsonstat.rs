//! JSON-stat 2.0 decoding.
//!
//! The Eurostat dissemination API returns JSON-stat 2.0 datasets: an ordered
//! list of dimensions with sizes, and a row-major `value` array (dense list
//! or sparse index map). [`flatten`] expands that into one record per
//! observation, carrying dimension codes and labels so downstream mapping
//! can fall back to labels when codes are opaque.
//!
//! The module also canonicalizes the Eurostat coding conventions the
//! normalizer should not have to know about: time codes to years, sex codes
//! to M/F/Total, and age codes (`Y0-4`, `Y_GE85`, `Y_LT5`) to plain band
//! strings like `"0-4"` and `"85+"`.

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

/// A malformed JSON-stat dataset. Fatal for the page it came from.
#[derive(Debug, Error)]
pub enum JsonStatError {
    /// The dataset lacks matching `id`/`size` vectors.
    #[error("invalid JSON-stat dataset: missing or mismatched id/size")]
    BadShape,

    /// A dimension's category index is missing or inconsistent.
    #[error("invalid JSON-stat category index for dimension {0}")]
    BadDimension(String),

    /// The `value` field is neither a dense list nor a sparse index map.
    #[error("unsupported JSON-stat value field")]
    BadValue,

    /// The dense `value` list does not cover the dimension product.
    #[error("JSON-stat value length mismatch: expected {expected}, got {got}")]
    ValueLength {
        /// Product of all dimension sizes.
        expected: usize,
        /// Length of the `value` list.
        got: usize,
    },
}

/// One flattened observation: dimension codes, labels, and the raw value.
#[derive(Clone, Debug)]
pub struct FlatRecord {
    /// Dimension id -> category code, in dataset dimension order.
    pub codes: IndexMap<String, String>,
    /// Dimension id -> human-readable label, where the dataset provides one.
    pub labels: IndexMap<String, String>,
    /// The observation value as found in the payload (number or string).
    pub value: Value,
}

impl FlatRecord {
    /// Code for a dimension, if the dataset has it.
    pub fn code(&self, dim: &str) -> Option<&str> {
        self.codes.get(dim).map(String::as_str)
    }

    /// Label for a dimension, if the dataset provides one.
    pub fn label(&self, dim: &str) -> Option<&str> {
        self.labels.get(dim).map(String::as_str)
    }
}

struct Dimension {
    id: String,
    codes_by_pos: Vec<String>,
    labels_by_code: IndexMap<String, String>,
}

fn decode_dimension(dataset: &Value, dim_id: &str) -> Result<Dimension, JsonStatError> {
    let bad = || JsonStatError::BadDimension(dim_id.to_string());

    let category = dataset
        .get("dimension")
        .and_then(|d| d.get(dim_id))
        .and_then(|d| d.get("category"))
        .ok_or_else(bad)?;

    // category.index is either a list (pos -> code) or a map (code -> pos).
    let codes_by_pos = match category.get("index") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                other => Ok(other.to_string()),
            })
            .collect::<Result<Vec<_>, JsonStatError>>()?,
        Some(Value::Object(map)) => {
            let mut by_pos: Vec<Option<String>> = vec![None; map.len()];
            for (code, pos) in map {
                let pos = pos.as_u64().ok_or_else(bad)? as usize;
                if pos >= by_pos.len() {
                    return Err(bad());
                }
                by_pos[pos] = Some(code.clone());
            }
            by_pos
                .into_iter()
                .collect::<Option<Vec<_>>>()
                .ok_or_else(bad)?
        }
        // A single-category dimension may omit the index entirely.
        None => match category.get("label").and_then(Value::as_object) {
            Some(labels) if labels.len() == 1 => {
                vec![labels.keys().next().cloned().unwrap_or_default()]
            }
            _ => return Err(bad()),
        },
        Some(_) => return Err(bad()),
    };

    let mut labels_by_code = IndexMap::new();
    if let Some(labels) = category.get("label").and_then(Value::as_object) {
        for (code, label) in labels {
            if let Value::String(s) = label {
                labels_by_code.insert(code.clone(), s.clone());
            }
        }
    }

    Ok(Dimension {
        id: dim_id.to_string(),
        codes_by_pos,
        labels_by_code,
    })
}

fn values_as_list(dataset: &Value, total_size: usize) -> Result<Vec<Value>, JsonStatError> {
    match dataset.get("value") {
        Some(Value::Array(items)) => {
            if items.len() != total_size {
                return Err(JsonStatError::ValueLength {
                    expected: total_size,
                    got: items.len(),
                });
            }
            Ok(items.clone())
        }
        Some(Value::Object(map)) => {
            // Sparse form: linear index -> value; absent entries are null.
            let mut out = vec![Value::Null; total_size];
            for (k, v) in map {
                let idx: usize = k.parse().map_err(|_| JsonStatError::BadValue)?;
                if idx >= total_size {
                    return Err(JsonStatError::BadValue);
                }
                out[idx] = v.clone();
            }
            Ok(out)
        }
        _ => Err(JsonStatError::BadValue),
    }
}

/// Flattens a JSON-stat 2.0 dataset into one record per non-null observation.
pub fn flatten(dataset: &Value) -> Result<Vec<FlatRecord>, JsonStatError> {
    let dim_ids: Vec<String> = dataset
        .get("id")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let sizes: Vec<usize> = dataset
        .get("size")
        .and_then(Value::as_array)
        .map(|sizes| {
            sizes
                .iter()
                .filter_map(Value::as_u64)
                .map(|n| n as usize)
                .collect()
        })
        .unwrap_or_default();

    if dim_ids.is_empty() || dim_ids.len() != sizes.len() {
        return Err(JsonStatError::BadShape);
    }

    let dims = dim_ids
        .iter()
        .map(|id| decode_dimension(dataset, id))
        .collect::<Result<Vec<_>, _>>()?;
    for (dim, size) in dims.iter().zip(&sizes) {
        if dim.codes_by_pos.len() != *size {
            return Err(JsonStatError::BadDimension(dim.id.clone()));
        }
    }

    let total_size: usize = sizes.iter().product();
    let values = values_as_list(dataset, total_size)?;

    // Row-major: the last dimension varies fastest.
    let mut multipliers = vec![1usize; sizes.len()];
    for i in (0..sizes.len().saturating_sub(1)).rev() {
        multipliers[i] = multipliers[i + 1] * sizes[i + 1];
    }

    let mut records = Vec::new();
    for (linear_idx, value) in values.into_iter().enumerate() {
        if value.is_null() {
            continue;
        }
        let mut codes = IndexMap::with_capacity(dims.len());
        let mut labels = IndexMap::new();
        let mut remaining = linear_idx;
        for (dim, mult) in dims.iter().zip(&multipliers) {
            let pos = remaining / mult;
            remaining %= mult;
            let code = &dim.codes_by_pos[pos];
            codes.insert(dim.id.clone(), code.clone());
            if let Some(label) = dim.labels_by_code.get(code) {
                labels.insert(dim.id.clone(), label.clone());
            }
        }
        records.push(FlatRecord {
            codes,
            labels,
            value,
        });
    }

    Ok(records)
}

/// True when the dataset carries no observations at all.
///
/// Used by the pager to recognize the upstream end-of-data signal.
pub fn is_empty_dataset(dataset: &Value) -> bool {
    match dataset.get("value") {
        Some(Value::Array(items)) => items.iter().all(Value::is_null),
        Some(Value::Object(map)) => map.is_empty(),
        _ => true,
    }
}

/// Extracts a four-digit year from a time code or label ("2023", "2023M01").
pub fn year_from_time(code: Option<&str>, label: Option<&str>) -> Option<i32> {
    code.and_then(find_year).or_else(|| label.and_then(find_year))
}

fn find_year(s: &str) -> Option<i32> {
    let bytes = s.as_bytes();
    for start in 0..bytes.len().saturating_sub(3) {
        let window = &bytes[start..start + 4];
        if window.iter().all(u8::is_ascii_digit) {
            return std::str::from_utf8(window).ok()?.parse().ok();
        }
    }
    None
}

/// Canonicalizes a Eurostat sex code/label to "M", "F", or "Total".
pub fn canonical_sex(code: Option<&str>, label: Option<&str>) -> Option<String> {
    let c = code.unwrap_or("").trim().to_uppercase();
    match c.as_str() {
        "M" | "F" => return Some(c),
        "T" | "TOTAL" => return Some("Total".to_string()),
        _ => {}
    }
    let l = label.unwrap_or("").trim().to_lowercase();
    match l.as_str() {
        "male" | "males" | "men" => Some("M".to_string()),
        "female" | "females" | "women" => Some("F".to_string()),
        "total" | "both sexes" => Some("Total".to_string()),
        _ if !c.is_empty() => Some(c),
        _ => None,
    }
}

/// Canonicalizes a Eurostat age code to a plain band string.
///
/// `Y0` -> "0", `Y0-4`/`Y0_4` -> "0-4", `Y_GE85` -> "85+", `Y_LT5` ->
/// "under 5". Totals return `None`, meaning "all ages".
pub fn canonical_age(code: Option<&str>, label: Option<&str>) -> Option<String> {
    let c = code.unwrap_or("").trim().to_uppercase();
    if c.is_empty() {
        return label.map(str::to_string);
    }
    if c == "TOTAL" || c == "T" {
        return None;
    }
    if let Some(rest) = c.strip_prefix("Y_GE") {
        if let Ok(n) = rest.parse::<u32>() {
            return Some(format!("{n}+"));
        }
        return label.map(str::to_string);
    }
    if let Some(rest) = c.strip_prefix("Y_LT") {
        if let Ok(n) = rest.parse::<u32>() {
            return Some(format!("under {n}"));
        }
        return label.map(str::to_string);
    }
    if let Some(rest) = c.strip_prefix('Y') {
        let band = rest.replace('_', "-");
        if band.contains('-') {
            return Some(band);
        }
        if let Ok(n) = rest.parse::<u32>() {
            return Some(n.to_string());
        }
    }
    // Fall back to the label, which is often already "0-4" style.
    label.map(str::to_string).or(Some(c))
}
