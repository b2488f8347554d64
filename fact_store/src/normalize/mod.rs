//! Normalization of flattened upstream records into unified facts.
//!
//! The mapping is entirely descriptor-driven: which JSON-stat dimension
//! feeds which fact field comes from the [`DatasetDescriptor`], so a dataset
//! without a sex or age breakdown simply produces facts without those fields
//! and no pipeline code special-cases dataset ids.
//!
//! A malformed individual record (missing required dimension, unparseable
//! numeric value, out-of-range year) is dropped, never fatal: per-record
//! problems must not abort a batch. Raw upstream shapes never escape this
//! module.

pub mod demographic;
pub mod industrial;

use stat_ingestor::jsonstat::{FlatRecord, canonical_age, canonical_sex, year_from_time};
use stat_ingestor::registry::{DatasetDescriptor, DatasetKind};

/// Years outside this window are treated as malformed.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1800..=2100;

/// Region identity carried by a fact before database resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRef {
    /// Stable region code.
    pub code: String,
    /// Display name; falls back to the code when upstream has no label.
    pub name: String,
}

/// One normalized observation, tagged by dataset family.
///
/// Optional dimension values mean "all"/total for that axis.
#[derive(Debug, Clone, PartialEq)]
pub enum FactRecord {
    /// Population count by region/year/sex/age band.
    Demographic {
        /// Region the count applies to.
        region: RegionRef,
        /// Reference year.
        year: i32,
        /// "M", "F", "O", or "Total".
        sex: String,
        /// Inclusive lower age bound; `None` means all ages.
        age_min: Option<i32>,
        /// Exclusive upper age bound; `None` means open-ended or all.
        age_max: Option<i32>,
        /// Population count.
        population: i64,
    },
    /// Index/level observation by region/period/activity.
    Industrial {
        /// Region the observation applies to.
        region: RegionRef,
        /// Reference year.
        year: i32,
        /// Month 1-12; `None` means annual.
        month: Option<u32>,
        /// NACE activity code; `None` means all activities.
        nace: Option<String>,
        /// Observation value.
        value: f64,
        /// Unit code as reported upstream.
        unit: Option<String>,
    },
}

impl FactRecord {
    /// The region this fact references.
    pub fn region(&self) -> &RegionRef {
        match self {
            FactRecord::Demographic { region, .. } => region,
            FactRecord::Industrial { region, .. } => region,
        }
    }
}

/// Per-batch normalization accounting, reported for observability.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DropStats {
    /// Records offered to the normalizer.
    pub input: usize,
    /// Records that produced a fact.
    pub kept: usize,
    /// Records dropped as malformed.
    pub dropped: usize,
}

/// Normalizes one flattened record, or `None` when it is malformed.
pub fn normalize_record(record: &FlatRecord, descriptor: &DatasetDescriptor) -> Option<FactRecord> {
    let dims = &descriptor.dims;

    let geo_code = record.code(&dims.geo)?.trim();
    if geo_code.is_empty() {
        return None;
    }
    let region = RegionRef {
        code: geo_code.to_string(),
        name: record
            .label(&dims.geo)
            .unwrap_or(geo_code)
            .trim()
            .to_string(),
    };

    let time_code = record.code(&dims.time);
    let time_label = record.label(&dims.time);
    let year = year_from_time(time_code, time_label)?;
    if !YEAR_RANGE.contains(&year) {
        return None;
    }

    match descriptor.kind {
        DatasetKind::Demographic => {
            let sex = match &dims.sex {
                Some(dim) => {
                    let code = record.code(dim)?;
                    demographic::normalize_sex(canonical_sex(Some(code), record.label(dim)))?
                }
                None => "Total".to_string(),
            };
            let (age_min, age_max) = match &dims.age {
                Some(dim) => {
                    let code = record.code(dim)?;
                    match canonical_age(Some(code), record.label(dim)) {
                        Some(band) => demographic::parse_age_band(&band)?,
                        None => (None, None),
                    }
                }
                None => (None, None),
            };
            let population = demographic::parse_count(&record.value)?;
            Some(FactRecord::Demographic {
                region,
                year,
                sex,
                age_min,
                age_max,
                population,
            })
        }
        DatasetKind::Industrial => {
            let (year, month) = match time_code {
                Some(code) => industrial::parse_time_period(code)?,
                None => (year, None),
            };
            if !YEAR_RANGE.contains(&year) {
                return None;
            }
            let nace = dims
                .nace
                .as_ref()
                .and_then(|dim| record.code(dim))
                .and_then(industrial::normalize_nace_code);
            let unit = dims
                .unit
                .as_ref()
                .and_then(|dim| record.code(dim))
                .map(str::to_string);
            let value = industrial::parse_value(&record.value)?;
            Some(FactRecord::Industrial {
                region,
                year,
                month,
                nace,
                value,
                unit,
            })
        }
    }
}

/// Normalizes a batch, dropping malformed records and counting them.
///
/// Never fails: the worst input yields an empty vector and a full drop
/// count.
pub fn normalize_batch(
    records: &[FlatRecord],
    descriptor: &DatasetDescriptor,
) -> (Vec<FactRecord>, DropStats) {
    let mut stats = DropStats {
        input: records.len(),
        ..DropStats::default()
    };
    let mut facts = Vec::with_capacity(records.len());

    for record in records {
        match normalize_record(record, descriptor) {
            Some(fact) => {
                stats.kept += 1;
                facts.push(fact);
            }
            None => {
                stats.dropped += 1;
                tracing::debug!(dataset_id = %descriptor.id, codes = ?record.codes, "dropped malformed record");
            }
        }
    }

    (facts, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;
    use stat_ingestor::registry::{DatasetRegistry, DimensionMap};

    fn demo_descriptor() -> DatasetDescriptor {
        DatasetRegistry::builtin()
            .unwrap()
            .lookup("demo_pjan")
            .unwrap()
            .clone()
    }

    fn flat(codes: &[(&str, &str)], value: serde_json::Value) -> FlatRecord {
        FlatRecord {
            codes: codes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            labels: IndexMap::new(),
            value,
        }
    }

    #[test]
    fn demographic_record_normalizes() {
        let rec = flat(
            &[("geo", "DE"), ("time", "2023"), ("sex", "M"), ("age", "Y0-4")],
            json!(2_000_000),
        );
        let fact = normalize_record(&rec, &demo_descriptor()).unwrap();
        assert_eq!(
            fact,
            FactRecord::Demographic {
                region: RegionRef {
                    code: "DE".to_string(),
                    name: "DE".to_string()
                },
                year: 2023,
                sex: "M".to_string(),
                age_min: Some(0),
                age_max: Some(5),
                population: 2_000_000,
            }
        );
    }

    #[test]
    fn non_numeric_value_is_dropped() {
        let rec = flat(
            &[("geo", "DE"), ("time", "2023"), ("sex", "F"), ("age", "Y0-4")],
            json!("N/A"),
        );
        assert!(normalize_record(&rec, &demo_descriptor()).is_none());
    }

    #[test]
    fn missing_required_dimension_is_dropped() {
        // Descriptor declares a sex dimension but the record lacks it.
        let rec = flat(&[("geo", "DE"), ("time", "2023"), ("age", "Y0-4")], json!(1));
        assert!(normalize_record(&rec, &demo_descriptor()).is_none());

        // No geography at all.
        let rec = flat(&[("time", "2023"), ("sex", "M"), ("age", "TOTAL")], json!(1));
        assert!(normalize_record(&rec, &demo_descriptor()).is_none());
    }

    #[test]
    fn out_of_range_year_is_dropped() {
        let rec = flat(
            &[("geo", "DE"), ("time", "9999"), ("sex", "T"), ("age", "TOTAL")],
            json!(1),
        );
        assert!(normalize_record(&rec, &demo_descriptor()).is_none());
    }

    #[test]
    fn totals_map_to_absent_dimensions() {
        let rec = flat(
            &[("geo", "DE"), ("time", "2023"), ("sex", "T"), ("age", "TOTAL")],
            json!(83_000_000),
        );
        match normalize_record(&rec, &demo_descriptor()).unwrap() {
            FactRecord::Demographic {
                sex,
                age_min,
                age_max,
                ..
            } => {
                assert_eq!(sex, "Total");
                assert_eq!(age_min, None);
                assert_eq!(age_max, None);
            }
            other => panic!("expected demographic fact, got {other:?}"),
        }
    }

    #[test]
    fn dataset_without_sex_or_age_axes_omits_them() {
        let descriptor = DatasetDescriptor {
            id: "demo_minimal".to_string(),
            kind: DatasetKind::Demographic,
            dims: DimensionMap::default(),
            default_params: IndexMap::new(),
            value_field: "value".to_string(),
        };
        let rec = flat(&[("geo", "FR"), ("time", "2020")], json!(67_000_000));
        match normalize_record(&rec, &descriptor).unwrap() {
            FactRecord::Demographic { sex, age_min, .. } => {
                assert_eq!(sex, "Total");
                assert_eq!(age_min, None);
            }
            other => panic!("expected demographic fact, got {other:?}"),
        }
    }

    #[test]
    fn industrial_record_normalizes_with_month_and_nace() {
        let descriptor = DatasetRegistry::builtin()
            .unwrap()
            .lookup("sts_inpr_m")
            .unwrap()
            .clone();
        let rec = flat(
            &[
                ("geo", "DE"),
                ("time", "2023M03"),
                ("nace_r2", "C"),
                ("unit", "I21"),
            ],
            json!(104.2),
        );
        match normalize_record(&rec, &descriptor).unwrap() {
            FactRecord::Industrial {
                year,
                month,
                nace,
                value,
                unit,
                ..
            } => {
                assert_eq!(year, 2023);
                assert_eq!(month, Some(3));
                assert_eq!(nace.as_deref(), Some("C"));
                assert_eq!(value, 104.2);
                assert_eq!(unit.as_deref(), Some("I21"));
            }
            other => panic!("expected industrial fact, got {other:?}"),
        }
    }

    #[test]
    fn batch_counts_drops_without_failing() {
        let descriptor = demo_descriptor();
        let records = vec![
            flat(
                &[("geo", "DE"), ("time", "2023"), ("sex", "M"), ("age", "Y0-4")],
                json!(2_000_000),
            ),
            flat(
                &[("geo", "DE"), ("time", "2023"), ("sex", "F"), ("age", "Y0-4")],
                json!("N/A"),
            ),
        ];
        let (facts, stats) = normalize_batch(&records, &descriptor);
        assert_eq!(facts.len(), 1);
        assert_eq!(
            stats,
            DropStats {
                input: 2,
                kept: 1,
                dropped: 1
            }
        );
    }
}
