//! Dataset descriptor registry: parsing, normalization, and lookup.
//!
//! Descriptors are declarative data. Each one names a Eurostat dataset id,
//! the family it belongs to (demographic or industrial), how its JSON-stat
//! dimensions map onto our standard axes, and the default query parameters
//! to send upstream. Adding a dataset is a configuration change only; the
//! pipeline code never special-cases individual dataset ids.
//!
//! Key behaviors:
//! - Normalization trims whitespace and lowercases dataset ids, and rejects
//!   duplicates after normalization.
//! - The registry is immutable after loading and safe for concurrent reads.
//!
//! Entrypoints:
//! - Built-in descriptors shipped with the crate: [`DatasetRegistry::builtin`]
//! - Parse + normalize from a TOML string: [`DatasetRegistry::from_toml_str`]
//! - Parse + normalize from a file path: [`DatasetRegistry::from_path`]

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Descriptors for the datasets the crawler knows about out of the box.
const BUILTIN_TOML: &str = include_str!("../datasets.toml");

/// The dataset family, which fixes the shape of the normalized fact.
///
/// The set of dimension combinations upstream is small and enumerable, so a
/// closed enum is enough; no dynamic dispatch is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Population counts broken down by sex and age band.
    Demographic,
    /// Index/level series broken down by NACE activity (production, orders,
    /// energy, labour stress all share this shape).
    Industrial,
}

/// Maps JSON-stat dimension ids onto the standard axes we normalize into.
///
/// An absent optional axis means the dataset has no such breakdown, and the
/// normalizer simply omits the field rather than special-casing the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionMap {
    /// Geography dimension id (e.g. "geo").
    #[serde(default = "default_geo")]
    pub geo: String,
    /// Time dimension id (e.g. "time").
    #[serde(default = "default_time")]
    pub time: String,
    /// Sex dimension id, if the dataset has a sex breakdown.
    #[serde(default)]
    pub sex: Option<String>,
    /// Age dimension id, if the dataset has an age breakdown.
    #[serde(default)]
    pub age: Option<String>,
    /// NACE activity dimension id, if present (e.g. "nace_r2").
    #[serde(default)]
    pub nace: Option<String>,
    /// Unit dimension id, if present (e.g. "unit").
    #[serde(default)]
    pub unit: Option<String>,
}

fn default_geo() -> String {
    "geo".to_string()
}

fn default_time() -> String {
    "time".to_string()
}

impl Default for DimensionMap {
    fn default() -> Self {
        Self {
            geo: default_geo(),
            time: default_time(),
            sex: None,
            age: None,
            nace: None,
            unit: None,
        }
    }
}

/// Static configuration for one upstream dataset.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetDescriptor {
    /// Eurostat dataset id (e.g. "demo_pjan"). Normalized lowercase.
    #[serde(skip)]
    pub id: String,
    /// Which fact shape this dataset normalizes into.
    pub kind: DatasetKind,
    /// JSON-stat dimension ids for this dataset.
    #[serde(default)]
    pub dims: DimensionMap,
    /// Query parameters applied when the caller does not override them.
    ///
    /// Order is preserved so requests are reproducible byte-for-byte.
    #[serde(default)]
    pub default_params: IndexMap<String, String>,
    /// Field carrying the observation value in flattened records.
    #[serde(default = "default_value_field")]
    pub value_field: String,
}

fn default_value_field() -> String {
    "value".to_string()
}

/// Errors raised while loading or consulting the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A dataset id was requested that the registry does not know.
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    /// The registry TOML could not be parsed.
    #[error("failed to parse dataset registry TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The registry file could not be read.
    #[error("failed to read dataset registry file: {0}")]
    Io(#[from] std::io::Error),

    /// A dataset id was empty or collided with another after normalization.
    #[error("invalid dataset id in registry: {0}")]
    InvalidId(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    datasets: IndexMap<String, DatasetDescriptor>,
}

/// Immutable catalogue of dataset descriptors, looked up by id.
#[derive(Debug, Clone)]
pub struct DatasetRegistry {
    datasets: IndexMap<String, DatasetDescriptor>,
}

impl DatasetRegistry {
    /// Loads the descriptors bundled with this crate.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_toml_str(BUILTIN_TOML)
    }

    /// Parses and normalizes a registry from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(toml_str)?;

        let mut datasets: IndexMap<String, DatasetDescriptor> = IndexMap::new();
        for (raw_id, mut descriptor) in file.datasets {
            let id = raw_id.trim().to_lowercase();
            if id.is_empty() {
                return Err(RegistryError::InvalidId(
                    "dataset id is empty after trimming".to_string(),
                ));
            }
            if datasets.contains_key(&id) {
                return Err(RegistryError::InvalidId(format!(
                    "duplicate dataset id after normalization: {id}"
                )));
            }
            descriptor.id = id.clone();
            datasets.insert(id, descriptor);
        }

        Ok(Self { datasets })
    }

    /// Reads, parses, and normalizes a registry TOML file from disk.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Looks up a descriptor by dataset id.
    pub fn lookup(&self, dataset_id: &str) -> Result<&DatasetDescriptor, RegistryError> {
        let id = dataset_id.trim().to_lowercase();
        self.datasets
            .get(&id)
            .ok_or(RegistryError::UnknownDataset(id))
    }

    /// All descriptors in declaration order, for batch ingestion drivers.
    pub fn all(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.datasets.values()
    }

    /// Number of registered datasets.
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// True when the registry holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
