use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::registry::DatasetDescriptor;

/// Parameters for one fetch of one dataset.
///
/// Overrides win over the descriptor's default params; `start_page` lets a
/// caller resume a partially completed fetch by re-issuing only the page it
/// stopped at.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Descriptor of the dataset to fetch.
    pub descriptor: DatasetDescriptor,

    /// Caller-supplied query parameters layered over the defaults.
    #[serde(default)]
    pub overrides: IndexMap<String, String>,

    /// First page to request (zero-based).
    #[serde(default)]
    pub start_page: u32,
}

impl FetchRequest {
    /// A request for the whole dataset with no overrides.
    pub fn for_descriptor(descriptor: &DatasetDescriptor) -> Self {
        Self {
            descriptor: descriptor.clone(),
            overrides: IndexMap::new(),
            start_page: 0,
        }
    }

    /// Adds a query parameter override.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Starts fetching at the given page instead of page zero.
    pub fn starting_at(mut self, page: u32) -> Self {
        self.start_page = page;
        self
    }
}
