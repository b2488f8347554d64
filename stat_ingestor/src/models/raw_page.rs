use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One successfully fetched page of upstream data, payload plus provenance.
///
/// The payload is kept byte-for-byte as received; the content hash and the
/// exact query parameters let the store archive an audit trail proving where
/// every normalized fact originated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawPage {
    /// Dataset this page belongs to.
    pub dataset_id: String,

    /// Zero-based page number within the fetch.
    pub page: u32,

    /// The exact query parameters sent upstream for this page, in order.
    pub params: IndexMap<String, String>,

    /// When the page was retrieved (UTC).
    pub fetched_at: DateTime<Utc>,

    /// Raw response body, unmodified.
    pub body: Vec<u8>,

    /// Lowercase hex SHA-256 of `body`.
    pub content_hash: String,
}

impl RawPage {
    /// Builds a page from a response body, stamping the fetch time and hash.
    pub fn new(
        dataset_id: impl Into<String>,
        page: u32,
        params: IndexMap<String, String>,
        body: Vec<u8>,
    ) -> Self {
        let content_hash = hex_sha256(&body);
        Self {
            dataset_id: dataset_id.into(),
            page,
            params,
            fetched_at: Utc::now(),
            body,
            content_hash,
        }
    }
}

/// Lowercase hex SHA-256 digest of a byte slice.
pub fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_hex() {
        let a = hex_sha256(b"hello");
        let b = hex_sha256(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_bodies_hash_differently() {
        let page_a = RawPage::new("demo_pjan", 0, IndexMap::new(), b"{}".to_vec());
        let page_b = RawPage::new("demo_pjan", 0, IndexMap::new(), b"{ }".to_vec());
        assert_ne!(page_a.content_hash, page_b.content_hash);
    }
}
