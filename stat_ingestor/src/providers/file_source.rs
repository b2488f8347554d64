//! Local-file provider for datasets staged on disk.
//!
//! Two layouts are supported under the provider's root directory:
//! a per-dataset directory of page files (`<root>/<dataset_id>/page-0.json`,
//! `page-1.json`, ...) for paged extractions, or a single
//! `<root>/<dataset_id>.json` holding the whole dataset as page zero. A
//! missing page file is the end-of-data signal, so dropping files into the
//! directory is all it takes to stage a dataset.
//!
//! Bodies are the same JSON-stat documents the REST client receives; the
//! downstream snapshot and decode path is identical for both source types.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indexmap::IndexMap;
use snafu::ResultExt;

use crate::models::{raw_page::RawPage, request::FetchRequest};
use crate::providers::{IoSnafu, PageStream, SourceError, StatProvider};

/// Source client for datasets staged as local JSON files.
#[derive(Debug, Clone)]
pub struct FileProvider {
    root: PathBuf,
}

impl FileProvider {
    /// Creates a provider serving files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dataset_dir(&self, dataset_id: &str) -> PathBuf {
        self.root.join(dataset_id)
    }

    fn single_file(&self, dataset_id: &str) -> PathBuf {
        self.root.join(format!("{dataset_id}.json"))
    }
}

impl StatProvider for FileProvider {
    fn pages<'a>(&'a self, request: FetchRequest) -> Box<dyn PageStream + 'a> {
        Box::new(FilePager {
            provider: self,
            page: request.start_page,
            request,
            done: false,
        })
    }

    fn source_type(&self) -> &'static str {
        "file"
    }
}

struct FilePager<'a> {
    provider: &'a FileProvider,
    request: FetchRequest,
    page: u32,
    done: bool,
}

async fn read_page(path: &Path) -> Result<Option<Vec<u8>>, SourceError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).context(IoSnafu {
            path: path.display().to_string(),
        }),
    }
}

#[async_trait]
impl PageStream for FilePager<'_> {
    async fn next_page(&mut self) -> Result<Option<RawPage>, SourceError> {
        if self.done {
            return Ok(None);
        }

        let dataset_id = &self.request.descriptor.id;
        let dir = self.provider.dataset_dir(dataset_id);

        let (path, single) = if dir.is_dir() {
            (dir.join(format!("page-{}.json", self.page)), false)
        } else {
            (self.provider.single_file(dataset_id), true)
        };
        // The single-file layout is exactly one page: page zero.
        if single && self.page != 0 {
            self.done = true;
            return Ok(None);
        }

        let Some(body) = read_page(&path).await? else {
            self.done = true;
            return Ok(None);
        };

        let mut params = IndexMap::new();
        params.insert("path".to_string(), path.display().to_string());
        let raw = RawPage::new(dataset_id.clone(), self.page, params, body);

        if single {
            self.done = true;
        }
        self.page += 1;
        Ok(Some(raw))
    }
}
