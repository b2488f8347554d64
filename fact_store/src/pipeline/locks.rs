//! Keyed per-dataset locks.
//!
//! Two runs for the same dataset must not interleave page commits, so each
//! dataset id maps to its own async mutex. Acquisition carries a wait
//! budget: a caller that cannot get the lock in time fails fast instead of
//! queueing behind a long run.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;

use crate::pipeline::IngestError;

/// One async mutex per dataset id, created on first use.
#[derive(Debug, Default)]
pub struct DatasetLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DatasetLocks {
    /// An empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, dataset_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(dataset_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Acquires the lock for `dataset_id`, waiting at most `wait`.
    pub async fn acquire(
        &self,
        dataset_id: &str,
        wait: Duration,
    ) -> Result<OwnedMutexGuard<()>, IngestError> {
        let lock = self.entry(dataset_id);
        tokio::time::timeout(wait, lock.lock_owned())
            .await
            .map_err(|_| IngestError::LockTimeout {
                dataset_id: dataset_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_dataset_is_serialized() {
        let locks = DatasetLocks::new();
        let guard = locks
            .acquire("demo_pjan", Duration::from_millis(50))
            .await
            .unwrap();

        let err = locks
            .acquire("demo_pjan", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::LockTimeout { ref dataset_id } if dataset_id == "demo_pjan"
        ));

        drop(guard);
        locks
            .acquire("demo_pjan", Duration::from_millis(50))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn distinct_datasets_do_not_contend() {
        let locks = DatasetLocks::new();
        let _a = locks
            .acquire("demo_pjan", Duration::from_millis(50))
            .await
            .unwrap();
        let _b = locks
            .acquire("sts_inpr_m", Duration::from_millis(50))
            .await
            .unwrap();
    }
}
