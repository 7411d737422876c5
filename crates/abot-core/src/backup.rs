use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{store::Store, Result};

/// Whole-store backup and recovery over a shared [`Store`].
///
/// At most one recovery runs at a time; a second request while one is in
/// flight is refused rather than queued.
pub struct BackupCoordinator {
    store: Arc<Store>,
    recovering: AtomicBool,
}

impl BackupCoordinator {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            recovering: AtomicBool::new(false),
        }
    }

    pub fn backup(&self) -> Result<String> {
        let data = self.store.backup_all()?;
        tracing::info!(bytes = data.len(), "backup created");
        Ok(data)
    }

    /// Restore from `data`, rolling back to the current state on failure.
    pub fn recover(&self, data: &str) -> bool {
        if self
            .recovering
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("recovery already in progress; request refused");
            return false;
        }

        let ok = self.store.restore_all(data);
        self.recovering.store(false, Ordering::Release);

        if ok {
            tracing::info!(bytes = data.len(), "recovery succeeded");
        } else {
            tracing::warn!(bytes = data.len(), "recovery failed; previous state kept");
        }
        ok
    }

    pub fn is_recovering(&self) -> bool {
        self.recovering.load(Ordering::Acquire)
    }

    pub fn info(&self, collection: &str) -> Result<String> {
        self.store.describe(collection)
    }

    pub fn summary(&self) -> String {
        self.store.summary()
    }
}
