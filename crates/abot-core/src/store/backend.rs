use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::Result;

/// Where committed store contents go.
///
/// Backends only move encoded snapshots around; the store owns the format.
pub trait StoreBackend: Send + Sync {
    /// Last committed contents, or `None` for a fresh store.
    fn load(&self) -> Result<Option<String>>;

    fn save(&self, data: &str) -> Result<()>;
}

/// Keeps the last commit in memory (offline runs, tests).
#[derive(Debug, Default)]
pub struct MemoryBackend {
    committed: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn last_commit(&self) -> Option<String> {
        self.committed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.last_commit())
    }

    fn save(&self, data: &str) -> Result<()> {
        *self.committed.lock().unwrap_or_else(|e| e.into_inner()) = Some(data.to_string());
        Ok(())
    }
}

/// Single JSON file, replaced atomically on every commit.
#[derive(Clone, Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StoreBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let txt = fs::read_to_string(&self.path)?;
        if txt.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(txt))
    }

    fn save(&self, data: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let tmp = self.tmp_path();
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
