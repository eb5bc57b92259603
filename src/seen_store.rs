use crate::models::SeenSet;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

/// Durable home of the seen set.
pub trait SeenStore {
    /// Never fails: unreadable state degrades to an empty set, which at worst
    /// re-reports every current listing once.
    fn load(&self) -> SeenSet;

    fn save(&self, seen: &SeenSet) -> Result<()>;
}

/// Seen set stored as a JSON array of ids.
pub struct JsonSeenStore {
    path: PathBuf,
}

impl JsonSeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<SeenSet> {
        let data = fs::read_to_string(&self.path)
            .context(format!("Failed to read seen listings file: {}", self.path.display()))?;
        let seen: SeenSet = serde_json::from_str(&data)
            .context(format!("Failed to parse seen listings file: {}", self.path.display()))?;
        Ok(seen)
    }
}

impl SeenStore for JsonSeenStore {
    fn load(&self) -> SeenSet {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "seen listings file does not exist, starting empty");
            return SeenSet::new();
        }

        match self.read() {
            Ok(seen) => {
                debug!(path = %self.path.display(), count = seen.len(), "loaded seen listings");
                seen
            }
            Err(e) => {
                error!("Error loading seen listings: {:#}", e);
                warn!("Starting with an empty seen set; current listings will be reported again");
                SeenSet::new()
            }
        }
    }

    fn save(&self, seen: &SeenSet) -> Result<()> {
        // Write next to the target so the final rename stays on one filesystem.
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .context(format!("Failed to create directory: {}", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .context(format!("Failed to create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, seen).context("Failed to serialize seen listings")?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all().context("Failed to flush seen listings")?;

        tmp.persist(&self.path)
            .context(format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), count = seen.len(), "saved seen listings");
        Ok(())
    }
}

/// Store kept in memory, shared between clones. Useful for dry runs and tests.
#[derive(Clone, Default)]
pub struct MemorySeenStore {
    inner: Arc<Mutex<SeenSet>>,
}

impl MemorySeenStore {
    pub fn new(initial: SeenSet) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn snapshot(&self) -> SeenSet {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SeenStore for MemorySeenStore {
    fn load(&self) -> SeenSet {
        self.snapshot()
    }

    fn save(&self, seen: &SeenSet) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("seen store lock poisoned"))?;
        *guard = seen.clone();
        Ok(())
    }
}
