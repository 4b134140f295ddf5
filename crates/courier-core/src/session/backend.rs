//! Durable homes for the session record.
//!
//! A backend stores exactly one [`CredentialState`] and replaces it whole on every
//! commit. Partial writes are never visible: the file backend writes a temp file
//! and renames it over the old one.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Context, Result};

use super::CredentialState;

/// Key-value store holding the persisted session.
pub trait CredentialBackend: Send + Sync {
    /// Reads the last committed record, or `None` if nothing was ever written.
    ///
    /// # Errors
    /// Returns an error if the record exists but cannot be read or parsed.
    fn load(&self) -> Result<Option<CredentialState>>;

    /// Replaces the stored record in a single step.
    ///
    /// # Errors
    /// Returns an error if the record could not be made durable.
    fn commit(&self, state: &CredentialState) -> Result<()>;
}

impl<T: CredentialBackend + ?Sized> CredentialBackend for Arc<T> {
    fn load(&self) -> Result<Option<CredentialState>> {
        (**self).load()
    }

    fn commit(&self, state: &CredentialState) -> Result<()> {
        (**self).commit(state)
    }
}

/// JSON file backend with restricted permissions (0600).
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialBackend for FileBackend {
    fn load(&self) -> Result<Option<CredentialState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session from {}", self.path.display()))?;

        serde_json::from_str(&contents)
            .map(Some)
            .with_context(|| format!("Failed to parse session from {}", self.path.display()))
    }

    fn commit(&self, state: &CredentialState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(state).context("Failed to serialize session")?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(&tmp_path)
            .with_context(|| format!("Failed to open {} for writing", tmp_path.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write to {}", tmp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to flush {}", tmp_path.display()))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}

/// In-process backend. Commits can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    record: Mutex<Option<CredentialState>>,
    fail_commits: AtomicBool,
    commits: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `state` already persisted.
    pub fn with_state(state: CredentialState) -> Self {
        Self {
            record: Mutex::new(Some(state)),
            ..Self::default()
        }
    }

    /// Makes every following commit fail (or succeed again).
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// The currently persisted record.
    pub fn stored(&self) -> Option<CredentialState> {
        self.record
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl CredentialBackend for MemoryBackend {
    fn load(&self) -> Result<Option<CredentialState>> {
        Ok(self.stored())
    }

    fn commit(&self, state: &CredentialState) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            anyhow::bail!("memory backend is configured to fail commits");
        }
        *self
            .record
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(state.clone());
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
