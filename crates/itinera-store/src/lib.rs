use anyhow::{Context, Result, anyhow};
use itinera_core::Document;
use std::fs;
use std::path::{Path, PathBuf};

/// Where the itinerary lives between conversations. The conversation loop
/// never touches a store; callers persist the outcome's document themselves.
pub trait DocumentStore {
    fn get(&self) -> Result<Document>;
    fn put(&self, document: &Document) -> Result<()>;
}

/// Pretty-printed JSON on disk, replaced atomically via a sibling temp file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    keep_backup: bool,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep_backup: false,
        }
    }

    /// Copy the previous file to `<name>.bak` before each write.
    pub fn with_backup(mut self, keep_backup: bool) -> Self {
        self.keep_backup = keep_backup;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, "bak")
    }

    fn temp_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, "tmp")
    }
}

impl DocumentStore for FileStore {
    fn get(&self) -> Result<Document> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read itinerary {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse itinerary {}", self.path.display()))
    }

    fn put(&self, document: &Document) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut body = serde_json::to_string_pretty(document)?;
        body.push('\n');

        if self.keep_backup && self.path.exists() {
            fs::copy(&self.path, self.backup_path()).with_context(|| {
                format!("failed to back up itinerary {}", self.path.display())
            })?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, body)
            .with_context(|| format!("failed to write temp file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            anyhow!("failed to replace {}: {err}", self.path.display())
        })
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
