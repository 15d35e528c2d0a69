//! Install receipt: the record of what an install wrote.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::runtime::path::resolve_relative_path;
use crate::runtime::{Runtime, relative_path_from_dir};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Receipt {
    pub name: String,
    pub version: String,
    pub source_url: String,
    pub sha256: String,
    pub interpreter: PathBuf,
    /// Seconds since the Unix epoch.
    pub installed_at: u64,
    /// Installed files, relative to the prefix.
    pub files: Vec<PathBuf>,
}

impl Receipt {
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read receipt {:?}", path))?;
        let receipt: Receipt = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse receipt {:?}", path))?;
        Ok(receipt)
    }

    /// Load the receipt at `path`, or `None` when nothing is installed.
    pub fn load_if_exists<R: Runtime>(runtime: &R, path: &Path) -> Result<Option<Self>> {
        if !runtime.exists(path) {
            debug!("No receipt at {:?}", path);
            return Ok(None);
        }
        Self::load(runtime, path).map(Some)
    }

    pub fn save<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !runtime.exists(parent)
        {
            runtime.create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        runtime
            .write(path, content.as_bytes())
            .with_context(|| format!("Failed to save receipt to {:?}", path))
    }

    /// Record `path` (absolute) as installed under `prefix`.
    pub fn record(&mut self, prefix: &Path, path: &Path) {
        let relative =
            relative_path_from_dir(prefix, path).unwrap_or_else(|| path.to_path_buf());
        if !self.files.contains(&relative) {
            self.files.push(relative);
        }
    }

    /// Installed files as absolute paths.
    pub fn absolute_files(&self, prefix: &Path) -> Vec<PathBuf> {
        self.files
            .iter()
            .map(|f| resolve_relative_path(prefix, f))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::test_utils::test_prefix;
    use tempfile::tempdir;

    fn receipt() -> Receipt {
        Receipt {
            name: "privvy".into(),
            version: "1.0.0".into(),
            source_url: "https://github.com/yourname/privvy/archive/v1.0.0.tar.gz".into(),
            sha256: "ab".repeat(32),
            interpreter: PathBuf::from("/usr/bin/python3.11"),
            installed_at: 1_700_000_000,
            files: vec![],
        }
    }

    #[test]
    fn test_record_stores_relative_paths_once() {
        let mut r = receipt();
        let file = test_prefix().join("libexec").join("privvy").join("lexer.py");
        r.record(&test_prefix(), &file);
        r.record(&test_prefix(), &file);

        assert_eq!(r.files, vec![PathBuf::from("libexec/privvy/lexer.py")]);
        assert_eq!(r.absolute_files(&test_prefix()), vec![file]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("var/lib/privvy/receipt.json");
        let mut r = receipt();
        r.record(dir.path(), &dir.path().join("bin/privvy"));

        r.save(&RealRuntime, &path).unwrap();
        let loaded = Receipt::load_if_exists(&RealRuntime, &path).unwrap();
        assert_eq!(loaded, Some(r));
    }

    #[test]
    fn test_load_if_exists_missing() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);

        let loaded = Receipt::load_if_exists(&runtime, Path::new("/nowhere/receipt.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_corrupt_receipt() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("[]".to_string()));

        let err = Receipt::load_if_exists(&runtime, Path::new("receipt.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to parse receipt"));
    }
}
