//! Where an install puts things under a prefix.

use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

#[derive(Debug, Clone, PartialEq)]
pub struct InstallLayout {
    pub prefix: PathBuf,
    pub bin: PathBuf,
    pub libexec: PathBuf,
    pub doc: PathBuf,
    pub share: PathBuf,
    name: String,
}

impl InstallLayout {
    pub fn new(prefix: &Path, name: &str) -> Self {
        Self {
            prefix: prefix.to_path_buf(),
            bin: prefix.join("bin"),
            libexec: prefix.join("libexec").join(name),
            doc: prefix.join("share").join("doc").join(name),
            share: prefix.join("share"),
            name: name.to_string(),
        }
    }

    /// Use `prefix` if given, otherwise [`default_prefix`].
    #[tracing::instrument(skip(runtime))]
    pub fn resolve<R: Runtime>(runtime: &R, prefix: Option<PathBuf>, name: &str) -> Result<Self> {
        let prefix = match prefix {
            Some(path) => path,
            None => default_prefix(runtime)?,
        };
        info!("Using prefix: {}", prefix.display());
        Ok(Self::new(&prefix, name))
    }

    /// `<share>/<name>`, the root for asset directories.
    pub fn share_pkg(&self) -> PathBuf {
        self.share.join(&self.name)
    }

    pub fn wrapper_path(&self, wrapper: &str) -> PathBuf {
        self.bin.join(wrapper)
    }

    pub fn receipt_dir(&self) -> PathBuf {
        self.prefix.join("var").join("lib").join(&self.name)
    }

    pub fn receipt_path(&self) -> PathBuf {
        self.receipt_dir().join("receipt.json")
    }

    /// Directories the install writes into. Pruning never removes these.
    pub fn roots(&self) -> Vec<PathBuf> {
        vec![
            self.prefix.clone(),
            self.bin.clone(),
            self.share.clone(),
            self.prefix.join("libexec"),
            self.share.join("doc"),
            self.prefix.join("var"),
            self.prefix.join("var").join("lib"),
        ]
    }

    /// Directories that must exist and be writable before copying starts.
    pub fn target_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.libexec.clone(),
            self.doc.clone(),
            self.share_pkg(),
            self.bin.clone(),
            self.receipt_dir(),
        ]
    }
}

/// Get the default install prefix
#[tracing::instrument(skip(runtime))]
pub fn default_prefix<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(system_prefix())
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(".local"))
    }
}

#[cfg(target_os = "windows")]
fn system_prefix() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\privvy")
}

#[cfg(not(target_os = "windows"))]
fn system_prefix() -> PathBuf {
    PathBuf::from("/usr/local")
}
