use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Files a formula installs, by destination.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    /// File names copied into the private libexec directory.
    pub libexec: Vec<String>,
    /// File names copied into the doc directory.
    #[serde(default)]
    pub doc: Vec<String>,
    /// Directories whose contents are copied under `<share>/<name>/`.
    #[serde(default)]
    pub share: Vec<AssetDir>,
}

/// A directory in the source tree copied recursively into shared data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AssetDir {
    /// Directory inside the extracted archive.
    pub from: String,
    /// Directory name under `<share>/<formula name>/`. Defaults to `from`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl AssetDir {
    pub fn new(from: &str) -> Self {
        Self {
            from: from.to_string(),
            to: None,
        }
    }

    pub fn dest_name(&self) -> &str {
        self.to.as_deref().unwrap_or(&self.from)
    }

    /// Glob matching the directory's immediate children, `Dir["examples/*"]` style.
    pub fn children_pattern(&self, source_root: &Path) -> String {
        let escaped = glob::Pattern::escape(&source_root.join(&self.from).to_string_lossy());
        format!("{}/*", escaped)
    }
}

impl Manifest {
    /// Every source path the manifest requires, relative to the archive root.
    pub fn required_sources(&self) -> Vec<PathBuf> {
        self.libexec
            .iter()
            .chain(self.doc.iter())
            .map(PathBuf::from)
            .chain(self.share.iter().map(|a| PathBuf::from(&a.from)))
            .collect()
    }

    pub fn contains_libexec(&self, name: &str) -> bool {
        self.libexec.iter().any(|f| f == name)
    }
}
