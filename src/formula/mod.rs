//! Formula model: the declarative recipe an install is driven by.
//!
//! A formula is either the built-in Privvy recipe ([`Formula::privvy`]) or a
//! JSON file with the same shape.

mod builtin;
mod manifest;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

use crate::error::InstallError;
use crate::runtime::Runtime;

pub use manifest::{AssetDir, Manifest};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Formula {
    pub name: String,
    pub desc: String,
    pub homepage: String,
    pub url: String,
    /// Lowercase hex SHA-256 of the archive at `url`. Empty means "not pinned".
    #[serde(default)]
    pub sha256: String,
    pub license: String,
    pub version: String,
    /// The language runtime the wrappers execute drivers with.
    pub runtime: Dependency,
    pub manifest: Manifest,
    #[serde(default)]
    pub wrappers: Vec<WrapperSpec>,
    #[serde(default)]
    pub test: Vec<TestCommand>,
    /// Post-install message. `{bin}`, `{doc}` and `{share}` are substituted.
    #[serde(default)]
    pub caveats: Option<String>,
}

/// A runtime dependency such as `python@3.11`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    /// Environment variable the runtime searches for modules (e.g. `PYTHONPATH`).
    pub module_path_var: String,
}

impl Dependency {
    /// Executable names to look for, most specific first.
    ///
    /// `python@3.11` yields `python3.11`, `python3`, `python`.
    pub fn candidates(&self) -> Vec<String> {
        let mut names = vec![format!("{}{}", self.name, self.version)];
        if let Some((major, _)) = self.version.split_once('.') {
            names.push(format!("{}{}", self.name, major));
        }
        names.push(self.name.clone());
        names.dedup();
        names
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A generated executable in `<bin>` that runs a libexec driver.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WrapperSpec {
    pub name: String,
    pub script: String,
}

/// One smoke-test invocation of an installed wrapper.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TestCommand {
    pub bin: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl fmt::Display for TestCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bin)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

impl Formula {
    /// The built-in Privvy recipe.
    pub fn privvy() -> Self {
        builtin::privvy()
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read formula {:?}", path))?;
        let formula: Formula = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse formula {:?}", path))?;
        Ok(formula)
    }

    /// Load `path` if given, otherwise the built-in formula.
    pub fn load_or_builtin<R: Runtime>(runtime: &R, path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(runtime, p),
            None => Ok(Self::privvy()),
        }
    }

    /// Apply command-line overrides of the source location and checksum.
    pub fn with_source(mut self, url: Option<String>, sha256: Option<String>) -> Self {
        if let Some(url) = url {
            self.url = url;
        }
        if let Some(sha256) = sha256 {
            self.sha256 = sha256.trim().to_lowercase();
        }
        self
    }

    /// Structural checks that do not need the archive.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Formula has no name");
        }
        if !is_single_name(&self.name) {
            anyhow::bail!("Formula name {:?} must be a plain file name", self.name);
        }
        if self.version.trim().is_empty() {
            anyhow::bail!("Formula {} has no version", self.name);
        }
        if !crate::checksum::is_sha256_hex(&self.sha256) {
            return Err(InstallError::MissingChecksum {
                formula: self.name.clone(),
                version: self.version.clone(),
            }
            .into());
        }
        for entry in self.manifest.required_sources() {
            if !is_contained(&entry) {
                anyhow::bail!(
                    "Manifest entry {:?} must be a relative path inside the archive",
                    entry
                );
            }
        }
        for asset in &self.manifest.share {
            if !is_contained(Path::new(asset.dest_name())) {
                anyhow::bail!(
                    "Asset destination {:?} must be a relative path inside the share directory",
                    asset.dest_name()
                );
            }
        }
        for wrapper in &self.wrappers {
            if !is_single_name(&wrapper.name) {
                anyhow::bail!("Wrapper name {:?} must be a plain file name", wrapper.name);
            }
            if !self.manifest.contains_libexec(&wrapper.script) {
                anyhow::bail!(
                    "Wrapper {} runs {}, which is not in the libexec manifest",
                    wrapper.name,
                    wrapper.script
                );
            }
        }
        for cmd in &self.test {
            if !self.wrappers.iter().any(|w| w.name == cmd.bin) {
                anyhow::bail!("Test command `{}` does not name a wrapper", cmd);
            }
        }
        Ok(())
    }
}

/// Relative, non-empty and free of `..`.
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && path.components().any(|c| matches!(c, Component::Normal(_)))
}

/// Exactly one normal path component.
fn is_single_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
