//! Locating the pinned language runtime a formula depends on.

use anyhow::Result;
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::error::InstallError;
use crate::formula::Dependency;
use crate::runtime::Runtime;

/// A runtime dependency found on this machine.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRuntime {
    /// Interpreter executable the wrappers `exec`.
    pub interpreter: PathBuf,
    /// Directory prepended to `PATH` inside the wrappers.
    pub bin_dir: PathBuf,
}

impl ResolvedRuntime {
    fn from_interpreter(interpreter: PathBuf) -> Self {
        let bin_dir = interpreter
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            interpreter,
            bin_dir,
        }
    }
}

fn executable_name(candidate: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", candidate)
    } else {
        candidate.to_string()
    }
}

/// Resolve `dependency` to an interpreter, honoring an explicit override.
///
/// Without an override, each candidate name from [`Dependency::candidates`]
/// is searched across every `PATH` entry before the next, less specific,
/// name is tried.
#[tracing::instrument(skip(runtime))]
pub fn resolve_runtime<R: Runtime>(
    runtime: &R,
    dependency: &Dependency,
    override_path: Option<&Path>,
) -> Result<ResolvedRuntime> {
    if let Some(path) = override_path {
        if !runtime.exists(path) || runtime.is_dir(path) {
            anyhow::bail!(
                "Interpreter {:?} given for {} does not exist",
                path,
                dependency
            );
        }
        info!("Using interpreter {:?} for {}", path, dependency);
        return Ok(ResolvedRuntime::from_interpreter(path.to_path_buf()));
    }

    let candidates = dependency.candidates();
    let search_path = runtime.env_var("PATH").unwrap_or_default();
    let dirs: Vec<PathBuf> = std::env::split_paths(&search_path)
        .filter(|d| !d.as_os_str().is_empty())
        .collect();

    for candidate in &candidates {
        let file_name = executable_name(candidate);
        for dir in &dirs {
            let path = dir.join(&file_name);
            debug!("Checking {:?}", path);
            if runtime.exists(&path) && !runtime.is_dir(&path) {
                info!("Resolved {} to {:?}", dependency, path);
                return Ok(ResolvedRuntime::from_interpreter(path));
            }
        }
    }

    Err(InstallError::DependencyNotFound {
        dependency: dependency.to_string(),
        searched: candidates,
    }
    .into())
}
