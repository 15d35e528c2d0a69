mod tar_gz;
mod zip;

use crate::cleanup::{self, SharedCleanupContext};
use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow};
use log::debug;
use std::path::{Component, Path, PathBuf};

pub use tar_gz::TarGzExtractor;
pub use zip::ZipExtractor;

/// Format-specific archive extractor.
///
/// Extractors unpack into a sibling staging directory first. When the archive
/// holds a single top-level directory (the usual `project-1.0.0/` layout of a
/// source tarball) its contents are promoted into `extract_to`; otherwise the
/// archive root is used as-is.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor: Send + Sync {
    /// Check if this extractor can handle the given archive format
    fn can_handle(&self, archive_path: &Path) -> bool;

    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()>;

    /// Like `extract`, but registers the staging directory so an interrupted
    /// extraction leaves nothing behind.
    fn extract_with_cleanup<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()>;
}

/// Picks the extractor matching the archive's file name.
pub struct ArchiveExtractorImpl {
    tar_gz: TarGzExtractor,
    zip: ZipExtractor,
}

impl Default for ArchiveExtractorImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveExtractorImpl {
    pub fn new() -> Self {
        Self {
            tar_gz: TarGzExtractor,
            zip: ZipExtractor,
        }
    }
}

impl ArchiveExtractor for ArchiveExtractorImpl {
    fn can_handle(&self, archive_path: &Path) -> bool {
        self.tar_gz.can_handle(archive_path) || self.zip.can_handle(archive_path)
    }

    #[tracing::instrument(skip(self, runtime))]
    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        if self.tar_gz.can_handle(archive_path) {
            return self.tar_gz.extract(runtime, archive_path, extract_to);
        }
        if self.zip.can_handle(archive_path) {
            return self.zip.extract(runtime, archive_path, extract_to);
        }
        Err(unsupported(archive_path))
    }

    #[tracing::instrument(skip(self, runtime, cleanup_ctx))]
    fn extract_with_cleanup<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()> {
        if self.tar_gz.can_handle(archive_path) {
            return self
                .tar_gz
                .extract_with_cleanup(runtime, archive_path, extract_to, cleanup_ctx);
        }
        if self.zip.can_handle(archive_path) {
            return self
                .zip
                .extract_with_cleanup(runtime, archive_path, extract_to, cleanup_ctx);
        }
        Err(unsupported(archive_path))
    }
}

fn unsupported(archive_path: &Path) -> anyhow::Error {
    anyhow!(
        "Unsupported archive format: {} (expected .tar.gz, .tgz or .zip)",
        archive_path.display()
    )
}

/// Fresh staging directory next to `extract_to`, registered for cleanup.
fn prepare_staging<R: Runtime>(
    runtime: &R,
    extract_to: &Path,
    cleanup_ctx: Option<&SharedCleanupContext>,
) -> Result<PathBuf> {
    let name = extract_to
        .file_name()
        .ok_or_else(|| anyhow!("Invalid extraction target {:?}", extract_to))?;
    let staging = extract_to.with_file_name(format!("{}_unpack", name.to_string_lossy()));

    if runtime.exists(&staging) {
        runtime.remove_dir_all(&staging)?;
    }
    runtime.create_dir_all(&staging)?;
    if let Some(ctx) = cleanup_ctx {
        cleanup::lock(ctx).add(staging.clone());
    }
    debug!("Unpacking to staging dir: {:?}", staging);
    Ok(staging)
}

/// Move the unpacked tree into `extract_to`, stripping a lone top-level
/// directory, then drop the staging directory.
fn promote<R: Runtime>(
    runtime: &R,
    staging: &Path,
    extract_to: &Path,
    cleanup_ctx: Option<&SharedCleanupContext>,
) -> Result<()> {
    let entries = runtime
        .read_dir(staging)
        .context("Failed to read staging directory")?;

    let source_dir = match entries.as_slice() {
        [] => return Err(anyhow!("Archive appears to be empty.")),
        [only] if runtime.is_dir(only) => only.clone(),
        _ => staging.to_path_buf(),
    };

    if !runtime.exists(extract_to) {
        runtime.create_dir_all(extract_to)?;
    }

    debug!("Moving contents from {:?} to {:?}", source_dir, extract_to);
    for item in runtime.read_dir(&source_dir)? {
        let name = item
            .file_name()
            .ok_or_else(|| anyhow!("Unexpected entry {:?} in archive", item))?;
        runtime.rename(&item, &extract_to.join(name))?;
    }

    runtime.remove_dir_all(staging)?;
    if let Some(ctx) = cleanup_ctx {
        cleanup::lock(ctx).remove(staging);
    }
    Ok(())
}

/// Relative, `..`-free form of an archive member path, or `None` if the
/// member would escape the extraction directory.
fn enclosed_path(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}
