use crate::cleanup::SharedCleanupContext;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::path::Path;
use tar::{Archive, EntryType};

use super::{ArchiveExtractor, enclosed_path, prepare_staging, promote};

/// Extractor for gzip-compressed tarballs (.tar.gz, .tgz)
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        self.extract_impl(runtime, archive_path, extract_to, None)
    }

    fn extract_with_cleanup<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()> {
        self.extract_impl(runtime, archive_path, extract_to, Some(&cleanup_ctx))
    }
}

impl TarGzExtractor {
    fn extract_impl<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: Option<&SharedCleanupContext>,
    ) -> Result<()> {
        debug!("Extracting tarball to {:?}...", extract_to);
        let reader = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
        let mut archive = Archive::new(GzDecoder::new(reader));

        let staging = prepare_staging(runtime, extract_to, cleanup_ctx)?;

        let entries = archive
            .entries()
            .with_context(|| format!("Failed to read tarball {:?}", archive_path))?;
        for entry in entries {
            let mut entry =
                entry.with_context(|| format!("Corrupt entry in tarball {:?}", archive_path))?;
            let member = entry.path().context("Invalid path in tarball")?.into_owned();

            let Some(relative) = enclosed_path(&member) else {
                debug!("Skipping entry with unsafe path {:?}", member);
                continue;
            };
            let full_path = staging.join(relative);

            match entry.header().entry_type() {
                EntryType::Directory => {
                    runtime.create_dir_all(&full_path)?;
                }
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    let mut dest = runtime.create_file(&full_path)?;
                    std::io::copy(&mut entry, &mut dest)
                        .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                    drop(dest);

                    if let Ok(mode) = entry.header().mode()
                        && let Err(e) = runtime.set_permissions(&full_path, mode & 0o7777)
                    {
                        debug!("Failed to set permissions on {:?}: {}", full_path, e);
                    }
                }
                // pax headers are consumed by the tar crate; links and
                // devices never carry formula content.
                other => debug!("Skipping {:?} entry {:?}", other, member),
            }
        }

        promote(runtime, &staging, extract_to, cleanup_ctx)?;

        info!("Extraction complete.");
        Ok(())
    }
}
