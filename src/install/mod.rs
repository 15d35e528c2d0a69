use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    archive::ArchiveExtractor,
    caveats,
    checksum,
    cleanup::{self, SharedCleanupContext},
    dependency::{ResolvedRuntime, resolve_runtime},
    download::{SourceFetcher, archive_file_name},
    formula::Formula,
    layout::InstallLayout,
    receipt::Receipt,
    runtime::Runtime,
    uninstall::{prune_dirs, prune_empty_dirs, remove_installed_files},
    wrapper::{EnvScript, write_wrapper},
};

pub mod config;
mod copy;
mod preflight;

use config::Config;
use copy::{WrittenFiles, copy_asset_dir, copy_file};

static STAGING_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Install `formula` under `prefix` (or the default prefix).
#[tracing::instrument(skip(runtime, formula))]
pub async fn install<R: Runtime + 'static>(
    runtime: R,
    formula: Formula,
    prefix: Option<PathBuf>,
    interpreter: Option<PathBuf>,
) -> Result<()> {
    let config = Config::new()?;
    run(runtime, formula, prefix, interpreter, config).await
}

#[tracing::instrument(skip(runtime, formula, config))]
pub async fn run<R: Runtime + 'static, F: SourceFetcher, E: ArchiveExtractor>(
    runtime: R,
    formula: Formula,
    prefix: Option<PathBuf>,
    interpreter: Option<PathBuf>,
    config: Config<F, E>,
) -> Result<()> {
    let layout = InstallLayout::resolve(&runtime, prefix, &formula.name)?;
    let installer = Installer::new(runtime, config.fetcher, config.extractor);
    let receipt = installer
        .install(&formula, &layout, interpreter.as_deref())
        .await?;

    println!(
        "   installed {} {} {}",
        receipt.name,
        receipt.version,
        layout.prefix.display()
    );
    if let Some(text) = caveats::render(&formula, &layout) {
        println!();
        println!("{}", text);
    }
    Ok(())
}

pub struct Installer<R: Runtime, F: SourceFetcher, E: ArchiveExtractor> {
    pub runtime: R,
    pub fetcher: F,
    pub extractor: E,
}

impl<R: Runtime + 'static, F: SourceFetcher, E: ArchiveExtractor> Installer<R, F, E> {
    pub fn new(runtime: R, fetcher: F, extractor: E) -> Self {
        Self {
            runtime,
            fetcher,
            extractor,
        }
    }

    /// Fetch, verify and install `formula` into `layout`, returning the
    /// saved receipt. On failure or Ctrl-C everything written so far is
    /// removed again.
    #[tracing::instrument(skip(self, formula, layout))]
    pub async fn install(
        &self,
        formula: &Formula,
        layout: &InstallLayout,
        interpreter: Option<&Path>,
    ) -> Result<Receipt> {
        formula.validate()?;
        let resolved = resolve_runtime(&self.runtime, &formula.runtime, interpreter)?;
        println!("   installing {} {}", formula.name, formula.version);

        let cleanup_ctx = cleanup::new_shared();
        let cleanup_ctx_clone = cleanup_ctx.clone();
        let ctrl_c_handler = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted, cleaning up...");
                cleanup::lock(&cleanup_ctx_clone).cleanup();
                std::process::exit(130);
            }
        });

        let result = self
            .install_inner(formula, layout, &resolved, cleanup_ctx.clone())
            .await;

        ctrl_c_handler.abort();

        match result {
            Ok(receipt) => {
                cleanup::lock(&cleanup_ctx).clear();
                Ok(receipt)
            }
            Err(e) => {
                warn!("Install failed, removing partial files: {}", e);
                let written = {
                    let ctx = cleanup::lock(&cleanup_ctx);
                    ctx.cleanup();
                    ctx.paths().to_vec()
                };
                prune_empty_dirs(&self.runtime, layout, &written);
                // Target directories created by the writability check
                prune_dirs(&self.runtime, layout, &layout.target_dirs());
                Err(e)
            }
        }
    }

    /// Destinations known before the archive's asset trees are listed.
    fn fixed_destinations(formula: &Formula, layout: &InstallLayout) -> Vec<PathBuf> {
        let manifest = &formula.manifest;
        manifest
            .libexec
            .iter()
            .map(|f| layout.libexec.join(f))
            .chain(manifest.doc.iter().map(|f| layout.doc.join(f)))
            .chain(formula.wrappers.iter().map(|w| layout.wrapper_path(&w.name)))
            .chain(std::iter::once(layout.receipt_path()))
            .collect()
    }

    async fn install_inner(
        &self,
        formula: &Formula,
        layout: &InstallLayout,
        resolved: &ResolvedRuntime,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<Receipt> {
        let runtime = &self.runtime;

        // 1. Stage and verify the archive
        let staging = runtime.temp_dir().join(format!(
            "privvy-formula-{}-{}-{}",
            formula.name,
            std::process::id(),
            STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        if runtime.exists(&staging) {
            runtime.remove_dir_all(&staging)?;
        }
        runtime
            .create_dir_all(&staging)
            .with_context(|| format!("Failed to create staging directory {:?}", staging))?;
        cleanup::lock(&cleanup_ctx).add(staging.clone());

        let archive_path = staging.join(archive_file_name(&formula.url));
        self.fetcher.fetch(&formula.url, &archive_path).await?;
        checksum::verify_file(runtime, &archive_path, &formula.sha256)?;

        // 2. Unpack and check the manifest against the tree
        let source_root = staging.join("src");
        self.extractor.extract_with_cleanup(
            runtime,
            &archive_path,
            &source_root,
            cleanup_ctx.clone(),
        )?;
        preflight::check_sources(runtime, &formula.manifest, &source_root)?;
        preflight::ensure_writable(runtime, &layout.target_dirs())?;
        let receipt_path = layout.receipt_path();
        preflight::check_destinations(runtime, &Self::fixed_destinations(formula, layout))?;

        // 3. Drop whatever a previous install left, receipt included, so a
        // failure from here on leaves the formula cleanly uninstalled
        match Receipt::load_if_exists(runtime, &receipt_path) {
            Ok(Some(previous)) => {
                info!(
                    "Replacing {} {} ({} files)",
                    previous.name,
                    previous.version,
                    previous.files.len()
                );
                remove_installed_files(runtime, layout, &previous)?;
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable receipt {:?}: {}", receipt_path, e),
        }
        if runtime.exists(&receipt_path) {
            runtime
                .remove_file(&receipt_path)
                .with_context(|| format!("Failed to remove old receipt {:?}", receipt_path))?;
        }

        // 4. Copy files and write wrappers
        let mut written = WrittenFiles::new(cleanup_ctx.clone());
        let manifest = &formula.manifest;
        for file in &manifest.libexec {
            copy_file(
                runtime,
                &source_root.join(file),
                &layout.libexec.join(file),
                &mut written,
            )?;
        }
        for file in &manifest.doc {
            copy_file(
                runtime,
                &source_root.join(file),
                &layout.doc.join(file),
                &mut written,
            )?;
        }
        for asset in &manifest.share {
            copy_asset_dir(
                runtime,
                &source_root,
                asset,
                &layout.share_pkg().join(asset.dest_name()),
                &mut written,
            )?;
        }
        for wrapper in &formula.wrappers {
            let script = EnvScript::for_driver(
                resolved,
                &formula.runtime.module_path_var,
                &layout.libexec,
                &layout.libexec.join(&wrapper.script),
            );
            let path = layout.wrapper_path(&wrapper.name);
            written.claim(runtime, &path)?;
            write_wrapper(runtime, &path, &script)?;
        }

        // 5. Commit
        let mut receipt = Receipt {
            name: formula.name.clone(),
            version: formula.version.clone(),
            source_url: formula.url.clone(),
            sha256: formula.sha256.to_lowercase(),
            interpreter: resolved.interpreter.clone(),
            installed_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            files: Vec::new(),
        };
        for file in written.files() {
            receipt.record(&layout.prefix, file);
        }
        written.claim(runtime, &receipt_path)?;
        receipt.save(runtime, &receipt_path)?;

        debug!("Removing staging directory {:?}", staging);
        runtime.remove_dir_all(&staging)?;
        cleanup::lock(&cleanup_ctx).remove(&staging);

        Ok(receipt)
    }
}
