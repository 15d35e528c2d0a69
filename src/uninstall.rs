//! Removing what a receipt says was installed.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::error::InstallError;
use crate::layout::InstallLayout;
use crate::receipt::Receipt;
use crate::runtime::{Runtime, is_path_under};

/// Uninstall `name` from the prefix of `layout`.
#[tracing::instrument(skip(runtime, layout))]
pub fn uninstall<R: Runtime>(runtime: &R, layout: &InstallLayout, name: &str) -> Result<Receipt> {
    let receipt_path = layout.receipt_path();
    let receipt = Receipt::load_if_exists(runtime, &receipt_path)?.ok_or_else(|| {
        InstallError::NotInstalled {
            formula: name.to_string(),
            prefix: layout.prefix.clone(),
        }
    })?;

    remove_installed_files(runtime, layout, &receipt)?;

    runtime
        .remove_file(&receipt_path)
        .with_context(|| format!("Failed to remove receipt {:?}", receipt_path))?;
    prune_empty_dirs(runtime, layout, &[receipt_path]);

    info!("Uninstalled {} {}", receipt.name, receipt.version);
    Ok(receipt)
}

/// Delete every file `receipt` lists and prune directories left empty.
///
/// Entries that resolve outside the prefix are skipped, so a tampered
/// receipt cannot delete arbitrary files.
#[tracing::instrument(skip(runtime, layout, receipt))]
pub fn remove_installed_files<R: Runtime>(
    runtime: &R,
    layout: &InstallLayout,
    receipt: &Receipt,
) -> Result<()> {
    let files = receipt.absolute_files(&layout.prefix);
    for file in &files {
        if !is_strictly_under(file, &layout.prefix) {
            warn!("Refusing to remove {:?}: outside prefix {:?}", file, layout.prefix);
            continue;
        }
        if !runtime.exists(file) {
            debug!("Already gone: {:?}", file);
            continue;
        }
        if runtime.is_dir(file) {
            warn!("Skipping {:?}: receipt lists a file but found a directory", file);
            continue;
        }
        debug!("Removing {:?}", file);
        runtime
            .remove_file(file)
            .with_context(|| format!("Failed to remove {:?}", file))?;
    }
    prune_empty_dirs(runtime, layout, &files);
    Ok(())
}

/// Remove the now-empty parent directories of `files`, walking upwards and
/// stopping at the layout roots or the first directory that still has content.
pub fn prune_empty_dirs<R: Runtime>(runtime: &R, layout: &InstallLayout, files: &[PathBuf]) {
    let parents: Vec<PathBuf> = files
        .iter()
        .filter_map(|f| f.parent().map(Path::to_path_buf))
        .collect();
    prune_dirs(runtime, layout, &parents);
}

/// Remove each of `dirs` if empty, then its empty ancestors, with the same
/// stopping rules as [`prune_empty_dirs`].
pub fn prune_dirs<R: Runtime>(runtime: &R, layout: &InstallLayout, dirs: &[PathBuf]) {
    let roots = layout.roots();
    for start in dirs {
        let mut current = Some(start.clone());
        while let Some(dir) = current {
            if roots.contains(&dir) || !is_strictly_under(&dir, &layout.prefix) {
                break;
            }
            if !runtime.exists(&dir) {
                current = dir.parent().map(Path::to_path_buf);
                continue;
            }
            match runtime.read_dir(&dir) {
                Ok(entries) if entries.is_empty() => {
                    debug!("Pruning empty directory {:?}", dir);
                    if let Err(e) = runtime.remove_dir(&dir) {
                        debug!("Failed to prune {:?}: {}", dir, e);
                        break;
                    }
                }
                _ => break,
            }
            current = dir.parent().map(Path::to_path_buf);
        }
    }
}

fn is_strictly_under(path: &Path, dir: &Path) -> bool {
    is_path_under(path, dir) && path != dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::test_utils::test_prefix;
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::tempdir;

    fn receipt(files: &[&str]) -> Receipt {
        Receipt {
            name: "privvy".into(),
            version: "1.0.0".into(),
            source_url: "https://github.com/yourname/privvy/archive/v1.0.0.tar.gz".into(),
            sha256: "ab".repeat(32),
            interpreter: PathBuf::from("/usr/bin/python3.11"),
            installed_at: 0,
            files: files.iter().map(PathBuf::from).collect(),
        }
    }

    #[test]
    fn test_uninstall_removes_files_and_receipt() {
        let dir = tempdir().unwrap();
        let layout = InstallLayout::new(dir.path(), "privvy");
        let files = [
            "bin/privvy",
            "libexec/privvy/privvy.py",
            "share/doc/privvy/README.md",
            "share/privvy/examples/a/b.pv",
        ];
        for f in files {
            let path = dir.path().join(f);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "x").unwrap();
        }
        fs::write(dir.path().join("bin/other-tool"), "keep").unwrap();
        receipt(&files)
            .save(&RealRuntime, &layout.receipt_path())
            .unwrap();

        let removed = uninstall(&RealRuntime, &layout, "privvy").unwrap();

        assert_eq!(removed.version, "1.0.0");
        for f in files {
            assert!(!dir.path().join(f).exists(), "{} should be gone", f);
        }
        assert!(!layout.libexec.exists());
        assert!(!layout.share_pkg().exists());
        assert!(!layout.receipt_dir().exists());
        // Shared roots and unrelated files stay
        assert!(dir.path().join("bin/other-tool").exists());
        assert!(layout.share.exists());
    }

    #[test]
    fn test_uninstall_not_installed() {
        let mut runtime = MockRuntime::new();
        let layout = InstallLayout::new(&test_prefix(), "privvy");
        runtime
            .expect_exists()
            .with(eq(layout.receipt_path()))
            .returning(|_| false);

        let err = uninstall(&runtime, &layout, "privvy").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::NotInstalled { .. })
        ));
    }

    #[test]
    fn test_entries_outside_prefix_are_skipped() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("prefix");
        fs::create_dir_all(&prefix).unwrap();
        let outside = dir.path().join("precious.txt");
        fs::write(&outside, "keep").unwrap();

        let layout = InstallLayout::new(&prefix, "privvy");
        remove_installed_files(&RealRuntime, &layout, &receipt(&["../precious.txt"])).unwrap();

        assert!(outside.exists());
    }

    #[test]
    fn test_prune_stops_at_non_empty_dir() {
        let dir = tempdir().unwrap();
        let layout = InstallLayout::new(dir.path(), "privvy");
        let nested = layout.share_pkg().join("examples/a");
        fs::create_dir_all(&nested).unwrap();
        fs::write(layout.share_pkg().join("examples/keep.pv"), "k").unwrap();

        prune_empty_dirs(&RealRuntime, &layout, &[nested.join("b.pv")]);

        assert!(!nested.exists());
        assert!(layout.share_pkg().join("examples").exists());
    }

    #[test]
    fn test_prune_dirs_removes_empty_targets() {
        let dir = tempdir().unwrap();
        let layout = InstallLayout::new(dir.path(), "privvy");
        for target in layout.target_dirs() {
            fs::create_dir_all(&target).unwrap();
        }
        fs::write(layout.doc.join("NOTES.md"), "mine").unwrap();

        prune_dirs(&RealRuntime, &layout, &layout.target_dirs());

        assert!(!layout.libexec.exists());
        assert!(!layout.share_pkg().exists());
        assert!(!layout.receipt_dir().exists());
        assert!(layout.doc.join("NOTES.md").exists());
        assert!(layout.bin.exists());
    }

    #[test]
    fn test_missing_files_are_tolerated() {
        let dir = tempdir().unwrap();
        let layout = InstallLayout::new(dir.path(), "privvy");
        remove_installed_files(&RealRuntime, &layout, &receipt(&["bin/privvy"])).unwrap();
    }
}
