//! Copying manifest entries from the extracted tree into the prefix.

use anyhow::{Context, Result, anyhow};
use log::debug;
use std::path::{Path, PathBuf};

use crate::cleanup::{self, SharedCleanupContext};
use crate::error::InstallError;
use crate::formula::AssetDir;
use crate::runtime::Runtime;

/// Files written so far. Each one this install creates is registered for
/// cleanup the moment it is claimed, so a failure or Ctrl-C removes partial
/// work without touching anything that was already there.
pub struct WrittenFiles {
    files: Vec<PathBuf>,
    cleanup_ctx: SharedCleanupContext,
}

impl WrittenFiles {
    pub fn new(cleanup_ctx: SharedCleanupContext) -> Self {
        Self {
            files: Vec::new(),
            cleanup_ctx,
        }
    }

    /// Record `path` as about to be written.
    ///
    /// Fails with [`InstallError::NotWritable`] if a directory occupies it.
    /// A pre-existing file is recorded but left out of cleanup.
    pub fn claim<R: Runtime>(&mut self, runtime: &R, path: &Path) -> Result<()> {
        if runtime.is_dir(path) {
            return Err(InstallError::NotWritable(path.to_path_buf()).into());
        }
        if runtime.exists(path) {
            debug!("Overwriting existing {:?}", path);
        } else {
            cleanup::lock(&self.cleanup_ctx).add(path.to_path_buf());
        }
        self.files.push(path.to_path_buf());
        Ok(())
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

/// Copy one file, creating the destination's parent directories.
pub fn copy_file<R: Runtime>(
    runtime: &R,
    from: &Path,
    to: &Path,
    written: &mut WrittenFiles,
) -> Result<()> {
    if let Some(parent) = to.parent()
        && !runtime.exists(parent)
    {
        runtime.create_dir_all(parent)?;
    }
    debug!("Installing {:?} -> {:?}", from, to);
    // Claim before copying: a copy interrupted halfway still leaves a file.
    written.claim(runtime, to)?;
    runtime
        .copy(from, to)
        .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
    Ok(())
}

/// Recursively copy the contents of `from` into `to`, preserving structure.
pub fn copy_tree<R: Runtime>(
    runtime: &R,
    from: &Path,
    to: &Path,
    written: &mut WrittenFiles,
) -> Result<()> {
    if !runtime.exists(to) {
        runtime.create_dir_all(to)?;
    }
    for entry in runtime.read_dir(from)? {
        let name = entry
            .file_name()
            .ok_or_else(|| anyhow!("Unexpected entry {:?} in {:?}", entry, from))?;
        let dest = to.join(name);
        if runtime.is_dir(&entry) {
            copy_tree(runtime, &entry, &dest, written)?;
        } else {
            copy_file(runtime, &entry, &dest, written)?;
        }
    }
    Ok(())
}

/// Copy the children of an asset directory into `dest`.
///
/// Children are enumerated with a `<from>/*` glob, so dotfiles at the top
/// level of the asset directory are not installed.
#[tracing::instrument(skip(runtime, written))]
pub fn copy_asset_dir<R: Runtime>(
    runtime: &R,
    source_root: &Path,
    asset: &AssetDir,
    dest: &Path,
    written: &mut WrittenFiles,
) -> Result<()> {
    let pattern = asset.children_pattern(source_root);
    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..Default::default()
    };
    let mut children = glob::glob_with(&pattern, options)
        .with_context(|| format!("Invalid asset pattern {}", pattern))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to list {:?}", source_root.join(&asset.from)))?;
    children.sort();

    if !runtime.exists(dest) {
        runtime.create_dir_all(dest)?;
    }
    for child in children {
        let name = child
            .file_name()
            .ok_or_else(|| anyhow!("Unexpected asset entry {:?}", child))?;
        let target = dest.join(name);
        if runtime.is_dir(&child) {
            copy_tree(runtime, &child, &target, written)?;
        } else {
            copy_file(runtime, &child, &target, written)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_copy_file_creates_parents_and_tracks() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("lexer.py");
        fs::write(&from, "tokens").unwrap();
        let to = dir.path().join("prefix/libexec/privvy/lexer.py");

        let ctx = cleanup::new_shared();
        let mut written = WrittenFiles::new(ctx.clone());
        copy_file(&RealRuntime, &from, &to, &mut written).unwrap();

        assert_eq!(fs::read_to_string(&to).unwrap(), "tokens");
        assert_eq!(written.files(), &[to.clone()]);
        assert_eq!(cleanup::lock(&ctx).paths, vec![to]);
    }

    #[test]
    fn test_copy_asset_dir_preserves_structure() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("examples/a")).unwrap();
        fs::write(src.join("examples/a/b.pv"), "nested").unwrap();
        fs::write(src.join("examples/hello.pv"), "hello").unwrap();
        fs::write(src.join("examples/.hidden"), "skip").unwrap();

        let dest = dir.path().join("share/privvy/examples");
        let mut written = WrittenFiles::new(cleanup::new_shared());
        copy_asset_dir(
            &RealRuntime,
            &src,
            &AssetDir::new("examples"),
            &dest,
            &mut written,
        )
        .unwrap();

        assert_eq!(fs::read_to_string(dest.join("a/b.pv")).unwrap(), "nested");
        assert_eq!(fs::read_to_string(dest.join("hello.pv")).unwrap(), "hello");
        assert!(!dest.join(".hidden").exists());
        assert_eq!(written.files().len(), 2);
    }

    #[test]
    fn test_copy_asset_dir_with_special_characters() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src [1]");
        fs::create_dir_all(src.join("project-template")).unwrap();
        fs::write(src.join("project-template/main.pv"), "main").unwrap();

        let dest = dir.path().join("out");
        let mut written = WrittenFiles::new(cleanup::new_shared());
        copy_asset_dir(
            &RealRuntime,
            &src,
            &AssetDir::new("project-template"),
            &dest,
            &mut written,
        )
        .unwrap();

        assert!(dest.join("main.pv").exists());
    }

    #[test]
    fn test_copy_onto_directory_is_refused() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("lib.sh");
        fs::write(&from, "lib").unwrap();
        let to = dir.path().join("prefix/libexec/tool/lib.sh");
        fs::create_dir_all(to.join("keep")).unwrap();
        fs::write(to.join("keep/data"), "user data").unwrap();

        let ctx = cleanup::new_shared();
        let mut written = WrittenFiles::new(ctx.clone());
        let err = copy_file(&RealRuntime, &from, &to, &mut written).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::NotWritable(p)) if p == &to
        ));
        assert!(written.files().is_empty());
        assert!(cleanup::lock(&ctx).paths.is_empty());
        cleanup::lock(&ctx).cleanup();
        assert_eq!(fs::read_to_string(to.join("keep/data")).unwrap(), "user data");
    }

    #[test]
    fn test_existing_file_is_recorded_but_not_cleaned_up() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("README.md");
        fs::write(&from, "new").unwrap();
        let to = dir.path().join("doc/README.md");
        fs::create_dir_all(to.parent().unwrap()).unwrap();
        fs::write(&to, "old").unwrap();

        let ctx = cleanup::new_shared();
        let mut written = WrittenFiles::new(ctx.clone());
        copy_file(&RealRuntime, &from, &to, &mut written).unwrap();

        assert_eq!(written.files(), &[to.clone()]);
        assert!(cleanup::lock(&ctx).paths.is_empty());
        assert_eq!(fs::read_to_string(&to).unwrap(), "new");
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let dir = tempdir().unwrap();
        let mut written = WrittenFiles::new(cleanup::new_shared());
        let result = copy_file(
            &RealRuntime,
            &dir.path().join("missing.py"),
            &dir.path().join("out/missing.py"),
            &mut written,
        );
        assert!(result.is_err());
    }
}
