//! Checks that run before anything is written under the prefix.

use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};

use crate::error::InstallError;
use crate::formula::Manifest;
use crate::runtime::Runtime;

const PROBE_FILE: &str = ".privvy-formula-write-test";

/// Every manifest entry must exist in the extracted tree. Asset entries must
/// be directories.
#[tracing::instrument(skip(runtime, manifest))]
pub fn check_sources<R: Runtime>(runtime: &R, manifest: &Manifest, source_root: &Path) -> Result<()> {
    for file in manifest.libexec.iter().chain(manifest.doc.iter()) {
        let path = source_root.join(file);
        if !runtime.exists(&path) || runtime.is_dir(&path) {
            return Err(InstallError::MissingSource(PathBuf::from(file)).into());
        }
    }
    for asset in &manifest.share {
        let path = source_root.join(&asset.from);
        if !runtime.is_dir(&path) {
            return Err(InstallError::MissingSource(PathBuf::from(&asset.from)).into());
        }
    }
    debug!("All {} manifest entries present", manifest.required_sources().len());
    Ok(())
}

/// Create each directory and prove it accepts writes.
#[tracing::instrument(skip(runtime))]
pub fn ensure_writable<R: Runtime>(runtime: &R, dirs: &[PathBuf]) -> Result<()> {
    for dir in dirs {
        if !runtime.exists(dir) && runtime.create_dir_all(dir).is_err() {
            return Err(InstallError::NotWritable(dir.clone()).into());
        }
        let probe = dir.join(PROBE_FILE);
        if runtime.write(&probe, b"").is_err() {
            return Err(InstallError::NotWritable(dir.clone()).into());
        }
        if let Err(e) = runtime.remove_file(&probe) {
            debug!("Failed to remove write probe {:?}: {}", probe, e);
        }
    }
    Ok(())
}

/// Each destination must be a file path: an existing directory there would
/// have to be replaced, and it is not ours to remove.
#[tracing::instrument(skip(runtime, destinations))]
pub fn check_destinations<R: Runtime>(runtime: &R, destinations: &[PathBuf]) -> Result<()> {
    for dest in destinations {
        if runtime.is_dir(dest) {
            debug!("Destination {:?} is an existing directory", dest);
            return Err(InstallError::NotWritable(dest.clone()).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::AssetDir;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn manifest() -> Manifest {
        Manifest {
            libexec: vec!["privvy.py".into()],
            doc: vec!["README.md".into()],
            share: vec![AssetDir::new("examples")],
        }
    }

    #[test]
    fn test_check_sources_all_present() {
        let root = PathBuf::from("/tmp/staging/src");
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_is_dir()
            .returning(|p| p.ends_with("examples"));

        check_sources(&runtime, &manifest(), &root).unwrap();
    }

    #[test]
    fn test_check_sources_missing_doc() {
        let root = PathBuf::from("/tmp/staging/src");
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .returning(|p| !p.ends_with("README.md"));
        runtime.expect_is_dir().returning(|_| false);

        let err = check_sources(&runtime, &manifest(), &root).unwrap_err();
        match err.downcast_ref::<InstallError>() {
            Some(InstallError::MissingSource(path)) => assert_eq!(path, Path::new("README.md")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_check_sources_asset_must_be_dir() {
        let root = PathBuf::from("/tmp/staging/src");
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime.expect_is_dir().returning(|_| false);

        let err = check_sources(&runtime, &manifest(), &root).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::MissingSource(p)) if p == Path::new("examples")
        ));
    }

    #[test]
    fn test_ensure_writable_creates_and_probes() {
        let dir = PathBuf::from("/opt/prefix/bin");
        let probe = dir.join(PROBE_FILE);
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(dir.clone()))
            .returning(|_| false);
        runtime
            .expect_create_dir_all()
            .with(eq(dir.clone()))
            .returning(|_| Ok(()));
        runtime
            .expect_write()
            .withf(move |p, _| p == probe)
            .returning(|_, _| Ok(()));
        runtime.expect_remove_file().returning(|_| Ok(()));

        ensure_writable(&runtime, &[dir]).unwrap();
    }

    #[test]
    fn test_ensure_writable_reports_directory() {
        let dir = PathBuf::from("/usr/local/bin");
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_write()
            .returning(|_, _| Err(anyhow::anyhow!("permission denied")));

        let err = ensure_writable(&runtime, &[dir.clone()]).unwrap_err();
        match err.downcast_ref::<InstallError>() {
            Some(InstallError::NotWritable(path)) => assert_eq!(path, &dir),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_ensure_writable_tolerates_probe_removal_failure() {
        let dir = PathBuf::from("/opt/prefix/bin");
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime.expect_write().returning(|_, _| Ok(()));
        runtime
            .expect_remove_file()
            .returning(|_| Err(anyhow::anyhow!("busy")));

        ensure_writable(&runtime, &[dir]).unwrap();
    }

    #[test]
    fn test_check_destinations_rejects_directory() {
        let occupied = PathBuf::from("/opt/prefix/libexec/privvy/lib.py");
        let free = PathBuf::from("/opt/prefix/libexec/privvy/privvy.py");
        let mut runtime = MockRuntime::new();
        let occupied_clone = occupied.clone();
        runtime
            .expect_is_dir()
            .returning(move |p| p == occupied_clone);

        check_destinations(&runtime, &[free.clone()]).unwrap();
        let err = check_destinations(&runtime, &[free, occupied.clone()]).unwrap_err();
        match err.downcast_ref::<InstallError>() {
            Some(InstallError::NotWritable(path)) => assert_eq!(path, &occupied),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
