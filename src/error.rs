//! Failures the installer reports by kind.
//!
//! These travel inside `anyhow::Error`; callers that need to branch on the
//! kind use `downcast_ref::<InstallError>()`.

use std::path::PathBuf;

#[derive(Debug)]
pub enum InstallError {
    /// The fetched archive does not hash to the declared checksum.
    ChecksumMismatch {
        archive: PathBuf,
        expected: String,
        actual: String,
    },
    /// The formula declares no usable checksum.
    MissingChecksum { formula: String, version: String },
    /// An enumerated manifest entry is absent from the source tree.
    MissingSource(PathBuf),
    /// A target directory cannot be created or written, or a file
    /// destination is occupied by a directory.
    NotWritable(PathBuf),
    /// The pinned runtime could not be located.
    DependencyNotFound { dependency: String, searched: Vec<String> },
    /// No receipt exists for the formula under the prefix.
    NotInstalled { formula: String, prefix: PathBuf },
    /// A smoke-test command exited non-zero.
    SmokeTestFailed { command: String, status: i32 },
}

impl std::fmt::Display for InstallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallError::ChecksumMismatch {
                archive,
                expected,
                actual,
            } => write!(
                f,
                "SHA-256 mismatch for {:?}\n  Expected: {}\n    Actual: {}",
                archive, expected, actual
            ),
            InstallError::MissingChecksum { formula, version } => write!(
                f,
                "No valid sha256 declared for {} {}. Pass --sha256 <HEX> with the archive's checksum.",
                formula, version
            ),
            InstallError::MissingSource(path) => {
                write!(f, "Source archive is missing {:?}", path)
            }
            InstallError::NotWritable(path) => {
                write!(f, "Cannot install into {:?}: not writable", path)
            }
            InstallError::DependencyNotFound {
                dependency,
                searched,
            } => write!(
                f,
                "Dependency {} is not satisfied: none of [{}] found on PATH. Use --interpreter to point at it.",
                dependency,
                searched.join(", ")
            ),
            InstallError::NotInstalled { formula, prefix } => {
                write!(f, "{} is not installed under {:?}", formula, prefix)
            }
            InstallError::SmokeTestFailed { command, status } => {
                write!(f, "`{}` exited with status {}", command, status)
            }
        }
    }
}

impl std::error::Error for InstallError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_message_names_both_digests() {
        let err = InstallError::ChecksumMismatch {
            archive: PathBuf::from("/tmp/privvy-1.0.0.tar.gz"),
            expected: "aa".repeat(32),
            actual: "bb".repeat(32),
        };
        let msg = err.to_string();
        assert!(msg.contains(&"aa".repeat(32)));
        assert!(msg.contains(&"bb".repeat(32)));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = InstallError::MissingSource(PathBuf::from("lexer.py")).into();
        let err = err.context("Preflight failed");
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::MissingSource(_))
        ));
    }

    #[test]
    fn test_dependency_not_found_lists_candidates() {
        let err = InstallError::DependencyNotFound {
            dependency: "python@3.11".into(),
            searched: vec!["python3.11".into(), "python3".into()],
        };
        assert!(err.to_string().contains("python3.11, python3"));
    }
}
