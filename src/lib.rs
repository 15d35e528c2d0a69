pub mod archive;
pub mod caveats;
pub mod checksum;
pub mod cleanup;
pub mod dependency;
pub mod download;
pub mod error;
pub mod formula;
pub mod http;
pub mod info;
pub mod install;
pub mod layout;
pub mod receipt;
pub mod runtime;
pub mod smoke;
pub mod uninstall;
pub mod wrapper;

/// Test utilities for cross-platform path handling.
#[cfg(test)]
pub mod test_utils {
    use std::path::PathBuf;

    /// Returns a test home directory path based on the platform.
    /// - Unix: `/home/user`
    /// - Windows: `C:\Users\user`
    pub fn test_home() -> PathBuf {
        #[cfg(not(windows))]
        {
            PathBuf::from("/home/user")
        }
        #[cfg(windows)]
        {
            PathBuf::from(r"C:\Users\user")
        }
    }

    /// The default unprivileged prefix under [`test_home`].
    pub fn test_prefix() -> PathBuf {
        test_home().join(".local")
    }
}
