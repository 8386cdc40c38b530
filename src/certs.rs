use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CA_FILE_NAME: &str = "rootCA.pem";
pub const CLIENT_CERT_FILE_NAME: &str = "mongodb.pem";

/// Locations of the CA bundle and the client certificate/key file
///
/// Resolution never touches the filesystem; a missing file surfaces when a
/// connection attempt reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePaths {
    pub ca_file: PathBuf,
    pub client_cert_file: PathBuf,
}

impl CertificatePaths {
    #[must_use]
    pub fn resolve(base_dir: &Path, ca_file_name: &str, client_cert_file_name: &str) -> Self {
        Self {
            ca_file: base_dir.join(ca_file_name),
            client_cert_file: base_dir.join(client_cert_file_name),
        }
    }

    /// Default file names next to the running executable
    ///
    /// # Errors
    ///
    /// Returns an error if the executable path cannot be determined
    pub fn beside_executable() -> Result<Self> {
        Ok(Self::resolve(
            &executable_dir()?,
            CA_FILE_NAME,
            CLIENT_CERT_FILE_NAME,
        ))
    }

    /// Paths that do not exist right now
    #[must_use]
    pub fn missing(&self) -> Vec<&Path> {
        [self.ca_file.as_path(), self.client_cert_file.as_path()]
            .into_iter()
            .filter(|path| !path.exists())
            .collect()
    }

    /// Log a warning per missing file
    pub fn warn_missing(&self) {
        for path in self.missing() {
            warn!(path = %path.display(), "certificate file not found");
        }
    }
}

/// Directory containing the running executable
///
/// # Errors
///
/// Returns an error if the executable path cannot be determined
pub fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to locate the running executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .with_context(|| format!("executable path has no parent: {}", exe.display()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_resolve_joins_names() {
        let paths = CertificatePaths::resolve(Path::new("/opt/app"), CA_FILE_NAME, CLIENT_CERT_FILE_NAME);
        assert_eq!(paths.ca_file, PathBuf::from("/opt/app/rootCA.pem"));
        assert_eq!(paths.client_cert_file, PathBuf::from("/opt/app/mongodb.pem"));
    }

    #[test]
    fn test_resolve_does_not_require_files() {
        let paths = CertificatePaths::resolve(Path::new("/nonexistent"), "a.pem", "b.pem");
        assert_eq!(paths.missing().len(), 2);
    }

    #[test]
    fn test_beside_executable() {
        let paths = CertificatePaths::beside_executable().unwrap();
        let exe_dir = std::env::current_exe().unwrap().parent().unwrap().to_path_buf();
        assert_eq!(paths.ca_file, exe_dir.join("rootCA.pem"));
        assert_eq!(paths.client_cert_file, exe_dir.join("mongodb.pem"));
    }

    #[test]
    fn test_missing_reports_only_absent_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CA_FILE_NAME), "ca").unwrap();

        let paths = CertificatePaths::resolve(dir.path(), CA_FILE_NAME, CLIENT_CERT_FILE_NAME);
        assert_eq!(paths.missing(), vec![paths.client_cert_file.as_path()]);
        paths.warn_missing();
    }
}
