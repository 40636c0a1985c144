//! Fatal provisioning errors
//!
//! Every variant here ends the run with exit code 1. Degrading lookups
//! (hardware serial, MAC address) never produce one of these; they return
//! `None` and the resolver moves on.

use std::fmt;
use std::path::PathBuf;

/// Errors that abort a provisioning run
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("no bootstrap-config.yaml found in expected locations: {}", display_paths(.searched))]
    ConfigNotFound { searched: Vec<PathBuf> },

    #[error("failed to read bootstrap config {}: {}", .path.display(), .source)]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse bootstrap config {}: {}", .path.display(), .source)]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("device name is required")]
    MissingDeviceName,

    #[error("claim material invalid: {}", display_issues(.0))]
    ClaimMaterial(Vec<ClaimIssue>),

    #[error("bootstrap config is missing required fields: {}", .0.join(", "))]
    FleetSettingsMissing(Vec<&'static str>),

    #[error("failed to download root CA from {url}: {message}")]
    RootCaDownload { url: String, message: String },

    #[error("{} not found at write time: {}", .kind, .path.display())]
    CredentialFileMissing { kind: &'static str, path: PathBuf },

    #[error("Greengrass archive not found: {}", .0.display())]
    ArchiveMissing(PathBuf),

    #[error("installer JAR not found: {}", .0.display())]
    InstallerJarMissing(PathBuf),

    #[error("nucleus JAR not found: {}", .0.display())]
    NucleusJarMissing(PathBuf),

    #[error("installer timed out after {0} seconds")]
    InstallerTimeout(u64),

    #[error("installation failed (exit code {code:?}): {stderr}")]
    InstallerFailed { code: Option<i32>, stderr: String },

    #[error("nucleus process exited early with code {:?}{}", .code, console_tail(.output))]
    NucleusExited { code: Option<i32>, output: String },

    #[error("Java runtime check failed: {0}")]
    JavaUnavailable(String),

    #[error("AWS credentials are incomplete: {0} is required")]
    MissingCredential(&'static str),
}

/// A single claim-material precondition that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimIssue {
    CertificatePathUnset,
    PrivateKeyPathUnset,
    CertificateMissing(PathBuf),
    PrivateKeyMissing(PathBuf),
}

impl fmt::Display for ClaimIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimIssue::CertificatePathUnset => {
                write!(f, "claimCertificatePath not specified in config")
            }
            ClaimIssue::PrivateKeyPathUnset => {
                write!(f, "claimPrivateKeyPath not specified in config")
            }
            ClaimIssue::CertificateMissing(path) => {
                write!(f, "claim certificate not found: {}", path.display())
            }
            ClaimIssue::PrivateKeyMissing(path) => {
                write!(f, "claim private key not found: {}", path.display())
            }
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_issues(issues: &[ClaimIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn console_tail(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!("; last output:\n{output}")
    }
}
