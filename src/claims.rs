//! Claim certificate validation for fleet provisioning

use std::path::{Path, PathBuf};

use crate::config::BootstrapConfig;
use crate::error::{ClaimIssue, ProvisionError};

/// Claim certificate and key that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimMaterial {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
}

/// Check both claim paths are configured and present on disk.
///
/// All problems are collected and logged before failing so the operator can
/// fix them in one pass.
pub fn validate_claim_material(config: &BootstrapConfig) -> Result<ClaimMaterial, ProvisionError> {
    let mut issues = Vec::new();

    let certificate = check_path(
        config.claim_certificate_path.as_deref(),
        ClaimIssue::CertificatePathUnset,
        ClaimIssue::CertificateMissing,
        &mut issues,
    );
    let private_key = check_path(
        config.claim_private_key_path.as_deref(),
        ClaimIssue::PrivateKeyPathUnset,
        ClaimIssue::PrivateKeyMissing,
        &mut issues,
    );

    match (certificate, private_key) {
        (Some(certificate), Some(private_key)) if issues.is_empty() => {
            log::info!("Claim certificate: {}", certificate.display());
            log::info!("Claim private key: {}", private_key.display());
            Ok(ClaimMaterial {
                certificate,
                private_key,
            })
        }
        _ => {
            for issue in &issues {
                log::error!("{issue}");
            }
            Err(ProvisionError::ClaimMaterial(issues))
        }
    }
}

fn check_path(
    configured: Option<&Path>,
    unset: ClaimIssue,
    missing: fn(PathBuf) -> ClaimIssue,
    issues: &mut Vec<ClaimIssue>,
) -> Option<PathBuf> {
    let Some(path) = configured.filter(|p| !p.as_os_str().is_empty()) else {
        issues.push(unset);
        return None;
    };
    if !path.exists() {
        issues.push(missing(path.to_path_buf()));
        return None;
    }
    Some(path.to_path_buf())
}
