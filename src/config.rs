use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ProvisionError;

/// Sentinel `deviceName` meaning "ask the operator"
pub const PROMPT_SENTINEL: &str = "PROMPT";
pub const DEFAULT_NUCLEUS_VERSION: &str = "2.16.0";
pub const DEFAULT_ROLE_ALIAS: &str = "GreengrassV2TokenExchangeRoleAlias";

/// Operator-supplied bootstrap configuration (`bootstrap-config.yaml`).
///
/// Everything is optional at parse time; each consumer validates the fields
/// it needs so that missing values are reported where they matter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapConfig {
    pub device_name: Option<String>,
    pub aws_region: Option<String>,
    pub provisioning_template: Option<String>,
    pub iot_data_endpoint: Option<String>,
    pub iot_cred_endpoint: Option<String>,
    pub claim_certificate_path: Option<PathBuf>,
    pub claim_private_key_path: Option<PathBuf>,
    pub nucleus_version: Option<String>,
    pub iot_role_alias: Option<String>,
    pub serial_number: Option<String>,
    #[serde(default)]
    pub template_parameters: BTreeMap<String, serde_yaml::Value>,
}

impl BootstrapConfig {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ProvisionError> {
        // An empty document deserializes as unit; treat it as "all fields unset".
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| ProvisionError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configured device name, or the prompt sentinel when absent
    pub fn device_name_or_prompt(&self) -> &str {
        self.device_name.as_deref().unwrap_or(PROMPT_SENTINEL)
    }

    pub fn nucleus_version(&self) -> &str {
        self.nucleus_version
            .as_deref()
            .unwrap_or(DEFAULT_NUCLEUS_VERSION)
    }

    pub fn role_alias(&self) -> &str {
        self.iot_role_alias.as_deref().unwrap_or(DEFAULT_ROLE_ALIAS)
    }
}

/// Load the first bootstrap config found in `candidates`.
///
/// A file that exists but fails to parse is fatal; the search does not fall
/// through to later candidates.
pub fn load_bootstrap_config(
    candidates: &[PathBuf],
) -> Result<(BootstrapConfig, PathBuf), ProvisionError> {
    for path in candidates {
        if !path.is_file() {
            log::debug!("bootstrap config not at {}", path.display());
            continue;
        }

        let content =
            std::fs::read_to_string(path).map_err(|source| ProvisionError::ConfigRead {
                path: path.clone(),
                source,
            })?;
        let config = BootstrapConfig::parse(&content, path)?;
        log::info!("Found bootstrap config: {}", path.display());
        return Ok((config, path.clone()));
    }

    for path in candidates {
        log::error!("  - {}", path.display());
    }
    Err(ProvisionError::ConfigNotFound {
        searched: candidates.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
deviceName: gateway-${SERIAL}
awsRegion: eu-west-1
provisioningTemplate: GreengrassFleetTemplate
iotDataEndpoint: abc-ats.iot.eu-west-1.amazonaws.com
iotCredEndpoint: abc.credentials.iot.eu-west-1.amazonaws.com
claimCertificatePath: /etc/claim/claim.pem.crt
claimPrivateKeyPath: /etc/claim/claim.pem.key
templateParameters:
  Site: berlin-02
  Rack: 7
"#;

    #[test]
    fn parses_camel_case_keys() {
        let config = BootstrapConfig::parse(SAMPLE, Path::new("sample.yaml")).expect("parse");
        assert_eq!(config.device_name.as_deref(), Some("gateway-${SERIAL}"));
        assert_eq!(config.aws_region.as_deref(), Some("eu-west-1"));
        assert_eq!(
            config.claim_private_key_path,
            Some(PathBuf::from("/etc/claim/claim.pem.key"))
        );
        assert_eq!(
            config.template_parameters.get("Rack"),
            Some(&serde_yaml::Value::from(7_i64))
        );
        assert_eq!(config.nucleus_version(), DEFAULT_NUCLEUS_VERSION);
        assert_eq!(config.role_alias(), DEFAULT_ROLE_ALIAS);
    }

    #[test]
    fn missing_device_name_means_prompt() {
        let config = BootstrapConfig::parse("awsRegion: us-east-1\n", Path::new("x")).unwrap();
        assert_eq!(config.device_name_or_prompt(), PROMPT_SENTINEL);
    }

    #[test]
    fn first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("missing.yaml");
        let second = dir.path().join("second.yaml");
        let third = dir.path().join("third.yaml");
        std::fs::write(&second, "deviceName: from-second\n").unwrap();
        std::fs::write(&third, "deviceName: from-third\n").unwrap();

        let (config, path) =
            load_bootstrap_config(&[first, second.clone(), third]).expect("load");
        assert_eq!(path, second);
        assert_eq!(config.device_name.as_deref(), Some("from-second"));
    }

    #[test]
    fn no_candidates_is_fatal_and_lists_paths() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = vec![dir.path().join("a.yaml"), dir.path().join("b.yaml")];

        let err = load_bootstrap_config(&candidates).unwrap_err();
        match err {
            ProvisionError::ConfigNotFound { searched } => assert_eq!(searched, candidates),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unparseable_candidate_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.yaml");
        let fallback = dir.path().join("fallback.yaml");
        std::fs::write(&broken, "deviceName: [unterminated\n").unwrap();
        std::fs::write(&fallback, "deviceName: ok\n").unwrap();

        let err = load_bootstrap_config(&[broken.clone(), fallback]).unwrap_err();
        assert!(matches!(err, ProvisionError::ConfigParse { path, .. } if path == broken));
    }
}
