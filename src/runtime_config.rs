//! Greengrass nucleus `config.yaml` generation
//!
//! The layout mirrors the Greengrass v2 initial-config schema: a `system`
//! block with identity material and a `services` block holding the nucleus
//! and, for fleet provisioning, the claim-by-certificate plugin.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::claims::ClaimMaterial;
use crate::config::BootstrapConfig;
use crate::error::ProvisionError;
use crate::identity::DeviceIdentity;

pub const MANUAL_NUCLEUS_VERSION: &str = "2.12.0";
const DEFAULT_POSIX_USER: &str = "root";

pub type TemplateParameters = BTreeMap<String, serde_yaml::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreengrassConfig {
    pub system: SystemConfig,
    pub services: Services,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    pub certificate_file_path: PathBuf,
    pub private_key_path: PathBuf,
    pub root_ca_path: PathBuf,
    pub rootpath: PathBuf,
    pub thing_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Services {
    #[serde(rename = "aws.greengrass.Nucleus")]
    pub nucleus: NucleusService,
    #[serde(
        rename = "aws.greengrass.FleetProvisioning",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub fleet_provisioning: Option<FleetProvisioningService>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NucleusService {
    pub component_type: String,
    pub version: String,
    pub configuration: NucleusConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NucleusConfiguration {
    pub aws_region: String,
    pub iot_role_alias: String,
    pub iot_data_endpoint: String,
    pub iot_cred_endpoint: String,
    pub run_with_default: RunWithDefault,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunWithDefault {
    pub posix_user: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetProvisioningService {
    pub component_type: String,
    pub configuration: FleetProvisioningConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetProvisioningConfiguration {
    pub provisioning_template: String,
    pub claim_certificate_path: PathBuf,
    pub claim_certificate_private_key_path: PathBuf,
    pub root_ca_path: PathBuf,
    pub aws_region: String,
    pub iot_data_endpoint: String,
    pub template_parameters: TemplateParameters,
}

/// Inputs for the nucleus service block
#[derive(Debug, Clone)]
pub struct NucleusSettings<'a> {
    pub version: &'a str,
    pub region: &'a str,
    pub role_alias: &'a str,
    pub data_endpoint: &'a str,
    pub cred_endpoint: &'a str,
}

impl NucleusService {
    fn new(settings: &NucleusSettings<'_>) -> Self {
        Self {
            component_type: "NUCLEUS".to_string(),
            version: settings.version.to_string(),
            configuration: NucleusConfiguration {
                aws_region: settings.region.to_string(),
                iot_role_alias: settings.role_alias.to_string(),
                iot_data_endpoint: settings.data_endpoint.to_string(),
                iot_cred_endpoint: settings.cred_endpoint.to_string(),
                run_with_default: RunWithDefault {
                    posix_user: DEFAULT_POSIX_USER.to_string(),
                },
            },
        }
    }
}

/// Seed `ThingName`/`SerialNumber`, then overlay operator parameters (operator wins).
pub fn merge_template_parameters(
    identity: &DeviceIdentity,
    operator: &TemplateParameters,
) -> TemplateParameters {
    let mut params = TemplateParameters::new();
    params.insert("ThingName".into(), identity.name.clone().into());
    params.insert("SerialNumber".into(), identity.serial_number.clone().into());
    params.extend(operator.iter().map(|(k, v)| (k.clone(), v.clone())));
    params
}

impl GreengrassConfig {
    /// Config for fleet provisioning by claim: the nucleus starts with the
    /// claim certificate and the plugin exchanges it for a device certificate.
    pub fn fleet_provisioning(
        config: &BootstrapConfig,
        identity: &DeviceIdentity,
        claims: &ClaimMaterial,
        root_ca_path: &Path,
        greengrass_root: &Path,
    ) -> Result<Self, ProvisionError> {
        let mut missing = Vec::new();
        let mut required = |value: &Option<String>, field: &'static str| {
            match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                Some(value) => value.to_string(),
                None => {
                    log::error!("{field} not specified in bootstrap config");
                    missing.push(field);
                    String::new()
                }
            }
        };
        let region = required(&config.aws_region, "awsRegion");
        let provisioning_template =
            required(&config.provisioning_template, "provisioningTemplate");
        let data_endpoint = required(&config.iot_data_endpoint, "iotDataEndpoint");
        let cred_endpoint = required(&config.iot_cred_endpoint, "iotCredEndpoint");
        if !missing.is_empty() {
            return Err(ProvisionError::FleetSettingsMissing(missing));
        }

        let nucleus = NucleusService::new(&NucleusSettings {
            version: config.nucleus_version(),
            region: &region,
            role_alias: config.role_alias(),
            data_endpoint: &data_endpoint,
            cred_endpoint: &cred_endpoint,
        });

        let plugin = FleetProvisioningService {
            component_type: "PLUGIN".to_string(),
            configuration: FleetProvisioningConfiguration {
                provisioning_template,
                claim_certificate_path: claims.certificate.clone(),
                claim_certificate_private_key_path: claims.private_key.clone(),
                root_ca_path: root_ca_path.to_path_buf(),
                aws_region: region,
                iot_data_endpoint: data_endpoint,
                template_parameters: merge_template_parameters(
                    identity,
                    &config.template_parameters,
                ),
            },
        };

        Ok(Self {
            system: SystemConfig {
                certificate_file_path: claims.certificate.clone(),
                private_key_path: claims.private_key.clone(),
                root_ca_path: root_ca_path.to_path_buf(),
                rootpath: greengrass_root.to_path_buf(),
                thing_name: identity.name.clone(),
            },
            services: Services {
                nucleus,
                fleet_provisioning: Some(plugin),
            },
        })
    }

    /// Config for a device whose certificate was minted directly
    pub fn manual(
        thing_name: &str,
        certificate: &Path,
        private_key: &Path,
        root_ca_path: &Path,
        greengrass_root: &Path,
        nucleus: &NucleusSettings<'_>,
    ) -> Self {
        Self {
            system: SystemConfig {
                certificate_file_path: certificate.to_path_buf(),
                private_key_path: private_key.to_path_buf(),
                root_ca_path: root_ca_path.to_path_buf(),
                rootpath: greengrass_root.to_path_buf(),
                thing_name: thing_name.to_string(),
            },
            services: Services {
                nucleus: NucleusService::new(nucleus),
                fleet_provisioning: None,
            },
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize Greengrass config")
    }
}

/// Write the config to `path`, replacing any previous file.
///
/// The certificate and key referenced by `system` must exist at this point.
pub fn write_runtime_config(config: &GreengrassConfig, path: &Path) -> Result<PathBuf> {
    for (kind, file) in [
        ("certificate", &config.system.certificate_file_path),
        ("private key", &config.system.private_key_path),
    ] {
        if !file.exists() {
            return Err(ProvisionError::CredentialFileMissing {
                kind,
                path: file.clone(),
            }
            .into());
        }
    }

    let yaml = config.to_yaml()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    write_file_atomic(path, &yaml)?;

    log::info!("Created Greengrass config: {}", path.display());
    Ok(path.to_path_buf())
}

fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("yaml.tmp");
    {
        let mut file = std::fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file {}", temp_path.display()))?;
        file.write_all(content.as_bytes())
            .context("Failed to write temp file")?;
        file.sync_all().context("Failed to sync temp file")?;
    }
    std::fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to move config into place at {}", path.display()))?;
    Ok(())
}
