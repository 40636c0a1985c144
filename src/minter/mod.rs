//! Direct device registration against the IoT control plane
//!
//! Used by the manual setup flow: the device gets its own thing, certificate
//! and policy up front instead of exchanging a claim certificate later.
//!
//! ## Module Organization
//!
//! - `aws` - `IotControlPlane` backed by the AWS SDK
//! - `credentials` - operator access keys, from flags or prompts
//! - `policy` - IoT policy document for Greengrass core devices

mod aws;
mod credentials;
mod policy;

pub use aws::AwsControlPlane;
pub use credentials::{CredentialField, StaticCredentials, prompt_credential};
pub use policy::greengrass_core_policy;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

pub const THING_TYPE_NAME: &str = "GreengrassCore";
pub const THING_TYPE_DESCRIPTION: &str = "Greengrass Core Device";

/// Endpoint types served by `DescribeEndpoint`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    DataAts,
    CredentialProvider,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::DataAts => "iot:Data-ATS",
            EndpointKind::CredentialProvider => "iot:CredentialProvider",
        }
    }
}

/// Control-plane failures. `AlreadyExists` is the only benign outcome.
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("{operation}: {resource} already exists")]
    AlreadyExists {
        operation: &'static str,
        resource: String,
    },
    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },
}

/// Certificate and key pair issued by `CreateKeysAndCertificate`
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub arn: String,
    pub id: String,
    pub pem: String,
    pub private_key: String,
}

/// The subset of IoT/STS operations device registration needs
#[async_trait]
pub trait IotControlPlane: Send + Sync {
    async fn caller_account(&self) -> Result<String, ControlPlaneError>;
    async fn describe_endpoint(&self, kind: EndpointKind) -> Result<String, ControlPlaneError>;
    async fn create_thing_type(&self, name: &str, description: &str)
    -> Result<(), ControlPlaneError>;
    async fn create_thing(&self, name: &str, thing_type: &str) -> Result<(), ControlPlaneError>;
    async fn create_keys_and_certificate(&self) -> Result<IssuedCertificate, ControlPlaneError>;
    async fn attach_thing_principal(
        &self,
        thing_name: &str,
        principal: &str,
    ) -> Result<(), ControlPlaneError>;
    async fn create_policy(&self, name: &str, document: &str) -> Result<(), ControlPlaneError>;
    async fn attach_policy(&self, name: &str, target: &str) -> Result<(), ControlPlaneError>;
}

/// Treat `AlreadyExists` as success; every other error propagates.
fn tolerate_existing(result: Result<(), ControlPlaneError>) -> Result<(), ControlPlaneError> {
    match result {
        Err(ControlPlaneError::AlreadyExists { resource, .. }) => {
            log::warn!("{resource} already exists");
            Ok(())
        }
        other => other,
    }
}

#[derive(Debug, Clone)]
pub struct MintRequest {
    pub thing_name: String,
    pub region: String,
    pub role_alias: String,
}

/// Everything the setup flow needs after registration
#[derive(Debug, Clone)]
pub struct MintedDevice {
    pub account_id: String,
    pub data_endpoint: String,
    pub cred_endpoint: String,
    pub certificate_arn: String,
    pub certificate_id: String,
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
    pub policy_name: String,
}

pub fn policy_name_for(thing_name: &str) -> String {
    format!("{thing_name}-GreengrassV2IoTThingPolicy")
}

/// Register the device: thing type, thing, certificate, policy.
///
/// Certificate and key are written under `certs_dir` as
/// `<thing>.cert.pem` (0644) and `<thing>.private.key` (0600).
pub async fn mint_device_credentials<C>(
    plane: &C,
    request: &MintRequest,
    certs_dir: &Path,
) -> Result<MintedDevice>
where
    C: IotControlPlane + ?Sized,
{
    let account_id = plane.caller_account().await?;
    log::info!("Account: {account_id}");

    let data_endpoint = plane.describe_endpoint(EndpointKind::DataAts).await?;
    log::info!("Data endpoint: {data_endpoint}");
    let cred_endpoint = plane
        .describe_endpoint(EndpointKind::CredentialProvider)
        .await?;
    log::info!("Credentials endpoint: {cred_endpoint}");

    tolerate_existing(
        plane
            .create_thing_type(THING_TYPE_NAME, THING_TYPE_DESCRIPTION)
            .await,
    )?;
    tolerate_existing(plane.create_thing(&request.thing_name, THING_TYPE_NAME).await)?;
    log::info!("IoT thing ready: {}", request.thing_name);

    let issued = plane.create_keys_and_certificate().await?;
    log::info!("Created certificate: {}", issued.id);

    let (certificate_path, private_key_path) =
        persist_certificate(certs_dir, &request.thing_name, &issued)?;

    plane
        .attach_thing_principal(&request.thing_name, &issued.arn)
        .await?;
    log::info!("Attached certificate to thing: {}", request.thing_name);

    let policy_name = policy_name_for(&request.thing_name);
    let document = greengrass_core_policy(&request.region, &account_id, &request.role_alias);
    tolerate_existing(
        plane
            .create_policy(&policy_name, &document.to_string())
            .await,
    )?;
    plane.attach_policy(&policy_name, &issued.arn).await?;
    log::info!("Attached policy '{policy_name}' to certificate");

    Ok(MintedDevice {
        account_id,
        data_endpoint,
        cred_endpoint,
        certificate_arn: issued.arn,
        certificate_id: issued.id,
        certificate_path,
        private_key_path,
        policy_name,
    })
}

fn persist_certificate(
    certs_dir: &Path,
    thing_name: &str,
    issued: &IssuedCertificate,
) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(certs_dir)
        .with_context(|| format!("Failed to create {}", certs_dir.display()))?;

    let cert_path = certs_dir.join(format!("{thing_name}.cert.pem"));
    let key_path = certs_dir.join(format!("{thing_name}.private.key"));

    write_with_mode(&cert_path, &issued.pem, 0o644)?;
    write_with_mode(&key_path, &issued.private_key, 0o600)?;

    log::info!("Saved certificate to: {}", cert_path.display());
    log::info!("Saved private key to: {}", key_path.display());
    Ok((cert_path, key_path))
}

fn write_with_mode(path: &Path, content: &str, mode: u32) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
