//! Manual device setup with operator credentials

use std::time::Duration;

use anyhow::Result;

use super::report::CompletionReport;
use crate::config::DEFAULT_ROLE_ALIAS;
use crate::install::{self, InstallerInvocation};
use crate::layout::Layout;
use crate::minter::{IotControlPlane, MintRequest, mint_device_credentials};
use crate::root_ca::{AMAZON_ROOT_CA_URL, fetch_root_ca};
use crate::runtime_config::{
    GreengrassConfig, MANUAL_NUCLEUS_VERSION, NucleusSettings, write_runtime_config,
};

pub const DEFAULT_SETUP_WATCH_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct SetupOptions {
    pub region: String,
    pub watch: Duration,
    pub install_timeout_secs: u64,
    pub root_ca_url: String,
}

impl SetupOptions {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            watch: Duration::from_secs(DEFAULT_SETUP_WATCH_SECS),
            install_timeout_secs: install::DEFAULT_INSTALL_TIMEOUT_SECS,
            root_ca_url: AMAZON_ROOT_CA_URL.to_string(),
        }
    }
}

pub async fn run_setup<C>(
    layout: &Layout,
    options: &SetupOptions,
    plane: &C,
    device_name: &str,
) -> Result<CompletionReport>
where
    C: IotControlPlane + ?Sized,
{
    log::info!("Setting up Greengrass device '{device_name}' in {}", options.region);

    let request = MintRequest {
        thing_name: device_name.to_string(),
        region: options.region.clone(),
        role_alias: DEFAULT_ROLE_ALIAS.to_string(),
    };
    let minted = mint_device_credentials(plane, &request, &layout.certs_dir()).await?;
    let root_ca = fetch_root_ca(&options.root_ca_url, &layout.root_ca_path()).await?;

    let runtime = GreengrassConfig::manual(
        device_name,
        &minted.certificate_path,
        &minted.private_key_path,
        &root_ca,
        &layout.greengrass_root(),
        &NucleusSettings {
            version: MANUAL_NUCLEUS_VERSION,
            region: &options.region,
            role_alias: &request.role_alias,
            data_endpoint: &minted.data_endpoint,
            cred_endpoint: &minted.cred_endpoint,
        },
    );
    let config_path = write_runtime_config(&runtime, &layout.runtime_config_path())?;

    install::extract_archive(&layout.nucleus_archive(), &layout.greengrass_root()).await?;
    let java = install::resolve_java(&layout.snap_dir);
    install::probe_java_version(&java).await?;

    let invocation = InstallerInvocation::new(&java, layout, &config_path);
    install::run_installer(&invocation, options.install_timeout_secs).await?;

    let nucleus = install::launch_nucleus(&java, layout, options.watch).await?;

    Ok(CompletionReport {
        title: "Greengrass setup complete",
        rows: vec![
            ("Device", device_name.to_string()),
            ("Region", options.region.clone()),
            ("Account", minted.account_id),
            ("Certificate", minted.certificate_arn),
            ("Policy", minted.policy_name),
        ],
        config_path,
        log_path: layout.nucleus_log(),
        nucleus: Some(nucleus),
    })
}
