//! Fleet provisioning by claim

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use super::report::CompletionReport;
use crate::claims::validate_claim_material;
use crate::config::load_bootstrap_config;
use crate::identity::{DeviceIdentity, HardwareProbe};
use crate::install::{self, InstallerInvocation};
use crate::layout::Layout;
use crate::root_ca::{AMAZON_ROOT_CA_URL, fetch_root_ca};
use crate::runtime_config::{GreengrassConfig, write_runtime_config};

pub const DEFAULT_BOOTSTRAP_WATCH_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Start the nucleus ourselves instead of leaving it to the service
    pub launch: bool,
    pub watch: Duration,
    pub install_timeout_secs: u64,
    pub root_ca_url: String,
    /// Last entry of the config search path
    pub cwd: PathBuf,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            launch: false,
            watch: Duration::from_secs(DEFAULT_BOOTSTRAP_WATCH_SECS),
            install_timeout_secs: install::DEFAULT_INSTALL_TIMEOUT_SECS,
            root_ca_url: AMAZON_ROOT_CA_URL.to_string(),
            cwd: PathBuf::from("."),
        }
    }
}

pub async fn run_bootstrap<P, F>(
    layout: &Layout,
    options: &BootstrapOptions,
    probe: &P,
    prompt: F,
) -> Result<CompletionReport>
where
    P: HardwareProbe + ?Sized,
    F: FnOnce() -> Option<String>,
{
    log::info!("Starting Greengrass fleet provisioning bootstrap");

    let (config, _) = load_bootstrap_config(&layout.config_candidates(&options.cwd))?;
    let identity = DeviceIdentity::resolve(&config, probe, prompt).await?;
    let claims = validate_claim_material(&config)?;
    let root_ca = fetch_root_ca(&options.root_ca_url, &layout.root_ca_path()).await?;

    let runtime = GreengrassConfig::fleet_provisioning(
        &config,
        &identity,
        &claims,
        &root_ca,
        &layout.greengrass_root(),
    )?;
    let config_path = write_runtime_config(&runtime, &layout.runtime_config_path())?;

    install::extract_archive(&layout.nucleus_archive(), &layout.greengrass_root()).await?;
    let java = install::resolve_java(&layout.snap_dir);

    let mut invocation = InstallerInvocation::new(&java, layout, &config_path);
    let plugin = layout.fleet_plugin_jar();
    if !options.launch && plugin.is_file() {
        log::info!("Trusting fleet provisioning plugin: {}", plugin.display());
        invocation = invocation.with_trusted_plugin(plugin);
    }
    install::run_installer(&invocation, options.install_timeout_secs).await?;

    let nucleus = if options.launch {
        Some(install::launch_nucleus(&java, layout, options.watch).await?)
    } else {
        log::info!("Nucleus will be started by the service manager");
        None
    };

    Ok(CompletionReport {
        title: "Greengrass fleet provisioning bootstrap complete",
        rows: vec![
            ("Device", identity.name),
            ("Serial", identity.serial_number),
            ("Region", config.aws_region.unwrap_or_default()),
            (
                "Provisioning template",
                config.provisioning_template.unwrap_or_default(),
            ),
        ],
        config_path,
        log_path: layout.nucleus_log(),
        nucleus,
    })
}
