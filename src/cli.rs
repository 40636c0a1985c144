use clap::{Parser, Subcommand};

use greengrass_provision::flows::{DEFAULT_BOOTSTRAP_WATCH_SECS, DEFAULT_SETUP_WATCH_SECS};
use greengrass_provision::install::DEFAULT_INSTALL_TIMEOUT_SECS;
use greengrass_provision::root_ca::AMAZON_ROOT_CA_URL;

#[derive(Parser, Debug)]
#[command(version, about = "AWS IoT Greengrass v2 device provisioning")]
pub struct Args {
    #[command(subcommand)]
    pub sub: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Fleet provisioning by claim, driven by bootstrap-config.yaml
    Bootstrap {
        /// Start the nucleus and watch it instead of leaving it to the service
        #[arg(long)]
        launch: bool,

        /// Seconds to watch the nucleus after launch
        #[arg(long, default_value_t = DEFAULT_BOOTSTRAP_WATCH_SECS)]
        watch_secs: u64,

        /// Seconds before the Greengrass installer is killed
        #[arg(long, default_value_t = DEFAULT_INSTALL_TIMEOUT_SECS)]
        install_timeout_secs: u64,

        #[arg(long, default_value = AMAZON_ROOT_CA_URL)]
        root_ca_url: String,
    },
    /// Register the device directly with AWS access keys (prompts for anything missing)
    Setup {
        #[arg(long)]
        device_name: Option<String>,

        #[arg(long, env = "AWS_REGION")]
        region: Option<String>,

        #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
        access_key_id: Option<String>,

        #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
        secret_access_key: Option<String>,

        /// Seconds to watch the nucleus after launch
        #[arg(long, default_value_t = DEFAULT_SETUP_WATCH_SECS)]
        watch_secs: u64,

        /// Seconds before the Greengrass installer is killed
        #[arg(long, default_value_t = DEFAULT_INSTALL_TIMEOUT_SECS)]
        install_timeout_secs: u64,
    },
}
