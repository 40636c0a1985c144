mod cli;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::error;

use greengrass_provision::ProvisionError;
use greengrass_provision::flows::{self, BootstrapOptions, SetupOptions};
use greengrass_provision::identity::{SystemProbe, prompt_device_name};
use greengrass_provision::layout::Layout;
use greengrass_provision::minter::{AwsControlPlane, StaticCredentials, prompt_credential};

fn main() {
    // Same line format as the snap's other services
    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(real_main()) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn real_main() -> Result<()> {
    let args = cli::Args::parse();
    let layout = Layout::from_env();

    let report = match args.sub {
        cli::Cmd::Bootstrap {
            launch,
            watch_secs,
            install_timeout_secs,
            root_ca_url,
        } => {
            let options = BootstrapOptions {
                launch,
                watch: Duration::from_secs(watch_secs),
                install_timeout_secs,
                root_ca_url,
                cwd: std::env::current_dir()?,
            };
            flows::run_bootstrap(&layout, &options, &SystemProbe::default(), prompt_device_name)
                .await?
        }
        cli::Cmd::Setup {
            device_name,
            region,
            access_key_id,
            secret_access_key,
            watch_secs,
            install_timeout_secs,
        } => {
            let device_name = device_name
                .filter(|name| !name.trim().is_empty())
                .or_else(prompt_device_name)
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .ok_or(ProvisionError::MissingDeviceName)?;
            let credentials = StaticCredentials::complete(
                access_key_id,
                secret_access_key,
                region,
                prompt_credential,
            )?;

            let plane = AwsControlPlane::connect(&credentials).await;
            let mut options = SetupOptions::new(credentials.region.clone());
            options.watch = Duration::from_secs(watch_secs);
            options.install_timeout_secs = install_timeout_secs;

            flows::run_setup(&layout, &options, &plane, &device_name).await?
        }
    };

    report.print();
    Ok(())
}
