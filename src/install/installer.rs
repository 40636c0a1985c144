//! Greengrass installer invocation
//!
//! The installer is `lib/Greengrass.jar` inside the extracted nucleus tree. It
//! is always run with `--start false`; starting the nucleus is either left to
//! the snap's service or done explicitly by [`super::launch_nucleus`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::time::timeout;
use walkdir::WalkDir;

use crate::error::ProvisionError;
use crate::layout::Layout;

pub const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 120;
const COMPONENT_DEFAULT_USER: &str = "root:root";
const TREE_LISTING_DEPTH: usize = 3;

/// A fully-resolved installer command line
#[derive(Debug, Clone)]
pub struct InstallerInvocation {
    pub java: PathBuf,
    pub root: PathBuf,
    pub installer_jar: PathBuf,
    pub init_config: PathBuf,
    pub trusted_plugin: Option<PathBuf>,
}

impl InstallerInvocation {
    pub fn new(java: impl Into<PathBuf>, layout: &Layout, init_config: impl Into<PathBuf>) -> Self {
        Self {
            java: java.into(),
            root: layout.greengrass_root(),
            installer_jar: layout.installer_jar(),
            init_config: init_config.into(),
            trusted_plugin: None,
        }
    }

    pub fn with_trusted_plugin(mut self, plugin: impl Into<PathBuf>) -> Self {
        self.trusted_plugin = Some(plugin.into());
        self
    }

    /// Arguments passed to the Java executable
    pub fn args(&self) -> Vec<OsString> {
        let mut root_prop = OsString::from("-Droot=");
        root_prop.push(&self.root);

        let mut args: Vec<OsString> = vec![
            root_prop,
            "-Dlog.store=FILE".into(),
            "-jar".into(),
            self.installer_jar.clone().into(),
            "--init-config".into(),
            self.init_config.clone().into(),
            "--component-default-user".into(),
            COMPONENT_DEFAULT_USER.into(),
            "--setup-system-service".into(),
            "false".into(),
            "--start".into(),
            "false".into(),
        ];
        if let Some(plugin) = &self.trusted_plugin {
            args.push("--trusted-plugin".into());
            args.push(plugin.clone().into());
        }
        args
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.java);
        cmd.args(self.args());
        cmd
    }
}

/// Run the Greengrass installer, killing it if it outlives `timeout_secs`.
pub async fn run_installer(invocation: &InstallerInvocation, timeout_secs: u64) -> Result<()> {
    if !invocation.installer_jar.is_file() {
        log_tree(&invocation.root);
        return Err(ProvisionError::InstallerJarMissing(invocation.installer_jar.clone()).into());
    }

    log::info!("Installing Greengrass...");
    log::debug!(
        "installer command: {} {:?}",
        invocation.java.display(),
        invocation.args()
    );

    run_with_timeout(invocation.command(), Duration::from_secs(timeout_secs)).await?;

    log::info!("Greengrass installed successfully");
    Ok(())
}

async fn run_with_timeout(mut cmd: Command, limit: Duration) -> Result<()> {
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("Failed to start Greengrass installer")?;

    // Dropping the wait future on timeout drops the child, which kills it
    let output = timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| ProvisionError::InstallerTimeout(limit.as_secs()))?
        .context("Failed to wait for Greengrass installer")?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        log::debug!("installer: {line}");
    }

    if !output.status.success() {
        return Err(ProvisionError::InstallerFailed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(())
}

/// Log what the archive actually produced, to diagnose a missing installer
fn log_tree(root: &Path) {
    log::error!("Contents of {}:", root.display());
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(TREE_LISTING_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .flatten()
    {
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        log::error!("  {}", relative.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation() -> InstallerInvocation {
        let layout = Layout::new("/snap/gg/current", "/var/snap/gg/common");
        InstallerInvocation::new(
            "/usr/bin/java",
            &layout,
            "/var/snap/gg/common/greengrass/v2/config.yaml",
        )
    }

    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn installer_never_starts_the_nucleus() {
        let args = invocation().args();
        let args: Vec<&str> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            [
                "-Droot=/var/snap/gg/common/greengrass/v2",
                "-Dlog.store=FILE",
                "-jar",
                "/var/snap/gg/common/greengrass/v2/lib/Greengrass.jar",
                "--init-config",
                "/var/snap/gg/common/greengrass/v2/config.yaml",
                "--component-default-user",
                "root:root",
                "--setup-system-service",
                "false",
                "--start",
                "false",
            ]
        );
    }

    #[test]
    fn trusted_plugin_is_appended() {
        let args = invocation()
            .with_trusted_plugin("/plugins/fleet.jar")
            .args();
        let tail: Vec<&str> = args[args.len() - 2..]
            .iter()
            .map(|a| a.to_str().unwrap())
            .collect();
        assert_eq!(tail, ["--trusted-plugin", "/plugins/fleet.jar"]);
    }

    #[tokio::test]
    async fn missing_installer_jar_is_fatal() {
        let common = tempfile::tempdir().unwrap();
        let layout = Layout::new(common.path(), common.path());
        let invocation = InstallerInvocation::new("java", &layout, common.path().join("c.yaml"));

        let err = run_installer(&invocation, 5).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProvisionError>(),
            Some(ProvisionError::InstallerJarMissing(_))
        ));
    }

    #[tokio::test]
    async fn non_zero_exit_carries_code_and_stderr() {
        let err = run_with_timeout(
            shell("echo 'bad config' >&2; exit 3"),
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();

        match err.downcast_ref::<ProvisionError>() {
            Some(ProvisionError::InstallerFailed { code, stderr }) => {
                assert_eq!(*code, Some(3));
                assert_eq!(stderr, "bad config");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn hung_installer_times_out() {
        let err = run_with_timeout(shell("sleep 30"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProvisionError>(),
            Some(ProvisionError::InstallerTimeout(1))
        ));
    }

    #[tokio::test]
    async fn clean_exit_succeeds() {
        run_with_timeout(shell("echo installed"), Duration::from_secs(10))
            .await
            .unwrap();
    }
}
