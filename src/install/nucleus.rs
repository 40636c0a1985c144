//! Nucleus launch and startup watch

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;

use crate::error::ProvisionError;
use crate::layout::Layout;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const PROGRESS_EVERY: u64 = 5;
const LOG_TAIL_LINES: usize = 5;
const CONSOLE_TAIL_LINES: usize = 20;

/// A nucleus that survived the startup window.
///
/// Surviving the window only means the JVM did not exit; the nucleus may
/// still fail later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NucleusHandle {
    pub pid: u32,
}

/// Start the nucleus and watch it for `window`.
///
/// The process is left running after a successful watch. Its stdout and
/// stderr go to [`Layout::nucleus_console_log`].
pub async fn launch_nucleus(
    java: &Path,
    layout: &Layout,
    window: Duration,
) -> Result<NucleusHandle> {
    let jar = layout.nucleus_jar();
    if !jar.is_file() {
        return Err(ProvisionError::NucleusJarMissing(jar).into());
    }

    let mut root_prop = OsString::from("-Droot=");
    root_prop.push(layout.greengrass_root());
    let args: [OsString; 4] = [
        root_prop,
        "-Dlog.store=FILE".into(),
        "-jar".into(),
        jar.into(),
    ];

    let mut cmd = Command::new(java);
    cmd.args(&args);

    log::info!("Starting Greengrass nucleus...");
    let handle = match watch_startup(cmd, window, &layout.nucleus_console_log()).await {
        Ok(handle) => handle,
        Err(e) => {
            let manual = args
                .iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ");
            log::error!("Start the nucleus manually with: {} {manual}", java.display());
            return Err(e);
        }
    };

    log::info!("Greengrass nucleus running (PID {})", handle.pid);
    tail_log(&layout.nucleus_log()).await;
    Ok(handle)
}

async fn watch_startup(
    mut cmd: Command,
    window: Duration,
    console: &Path,
) -> Result<NucleusHandle> {
    if let Some(parent) = console.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let stdout = std::fs::File::create(console)
        .with_context(|| format!("Failed to create {}", console.display()))?;
    let stderr = stdout
        .try_clone()
        .context("Failed to share nucleus console log")?;

    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(false);

    // Own process group so the nucleus outlives a terminal hangup
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().context("Failed to start Greengrass nucleus")?;
    let pid = child
        .id()
        .context("Nucleus process exited before its PID could be read")?;
    log::info!("Nucleus started with PID {pid}");
    log::debug!("Nucleus console output: {}", console.display());

    let checks = window.as_secs().max(1);
    for check in 1..=checks {
        tokio::time::sleep(POLL_INTERVAL).await;

        if let Some(status) = child
            .try_wait()
            .context("Failed to poll nucleus process")?
        {
            log::error!("Nucleus exited after {check}s with {status}");
            let output = tokio::fs::read_to_string(console)
                .await
                .map(|content| last_lines(&content, CONSOLE_TAIL_LINES).join("\n"))
                .unwrap_or_default();
            return Err(ProvisionError::NucleusExited {
                code: status.code(),
                output,
            }
            .into());
        }

        if check % PROGRESS_EVERY == 0 {
            log::info!("Nucleus still running after {check}s...");
        }
    }

    Ok(NucleusHandle { pid })
}

/// Log the last few lines of the nucleus log, if it exists yet
async fn tail_log(path: &Path) {
    let Ok(content) = tokio::fs::read_to_string(path).await else {
        log::debug!("No nucleus log at {} yet", path.display());
        return;
    };

    log::info!("Recent nucleus log ({}):", path.display());
    for line in last_lines(&content, LOG_TAIL_LINES) {
        log::info!("  {line}");
    }
}

fn last_lines(content: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = content.lines().collect();
    lines[lines.len().saturating_sub(n)..].to_vec()
}
