//! Filesystem layout for a provisioning run
//!
//! Paths are derived from the snap environment (`SNAP`, `SNAP_COMMON`), each
//! falling back to `/tmp` so the flows can be exercised outside a snap.

use std::path::{Path, PathBuf};

const FALLBACK_DIR: &str = "/tmp";
const CONFIG_FILE_NAME: &str = "bootstrap-config.yaml";
const SYSTEM_CONFIG_PATH: &str = "/var/snap/aws-iot-greengrass/common/bootstrap-config.yaml";
const ROOT_CA_FILE_NAME: &str = "AmazonRootCA1.pem";

/// Resolved directories for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Read-only snap payload (`SNAP`)
    pub snap_dir: PathBuf,
    /// Writable per-snap data directory (`SNAP_COMMON`)
    pub common_dir: PathBuf,
}

impl Layout {
    pub fn new(snap_dir: impl Into<PathBuf>, common_dir: impl Into<PathBuf>) -> Self {
        Self {
            snap_dir: snap_dir.into(),
            common_dir: common_dir.into(),
        }
    }

    /// Build the layout from `SNAP` / `SNAP_COMMON`
    pub fn from_env() -> Self {
        let snap_dir = env_dir("SNAP");
        let common_dir = env_dir("SNAP_COMMON");
        log::debug!(
            "layout: snap={} common={}",
            snap_dir.display(),
            common_dir.display()
        );
        Self {
            snap_dir,
            common_dir,
        }
    }

    /// Ordered bootstrap config search path
    pub fn config_candidates(&self, cwd: &Path) -> Vec<PathBuf> {
        vec![
            self.common_dir.join(CONFIG_FILE_NAME),
            PathBuf::from(SYSTEM_CONFIG_PATH),
            cwd.join(CONFIG_FILE_NAME),
        ]
    }

    pub fn certs_dir(&self) -> PathBuf {
        self.common_dir.join("certs")
    }

    pub fn root_ca_path(&self) -> PathBuf {
        self.certs_dir().join(ROOT_CA_FILE_NAME)
    }

    pub fn greengrass_root(&self) -> PathBuf {
        self.common_dir.join("greengrass").join("v2")
    }

    pub fn runtime_config_path(&self) -> PathBuf {
        self.greengrass_root().join("config.yaml")
    }

    pub fn nucleus_archive(&self) -> PathBuf {
        self.snap_dir
            .join("opt")
            .join("greengrass")
            .join("greengrass-nucleus.zip")
    }

    pub fn installer_jar(&self) -> PathBuf {
        self.greengrass_root().join("lib").join("Greengrass.jar")
    }

    pub fn nucleus_jar(&self) -> PathBuf {
        self.greengrass_root()
            .join("alts/current/distro/lib")
            .join("Greengrass.jar")
    }

    pub fn fleet_plugin_jar(&self) -> PathBuf {
        self.greengrass_root()
            .join("plugins")
            .join("aws.greengrass.FleetProvisioningByClaim.jar")
    }

    pub fn nucleus_log(&self) -> PathBuf {
        self.greengrass_root().join("logs").join("greengrass.log")
    }

    /// Captured stdout/stderr of a nucleus started by `launch_nucleus`
    pub fn nucleus_console_log(&self) -> PathBuf {
        self.greengrass_root().join("logs").join("nucleus-console.log")
    }
}

fn env_dir(var: &str) -> PathBuf {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DIR))
}
