//! Device identity resolution
//!
//! The configured `deviceName` is either a literal, a template carrying
//! hardware tokens (`${SERIAL}`, `${SERIAL_NUMBER}`, `${MAC}`,
//! `${MAC_ADDRESS}`), or the `PROMPT` sentinel. Hardware lookups never fail
//! the run; a lookup that yields nothing falls through to the next strategy
//! and ultimately to the interactive prompt.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::{BootstrapConfig, PROMPT_SENTINEL};
use crate::error::ProvisionError;

const SERIAL_TOKENS: [&str; 2] = ["${SERIAL}", "${SERIAL_NUMBER}"];
const MAC_TOKENS: [&str; 2] = ["${MAC}", "${MAC_ADDRESS}"];
const ZERO_SERIAL: &str = "0000000000000000";
const DMI_PLACEHOLDERS: [&str; 2] = ["to be filled by o.e.m.", "not specified"];
const DMI_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolved device identity, fixed for the rest of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub name: String,
    /// Fleet-provisioning `SerialNumber` template parameter
    pub serial_number: String,
}

impl DeviceIdentity {
    pub async fn resolve<P, F>(
        config: &BootstrapConfig,
        probe: &P,
        prompt: F,
    ) -> Result<Self, ProvisionError>
    where
        P: HardwareProbe + ?Sized,
        F: FnOnce() -> Option<String>,
    {
        let name = resolve_device_name(config.device_name_or_prompt(), probe, prompt).await?;
        let configured = config
            .serial_number
            .clone()
            .filter(|s| !s.trim().is_empty());
        let serial_number = match configured {
            Some(serial) => serial,
            None => probe.serial_number().await.unwrap_or_else(|| name.clone()),
        };

        log::info!("Device name: {name}");
        log::info!("Serial number: {serial_number}");
        Ok(Self {
            name,
            serial_number,
        })
    }
}

/// Source of hardware identifiers. Implementations swallow their own errors.
#[async_trait]
pub trait HardwareProbe: Send + Sync {
    async fn serial_number(&self) -> Option<String>;
    async fn mac_address(&self) -> Option<String>;
}

/// Probe backed by procfs, sysfs and `dmidecode`
#[derive(Debug, Clone)]
pub struct SystemProbe {
    cpuinfo: PathBuf,
    net_class: PathBuf,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self {
            cpuinfo: PathBuf::from("/proc/cpuinfo"),
            net_class: PathBuf::from("/sys/class/net"),
        }
    }
}

impl SystemProbe {
    pub fn with_roots(cpuinfo: impl Into<PathBuf>, net_class: impl Into<PathBuf>) -> Self {
        Self {
            cpuinfo: cpuinfo.into(),
            net_class: net_class.into(),
        }
    }

    async fn dmi_serial() -> Option<String> {
        let output = timeout(
            DMI_TIMEOUT,
            Command::new("dmidecode")
                .args(["-s", "system-serial-number"])
                .kill_on_drop(true)
                .output(),
        )
        .await;
        let output = match output {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                log::debug!("dmidecode unavailable: {e}");
                return None;
            }
            Err(_) => {
                log::warn!("dmidecode timed out after {}s", DMI_TIMEOUT.as_secs());
                return None;
            }
        };
        if !output.status.success() {
            return None;
        }
        let serial = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let lowered = serial.to_lowercase();
        if serial.is_empty() || DMI_PLACEHOLDERS.contains(&lowered.as_str()) {
            return None;
        }
        Some(serial)
    }
}

#[async_trait]
impl HardwareProbe for SystemProbe {
    async fn serial_number(&self) -> Option<String> {
        let from_cpuinfo = tokio::fs::read_to_string(&self.cpuinfo)
            .await
            .ok()
            .and_then(|content| cpuinfo_serial(&content));
        match from_cpuinfo {
            Some(serial) => Some(serial),
            None => Self::dmi_serial().await,
        }
    }

    async fn mac_address(&self) -> Option<String> {
        first_interface_mac(&self.net_class)
    }
}

/// `Serial` field of a `/proc/cpuinfo` dump (Raspberry Pi style firmware info)
fn cpuinfo_serial(content: &str) -> Option<String> {
    content
        .lines()
        .filter(|line| line.starts_with("Serial"))
        .filter_map(|line| line.split_once(':'))
        .map(|(_, value)| value.trim())
        .find(|value| !value.is_empty() && *value != ZERO_SERIAL)
        .map(str::to_string)
}

/// Hardware address of the first non-loopback interface, colons stripped.
///
/// Interfaces are taken in `ifindex` order, which puts the board's own NICs
/// ahead of bridges created later (`docker0`, `br-*`).
fn first_interface_mac(net_class: &Path) -> Option<String> {
    let mut interfaces: Vec<(u32, PathBuf)> = std::fs::read_dir(net_class)
        .ok()?
        .flatten()
        .filter(|entry| entry.file_name() != "lo")
        .map(|entry| (interface_index(&entry.path()), entry.path()))
        .collect();
    interfaces.sort();
    let interfaces = interfaces.into_iter().map(|(_, path)| path);

    interfaces.into_iter().find_map(|iface| {
        let address = std::fs::read_to_string(iface.join("address")).ok()?;
        let address = address.trim();
        if address.is_empty() || address.chars().all(|c| c == '0' || c == ':') {
            return None;
        }
        Some(address.replace(':', ""))
    })
}

/// Kernel interface index; interfaces without one sort last
fn interface_index(iface: &Path) -> u32 {
    std::fs::read_to_string(iface.join("ifindex"))
        .ok()
        .and_then(|index| index.trim().parse().ok())
        .unwrap_or(u32::MAX)
}

fn contains_any(name: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| name.contains(t))
}

fn substitute(name: &str, tokens: &[&str], value: &str) -> String {
    tokens
        .iter()
        .fold(name.to_string(), |acc, token| acc.replace(token, value))
}

/// Resolve the device name from its configured form.
///
/// `prompt` is only invoked when no other strategy produced a name.
pub async fn resolve_device_name<P, F>(
    configured: &str,
    probe: &P,
    prompt: F,
) -> Result<String, ProvisionError>
where
    P: HardwareProbe + ?Sized,
    F: FnOnce() -> Option<String>,
{
    let configured = configured.trim();

    if !configured.is_empty() && configured != PROMPT_SENTINEL && !configured.contains("${") {
        return Ok(configured.to_string());
    }

    if contains_any(configured, &SERIAL_TOKENS) {
        match probe.serial_number().await {
            Some(serial) => {
                let name = substitute(configured, &SERIAL_TOKENS, &serial);
                log::info!("Generated device name from serial: {name}");
                return Ok(name);
            }
            None => log::warn!("Could not read hardware serial number"),
        }
    }

    if contains_any(configured, &MAC_TOKENS) {
        match probe.mac_address().await {
            Some(mac) => {
                let name = substitute(configured, &MAC_TOKENS, &mac);
                log::info!("Generated device name from MAC: {name}");
                return Ok(name);
            }
            None => log::warn!("Could not read MAC address"),
        }
    }

    prompt()
        .map(|answer| answer.trim().to_string())
        .filter(|answer| !answer.is_empty())
        .ok_or(ProvisionError::MissingDeviceName)
}

/// Interactive fallback used by the CLI
pub fn prompt_device_name() -> Option<String> {
    inquire::Text::new("Enter device name for IoT Core Thing:")
        .prompt()
        .map_err(|e| log::error!("Prompt cancelled: {e}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FixedProbe {
        serial: Option<&'static str>,
        mac: Option<&'static str>,
        serial_calls: AtomicUsize,
    }

    impl FixedProbe {
        fn new(serial: Option<&'static str>, mac: Option<&'static str>) -> Self {
            Self {
                serial,
                mac,
                serial_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HardwareProbe for FixedProbe {
        async fn serial_number(&self) -> Option<String> {
            self.serial_calls.fetch_add(1, Ordering::SeqCst);
            self.serial.map(str::to_string)
        }

        async fn mac_address(&self) -> Option<String> {
            self.mac.map(str::to_string)
        }
    }

    fn no_prompt() -> Option<String> {
        panic!("prompt should not be reached")
    }

    #[tokio::test]
    async fn literal_names_pass_through_unchanged() {
        let probe = FixedProbe::new(Some("SER1"), Some("aabbccddeeff"));
        for literal in ["gateway-01", "edge.site-a", "Thing_With_Underscores"] {
            let name = resolve_device_name(literal, &probe, no_prompt).await.unwrap();
            assert_eq!(name, literal);
        }
        assert_eq!(probe.serial_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn serial_token_is_substituted_and_mac_token_left_alone() {
        let probe = FixedProbe::new(Some("10000000abcdef01"), Some("aabbccddeeff"));
        let name = resolve_device_name("gw-${SERIAL}-${MAC}", &probe, no_prompt)
            .await
            .unwrap();
        assert_eq!(name, "gw-10000000abcdef01-${MAC}");
    }

    #[tokio::test]
    async fn serial_number_alias_token_is_substituted() {
        let probe = FixedProbe::new(Some("S42"), None);
        let name = resolve_device_name("${SERIAL_NUMBER}", &probe, no_prompt)
            .await
            .unwrap();
        assert_eq!(name, "S42");
    }

    #[tokio::test]
    async fn missing_serial_falls_through_to_mac() {
        let probe = FixedProbe::new(None, Some("0242ac110002"));
        let name = resolve_device_name("gw-${SERIAL}-${MAC_ADDRESS}", &probe, no_prompt)
            .await
            .unwrap();
        assert_eq!(name, "gw-${SERIAL}-0242ac110002");
    }

    #[tokio::test]
    async fn failed_lookups_fall_through_to_prompt() {
        let probe = FixedProbe::new(None, None);
        let name = resolve_device_name("gw-${MAC}", &probe, || Some("  typed-name  ".into()))
            .await
            .unwrap();
        assert_eq!(name, "typed-name");
    }

    #[tokio::test]
    async fn sentinel_and_empty_prompt() {
        let probe = FixedProbe::new(Some("S1"), None);
        let name = resolve_device_name(PROMPT_SENTINEL, &probe, || Some("manual".into()))
            .await
            .unwrap();
        assert_eq!(name, "manual");

        let err = resolve_device_name("", &probe, || Some("   ".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::MissingDeviceName));

        let err = resolve_device_name("PROMPT", &probe, || None).await.unwrap_err();
        assert!(matches!(err, ProvisionError::MissingDeviceName));
    }

    #[tokio::test]
    async fn identity_serial_prefers_config_then_hardware_then_name() {
        let probe = FixedProbe::new(Some("HW-SERIAL"), None);
        let mut config = BootstrapConfig {
            device_name: Some("gw-7".into()),
            serial_number: Some("CFG-SERIAL".into()),
            ..Default::default()
        };
        let identity = DeviceIdentity::resolve(&config, &probe, no_prompt)
            .await
            .unwrap();
        assert_eq!(identity.serial_number, "CFG-SERIAL");

        config.serial_number = None;
        let identity = DeviceIdentity::resolve(&config, &probe, no_prompt)
            .await
            .unwrap();
        assert_eq!(identity.serial_number, "HW-SERIAL");

        let bare = FixedProbe::new(None, None);
        let identity = DeviceIdentity::resolve(&config, &bare, no_prompt)
            .await
            .unwrap();
        assert_eq!(identity.serial_number, "gw-7");
    }

    #[test]
    fn cpuinfo_serial_skips_zeroed_values() {
        let pi = "processor\t: 0\nHardware\t: BCM2835\nSerial\t\t: 10000000abcdef01\n";
        assert_eq!(cpuinfo_serial(pi).as_deref(), Some("10000000abcdef01"));

        let zeroed = "Serial\t\t: 0000000000000000\n";
        assert_eq!(cpuinfo_serial(zeroed), None);
        assert_eq!(cpuinfo_serial("model name : x86\n"), None);
    }

    #[tokio::test]
    async fn first_interface_mac_skips_loopback_and_zero_addresses() {
        let dir = tempfile::tempdir().unwrap();
        for (iface, address) in [
            ("lo", "00:00:00:00:00:00"),
            ("dummy0", "00:00:00:00:00:00"),
            ("eth0", "02:42:ac:11:00:02"),
            ("wlan0", "b8:27:eb:00:00:01"),
        ] {
            let path = dir.path().join(iface);
            std::fs::create_dir(&path).unwrap();
            std::fs::write(path.join("address"), format!("{address}\n")).unwrap();
        }

        let probe = SystemProbe::with_roots(dir.path().join("cpuinfo"), dir.path());
        assert_eq!(probe.mac_address().await.as_deref(), Some("0242ac110002"));
    }

    #[tokio::test]
    async fn physical_nic_wins_over_later_bridges() {
        let dir = tempfile::tempdir().unwrap();
        for (iface, index, address) in [
            ("lo", 1, "00:00:00:00:00:00"),
            ("enp0s3", 2, "08:00:27:aa:bb:cc"),
            ("docker0", 3, "02:42:7f:11:22:33"),
            ("br-5f2a", 4, "02:42:0a:00:00:01"),
        ] {
            let path = dir.path().join(iface);
            std::fs::create_dir(&path).unwrap();
            std::fs::write(path.join("ifindex"), format!("{index}\n")).unwrap();
            std::fs::write(path.join("address"), format!("{address}\n")).unwrap();
        }

        let probe = SystemProbe::with_roots(dir.path().join("cpuinfo"), dir.path());
        assert_eq!(probe.mac_address().await.as_deref(), Some("080027aabbcc"));
    }
}
