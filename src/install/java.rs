//! Java runtime discovery for the Greengrass installer

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::timeout;

use crate::error::ProvisionError;

const BARE_JAVA: &str = "java";
const JVM_DIR: &str = "usr/lib/jvm";
const PINNED_JVM: &str = "java-11-openjdk-amd64";
const VERSIONED_JVM_PREFIX: &str = "java-11-openjdk-";
const SYSTEM_JAVA: &str = "/usr/bin/java";
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pick a Java executable, falling back to the bare `java` command.
///
/// The fallback is not verified; if it is not on `PATH` the installer
/// invocation fails instead.
pub fn resolve_java(snap_dir: &Path) -> PathBuf {
    resolve_java_in(snap_dir, &[PathBuf::from(SYSTEM_JAVA)])
}

fn resolve_java_in(snap_dir: &Path, system_candidates: &[PathBuf]) -> PathBuf {
    let jvm_dir = snap_dir.join(JVM_DIR);

    let found = std::iter::once(jvm_dir.join(PINNED_JVM).join("bin/java"))
        .chain(versioned_jvm(&jvm_dir))
        .chain(std::iter::once(snap_dir.join("usr/bin/java")))
        .chain(system_candidates.iter().cloned())
        .find(|candidate| candidate.is_file());

    match found {
        Some(java) => {
            log::info!("Using Java: {}", java.display());
            java
        }
        None => {
            match which::which(BARE_JAVA) {
                Ok(path) => log::info!("Using Java: {BARE_JAVA} ({})", path.display()),
                Err(_) => log::warn!("Using Java: {BARE_JAVA} (not found on PATH)"),
            }
            PathBuf::from(BARE_JAVA)
        }
    }
}

/// `<jvm_dir>/java-11-openjdk-*/bin/java`, first match in name order
fn versioned_jvm(jvm_dir: &Path) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = std::fs::read_dir(jvm_dir)
        .ok()?
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(VERSIONED_JVM_PREFIX))
        })
        .map(|entry| entry.path().join("bin/java"))
        .filter(|java| java.is_file())
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Run `java -version` and return the first line it prints (on stderr).
pub async fn probe_java_version(java: &Path) -> Result<String, ProvisionError> {
    let output = timeout(
        VERSION_PROBE_TIMEOUT,
        tokio::process::Command::new(java)
            .arg("-version")
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| {
        ProvisionError::JavaUnavailable(format!(
            "{} -version timed out after {}s",
            java.display(),
            VERSION_PROBE_TIMEOUT.as_secs()
        ))
    })?
    .map_err(|e| ProvisionError::JavaUnavailable(format!("{}: {e}", java.display())))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let version = stderr
        .lines()
        .next()
        .filter(|line| !line.trim().is_empty())
        .unwrap_or("Unknown")
        .to_string();

    if !output.status.success() {
        return Err(ProvisionError::JavaUnavailable(format!(
            "{} -version exited with {}",
            java.display(),
            output.status
        )));
    }

    log::info!("Java version: {version}");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn pinned_jvm_wins() {
        let snap = tempfile::tempdir().unwrap();
        let pinned = snap.path().join("usr/lib/jvm/java-11-openjdk-amd64/bin/java");
        touch(&pinned);
        touch(&snap.path().join("usr/lib/jvm/java-11-openjdk-arm64/bin/java"));

        assert_eq!(resolve_java_in(snap.path(), &[]), pinned);
    }

    #[test]
    fn versioned_directory_matches_wildcard() {
        let snap = tempfile::tempdir().unwrap();
        touch(&snap.path().join("usr/lib/jvm/java-17-openjdk-arm64/bin/java"));
        let versioned = snap.path().join("usr/lib/jvm/java-11-openjdk-arm64/bin/java");
        touch(&versioned);
        touch(&snap.path().join("usr/bin/java"));

        assert_eq!(resolve_java_in(snap.path(), &[]), versioned);
    }

    #[test]
    fn system_candidates_come_after_snap() {
        let snap = tempfile::tempdir().unwrap();
        let host = tempfile::tempdir().unwrap();
        let host_java = host.path().join("java");
        touch(&host_java);

        assert_eq!(
            resolve_java_in(snap.path(), std::slice::from_ref(&host_java)),
            host_java
        );

        let snap_java = snap.path().join("usr/bin/java");
        touch(&snap_java);
        assert_eq!(resolve_java_in(snap.path(), &[host_java]), snap_java);
    }

    #[test]
    fn falls_back_to_bare_command() {
        let snap = tempfile::tempdir().unwrap();
        assert_eq!(resolve_java_in(snap.path(), &[]), PathBuf::from("java"));
    }

    #[tokio::test]
    async fn missing_binary_fails_version_probe() {
        let dir = tempfile::tempdir().unwrap();
        let err = probe_java_version(&dir.path().join("no-such-java"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::JavaUnavailable(_)));
    }
}
