//! Greengrass installation
//!
//! Extracts the bundled nucleus distribution, locates a Java runtime, runs
//! the Greengrass installer and, when asked, starts the nucleus.

mod archive;
mod installer;
mod java;
mod nucleus;

pub use archive::extract_archive;
pub use installer::{DEFAULT_INSTALL_TIMEOUT_SECS, InstallerInvocation, run_installer};
pub use java::{probe_java_version, resolve_java};
pub use nucleus::{NucleusHandle, launch_nucleus};
