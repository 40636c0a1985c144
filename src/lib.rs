//! Provisioning for AWS IoT Greengrass v2 edge gateways
//!
//! Two pipelines live in [`flows`]: fleet provisioning by claim certificate
//! ([`flows::run_bootstrap`]) and manual registration with operator access
//! keys ([`flows::run_setup`]). Both end by running the Greengrass installer
//! from the nucleus archive bundled in the snap.

pub mod claims;
pub mod config;
pub mod error;
pub mod flows;
pub mod identity;
pub mod install;
pub mod layout;
pub mod minter;
pub mod root_ca;
pub mod runtime_config;

pub use error::ProvisionError;
