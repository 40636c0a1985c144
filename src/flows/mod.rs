//! End-to-end provisioning pipelines
//!
//! - `bootstrap` - fleet provisioning by claim certificate
//! - `setup` - manual registration with operator credentials
//!
//! Both return a [`CompletionReport`] for the caller to print.

mod bootstrap;
mod report;
mod setup;

pub use bootstrap::{BootstrapOptions, DEFAULT_BOOTSTRAP_WATCH_SECS, run_bootstrap};
pub use report::CompletionReport;
pub use setup::{DEFAULT_SETUP_WATCH_SECS, SetupOptions, run_setup};
