//! Amazon root CA download and cache

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ProvisionError;

pub const AMAZON_ROOT_CA_URL: &str = "https://www.amazontrust.com/repository/AmazonRootCA1.pem";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Return the cached root CA at `dest`, downloading it from `url` first if absent.
pub async fn fetch_root_ca(url: &str, dest: &Path) -> Result<PathBuf, ProvisionError> {
    if tokio::fs::try_exists(dest).await.unwrap_or(false) {
        log::info!("Root CA exists: {}", dest.display());
        return Ok(dest.to_path_buf());
    }

    let fail = |message: String| ProvisionError::RootCaDownload {
        url: url.to_string(),
        message,
    };

    log::info!("Downloading Root CA from {url}...");

    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .user_agent(concat!("gg-provision/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let body = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| fail(e.to_string()))?
        .bytes()
        .await
        .map_err(|e| fail(e.to_string()))?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| fail(format!("create {}: {e}", parent.display())))?;
    }
    tokio::fs::write(dest, &body)
        .await
        .map_err(|e| fail(format!("write {}: {e}", dest.display())))?;

    log::info!("Downloaded Root CA: {}", dest.display());
    Ok(dest.to_path_buf())
}
