//! Extraction of the bundled Greengrass nucleus distribution

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use zip::ZipArchive;

use crate::error::ProvisionError;

/// Extract `archive` into `dest`, returning the number of files written.
///
/// Entries whose names would resolve outside `dest` are refused.
pub async fn extract_archive(archive: &Path, dest: &Path) -> Result<usize> {
    if !tokio::fs::try_exists(archive).await.unwrap_or(false) {
        return Err(ProvisionError::ArchiveMissing(archive.to_path_buf()).into());
    }

    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();

    // ZIP inflation is CPU-bound
    let written = tokio::task::spawn_blocking(move || extract_blocking(&archive, &dest)).await??;

    log::info!("Extracted Greengrass installer ({written} files)");
    Ok(written)
}

fn extract_blocking(archive_path: &Path, dest: &Path) -> Result<usize> {
    let zip_file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(zip_file).context("Failed to read ZIP archive")?;

    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read ZIP entry at index {i}"))?;

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| anyhow!("Refusing unsafe archive entry: {}", entry.name()))?;
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut out = std::fs::File::create(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to extract {}", target.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode))
                    .with_context(|| {
                        format!("Failed to set permissions on {}", target.display())
                    })?;
            }
        }

        written += 1;
    }

    Ok(written)
}
