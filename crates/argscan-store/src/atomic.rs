//! Atomic file replacement helper.

use std::path::Path;

use argscan_core::error::AppError;
use argscan_core::result::AppResult;
use tokio::fs;

/// Write `data` to `path` by writing a sibling temp file and renaming it
/// over the destination. The rename is atomic on the filesystems we target,
/// so a crash mid-write never leaves a truncated file at `path`.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> AppResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data).await.map_err(|e| {
        AppError::with_source(
            argscan_core::error::ErrorKind::Storage,
            format!("Failed to write temp file: {}", tmp.display()),
            e,
        )
    })?;
    fs::rename(&tmp, path).await.map_err(|e| {
        AppError::with_source(
            argscan_core::error::ErrorKind::Storage,
            format!("Failed to replace file: {}", path.display()),
            e,
        )
    })?;
    Ok(())
}
