use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use tokio::fs;

/// Creates `path` and its parents if missing. Idempotent.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(());
    }
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("creating directory {:?}", path))?;
    info!("Created directory at: {:?}", path);
    Ok(())
}

/// Writes `contents` next to `path` and renames it into place, so readers
/// never see a half-written file.
pub async fn write_atomically(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_directory_exists(parent).await?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    fs::write(tmp_path, contents)
        .await
        .with_context(|| format!("writing {:?}", tmp_path))?;
    fs::rename(tmp_path, path)
        .await
        .with_context(|| format!("replacing {:?}", path))?;
    debug!("Wrote {:?}", path);
    Ok(())
}
