use super::client::TestingApiClient;
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const TEMP_DIR_PREFIX: &str = "vdtesting_test_assets";

/// Fresh, uniquely named directory under the OS temp dir.
pub fn create_download_dir() -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("{}_{}", TEMP_DIR_PREFIX, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create temp dir ({})", dir.display()))?;
    Ok(dir)
}

/// Download every result file listed by the service into `target_dir`.
/// Returns the local paths in file-name order.
pub async fn download_test_assets(client: &TestingApiClient, target_dir: &Path) -> Result<Vec<PathBuf>> {
    let response = client
        .http()
        .get(client.result_assets_url())
        .send()
        .await
        .context("Failed to get http response")?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        bail!("Failed to get http response, status code: {}", status.as_u16());
    }

    let files: BTreeMap<String, String> = response
        .json()
        .await
        .context("Failed to parse result asset list")?;

    let mut downloaded = Vec::with_capacity(files.len());
    for (name, url) in files {
        // Only the final path component is trusted.
        let Some(file_name) = Path::new(&name).file_name() else {
            log::warn!("Skipping result asset with invalid name: {}", name);
            continue;
        };
        let path = target_dir.join(file_name);
        download_file(client, &url, &path)
            .await
            .with_context(|| format!("Failed to download file ({})", name))?;
        downloaded.push(path);
    }

    Ok(downloaded)
}

async fn download_file(client: &TestingApiClient, url: &str, path: &Path) -> Result<()> {
    let response = client
        .http()
        .get(url)
        .send()
        .await
        .context("Failed to send request")?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        bail!("Non success response code: {}", status.as_u16());
    }

    let content = response.bytes().await.context("Failed to get bytes")?;
    tokio::fs::write(path, &content)
        .await
        .with_context(|| format!("Failed to write to file ({})", path.display()))?;
    Ok(())
}
