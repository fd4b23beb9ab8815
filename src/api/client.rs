//! HTTP client for the device-testing service.
//!
//! Every endpoint lives under the configured base URL and is addressed by
//! app slug, build slug and API token as path segments.

use crate::config::ApiSettings;
use anyhow::{Context, Result};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TestingApiClient {
    settings: ApiSettings,
    client: reqwest::Client,
}

impl TestingApiClient {
    pub fn new(settings: ApiSettings) -> Result<Self> {
        // No overall timeout: app uploads can take minutes.
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { settings, client })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    fn slug_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.settings.app_slug, self.settings.build_slug, self.settings.token
        )
    }

    /// `POST` here to request upload URLs for the Android assets.
    pub fn upload_urls_url(&self) -> String {
        format!("{}/assets/android/{}", self.settings.base_url, self.slug_path())
    }

    /// `POST` starts a test matrix, `GET` lists its steps.
    pub fn test_run_url(&self) -> String {
        format!("{}/{}", self.settings.base_url, self.slug_path())
    }

    /// `GET` lists the downloadable result files.
    pub fn result_assets_url(&self) -> String {
        format!("{}/assets/{}", self.settings.base_url, self.slug_path())
    }
}

#[cfg(test)]
pub(crate) fn test_client(base_url: &str) -> TestingApiClient {
    TestingApiClient::new(ApiSettings {
        base_url: base_url.trim_end_matches('/').to_string(),
        app_slug: "app".to_string(),
        build_slug: "build".to_string(),
        token: "token".to_string(),
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_layout() {
        let client = test_client("https://vdt.example.com");
        assert_eq!(
            client.upload_urls_url(),
            "https://vdt.example.com/assets/android/app/build/token"
        );
        assert_eq!(client.test_run_url(), "https://vdt.example.com/app/build/token");
        assert_eq!(
            client.result_assets_url(),
            "https://vdt.example.com/assets/app/build/token"
        );
    }
}
