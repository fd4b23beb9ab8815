use super::client::TestingApiClient;
use super::model::{TestAsset, TestAssets};
use crate::config::{Config, TestKind};
use anyhow::{bail, Context, Result};
use reqwest::header::CONTENT_LENGTH;
use std::path::{Path, PathBuf};

/// Assets accepted by the service, with their storage locations.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedAssets {
    pub is_bundle: bool,
    pub assets: TestAssets,
}

impl UploadedAssets {
    /// The app under test, either the APK or the AAB.
    pub fn app(&self) -> Option<&TestAsset> {
        if self.is_bundle {
            self.assets.aab.as_ref()
        } else {
            self.assets.apk.as_ref()
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Asset request listing the files this run needs by name.
pub fn requested_assets(config: &Config) -> TestAssets {
    let app = Some(TestAsset::named(file_name(&config.app_path)));
    let (apk, aab) = if config.is_bundle() { (None, app) } else { (app, None) };

    let test_apk = match &config.kind {
        TestKind::Instrumentation(opts) => Some(TestAsset::named(file_name(&opts.test_apk_path))),
        _ => None,
    };
    let robo_script = match &config.kind {
        TestKind::Robo(opts) => opts
            .scenario_file
            .as_deref()
            .map(|path| TestAsset::named(file_name(path))),
        _ => None,
    };

    TestAssets {
        apk,
        aab,
        test_apk,
        robo_script,
        obb_files: config
            .obb_files
            .iter()
            .map(|path| TestAsset::named(file_name(path)))
            .collect(),
    }
}

/// Request upload URLs and upload every local file the run needs.
pub async fn upload_test_assets(client: &TestingApiClient, config: &Config) -> Result<UploadedAssets> {
    let request = requested_assets(config);
    log::debug!(
        "App path ({}), is bundle: {}",
        config.app_path.display(),
        config.is_bundle()
    );
    log::debug!("Assets requested: {:?}", request);

    let response = client
        .http()
        .post(client.upload_urls_url())
        .json(&request)
        .send()
        .await
        .context("Failed to request upload URLs")?;

    let status = response.status();
    let body = response.text().await.context("Failed to read response body")?;
    if !status.is_success() {
        bail!("Failed to request upload URLs: {}, error: {}", status.as_u16(), body);
    }
    let assets: TestAssets =
        serde_json::from_str(&body).context("Failed to parse upload URL response")?;

    let uploaded = UploadedAssets {
        is_bundle: config.is_bundle(),
        assets,
    };

    let mut uploads: Vec<(&TestAsset, PathBuf)> = Vec::new();
    let app = uploaded
        .app()
        .context("Upload URL response has no entry for the app")?;
    uploads.push((app, config.app_path.clone()));

    match &config.kind {
        TestKind::Instrumentation(opts) => {
            let test_apk = uploaded
                .assets
                .test_apk
                .as_ref()
                .context("Upload URL response has no entry for the test APK")?;
            uploads.push((test_apk, opts.test_apk_path.clone()));
        }
        TestKind::Robo(opts) => {
            if let Some(ref scenario) = opts.scenario_file {
                let script = uploaded
                    .assets
                    .robo_script
                    .as_ref()
                    .context("Upload URL response has no entry for the robo script")?;
                uploads.push((script, scenario.clone()));
            }
        }
        TestKind::GameLoop(_) => {}
    }

    if uploaded.assets.obb_files.len() != config.obb_files.len() {
        bail!(
            "Invalid number of OBB upload URLs in response: got {}, expected {}",
            uploaded.assets.obb_files.len(),
            config.obb_files.len()
        );
    }
    uploads.extend(uploaded.assets.obb_files.iter().zip(config.obb_files.iter().cloned()));

    for (asset, path) in uploads {
        log::debug!("Uploading file({}) to ({})", path.display(), asset.gcs_path);
        upload_file(client, &asset.upload_url, &path)
            .await
            .with_context(|| format!("Failed to upload file({}) to ({})", path.display(), asset.upload_url))?;
    }

    Ok(uploaded)
}

/// `PUT` a local file to a signed upload URL.
pub async fn upload_file(client: &TestingApiClient, upload_url: &str, path: &Path) -> Result<()> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to open file for upload ({})", path.display()))?;

    let response = client
        .http()
        .put(upload_url)
        .header(CONTENT_LENGTH, content.len())
        .body(content)
        .send()
        .await
        .context("Failed to upload")?;

    let status = response.status();
    if !status.is_success() {
        bail!("Failed to upload file, response code was: {}", status.as_u16());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::test_client;
    use crate::config::{sample_config, InstrumentationOptions, RoboOptions};
    use mockito::Matcher;

    fn config(app_path: PathBuf, kind: TestKind, obb_files: Vec<PathBuf>) -> Config {
        Config {
            obb_files,
            ..sample_config(app_path, kind)
        }
    }

    #[test]
    fn test_requested_assets_by_kind() {
        let robo = config(
            PathBuf::from("/out/app-release.aab"),
            TestKind::Robo(RoboOptions {
                scenario_file: Some(PathBuf::from("/scripts/login.json")),
                ..Default::default()
            }),
            vec![PathBuf::from("/obb/main.1.com.example.obb")],
        );
        let request = requested_assets(&robo);
        assert_eq!(request.apk, None);
        assert_eq!(request.aab, Some(TestAsset::named("app-release.aab")));
        assert_eq!(request.robo_script, Some(TestAsset::named("login.json")));
        assert_eq!(request.test_apk, None);
        assert_eq!(request.obb_files, vec![TestAsset::named("main.1.com.example.obb")]);

        let inst = config(
            PathBuf::from("/out/app.apk"),
            TestKind::Instrumentation(InstrumentationOptions {
                test_apk_path: PathBuf::from("/out/app-androidTest.apk"),
                ..Default::default()
            }),
            Vec::new(),
        );
        let request = requested_assets(&inst);
        assert_eq!(request.apk, Some(TestAsset::named("app.apk")));
        assert_eq!(request.test_apk, Some(TestAsset::named("app-androidTest.apk")));
    }

    #[tokio::test]
    async fn test_upload_requests_urls_and_puts_files() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app.apk");
        let test_apk = dir.path().join("app-androidTest.apk");
        std::fs::write(&app, b"app-bytes").unwrap();
        std::fs::write(&test_apk, b"test").unwrap();

        let response = serde_json::json!({
            "apk": {"uploadUrl": format!("{}/upload/app", server.url()), "gcsPath": "gs://b/app.apk", "filename": "app.apk"},
            "testApk": {"uploadUrl": format!("{}/upload/test", server.url()), "gcsPath": "gs://b/test.apk", "filename": "app-androidTest.apk"}
        });
        let urls = server
            .mock("POST", "/assets/android/app/build/token")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "apk": {"filename": "app.apk"},
                "testApk": {"filename": "app-androidTest.apk"}
            })))
            .with_status(200)
            .with_body(response.to_string())
            .create_async()
            .await;
        let app_upload = server
            .mock("PUT", "/upload/app")
            .match_header("content-length", "9")
            .match_body("app-bytes")
            .with_status(200)
            .create_async()
            .await;
        let test_upload = server
            .mock("PUT", "/upload/test")
            .match_header("content-length", "4")
            .with_status(200)
            .create_async()
            .await;

        let cfg = config(
            app,
            TestKind::Instrumentation(InstrumentationOptions {
                test_apk_path: test_apk,
                ..Default::default()
            }),
            Vec::new(),
        );
        let uploaded = upload_test_assets(&test_client(&server.url()), &cfg).await.unwrap();

        urls.assert_async().await;
        app_upload.assert_async().await;
        test_upload.assert_async().await;
        assert!(!uploaded.is_bundle);
        assert_eq!(uploaded.app().unwrap().gcs_path, "gs://b/app.apk");
    }

    #[tokio::test]
    async fn test_obb_url_count_mismatch_fails() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app.apk");
        let obb = dir.path().join("main.obb");
        std::fs::write(&app, b"a").unwrap();
        std::fs::write(&obb, b"o").unwrap();

        let response = serde_json::json!({
            "apk": {"uploadUrl": format!("{}/upload/app", server.url()), "gcsPath": "gs://b/app.apk", "filename": "app.apk"}
        });
        let _listing = server
            .mock("POST", "/assets/android/app/build/token")
            .with_status(200)
            .with_body(response.to_string())
            .create_async()
            .await;

        let cfg = config(app, TestKind::Robo(RoboOptions::default()), vec![obb]);
        let err = upload_test_assets(&test_client(&server.url()), &cfg)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("OBB"));
    }

    #[tokio::test]
    async fn test_upload_rejects_error_status() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.apk");
        std::fs::write(&file, b"a").unwrap();

        let _upload = server
            .mock("PUT", "/upload")
            .with_status(403)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = upload_file(&client, &format!("{}/upload", server.url()), &file)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
