use super::assets::UploadedAssets;
use super::client::TestingApiClient;
use super::model::{
    Account, AndroidDeviceList, AndroidInstrumentationTest, AndroidRoboTest, AndroidTestLoop,
    AppBundle, DeviceFile, EnvironmentMatrix, FileReference, GoogleAuto, ObbFile, ShardingOption,
    TestMatrix, TestSetup, TestSpecification, UniformSharding,
};
use crate::config::{Config, TestKind};
use anyhow::{bail, Context, Result};

const USE_ORCHESTRATOR: &str = "USE_ORCHESTRATOR";
const DO_NOT_USE_ORCHESTRATOR: &str = "DO_NOT_USE_ORCHESTRATOR";

fn gcs(path: &str) -> FileReference {
    FileReference {
        gcs_path: path.to_string(),
    }
}

/// Build the test matrix for the configured devices and uploaded assets.
pub fn build_matrix(config: &Config, uploaded: &UploadedAssets) -> Result<TestMatrix> {
    let app_location = uploaded
        .app()
        .map(|asset| asset.gcs_path.as_str())
        .context("No uploaded app to test")?;
    let (app_apk, app_bundle) = if uploaded.is_bundle {
        (
            None,
            Some(AppBundle {
                bundle_location: gcs(app_location),
            }),
        )
    } else {
        (Some(gcs(app_location)), None)
    };

    let files_to_push = uploaded
        .assets
        .obb_files
        .iter()
        .map(|obb| DeviceFile {
            obb_file: ObbFile {
                obb: gcs(&obb.gcs_path),
                obb_file_name: obb.filename.clone(),
            },
        })
        .collect();

    let mut test_spec = TestSpecification {
        test_timeout: config.test_timeout_arg(),
        test_setup: TestSetup {
            environment_variables: config.environment_variables.clone(),
            files_to_push,
            directories_to_pull: config.directories_to_pull.clone(),
            account: config.auto_google_login.then(|| Account {
                google_auto: GoogleAuto {},
            }),
        },
        ..Default::default()
    };

    match &config.kind {
        TestKind::Instrumentation(opts) => {
            let test_apk = uploaded
                .assets
                .test_apk
                .as_ref()
                .context("No uploaded test APK")?;
            let test = AndroidInstrumentationTest {
                app_apk,
                app_bundle,
                test_apk: gcs(&test_apk.gcs_path),
                app_package_id: config.app_package_id.clone(),
                test_package_id: opts.test_package_id.clone(),
                test_runner_class: opts.runner_class.clone(),
                test_targets: opts.targets.clone(),
                orchestrator_option: if opts.use_orchestrator {
                    USE_ORCHESTRATOR
                } else {
                    DO_NOT_USE_ORCHESTRATOR
                }
                .to_string(),
                sharding_option: (opts.uniform_shards > 0).then(|| ShardingOption {
                    uniform_sharding: UniformSharding {
                        num_shards: opts.uniform_shards,
                    },
                }),
            };
            log::debug!("AndroidInstrumentationTest: {:?}", test);
            test_spec.android_instrumentation_test = Some(test);
        }
        TestKind::Robo(opts) => {
            let robo_script = match opts.scenario_file {
                Some(_) => {
                    let script = uploaded
                        .assets
                        .robo_script
                        .as_ref()
                        .context("No uploaded robo script")?;
                    log::debug!("Robo scenario file: {}", script.gcs_path);
                    Some(gcs(&script.gcs_path))
                }
                None => None,
            };
            test_spec.android_robo_test = Some(AndroidRoboTest {
                app_apk,
                app_bundle,
                app_package_id: config.app_package_id.clone(),
                app_initial_activity: opts.initial_activity.clone(),
                max_depth: opts.max_depth,
                max_steps: opts.max_steps,
                robo_directives: opts.directives.clone(),
                robo_script,
            });
        }
        TestKind::GameLoop(opts) => {
            test_spec.android_test_loop = Some(AndroidTestLoop {
                app_apk,
                app_bundle,
                app_package_id: config.app_package_id.clone(),
                scenarios: opts.scenarios.clone(),
                scenario_labels: opts.labels.clone(),
            });
        }
    }

    Ok(TestMatrix {
        environment_matrix: EnvironmentMatrix {
            android_device_list: AndroidDeviceList {
                android_devices: config.devices.clone(),
            },
        },
        flaky_test_attempts: config.retry_policy.max_attempts,
        test_specification: test_spec,
    })
}

/// Submit the matrix; the service starts executing it right away.
pub async fn start_test_run(client: &TestingApiClient, matrix: &TestMatrix) -> Result<()> {
    let response = client
        .http()
        .post(client.test_run_url())
        .json(matrix)
        .send()
        .await
        .context("Failed to send start request")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.context("Failed to read response body")?;
        bail!("Failed to start test: {}, error: {}", status.as_u16(), body);
    }
    Ok(())
}
