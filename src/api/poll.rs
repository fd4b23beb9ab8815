use super::client::TestingApiClient;
use super::model::{ApiStep, ListStepsResponse};
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Snapshot of a poll: a progress message and, once every step is
/// complete, the final step list.
#[derive(Debug, Clone)]
pub struct PollStatus {
    pub message: String,
    pub finished: Option<Vec<ApiStep>>,
}

impl PollStatus {
    /// Finished iff at least one step exists and all of them are complete.
    pub fn from_response(response: ListStepsResponse) -> Self {
        let total = response.steps.len();
        let running = response.steps.iter().filter(|step| !step.is_complete()).count();

        if total == 0 {
            return Self {
                message: "- Validating".to_string(),
                finished: None,
            };
        }

        Self {
            message: format!("- ({}/{}) running", running, total),
            finished: (running == 0).then_some(response.steps),
        }
    }
}

/// Remembers progress messages so each one is shown only once.
#[derive(Debug, Default)]
pub struct ProgressLog {
    printed: HashSet<String>,
}

impl ProgressLog {
    /// Returns the message if it has not been shown before.
    pub fn first_time<'a>(&mut self, message: &'a str) -> Option<&'a str> {
        self.printed.insert(message.to_string()).then_some(message)
    }
}

async fn get_status(client: &TestingApiClient) -> Result<reqwest::Response> {
    client
        .http()
        .get(client.test_run_url())
        .send()
        .await
        .context("Failed to get http response")
}

/// Fetch the step list once. A transport error or non-200 answer is retried
/// a single time.
pub async fn fetch_status(client: &TestingApiClient) -> Result<ListStepsResponse> {
    let response = match get_status(client).await {
        Ok(response) if response.status() == reqwest::StatusCode::OK => response,
        first => {
            match first {
                Ok(response) => log::debug!("Status request returned {}, retrying", response.status()),
                Err(err) => log::debug!("Status request failed ({:#}), retrying", err),
            }
            get_status(client).await?
        }
    };

    let status = response.status();
    let body = response.text().await.context("Failed to read response body")?;
    if status != reqwest::StatusCode::OK {
        bail!("Failed to get test status: {}, error: {}", status.as_u16(), body);
    }

    serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse test status, body: {}", body))
}

fn progress_bar() -> ProgressBar {
    if !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        .template("{spinner} {msg}")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Poll until every step is complete and return the final step list.
///
/// Setting `stop` aborts the wait with an error.
pub async fn wait_for_completion(
    client: &TestingApiClient,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> Result<Vec<ApiStep>> {
    let pb = progress_bar();
    let mut progress = ProgressLog::default();

    loop {
        if stop.load(Ordering::SeqCst) {
            pb.finish_and_clear();
            bail!("Waiting for test results was interrupted");
        }

        let status = match fetch_status(client).await {
            Ok(response) => PollStatus::from_response(response),
            Err(err) => {
                pb.finish_and_clear();
                return Err(err);
            }
        };

        if let Some(message) = progress.first_time(&status.message) {
            if pb.is_hidden() {
                println!("{}", message);
            } else {
                pb.println(message);
            }
            pb.set_message(message.to_string());
        }

        if let Some(steps) = status.finished {
            pb.finish_and_clear();
            return Ok(steps);
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::test_client;

    fn response(states: &[&str]) -> ListStepsResponse {
        ListStepsResponse {
            steps: states
                .iter()
                .map(|state| ApiStep {
                    state: state.to_string(),
                    ..Default::default()
                })
                .collect(),
            next_page_token: None,
        }
    }

    #[test]
    fn test_empty_step_list_is_validating() {
        let status = PollStatus::from_response(response(&[]));
        assert_eq!(status.message, "- Validating");
        assert!(status.finished.is_none());
    }

    #[test]
    fn test_running_steps_are_counted() {
        let status = PollStatus::from_response(response(&["complete", "inProgress", "pending"]));
        assert_eq!(status.message, "- (2/3) running");
        assert!(status.finished.is_none());
    }

    #[test]
    fn test_all_complete_is_finished() {
        let status = PollStatus::from_response(response(&["complete", "complete"]));
        assert_eq!(status.message, "- (0/2) running");
        assert_eq!(status.finished.map(|steps| steps.len()), Some(2));
    }

    #[test]
    fn test_progress_messages_shown_once() {
        let mut log = ProgressLog::default();
        assert_eq!(log.first_time("- Validating"), Some("- Validating"));
        assert_eq!(log.first_time("- (1/1) running"), Some("- (1/1) running"));
        assert_eq!(log.first_time("- Validating"), None);
    }

    #[tokio::test]
    async fn test_fetch_status_retries_once_then_fails() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/app/build/token")
            .with_status(502)
            .with_body("bad gateway")
            .expect(2)
            .create_async()
            .await;

        let err = fetch_status(&test_client(&server.url())).await.unwrap_err();
        mock.assert_async().await;
        assert!(err.to_string().contains("bad gateway"));
    }

    #[tokio::test]
    async fn test_wait_for_completion_returns_final_steps() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "steps": [
                {"state": "complete", "completionTime": {"seconds": "1700000000"}, "outcome": {"summary": "success"}},
                {"state": "complete", "completionTime": {"seconds": 1700000100}, "outcome": {"summary": "failure"}}
            ]
        });
        let mock = server
            .mock("GET", "/app/build/token")
            .with_status(200)
            .with_body(body.to_string())
            .expect(1)
            .create_async()
            .await;

        let steps = wait_for_completion(
            &test_client(&server.url()),
            Duration::from_millis(0),
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap();
        mock.assert_async().await;
        assert_eq!(steps.len(), 2);
    }

    #[tokio::test]
    async fn test_wait_for_completion_honors_stop_flag() {
        let client = test_client("http://127.0.0.1:9");
        let err = wait_for_completion(&client, Duration::from_millis(0), Arc::new(AtomicBool::new(true)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("interrupted"));
    }
}
