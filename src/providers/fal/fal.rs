use async_trait::async_trait;
use anyhow::{Result, anyhow, Context};
use crate::config::ProviderConfig;
use crate::providers::traits::{InferenceOutput, InferenceProvider, InferenceRequest, QueueUpdate};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    request_id: String,
    status_url: Option<String>,
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    queue_position: Option<u32>,
    logs: Option<Vec<LogEntry>>,
}

#[derive(Debug, Deserialize)]
struct LogEntry {
    message: String,
}

/// Client for the fal.ai queue API: submit, poll status, fetch result.
#[derive(Clone)]
pub struct FalProvider {
    api_key: String,
    client: Client,
    model: String,
    queue_url: String,
    poll_interval: Duration,
    request_timeout: Duration,
}

impl FalProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            client: Client::new(),
            model: config.model.clone(),
            queue_url: config.api_url.as_str().trim_end_matches('/').to_string(),
            poll_interval: config.poll_interval,
            request_timeout: config.request_timeout,
        }
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    async fn submit(&self, request: &InferenceRequest) -> Result<SubmitResponse> {
        let url = format!("{}/{}", self.queue_url, self.model);
        let response = self.client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(request)
            .send()
            .await
            .context("Failed to submit request to fal queue")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("fal submit failed: Status {}, Body: {}", status, error_text));
        }

        response.json().await.context("Invalid fal submit response")
    }

    async fn poll_until_done(
        &self,
        status_url: &str,
        on_update: &(dyn Fn(QueueUpdate) + Send + Sync),
    ) -> Result<()> {
        let mut seen_logs = 0;

        loop {
            let response = self.client
                .get(status_url)
                .query(&[("logs", "1")])
                .header("Authorization", self.auth_header())
                .send()
                .await
                .context("Failed to poll fal request status")?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(anyhow!("fal status check failed: Status {}, Body: {}", status, error_text));
            }

            let body: StatusResponse = response.json().await.context("Invalid fal status response")?;
            let logs: Vec<String> = body.logs
                .unwrap_or_default()
                .into_iter()
                .map(|entry| entry.message)
                .collect();
            let fresh: Vec<String> = logs.into_iter().skip(seen_logs).collect();
            seen_logs += fresh.len();

            for line in &fresh {
                log::debug!("[fal] {}", line);
            }

            match body.status.as_str() {
                "IN_QUEUE" => on_update(QueueUpdate::InQueue { position: body.queue_position }),
                "IN_PROGRESS" => on_update(QueueUpdate::InProgress { logs: fresh }),
                "COMPLETED" => {
                    if !fresh.is_empty() {
                        on_update(QueueUpdate::InProgress { logs: fresh });
                    }
                    on_update(QueueUpdate::Completed);
                    return Ok(());
                }
                other => log::warn!("Unexpected fal queue status: {}", other),
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn fetch_result(&self, response_url: &str) -> Result<InferenceOutput> {
        let response = self.client
            .get(response_url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .context("Failed to fetch fal result")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("fal result request failed: Status {}, Body: {}", status, error_text));
        }

        let response_json: Value = response.json().await.context("Invalid fal result response")?;
        log::debug!("fal result: {}", response_json);

        Ok(InferenceOutput {
            output: response_json
                .get("output")
                .and_then(|output| output.as_str())
                .map(|s| s.to_string()),
        })
    }

    async fn run(
        &self,
        request: &InferenceRequest,
        on_update: &(dyn Fn(QueueUpdate) + Send + Sync),
    ) -> Result<InferenceOutput> {
        let submitted = self.submit(request).await?;
        log::info!("fal request {} queued for {}", submitted.request_id, self.model);

        let request_base = format!("{}/{}/requests/{}", self.queue_url, self.model, submitted.request_id);
        let status_url = submitted.status_url.unwrap_or_else(|| format!("{}/status", request_base));
        let response_url = submitted.response_url.unwrap_or(request_base);

        self.poll_until_done(&status_url, on_update).await?;
        self.fetch_result(&response_url).await
    }
}

#[async_trait]
impl InferenceProvider for FalProvider {
    async fn infer(
        &self,
        request: &InferenceRequest,
        on_update: &(dyn Fn(QueueUpdate) + Send + Sync),
    ) -> Result<InferenceOutput> {
        tokio::time::timeout(self.request_timeout, self.run(request, on_update))
            .await
            .map_err(|_| anyhow!("fal request timed out after {:?}", self.request_timeout))?
    }

    fn name(&self) -> &'static str {
        "fal"
    }

    fn get_model_info(&self) -> String {
        self.model.clone()
    }

    fn clone_box(&self) -> Box<dyn InferenceProvider + Send + Sync> {
        Box::new(self.clone())
    }
}
