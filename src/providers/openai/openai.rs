use async_trait::async_trait;
use anyhow::{Result, anyhow};
use crate::config::ProviderConfig;
use crate::providers::traits::{InferenceOutput, InferenceProvider, InferenceRequest, QueueUpdate};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Vision model behind an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAIVisionProvider {
    api_key: String,
    client: Client,
    model: String,
    api_url: String,
    request_timeout: Duration,
}

impl OpenAIVisionProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            client: Client::new(),
            model: config.model.clone(),
            api_url: config.api_url.to_string(),
            request_timeout: config.request_timeout,
        }
    }

    fn build_body(&self, request: &InferenceRequest) -> Value {
        let mut content = vec![json!({ "type": "text", "text": request.prompt })];
        content.extend(request.image_urls.iter().map(|url| {
            json!({ "type": "image_url", "image_url": { "url": url } })
        }));

        json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": content
                }
            ],
            "temperature": 0.2
        })
    }
}

#[async_trait]
impl InferenceProvider for OpenAIVisionProvider {
    async fn infer(
        &self,
        request: &InferenceRequest,
        on_update: &(dyn Fn(QueueUpdate) + Send + Sync),
    ) -> Result<InferenceOutput> {
        on_update(QueueUpdate::InProgress { logs: Vec::new() });

        let response = self.client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.request_timeout)
            .json(&self.build_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("API request failed: Status {}, Body: {}", status, error_text));
        }

        let response_json: Value = response.json().await?;

        if let Some(error) = response_json.get("error") {
            return Err(anyhow!("API returned error: {}", error));
        }

        on_update(QueueUpdate::Completed);

        Ok(InferenceOutput {
            output: response_json
                .get("choices")
                .and_then(|choices| choices.get(0))
                .and_then(|choice| choice.get("message"))
                .and_then(|message| message.get("content"))
                .and_then(|content| content.as_str())
                .map(|s| s.to_string()),
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn get_model_info(&self) -> String {
        self.model.clone()
    }

    fn clone_box(&self) -> Box<dyn InferenceProvider + Send + Sync> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    #[test]
    fn body_carries_prompt_and_images() {
        let config = ProviderConfig::from_lookup(ProviderKind::OpenAI, Some("k".to_string()), |_| None).unwrap();
        let provider = OpenAIVisionProvider::new(&config);
        let body = provider.build_body(&InferenceRequest {
            image_urls: vec!["data:image/png;base64,AAAA".to_string()],
            prompt: "Analyze this meal image.".to_string(),
        });

        assert_eq!(body["model"], "gpt-4o-mini");
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["text"], "Analyze this meal image.");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }
}
