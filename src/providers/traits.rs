use async_trait::async_trait;
use anyhow::Result;
use serde::Serialize;
use std::any::Any;

/// What an inference call is asked to look at.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub image_urls: Vec<String>,
    pub prompt: String,
}

/// Raw provider result. `output` is `None` when the provider answered
/// without a text field.
#[derive(Debug, Clone, Default)]
pub struct InferenceOutput {
    pub output: Option<String>,
}

/// Progress reported while a request waits in or runs through a provider queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueueUpdate {
    InQueue { position: Option<u32> },
    InProgress { logs: Vec<String> },
    Completed,
}

#[async_trait]
pub trait InferenceProvider: Any + Send + Sync {
    /// Runs one request to completion. `on_update` is informational only.
    async fn infer(
        &self,
        request: &InferenceRequest,
        on_update: &(dyn Fn(QueueUpdate) + Send + Sync),
    ) -> Result<InferenceOutput>;

    fn name(&self) -> &'static str;

    fn get_model_info(&self) -> String;

    fn clone_box(&self) -> Box<dyn InferenceProvider + Send + Sync>;
}

impl Clone for Box<dyn InferenceProvider + Send + Sync> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
