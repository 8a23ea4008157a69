pub mod fal;
pub mod openai;
pub mod traits;
pub mod utils;

use crate::config::{ProviderConfig, ProviderKind};
use crate::providers::fal::fal::FalProvider;
use crate::providers::openai::openai::OpenAIVisionProvider;
use crate::providers::traits::InferenceProvider;

/// Builds the provider named by the configuration.
pub fn create_provider(config: &ProviderConfig) -> Box<dyn InferenceProvider + Send + Sync> {
    match config.kind {
        ProviderKind::Fal => Box::new(FalProvider::new(config)),
        ProviderKind::OpenAI => Box::new(OpenAIVisionProvider::new(config)),
    }
}
