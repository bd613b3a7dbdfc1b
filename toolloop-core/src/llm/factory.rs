//! Factory for creating generation services from configuration

use crate::config::{LLMProvider as LLMProviderType, LLMProviderConfig};
use crate::error::Result;
use crate::llm::LLMProvider;
use std::sync::Arc;

#[cfg(feature = "llm-openai")]
use crate::llm::providers::openai::OpenAIProvider;

/// Factory for creating LLM providers
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration
    ///
    /// An `api_key` in the configuration wins over the environment; without
    /// one the provider reads its own environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be created (e.g., missing API key)
    pub async fn create(config: &LLMProviderConfig) -> Result<Arc<dyn LLMProvider>> {
        match config.provider {
            #[cfg(feature = "llm-openai")]
            LLMProviderType::OpenAI => {
                let provider = if let Some(api_key) = &config.api_key {
                    let model = config
                        .model
                        .clone()
                        .or_else(|| std::env::var("OPENAI_MODEL").ok())
                        .unwrap_or_else(|| "gpt-4o".to_string());

                    match &config.base_url {
                        Some(base_url) => {
                            OpenAIProvider::with_base_url(api_key.clone(), model, base_url.clone())
                        }
                        None => OpenAIProvider::new(api_key.clone(), model),
                    }
                } else {
                    OpenAIProvider::from_env(config.model.clone())?
                };

                Ok(Arc::new(provider))
            }

            #[cfg(not(feature = "llm-openai"))]
            LLMProviderType::OpenAI => Err(crate::error::ToolloopError::Configuration(
                "OpenAI provider requires 'llm-openai' feature".to_string(),
            )),
        }
    }
}

#[cfg(all(test, feature = "llm-openai"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_with_explicit_key() {
        let config = LLMProviderConfig {
            provider: LLMProviderType::OpenAI,
            model: Some("gpt-4o-mini".to_string()),
            api_key: Some("sk-test".to_string()),
            base_url: Some("http://localhost:8080/v1".to_string()),
        };

        let provider = LLMProviderFactory::create(&config).await.unwrap();
        assert_eq!(provider.model_info().model_name, "gpt-4o-mini");
        assert_eq!(provider.model_info().provider, "openai");
    }
}
