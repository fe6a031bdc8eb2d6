//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Ollama / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{complete_with_timeout, LlmClient, LlmError};

use crate::config::LlmSection;

/// 根据配置创建 LLM 客户端；temperature 由调用方决定（Supervisor 用 0，Worker 用配置值）
pub fn create_llm_from_config(cfg: &LlmSection, temperature: f32) -> Arc<dyn LlmClient> {
    match cfg.provider.to_lowercase().as_str() {
        "mock" => {
            tracing::warn!("Using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
        "openai" => {
            tracing::info!("Using OpenAI LLM ({})", cfg.model);
            Arc::new(
                OpenAiClient::new(
                    cfg.base_url.as_deref(),
                    &cfg.model,
                    std::env::var("OPENAI_API_KEY").ok().as_deref(),
                )
                .with_temperature(temperature),
            )
        }
        other => {
            if other != "ollama" {
                tracing::warn!("Unknown LLM provider '{}', falling back to Ollama", other);
            }
            let base = cfg.base_url.as_deref().unwrap_or(crate::config::OLLAMA_BASE_URL);
            tracing::info!("Using Ollama LLM ({}) at {}", cfg.model, base);
            Arc::new(OpenAiClient::new(Some(base), &cfg.model, None).with_temperature(temperature))
        }
    }
}
