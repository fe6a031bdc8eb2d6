//! LLM 客户端抽象
//!
//! Supervisor 与每个 Worker 都只通过 LlmClient 调用推理服务：有序消息历史进，单条补全文本出。
//! 推理句柄构造一次后显式传入各组件，测试中可换成 MockLlmClient。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;

/// 推理调用失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("empty response")]
    EmptyResponse,
}

/// LLM 客户端 trait：一次往返得到一条补全
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 模型名（日志用）
    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// 带超时的补全；超时返回 LlmError::Timeout
pub async fn complete_with_timeout(
    llm: &dyn LlmClient,
    messages: &[Message],
    timeout: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(timeout, llm.complete(messages)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(timeout.as_secs())),
    }
}
