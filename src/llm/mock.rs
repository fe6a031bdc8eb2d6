//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本依次返回预设回复；脚本用完后返回 fallback（默认回显最后一条 User 消息）。
//! 可注入失败与延迟，并记录每次调用收到的消息，便于断言 Supervisor / Worker 看到的历史。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

/// 脚本化 Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<Result<String, LlmError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回给定回复
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = responses.into_iter().map(|s| Ok(s.into())).collect();
        Self {
            script: Mutex::new(script),
            ..Self::default()
        }
    }

    /// 每次调用都失败
    pub fn failing(err: LlmError) -> Self {
        Self {
            fallback: Some(Err(err)),
            ..Self::default()
        }
    }

    /// 脚本用完后固定返回该文本
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(Ok(text.into()));
        self
    }

    /// 在脚本末尾追加一次失败
    pub fn then_fail(self, err: LlmError) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(err));
        self
    }

    /// 每次调用前先等待（测试超时与取消）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次调用收到的完整消息列表
    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn echo(messages: &[Message]) -> String {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        format!("Echo from Mock: {last_user}")
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(reply) => reply,
            None => match &self.fallback {
                Some(reply) => reply.clone(),
                None => Ok(Self::echo(messages)),
            },
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
