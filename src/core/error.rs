//! 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 HiveError 决定 RetryWithPrompt / Narrate / Halt。

use thiserror::Error;

use crate::llm::LlmError;

/// 编排过程中可能出现的错误（路由、工具、传输、会话存储等）
#[derive(Error, Debug)]
pub enum HiveError {
    /// Supervisor 的推理调用失败或超时，本次运行终止
    #[error("Router unavailable: {0}")]
    RouterUnavailable(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    /// Worker 请求了不属于自己类别的工具
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 与外部工具进程之间的传输失败（进程退出、管道断开、响应无法解析）
    #[error("Provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Session busy: {0}")]
    SessionBusy(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让 LLM 在同一次激活内重试（如 JSON 格式错误）
    RetryWithPrompt(String),
    /// 把失败写进 Worker 的叙述，继续运行
    Narrate(String),
    /// 终止当前运行
    Halt,
}
