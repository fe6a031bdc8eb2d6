//! 错误恢复引擎
//!
//! 把传播策略写成一张表：单次工具调用或单次推理内的失败在该调用边界被吸收（重试提示或叙述），
//! 只有路由不可用与取消会让整个运行停下。

use crate::core::{HiveError, RecoveryAction};

/// 将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &HiveError) -> RecoveryAction {
        match err {
            HiveError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous tool call was not valid JSON: {raw}. \
                 Respond with ONLY a JSON object of the form \
                 {{\"tool\": \"tool_name\", \"args\": {{...}}}} and nothing else."
            )),
            HiveError::UnknownTool(name) => RecoveryAction::RetryWithPrompt(format!(
                "Tool '{name}' is not available to you. Use only the tools listed in your instructions."
            )),
            HiveError::ToolExecutionFailed(msg) => {
                RecoveryAction::Narrate(format!("Tool call failed: {msg}"))
            }
            HiveError::ToolTimeout(tool) => {
                RecoveryAction::Narrate(format!("Tool '{tool}' timed out"))
            }
            HiveError::ProviderUnreachable(msg) => {
                RecoveryAction::Narrate(format!("Tool provider unreachable: {msg}"))
            }
            HiveError::LlmError(e) => {
                RecoveryAction::Narrate(format!("Model unavailable for this turn: {e}"))
            }
            HiveError::RouterUnavailable(_) | HiveError::Cancelled => RecoveryAction::Halt,
            _ => RecoveryAction::Halt,
        }
    }
}
