//! Worker Agent：一次有界的工具调用回合
//!
//! Plan（LLM 输出工具调用或直接回复）-> Act（经 ToolExecutor 调用本类别的能力）-> Observe（结果写回局部上下文），
//! 最多 max_tool_rounds 轮。工具失败、传输失败、推理失败都被叙述进返回的 Message，不向上抛；
//! 工具调用 JSON 格式错误时在同一回合内提示重试一次。

use std::sync::Arc;
use std::time::Duration;

use crate::agents::prompts::{worker_prompt, worker_system_prompt};
use crate::agents::tool_call::{parse_worker_output, ToolCall, WorkerOutput};
use crate::core::{Category, HiveError, RecoveryAction, RecoveryEngine, SessionState};
use crate::llm::{complete_with_timeout, LlmClient};
use crate::memory::{Message, ToolCallRecord};
use crate::tools::{ToolCapability, ToolExecutor};

/// Observation 写回 LLM 时的最大字符数
const OBSERVATION_MAX_CHARS: usize = 4000;

pub struct WorkerAgent {
    category: Category,
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    capabilities: Vec<ToolCapability>,
    executor: ToolExecutor,
    recovery: RecoveryEngine,
    max_tool_rounds: usize,
    llm_timeout: Duration,
}

/// 一个回合内累积的结果
#[derive(Default)]
struct TurnLog {
    records: Vec<ToolCallRecord>,
    /// 产物确认（"Chart saved to ..."）与失败叙述，附在最终内容后
    notes: Vec<String>,
}

impl WorkerAgent {
    pub fn new(
        category: Category,
        llm: Arc<dyn LlmClient>,
        capabilities: Vec<ToolCapability>,
        executor: ToolExecutor,
    ) -> Self {
        let system_prompt = worker_system_prompt(worker_prompt(category), &capabilities);
        Self {
            category,
            llm,
            system_prompt,
            capabilities,
            executor,
            recovery: RecoveryEngine::new(),
            max_tool_rounds: 3,
            llm_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn name(&self) -> &'static str {
        self.category.agent_name()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.capabilities.iter().map(|c| c.name()).collect()
    }

    /// 执行一个回合，返回带作者标记的消息；内容永不为空
    pub async fn run(&self, state: &SessionState) -> Message {
        let mut context = Vec::with_capacity(state.history().len() + 1);
        context.push(Message::system(self.system_prompt.clone()));
        context.extend_from_slice(state.history());

        let mut log = TurnLog::default();
        let mut rounds = 0;
        let mut retried_parse = false;

        let final_text = loop {
            let output = match complete_with_timeout(self.llm.as_ref(), &context, self.llm_timeout).await {
                Ok(o) => o,
                Err(e) => {
                    tracing::warn!(agent = %self.name(), session = %state.session_id, "worker inference failed: {}", e);
                    self.narrate(&HiveError::from(e), &mut log);
                    break String::new();
                }
            };

            let calls = match parse_worker_output(&output) {
                Ok(WorkerOutput::Response(text)) => break text,
                Ok(WorkerOutput::ToolCalls(calls)) => calls,
                Err(e) => match self.recovery.handle(&e) {
                    RecoveryAction::RetryWithPrompt(prompt) if !retried_parse => {
                        tracing::debug!(agent = %self.name(), "malformed tool call, retrying: {}", e);
                        retried_parse = true;
                        context.push(Message::assistant(output));
                        context.push(Message::user(prompt));
                        continue;
                    }
                    _ => {
                        log.notes.push(format!("Could not understand the requested tool call: {e}"));
                        break String::new();
                    }
                },
            };

            if rounds >= self.max_tool_rounds {
                tracing::debug!(agent = %self.name(), "tool round limit {} reached", self.max_tool_rounds);
                break String::new();
            }
            rounds += 1;

            context.push(Message::assistant(output));
            for call in calls {
                let observation = self.execute_call(&call, &mut log).await;
                context.push(Message::user(format!(
                    "Observation from {}: {}",
                    call.tool,
                    truncate(&observation, OBSERVATION_MAX_CHARS)
                )));
            }
        };

        let content = self.compose(final_text, &log);
        Message::assistant(content)
            .with_author(self.name())
            .with_calls(log.records)
    }

    /// 执行单个调用，返回写回 LLM 的观察文本
    async fn execute_call(&self, call: &ToolCall, log: &mut TurnLog) -> String {
        let Some(capability) = self.capabilities.iter().find(|c| c.name() == call.tool) else {
            let err = HiveError::UnknownTool(call.tool.clone());
            log.records.push(failed_record(call));
            return match self.recovery.handle(&err) {
                RecoveryAction::RetryWithPrompt(prompt) => prompt,
                _ => format!("ERROR: {err}"),
            };
        };

        match self.executor.execute(capability, call.args.clone()).await {
            Ok(result) => {
                log.records.push(ToolCallRecord {
                    tool: call.tool.clone(),
                    args: call.args.clone(),
                    success: result.success,
                    location: result.location.clone(),
                    simulated: result.simulated,
                });
                if !result.success {
                    let detail = result.error.as_deref().unwrap_or("unknown error");
                    self.narrate(
                        &HiveError::ToolExecutionFailed(format!("{}: {detail}", call.tool)),
                        log,
                    );
                } else if let Some(location) = &result.location {
                    let confirmation = result
                        .payload
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{} saved to {location}", call.tool));
                    log.notes.push(confirmation);
                }
                if result.simulated {
                    log.notes.push(format!(
                        "Note: {} returned substitute data (Mock data used due to API limits).",
                        call.tool
                    ));
                }
                result.observation()
            }
            Err(e) => {
                log.records.push(failed_record(call));
                self.narrate(&e, log);
                format!("ERROR: {e}")
            }
        }
    }

    fn narrate(&self, err: &HiveError, log: &mut TurnLog) {
        match self.recovery.handle(err) {
            RecoveryAction::Narrate(text) | RecoveryAction::RetryWithPrompt(text) => log.notes.push(text),
            RecoveryAction::Halt => log.notes.push(err.to_string()),
        }
    }

    /// 最终内容：LLM 的回复 + 产物确认与失败叙述；两者皆空时给出调用摘要
    fn compose(&self, final_text: String, log: &TurnLog) -> String {
        let mut parts = Vec::new();
        let text = final_text.trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
        parts.extend(log.notes.iter().cloned());
        if parts.is_empty() {
            if log.records.is_empty() {
                parts.push(format!("{} had no result for this request.", self.name()));
            } else {
                let tools: Vec<&str> = log.records.iter().map(|r| r.tool.as_str()).collect();
                parts.push(format!("{} called: {}.", self.name(), tools.join(", ")));
            }
        }
        parts.join("\n\n")
    }
}

fn failed_record(call: &ToolCall) -> ToolCallRecord {
    ToolCallRecord {
        tool: call.tool.clone(),
        args: call.args.clone(),
        success: false,
        location: None,
        simulated: false,
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}
