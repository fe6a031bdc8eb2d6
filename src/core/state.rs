//! 状态定义：Worker 类别、路由决策、会话状态、引擎阶段与运行结果
//!
//! SessionState 只由编排引擎修改（追加消息、设置 pending_route、递增 step_count）；
//! Supervisor 与 Worker 只拿到只读引用。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::memory::{Conversation, Message};

/// Worker 能力类别
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Data,
    Chart,
    News,
    Report,
}

impl Category {
    /// 固定顺序：工具分类与路由优先级都按这个顺序检查
    pub const ALL: [Category; 4] = [
        Category::Data,
        Category::Chart,
        Category::News,
        Category::Report,
    ];

    /// 对应 Worker 的名称，也是 Supervisor 回复中要识别的关键字
    pub fn agent_name(self) -> &'static str {
        match self {
            Category::Data => "data_analyst",
            Category::Chart => "chart_specialist",
            Category::News => "news_analyst",
            Category::Report => "report_writer",
        }
    }

    pub fn from_agent_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.agent_name() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.agent_name())
    }
}

/// 经过校验的路由决策：某个 Worker 或 TERMINATE，不会是任意字符串
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    Route(Category),
    Terminate,
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingDecision::Route(c) => write!(f, "{c}"),
            RoutingDecision::Terminate => f.write_str("finish"),
        }
    }
}

/// 一次会话的共享状态
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub messages: Conversation,
    /// None 表示未设置；每次 Supervisor 调用设置一次，派发前消费一次
    pub pending_route: Option<RoutingDecision>,
    #[serde(default)]
    pub analysis_context: BTreeMap<String, serde_json::Value>,
    pub step_count: usize,
}

impl SessionState {
    /// 新会话：对话里只有调用方的请求
    pub fn seed(session_id: impl Into<String>, request: impl Into<String>) -> Self {
        let mut messages = Conversation::new();
        messages.append(Message::user(request));
        Self {
            session_id: session_id.into(),
            messages,
            pending_route: None,
            analysis_context: BTreeMap::new(),
            step_count: 0,
        }
    }

    pub fn history(&self) -> &[Message] {
        self.messages.messages()
    }
}

/// 停机原因
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum HaltReason {
    Complete,
    StepBudgetExceeded,
    Cancelled,
    Error(String),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Complete => f.write_str("complete"),
            HaltReason::StepBudgetExceeded => f.write_str("step_budget_exceeded"),
            HaltReason::Cancelled => f.write_str("cancelled"),
            HaltReason::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// 引擎状态机阶段
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnginePhase {
    Supervising,
    Dispatching(Category),
    Halted(HaltReason),
}

impl EnginePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EnginePhase::Halted(_))
    }
}

/// 单步轨迹：Supervisor 的决策，以及（若派发）Worker 追加的消息
#[derive(Clone, Debug, Serialize)]
pub struct StepRecord {
    pub step: usize,
    pub decision: RoutingDecision,
    pub output: Option<Message>,
}

/// 一次运行的结果：停机后依旧返回完整的状态与轨迹
#[derive(Clone, Debug, Serialize)]
pub struct RunOutcome {
    pub state: SessionState,
    pub halt: HaltReason,
    pub trace: Vec<StepRecord>,
}

impl RunOutcome {
    /// 按顺序访问过的 Worker
    pub fn visited(&self) -> Vec<Category> {
        self.trace
            .iter()
            .filter_map(|s| match (s.decision, &s.output) {
                (RoutingDecision::Route(c), Some(_)) => Some(c),
                _ => None,
            })
            .collect()
    }
}
