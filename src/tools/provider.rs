//! 工具 provider 抽象
//!
//! 每个 provider 暴露 list_capabilities 与 invoke(name, args)。实现可以是进程内的 LocalProvider，
//! 也可以是经 stdio JSON-RPC 通信的子进程（McpProvider）；测试中可换成内存假实现。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::HiveError;

/// provider 在连接时公布的工具描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// 工具调用的结构化结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default)]
    pub payload: Value,
    /// 产物位置（如图表 / 报告文件路径）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 上游不可达时返回的替代数据
    #[serde(default)]
    pub simulated: bool,
}

impl ToolResult {
    pub fn ok(payload: Value) -> Self {
        Self {
            success: true,
            payload,
            location: None,
            error: None,
            simulated: false,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Value::Null,
            location: None,
            error: Some(error.into()),
            simulated: false,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }

    /// 供 Worker 写回给 LLM 的观察文本
    pub fn observation(&self) -> String {
        if self.success {
            serde_json::to_string(&self.payload).unwrap_or_else(|_| self.payload.to_string())
        } else {
            format!("ERROR: {}", self.error.as_deref().unwrap_or("unknown error"))
        }
    }
}

/// 工具 provider：一次调用是一次无状态的请求/响应
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn list_capabilities(&self) -> Result<Vec<ToolSpec>, HiveError>;

    /// Err 只表示传输层失败（ProviderUnreachable 等）；工具自身的失败用 ToolResult::failure 表达
    async fn invoke(&self, tool: &str, args: Value) -> Result<ToolResult, HiveError>;
}
