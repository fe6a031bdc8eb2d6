//! 工具注册表与进程内 provider
//!
//! 内置工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册；
//! LocalProvider 把一个 ToolRegistry 包装成 ToolProvider，可直接进程内使用，也可由 hive-provider 经 stdio 暴露。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::HiveError;
use crate::tools::{ToolProvider, ToolResult, ToolSpec};

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具；失败以 ToolResult::failure 返回，不向上抛
    async fn execute(&self, args: Value) -> ToolResult;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，列出顺序稳定
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolSpec {
                name: name.clone(),
                description: tool.description().to_string(),
                input_schema: tool.parameters_schema(),
            })
            .collect()
    }
}

/// 进程内 provider：名称 + 一组已注册工具
pub struct LocalProvider {
    name: String,
    registry: ToolRegistry,
}

impl LocalProvider {
    pub fn new(name: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            name: name.into(),
            registry,
        }
    }
}

#[async_trait]
impl ToolProvider for LocalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_capabilities(&self) -> Result<Vec<ToolSpec>, HiveError> {
        Ok(self.registry.specs())
    }

    async fn invoke(&self, tool: &str, args: Value) -> Result<ToolResult, HiveError> {
        match self.registry.get(tool) {
            Some(t) => Ok(t.execute(args).await),
            None => Ok(ToolResult::failure(format!("Unknown tool: {tool}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo text"
        }

        async fn execute(&self, args: Value) -> ToolResult {
            ToolResult::ok(args)
        }
    }

    #[tokio::test]
    async fn test_local_provider_lists_and_invokes() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let provider = LocalProvider::new("test", registry);

        let specs = provider.list_capabilities().await.unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "echo");

        let result = provider
            .invoke("echo", serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.payload["text"], "hi");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failure_not_error() {
        let provider = LocalProvider::new("empty", ToolRegistry::new());
        let result = provider.invoke("nope", Value::Null).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("nope"));
    }
}
