//! 工具参数 Schema 与工具调用格式（schemars 自动生成）
//!
//! 内置工具的参数结构体派生 JsonSchema，parameters_schema 直接用 args_schema::<T>()；
//! Worker 的 system prompt 中注入 tool_call_schema_json()，减少 LLM 输出格式错误。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::tools::ToolResult;

/// 工具调用请求格式：与 Worker 解析的 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 get_stock_price、create_chart、save_report
    pub tool: String,
    /// 工具参数，依工具不同而不同（ticker、period、title、content 等）
    pub args: HashMap<String, Value>,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 参数结构体的 JSON Schema
pub fn args_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null)
}

/// 反序列化工具参数；失败时直接给出可返回的 ToolResult
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolResult> {
    let args = if args.is_null() { serde_json::json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ToolResult::failure(format!("invalid arguments: {e}")))
}
