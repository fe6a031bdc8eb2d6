//! Worker 输出解析：JSON 工具调用或直接回复
//!
//! 支持 ```json 代码块、裸 JSON 对象、JSON 数组（一次请求多个调用）。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::HiveError;

/// LLM 请求的工具调用（{"tool": "get_stock_price", "args": {"ticker": "AAPL"}}）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// 一次 LLM 输出的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutput {
    /// 直接回复（本轮结束）
    Response(String),
    /// 需要执行的一个或多个工具调用
    ToolCalls(Vec<ToolCall>),
}

/// 提取 JSON 片段；没有任何 JSON 迹象时返回 None
fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// 解析 LLM 输出
///
/// 以 JSON 开头（或带 ```json 代码块）却无法解析时返回 JsonParseError，由调用方提示重试；
/// 散文里夹带的花括号不算工具调用。
pub fn parse_worker_output(output: &str) -> Result<WorkerOutput, HiveError> {
    let trimmed = output.trim();
    let Some(json_str) = extract_json(trimmed) else {
        return Ok(WorkerOutput::Response(trimmed.to_string()));
    };
    let looks_like_call = trimmed.starts_with('{') || trimmed.starts_with('[') || trimmed.contains("```json");

    let calls = match serde_json::from_str::<Value>(json_str) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .map(serde_json::from_value::<ToolCall>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string()),
        Ok(obj @ Value::Object(_)) => match obj.get("tool") {
            Some(_) => serde_json::from_value::<ToolCall>(obj)
                .map(|c| vec![c])
                .map_err(|e| e.to_string()),
            None => Ok(Vec::new()),
        },
        Ok(_) => Ok(Vec::new()),
        Err(e) => Err(e.to_string()),
    };

    match calls {
        Ok(calls) => {
            let calls: Vec<ToolCall> = calls.into_iter().filter(|c| !c.tool.is_empty()).collect();
            if calls.is_empty() {
                Ok(WorkerOutput::Response(trimmed.to_string()))
            } else {
                Ok(WorkerOutput::ToolCalls(calls))
            }
        }
        Err(e) if looks_like_call => Err(HiveError::JsonParseError(format!("{e}: {json_str}"))),
        Err(_) => Ok(WorkerOutput::Response(trimmed.to_string())),
    }
}
