//! stdio JSON-RPC 服务端：把一个 ToolProvider 暴露给外部进程
//!
//! hive-provider 二进制用它在 stdin/stdout 上服务内置 provider；每行一个 JSON-RPC 消息。

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::tools::mcp::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use crate::tools::ToolProvider;

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

/// 逐行读取请求直到输入关闭
pub async fn serve<R, W>(provider: &dyn ToolProvider, reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => handle(provider, request).await,
            Err(e) => Some(error_response(Value::Null, PARSE_ERROR, e.to_string())),
        };
        if let Some(response) = response {
            let out = serde_json::to_string(&response)? + "\n";
            writer.write_all(out.as_bytes()).await?;
            writer.flush().await?;
        }
    }
    tracing::info!(provider = %provider.name(), "input closed, provider exiting");
    Ok(())
}

async fn handle(provider: &dyn ToolProvider, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    // 通知不回复
    let id = request.id?;
    let result = match request.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": provider.name(), "version": env!("CARGO_PKG_VERSION") }
        })),
        "tools/list" => provider
            .list_capabilities()
            .await
            .map(|tools| json!({ "tools": tools }))
            .map_err(|e| (INTERNAL_ERROR, e.to_string())),
        "tools/call" => call_tool(provider, request.params.unwrap_or(Value::Null)).await,
        other => Err((METHOD_NOT_FOUND, format!("Method not found: {other}"))),
    };
    Some(match result {
        Ok(result) => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        },
        Err((code, message)) => error_response(id, code, message),
    })
}

async fn call_tool(provider: &dyn ToolProvider, params: Value) -> Result<Value, (i64, String)> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or((INVALID_PARAMS, "missing tool name".to_string()))?;
    let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let result = provider
        .invoke(name, args)
        .await
        .map_err(|e| (INTERNAL_ERROR, e.to_string()))?;

    let text = match (&result.location, result.success) {
        (Some(_), true) => result
            .payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| result.observation()),
        _ => result.observation(),
    };
    let structured = serde_json::to_value(&result).map_err(|e| (INTERNAL_ERROR, e.to_string()))?;
    Ok(json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": structured,
        "isError": !result.success,
    }))
}

fn error_response(id: Value, code: i64, message: String) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        result: None,
        error: Some(JsonRpcError { code, message }),
        id,
    }
}
