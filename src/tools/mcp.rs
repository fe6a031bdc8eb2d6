//! 子进程工具 provider（stdio JSON-RPC 2.0，按行分帧）
//!
//! 启动 provider 进程后依次发送 initialize、notifications/initialized，再用 tools/list 发现工具、
//! tools/call 调用工具。响应按 id 关联：之前超时调用遗留在管道里的响应会被跳过。
//!
//! 请求帧交给独立的写任务整行写出。调用方的 future 被超时或取消丢弃时，已提交的帧仍会写完，
//! 子进程的 stdin 上不会留下半行。

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};

use crate::config::ProviderEntry;
use crate::core::HiveError;
use crate::tools::{ToolProvider, ToolResult, ToolSpec};

pub(crate) const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// 通知没有 id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

/// 读写端放在同一把锁里：一次请求的写入与对应响应的读取不会被其他会话插队
struct Channel {
    frames: mpsc::UnboundedSender<String>,
    lines: Lines<BufReader<BoxReader>>,
}

/// 写任务：逐帧 write_all + flush，写失败后退出（之后的发送报 connection closed）
fn spawn_writer<W>(name: String, mut writer: W) -> mpsc::UnboundedSender<String>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let written = match writer.write_all(frame.as_bytes()).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                tracing::warn!(provider = %name, "write to provider failed: {}", e);
                break;
            }
        }
    });
    tx
}

/// 经 stdio 连接的外部 provider
pub struct McpProvider {
    name: String,
    channel: Mutex<Channel>,
    next_id: AtomicU64,
    /// 持有子进程句柄；drop 时随之结束（kill_on_drop）
    _child: Option<Child>,
}

impl McpProvider {
    /// 启动子进程并完成握手
    pub async fn spawn(entry: &ProviderEntry) -> Result<Self, HiveError> {
        tracing::info!(
            "Spawning tool provider '{}' via {} {:?}",
            entry.name,
            entry.program,
            entry.args
        );
        let mut child = Command::new(&entry.program)
            .args(&entry.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HiveError::ProviderUnreachable(format!("{}: spawn failed: {e}", entry.name)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HiveError::ProviderUnreachable(format!("{}: no stdin", entry.name)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HiveError::ProviderUnreachable(format!("{}: no stdout", entry.name)))?;

        let mut provider = Self::from_stream(&entry.name, stdout, stdin);
        provider._child = Some(child);
        provider.initialize().await?;
        Ok(provider)
    }

    /// 在任意读写流上建立连接并握手（测试中用 tokio::io::duplex）
    pub async fn connect<R, W>(name: &str, reader: R, writer: W) -> Result<Self, HiveError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let provider = Self::from_stream(name, reader, writer);
        provider.initialize().await?;
        Ok(provider)
    }

    fn from_stream<R, W>(name: &str, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: BoxReader = Box::new(reader);
        Self {
            name: name.to_string(),
            channel: Mutex::new(Channel {
                frames: spawn_writer(name.to_string(), writer),
                lines: BufReader::new(reader).lines(),
            }),
            next_id: AtomicU64::new(1),
            _child: None,
        }
    }

    fn unreachable(&self, detail: impl std::fmt::Display) -> HiveError {
        HiveError::ProviderUnreachable(format!("{}: {detail}", self.name))
    }

    /// 整帧入队；不含 await，调用方被丢弃时帧要么完整发出要么根本没发
    fn send(&self, channel: &Channel, message: &impl Serialize) -> Result<(), HiveError> {
        let line = serde_json::to_string(message).map_err(|e| self.unreachable(e))? + "\n";
        tracing::debug!("MCP request to {}: {}", self.name, line.trim());
        channel
            .frames
            .send(line)
            .map_err(|_| self.unreachable("connection closed"))
    }

    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, HiveError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: Some(json!(id)),
        };

        let mut channel = self.channel.lock().await;
        self.send(&channel, &request)?;

        loop {
            let line = channel
                .lines
                .next_line()
                .await
                .map_err(|e| self.unreachable(e))?
                .ok_or_else(|| self.unreachable("connection closed"))?;
            if line.trim().is_empty() {
                continue;
            }
            tracing::debug!("MCP response from {}: {}", self.name, line.trim());
            let response: JsonRpcResponse =
                serde_json::from_str(&line).map_err(|e| self.unreachable(format!("bad frame: {e}")))?;
            if response.id != json!(id) {
                tracing::debug!(provider = %self.name, stale_id = %response.id, "skipping uncorrelated response");
                continue;
            }
            if let Some(err) = response.error {
                return Err(self.unreachable(format!("{} (code {})", err.message, err.code)));
            }
            return response
                .result
                .ok_or_else(|| self.unreachable("response missing result and error"));
        }
    }

    async fn initialize(&self) -> Result<(), HiveError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": "hive", "version": env!("CARGO_PKG_VERSION") }
        });
        self.call("initialize", Some(params)).await?;

        let notification = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: "notifications/initialized".to_string(),
            params: None,
            id: None,
        };
        let channel = self.channel.lock().await;
        self.send(&channel, &notification)
    }
}

/// 解析 tools/call 的结果：优先取 structuredContent，否则拼接 text 块
pub(crate) fn parse_call_result(result: &Value) -> ToolResult {
    if let Some(structured) = result.get("structuredContent") {
        if let Ok(parsed) = serde_json::from_value::<ToolResult>(structured.clone()) {
            return parsed;
        }
    }

    let text: String = result
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    let is_error = result.get("isError").and_then(Value::as_bool).unwrap_or(false);

    if is_error {
        ToolResult::failure(text)
    } else {
        ToolResult::ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[async_trait]
impl ToolProvider for McpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_capabilities(&self) -> Result<Vec<ToolSpec>, HiveError> {
        let result = self.call("tools/list", None).await?;
        serde_json::from_value(result.get("tools").cloned().unwrap_or(Value::Array(vec![])))
            .map_err(|e| self.unreachable(format!("bad tools/list payload: {e}")))
    }

    async fn invoke(&self, tool: &str, args: Value) -> Result<ToolResult, HiveError> {
        let params = json!({ "name": tool, "arguments": args });
        let result = self.call("tools/call", Some(params)).await?;
        Ok(parse_call_result(&result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_structured_content() {
        let result = json!({
            "content": [{"type": "text", "text": "ignored"}],
            "structuredContent": {"success": true, "payload": {"p": 1}, "location": "outputs/charts/a.svg"},
            "isError": false
        });
        let parsed = parse_call_result(&result);
        assert!(parsed.success);
        assert_eq!(parsed.location.as_deref(), Some("outputs/charts/a.svg"));
    }

    #[test]
    fn test_parse_plain_text_content() {
        let ok = parse_call_result(&json!({"content": [{"type": "text", "text": "{\"price\": 10}"}]}));
        assert!(ok.success);
        assert_eq!(ok.payload["price"], 10);

        let err = parse_call_result(&json!({
            "content": [{"type": "text", "text": "boom"}],
            "isError": true
        }));
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_closed_stream_is_unreachable() {
        let (client_io, server_io) = tokio::io::duplex(1024);
        drop(server_io);
        let (r, w) = tokio::io::split(client_io);
        let err = McpProvider::connect("dead", r, w).await.err().unwrap();
        assert!(matches!(err, HiveError::ProviderUnreachable(_)));
    }

    async fn reply(writer: &mut (impl AsyncWrite + Unpin), id: Value, result: Value) {
        let response = JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        };
        let line = serde_json::to_string(&response).unwrap() + "\n";
        writer.write_all(line.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn test_abandoned_call_leaves_whole_frames() {
        // 管道很小且对端暂不读取：大请求的写入会卡在中途
        let (client_io, server_io) = tokio::io::duplex(64);
        let (cr, cw) = tokio::io::split(client_io);
        let (sr, mut sw) = tokio::io::split(server_io);
        let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut lines = BufReader::new(sr).lines();
            let init = lines.next_line().await.unwrap().unwrap();
            let init: JsonRpcRequest = serde_json::from_str(&init).unwrap();
            reply(&mut sw, init.id.unwrap(), json!({})).await;

            go_rx.await.unwrap();
            while let Some(line) = lines.next_line().await.unwrap() {
                // 半截帧在这里解析失败，服务端退出，后续调用拿不到响应
                let request: JsonRpcRequest = serde_json::from_str(&line).unwrap();
                if let Some(id) = request.id {
                    reply(&mut sw, id, json!({ "tools": [] })).await;
                }
            }
        });

        let provider = McpProvider::connect("slow", cr, cw).await.unwrap();
        let blob = "x".repeat(16 * 1024);
        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            provider.invoke("get_stock_price", json!({ "blob": blob })),
        )
        .await;
        assert!(abandoned.is_err());

        go_tx.send(()).unwrap();
        let tools = tokio::time::timeout(std::time::Duration::from_secs(5), provider.list_capabilities())
            .await
            .expect("next call should not hang")
            .unwrap();
        assert!(tools.is_empty());
    }
}
