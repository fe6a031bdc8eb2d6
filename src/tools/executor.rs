//! 工具执行器
//!
//! 对每次能力调用施加超时，超时转为 ToolTimeout、传输失败保持 ProviderUnreachable；
//! 每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::HiveError;
use crate::tools::{ToolCapability, ToolResult};

/// 工具执行器：无状态，可在会话间共享
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn execute(
        &self,
        capability: &ToolCapability,
        args: serde_json::Value,
    ) -> Result<ToolResult, HiveError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, capability.invoke(args)).await;

        let outcome = match &result {
            Ok(Ok(r)) if r.simulated => "simulated",
            Ok(Ok(r)) if r.success => "ok",
            Ok(Ok(_)) => "error",
            Ok(Err(_)) => "unreachable",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": capability.name(),
            "provider": capability.provider_name(),
            "ok": matches!(&result, Ok(Ok(r)) if r.success),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(r)) => {
                if r.simulated {
                    tracing::warn!(tool = %capability.name(), "provider returned substitute data");
                }
                Ok(r)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(HiveError::ToolTimeout(capability.name().to_string())),
        }
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
