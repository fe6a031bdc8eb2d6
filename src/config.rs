//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__ORCHESTRATOR__STEP_BUDGET=40`）。

use std::path::PathBuf;

use serde::Deserialize;

/// Ollama 的 OpenAI 兼容端点
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub orchestrator: OrchestratorSection,
    pub tools: ToolsSection,
    pub session: SessionSection,
}

/// [app] 段：应用名、产物输出目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 图表与报告写入的根目录（charts/、reports/ 子目录）
    pub output_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            output_dir: PathBuf::from("outputs"),
        }
    }
}

/// [llm] 段：后端选择、模型、温度与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// ollama / openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// Worker 的采样温度；Supervisor 固定用 supervisor_temperature
    pub temperature: f32,
    pub supervisor_temperature: f32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "granite4:3b".to_string(),
            base_url: None,
            temperature: 0.1,
            supervisor_temperature: 0.0,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次推理请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [orchestrator] 段：步数预算、Worker 单次激活内的工具轮数、超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    pub step_budget: usize,
    pub max_tool_rounds: usize,
    /// 整个 Worker 激活的超时（秒），超时后叙述失败并回到 Supervisor
    pub worker_timeout_secs: u64,
    /// Supervisor 单次推理超时（秒），超时视为 RouterUnavailable
    pub router_timeout_secs: u64,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            step_budget: 30,
            max_tool_rounds: 3,
            worker_timeout_secs: 300,
            router_timeout_secs: 60,
        }
    }
}

/// [tools] 段：工具调用超时与外部 provider 进程
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 外部 provider 进程；为空时使用进程内置 provider
    pub providers: Vec<ProviderEntry>,
    /// 内置数据 provider 访问行情源的 HTTP 超时（秒）
    pub market_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            providers: Vec::new(),
            market_timeout_secs: 10,
        }
    }
}

/// [[tools.providers]]：以 stdio JSON-RPC 通信的子进程
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// [session] 段：会话存储
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// memory / file
    pub store: String,
    pub dir: PathBuf,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            store: "memory".to_string(),
            dir: PathBuf::from("sessions"),
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.orchestrator.step_budget, 30);
        assert_eq!(cfg.orchestrator.max_tool_rounds, 3);
        assert_eq!(cfg.llm.model, "granite4:3b");
        assert_eq!(cfg.session.store, "memory");
        assert!(cfg.tools.providers.is_empty());
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[orchestrator]
step_budget = 40

[[tools.providers]]
name = "stock_data"
program = "hive-provider"
args = ["stock_data"]
"#,
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.orchestrator.step_budget, 40);
        assert_eq!(cfg.orchestrator.max_tool_rounds, 3);
        assert_eq!(cfg.tools.providers.len(), 1);
        assert_eq!(cfg.tools.providers[0].args, vec!["stock_data".to_string()]);
    }
}
