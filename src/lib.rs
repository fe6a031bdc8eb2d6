//! Hive - Supervisor 路由的多智能体金融分析系统
//!
//! 模块划分：
//! - **agents**: Supervisor 路由器、四类 Worker（data / chart / news / report）、指令模板
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排引擎、会话状态、错误与恢复、会话监管与存储
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Ollama / Mock）
//! - **memory**: 只追加的对话日志与 JSON 持久化
//! - **observability**: 日志初始化
//! - **tools**: 工具 provider、能力发现与分类、执行器、stdio JSON-RPC、内置 provider

pub mod agents;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod tools;

pub use crate::core::{build_engine, EngineBuilder, HaltReason, HiveError, OrchestrationEngine, RunOutcome};
