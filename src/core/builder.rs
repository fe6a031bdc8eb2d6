//! 引擎构建器：从配置组装 provider、能力表、Supervisor 与 Worker
//!
//! 配置了 [[tools.providers]] 时逐个启动子进程 provider（启动失败记 warn 并跳过）；
//! 否则使用进程内置 provider。

use std::sync::Arc;
use std::time::Duration;

use crate::agents::{RouteTable, SupervisorRouter, WorkerAgent};
use crate::config::AppConfig;
use crate::core::engine::OrchestrationEngine;
use crate::core::session_store::{FileSessionStore, MemorySessionStore, SessionStore};
use crate::core::{Category, HiveError};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::tools::builtin::builtin_providers;
use crate::tools::{CapabilityRegistry, CategoryRules, McpProvider, ToolExecutor, ToolProvider};

/// 引擎构建器：默认全部取自配置，测试可替换推理句柄、provider 与存储
pub struct EngineBuilder {
    config: AppConfig,
    supervisor_llm: Option<Arc<dyn LlmClient>>,
    worker_llm: Option<Arc<dyn LlmClient>>,
    providers: Option<Vec<Arc<dyn ToolProvider>>>,
    store: Option<Arc<dyn SessionStore>>,
    rules: CategoryRules,
    routes: RouteTable,
}

impl EngineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            supervisor_llm: None,
            worker_llm: None,
            providers: None,
            store: None,
            rules: CategoryRules::default(),
            routes: RouteTable::default(),
        }
    }

    pub fn with_supervisor_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.supervisor_llm = Some(llm);
        self
    }

    pub fn with_worker_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.worker_llm = Some(llm);
        self
    }

    pub fn with_providers(mut self, providers: Vec<Arc<dyn ToolProvider>>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_category_rules(mut self, rules: CategoryRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub async fn build(self) -> Result<OrchestrationEngine, HiveError> {
        let cfg = &self.config;

        let providers = match self.providers {
            Some(p) => p,
            None => connect_providers(cfg).await,
        };
        let capabilities = CapabilityRegistry::discover(&providers, &self.rules).await;
        tracing::info!(
            "Loaded {} tools from {} providers",
            capabilities.len(),
            providers.len()
        );

        let supervisor_llm = self
            .supervisor_llm
            .unwrap_or_else(|| create_llm_from_config(&cfg.llm, cfg.llm.supervisor_temperature));
        let worker_llm = self
            .worker_llm
            .unwrap_or_else(|| create_llm_from_config(&cfg.llm, cfg.llm.temperature));

        let llm_timeout = Duration::from_secs(cfg.llm.timeouts.request);
        let router_timeout = Duration::from_secs(cfg.orchestrator.router_timeout_secs);
        let router = SupervisorRouter::new(supervisor_llm, router_timeout).with_routes(self.routes);

        let executor = ToolExecutor::new(cfg.tools.tool_timeout_secs);
        let workers: Vec<WorkerAgent> = Category::ALL
            .into_iter()
            .map(|category| {
                let caps = capabilities.for_category(category).to_vec();
                if caps.is_empty() {
                    tracing::warn!(agent = %category, "worker has no tools");
                }
                WorkerAgent::new(category, worker_llm.clone(), caps, executor.clone())
                    .with_max_tool_rounds(cfg.orchestrator.max_tool_rounds)
                    .with_llm_timeout(llm_timeout)
            })
            .collect();

        let store = match self.store {
            Some(s) => s,
            None => store_from_config(cfg)?,
        };

        Ok(OrchestrationEngine::new(router, workers, store)
            .with_step_budget(cfg.orchestrator.step_budget)
            .with_worker_timeout(Duration::from_secs(cfg.orchestrator.worker_timeout_secs)))
    }
}

/// 启动配置中的子进程 provider；未配置时使用内置 provider
async fn connect_providers(cfg: &AppConfig) -> Vec<Arc<dyn ToolProvider>> {
    if cfg.tools.providers.is_empty() {
        tracing::info!("No provider processes configured, using built-in providers");
        return builtin_providers(cfg);
    }
    let mut providers: Vec<Arc<dyn ToolProvider>> = Vec::new();
    for entry in &cfg.tools.providers {
        match McpProvider::spawn(entry).await {
            Ok(p) => providers.push(Arc::new(p)),
            Err(e) => tracing::warn!(provider = %entry.name, "provider failed to start: {}", e),
        }
    }
    providers
}

fn store_from_config(cfg: &AppConfig) -> Result<Arc<dyn SessionStore>, HiveError> {
    match cfg.session.store.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemorySessionStore::new())),
        "file" => Ok(Arc::new(FileSessionStore::new(&cfg.session.dir))),
        other => Err(HiveError::ConfigError(format!("unknown session store '{other}'"))),
    }
}

/// 按配置构建引擎
pub async fn build_engine(cfg: &AppConfig) -> Result<OrchestrationEngine, HiveError> {
    EngineBuilder::new(cfg.clone()).build().await
}
