//! 编排引擎集成测试：Mock 推理 + 进程内置 provider（行情源离线）

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use hive::agents::reduce_decision;
use hive::config::AppConfig;
use hive::core::{
    Category, EngineBuilder, HaltReason, HiveError, MemorySessionStore, OrchestrationEngine,
    RoutingDecision, SessionStore,
};
use hive::llm::{LlmClient, LlmError, MockLlmClient};
use hive::memory::{Message, Role};
use hive::tools::builtin::{
    news_provider, plot_provider, report_provider, stock_data_provider, MarketData, NewsItem,
    PriceHistory,
};
use hive::tools::ToolProvider;

/// 行情源不可达：数据与图表 provider 走替代数据
struct OfflineMarket;

#[async_trait]
impl MarketData for OfflineMarket {
    async fn history(&self, _ticker: &str, _period: &str) -> Result<PriceHistory, String> {
        Err("connection refused".to_string())
    }

    async fn news(&self, _ticker: &str, _limit: usize) -> Result<Vec<NewsItem>, String> {
        Err("connection refused".to_string())
    }
}

/// 任何 Worker 发过言后就结束，否则派给 news_analyst
struct FinishAfterWorker;

#[async_trait]
impl LlmClient for FinishAfterWorker {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let worker_spoke = messages.iter().any(|m| {
            m.author
                .as_deref()
                .and_then(Category::from_agent_name)
                .is_some()
        });
        Ok(if worker_spoke { "FINISH" } else { "news_analyst" }.to_string())
    }
}

fn providers(output_dir: &Path) -> Vec<Arc<dyn ToolProvider>> {
    let market: Arc<dyn MarketData> = Arc::new(OfflineMarket);
    let stock_data: Arc<dyn ToolProvider> = Arc::new(stock_data_provider(market.clone()));
    let plot: Arc<dyn ToolProvider> = Arc::new(plot_provider(market.clone(), output_dir));
    let news: Arc<dyn ToolProvider> = Arc::new(news_provider(market));
    let report: Arc<dyn ToolProvider> = Arc::new(report_provider(output_dir));
    vec![stock_data, plot, news, report]
}

async fn engine(
    supervisor: Arc<dyn LlmClient>,
    worker: Arc<dyn LlmClient>,
    store: Arc<dyn SessionStore>,
    output_dir: &Path,
) -> OrchestrationEngine {
    EngineBuilder::new(AppConfig::default())
        .with_supervisor_llm(supervisor)
        .with_worker_llm(worker)
        .with_providers(providers(output_dir))
        .with_store(store)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_scripted_run_visits_workers_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Arc::new(MockLlmClient::scripted([
        "data_analyst",
        "chart_specialist",
        "report_writer",
        "FINISH",
    ]));
    let worker = Arc::new(MockLlmClient::scripted([
        r#"{"tool": "get_stock_price", "args": {"ticker": "AAPL"}}"#,
        "AAPL trades at $420.69. Ready for next step",
        r#"{"tool": "create_chart", "args": {"ticker": "AAPL", "period": "3mo"}}"#,
        "Chart saved successfully",
        r#"{"tool": "save_report", "args": {"title": "AAPL Analysis", "content": "Price: $420.69"}}"#,
        "Report saved successfully",
    ]));
    let store = Arc::new(MemorySessionStore::new());
    let engine = engine(supervisor, worker, store.clone(), dir.path()).await;

    let outcome = engine
        .submit("s1", "Analyze AAPL, chart 3 months and save a report")
        .await
        .unwrap();

    assert_eq!(outcome.halt, HaltReason::Complete);
    assert_eq!(
        outcome.visited(),
        vec![Category::Data, Category::Chart, Category::Report]
    );
    // 三次派发 + 一次终止
    assert_eq!(outcome.trace.len(), 4);
    assert_eq!(outcome.state.step_count, 4);
    assert_eq!(outcome.trace[3].decision, RoutingDecision::Terminate);
    assert!(outcome.trace[3].output.is_none());

    let history = outcome.state.history();
    assert_eq!(history.len(), 8);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].content, "Routing to data_analyst");
    assert!(history[1].is_from("supervisor"));
    assert!(history[2].is_from("data_analyst"));

    let chart = outcome.trace[1].output.as_ref().unwrap();
    assert!(chart.content.contains("Chart saved to"));
    let report = outcome.trace[2].output.as_ref().unwrap();
    assert!(report.content.contains("Report saved to"));

    let ctx = &outcome.state.analysis_context;
    assert_eq!(ctx["last_agent"], "report_writer");
    assert_eq!(ctx["artifacts"].as_array().unwrap().len(), 2);
    assert_eq!(ctx["simulated"], true);
    for artifact in ctx["artifacts"].as_array().unwrap() {
        assert!(Path::new(artifact.as_str().unwrap()).exists());
    }

    let saved = store.load("s1").await.unwrap().unwrap();
    assert_eq!(saved, outcome.state);
}

#[tokio::test]
async fn test_budget_halts_at_exactly_n_steps() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Arc::new(MockLlmClient::new().with_fallback("news_analyst"));
    let worker = Arc::new(MockLlmClient::new().with_fallback("No fresh headlines."));
    let engine = engine(
        supervisor,
        worker,
        Arc::new(MemorySessionStore::new()),
        dir.path(),
    )
    .await;

    let outcome = engine.submit_with_budget("s1", "news on NVDA", 5).await.unwrap();
    assert_eq!(outcome.halt, HaltReason::StepBudgetExceeded);
    assert_eq!(outcome.trace.len(), 5);
    assert_eq!(outcome.state.step_count, 5);
    assert_eq!(outcome.visited(), vec![Category::News; 5]);
}

#[tokio::test]
async fn test_router_unavailable_preserves_progress() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Arc::new(
        MockLlmClient::scripted(["data_analyst"])
            .then_fail(LlmError::Request("connection refused".into())),
    );
    let worker = Arc::new(MockLlmClient::scripted(["AAPL looks stable."]));
    let store = Arc::new(MemorySessionStore::new());
    let engine = engine(supervisor, worker, store.clone(), dir.path()).await;

    let outcome = engine.submit("s1", "price of AAPL").await.unwrap();
    match &outcome.halt {
        HaltReason::Error(msg) => assert!(msg.contains("connection refused")),
        other => panic!("expected error halt, got {other:?}"),
    }
    assert_eq!(outcome.trace.len(), 1);
    assert_eq!(outcome.state.history().len(), 3);
    assert_eq!(store.load("s1").await.unwrap().unwrap().step_count, 1);
}

#[tokio::test]
async fn test_unreachable_upstream_yields_flagged_substitute() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Arc::new(MockLlmClient::scripted(["data_analyst", "finish"]));
    let worker = Arc::new(MockLlmClient::scripted([
        r#"{"tool": "get_historical_data", "args": {"ticker": "TSLA", "period": "3mo"}}"#,
        "",
    ]));
    let engine = engine(
        supervisor,
        worker,
        Arc::new(MemorySessionStore::new()),
        dir.path(),
    )
    .await;

    let outcome = engine.submit("s1", "TSLA over 3 months").await.unwrap();
    assert_eq!(outcome.halt, HaltReason::Complete);
    let msg = outcome.trace[0].output.as_ref().unwrap();
    assert!(msg.is_from("data_analyst"));
    assert!(!msg.content.trim().is_empty());
    assert!(msg.content.contains("substitute data"));
    assert_eq!(msg.structured_calls.len(), 1);
    assert!(msg.structured_calls[0].success);
    assert!(msg.structured_calls[0].simulated);
}

#[tokio::test]
async fn test_news_failure_is_narrated_and_run_proceeds() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Arc::new(MockLlmClient::scripted(["news_analyst", "finish"]));
    let worker = Arc::new(MockLlmClient::scripted([
        r#"{"tool": "get_stock_news", "args": {"ticker": "NVDA"}}"#,
        "",
    ]));
    let engine = engine(
        supervisor,
        worker,
        Arc::new(MemorySessionStore::new()),
        dir.path(),
    )
    .await;

    let outcome = engine.submit("s1", "NVDA news").await.unwrap();
    assert_eq!(outcome.halt, HaltReason::Complete);
    let msg = outcome.trace[0].output.as_ref().unwrap();
    assert!(msg.content.contains("connection refused"));
    assert!(!msg.structured_calls[0].success);
}

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let worker = Arc::new(MockLlmClient::new().with_delay(Duration::from_millis(20)));
    let engine = engine(
        Arc::new(FinishAfterWorker),
        worker,
        Arc::new(MemorySessionStore::new()),
        dir.path(),
    )
    .await;

    let requests = vec![
        ("alpha".to_string(), "news about AAPL".to_string()),
        ("beta".to_string(), "news about TSLA".to_string()),
    ];
    let results = engine.submit_all(&requests).await;
    let alpha = results[0].as_ref().unwrap();
    let beta = results[1].as_ref().unwrap();

    assert_eq!(alpha.halt, HaltReason::Complete);
    assert_eq!(beta.halt, HaltReason::Complete);
    assert!(alpha.state.history().iter().all(|m| !m.content.contains("TSLA")));
    assert!(beta.state.history().iter().all(|m| !m.content.contains("AAPL")));
    assert_eq!(
        alpha.trace[0].output.as_ref().unwrap().content,
        "Echo from Mock: news about AAPL"
    );
}

#[tokio::test]
async fn test_same_session_rejected_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let worker = Arc::new(MockLlmClient::new().with_delay(Duration::from_millis(200)));
    let engine = engine(
        Arc::new(FinishAfterWorker),
        worker,
        Arc::new(MemorySessionStore::new()),
        dir.path(),
    )
    .await;

    let (first, second) = tokio::join!(engine.submit("s1", "news about AAPL"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.submit("s1", "news about TSLA").await
    });
    assert_eq!(first.unwrap().halt, HaltReason::Complete);
    assert!(matches!(second, Err(HiveError::SessionBusy(_))));
    assert!(!engine.is_running("s1"));
}

#[tokio::test]
async fn test_cancel_abandons_in_flight_worker() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Arc::new(MockLlmClient::new().with_fallback("data_analyst"));
    let worker = Arc::new(MockLlmClient::new().with_delay(Duration::from_secs(5)));
    let store = Arc::new(MemorySessionStore::new());
    let engine = engine(supervisor, worker, store.clone(), dir.path()).await;

    let (outcome, cancelled) = tokio::join!(engine.submit("s1", "price of AAPL"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.cancel("s1")
    });
    let outcome = outcome.unwrap();
    assert!(cancelled);
    assert_eq!(outcome.halt, HaltReason::Cancelled);
    assert_eq!(outcome.trace.len(), 1);
    assert!(outcome.trace[0].output.is_none());
    // 只有请求和路由消息，没有部分 Worker 输出
    assert_eq!(outcome.state.history().len(), 2);
    assert!(store.load("s1").await.unwrap().is_some());
    assert!(!engine.cancel("s1"));
}

#[tokio::test]
async fn test_resume_from_store_counts_budget_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    let supervisor = Arc::new(MockLlmClient::scripted([
        "news_analyst",
        "finish",
        "finish",
    ]));
    let worker = Arc::new(MockLlmClient::scripted(["Quiet week for NVDA."]));
    let store: Arc<dyn SessionStore> = Arc::new(hive::core::FileSessionStore::new(store_dir.path()));
    let engine = engine(supervisor, worker, store.clone(), dir.path()).await;

    let first = engine.submit("user/42", "news on NVDA").await.unwrap();
    assert_eq!(first.state.step_count, 2);

    let second = engine
        .submit_with_budget("user/42", "anything else?", 1)
        .await
        .unwrap();
    assert_eq!(second.halt, HaltReason::Complete);
    assert_eq!(second.trace.len(), 1);
    assert_eq!(second.state.step_count, 3);
    let history = second.state.history();
    assert_eq!(history[0].content, "news on NVDA");
    assert!(history.iter().any(|m| m.content == "anything else?"));
    assert!(store_dir.path().join("user%2F42.json").exists());
}

#[test]
fn test_decision_reduction_examples() {
    assert_eq!(
        reduce_decision("Route to data_analyst please"),
        RoutingDecision::Route(Category::Data)
    );
    assert_eq!(reduce_decision("I think we're done"), RoutingDecision::Terminate);
}
