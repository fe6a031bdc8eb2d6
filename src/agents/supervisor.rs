//! Supervisor 路由器
//!
//! 一次推理调用 + 纯函数归约：把自由文本映射为 RoutingDecision。推理失败或超时即 RouterUnavailable；
//! 无法识别的回复按策略视为 TERMINATE 并记 warn。

use std::sync::Arc;
use std::time::Duration;

use crate::agents::prompts::SUPERVISOR_PROMPT;
use crate::core::{Category, HiveError, RoutingDecision, SessionState};
use crate::llm::{complete_with_timeout, LlmClient};
use crate::memory::Message;

/// 有序关键字表：子串匹配按此顺序检查，先命中者胜
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTable {
    entries: Vec<(String, RoutingDecision)>,
}

impl Default for RouteTable {
    fn default() -> Self {
        let mut entries: Vec<(String, RoutingDecision)> = Category::ALL
            .into_iter()
            .map(|c| (c.agent_name().to_string(), RoutingDecision::Route(c)))
            .collect();
        entries.push(("finish".to_string(), RoutingDecision::Terminate));
        Self { entries }
    }
}

impl RouteTable {
    pub fn new(entries: Vec<(String, RoutingDecision)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(k, d)| (k.to_lowercase(), d))
            .collect();
        Self { entries }
    }

    /// 归约：精确匹配 → 按优先级子串匹配 → None（无法识别）
    pub fn reduce(&self, response: &str) -> Option<RoutingDecision> {
        let normalized = response.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == normalized)
            .or_else(|| self.entries.iter().find(|(k, _)| normalized.contains(k.as_str())))
            .map(|(_, d)| *d)
    }
}

/// 归约默认关键字表；无法识别时为 TERMINATE
pub fn reduce_decision(response: &str) -> RoutingDecision {
    RouteTable::default()
        .reduce(response)
        .unwrap_or(RoutingDecision::Terminate)
}

pub struct SupervisorRouter {
    llm: Arc<dyn LlmClient>,
    routes: RouteTable,
    timeout: Duration,
}

impl SupervisorRouter {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self {
            llm,
            routes: RouteTable::default(),
            timeout,
        }
    }

    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// 基于完整历史做一次路由决策
    pub async fn decide(&self, state: &SessionState) -> Result<RoutingDecision, HiveError> {
        let mut messages = Vec::with_capacity(state.history().len() + 1);
        messages.push(Message::system(SUPERVISOR_PROMPT));
        messages.extend_from_slice(state.history());

        let response = complete_with_timeout(self.llm.as_ref(), &messages, self.timeout)
            .await
            .map_err(|e| HiveError::RouterUnavailable(e.to_string()))?;

        match self.routes.reduce(&response) {
            Some(decision) => {
                tracing::debug!(session = %state.session_id, raw = %response.trim(), "supervisor decision: {}", decision);
                Ok(decision)
            }
            None => {
                tracing::warn!(
                    session = %state.session_id,
                    raw = %response.trim(),
                    "ambiguous supervisor response, terminating"
                );
                Ok(RoutingDecision::Terminate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};

    #[test]
    fn test_reduce_examples() {
        assert_eq!(
            reduce_decision("Route to data_analyst please"),
            RoutingDecision::Route(Category::Data)
        );
        assert_eq!(reduce_decision("I think we're done"), RoutingDecision::Terminate);
        assert_eq!(reduce_decision("  FINISH \n"), RoutingDecision::Terminate);
        assert_eq!(
            reduce_decision("Report_Writer"),
            RoutingDecision::Route(Category::Report)
        );
    }

    #[test]
    fn test_reduce_priority_order_is_documented_fragility() {
        // 先列出的类别胜出，即使回复真正想要的是后者
        assert_eq!(
            reduce_decision("data_analyst is done, now chart_specialist"),
            RoutingDecision::Route(Category::Data)
        );
        assert_eq!(
            reduce_decision("report_writer then finish"),
            RoutingDecision::Route(Category::Report)
        );
    }

    #[test]
    fn test_injected_route_table() {
        let table = RouteTable::new(vec![
            ("DONE".into(), RoutingDecision::Terminate),
            ("chart".into(), RoutingDecision::Route(Category::Chart)),
        ]);
        assert_eq!(table.reduce("make a chart"), Some(RoutingDecision::Route(Category::Chart)));
        assert_eq!(table.reduce("done"), Some(RoutingDecision::Terminate));
        assert_eq!(table.reduce("data_analyst"), None);
    }

    #[tokio::test]
    async fn test_decide_sees_prompt_and_history() {
        let llm = Arc::new(MockLlmClient::scripted(["news_analyst"]));
        let router = SupervisorRouter::new(llm.clone(), Duration::from_secs(5));
        let state = SessionState::seed("s", "news on NVDA");
        let d = router.decide(&state).await.unwrap();
        assert_eq!(d, RoutingDecision::Route(Category::News));

        let seen = llm.seen();
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[0][0].content, SUPERVISOR_PROMPT);
        assert_eq!(seen[0][1].content, "news on NVDA");
    }

    #[tokio::test]
    async fn test_decide_ambiguous_terminates() {
        let router = SupervisorRouter::new(
            Arc::new(MockLlmClient::scripted(["hmm, not sure"])),
            Duration::from_secs(5),
        );
        let d = router.decide(&SessionState::seed("s", "q")).await.unwrap();
        assert_eq!(d, RoutingDecision::Terminate);
    }

    #[tokio::test]
    async fn test_decide_failure_is_router_unavailable() {
        let router = SupervisorRouter::new(
            Arc::new(MockLlmClient::failing(LlmError::Request("connection refused".into()))),
            Duration::from_secs(5),
        );
        let err = router.decide(&SessionState::seed("s", "q")).await.unwrap_err();
        assert!(matches!(err, HiveError::RouterUnavailable(_)));
    }

    #[tokio::test]
    async fn test_decide_timeout_is_router_unavailable() {
        let router = SupervisorRouter::new(
            Arc::new(MockLlmClient::scripted(["data_analyst"]).with_delay(Duration::from_millis(200))),
            Duration::from_millis(20),
        );
        let err = router.decide(&SessionState::seed("s", "q")).await.unwrap_err();
        assert!(matches!(err, HiveError::RouterUnavailable(_)));
    }
}
