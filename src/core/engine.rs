//! 编排引擎：Supervisor 驱动的显式状态机
//!
//! SUPERVISING → DISPATCHING(c) → SUPERVISING … → HALTED(reason)。每轮迭代（一次路由调用及其派发，
//! 或终止的那次路由调用）产生一条轨迹并把 step_count 加一；预算按本次运行计。
//! 同一会话内严格串行，不同会话可在同一个引擎上并发运行。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::{json, Value};

use crate::agents::{SupervisorRouter, WorkerAgent};
use crate::core::session_store::SessionStore;
use crate::core::state::{EnginePhase, HaltReason, RunOutcome, StepRecord};
use crate::core::{Category, HiveError, RoutingDecision, SessionState, SessionSupervisor};
use crate::memory::Message;

pub const DEFAULT_STEP_BUDGET: usize = 30;

/// Supervisor 追加的路由消息的作者
pub const SUPERVISOR_AUTHOR: &str = "supervisor";

pub struct OrchestrationEngine {
    router: SupervisorRouter,
    workers: BTreeMap<Category, WorkerAgent>,
    store: Arc<dyn SessionStore>,
    sessions: SessionSupervisor,
    step_budget: usize,
    worker_timeout: Duration,
}

impl OrchestrationEngine {
    pub fn new(
        router: SupervisorRouter,
        workers: impl IntoIterator<Item = WorkerAgent>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            router,
            workers: workers.into_iter().map(|w| (w.category(), w)).collect(),
            store,
            sessions: SessionSupervisor::new(),
            step_budget: DEFAULT_STEP_BUDGET,
            worker_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_step_budget(mut self, budget: usize) -> Self {
        self.step_budget = budget;
        self
    }

    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = timeout;
        self
    }

    pub fn step_budget(&self) -> usize {
        self.step_budget
    }

    pub fn worker(&self, category: Category) -> Option<&WorkerAgent> {
        self.workers.get(&category)
    }

    /// 以默认预算运行一个请求
    pub async fn submit(&self, session_id: &str, request: &str) -> Result<RunOutcome, HiveError> {
        self.submit_with_budget(session_id, request, self.step_budget).await
    }

    /// 并发提交多个会话的请求，结果与输入顺序一致
    pub async fn submit_all(&self, requests: &[(String, String)]) -> Vec<Result<RunOutcome, HiveError>> {
        join_all(
            requests
                .iter()
                .map(|(session_id, request)| self.submit(session_id, request)),
        )
        .await
    }

    /// 取消会话的当前运行；会话不在运行时返回 false
    pub fn cancel(&self, session_id: &str) -> bool {
        self.sessions.cancel(session_id)
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.sessions.is_running(session_id)
    }

    /// 运行一个请求直到停机。停机（包括出错、超预算、取消）时仍返回完整状态与轨迹；
    /// 只有会话忙与存储加载失败会以 Err 返回。
    pub async fn submit_with_budget(
        &self,
        session_id: &str,
        request: &str,
        budget: usize,
    ) -> Result<RunOutcome, HiveError> {
        let guard = self.sessions.acquire(session_id)?;
        let token = guard.cancel_token();

        let mut state = match self.store.load(session_id).await? {
            Some(state) if state.session_id != session_id => {
                return Err(HiveError::Store(format!(
                    "stored state for '{session_id}' belongs to session '{}'",
                    state.session_id
                )));
            }
            Some(mut state) => {
                tracing::info!(session = %session_id, steps = state.step_count, "resuming session");
                state.messages.append(Message::user(request));
                state
            }
            None => SessionState::seed(session_id, request),
        };
        let start = state.step_count;
        let mut trace = Vec::new();
        let mut phase = EnginePhase::Supervising;

        let halt = loop {
            match phase {
                EnginePhase::Halted(reason) => break reason,

                EnginePhase::Supervising => {
                    if token.is_cancelled() {
                        phase = EnginePhase::Halted(HaltReason::Cancelled);
                        continue;
                    }
                    if state.step_count - start >= budget {
                        tracing::warn!(session = %session_id, budget, "step budget exhausted");
                        phase = EnginePhase::Halted(HaltReason::StepBudgetExceeded);
                        continue;
                    }

                    let decided = tokio::select! {
                        biased;
                        _ = token.cancelled() => None,
                        r = self.router.decide(&state) => Some(r),
                    };
                    let decision = match decided {
                        None => {
                            phase = EnginePhase::Halted(HaltReason::Cancelled);
                            continue;
                        }
                        Some(Err(e)) => {
                            tracing::error!(session = %session_id, "router unavailable: {}", e);
                            phase = EnginePhase::Halted(HaltReason::Error(e.to_string()));
                            continue;
                        }
                        Some(Ok(d)) => d,
                    };

                    state.step_count += 1;
                    state.pending_route = Some(decision);
                    state.messages.append(
                        Message::assistant(format!("Routing to {decision}")).with_author(SUPERVISOR_AUTHOR),
                    );
                    tracing::info!(session = %session_id, step = state.step_count, decision = %decision, "supervisor decision");

                    phase = match decision {
                        RoutingDecision::Route(category) => EnginePhase::Dispatching(category),
                        RoutingDecision::Terminate => {
                            state.pending_route = None;
                            trace.push(StepRecord {
                                step: state.step_count,
                                decision,
                                output: None,
                            });
                            EnginePhase::Halted(HaltReason::Complete)
                        }
                    };
                }

                EnginePhase::Dispatching(category) => {
                    let decision = state
                        .pending_route
                        .take()
                        .unwrap_or(RoutingDecision::Route(category));
                    let step = state.step_count;

                    let dispatched = tokio::select! {
                        biased;
                        _ = token.cancelled() => None,
                        m = self.dispatch(category, &state) => Some(m),
                    };
                    let Some(message) = dispatched else {
                        // 放弃进行中的 Worker 调用，不追加部分结果
                        trace.push(StepRecord {
                            step,
                            decision,
                            output: None,
                        });
                        phase = EnginePhase::Halted(HaltReason::Cancelled);
                        continue;
                    };

                    tracing::info!(
                        session = %session_id,
                        step,
                        agent = %category,
                        tool_calls = message.structured_calls.len(),
                        "worker finished"
                    );
                    fold_context(&mut state.analysis_context, category, &message);
                    state.messages.append(message.clone());
                    trace.push(StepRecord {
                        step,
                        decision,
                        output: Some(message),
                    });
                    phase = EnginePhase::Supervising;
                }
            }
        };

        tracing::info!(session = %session_id, steps = state.step_count - start, halt = %halt, "run halted");
        if let Err(e) = self.store.save(session_id, &state).await {
            tracing::error!(session = %session_id, "failed to save session: {}", e);
        }
        drop(guard);

        Ok(RunOutcome { state, halt, trace })
    }

    /// 调用 Worker（带整体超时）；超时或没有对应 Worker 时给出带作者的叙述消息
    async fn dispatch(&self, category: Category, state: &SessionState) -> Message {
        let Some(worker) = self.workers.get(&category) else {
            tracing::warn!(agent = %category, "no worker registered");
            return Message::assistant(format!("{category} is not available, no result for this step."))
                .with_author(category.agent_name());
        };
        match tokio::time::timeout(self.worker_timeout, worker.run(state)).await {
            Ok(message) => message,
            Err(_) => {
                tracing::warn!(agent = %category, "worker timed out after {:?}", self.worker_timeout);
                Message::assistant(format!(
                    "{category} timed out after {}s without a result.",
                    self.worker_timeout.as_secs()
                ))
                .with_author(category.agent_name())
            }
        }
    }
}

/// 把一次 Worker 回合折叠进 analysis_context
fn fold_context(context: &mut BTreeMap<String, Value>, category: Category, message: &Message) {
    context.insert("last_agent".to_string(), json!(category.agent_name()));

    let artifacts = context
        .entry("artifacts".to_string())
        .or_insert_with(|| json!([]));
    if let Some(list) = artifacts.as_array_mut() {
        list.extend(
            message
                .structured_calls
                .iter()
                .filter(|c| c.success)
                .filter_map(|c| c.location.as_ref())
                .map(|loc| json!(loc)),
        );
    }

    let simulated = message.structured_calls.iter().any(|c| c.simulated)
        || context.get("simulated").and_then(Value::as_bool).unwrap_or(false);
    context.insert("simulated".to_string(), json!(simulated));

    let key = format!("{}_turns", category.agent_name());
    let turns = context.get(&key).and_then(Value::as_u64).unwrap_or(0) + 1;
    context.insert(key, json!(turns));
}
