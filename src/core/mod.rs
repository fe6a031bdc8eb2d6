//! 核心编排层：错误与恢复、会话状态、会话监管与存储、编排引擎及其构建

pub mod builder;
pub mod engine;
pub mod error;
pub mod recovery;
pub mod session_store;
pub mod session_supervisor;
pub mod state;

pub use builder::{build_engine, EngineBuilder};
pub use engine::{OrchestrationEngine, DEFAULT_STEP_BUDGET, SUPERVISOR_AUTHOR};
pub use error::{HiveError, RecoveryAction};
pub use recovery::RecoveryEngine;
pub use session_store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use session_supervisor::{SessionGuard, SessionSupervisor};
pub use state::{
    Category, EnginePhase, HaltReason, RoutingDecision, RunOutcome, SessionState, StepRecord,
};
