//! 智能体层：Supervisor 路由器与四类 Worker

pub mod prompts;
pub mod supervisor;
pub mod tool_call;
pub mod worker;

pub use supervisor::{reduce_decision, RouteTable, SupervisorRouter};
pub use tool_call::{parse_worker_output, ToolCall, WorkerOutput};
pub use worker::WorkerAgent;
