//! 工具层：provider 抽象、能力发现与分类、执行器、stdio JSON-RPC 客户端与服务端、内置 provider

pub mod builtin;
pub mod capability;
pub mod executor;
pub mod mcp;
pub mod provider;
pub mod registry;
pub mod schema;
pub mod server;

pub use capability::{discover, CapabilityRegistry, CategoryRules, ToolCapability};
pub use executor::ToolExecutor;
pub use mcp::McpProvider;
pub use provider::{ToolProvider, ToolResult, ToolSpec};
pub use registry::{LocalProvider, Tool, ToolRegistry};
pub use schema::{args_schema, parse_args, tool_call_schema_json};
pub use server::serve;
