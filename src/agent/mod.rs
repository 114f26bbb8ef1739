mod router;
mod runtime;
mod tools;

pub use router::{resolve_subagent, KeywordRouter, RoutingDecision, TaskRouter};
pub use runtime::{AgentRequest, AgentRuntime, CommandRuntime, PARENT_TOOLS_ENV};
pub use tools::{StaticToolRegistry, ToolRegistry};
