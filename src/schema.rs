//! JSON Schemas describing each request shape, for hosts that expose the
//! orchestrator as model-callable tools.

use serde_json::{json, Value};

use crate::error::MAX_CONCURRENT_CEILING;
use crate::task::SubagentType;

/// Tool names accepted in the request envelope
pub const TOOLS: [&str; 4] = ["task", "parallel_tasks", "orchestrate", "pipeline"];

fn subagent_type() -> Value {
    json!({
        "type": "string",
        "enum": SubagentType::names(),
        "description": "Which specialist runs the task; 'auto' lets the router pick"
    })
}

fn task_item() -> Value {
    json!({
        "type": "object",
        "properties": {
            "subagent_type": subagent_type(),
            "prompt": { "type": "string", "description": "Full instructions for the subagent" },
            "description": { "type": "string", "description": "Short label for reporting" }
        },
        "required": ["subagent_type", "prompt"]
    })
}

fn fail_fast() -> Value {
    json!({
        "type": "boolean",
        "default": false,
        "description": "Stop starting new tasks after the first failure"
    })
}

fn max_concurrent() -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "maximum": MAX_CONCURRENT_CEILING,
        "description": "Upper bound on simultaneously running subagents"
    })
}

/// Parameter schema for `tool`, or `None` for an unknown tool.
pub fn parameters(tool: &str) -> Option<Value> {
    let schema = match tool {
        "task" => task_item(),
        "parallel_tasks" => json!({
            "type": "object",
            "properties": {
                "tasks": {
                    "type": "array",
                    "items": task_item(),
                    "minItems": 1,
                    "maxItems": MAX_CONCURRENT_CEILING
                },
                "fail_fast": fail_fast(),
                "max_concurrent": max_concurrent()
            },
            "required": ["tasks"]
        }),
        "orchestrate" => json!({
            "type": "object",
            "properties": {
                "stages": {
                    "type": "array",
                    "description": "Stages run in order; tasks within a stage run concurrently",
                    "items": {
                        "type": "array",
                        "items": task_item(),
                        "minItems": 1
                    },
                    "minItems": 1
                },
                "fail_fast": fail_fast(),
                "max_concurrent": max_concurrent()
            },
            "required": ["stages"]
        }),
        "pipeline" => json!({
            "type": "object",
            "properties": {
                "steps": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "subagent_type": subagent_type(),
                            "prompt_template": {
                                "type": "string",
                                "description": "Prompt; {previous_result} is replaced by the prior step's result"
                            },
                            "description": { "type": "string" }
                        },
                        "required": ["subagent_type", "prompt_template"]
                    },
                    "minItems": 1
                },
                "initial_context": {
                    "type": "string",
                    "default": "",
                    "description": "Substituted into the first step"
                }
            },
            "required": ["steps"]
        }),
        _ => return None,
    };
    Some(schema)
}
