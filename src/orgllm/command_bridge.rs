//! The command bridge.
//!
//! The model speaks in strings; the runtime speaks in typed events. This
//! adapter sits between them: it coerces the `args` map of a parsed command
//! into typed values (id strings to integers, comma-separated goal strings to
//! lists), submits the matching event for org-level commands, routes
//! everything else to the tool registry, and returns whatever happened as a
//! string for the agent's history. A coercion failure produces a diagnostic
//! for the agent and emits no event at all.

use crate::orgllm::event::EventKind;
use crate::orgllm::organization::Organization;
use crate::orgllm::tool_protocol::ToolRegistry;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Per-agent adapter from model commands to events and tools.
pub struct CommandBridge {
    org: Arc<Organization>,
    agent_id: u64,
    tools: ToolRegistry,
}

impl CommandBridge {
    pub fn new(org: Arc<Organization>, agent_id: u64, tools: ToolRegistry) -> Self {
        Self {
            org,
            agent_id,
            tools,
        }
    }

    /// Execute one command on behalf of this bridge's agent.
    pub async fn execute(&self, name: &str, args: &Map<String, Value>) -> String {
        match name {
            "hire_staff" => {
                let staff_name = match arg_str(args, &["staff_name", "name"]) {
                    Ok(v) => v,
                    Err(e) => return e,
                };
                let role = match arg_str(args, &["role", "task"]) {
                    Ok(v) => v,
                    Err(e) => return e,
                };
                let goals = match arg_str(args, &["goals"]) {
                    Ok(v) => comma_separated(&v),
                    Err(e) => return e,
                };
                let budget = match arg_i64(args, &["budget"]) {
                    Ok(v) => v,
                    Err(e) => return e,
                };
                self.org
                    .submit(
                        self.agent_id,
                        EventKind::HireStaff {
                            name: staff_name,
                            role,
                            goals,
                            budget,
                        },
                    )
                    .await
                    .into_string()
            }
            "fire_staff" => {
                let target_id = match arg_u64(args, &["agent_id", "id"]) {
                    Ok(v) => v,
                    Err(e) => return e,
                };
                self.org
                    .submit(self.agent_id, EventKind::FireStaff { target_id })
                    .await
                    .into_string()
            }
            "message_agent" | "message_staff" => {
                let receiver_id = match arg_u64(args, &["receiver_id", "agent_id"]) {
                    Ok(v) => v,
                    Err(e) => return e,
                };
                let body = match arg_str(args, &["message"]) {
                    Ok(v) => v,
                    Err(e) => return e,
                };
                self.org
                    .submit(self.agent_id, EventKind::MessageAgent { receiver_id, body })
                    .await
                    .into_string()
            }
            "message_supervisor" => {
                let body = match arg_str(args, &["message"]) {
                    Ok(v) => v,
                    Err(e) => return e,
                };
                match self.org.supervisor_of(self.agent_id).await {
                    Some(receiver_id) => self
                        .org
                        .submit(self.agent_id, EventKind::MessageAgent { receiver_id, body })
                        .await
                        .into_string(),
                    None => "You have no supervisor to message; you are a founder.".to_string(),
                }
            }
            "respond_to_message" => {
                let message_id = match arg_u64(args, &["message_id"]) {
                    Ok(v) => v,
                    Err(e) => return e,
                };
                let body = match arg_str(args, &["response", "message"]) {
                    Ok(v) => v,
                    Err(e) => return e,
                };
                self.org
                    .submit(self.agent_id, EventKind::RespondToMessage { message_id, body })
                    .await
                    .into_string()
            }
            "get_conversation_history" => {
                let other_id = match arg_u64(args, &["agent_id"]) {
                    Ok(v) => v,
                    Err(e) => return e,
                };
                self.org
                    .submit(self.agent_id, EventKind::GetConversationHistory { other_id })
                    .await
                    .into_string()
            }
            "do_nothing" => "No action performed.".to_string(),
            other => {
                if self.tools.has_tool(other) {
                    match self
                        .tools
                        .execute_tool(other, Value::Object(args.clone()))
                        .await
                    {
                        Ok(result) => result.render(other),
                        Err(e) => format!("Command {} failed: {}", other, e),
                    }
                } else {
                    format!(
                        "Unknown command '{}'. Please refer to the COMMANDS list for available commands and only respond in the specified JSON format.",
                        other
                    )
                }
            }
        }
    }
}

/// First present key wins; values must be strings.
fn arg_str(args: &Map<String, Value>, keys: &[&str]) -> Result<String, String> {
    for key in keys {
        if let Some(value) = args.get(*key) {
            return match value {
                Value::String(s) => Ok(s.clone()),
                other => Ok(other.to_string()),
            };
        }
    }
    Err(format!("Missing required argument '{}'.", keys[0]))
}

/// Accepts JSON numbers and numeric strings — models send both.
fn arg_u64(args: &Map<String, Value>, keys: &[&str]) -> Result<u64, String> {
    for key in keys {
        if let Some(value) = args.get(*key) {
            let parsed = match value {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            };
            return parsed.ok_or_else(|| {
                format!(
                    "You're likely entering a name where an id belongs; '{}' must be a valid integer agent or message id.",
                    key
                )
            });
        }
    }
    Err(format!("Missing required argument '{}'.", keys[0]))
}

fn arg_i64(args: &Map<String, Value>, keys: &[&str]) -> Result<i64, String> {
    for key in keys {
        if let Some(value) = args.get(*key) {
            let parsed = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            return parsed
                .ok_or_else(|| format!("Value of '{}' is not a valid integer.", key));
        }
    }
    Err(format!("Missing required argument '{}'.", keys[0]))
}

/// Split a comma-separated goals string into a trimmed list.
fn comma_separated(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
