//! Tolerant parsing of model replies.
//!
//! Models are asked for a strict JSON document but routinely wrap it in prose
//! or markdown fences, or leave a trailing comma behind. The repair pass here
//! extracts the first balanced JSON object from the reply, applies a couple of
//! mechanical fixes, and validates the result against the response schema.
//!
//! The contract is deliberately soft: [`parse`] returns an empty object on
//! failure and never errors, so a malformed reply costs the agent one loop
//! iteration and nothing else.

use serde_json::Value;

/// The `thoughts` block of a model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantThoughts {
    pub text: String,
    pub reasoning: String,
    pub plan: String,
    pub criticism: String,
    pub speak: String,
}

/// The `command` block of a model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantCommand {
    pub name: String,
    pub args: serde_json::Map<String, Value>,
}

/// A schema-valid model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub thoughts: AssistantThoughts,
    pub command: Option<AssistantCommand>,
}

/// Extract a structured value from a raw model reply.
///
/// Returns the parsed JSON object, or an empty object when nothing parseable
/// can be recovered. Never errors.
pub fn parse(reply: &str) -> Value {
    let candidate = match extract_object(reply) {
        Some(fragment) => fragment,
        None => return Value::Object(serde_json::Map::new()),
    };

    if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
        return value;
    }

    let repaired = strip_trailing_commas(&candidate);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("json_repair::parse: unrecoverable reply: {}", e);
            Value::Object(serde_json::Map::new())
        }
    }
}

/// Parse and validate a reply against the response schema.
///
/// Returns `None` when the reply has no usable `thoughts` block; a missing or
/// malformed `command` block degrades to `command: None` rather than
/// discarding the thoughts.
pub fn parse_response(reply: &str) -> Option<AssistantReply> {
    let value = parse(reply);
    validate(&value)
}

/// Validate an already-parsed value against the response schema.
pub fn validate(value: &Value) -> Option<AssistantReply> {
    let thoughts_value = value.get("thoughts")?.as_object()?;

    let thoughts = AssistantThoughts {
        text: text_field(thoughts_value.get("text")),
        reasoning: text_field(thoughts_value.get("reasoning")),
        plan: text_field(thoughts_value.get("plan")),
        criticism: text_field(thoughts_value.get("criticism")),
        speak: text_field(thoughts_value.get("speak")),
    };

    let command = value
        .get("command")
        .and_then(Value::as_object)
        .and_then(|cmd| {
            let name = cmd.get("name")?.as_str()?.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let args = cmd
                .get("args")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            Some(AssistantCommand { name, args })
        });

    Some(AssistantReply { thoughts, command })
}

/// Render a thought field, accepting strings or arrays of strings (models
/// frequently emit `plan` as a list).
fn text_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Find the first balanced `{...}` fragment in the reply.
///
/// Brace counting is string-aware so braces inside quoted values do not
/// unbalance the scan. Markdown fences are ignored implicitly because the
/// scan starts at the first `{`.
fn extract_object(reply: &str) -> Option<String> {
    let start = reply.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in reply[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(reply[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Remove commas that directly precede a closing brace or bracket.
fn strip_trailing_commas(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in fragment.chars() {
        if escaped {
            escaped = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' if in_string => {
                escaped = true;
                out.push(ch);
            }
            '"' => {
                in_string = !in_string;
                out.push(ch);
            }
            '}' | ']' if !in_string => {
                while out.ends_with(|c: char| c.is_whitespace()) {
                    out.pop();
                }
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}
