//! Prompt assembly for agent loops.
//!
//! Each iteration composes one prompt out of four layers: the agent's system
//! prompt (identity, goals, constraints, command catalog, response format),
//! the status context from the ledger, the rendered inbox, and the triggering
//! line that asks for the next command. The runtime never interprets prose —
//! only the JSON document the response format demands.

use crate::orgllm::agent::AgentConfig;
use crate::orgllm::json_repair::AssistantThoughts;

/// The line appended after the context every iteration.
pub const TRIGGERING_PROMPT: &str =
    "Determine which next command to use, and respond using the format specified above:";

/// The JSON document shape agents must reply with.
pub const RESPONSE_FORMAT: &str = r#"{
    "thoughts": {
        "text": "thought",
        "reasoning": "reasoning",
        "plan": "- short bulleted\n- list that conveys\n- long-term plan",
        "criticism": "constructive self-criticism",
        "speak": "thoughts summary to say to user"
    },
    "command": {
        "name": "command name",
        "args": {"arg name": "value"}
    }
}"#;

/// Commands surfaced to every agent, rendered into the system prompt.
///
/// The org-level entries are handled by the command bridge; the rest route to
/// the tool catalog registered at organization construction.
const COMMANDS: &[(&str, &str, &str)] = &[
    (
        "Hire staff",
        "hire_staff",
        r#""staff_name": "<name>", "role": "<role>", "goals": "<comma separated goals>", "budget": "<budget to assign>""#,
    ),
    ("Fire staff", "fire_staff", r#""agent_id": "<agent_id>""#),
    (
        "Message an agent",
        "message_agent",
        r#""receiver_id": "<agent_id>", "message": "<message>""#,
    ),
    (
        "Message a staff member",
        "message_staff",
        r#""agent_id": "<agent_id>", "message": "<message>""#,
    ),
    (
        "Message your supervisor",
        "message_supervisor",
        r#""message": "<message>""#,
    ),
    (
        "Respond to an inbox message",
        "respond_to_message",
        r#""message_id": "<message_id>", "response": "<response>""#,
    ),
    (
        "Get conversation history with an agent",
        "get_conversation_history",
        r#""agent_id": "<agent_id>""#,
    ),
    ("Read file", "read_file", r#""file": "<file>""#),
    (
        "Write to file",
        "write_file",
        r#""file": "<file>", "text": "<text>""#,
    ),
    (
        "Append to file",
        "append_file",
        r#""file": "<file>", "text": "<text>""#,
    ),
    ("Delete file", "delete_file", r#""file": "<file>""#),
    ("List files", "list_files", r#""directory": "<directory>""#),
    ("Fetch a web page", "web_fetch", r#""url": "<url>""#),
    ("Save a note to memory", "memory_add", r#""text": "<text>""#),
    ("Query memory", "memory_query", r#""text": "<text>""#),
    ("Do nothing", "do_nothing", ""),
];

/// Build the full system prompt for an agent.
///
/// Mirrors the layout the models were tuned against: identity and org
/// context, goals, constraints (budget discipline included), the command
/// catalog, resources, performance evaluation, and the response format.
pub fn build_system_prompt(config: &AgentConfig, org_name: &str, org_goal: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are {}, {}.\nYou are agent {} of the organization \"{}\". The organization's goal is: {}\n",
        config.name, config.role, config.id, org_name, org_goal
    ));
    if config.founder {
        prompt.push_str("You are the founder of the organization and answer to no supervisor.\n");
    }

    prompt.push_str("\nGOALS:\n");
    for (i, goal) in config.goals.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, goal));
    }

    if config.api_budget > 0.0 {
        prompt.push_str(&format!(
            "\nIt takes money to let you run. Your API budget is ${:.3}\n",
            config.api_budget
        ));
    }

    prompt.push_str(
        "\nCONSTRAINTS:\n\
         1. Each step costs you your own unit cost plus the unit cost of every employee in your subtree. Complete your task before you run out of budget.\n\
         2. Subdivide complex tasks and hire staff to perform the subtasks; assign each employee a budget so they can operate and hire on their own.\n\
         3. A simple task typically takes around 15 steps; budget your staff accordingly.\n\
         4. Exclusively use the commands listed in double quotes e.g. \"command name\".\n\
         5. Your short term memory is short; immediately save important information to files or memory.\n",
    );

    prompt.push_str("\nCOMMANDS:\n");
    for (i, (label, name, args)) in COMMANDS.iter().enumerate() {
        if args.is_empty() {
            prompt.push_str(&format!("{}. {}: \"{}\", args: {{}}\n", i + 1, label, name));
        } else {
            prompt.push_str(&format!(
                "{}. {}: \"{}\", args: {{{}}}\n",
                i + 1,
                label,
                name,
                args
            ));
        }
    }

    prompt.push_str(
        "\nRESOURCES:\n\
         1. Your staff hierarchy, their roles, running costs and statuses (shown each step).\n\
         2. Your inbox of incoming messages, supervisor messages first.\n\
         3. Your budget: allocated funds, spending per step, and remaining runway.\n\
         4. File output inside your private workspace and a long term memory store.\n",
    );

    prompt.push_str(
        "\nPERFORMANCE EVALUATION:\n\
         1. Your supervisor evaluates whether you and your team complete the assigned task.\n\
         2. Continuously review and analyze your actions; every command costs budget, so delegate where it pays off.\n\
         3. Constructively self-criticize your big-picture behaviour.\n",
    );

    prompt.push_str(&format!(
        "\nYou should only respond in JSON format as described below.\nRESPONSE FORMAT:\n{}\n\nEnsure the response can be parsed by a standard JSON parser.\n",
        RESPONSE_FORMAT
    ));

    prompt
}

/// Log the assistant's thoughts the way the console printer did.
pub fn log_assistant_thoughts(agent_name: &str, thoughts: &AssistantThoughts) {
    if !thoughts.text.is_empty() {
        log::info!("{} THOUGHTS: {}", agent_name, thoughts.text);
    }
    if !thoughts.reasoning.is_empty() {
        log::info!("{} REASONING: {}", agent_name, thoughts.reasoning);
    }
    if !thoughts.plan.is_empty() {
        for line in thoughts.plan.lines() {
            log::info!("{} PLAN: {}", agent_name, line.trim_start_matches("- "));
        }
    }
    if !thoughts.criticism.is_empty() {
        log::info!("{} CRITICISM: {}", agent_name, thoughts.criticism);
    }
    if !thoughts.speak.is_empty() {
        log::info!("{} SPEAK: {}", agent_name, thoughts.speak);
    }
}
