//! Agent configuration and the cooperative agent loop.
//!
//! Each agent is two things: a persisted [`AgentConfig`] (identity, goals,
//! loop counter — the `agent.json` inside its workspace) and a running
//! [`AgentRunner`] task. The runner's loop is strict about ordering within
//! one iteration: the three billing events first, then the inbox read, then
//! the status context, then the prompt and model call, then command
//! execution. Every cross-agent effect goes through
//! [`Organization::submit`](crate::orgllm::organization::Organization::submit);
//! the loop never touches shared state directly.
//!
//! Cancellation is cooperative. The loop re-checks its termination flag at
//! the head of each iteration and races its inter-iteration sleep against
//! the organization-wide shutdown signal, so both a fire and a shutdown are
//! observed within one tick.

use crate::orgllm::client_wrapper::{Message, Role};
use crate::orgllm::command_bridge::CommandBridge;
use crate::orgllm::event::{EventKind, EventReply};
use crate::orgllm::json_repair;
use crate::orgllm::organization::Organization;
use crate::orgllm::persistence::write_atomic;
use crate::orgllm::prompt;
use crate::orgllm::tool_protocol::ToolRegistry;
use crate::orgllm::tools::{
    FileToolProtocol, JsonFileMemory, MemoryStore, MemoryToolProtocol, WebToolProtocol,
    WorkspaceFiles,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How many history messages are replayed into each prompt.
const HISTORY_WINDOW: usize = 24;

/// The persisted per-agent record (`agents/<id>_<name>_workspace/agent.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: u64,
    pub name: String,
    pub role: String,
    pub goals: Vec<String>,
    /// True iff the agent has no supervisor.
    pub founder: bool,
    pub terminated: bool,
    pub loop_count: u64,
    /// Spend ceiling for model calls; 0.0 means unlimited.
    pub api_budget: f64,
    /// The agent's private workspace directory.
    pub workspace: PathBuf,
}

impl AgentConfig {
    /// Workspace directory layout: `<org_dir>/agents/<id>_<name>_workspace`.
    pub fn workspace_dir(org_dir: &Path, id: u64, name: &str) -> PathBuf {
        org_dir.join("agents").join(format!("{}_{}_workspace", id, name))
    }

    /// Path of this agent's config file.
    pub fn config_path(&self) -> PathBuf {
        self.workspace.join("agent.json")
    }

    /// Persist the config atomically inside the workspace.
    pub fn save(&self) -> io::Result<()> {
        fs::create_dir_all(&self.workspace)?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        write_atomic(&self.config_path(), &json)
    }

    /// Load a config from its file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unreadable agent config: {}", e),
            )
        })
    }
}

/// The running loop of one agent.
pub struct AgentRunner {
    org: Arc<Organization>,
    config: AgentConfig,
    terminated: Arc<AtomicBool>,
    bridge: CommandBridge,
    memory: Arc<dyn MemoryStore>,
    history: Vec<Message>,
}

impl AgentRunner {
    /// Assemble the runner: workspace tools, memory store, command bridge.
    pub async fn new(
        org: Arc<Organization>,
        config: AgentConfig,
        terminated: Arc<AtomicBool>,
    ) -> io::Result<Self> {
        let files = WorkspaceFiles::new(&config.workspace)?;
        let memory: Arc<JsonFileMemory> = Arc::new(JsonFileMemory::open(
            config.workspace.join("agent_memory.json"),
        )?);

        let mut registry = ToolRegistry::empty();
        let register = |e: Box<dyn std::error::Error + Send + Sync>| {
            io::Error::new(io::ErrorKind::Other, e.to_string())
        };
        registry
            .add_protocol("files", Arc::new(FileToolProtocol::new(files)))
            .await
            .map_err(register)?;
        registry
            .add_protocol(
                "web",
                Arc::new(WebToolProtocol::new(&org.config().browser_name)),
            )
            .await
            .map_err(register)?;
        registry
            .add_protocol(
                "memory",
                Arc::new(MemoryToolProtocol::new(memory.clone() as Arc<dyn MemoryStore>)),
            )
            .await
            .map_err(register)?;

        let bridge = CommandBridge::new(Arc::clone(&org), config.id, registry);
        Ok(Self {
            org,
            config,
            terminated,
            bridge,
            memory,
            history: Vec::new(),
        })
    }

    fn push_history(&mut self, role: Role, content: &str) {
        self.history.push(Message::new(role, content));
        if self.history.len() > HISTORY_WINDOW {
            let excess = self.history.len() - HISTORY_WINDOW;
            self.history.drain(..excess);
        }
    }

    fn should_stop(&self) -> bool {
        self.terminated.load(Ordering::SeqCst) || self.org.is_shutting_down()
    }

    /// The perception → act → observe loop.
    pub async fn run(mut self) {
        let agent_id = self.config.id;
        log::info!(
            "starting interaction loop of agent {} ({})",
            self.config.name,
            agent_id
        );
        let mut shutdown = self.org.shutdown_signal();
        let tick = Duration::from_secs(self.org.config().loop_interval_secs);

        loop {
            if self.should_stop() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(tick) => {}
                _ = shutdown.changed() => break,
            }
            if self.should_stop() {
                break;
            }

            self.config.loop_count += 1;
            let org_config = self.org.config();
            if org_config.continuous_mode
                && org_config.continuous_limit > 0
                && self.config.loop_count > org_config.continuous_limit
            {
                log::warn!(
                    "agent {} reached the continuous limit of {} iterations",
                    agent_id,
                    org_config.continuous_limit
                );
                break;
            }
            if let Err(e) = self.config.save() {
                log::warn!("agent {} could not persist its config: {}", agent_id, e);
            }
            log::debug!(
                "agent {} ({}) starting loop {}",
                self.config.name,
                agent_id,
                self.config.loop_count
            );

            // Billing first: cost, running cost, budget.
            match self.org.submit(agent_id, EventKind::CalculateOperatingCost).await {
                EventReply::Amount(cost) => {
                    self.org
                        .submit(agent_id, EventKind::UpdateAgentRunningCost { amount: cost })
                        .await;
                    self.org
                        .submit(agent_id, EventKind::UpdateAgentBudget { amount: cost })
                        .await;
                }
                EventReply::Text(diagnostic) => {
                    log::warn!("agent {} billing skipped: {}", agent_id, diagnostic);
                }
            }

            // Then the inbox, then the status context.
            let inbox = self.org.submit(agent_id, EventKind::GetInbox).await.into_string();
            let status_context = self
                .org
                .submit(agent_id, EventKind::BuildStatusUpdate)
                .await
                .into_string();

            // Compose the prompt.
            let system_prompt =
                prompt::build_system_prompt(&self.config, self.org.name(), self.org.goal());
            let mut messages = vec![Message::new(Role::System, &system_prompt)];
            if let Ok(relevant) = self.memory.get_relevant(&inbox, 5).await {
                if !relevant.is_empty() {
                    messages.push(Message::new(
                        Role::System,
                        format!("This reminds you of these events:\n{}", relevant.join("\n")),
                    ));
                }
            }
            messages.extend(self.history.iter().cloned());
            messages.push(Message::new(
                Role::User,
                format!(
                    "{}\n\n{}\n\n{}",
                    status_context,
                    inbox,
                    prompt::TRIGGERING_PROMPT
                ),
            ));

            // Model call.
            let reply_text = match self.org.client().send_message(&messages).await {
                Ok(reply) => reply.content.to_string(),
                Err(e) => {
                    log::error!("agent {} model call failed: {}", agent_id, e);
                    self.push_history(Role::System, &format!("Error: model call failed: {}", e));
                    continue;
                }
            };

            // Parse, narrate, update status.
            let parsed = match json_repair::parse_response(&reply_text) {
                Some(parsed) => parsed,
                None => {
                    log::warn!("agent {} produced an unparseable reply", agent_id);
                    self.push_history(
                        Role::System,
                        "Unable to parse model response; no command executed.",
                    );
                    continue;
                }
            };
            prompt::log_assistant_thoughts(&self.config.name, &parsed.thoughts);

            let status = if !parsed.thoughts.speak.is_empty() {
                parsed.thoughts.speak.clone()
            } else if !parsed.thoughts.text.is_empty() {
                parsed.thoughts.text.clone()
            } else {
                format!("working on loop {}", self.config.loop_count)
            };
            self.org
                .submit(agent_id, EventKind::UpdateAgentStatus { status })
                .await;

            // Execute the command (org event or tool) and observe the result.
            let result = match &parsed.command {
                Some(command) => self.bridge.execute(&command.name, &command.args).await,
                None => "No command provided in model response.".to_string(),
            };
            log::info!("SYSTEM ({}): {}", self.config.name, result);

            if let Err(e) = self
                .memory
                .add(&format!("Assistant Reply: {}\nResult: {}", reply_text, result))
                .await
            {
                log::warn!("agent {} memory write failed: {}", agent_id, e);
            }
            self.push_history(Role::Assistant, &reply_text);
            self.push_history(Role::System, &result);
        }

        log::info!(
            "agent {} ({}) loop exited after {} iterations",
            self.config.name,
            agent_id,
            self.config.loop_count
        );
    }
}
