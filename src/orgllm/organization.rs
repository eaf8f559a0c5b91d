//! The organization: shared state, dispatcher, and lifecycle.
//!
//! An [`Organization`] is an ordinary value behind an `Arc` — no singletons.
//! It owns the org chart, budget ledger, agent seats, and message center
//! behind one `tokio::sync::Mutex` (the organization lock), plus the event
//! queue those are mutated through. One dispatcher task pops events FIFO;
//! for each event it checks the originator is alive, applies the handler
//! under the lock, persists the snapshot, and delivers the result through
//! the event's completion channel. No two mutations ever overlap, and a
//! completed event implies its state is on disk.
//!
//! Lifecycle: [`create`](Organization::create) builds and persists an empty
//! org, [`found`](Organization::found) seats the founder,
//! [`load`](Organization::load) reconstructs everything from disk (loops not
//! started), [`start`](Organization::start) spawns the dispatcher plus one
//! loop per agent, and [`shutdown`](Organization::shutdown) terminates loops,
//! drains the queue, and stops the dispatcher. Shutdown is idempotent.

use crate::orgllm::agent::{AgentConfig, AgentRunner};
use crate::orgllm::client_wrapper::ClientWrapper;
use crate::orgllm::config::OrgConfig;
use crate::orgllm::event::{Event, EventKind, EventQueue, EventReply};
use crate::orgllm::ids::IdAllocator;
use crate::orgllm::message_center::MessageCenter;
use crate::orgllm::org_chart::{BudgetLedger, OrgChart};
use crate::orgllm::persistence::{MessageArchive, OrgSnapshot, Persister};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Diagnostic returned when the recursive cost computation exceeds its timeout.
pub const COST_TIMEOUT_DIAGNOSTIC: &str = "Error: operating cost calculation timed out";

/// How long the dispatcher waits on the queue before re-checking the stop flag.
const DISPATCH_POLL: Duration = Duration::from_millis(250);

/// Queue capacity; submissions beyond this are refused with a diagnostic.
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// One agent's seat in the organization: its config plus the flag its loop
/// watches for termination.
pub struct AgentSeat {
    pub config: AgentConfig,
    pub terminated: Arc<AtomicBool>,
}

/// Everything behind the organization lock.
pub struct OrgState {
    pub ids: IdAllocator,
    pub chart: OrgChart,
    pub ledger: BudgetLedger,
    pub agents: BTreeMap<u64, AgentSeat>,
    pub messages: MessageCenter,
}

/// A running organization of agents.
pub struct Organization {
    name: String,
    goal: String,
    initial_budget: i64,
    config: OrgConfig,
    client: Arc<dyn ClientWrapper>,
    dir: PathBuf,
    state: Mutex<OrgState>,
    events: EventQueue,
    persister: Persister,
    /// Refuses new submissions once shutdown begins.
    accepting: AtomicBool,
    /// Set once start() has spawned tasks, so hires spawn loops immediately.
    started: AtomicBool,
    /// Guards shutdown idempotence.
    shutting_down: AtomicBool,
    /// The global termination signal: set after the drain, stops the dispatcher.
    stopped: AtomicBool,
    /// Join handles of spawned agent loops; shutdown gathers them.
    loop_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    /// Self-handle so handlers can hand an owned `Arc` to spawned loops.
    me: Weak<Organization>,
}

impl Organization {
    fn new_value(
        name: &str,
        goal: &str,
        initial_budget: i64,
        config: OrgConfig,
        client: Arc<dyn ClientWrapper>,
        state: OrgState,
    ) -> Arc<Self> {
        let dir = Persister::org_dir(&config.workspace_root, name);
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new_cyclic(|me| Self {
            name: name.to_string(),
            goal: goal.to_string(),
            initial_budget,
            config,
            client,
            dir,
            state: Mutex::new(state),
            events: EventQueue::new(EVENT_QUEUE_CAPACITY),
            persister: Persister::new(),
            accepting: AtomicBool::new(true),
            started: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            loop_handles: std::sync::Mutex::new(Vec::new()),
            shutdown_tx,
            me: me.clone(),
        })
    }

    /// Construct a fresh, empty organization and persist it.
    pub async fn create(
        name: &str,
        goal: &str,
        initial_budget: i64,
        config: OrgConfig,
        client: Arc<dyn ClientWrapper>,
    ) -> io::Result<Arc<Self>> {
        let state = OrgState {
            ids: IdAllocator::new(),
            chart: OrgChart::new(),
            ledger: BudgetLedger::new(),
            agents: BTreeMap::new(),
            messages: MessageCenter::new(),
        };
        let org = Self::new_value(name, goal, initial_budget, config, client, state);
        org.save().await?;
        log::info!("created organization '{}' with goal: {}", name, goal);
        Ok(org)
    }

    /// Reconstruct an organization from disk. Agent loops are not started.
    pub async fn load(
        name: &str,
        config: OrgConfig,
        client: Arc<dyn ClientWrapper>,
    ) -> io::Result<Arc<Self>> {
        let dir = Persister::org_dir(&config.workspace_root, name);
        let snapshot = Persister::load_snapshot(&dir, name)?;
        let archive = Persister::load_archive(&dir, name)?;

        let chart = OrgChart::from_map(snapshot.supervisor_to_staff);
        let ledger = BudgetLedger::from_maps(
            snapshot.agent_budgets,
            snapshot.agent_running_costs,
            snapshot.agent_statuses,
        );
        let messages = MessageCenter::from_archive(archive.max_id, archive.messages);

        // Reconstruct agents from their config files.
        let mut agents = BTreeMap::new();
        let agents_dir = dir.join("agents");
        if agents_dir.is_dir() {
            for entry in fs::read_dir(&agents_dir)? {
                let entry = entry?;
                let config_path = entry.path().join("agent.json");
                if !config_path.is_file() {
                    continue;
                }
                match AgentConfig::load(&config_path) {
                    Ok(agent_config) => {
                        let terminated = Arc::new(AtomicBool::new(agent_config.terminated));
                        agents.insert(
                            agent_config.id,
                            AgentSeat {
                                config: agent_config,
                                terminated,
                            },
                        );
                    }
                    Err(e) => log::warn!("skipping unreadable agent config {:?}: {}", config_path, e),
                }
            }
        }

        // A staff id without a config file is a stale snapshot, not a fatal error.
        for id in chart.agent_ids() {
            if !agents.contains_key(&id) {
                log::warn!(
                    "organization '{}' references agent {} with no config on disk",
                    name,
                    id
                );
            }
        }

        let state = OrgState {
            ids: IdAllocator::from_count(snapshot.id_count),
            chart,
            ledger,
            agents,
            messages,
        };
        let agent_count = state.agents.len();
        let message_count = state.messages.messages().len();
        let org = Self::new_value(
            &snapshot.name,
            &snapshot.goal,
            snapshot.initial_budget,
            config,
            client,
            state,
        );
        log::info!(
            "loaded organization '{}' ({} agents, {} messages)",
            name,
            agent_count,
            message_count
        );
        Ok(org)
    }

    /// Seat the founder agent. The founder has no supervisor and receives the
    /// organization's initial budget.
    pub async fn found(
        &self,
        name: &str,
        role: &str,
        goals: Vec<String>,
    ) -> io::Result<u64> {
        let founder_id = {
            let mut state = self.state.lock().await;
            let id = state.ids.next_id();
            let workspace = AgentConfig::workspace_dir(&self.dir, id, name);
            let agent_config = AgentConfig {
                id,
                name: name.to_string(),
                role: role.to_string(),
                goals,
                founder: true,
                terminated: false,
                loop_count: 0,
                api_budget: 0.0,
                workspace,
            };
            agent_config.save()?;
            state
                .ledger
                .init_agent(id, self.initial_budget, self.config.unit_cost, "founding the organization");
            let terminated = Arc::new(AtomicBool::new(false));
            if self.started.load(Ordering::SeqCst) {
                self.spawn_agent_loop(agent_config.clone(), Arc::clone(&terminated));
            }
            state.agents.insert(
                id,
                AgentSeat {
                    config: agent_config,
                    terminated,
                },
            );
            id
        };
        self.save().await?;
        log::info!("founder {} seated as agent {}", name, founder_id);
        Ok(founder_id)
    }

    // ---- Accessors ----

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn config(&self) -> &OrgConfig {
        &self.config
    }

    pub fn client(&self) -> Arc<dyn ClientWrapper> {
        Arc::clone(&self.client)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Subscribe to the shutdown signal; loops select on this while sleeping.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// The supervisor of an agent, if any (used by the command bridge shims).
    pub async fn supervisor_of(&self, agent_id: u64) -> Option<u64> {
        self.state.lock().await.chart.supervisor_of(agent_id)
    }

    /// A point-in-time copy of the persistable org record.
    pub async fn snapshot(&self) -> OrgSnapshot {
        let state = self.state.lock().await;
        Self::snapshot_locked(&self.name, &self.goal, self.initial_budget, &state)
    }

    /// A point-in-time copy of the persistable message archive.
    pub async fn archive(&self) -> MessageArchive {
        let state = self.state.lock().await;
        Self::archive_locked(&state)
    }

    /// How many events are waiting to be dispatched.
    pub async fn pending_events(&self) -> usize {
        self.events.len().await
    }

    // ---- Lifecycle ----

    /// Spawn the dispatcher and one loop per live agent, then run the
    /// dispatcher until shutdown completes.
    pub async fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
        let seats: Vec<(AgentConfig, Arc<AtomicBool>)> = {
            let state = self.state.lock().await;
            state
                .agents
                .values()
                .filter(|seat| !seat.terminated.load(Ordering::SeqCst))
                .map(|seat| (seat.config.clone(), Arc::clone(&seat.terminated)))
                .collect()
        };
        for (agent_config, terminated) in seats {
            self.spawn_agent_loop(agent_config, terminated);
        }
        self.run_dispatcher().await;
    }

    /// Graceful termination: stop loops, drain the queue, stop the dispatcher.
    ///
    /// Safe to call more than once; only the first call does the work. No
    /// event submitted after this begins is processed.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("shutdown: signaling all agents to stop");
        self.accepting.store(false, Ordering::SeqCst);
        {
            let state = self.state.lock().await;
            for seat in state.agents.values() {
                seat.terminated.store(true, Ordering::SeqCst);
            }
        }
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = match self.loop_handles.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.drain(..).collect()
        };
        join_all(handles).await;
        log::info!("shutdown: all agent loops have exited");

        // Process whatever is still queued through the normal path, then set
        // the termination signal that stops the dispatcher.
        while let Some(event) = self.events.pop().await {
            self.handle_event(event).await;
        }
        self.stopped.store(true, Ordering::SeqCst);
        log::info!("shutdown: event queue drained, dispatcher stopping");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Submit an event on behalf of an agent and wait for its completion.
    pub async fn submit(&self, agent_id: u64, kind: EventKind) -> EventReply {
        if !self.accepting.load(Ordering::SeqCst) {
            return EventReply::Text(
                "The organization is shutting down; no further actions are accepted.".to_string(),
            );
        }
        let (event, receiver) = Event::new(agent_id, kind);
        let event_id = event.event_id;
        log::debug!(
            "agent {} submitted {} as event {}",
            agent_id,
            event.kind.name(),
            event_id
        );
        if self.events.push(event).await.is_err() {
            return EventReply::Text("The event queue is full; action dropped.".to_string());
        }
        // The dispatcher exits once the stop flag is set and the queue is
        // empty; an event enqueued after that point must be failed out here
        // or its submitter would wait forever.
        if self.stopped.load(Ordering::SeqCst) {
            self.events.retain(|queued| queued.event_id != event_id).await;
        }
        match receiver.await {
            Ok(reply) => reply,
            Err(_) => EventReply::Text(format!("agent {} is terminated", agent_id)),
        }
    }

    fn spawn_agent_loop(&self, agent_config: AgentConfig, terminated: Arc<AtomicBool>) {
        let org = match self.me.upgrade() {
            Some(org) => org,
            None => return,
        };
        let handle = tokio::spawn(async move {
            let agent_id = agent_config.id;
            match AgentRunner::new(org, agent_config, terminated).await {
                Ok(runner) => runner.run().await,
                Err(e) => log::error!("agent {} loop failed to start: {}", agent_id, e),
            }
        });
        match self.loop_handles.lock() {
            Ok(mut guard) => guard.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }

    // ---- Dispatcher ----

    async fn run_dispatcher(&self) {
        log::debug!("event dispatcher started for '{}'", self.name);
        loop {
            if self.stopped.load(Ordering::SeqCst) && self.events.is_empty().await {
                break;
            }
            match self.events.pop_timeout(DISPATCH_POLL).await {
                Some(event) => self.handle_event(event).await,
                None => continue,
            }
        }
        log::info!("event dispatcher stopped for '{}'", self.name);
    }

    /// Process one event: liveness check, apply under the org lock, persist,
    /// complete.
    async fn handle_event(&self, event: Event) {
        let Event {
            event_id,
            agent_id,
            kind,
            completion,
        } = event;

        let mut state = self.state.lock().await;
        let alive = state
            .agents
            .get(&agent_id)
            .map(|seat| !seat.terminated.load(Ordering::SeqCst))
            .unwrap_or(false);
        if !alive {
            drop(state);
            log::debug!(
                "discarded event {} ({}) from terminated agent {}",
                event_id,
                kind.name(),
                agent_id
            );
            let _ = completion.send(EventReply::Text(format!("agent {} is terminated", agent_id)));
            return;
        }

        log::debug!("dispatching event {} ({}) from agent {}", event_id, kind.name(), agent_id);
        let reply = self.apply(&mut state, agent_id, kind).await;

        if let Err(e) = self.persist_locked(&state).await {
            log::error!("persistence failed, in-memory state kept: {}", e);
        }
        drop(state);
        let _ = completion.send(reply);
    }

    async fn apply(&self, state: &mut OrgState, agent_id: u64, kind: EventKind) -> EventReply {
        match kind {
            EventKind::HireStaff {
                name,
                role,
                goals,
                budget,
            } => self.handle_hire(state, agent_id, name, role, goals, budget),
            EventKind::FireStaff { target_id } => self.handle_fire(state, target_id).await,
            EventKind::MessageAgent { receiver_id, body } => {
                if !state.agents.contains_key(&receiver_id) {
                    return EventReply::Text(format!(
                        "Failed to send message to employee with Agent_id: {}",
                        receiver_id
                    ));
                }
                let from_supervisor = state.chart.is_supervisor(agent_id, receiver_id);
                state.messages.send(agent_id, receiver_id, &body, from_supervisor);
                EventReply::Text(format!(
                    "Message sent to employee with Agent_id: {}",
                    receiver_id
                ))
            }
            EventKind::RespondToMessage { message_id, body } => {
                let original_sender = match state.messages.get(message_id) {
                    Some(original) => original.sender_id,
                    None => {
                        return EventReply::Text(
                            "Message does not exist. Please double check the message ID".to_string(),
                        )
                    }
                };
                let from_supervisor = state.chart.is_supervisor(agent_id, original_sender);
                match state.messages.respond(message_id, agent_id, &body, from_supervisor) {
                    Ok(_) => EventReply::Text(format!("Successfully responded to message {}", message_id)),
                    Err(e) => EventReply::Text(e.to_string()),
                }
            }
            EventKind::GetInbox => EventReply::Text(state.messages.render_inbox(agent_id)),
            EventKind::GetConversationHistory { other_id } => {
                EventReply::Text(state.messages.conversation(agent_id, other_id, 8))
            }
            EventKind::UpdateAgentStatus { status } => {
                state.ledger.set_status(agent_id, &status);
                EventReply::Text(format!(
                    "Successfully updated employee with Agent_id: {} status to {}",
                    agent_id, status
                ))
            }
            EventKind::UpdateAgentBudget { amount } => {
                if state.ledger.debit(agent_id, amount) {
                    EventReply::Text(format!("Charged {} to agent {}", amount, agent_id))
                } else {
                    EventReply::Text(format!("No budget entry for agent {}", agent_id))
                }
            }
            EventKind::UpdateAgentRunningCost { amount } => {
                state.ledger.set_running_cost(agent_id, amount);
                EventReply::Text(format!("Running cost of agent {} set to {}", agent_id, amount))
            }
            EventKind::BuildStatusUpdate => {
                EventReply::Text(self.build_status_update(state, agent_id).await)
            }
            EventKind::CalculateOperatingCost => match self.operating_cost(state, agent_id).await {
                Some(cost) => EventReply::Amount(cost),
                None => EventReply::Text(COST_TIMEOUT_DIAGNOSTIC.to_string()),
            },
        }
    }

    // ---- Handlers ----

    fn handle_hire(
        &self,
        state: &mut OrgState,
        supervisor_id: u64,
        name: String,
        role: String,
        goals: Vec<String>,
        budget: i64,
    ) -> EventReply {
        let new_id = state.ids.next_id();
        let workspace = AgentConfig::workspace_dir(&self.dir, new_id, &name);
        let agent_config = AgentConfig {
            id: new_id,
            name,
            role,
            goals,
            founder: false,
            terminated: false,
            loop_count: 0,
            api_budget: 0.0,
            workspace,
        };
        if let Err(e) = agent_config.save() {
            return EventReply::Text(format!("Failed to hire staff: {}", e));
        }
        if let Err(e) = state.chart.add_staff(supervisor_id, new_id) {
            return EventReply::Text(e.to_string());
        }
        state.ledger.init_agent(
            new_id,
            budget,
            self.config.unit_cost,
            "agent is on its way on joining the company",
        );
        let terminated = Arc::new(AtomicBool::new(false));
        if self.started.load(Ordering::SeqCst) {
            self.spawn_agent_loop(agent_config.clone(), Arc::clone(&terminated));
        }
        state.agents.insert(
            new_id,
            AgentSeat {
                config: agent_config,
                terminated,
            },
        );
        self.recompute_running_costs(state);
        log::info!("agent {} hired agent {}", supervisor_id, new_id);
        EventReply::Text(format!(
            "Successfully added employee with Agent_id: {} to supervisor with Agent_id: {}",
            new_id, supervisor_id
        ))
    }

    async fn handle_fire(&self, state: &mut OrgState, target_id: u64) -> EventReply {
        if !state.agents.contains_key(&target_id) {
            return EventReply::Text(format!(
                "Failed to remove employee with Agent_id: {}",
                target_id
            ));
        }
        if state.chart.has_staff(target_id) {
            return EventReply::Text(format!(
                "Agent {} cannot be fired because they have employees. Instruct them to let go of their workforce so they can be fired.",
                target_id
            ));
        }

        // Stop the loop first, then unlink, then purge queued events — all
        // before this handler returns and the snapshot is persisted.
        if let Some(seat) = state.agents.remove(&target_id) {
            seat.terminated.store(true, Ordering::SeqCst);
            if let Err(e) = fs::remove_file(seat.config.config_path()) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("could not remove config of fired agent {}: {}", target_id, e);
                }
            }
        }
        if let Err(e) = state.chart.remove(target_id) {
            return EventReply::Text(e.to_string());
        }
        state.ledger.remove_agent(target_id);
        self.events.retain(|event| event.agent_id != target_id).await;
        self.recompute_running_costs(state);
        log::info!("agent {} fired", target_id);
        EventReply::Text(format!(
            "Successfully removed employee with Agent_id: {}",
            target_id
        ))
    }

    /// Refresh every agent's recursive running cost after a chart mutation.
    fn recompute_running_costs(&self, state: &mut OrgState) {
        let ids: Vec<u64> = state.agents.keys().copied().collect();
        let max_nodes = ids.len().max(1);
        for id in ids {
            if let Some(cost) = state
                .chart
                .subtree_cost_bounded(id, self.config.unit_cost, max_nodes)
            {
                state.ledger.set_running_cost(id, cost);
            }
        }
    }

    /// The recursive operating cost of an agent, `None` on timeout.
    ///
    /// The walk yields every step so a corrupt cyclic chart spins inside the
    /// timeout instead of wedging the dispatcher forever.
    async fn operating_cost(&self, state: &OrgState, agent_id: u64) -> Option<i64> {
        let unit_cost = self.config.unit_cost;
        let chart = &state.chart;
        let walk = async move {
            let mut total = 0i64;
            let mut stack = vec![agent_id];
            while let Some(id) = stack.pop() {
                total += unit_cost;
                stack.extend(chart.staff_of(id).iter().copied());
                tokio::task::yield_now().await;
            }
            total
        };
        tokio::time::timeout(Duration::from_secs(self.config.cost_timeout_secs), walk)
            .await
            .ok()
    }

    /// The staff/budget context block prepended to every agent prompt.
    async fn build_status_update(&self, state: &OrgState, agent_id: u64) -> String {
        let mut status = String::from("\nYOUR STAFF:\n");
        if !state.chart.has_staff(agent_id) {
            status.push_str(&format!("Agent {} currently has no staff in service\n", agent_id));
        } else {
            for (id, depth) in state.chart.hierarchy(agent_id) {
                if id == agent_id {
                    continue;
                }
                let indent = "  ".repeat(depth);
                let seat = state.agents.get(&id);
                let name = seat.map(|s| s.config.name.as_str()).unwrap_or("<unknown>");
                let role = seat.map(|s| s.config.role.as_str()).unwrap_or("<unknown>");
                let supervisor_name = state
                    .chart
                    .supervisor_of(id)
                    .and_then(|sup| state.agents.get(&sup))
                    .map(|s| s.config.name.clone())
                    .unwrap_or_else(|| "None".to_string());
                status.push_str(&format!(
                    "{}Agent_Id:{}. Agent_Name: {}, Supervisor: {}\n{}Role: {}, Status: {}, Operating Cost: {}, Budget: {}\n",
                    indent,
                    id,
                    name,
                    supervisor_name,
                    indent,
                    role,
                    state.ledger.status(id).unwrap_or("Unknown"),
                    state.ledger.running_cost(id).unwrap_or(0),
                    state.ledger.budget(id).unwrap_or(0),
                ));
            }
        }

        let running_cost = self
            .operating_cost(state, agent_id)
            .await
            .unwrap_or(self.config.unit_cost);
        let budget = state.ledger.budget(agent_id).unwrap_or(0);
        status.push_str("\nYOUR BUDGET:\n");
        status.push_str(&format!("Your current budget is ${}\n", budget));
        status.push_str(&format!(
            "Your current running costs are ${} per step\n",
            running_cost
        ));
        if running_cost > 0 {
            status.push_str(&format!(
                "With your current running costs you will run out in {} steps.\n",
                budget / running_cost
            ));
        }
        status.push_str("A simple task will typically take 15 steps.");
        status
    }

    // ---- Persistence ----

    fn snapshot_locked(name: &str, goal: &str, initial_budget: i64, state: &OrgState) -> OrgSnapshot {
        OrgSnapshot {
            name: name.to_string(),
            goal: goal.to_string(),
            initial_budget,
            id_count: state.ids.count(),
            agent_budgets: state.ledger.budgets().clone(),
            agent_running_costs: state.ledger.running_costs().clone(),
            agent_statuses: state.ledger.statuses().clone(),
            supervisor_to_staff: state.chart.as_map().clone(),
        }
    }

    fn archive_locked(state: &OrgState) -> MessageArchive {
        MessageArchive {
            max_id: state.messages.max_id(),
            messages: state.messages.messages().clone(),
        }
    }

    async fn persist_locked(&self, state: &OrgState) -> io::Result<()> {
        let snapshot = Self::snapshot_locked(&self.name, &self.goal, self.initial_budget, state);
        let archive = Self::archive_locked(state);
        self.persister
            .save(&self.dir, &self.name, &snapshot, &archive)
            .await
    }

    /// Persist the current state outside the dispatcher (create/found paths).
    pub async fn save(&self) -> io::Result<()> {
        let state = self.state.lock().await;
        self.persist_locked(&state).await
    }
}
