//! Events and the dispatch queue.
//!
//! Every mutation of shared organization state travels as an [`Event`]: a
//! typed request carrying its originating agent id and a one-shot completion
//! channel. A single dispatcher task pops events in FIFO order and applies
//! them under the organization lock, which is what gives the runtime its
//! total mutation order.
//!
//! The queue itself is deliberately small: a bounded `VecDeque` behind a
//! `tokio::sync::Mutex` with a `Notify` for wakeups. A plain channel would
//! not do — firing an agent has to reach into the queue and pull out that
//! agent's not-yet-dispatched events ([`EventQueue::retain`]).

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::time::Instant;
use uuid::Uuid;

/// The closed set of mutation/read requests agents can submit.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    HireStaff {
        name: String,
        role: String,
        goals: Vec<String>,
        budget: i64,
    },
    FireStaff {
        target_id: u64,
    },
    MessageAgent {
        receiver_id: u64,
        body: String,
    },
    RespondToMessage {
        message_id: u64,
        body: String,
    },
    GetInbox,
    GetConversationHistory {
        other_id: u64,
    },
    UpdateAgentStatus {
        status: String,
    },
    UpdateAgentBudget {
        amount: i64,
    },
    UpdateAgentRunningCost {
        amount: i64,
    },
    BuildStatusUpdate,
    CalculateOperatingCost,
}

impl EventKind {
    /// Stable name used in logs and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::HireStaff { .. } => "hire_staff",
            EventKind::FireStaff { .. } => "fire_staff",
            EventKind::MessageAgent { .. } => "message_agent",
            EventKind::RespondToMessage { .. } => "respond_to_message",
            EventKind::GetInbox => "get_inbox",
            EventKind::GetConversationHistory { .. } => "get_conversation_history",
            EventKind::UpdateAgentStatus { .. } => "update_agent_status",
            EventKind::UpdateAgentBudget { .. } => "update_agent_budget",
            EventKind::UpdateAgentRunningCost { .. } => "update_agent_running_cost",
            EventKind::BuildStatusUpdate => "build_status_update",
            EventKind::CalculateOperatingCost => "calculate_operating_cost_of_agent",
        }
    }
}

/// What a handler sends back through the completion channel.
///
/// Almost everything is text shown to the agent; the operating-cost query is
/// numeric so the loop can bill with it.
#[derive(Debug, Clone, PartialEq)]
pub enum EventReply {
    Text(String),
    Amount(i64),
}

impl EventReply {
    pub fn into_string(self) -> String {
        match self {
            EventReply::Text(s) => s,
            EventReply::Amount(n) => n.to_string(),
        }
    }
}

impl fmt::Display for EventReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventReply::Text(s) => write!(f, "{}", s),
            EventReply::Amount(n) => write!(f, "{}", n),
        }
    }
}

/// A queued request from one agent.
#[derive(Debug)]
pub struct Event {
    pub event_id: Uuid,
    /// The originating agent.
    pub agent_id: u64,
    pub kind: EventKind,
    /// One-shot slot the dispatcher fills exactly once.
    pub completion: oneshot::Sender<EventReply>,
}

impl Event {
    pub fn new(agent_id: u64, kind: EventKind) -> (Self, oneshot::Receiver<EventReply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                event_id: Uuid::new_v4(),
                agent_id,
                kind,
                completion: tx,
            },
            rx,
        )
    }

    /// Deliver the result. A dropped receiver (an agent fired mid-await) is fine.
    pub fn complete(self, reply: EventReply) {
        let _ = self.completion.send(reply);
    }
}

/// Bounded FIFO of pending events with a filter operation.
pub struct EventQueue {
    inner: Mutex<VecDeque<Event>>,
    notify: Notify,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueue an event; hands it back when the queue is at capacity.
    pub async fn push(&self, event: Event) -> Result<(), Event> {
        {
            let mut queue = self.inner.lock().await;
            if queue.len() >= self.capacity {
                return Err(event);
            }
            queue.push_back(event);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Pop the oldest event if one is queued right now.
    pub async fn pop(&self) -> Option<Event> {
        self.inner.lock().await.pop_front()
    }

    /// Pop the oldest event, waiting up to `timeout` for one to arrive.
    ///
    /// The short timeout is what lets the dispatcher observe the termination
    /// signal between events.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<Event> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.inner.lock().await.pop_front() {
                return Some(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let _ = tokio::time::timeout(deadline - now, self.notify.notified()).await;
        }
    }

    /// Keep only events matching the predicate.
    ///
    /// Removed events are completed with a terminated-agent diagnostic so
    /// their submitters still receive exactly one result.
    pub async fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&Event) -> bool,
    {
        let removed: Vec<Event> = {
            let mut queue = self.inner.lock().await;
            let mut kept = VecDeque::with_capacity(queue.len());
            let mut removed = Vec::new();
            while let Some(event) = queue.pop_front() {
                if keep(&event) {
                    kept.push_back(event);
                } else {
                    removed.push(event);
                }
            }
            *queue = kept;
            removed
        };
        for event in removed {
            let agent_id = event.agent_id;
            event.complete(EventReply::Text(format!("agent {} is terminated", agent_id)));
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let queue = EventQueue::new(16);
        for i in 0..3 {
            let (event, _rx) = Event::new(i, EventKind::GetInbox);
            queue.push(event).await.unwrap();
        }
        for expected in 0..3 {
            let event = queue.pop().await.unwrap();
            assert_eq!(event.agent_id, expected);
        }
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let queue = EventQueue::new(1);
        let (first, _rx1) = Event::new(1, EventKind::GetInbox);
        queue.push(first).await.unwrap();
        let (second, _rx2) = Event::new(2, EventKind::GetInbox);
        assert!(queue.push(second).await.is_err());
    }

    #[tokio::test]
    async fn pop_timeout_returns_none_when_idle() {
        let queue = EventQueue::new(4);
        let popped = queue.pop_timeout(Duration::from_millis(20)).await;
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn pop_timeout_wakes_on_push() {
        let queue = std::sync::Arc::new(EventQueue::new(4));
        let q = queue.clone();
        let popper = tokio::spawn(async move { q.pop_timeout(Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let (event, _rx) = Event::new(7, EventKind::BuildStatusUpdate);
        queue.push(event).await.unwrap();
        let popped = popper.await.unwrap().unwrap();
        assert_eq!(popped.agent_id, 7);
    }

    #[tokio::test]
    async fn retain_completes_removed_events() {
        let queue = EventQueue::new(16);
        let (keep, mut keep_rx) = Event::new(1, EventKind::GetInbox);
        let (drop_me, mut drop_rx) = Event::new(2, EventKind::GetInbox);
        queue.push(keep).await.unwrap();
        queue.push(drop_me).await.unwrap();

        queue.retain(|event| event.agent_id != 2).await;

        assert_eq!(queue.len().await, 1);
        let reply = drop_rx.try_recv().unwrap();
        assert_eq!(reply, EventReply::Text("agent 2 is terminated".to_string()));
        assert!(keep_rx.try_recv().is_err()); // still pending
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(EventKind::GetInbox.name(), "get_inbox");
        assert_eq!(
            EventKind::CalculateOperatingCost.name(),
            "calculate_operating_cost_of_agent"
        );
    }

    #[test]
    fn reply_stringification() {
        assert_eq!(EventReply::Amount(300).into_string(), "300");
        assert_eq!(EventReply::Text("ok".into()).to_string(), "ok");
    }
}
