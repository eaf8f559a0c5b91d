//! The message center.
//!
//! Every message between agents lives here for the life of the organization:
//! addressed, timestamped, and — when it answers another message — linked
//! both ways to form a thread. The inbox view puts unresponded supervisor
//! messages first (oldest first), then the remaining unresponded messages
//! newest first. A message can be responded to exactly once.
//!
//! Whether a message is "from a supervisor" is captured at send time and
//! frozen; later re-orgs do not rewrite history. For a response, the flag is
//! recomputed at response time against the original sender.

use crate::orgllm::ids::IdAllocator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

/// One message between two agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Monotonic id, unique per organization.
    pub id: u64,
    pub sender_id: u64,
    pub receiver_id: u64,
    pub body: String,
    /// Captured at send time: was the sender the receiver's supervisor?
    pub from_supervisor: bool,
    /// Set when this message answers another.
    pub response_to_id: Option<u64>,
    /// Set on the original once a response exists.
    pub response_id: Option<u64>,
    /// Informational only; never affects inbox membership.
    pub read: bool,
    pub responded: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Render one inbox line the way agents see it.
    pub fn render(&self) -> String {
        if self.from_supervisor {
            format!(
                "Message ID {}: Incoming message from supervisor (ID: {}): {}\n",
                self.id, self.sender_id, self.body
            )
        } else {
            format!(
                "Message ID {}: Incoming message from staff member (ID: {}): {}\n",
                self.id, self.sender_id, self.body
            )
        }
    }
}

/// Why a respond call was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespondError {
    NotFound(u64),
    NotAddressee(u64),
    AlreadyResponded(u64),
}

impl fmt::Display for RespondError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespondError::NotFound(_) => {
                write!(f, "Message does not exist. Please double check the message ID")
            }
            RespondError::NotAddressee(_) => {
                write!(f, "Message does not belong to you. Please double check the message ID")
            }
            RespondError::AlreadyResponded(_) => {
                write!(f, "You have already responded to this message.")
            }
        }
    }
}

impl Error for RespondError {}

/// The archive of all messages plus the id source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageCenter {
    messages: BTreeMap<u64, Message>,
    ids: IdAllocator,
}

impl MessageCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted archive (used by load). Messages are replayed
    /// in id order by virtue of the ordered map.
    pub fn from_archive(max_id: u64, messages: BTreeMap<u64, Message>) -> Self {
        Self {
            messages,
            ids: IdAllocator::from_count(max_id),
        }
    }

    /// Highest message id allocated so far (persisted as `max_id`).
    pub fn max_id(&self) -> u64 {
        self.ids.count()
    }

    /// All messages, keyed by id.
    pub fn messages(&self) -> &BTreeMap<u64, Message> {
        &self.messages
    }

    pub fn get(&self, message_id: u64) -> Option<&Message> {
        self.messages.get(&message_id)
    }

    /// Store a new message and return its id.
    ///
    /// `from_supervisor` is computed by the caller against the chart at send
    /// time and frozen here.
    pub fn send(&mut self, sender_id: u64, receiver_id: u64, body: &str, from_supervisor: bool) -> u64 {
        let id = self.ids.next_id();
        let message = Message {
            id,
            sender_id,
            receiver_id,
            body: body.to_string(),
            from_supervisor,
            response_to_id: None,
            response_id: None,
            read: false,
            responded: false,
            timestamp: Utc::now(),
        };
        self.messages.insert(id, message);
        id
    }

    /// Answer a message.
    ///
    /// Only the original receiver may respond, and only once. The new message
    /// and the back-pointer on the original are written together, so the
    /// thread links can never be half-set.
    pub fn respond(
        &mut self,
        message_id: u64,
        responder_id: u64,
        body: &str,
        from_supervisor: bool,
    ) -> Result<u64, RespondError> {
        let (original_sender, original_receiver, already) = match self.messages.get(&message_id) {
            Some(m) => (m.sender_id, m.receiver_id, m.response_id.is_some()),
            None => return Err(RespondError::NotFound(message_id)),
        };
        if original_receiver != responder_id {
            return Err(RespondError::NotAddressee(message_id));
        }
        if already {
            return Err(RespondError::AlreadyResponded(message_id));
        }

        let response_id = self.ids.next_id();
        let response = Message {
            id: response_id,
            sender_id: responder_id,
            receiver_id: original_sender,
            body: body.to_string(),
            from_supervisor,
            response_to_id: Some(message_id),
            response_id: None,
            read: false,
            responded: false,
            timestamp: Utc::now(),
        };
        self.messages.insert(response_id, response);
        if let Some(original) = self.messages.get_mut(&message_id) {
            original.response_id = Some(response_id);
            original.responded = true;
        }
        Ok(response_id)
    }

    fn unresponded_for(&self, agent_id: u64) -> Vec<&Message> {
        self.messages
            .values()
            .filter(|m| m.receiver_id == agent_id && m.response_id.is_none())
            .collect()
    }

    /// Ids currently considered in the inbox, in inbox order.
    pub fn inbox_message_ids(&self, agent_id: u64) -> Vec<u64> {
        let unresponded = self.unresponded_for(agent_id);
        let mut supervisor: Vec<u64> = unresponded
            .iter()
            .filter(|m| m.from_supervisor)
            .map(|m| m.id)
            .collect();
        supervisor.sort_unstable(); // oldest first
        let mut others: Vec<u64> = unresponded
            .iter()
            .filter(|m| !m.from_supervisor)
            .map(|m| m.id)
            .collect();
        others.sort_unstable_by(|a, b| b.cmp(a)); // newest first
        supervisor.extend(others);
        supervisor
    }

    /// Render the inbox prompt for an agent, marking listed messages read.
    pub fn render_inbox(&mut self, agent_id: u64) -> String {
        let ordered = self.inbox_message_ids(agent_id);

        let mut prompt = String::from("INBOX:\nNEW INCOMING MESSAGES - high priority first\n");
        let mut in_responses_section = false;
        for id in &ordered {
            let message = match self.messages.get_mut(id) {
                Some(m) => m,
                None => continue,
            };
            if !message.from_supervisor && !in_responses_section {
                prompt.push_str("\n\nINCOMING RESPONSES - high priority first\n");
                in_responses_section = true;
            }
            message.read = true;
            prompt.push_str(&message.render());
        }
        if !in_responses_section {
            prompt.push_str("\n\nINCOMING RESPONSES - high priority first\n");
        }
        if !ordered.is_empty() {
            prompt.push_str(
                "\n\nUse the `respond_to_message` command to respond to an incoming message\n",
            );
        }
        prompt
    }

    /// Render the last `last_n` messages exchanged between two agents,
    /// oldest first, from the viewer's perspective.
    pub fn conversation(&self, viewer_id: u64, other_id: u64, last_n: usize) -> String {
        let mut between: Vec<&Message> = self
            .messages
            .values()
            .filter(|m| {
                (m.sender_id == viewer_id && m.receiver_id == other_id)
                    || (m.sender_id == other_id && m.receiver_id == viewer_id)
            })
            .collect();
        // fetch newest first, render oldest first
        between.sort_by(|a, b| b.id.cmp(&a.id));
        between.truncate(last_n);
        if between.is_empty() {
            return format!("No conversation history between you and agent:{}", other_id);
        }
        between.sort_by_key(|m| m.id);

        let mut prompt = format!(
            "This is the conversation history between you and agent: {}\n",
            other_id
        );
        for message in between {
            let sender = if message.sender_id == viewer_id {
                "You".to_string()
            } else {
                format!("Agent {}", message.sender_id)
            };
            prompt.push_str(&format!("{}: {}\n", sender, message.body));
        }
        prompt
    }
}
