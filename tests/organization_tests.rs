//! End-to-end scenarios for the organization runtime: hiring, firing,
//! message priority, threaded responses, bankruptcy, concurrent events,
//! cycle defense, and shutdown draining. All scenarios run against the real
//! dispatcher with a stub model client; agent loops are kept dormant by a
//! long tick interval so the assertions only see the events the tests submit.

use async_trait::async_trait;
use orgllm::orgllm::agent::AgentConfig;
use orgllm::orgllm::event::{EventKind, EventReply};
use orgllm::orgllm::org_chart::OrgChart;
use orgllm::orgllm::organization::{Organization, COST_TIMEOUT_DIAGNOSTIC};
use orgllm::orgllm::persistence::{MessageArchive, OrgSnapshot, Persister};
use orgllm::{ClientWrapper, Message, OrgConfig, Role};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

struct StubClient;

#[async_trait]
impl ClientWrapper for StubClient {
    async fn send_message(
        &self,
        _messages: &[Message],
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        Ok(Message::new(
            Role::Assistant,
            r#"{"thoughts": {"text": "idle", "reasoning": "", "plan": "", "criticism": "", "speak": "standing by"}, "command": {"name": "do_nothing", "args": {}}}"#,
        ))
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

fn test_config(root: &Path) -> OrgConfig {
    OrgConfig {
        workspace_root: root.to_path_buf(),
        // Keep loops dormant so only explicitly submitted events mutate state.
        loop_interval_secs: 3600,
        cost_timeout_secs: 1,
        ..OrgConfig::default()
    }
}

async fn founded_org(
    root: &Path,
    name: &str,
    initial_budget: i64,
) -> (Arc<Organization>, u64, JoinHandle<()>) {
    let org = Organization::create(
        name,
        "test the runtime",
        initial_budget,
        test_config(root),
        Arc::new(StubClient),
    )
    .await
    .unwrap();
    let founder_id = org
        .found("Elon", "a founder", vec!["build things".to_string()])
        .await
        .unwrap();
    let runner = {
        let org = Arc::clone(&org);
        tokio::spawn(async move { org.start().await })
    };
    (org, founder_id, runner)
}

fn hire(name: &str, budget: i64) -> EventKind {
    EventKind::HireStaff {
        name: name.to_string(),
        role: "a worker".to_string(),
        goals: vec!["work".to_string()],
        budget,
    }
}

#[tokio::test]
async fn hire_fire_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (org, founder, runner) = founded_org(dir.path(), "RoundTrip", 500_000).await;
    assert_eq!(founder, 1);

    let reply = org.submit(founder, hire("Alice", 500)).await;
    assert_eq!(
        reply,
        EventReply::Text(
            "Successfully added employee with Agent_id: 2 to supervisor with Agent_id: 1".into()
        )
    );

    let snapshot = org.snapshot().await;
    let mut expected_chart = BTreeMap::new();
    expected_chart.insert(1u64, vec![2u64]);
    assert_eq!(snapshot.supervisor_to_staff, expected_chart);
    assert_eq!(snapshot.agent_budgets.get(&2), Some(&500));
    assert_eq!(snapshot.agent_running_costs.get(&1), Some(&200));
    assert_eq!(snapshot.agent_running_costs.get(&2), Some(&100));

    let reply = org.submit(founder, EventKind::FireStaff { target_id: 2 }).await;
    assert_eq!(
        reply,
        EventReply::Text("Successfully removed employee with Agent_id: 2".into())
    );

    let snapshot = org.snapshot().await;
    assert!(snapshot.supervisor_to_staff.is_empty());
    assert!(snapshot.agent_budgets.get(&2).is_none());
    assert!(snapshot.agent_statuses.get(&2).is_none());
    assert_eq!(snapshot.agent_running_costs.get(&1), Some(&100));

    org.shutdown().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn supervisor_messages_lead_the_inbox() {
    let dir = tempfile::tempdir().unwrap();
    let (org, bob, runner) = founded_org(dir.path(), "Priority", 500_000).await;

    // Bob (founder) hires Carol and Alice; Bob supervises both.
    org.submit(bob, hire("Carol", 1_000)).await;
    org.submit(bob, hire("Alice", 1_000)).await;
    let (carol, alice) = (2, 3);

    // Alice messages Carol first, Bob second — Bob must still render first.
    org.submit(
        alice,
        EventKind::MessageAgent {
            receiver_id: carol,
            body: "hi A".into(),
        },
    )
    .await;
    org.submit(
        bob,
        EventKind::MessageAgent {
            receiver_id: carol,
            body: "hi B".into(),
        },
    )
    .await;

    let inbox = org.submit(carol, EventKind::GetInbox).await.into_string();
    let pos_b = inbox.find("hi B").expect("supervisor message missing");
    let pos_a = inbox.find("hi A").expect("staff message missing");
    assert!(pos_b < pos_a, "supervisor message must be listed first");
    assert!(inbox.contains("from supervisor (ID: 1)"));
    assert!(inbox.contains("from staff member (ID: 3)"));

    org.shutdown().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn threaded_response_links_once() {
    let dir = tempfile::tempdir().unwrap();
    let (org, bob, runner) = founded_org(dir.path(), "Threads", 500_000).await;
    org.submit(bob, hire("Carol", 1_000)).await;
    let carol = 2;

    org.submit(
        bob,
        EventKind::MessageAgent {
            receiver_id: carol,
            body: "status?".into(),
        },
    )
    .await;
    let original_id = org.archive().await.max_id;

    let reply = org
        .submit(
            carol,
            EventKind::RespondToMessage {
                message_id: original_id,
                body: "ack".into(),
            },
        )
        .await;
    assert_eq!(
        reply,
        EventReply::Text(format!("Successfully responded to message {}", original_id))
    );

    let archive = org.archive().await;
    let response_id = archive.max_id;
    assert_eq!(response_id, original_id + 1);
    let original = &archive.messages[&original_id];
    assert_eq!(original.response_id, Some(response_id));
    assert!(original.responded);
    let response = &archive.messages[&response_id];
    assert_eq!(response.response_to_id, Some(original_id));
    // Carol is not Bob's supervisor, so the response is not prioritized.
    assert!(!response.from_supervisor);

    let again = org
        .submit(
            carol,
            EventKind::RespondToMessage {
                message_id: original_id,
                body: "ack again".into(),
            },
        )
        .await;
    assert_eq!(
        again,
        EventReply::Text("You have already responded to this message.".into())
    );
    assert_eq!(org.archive().await.messages.len(), 2);

    org.shutdown().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn bankruptcy_does_not_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let (org, founder, runner) = founded_org(dir.path(), "Broke", 50).await;

    for _ in 0..2 {
        let cost = match org.submit(founder, EventKind::CalculateOperatingCost).await {
            EventReply::Amount(cost) => cost,
            other => panic!("expected numeric cost, got {:?}", other),
        };
        assert_eq!(cost, 100);
        org.submit(founder, EventKind::UpdateAgentRunningCost { amount: cost })
            .await;
        org.submit(founder, EventKind::UpdateAgentBudget { amount: cost })
            .await;
    }

    let snapshot = org.snapshot().await;
    assert_eq!(snapshot.agent_budgets.get(&founder), Some(&-150));
    assert_eq!(snapshot.agent_running_costs.get(&founder), Some(&100));

    // The persisted snapshot still round-trips.
    let on_disk = Persister::load_snapshot(org.dir(), org.name()).unwrap();
    assert_eq!(on_disk, snapshot);

    org.shutdown().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn concurrent_hires_get_unique_monotonic_ids() {
    let dir = tempfile::tempdir().unwrap();
    let (org, founder, runner) = founded_org(dir.path(), "Concurrent", 500_000).await;

    let (a, b) = tokio::join!(
        org.submit(founder, hire("Left", 100)),
        org.submit(founder, hire("Right", 100)),
    );
    let texts = [a.into_string(), b.into_string()];
    assert!(texts.iter().all(|t| t.starts_with("Successfully added employee")));
    assert!(texts.iter().any(|t| t.contains("Agent_id: 2")));
    assert!(texts.iter().any(|t| t.contains("Agent_id: 3")));

    let snapshot = org.snapshot().await;
    assert_eq!(snapshot.id_count, 3);
    assert_eq!(snapshot.supervisor_to_staff[&founder], vec![2, 3]);

    org.shutdown().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn firing_a_manager_is_refused_until_staffless() {
    let dir = tempfile::tempdir().unwrap();
    let (org, founder, runner) = founded_org(dir.path(), "MiddleMgmt", 500_000).await;

    org.submit(founder, hire("Manager", 10_000)).await;
    let manager = 2;
    org.submit(manager, hire("Worker", 1_000)).await;
    let worker = 3;

    let refused = org
        .submit(founder, EventKind::FireStaff { target_id: manager })
        .await
        .into_string();
    assert!(refused.contains("cannot be fired because they have employees"));

    org.submit(manager, EventKind::FireStaff { target_id: worker })
        .await;
    let accepted = org
        .submit(founder, EventKind::FireStaff { target_id: manager })
        .await
        .into_string();
    assert!(accepted.starts_with("Successfully removed employee"));

    org.shutdown().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn events_from_fired_agents_produce_no_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let (org, founder, runner) = founded_org(dir.path(), "Terminated", 500_000).await;

    org.submit(founder, hire("Alice", 500)).await;
    let alice = 2;
    org.submit(founder, EventKind::FireStaff { target_id: alice }).await;

    let before = org.snapshot().await;
    let reply = org
        .submit(
            alice,
            EventKind::MessageAgent {
                receiver_id: founder,
                body: "let me back in".into(),
            },
        )
        .await;
    assert_eq!(reply, EventReply::Text("agent 2 is terminated".into()));
    assert_eq!(org.snapshot().await, before);
    assert_eq!(org.archive().await.messages.len(), 0);

    org.shutdown().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn cycle_defense_times_out_instead_of_hanging() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let org_dir = Persister::org_dir(&config.workspace_root, "Cyclic");

    // Corrupt snapshot: 2 supervises 3 and 3 supervises 2.
    let mut chart = BTreeMap::new();
    chart.insert(2u64, vec![3u64]);
    chart.insert(3u64, vec![2u64]);
    let mut budgets = BTreeMap::new();
    budgets.insert(2u64, 1_000i64);
    budgets.insert(3u64, 1_000i64);
    let snapshot = OrgSnapshot {
        name: "Cyclic".to_string(),
        goal: "corrupted".to_string(),
        initial_budget: 1_000,
        id_count: 3,
        agent_budgets: budgets,
        agent_running_costs: BTreeMap::new(),
        agent_statuses: BTreeMap::new(),
        supervisor_to_staff: chart,
    };
    Persister::new()
        .save(&org_dir, "Cyclic", &snapshot, &MessageArchive::default())
        .await
        .unwrap();
    for (id, name) in [(2u64, "Loopy"), (3u64, "Loopier")] {
        AgentConfig {
            id,
            name: name.to_string(),
            role: "corrupted".to_string(),
            goals: vec![],
            founder: false,
            terminated: false,
            loop_count: 0,
            api_budget: 0.0,
            workspace: AgentConfig::workspace_dir(&org_dir, id, name),
        }
        .save()
        .unwrap();
    }

    let org = Organization::load("Cyclic", config, Arc::new(StubClient))
        .await
        .unwrap();
    let runner = {
        let org = Arc::clone(&org);
        tokio::spawn(async move { org.start().await })
    };

    let reply = org.submit(2, EventKind::CalculateOperatingCost).await;
    assert_eq!(reply, EventReply::Text(COST_TIMEOUT_DIAGNOSTIC.into()));

    org.shutdown().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn shutdown_completes_in_flight_events_and_refuses_new_ones() {
    let dir = tempfile::tempdir().unwrap();
    let (org, founder, runner) = founded_org(dir.path(), "Drain", 500_000).await;

    // A burst of events racing shutdown: every submission must still get a reply.
    let mut submissions = Vec::new();
    for i in 0..10 {
        let org = Arc::clone(&org);
        submissions.push(tokio::spawn(async move {
            org.submit(
                founder,
                EventKind::UpdateAgentStatus {
                    status: format!("busy {}", i),
                },
            )
            .await
        }));
    }
    org.shutdown().await;
    for submission in submissions {
        submission.await.unwrap(); // a reply arrived, whatever it was
    }

    let rejected = org.submit(founder, EventKind::GetInbox).await.into_string();
    assert!(rejected.contains("shutting down"));
    assert_eq!(org.pending_events().await, 0);

    // Idempotent: a second shutdown returns immediately.
    org.shutdown().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn chart_invariants_hold_after_event_storm() {
    let dir = tempfile::tempdir().unwrap();
    let (org, founder, runner) = founded_org(dir.path(), "Invariants", 500_000).await;

    org.submit(founder, hire("A", 1_000)).await; // 2
    org.submit(founder, hire("B", 1_000)).await; // 3
    org.submit(2, hire("C", 100)).await; // 4
    org.submit(2, hire("D", 100)).await; // 5
    org.submit(2, EventKind::FireStaff { target_id: 5 }).await;

    let snapshot = org.snapshot().await;
    let chart = OrgChart::from_map(snapshot.supervisor_to_staff.clone());
    assert!(chart.is_acyclic());

    // Every non-founder appears in exactly one staff list.
    for id in [2u64, 3, 4] {
        let supervisors: Vec<u64> = snapshot
            .supervisor_to_staff
            .iter()
            .filter(|(_, staff)| staff.contains(&id))
            .map(|(&s, _)| s)
            .collect();
        assert_eq!(supervisors.len(), 1, "agent {} has {:?}", id, supervisors);
    }

    // running_cost(a) == unit + sum of children's running costs.
    for (&id, &cost) in &snapshot.agent_running_costs {
        let children_sum: i64 = chart
            .staff_of(id)
            .iter()
            .map(|child| snapshot.agent_running_costs[child])
            .sum();
        assert_eq!(cost, 100 + children_sum, "running cost of agent {}", id);
    }

    org.shutdown().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn conversation_history_reads_from_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    let (org, bob, runner) = founded_org(dir.path(), "Convo", 500_000).await;
    org.submit(bob, hire("Carol", 1_000)).await;
    let carol = 2;

    org.submit(
        bob,
        EventKind::MessageAgent {
            receiver_id: carol,
            body: "please report".into(),
        },
    )
    .await;
    org.submit(
        carol,
        EventKind::MessageAgent {
            receiver_id: bob,
            body: "reporting in".into(),
        },
    )
    .await;

    let from_bob = org
        .submit(bob, EventKind::GetConversationHistory { other_id: carol })
        .await
        .into_string();
    assert!(from_bob.contains("You: please report"));
    assert!(from_bob.contains("Agent 2: reporting in"));

    let from_carol = org
        .submit(carol, EventKind::GetConversationHistory { other_id: bob })
        .await
        .into_string();
    assert!(from_carol.contains("Agent 1: please report"));
    assert!(from_carol.contains("You: reporting in"));

    org.shutdown().await;
    runner.await.unwrap();
}
