//! Crash-consistency and round-trip properties of the persistence layer:
//! kill-and-reload recovery, snapshot file stability, and the guarantee that
//! the snapshot on disk agrees with in-memory state after every mutation.

use async_trait::async_trait;
use orgllm::orgllm::event::EventKind;
use orgllm::orgllm::organization::Organization;
use orgllm::orgllm::persistence::Persister;
use orgllm::{ClientWrapper, Message, OrgConfig, Role};
use std::error::Error;
use std::fs;
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
            r#"{"thoughts": {"text": "idle"}, "command": {"name": "do_nothing", "args": {}}}"#,
        ))
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

fn test_config(root: &Path) -> OrgConfig {
    OrgConfig {
        workspace_root: root.to_path_buf(),
        loop_interval_secs: 3600,
        cost_timeout_secs: 1,
        ..OrgConfig::default()
    }
}

fn spawn_start(org: &Arc<Organization>) -> JoinHandle<()> {
    let org = Arc::clone(org);
    tokio::spawn(async move { org.start().await })
}

#[tokio::test]
async fn crash_recovery_restores_chart_budgets_messages_and_ids() {
    let dir = tempfile::tempdir().unwrap();

    // First life: two levels of staff, three messages.
    let (before_snapshot, before_archive) = {
        let org = Organization::create(
            "Phoenix",
            "rise again",
            500_000,
            test_config(dir.path()),
            Arc::new(StubClient),
        )
        .await
        .unwrap();
        let founder = org
            .found("Elon", "a founder", vec!["persist".to_string()])
            .await
            .unwrap();
        let runner = spawn_start(&org);

        org.submit(
            founder,
            EventKind::HireStaff {
                name: "Alice".into(),
                role: "a manager".into(),
                goals: vec!["manage".into()],
                budget: 10_000,
            },
        )
        .await;
        org.submit(
            2,
            EventKind::HireStaff {
                name: "Bob".into(),
                role: "a worker".into(),
                goals: vec!["work".into()],
                budget: 1_000,
            },
        )
        .await;
        for body in ["one", "two", "three"] {
            org.submit(
                founder,
                EventKind::MessageAgent {
                    receiver_id: 2,
                    body: body.to_string(),
                },
            )
            .await;
        }

        let snapshot = org.snapshot().await;
        let archive = org.archive().await;
        // Simulated crash: stop the process's tasks without any extra save.
        org.shutdown().await;
        runner.await.unwrap();
        (snapshot, archive)
    };

    // Second life.
    let org = Organization::load("Phoenix", test_config(dir.path()), Arc::new(StubClient))
        .await
        .unwrap();
    let after_snapshot = org.snapshot().await;
    let after_archive = org.archive().await;

    assert_eq!(after_snapshot, before_snapshot);
    assert_eq!(after_archive.max_id, before_archive.max_id);
    assert_eq!(after_archive.messages.len(), 3);
    for (id, message) in &before_archive.messages {
        assert_eq!(&after_archive.messages[id], message);
    }

    // New ids continue after the persisted counters.
    let runner = spawn_start(&org);
    org.submit(
        1,
        EventKind::MessageAgent {
            receiver_id: 3,
            body: "still here".into(),
        },
    )
    .await;
    assert_eq!(org.archive().await.max_id, before_archive.max_id + 1);
    let reply = org
        .submit(
            1,
            EventKind::HireStaff {
                name: "Carl".into(),
                role: "a late hire".into(),
                goals: vec!["join".into()],
                budget: 100,
            },
        )
        .await
        .into_string();
    assert!(reply.contains("Agent_id: 4"), "got: {}", reply);

    org.shutdown().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn snapshot_load_snapshot_is_byte_stable() {
    let dir = tempfile::tempdir().unwrap();
    {
        let org = Organization::create(
            "Stable",
            "stay the same",
            1_000,
            test_config(dir.path()),
            Arc::new(StubClient),
        )
        .await
        .unwrap();
        let founder = org.found("Ada", "an engineer", vec![]).await.unwrap();
        let runner = spawn_start(&org);
        org.submit(
            founder,
            EventKind::HireStaff {
                name: "Grace".into(),
                role: "a peer".into(),
                goals: vec!["compute".into()],
                budget: 300,
            },
        )
        .await;
        org.submit(
            founder,
            EventKind::MessageAgent {
                receiver_id: 2,
                body: "hello".into(),
            },
        )
        .await;
        org.shutdown().await;
        runner.await.unwrap();
    }

    let org_dir = Persister::org_dir(dir.path(), "Stable");
    let org_file = Persister::organization_path(&org_dir, "Stable");
    let msg_file = Persister::messages_path(&org_dir, "Stable");
    let org_bytes_before = fs::read_to_string(&org_file).unwrap();
    let msg_bytes_before = fs::read_to_string(&msg_file).unwrap();

    // Load and save again without mutating anything.
    let org = Organization::load("Stable", test_config(dir.path()), Arc::new(StubClient))
        .await
        .unwrap();
    org.save().await.unwrap();

    assert_eq!(fs::read_to_string(&org_file).unwrap(), org_bytes_before);
    assert_eq!(fs::read_to_string(&msg_file).unwrap(), msg_bytes_before);
}

#[tokio::test]
async fn disk_agrees_with_memory_after_every_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let org = Organization::create(
        "Agree",
        "stay in sync",
        5_000,
        test_config(dir.path()),
        Arc::new(StubClient),
    )
    .await
    .unwrap();
    let founder = org.found("Sync", "a founder", vec![]).await.unwrap();
    let runner = spawn_start(&org);

    let mutations = vec![
        EventKind::HireStaff {
            name: "W1".into(),
            role: "a worker".into(),
            goals: vec!["g".into()],
            budget: 500,
        },
        EventKind::MessageAgent {
            receiver_id: 2,
            body: "welcome aboard".into(),
        },
        EventKind::UpdateAgentStatus {
            status: "coordinating".into(),
        },
        EventKind::UpdateAgentBudget { amount: 200 },
        EventKind::FireStaff { target_id: 2 },
    ];

    for kind in mutations {
        org.submit(founder, kind).await;
        let on_disk = Persister::load_snapshot(org.dir(), org.name()).unwrap();
        assert_eq!(on_disk, org.snapshot().await);
        let archive_on_disk = Persister::load_archive(org.dir(), org.name()).unwrap();
        assert_eq!(archive_on_disk, org.archive().await);
    }

    org.shutdown().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn message_priority_survives_reorgs() {
    // A message sent while the sender was the receiver's supervisor keeps its
    // priority flag even after the sender stops being the supervisor.
    let dir = tempfile::tempdir().unwrap();
    let org = Organization::create(
        "Frozen",
        "keep history honest",
        100_000,
        test_config(dir.path()),
        Arc::new(StubClient),
    )
    .await
    .unwrap();
    let founder = org.found("Boss", "a founder", vec![]).await.unwrap();
    let runner = spawn_start(&org);

    org.submit(
        founder,
        EventKind::HireStaff {
            name: "Eve".into(),
            role: "a worker".into(),
            goals: vec!["g".into()],
            budget: 500,
        },
    )
    .await;
    let eve = 2;
    org.submit(
        founder,
        EventKind::MessageAgent {
            receiver_id: eve,
            body: "while supervised".into(),
        },
    )
    .await;
    let message_id = org.archive().await.max_id;
    assert!(org.archive().await.messages[&message_id].from_supervisor);

    // Eve leaves the org; the archived flag must not change.
    org.submit(founder, EventKind::FireStaff { target_id: eve }).await;
    let archived = &org.archive().await.messages[&message_id];
    assert!(archived.from_supervisor);
    assert_eq!(archived.body, "while supervised");

    org.shutdown().await;
    runner.await.unwrap();
}
