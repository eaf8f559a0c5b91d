//! Durable snapshots.
//!
//! Two artifacts per organization, both pretty-printed JSON so they stay
//! human-inspectable:
//!
//! ```text
//! <workspace>/<name>/<name>_organization.json   # org record
//! <workspace>/<name>/<name>_messages.json       # message archive
//! ```
//!
//! Writes are atomic per file — content goes to a sibling `.tmp` and is
//! renamed into place, so a crash mid-save never leaves a half-file behind.
//! The dispatcher calls [`Persister::save`] after every successful mutation,
//! once the in-memory state is already updated; a failed save is logged and
//! the next mutation retries it. Reads happen only at load time.
//!
//! Agent configs are a third artifact owned by
//! [`AgentConfig`](crate::orgllm::agent::AgentConfig), written with the same
//! atomic primitive.

use crate::orgllm::message_center::Message;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// The organization record as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgSnapshot {
    pub name: String,
    pub goal: String,
    pub initial_budget: i64,
    pub id_count: u64,
    pub agent_budgets: BTreeMap<u64, i64>,
    pub agent_running_costs: BTreeMap<u64, i64>,
    pub agent_statuses: BTreeMap<u64, String>,
    pub supervisor_to_staff: BTreeMap<u64, Vec<u64>>,
}

/// The message archive as persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageArchive {
    pub max_id: u64,
    pub messages: BTreeMap<u64, Message>,
}

/// Serializes saves behind one file lock.
///
/// The dispatcher already serializes mutations, so the lock is redundant
/// today; it stays because save may one day be called from outside the
/// dispatcher and the on-disk artifacts must never interleave.
pub struct Persister {
    file_lock: Mutex<()>,
}

impl Default for Persister {
    fn default() -> Self {
        Self::new()
    }
}

impl Persister {
    pub fn new() -> Self {
        Self {
            file_lock: Mutex::new(()),
        }
    }

    /// Directory of one organization.
    pub fn org_dir(workspace_root: &Path, org_name: &str) -> PathBuf {
        workspace_root.join(org_name)
    }

    /// Path of the organization record.
    pub fn organization_path(org_dir: &Path, org_name: &str) -> PathBuf {
        org_dir.join(format!("{}_organization.json", org_name))
    }

    /// Path of the message archive.
    pub fn messages_path(org_dir: &Path, org_name: &str) -> PathBuf {
        org_dir.join(format!("{}_messages.json", org_name))
    }

    /// Write both artifacts atomically.
    pub async fn save(
        &self,
        org_dir: &Path,
        org_name: &str,
        snapshot: &OrgSnapshot,
        archive: &MessageArchive,
    ) -> io::Result<()> {
        let _guard = self.file_lock.lock().await;
        fs::create_dir_all(org_dir)?;

        let snapshot_json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        write_atomic(&Self::organization_path(org_dir, org_name), &snapshot_json)?;

        let archive_json = serde_json::to_string_pretty(archive)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        write_atomic(&Self::messages_path(org_dir, org_name), &archive_json)?;
        Ok(())
    }

    /// Read the organization record.
    pub fn load_snapshot(org_dir: &Path, org_name: &str) -> io::Result<OrgSnapshot> {
        let raw = fs::read_to_string(Self::organization_path(org_dir, org_name))?;
        serde_json::from_str(&raw).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unreadable organization snapshot: {}", e),
            )
        })
    }

    /// Read the message archive; a missing file is an empty archive.
    pub fn load_archive(org_dir: &Path, org_name: &str) -> io::Result<MessageArchive> {
        let path = Self::messages_path(org_dir, org_name);
        if !path.exists() {
            return Ok(MessageArchive::default());
        }
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unreadable message archive: {}", e),
            )
        })
    }
}

/// Write-to-temp then rename. The rename is what makes a crashed save
/// invisible: the old file stays intact until the new one is complete.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp_path = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_snapshot() -> OrgSnapshot {
        let mut budgets = BTreeMap::new();
        budgets.insert(1u64, 500_000i64);
        budgets.insert(2u64, 500i64);
        let mut costs = BTreeMap::new();
        costs.insert(1u64, 200i64);
        costs.insert(2u64, 100i64);
        let mut statuses = BTreeMap::new();
        statuses.insert(1u64, "founding".to_string());
        let mut chart = BTreeMap::new();
        chart.insert(1u64, vec![2u64]);
        OrgSnapshot {
            name: "ClosedAI".to_string(),
            goal: "profit".to_string(),
            initial_budget: 500_000,
            id_count: 2,
            agent_budgets: budgets,
            agent_running_costs: costs,
            agent_statuses: statuses,
            supervisor_to_staff: chart,
        }
    }

    fn sample_archive() -> MessageArchive {
        let mut messages = BTreeMap::new();
        messages.insert(
            1u64,
            Message {
                id: 1,
                sender_id: 1,
                receiver_id: 2,
                body: "welcome".to_string(),
                from_supervisor: true,
                response_to_id: None,
                response_id: None,
                read: false,
                responded: false,
                timestamp: Utc::now(),
            },
        );
        MessageArchive { max_id: 1, messages }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let org_dir = dir.path().join("ClosedAI");
        let persister = Persister::new();
        let snapshot = sample_snapshot();
        let archive = sample_archive();

        persister
            .save(&org_dir, "ClosedAI", &snapshot, &archive)
            .await
            .unwrap();

        let loaded = Persister::load_snapshot(&org_dir, "ClosedAI").unwrap();
        assert_eq!(loaded, snapshot);
        let loaded_archive = Persister::load_archive(&org_dir, "ClosedAI").unwrap();
        assert_eq!(loaded_archive, archive);
    }

    #[tokio::test]
    async fn save_is_stable_across_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let org_dir = dir.path().join("ClosedAI");
        let persister = Persister::new();
        let snapshot = sample_snapshot();
        let archive = sample_archive();

        persister
            .save(&org_dir, "ClosedAI", &snapshot, &archive)
            .await
            .unwrap();
        let first = fs::read_to_string(Persister::organization_path(&org_dir, "ClosedAI")).unwrap();
        persister
            .save(&org_dir, "ClosedAI", &snapshot, &archive)
            .await
            .unwrap();
        let second = fs::read_to_string(Persister::organization_path(&org_dir, "ClosedAI")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_archive_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Persister::load_archive(dir.path(), "nope").unwrap();
        assert_eq!(archive, MessageArchive::default());
    }

    #[test]
    fn atomic_write_replaces_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.json");
        write_atomic(&path, "one").unwrap();
        write_atomic(&path, "two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn corrupt_snapshot_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let org_dir = dir.path().join("Broken");
        fs::create_dir_all(&org_dir).unwrap();
        fs::write(
            Persister::organization_path(&org_dir, "Broken"),
            "{not json",
        )
        .unwrap();
        let err = Persister::load_snapshot(&org_dir, "Broken").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
