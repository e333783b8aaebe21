//! Cluster snapshot and the provider contract
//!
//! The collectors (PBS dump reader, Perun export reader) live outside this
//! crate. They publish a JSON snapshot; this module loads it and keeps the
//! current copy behind an `Arc` so every request works on an immutable view.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

use super::infrastructure::InfrastructureNode;
use crate::models::{PbsNode, PbsQueue};

/// Errors raised while loading a snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A collection of PBS entities as dumped by the collector
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PbsCollection {
    #[serde(default)]
    pub items: Vec<PbsNode>,
}

/// Nodes and queues reported by one PBS server
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerData {
    #[serde(default)]
    pub nodes: PbsCollection,
    #[serde(default)]
    pub queues: PbsCollection,
}

/// A Unix group with its members, taken from the identity export
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupEntry {
    pub groupname: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Everything the assembler reads, collected at one point in time
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterSnapshot {
    /// PBS data keyed by server name (e.g. "pbs-m1")
    #[serde(default)]
    pub servers: BTreeMap<String, ServerData>,

    /// Group memberships used for queue ACLs
    #[serde(default)]
    pub groups: Vec<GroupEntry>,

    /// Explicit infrastructure view; derived from the PBS nodes when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<Vec<InfrastructureNode>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
}

impl ClusterSnapshot {
    /// Snapshot containing the given server only
    pub fn with_server(
        server: impl Into<String>,
        nodes: Vec<PbsNode>,
        queues: Vec<PbsQueue>,
    ) -> Self {
        let mut snapshot = Self::default();
        snapshot.add_server(server, nodes, queues);
        snapshot
    }

    pub fn add_server(
        &mut self,
        server: impl Into<String>,
        nodes: Vec<PbsNode>,
        queues: Vec<PbsQueue>,
    ) {
        self.servers.insert(
            server.into(),
            ServerData {
                nodes: PbsCollection { items: nodes },
                queues: PbsCollection { items: queues },
            },
        );
    }

    /// All nodes across servers
    pub fn nodes(&self) -> Vec<&PbsNode> {
        self.servers
            .values()
            .flat_map(|s| s.nodes.items.iter())
            .collect()
    }

    /// All queues across servers
    pub fn queues(&self) -> Vec<&PbsQueue> {
        self.servers
            .values()
            .flat_map(|s| s.queues.items.iter())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.servers
            .values()
            .all(|s| s.nodes.items.is_empty() && s.queues.items.is_empty())
    }

    /// Groups the user belongs to, matched by full username or its base
    pub fn user_groups(&self, username: &str) -> BTreeSet<String> {
        let base = username.split('@').next().unwrap_or(username);
        self.groups
            .iter()
            .filter(|g| g.members.iter().any(|m| m == username || m == base))
            .map(|g| g.groupname.clone())
            .collect()
    }

    /// Infrastructure records, taking the explicit list when the collector provided one
    pub fn infrastructure_nodes(&self) -> Vec<InfrastructureNode> {
        match &self.infrastructure {
            Some(nodes) => nodes.clone(),
            None => self
                .nodes()
                .into_iter()
                .map(InfrastructureNode::from_pbs_node)
                .collect(),
        }
    }
}

/// Source of cluster snapshots
pub trait SnapshotProvider: Send + Sync {
    /// Human readable description for logs
    fn describe(&self) -> String;

    /// Load a fresh snapshot
    fn load(&self) -> Result<ClusterSnapshot, SnapshotError>;
}

/// Reads the JSON dump written by the external collector
pub struct FileSnapshotProvider {
    path: PathBuf,
}

impl FileSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotProvider for FileSnapshotProvider {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn load(&self) -> Result<ClusterSnapshot, SnapshotError> {
        let content = fs::read_to_string(&self.path).map_err(|source| SnapshotError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SnapshotError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

/// Holds the current snapshot; readers get a cheap `Arc` clone
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<ClusterSnapshot>>,
}

impl SnapshotStore {
    pub fn new(snapshot: ClusterSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot as of now; stays valid even if a refresh happens meanwhile
    pub fn current(&self) -> Arc<ClusterSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in a new snapshot wholesale
    pub fn replace(&self, snapshot: ClusterSnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// Reload from the provider. On failure the previous snapshot is kept.
    pub fn refresh(&self, provider: &dyn SnapshotProvider) -> Result<(), SnapshotError> {
        match provider.load() {
            Ok(snapshot) => {
                let nodes = snapshot.nodes().len();
                let queues = snapshot.queues().len();
                self.replace(snapshot);
                info!(
                    "Loaded snapshot from {}: {} nodes, {} queues",
                    provider.describe(),
                    nodes,
                    queues
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Snapshot refresh from {} failed, keeping previous data: {}",
                    provider.describe(),
                    e
                );
                debug!("Previous snapshot has {} nodes", self.current().nodes().len());
                Err(e)
            }
        }
    }
}
