//! PBS cluster data: attribute parsing, snapshots, queues and the
//! infrastructure view of nodes

pub mod attributes;
pub mod infrastructure;
pub mod queues;
pub mod snapshot;

pub use infrastructure::{InfrastructureNode, NodeState};
pub use queues::{QueueListEntry, QueueType, build_queue_tree};
pub use snapshot::{
    ClusterSnapshot, FileSnapshotProvider, SnapshotError, SnapshotProvider, SnapshotStore,
};
