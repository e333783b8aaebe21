//! Infrastructure view of compute nodes
//!
//! One record per machine with configured totals, what PBS has assigned and a
//! coarse operational state. The fit checker compares these against a request.

use serde::{Deserialize, Serialize};

use super::attributes::{parse_count, parse_memory_gb, round2};
use crate::models::PbsNode;

/// Operational state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Free,
    PartiallyUsed,
    Used,
    Maintenance,
    Unknown,
}

impl NodeState {
    /// States in which a new job could start right away
    pub fn accepts_jobs(&self) -> bool {
        matches!(self, NodeState::Free | NodeState::PartiallyUsed)
    }

    /// Derive the state from the PBS `state` attribute and CPU usage
    ///
    /// Explicit PBS states win; a plain `free` node is classified by how many
    /// of its CPUs are assigned.
    pub fn from_pbs(pbs_state: Option<&str>, cpu_total: i64, cpu_assigned: i64) -> Self {
        let pbs_state = pbs_state.unwrap_or("").to_lowercase();
        let flags: Vec<&str> = pbs_state.split(',').map(str::trim).collect();
        let has = |names: &[&str]| flags.iter().any(|f| names.contains(f));

        if has(&["down", "offline", "unknown", "stale", "state-unknown", "unresolvable"]) {
            return NodeState::Unknown;
        }
        if has(&["maintenance", "resv-exclusive"]) {
            return NodeState::Maintenance;
        }
        if has(&["job-exclusive", "job-busy", "busy"]) {
            return NodeState::Used;
        }

        if cpu_total <= 0 {
            return NodeState::Unknown;
        }
        match cpu_assigned {
            a if a <= 0 => NodeState::Free,
            a if a >= cpu_total => NodeState::Used,
            _ => NodeState::PartiallyUsed,
        }
    }
}

/// A compute node as shown in the infrastructure pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureNode {
    pub name: String,

    /// Configured CPUs
    #[serde(default)]
    pub cpu: i64,

    /// CPUs currently assigned to jobs
    #[serde(default)]
    pub cpu_assigned: i64,

    #[serde(default)]
    pub actual_state: Option<NodeState>,

    #[serde(default)]
    pub cpu_usage_percent: Option<f64>,

    #[serde(default)]
    pub gpu_usage_percent: Option<f64>,

    #[serde(default)]
    pub gpu_count: Option<i64>,

    #[serde(default)]
    pub gpu_assigned: Option<i64>,

    #[serde(default)]
    pub gpu_capability: Option<String>,

    /// Per-GPU memory as reported by PBS (e.g. "40gb")
    #[serde(default)]
    pub gpu_memory: Option<String>,

    #[serde(default)]
    pub cuda_version: Option<String>,

    /// Total memory in GB
    #[serde(default)]
    pub memory_total: Option<f64>,

    /// Assigned memory in GB
    #[serde(default)]
    pub memory_used: Option<f64>,

    #[serde(default)]
    pub memory_usage_percent: Option<f64>,
}

impl InfrastructureNode {
    /// Record with a name and nothing known about it
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cpu: 0,
            cpu_assigned: 0,
            actual_state: Some(NodeState::Unknown),
            cpu_usage_percent: None,
            gpu_usage_percent: None,
            gpu_count: None,
            gpu_assigned: None,
            gpu_capability: None,
            gpu_memory: None,
            cuda_version: None,
            memory_total: None,
            memory_used: None,
            memory_usage_percent: None,
        }
    }

    /// Build the record from the PBS node's available/assigned resources
    pub fn from_pbs_node(node: &PbsNode) -> Self {
        let cpu = parse_count(node.available("ncpus"));
        let cpu_assigned = parse_count(node.assigned("ncpus"));
        let gpus = parse_count(node.available("ngpus"));
        let gpus_assigned = parse_count(node.assigned("ngpus"));

        let memory_total = node.available("mem").and_then(parse_memory_gb);
        let memory_used = node.assigned("mem").and_then(parse_memory_gb);
        let memory_usage_percent = match (memory_total, memory_used) {
            (Some(total), Some(used)) if total > 0.0 => Some(round2(used / total * 100.0)),
            _ => None,
        };

        let percent = |assigned: i64, total: i64| {
            (total > 0).then(|| round2(assigned as f64 / total as f64 * 100.0))
        };

        Self {
            name: node.name.clone(),
            cpu,
            cpu_assigned,
            actual_state: Some(NodeState::from_pbs(node.attr("state"), cpu, cpu_assigned)),
            cpu_usage_percent: percent(cpu_assigned, cpu),
            gpu_usage_percent: percent(gpus_assigned, gpus),
            gpu_count: (gpus > 0).then_some(gpus),
            gpu_assigned: (gpus_assigned > 0).then_some(gpus_assigned),
            gpu_capability: node.available("gpu_cap").map(str::to_string),
            gpu_memory: node.available("gpu_mem").map(str::to_string),
            cuda_version: node.available("cuda_version").map(str::to_string),
            memory_total,
            memory_used,
            memory_usage_percent,
        }
    }

    pub fn state(&self) -> NodeState {
        self.actual_state.unwrap_or(NodeState::Unknown)
    }

    pub fn free_cpus(&self) -> i64 {
        self.cpu.saturating_sub(self.cpu_assigned)
    }

    pub fn free_gpus(&self) -> i64 {
        self.gpu_count
            .unwrap_or(0)
            .saturating_sub(self.gpu_assigned.unwrap_or(0))
    }

    /// Unassigned memory in GB; unknown totals count as nothing free
    pub fn free_memory_gb(&self) -> f64 {
        self.memory_total.unwrap_or(0.0) - self.memory_used.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PbsEntity;

    #[test]
    fn test_state_from_pbs_flags() {
        assert_eq!(NodeState::from_pbs(Some("job-exclusive"), 8, 8), NodeState::Used);
        assert_eq!(NodeState::from_pbs(Some("down,offline"), 8, 0), NodeState::Unknown);
        assert_eq!(NodeState::from_pbs(Some("maintenance"), 8, 0), NodeState::Maintenance);
    }

    #[test]
    fn test_state_from_usage() {
        assert_eq!(NodeState::from_pbs(Some("free"), 8, 0), NodeState::Free);
        assert_eq!(NodeState::from_pbs(Some("free"), 8, 4), NodeState::PartiallyUsed);
        assert_eq!(NodeState::from_pbs(None, 8, 8), NodeState::Used);
        assert_eq!(NodeState::from_pbs(Some("free"), 0, 0), NodeState::Unknown);
    }

    #[test]
    fn test_from_pbs_node() {
        let node = PbsEntity::new("galdor1")
            .with_attr("state", "free")
            .with_attr("resources_available.ncpus", "64")
            .with_attr("resources_assigned.ncpus", "16")
            .with_attr("resources_available.ngpus", "4")
            .with_attr("resources_assigned.ngpus", "1")
            .with_attr("resources_available.mem", "512gb")
            .with_attr("resources_assigned.mem", "131072mb")
            .with_attr("resources_available.gpu_mem", "80gb");

        let infra = InfrastructureNode::from_pbs_node(&node);
        assert_eq!(infra.state(), NodeState::PartiallyUsed);
        assert_eq!(infra.free_cpus(), 48);
        assert_eq!(infra.free_gpus(), 3);
        assert_eq!(infra.free_memory_gb(), 384.0);
        assert_eq!(infra.cpu_usage_percent, Some(25.0));
        assert_eq!(infra.memory_usage_percent, Some(25.0));
        assert_eq!(infra.gpu_memory.as_deref(), Some("80gb"));
    }

    #[test]
    fn test_free_counts_saturate_on_corrupt_records() {
        let mut infra = InfrastructureNode::unknown("x1");
        infra.cpu = i64::MAX;
        infra.cpu_assigned = -1;
        infra.gpu_count = Some(i64::MIN);
        infra.gpu_assigned = Some(1);
        assert_eq!(infra.free_cpus(), i64::MAX);
        assert_eq!(infra.free_gpus(), i64::MIN);
    }

    #[test]
    fn test_serializes_camel_case() {
        let infra = InfrastructureNode::unknown("x1");
        let json = serde_json::to_value(&infra).unwrap();
        assert_eq!(json["actualState"], "unknown");
        assert!(json.get("cpuUsagePercent").is_some());
    }
}
