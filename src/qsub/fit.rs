//! Immediate resource fit of qualified nodes
//!
//! Eligibility says a node *could* run the job; this module says whether it
//! has the free resources to start it right now, using the infrastructure view.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::models::{PbsNode, SubmissionRequest, short_hostname};
use crate::pbs::attributes::parse_size;
use crate::pbs::infrastructure::InfrastructureNode;

/// What to do with a qualified PBS node that has no infrastructure record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedNodePolicy {
    /// Leave the node out of the result
    #[default]
    Drop,
    /// Report it with state `unknown`, never immediately runnable
    ReportUnknown,
}

/// Resources the job needs free on one node
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceDemand {
    pub cpus: f64,
    pub gpus: f64,
    pub memory_gb: f64,
    /// Per-GPU memory, only checked when GPUs are requested
    pub gpu_memory_gb: Option<f64>,
}

impl ResourceDemand {
    pub fn from_request(request: &SubmissionRequest) -> Self {
        Self {
            cpus: request.number("ncpu").unwrap_or(0.0),
            gpus: request.number("ngpu").unwrap_or(0.0),
            memory_gb: request.size("memory").map(|m| m.as_gb()).unwrap_or(0.0),
            gpu_memory_gb: request.size("gpu_memory").map(|m| m.as_gb()),
        }
    }
}

/// Whether the node could start a job with `demand` right away
pub fn can_run_immediately(node: &InfrastructureNode, demand: &ResourceDemand) -> bool {
    if !node.state().accepts_jobs() {
        return false;
    }
    if (node.free_cpus() as f64) < demand.cpus
        || (node.free_gpus() as f64) < demand.gpus
        || node.free_memory_gb() < demand.memory_gb
    {
        return false;
    }
    match demand.gpu_memory_gb {
        Some(requested) if demand.gpus > 0.0 => node
            .gpu_memory
            .as_deref()
            .is_some_and(|available| parse_size(available) >= requested),
        _ => true,
    }
}

/// Infrastructure record describing a PBS node
///
/// Tried in order: exact name, short hostname, then the node's `host` or
/// `vnode` resource.
pub fn match_infrastructure<'a>(
    node: &PbsNode,
    infrastructure: &'a [InfrastructureNode],
) -> Option<&'a InfrastructureNode> {
    if let Some(exact) = infrastructure.iter().find(|i| i.name == node.name) {
        return Some(exact);
    }

    let hostname = node.hostname();
    if let Some(by_host) = infrastructure
        .iter()
        .find(|i| short_hostname(&i.name) == hostname)
    {
        return Some(by_host);
    }

    let aliases = [node.available("host"), node.available("vnode")];
    infrastructure
        .iter()
        .find(|i| aliases.iter().flatten().any(|alias| *alias == i.name))
}

/// A qualified node as returned by the preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifiedNode {
    #[serde(flatten)]
    pub node: InfrastructureNode,
    pub can_run_immediately: bool,
}

/// Join qualified PBS nodes with the infrastructure view and check the fit
pub fn assess_nodes(
    nodes: &[&PbsNode],
    infrastructure: &[InfrastructureNode],
    demand: &ResourceDemand,
    policy: UnmatchedNodePolicy,
) -> Vec<QualifiedNode> {
    let mut unmatched = Vec::new();
    let mut result = Vec::with_capacity(nodes.len());

    for node in nodes {
        match match_infrastructure(node, infrastructure) {
            Some(infra) => result.push(QualifiedNode {
                node: infra.clone(),
                can_run_immediately: can_run_immediately(infra, demand),
            }),
            None => {
                unmatched.push(node.name.as_str());
                if policy == UnmatchedNodePolicy::ReportUnknown {
                    result.push(QualifiedNode {
                        node: InfrastructureNode::unknown(node.name.clone()),
                        can_run_immediately: false,
                    });
                }
            }
        }
    }

    if !unmatched.is_empty() {
        match policy {
            UnmatchedNodePolicy::Drop => warn!(
                "Dropped {} qualified nodes without infrastructure data",
                unmatched.len()
            ),
            UnmatchedNodePolicy::ReportUnknown => debug!(
                "Reporting {} qualified nodes without infrastructure data as unknown",
                unmatched.len()
            ),
        }
        debug!("Unmatched nodes: {}", unmatched.join(", "));
    }

    result
}
