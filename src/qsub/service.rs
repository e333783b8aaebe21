//! Entry points used by the HTTP layer

use log::debug;
use serde::{Deserialize, Serialize};

use super::command::assemble;
use super::eligibility::qualify;
use super::fields::EvalContext;
use super::fit::{QualifiedNode, ResourceDemand, assess_nodes};
use super::options::{QsubConfigResponse, collect_field_configs};
use super::registry::FieldRegistry;
use crate::config::QsubConfig;
use crate::models::{SubmissionRequest, UserContext};
use crate::pbs::queues::build_queue_tree;
use crate::pbs::snapshot::ClusterSnapshot;

/// Response of `POST /qsub/preview`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QsubPreviewResponse {
    pub qsub_command: String,
    pub qsub_script: String,
    pub qualified_nodes: Vec<QualifiedNode>,
    pub total_count: usize,
    pub immediately_available_count: usize,
}

/// Form configuration and previews over a cluster snapshot
///
/// Stateless apart from the registry and configuration; every call reads the
/// snapshot it is given and nothing else.
pub struct QsubService {
    registry: FieldRegistry,
    config: QsubConfig,
}

impl QsubService {
    pub fn new(registry: FieldRegistry, config: QsubConfig) -> Self {
        Self { registry, config }
    }

    /// Service with the standard field registry
    pub fn standard(config: QsubConfig) -> Self {
        Self::new(FieldRegistry::standard(), config)
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &QsubConfig {
        &self.config
    }

    /// Field descriptors with the options available to `user`
    pub fn config(&self, snapshot: &ClusterSnapshot, user: &UserContext) -> QsubConfigResponse {
        let tree = build_queue_tree(snapshot, user);
        collect_field_configs(
            &self.registry,
            &snapshot.nodes(),
            &snapshot.queues(),
            &tree,
            &self.config.queue_server_suffix,
        )
    }

    /// Qualified nodes plus the command and script for `request`
    pub fn preview(
        &self,
        request: &SubmissionRequest,
        snapshot: &ClusterSnapshot,
        user: &UserContext,
    ) -> QsubPreviewResponse {
        let nodes = snapshot.nodes();
        let queues = snapshot.queues();
        let tree = build_queue_tree(snapshot, user);
        let ctx = EvalContext {
            queues: &queues,
            queue_tree: &tree,
            request,
        };

        let qualified = qualify(&self.registry, &nodes, &ctx);
        let demand = ResourceDemand::from_request(request);
        let qualified_nodes = assess_nodes(
            &qualified,
            &snapshot.infrastructure_nodes(),
            &demand,
            self.config.unmatched_nodes,
        );
        let assembled = assemble(&self.registry, request, &self.config.job_name);

        let immediately_available_count = qualified_nodes
            .iter()
            .filter(|n| n.can_run_immediately)
            .count();
        debug!(
            "Preview for {}: {} qualified, {} immediately available",
            user.username,
            qualified_nodes.len(),
            immediately_available_count
        );

        QsubPreviewResponse {
            qsub_command: assembled.command,
            qsub_script: assembled.script,
            total_count: qualified_nodes.len(),
            immediately_available_count,
            qualified_nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PbsEntity, UserRole};

    #[test]
    fn test_empty_snapshot_still_assembles() {
        let service = QsubService::standard(QsubConfig::default());
        let request = SubmissionRequest::new()
            .with("walltime", "01:00:00")
            .with("ncpu", 1);
        let response = service.preview(
            &request,
            &ClusterSnapshot::default(),
            &UserContext::new("alice", UserRole::User),
        );

        assert!(response.qualified_nodes.is_empty());
        assert_eq!(response.total_count, 0);
        assert_eq!(response.immediately_available_count, 0);
        assert!(response.qsub_command.starts_with("qsub"));
    }

    #[test]
    fn test_job_name_comes_from_config() {
        let config = QsubConfig {
            job_name: "nightly".to_string(),
            ..Default::default()
        };
        let service = QsubService::standard(config);
        let snapshot = ClusterSnapshot::with_server("pbs-m1", vec![PbsEntity::new("n1")], vec![]);
        let response = service.preview(
            &SubmissionRequest::new(),
            &snapshot,
            &UserContext::new("alice", UserRole::User),
        );
        assert!(response.qsub_script.contains("#PBS -N nightly\n"));
    }

    #[test]
    fn test_response_json_names() {
        let response = QsubPreviewResponse {
            qsub_command: "qsub".to_string(),
            qsub_script: String::new(),
            qualified_nodes: vec![],
            total_count: 0,
            immediately_available_count: 0,
        };
        let json = serde_json::to_value(&response).unwrap();
        for key in [
            "qsubCommand",
            "qsubScript",
            "qualifiedNodes",
            "totalCount",
            "immediatelyAvailableCount",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
