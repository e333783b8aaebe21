//! Node eligibility filter

use log::debug;

use super::fields::EvalContext;
use super::registry::FieldRegistry;
use crate::models::PbsNode;

/// Nodes accepted by every field of the registry
///
/// Absent values skip their predicate. An absent required field disqualifies
/// every node.
pub fn qualify<'n>(
    registry: &FieldRegistry,
    nodes: &[&'n PbsNode],
    ctx: &EvalContext<'_>,
) -> Vec<&'n PbsNode> {
    if let Some(missing) = registry
        .fields()
        .find(|f| f.descriptor().required && ctx.request.present(f.name()).is_none())
    {
        debug!(
            "Required field {} is missing, no node qualifies",
            missing.name()
        );
        return Vec::new();
    }

    let qualified: Vec<&PbsNode> = nodes
        .iter()
        .copied()
        .filter(|node| is_eligible(registry, node, ctx))
        .collect();
    debug!("{} of {} nodes qualify", qualified.len(), nodes.len());
    qualified
}

/// Whether a single node satisfies every present value
pub fn is_eligible(registry: &FieldRegistry, node: &PbsNode, ctx: &EvalContext<'_>) -> bool {
    registry.fields().all(|field| match ctx.request.present(field.name()) {
        Some(value) => field.is_eligible(node, value, ctx),
        None => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, MemoryAmount, PbsEntity, SizeUnit, SubmissionRequest};

    fn nodes() -> Vec<PbsEntity> {
        vec![
            PbsEntity::new("small1")
                .with_attr("resources_available.ncpus", "8")
                .with_attr("resources_available.mem", "32gb"),
            PbsEntity::new("big1")
                .with_attr("resources_available.ncpus", "64")
                .with_attr("resources_available.mem", "1tb")
                .with_attr("resources_available.ngpus", "4"),
        ]
    }

    fn run(request: &SubmissionRequest, nodes: &[PbsEntity]) -> Vec<String> {
        let refs: Vec<&PbsEntity> = nodes.iter().collect();
        let ctx = EvalContext {
            queues: &[],
            queue_tree: &[],
            request,
        };
        qualify(&FieldRegistry::standard(), &refs, &ctx)
            .into_iter()
            .map(|n| n.name.clone())
            .collect()
    }

    #[test]
    fn test_missing_required_field_disqualifies_all() {
        let request = SubmissionRequest::new().with("walltime", "01:00:00");
        assert!(run(&request, &nodes()).is_empty());

        let request = SubmissionRequest::new()
            .with("walltime", "")
            .with("ncpu", 1);
        assert!(run(&request, &nodes()).is_empty());
    }

    #[test]
    fn test_filters_on_every_present_field() {
        let request = SubmissionRequest::new()
            .with("walltime", "01:00:00")
            .with("ncpu", 4)
            .with("memory", MemoryAmount::new(64.0, SizeUnit::Gb));
        assert_eq!(run(&request, &nodes()), vec!["big1"]);
    }

    #[test]
    fn test_absent_values_skip_predicates() {
        let request = SubmissionRequest::new()
            .with("walltime", "01:00:00")
            .with("ncpu", 1)
            .with("memory", MemoryAmount::new(0.0, SizeUnit::Gb))
            .with("cluster", "")
            .with("cgroups", FieldValue::List(vec![]));
        assert_eq!(run(&request, &nodes()), vec!["small1", "big1"]);
    }
}
