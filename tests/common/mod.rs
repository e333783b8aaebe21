#![allow(dead_code)]

use qsub::config::QsubConfig;
use qsub::pbs::snapshot::{ClusterSnapshot, GroupEntry};
use qsub::qsub::{QsubPreviewResponse, QsubService};
use qsub::{PbsEntity, SubmissionRequest, UserContext, UserRole};
use rstest::fixture;

fn node(name: &str, attrs: &[(&str, &str)]) -> PbsEntity {
    attrs
        .iter()
        .fold(PbsEntity::new(name), |node, (key, value)| {
            node.with_attr(format!("resources_available.{}", key), *value)
        })
}

fn queue(name: &str, attrs: &[(&str, &str)]) -> PbsEntity {
    attrs
        .iter()
        .fold(PbsEntity::new(name), |queue, (key, value)| {
            queue.with_attr(*key, *value)
        })
}

/// Two PBS servers with a handful of representative nodes and queues
///
/// - zenon1: 32 CPUs, 8 assigned, local + shm scratch, queues q_1h and q_1d
/// - galdor1: 64 CPUs fully assigned, 4 GPUs with 40 GB each, gpu_1d only
/// - tiny1: 8 CPUs fully assigned and job-exclusive, q_1h only
/// - elmo1: 16 idle CPUs on the elixir server, group-restricted queue
#[fixture]
pub fn metacentrum_snapshot() -> ClusterSnapshot {
    let zenon1 = node(
        "zenon1.cerit-sc.cz",
        &[
            ("ncpus", "32"),
            ("mem", "256gb"),
            ("queue_list", "q_1h,q_1d"),
            ("cluster", "zenon"),
            ("arch", "linux"),
            ("cpu_vendor", "amd"),
            ("scratch_local", "2tb"),
            ("scratch_shm", "True"),
            ("cgroups", "cpuacct,memory"),
            ("cpu_flag", "avx,avx2,sse4_2"),
            ("singularity", "True"),
            ("spec", "8.1"),
            ("osfamily", "debian"),
            ("os", "debian12"),
            ("brno", "True"),
            ("vnode", "zenon1"),
        ],
    )
    .with_attr("state", "free")
    .with_attr("resources_assigned.ncpus", "8")
    .with_attr("resources_assigned.mem", "64gb");

    let galdor1 = node(
        "galdor1.metacentrum.cz",
        &[
            ("ncpus", "64"),
            ("ngpus", "4"),
            ("mem", "512gb"),
            ("gpu_mem", "40960mb"),
            ("gpu_cap", "cuda80,cuda86"),
            ("queue_list", "gpu_1d"),
            ("cluster", "galdor"),
            ("arch", "linux"),
            ("cpu_vendor", "intel"),
            ("scratch_ssd", "1tb"),
            ("spec", "9.4"),
            ("praha", "True"),
        ],
    )
    .with_attr("state", "job-exclusive")
    .with_attr("resources_assigned.ncpus", "64")
    .with_attr("resources_assigned.ngpus", "4")
    .with_attr("resources_assigned.mem", "512gb");

    let tiny1 = node(
        "tiny1.metacentrum.cz",
        &[
            ("ncpus", "8"),
            ("mem", "32gb"),
            ("queue_list", "q_1h"),
            ("cluster", "tiny"),
            ("arch", "linux"),
            ("scratch_local", "100gb"),
        ],
    )
    .with_attr("state", "job-exclusive")
    .with_attr("resources_assigned.ncpus", "8");

    let elmo1 = node(
        "elmo1.elixir-czech.cz",
        &[
            ("ncpus", "16"),
            ("mem", "64gb"),
            ("queue_list", "elixir_1d"),
            ("cluster", "elmo"),
            ("arch", "linux"),
            ("scratch_shared", "10tb"),
            ("praha", "True"),
        ],
    )
    .with_attr("state", "free");

    let m1_queues = vec![
        queue(
            "default",
            &[
                ("queue_type", "Route"),
                ("route_destinations", "q_1h,q_1d,gpu"),
                ("enabled", "True"),
                ("started", "True"),
            ],
        ),
        queue(
            "gpu",
            &[
                ("queue_type", "Route"),
                ("route_destinations", "gpu_1d"),
                ("Priority", "60"),
            ],
        ),
        queue(
            "q_1h",
            &[("queue_type", "Execution"), ("from_route_only", "True"), ("Priority", "70")],
        ),
        queue("q_1d", &[("queue_type", "Execution"), ("Priority", "50")]),
        queue(
            "gpu_1d",
            &[("queue_type", "Execution"), ("from_route_only", "True")],
        ),
        queue(
            "private",
            &[
                ("queue_type", "Execution"),
                ("acl_user_enable", "True"),
                ("acl_users", "bob@META"),
            ],
        ),
    ];

    let elixir_queues = vec![queue(
        "elixir_1d",
        &[
            ("queue_type", "Execution"),
            ("acl_group_enable", "True"),
            ("acl_groups", "elixir"),
        ],
    )];

    let mut snapshot =
        ClusterSnapshot::with_server("pbs-m1", vec![zenon1, galdor1, tiny1], m1_queues);
    snapshot.add_server("pbs-elixir", vec![elmo1], elixir_queues);
    snapshot.groups.push(GroupEntry {
        groupname: "elixir".to_string(),
        members: vec!["alice".to_string()],
    });
    snapshot
}

#[fixture]
pub fn service() -> QsubService {
    QsubService::standard(QsubConfig::default())
}

pub fn alice() -> UserContext {
    UserContext::new("alice@META", UserRole::User)
}

pub fn bob() -> UserContext {
    UserContext::new("bob", UserRole::User)
}

pub fn admin() -> UserContext {
    UserContext::new("root", UserRole::Admin)
}

/// Request with the required fields filled in
pub fn base_request(ncpu: i64) -> SubmissionRequest {
    SubmissionRequest::new()
        .with("walltime", "01:00:00")
        .with("ncpu", ncpu)
}

/// Short host names of the qualified nodes, in response order
pub fn qualified_names(response: &QsubPreviewResponse) -> Vec<String> {
    response
        .qualified_nodes
        .iter()
        .map(|n| n.node.name.split('.').next().unwrap_or(&n.node.name).to_string())
        .collect()
}
