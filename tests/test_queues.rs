mod common;

use common::{admin, alice, bob, metacentrum_snapshot, service};
use qsub::UserContext;
use qsub::models::FieldValue;
use qsub::pbs::queues::{QueueType, build_queue_tree, find_queue, submittable_queues};
use qsub::pbs::snapshot::ClusterSnapshot;
use qsub::qsub::{FieldOption, QsubService};
use rstest::rstest;

fn queue_option_values(
    service: &QsubService,
    snapshot: &ClusterSnapshot,
    user: &UserContext,
) -> Vec<String> {
    service
        .config(snapshot, user)
        .field("queue")
        .and_then(|f| f.options.clone())
        .unwrap_or_default()
        .iter()
        .map(|o| match o.value() {
            FieldValue::Text(s) => s,
            other => panic!("unexpected queue option {:?}", other),
        })
        .collect()
}

#[rstest]
fn test_tree_nests_route_destinations(metacentrum_snapshot: ClusterSnapshot) {
    let tree = build_queue_tree(&metacentrum_snapshot, &alice());

    let roots: Vec<&str> = tree.iter().map(|q| q.name.as_str()).collect();
    assert_eq!(roots, vec!["default", "elixir_1d", "private"]);

    let default = &tree[0];
    assert_eq!(default.queue_type, QueueType::Route);
    let children: Vec<&str> = default.children.iter().map(|q| q.name.as_str()).collect();
    assert_eq!(children, vec!["gpu", "q_1h", "q_1d"]);

    let gpu_1d = find_queue(&tree, "gpu_1d").unwrap();
    assert_eq!(gpu_1d.server.as_deref(), Some("pbs-m1"));
    assert!(!gpu_1d.can_be_directly_submitted);
}

#[rstest]
#[case(alice(), &["elixir_1d", "q_1d"])]
#[case(bob(), &["private", "q_1d"])]
#[case(admin(), &["elixir_1d", "private", "q_1d"])]
fn test_submittable_queues_per_user(
    metacentrum_snapshot: ClusterSnapshot,
    #[case] user: UserContext,
    #[case] expected: &[&str],
) {
    let tree = build_queue_tree(&metacentrum_snapshot, &user);
    let mut names: Vec<&str> = submittable_queues(&tree)
        .iter()
        .map(|q| q.name.as_str())
        .collect();
    names.sort();
    assert_eq!(names, expected);
}

#[rstest]
fn test_route_only_queues_are_not_offered(metacentrum_snapshot: ClusterSnapshot) {
    let tree = build_queue_tree(&metacentrum_snapshot, &admin());
    let names: Vec<&str> = submittable_queues(&tree)
        .iter()
        .map(|q| q.name.as_str())
        .collect();
    assert!(!names.contains(&"q_1h"));
    assert!(!names.contains(&"gpu_1d"));
    assert!(!names.contains(&"default"));
}

#[rstest]
fn test_queue_options_for_group_member(
    service: QsubService,
    metacentrum_snapshot: ClusterSnapshot,
) {
    let values = queue_option_values(&service, &metacentrum_snapshot, &alice());
    assert_eq!(
        values,
        vec![
            "elixir_1d@pbs-elixir.metacentrum.cz",
            "q_1d@pbs-m1.metacentrum.cz",
        ]
    );

    let config = service.config(&metacentrum_snapshot, &alice());
    assert_eq!(
        config.field("queue").unwrap().default,
        Some(FieldValue::Text("elixir_1d@pbs-elixir.metacentrum.cz".to_string()))
    );
}

#[rstest]
fn test_queue_options_for_listed_user(service: QsubService, metacentrum_snapshot: ClusterSnapshot) {
    let values = queue_option_values(&service, &metacentrum_snapshot, &bob());
    assert_eq!(
        values,
        vec!["private@pbs-m1.metacentrum.cz", "q_1d@pbs-m1.metacentrum.cz"]
    );
}

#[rstest]
fn test_queue_options_for_admin(service: QsubService, metacentrum_snapshot: ClusterSnapshot) {
    let values = queue_option_values(&service, &metacentrum_snapshot, &admin());
    assert_eq!(values.len(), 3);
    assert!(values.contains(&"private@pbs-m1.metacentrum.cz".to_string()));
}

#[rstest]
fn test_custom_server_suffix(metacentrum_snapshot: ClusterSnapshot) {
    let service = QsubService::standard(qsub::config::QsubConfig {
        queue_server_suffix: ".example.org".to_string(),
        ..Default::default()
    });
    let values = queue_option_values(&service, &metacentrum_snapshot, &bob());
    assert_eq!(values[0], "private@pbs-m1.example.org");
}

#[rstest]
fn test_other_fields_list_node_values(service: QsubService, metacentrum_snapshot: ClusterSnapshot) {
    let config = service.config(&metacentrum_snapshot, &alice());

    assert_eq!(
        config.field("cluster").unwrap().options,
        Some(
            ["elmo", "galdor", "tiny", "zenon"]
                .iter()
                .map(|c| FieldOption::Text(c.to_string()))
                .collect()
        )
    );
    assert_eq!(
        config.field("ngpu").unwrap().options,
        Some(vec![FieldOption::Integer(4)])
    );
    assert_eq!(
        config.field("spec").unwrap().options,
        Some(vec![FieldOption::Number(8.1), FieldOption::Number(9.4)])
    );
    assert_eq!(
        config.field("scratch_type").unwrap().default,
        Some(FieldValue::Text("local".to_string()))
    );
}

#[rstest]
fn test_queue_tree_json(metacentrum_snapshot: ClusterSnapshot) {
    let tree = build_queue_tree(&metacentrum_snapshot, &alice());
    let json = serde_json::to_value(&tree).unwrap();

    assert_eq!(json[0]["queueType"], "Route");
    assert_eq!(json[0]["children"][1]["name"], "q_1h");
    assert_eq!(json[0]["children"][1]["priority"], 70);
    assert_eq!(json[2]["hasAccess"], false);
    assert_eq!(json[1]["canBeDirectlySubmitted"], true);
}
