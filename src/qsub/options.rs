//! Form configuration: descriptors plus the options each field offers

use serde::{Deserialize, Serialize};

use super::fields::{FieldCategory, FieldOption, FieldType, MultilingualText, QsubField};
use super::registry::FieldRegistry;
use crate::models::{FieldValue, PbsNode, PbsQueue};
use crate::pbs::queues::{QueueListEntry, submittable_queues};

/// One field as the form renders it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: MultilingualText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<MultilingualText>,
    pub required: bool,
    #[serde(default)]
    pub default: Option<FieldValue>,
    pub category: FieldCategory,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
}

impl FieldConfig {
    fn from_field(field: &dyn QsubField, options: Option<Vec<FieldOption>>) -> Self {
        let descriptor = field.descriptor();
        Self {
            name: descriptor.name.clone(),
            field_type: descriptor.field_type,
            label: descriptor.label.clone(),
            description: descriptor.description.clone(),
            required: descriptor.required,
            default: descriptor.default.clone(),
            category: descriptor.category,
            depends_on: descriptor.depends_on.clone(),
            options,
        }
    }
}

/// Response of `GET /qsub/config`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QsubConfigResponse {
    pub fields: Vec<FieldConfig>,
}

impl QsubConfigResponse {
    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Collect the form configuration for one user
///
/// Every field delegates to its own lister, except `queue`, whose options come
/// from the user's accessible queues, and `scratch_type`, whose default is its
/// first option.
pub fn collect_field_configs(
    registry: &FieldRegistry,
    nodes: &[&PbsNode],
    queues: &[&PbsQueue],
    queue_tree: &[QueueListEntry],
    server_suffix: &str,
) -> QsubConfigResponse {
    let fields = registry
        .fields()
        .map(|field| match field.name() {
            "queue" => {
                let options = queue_options(queue_tree, server_suffix);
                let mut config = FieldConfig::from_field(field, None);
                config.default = default_queue(&options).map(FieldValue::Text);
                config.options = Some(options);
                config
            }
            "scratch_type" => {
                let options = field.options(nodes, queues);
                let mut config = FieldConfig::from_field(field, None);
                if let Some(first) = options.as_ref().and_then(|o| o.first()) {
                    config.default = Some(first.value());
                }
                config.options = options;
                config
            }
            _ => FieldConfig::from_field(field, field.options(nodes, queues)),
        })
        .collect();

    QsubConfigResponse { fields }
}

/// Accessible queues as `name@server<suffix>`, sorted by full name
pub fn queue_options(queue_tree: &[QueueListEntry], server_suffix: &str) -> Vec<FieldOption> {
    let mut names: Vec<String> = submittable_queues(queue_tree)
        .into_iter()
        .map(|q| q.full_name(server_suffix))
        .collect();
    names.sort();
    names
        .into_iter()
        .map(|name| FieldOption::labeled(name.clone(), name))
        .collect()
}

/// First queue whose short name starts with `default`, else the first one
fn default_queue(options: &[FieldOption]) -> Option<String> {
    let value = |o: &FieldOption| match o.value() {
        FieldValue::Text(s) => Some(s),
        _ => None,
    };
    options
        .iter()
        .filter_map(value)
        .find(|name| name.split('@').next().is_some_and(|q| q.starts_with("default")))
        .or_else(|| options.first().and_then(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PbsEntity, UserContext, UserRole};
    use crate::pbs::queues::build_queue_tree;
    use crate::pbs::snapshot::ClusterSnapshot;

    fn snapshot() -> ClusterSnapshot {
        let mut snapshot = ClusterSnapshot::with_server(
            "pbs-m1",
            vec![
                PbsEntity::new("a1").with_attr("resources_available.arch", "linux"),
                PbsEntity::new("a2").with_attr("resources_available.arch", "arm"),
            ],
            vec![
                PbsEntity::new("q_1d").with_attr("queue_type", "Execution"),
                PbsEntity::new("default_exec").with_attr("queue_type", "Execution"),
                PbsEntity::new("route").with_attr("queue_type", "Route"),
            ],
        );
        snapshot.add_server(
            "pbs-elixir",
            vec![],
            vec![PbsEntity::new("elixir_1d").with_attr("queue_type", "Execution")],
        );
        snapshot
    }

    fn collect(snapshot: &ClusterSnapshot) -> QsubConfigResponse {
        let user = UserContext::new("alice", UserRole::User);
        let tree = build_queue_tree(snapshot, &user);
        collect_field_configs(
            &FieldRegistry::standard(),
            &snapshot.nodes(),
            &snapshot.queues(),
            &tree,
            ".metacentrum.cz",
        )
    }

    #[test]
    fn test_queue_options_use_full_names() {
        let response = collect(&snapshot());
        let queue = response.field("queue").unwrap();

        assert_eq!(
            queue.options,
            Some(vec![
                FieldOption::labeled(
                    "default_exec@pbs-m1.metacentrum.cz",
                    "default_exec@pbs-m1.metacentrum.cz"
                ),
                FieldOption::labeled(
                    "elixir_1d@pbs-elixir.metacentrum.cz",
                    "elixir_1d@pbs-elixir.metacentrum.cz"
                ),
                FieldOption::labeled("q_1d@pbs-m1.metacentrum.cz", "q_1d@pbs-m1.metacentrum.cz"),
            ])
        );
        assert_eq!(
            queue.default,
            Some(FieldValue::Text("default_exec@pbs-m1.metacentrum.cz".to_string()))
        );
    }

    #[test]
    fn test_queue_default_falls_back_to_first() {
        let snapshot = ClusterSnapshot::with_server(
            "pbs-m1",
            vec![],
            vec![
                PbsEntity::new("zz").with_attr("queue_type", "Execution"),
                PbsEntity::new("aa").with_attr("queue_type", "Execution"),
            ],
        );
        let response = collect(&snapshot);
        assert_eq!(
            response.field("queue").unwrap().default,
            Some(FieldValue::Text("aa@pbs-m1.metacentrum.cz".to_string()))
        );

        let empty = collect(&ClusterSnapshot::default());
        let queue = empty.field("queue").unwrap();
        assert_eq!(queue.default, None);
        assert_eq!(queue.options, Some(vec![]));
    }

    #[test]
    fn test_scratch_type_defaults_to_first_option() {
        let response = collect(&snapshot());
        let scratch = response.field("scratch_type").unwrap();
        assert_eq!(scratch.default, Some(FieldValue::Text("local".to_string())));
        assert_eq!(scratch.options.as_ref().map(Vec::len), Some(4));
    }

    #[test]
    fn test_registry_order_and_listers() {
        let response = collect(&snapshot());
        let names: Vec<&str> = response.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, FieldRegistry::standard().names());
        assert_eq!(
            response.field("arch").unwrap().options,
            Some(vec![
                FieldOption::Text("arm".to_string()),
                FieldOption::Text("linux".to_string())
            ])
        );
        assert_eq!(response.field("memory").unwrap().options, None);
    }

    #[test]
    fn test_field_config_json_shape() {
        let response = collect(&snapshot());
        let json = serde_json::to_value(response.field("scratch_memory").unwrap()).unwrap();
        assert_eq!(json["type"], "memory");
        assert_eq!(json["dependsOn"], serde_json::json!(["scratch_type"]));
        assert_eq!(json["default"], serde_json::json!({"amount": 400.0, "unit": "mb"}));
        assert_eq!(json["label"]["cs"], "Scratch paměť");
        assert!(json.get("options").is_none());
    }
}
