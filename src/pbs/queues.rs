//! Hierarchical, ACL-aware queue list
//!
//! Route queues forward jobs to the queues named in `route_destinations`. The
//! tree built here nests those destinations under their route queue and marks,
//! for the calling user, which queues they may submit to.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use super::attributes::{is_true, parse_count, split_list};
use super::snapshot::ClusterSnapshot;
use crate::models::{PbsQueue, UserContext};

/// PBS queue kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueType {
    Execution,
    Route,
}

impl QueueType {
    pub fn of(queue: &PbsQueue) -> Self {
        match queue.attr("queue_type") {
            Some("Route") => QueueType::Route,
            _ => QueueType::Execution,
        }
    }
}

/// One queue in the access tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueListEntry {
    pub name: String,
    pub server: Option<String>,
    pub queue_type: QueueType,
    pub priority: Option<i64>,
    pub total_jobs: Option<i64>,
    pub enabled: bool,
    pub started: bool,
    pub has_access: bool,
    /// False for queues that only accept jobs forwarded by a route queue
    pub can_be_directly_submitted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<QueueListEntry>,
}

impl QueueListEntry {
    /// `name@server<suffix>` as accepted by `qsub -q`
    pub fn full_name(&self, server_suffix: &str) -> String {
        match &self.server {
            Some(server) => format!("{}@{}{}", self.name, server, server_suffix),
            None => self.name.clone(),
        }
    }
}

/// Route queues first, then higher priority, then name
fn compare_entries(a: &QueueListEntry, b: &QueueListEntry) -> Ordering {
    let kind = |q: &QueueListEntry| if q.queue_type == QueueType::Route { 0 } else { 1 };
    kind(a)
        .cmp(&kind(b))
        .then_with(|| b.priority.unwrap_or(0).cmp(&a.priority.unwrap_or(0)))
        .then_with(|| a.name.cmp(&b.name))
}

/// Whether the user may submit to the queue according to its ACLs
///
/// Admins pass everything. Queues without any ACL enabled are open. With ACLs
/// on, the user must be listed in `acl_users` or belong to one of `acl_groups`.
pub fn check_queue_access(
    queue: &PbsQueue,
    user: &UserContext,
    user_groups: &BTreeSet<String>,
) -> bool {
    if user.is_admin() {
        return true;
    }

    let user_enable = is_true(queue.attr("acl_user_enable"));
    let group_enable = is_true(queue.attr("acl_group_enable"));
    let host_enable = is_true(queue.attr("acl_host_enable"));

    if !user_enable && !group_enable && !host_enable {
        return true;
    }

    let username = user.username_base();

    if user_enable {
        let allowed = split_list(queue.attr("acl_users").unwrap_or(""));
        if allowed
            .iter()
            .any(|u| u.split('@').next().unwrap_or(u) == username)
        {
            return true;
        }
    }

    if group_enable {
        let allowed = split_list(queue.attr("acl_groups").unwrap_or(""));
        if allowed.iter().any(|g| user_groups.contains(g)) {
            return true;
        }
    }

    false
}

/// Build the queue tree across all servers for the given user
pub fn build_queue_tree(snapshot: &ClusterSnapshot, user: &UserContext) -> Vec<QueueListEntry> {
    let user_groups = snapshot.user_groups(&user.username);
    let mut roots = Vec::new();

    for (server, data) in &snapshot.servers {
        roots.extend(build_server_tree(
            &data.queues.items,
            server,
            user,
            &user_groups,
        ));
    }

    roots.sort_by(compare_entries);
    debug!(
        "Built queue tree for {}: {} root queues",
        user.username,
        roots.len()
    );
    roots
}

fn build_server_tree(
    queues: &[PbsQueue],
    server: &str,
    user: &UserContext,
    user_groups: &BTreeSet<String>,
) -> Vec<QueueListEntry> {
    let by_name: HashMap<&str, &PbsQueue> = queues.iter().map(|q| (q.name.as_str(), q)).collect();

    let mut children: HashMap<&str, Vec<String>> = HashMap::new();
    let mut has_route_parent: HashSet<String> = HashSet::new();
    for queue in queues {
        if QueueType::of(queue) == QueueType::Route {
            let destinations = split_list(queue.attr("route_destinations").unwrap_or(""));
            for destination in &destinations {
                has_route_parent.insert(destination.clone());
            }
            children.insert(queue.name.as_str(), destinations);
        }
    }

    let builder = TreeBuilder {
        by_name,
        children,
        server,
        user,
        user_groups,
    };

    queues
        .iter()
        .filter(|q| !has_route_parent.contains(&q.name))
        .map(|q| builder.build(q, &mut Vec::new()))
        .collect()
}

struct TreeBuilder<'a> {
    by_name: HashMap<&'a str, &'a PbsQueue>,
    children: HashMap<&'a str, Vec<String>>,
    server: &'a str,
    user: &'a UserContext,
    user_groups: &'a BTreeSet<String>,
}

impl TreeBuilder<'_> {
    /// `path` holds the ancestors of `queue` and cuts routing cycles
    fn build(&self, queue: &PbsQueue, path: &mut Vec<String>) -> QueueListEntry {
        path.push(queue.name.clone());

        let mut children: Vec<QueueListEntry> = self
            .children
            .get(queue.name.as_str())
            .map(|names| {
                names
                    .iter()
                    .filter(|name| {
                        if path.contains(name) {
                            trace!("Skipping routing cycle {} -> {}", queue.name, name);
                            return false;
                        }
                        true
                    })
                    .filter_map(|name| self.by_name.get(name.as_str()).copied())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
            .into_iter()
            .map(|child| self.build(child, path))
            .collect();
        children.sort_by(compare_entries);

        path.pop();

        let priority = queue.attr("Priority").map(|p| parse_count(Some(p)));
        let total_jobs = queue.attr("total_jobs").map(|t| parse_count(Some(t)));

        QueueListEntry {
            name: queue.name.clone(),
            server: Some(self.server.to_string()),
            queue_type: QueueType::of(queue),
            priority,
            total_jobs,
            enabled: is_true(queue.attr("enabled")),
            started: is_true(queue.attr("started")),
            has_access: check_queue_access(queue, self.user, self.user_groups),
            can_be_directly_submitted: !is_true(queue.attr("from_route_only")),
            children,
        }
    }
}

/// Depth-first search by queue name
pub fn find_queue<'a>(tree: &'a [QueueListEntry], name: &str) -> Option<&'a QueueListEntry> {
    for entry in tree {
        if entry.name == name {
            return Some(entry);
        }
        if let Some(found) = find_queue(&entry.children, name) {
            return Some(found);
        }
    }
    None
}

/// Execution queues reachable from `entry`, including itself
pub fn execution_queues(entry: &QueueListEntry) -> Vec<&str> {
    let mut result = Vec::new();
    collect_execution_queues(entry, &mut result);
    result
}

fn collect_execution_queues<'a>(entry: &'a QueueListEntry, result: &mut Vec<&'a str>) {
    if entry.queue_type == QueueType::Execution {
        result.push(entry.name.as_str());
    }
    for child in &entry.children {
        collect_execution_queues(child, result);
    }
}

/// Execution queues the user may submit to directly, deduplicated
pub fn submittable_queues(tree: &[QueueListEntry]) -> Vec<&QueueListEntry> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    collect_submittable(tree, &mut seen, &mut result);
    result
}

fn collect_submittable<'a>(
    tree: &'a [QueueListEntry],
    seen: &mut HashSet<(Option<&'a str>, &'a str)>,
    result: &mut Vec<&'a QueueListEntry>,
) {
    for entry in tree {
        if entry.queue_type == QueueType::Execution
            && entry.can_be_directly_submitted
            && entry.has_access
            && seen.insert((entry.server.as_deref(), entry.name.as_str()))
        {
            result.push(entry);
        }
        collect_submittable(&entry.children, seen, result);
    }
}
