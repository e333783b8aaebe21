//! Submission field definitions
//!
//! Each field owns three behaviours: whether a node satisfies the requested
//! value, which `qsub` fragment the value produces, and which values the form
//! should offer. Implementations are plain data plus pure functions; none of
//! them can fail, a value of the wrong shape simply does not match.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{FieldValue, PbsNode, PbsQueue, SubmissionRequest, format_number};
use crate::pbs::attributes::{is_true, parse_count, parse_float, parse_size, split_list};
use crate::pbs::queues::{QueueListEntry, QueueType, execution_queues, find_queue};

/// Input widget kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Select,
    Time,
    Input,
    Number,
    Boolean,
    Multiselect,
    Memory,
}

/// Form section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldCategory {
    Basic,
    Advanced,
}

/// Label in the two languages the dashboard ships
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultilingualText {
    pub en: String,
    pub cs: String,
}

impl MultilingualText {
    pub fn new(en: impl Into<String>, cs: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            cs: cs.into(),
        }
    }
}

/// Static description of a field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub label: MultilingualText,
    pub description: Option<MultilingualText>,
    pub required: bool,
    pub default: Option<FieldValue>,
    pub category: FieldCategory,
    /// Fields whose value this field reads from the request
    pub depends_on: Vec<String>,
}

impl FieldDescriptor {
    pub fn new(
        name: &str,
        field_type: FieldType,
        label: MultilingualText,
        category: FieldCategory,
    ) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            label,
            description: None,
            required: false,
            default: None,
            category,
            depends_on: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn description(mut self, description: MultilingualText) -> Self {
        self.description = Some(description);
        self
    }

    pub fn depends_on(mut self, field: &str) -> Self {
        self.depends_on.push(field.to_string());
        self
    }
}

/// A selectable value offered by the form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldOption {
    Integer(i64),
    Number(f64),
    Text(String),
    Labeled { value: String, label: String },
}

impl FieldOption {
    pub fn labeled(value: impl Into<String>, label: impl Into<String>) -> Self {
        FieldOption::Labeled {
            value: value.into(),
            label: label.into(),
        }
    }

    /// The value the form submits when this option is picked
    pub fn value(&self) -> FieldValue {
        match self {
            FieldOption::Integer(i) => FieldValue::Number(*i as f64),
            FieldOption::Number(n) => FieldValue::Number(*n),
            FieldOption::Text(s) => FieldValue::Text(s.clone()),
            FieldOption::Labeled { value, .. } => FieldValue::Text(value.clone()),
        }
    }
}

/// Read-only inputs shared by every predicate of one evaluation
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Raw queues from all servers
    pub queues: &'a [&'a PbsQueue],
    /// Queue tree for the calling user
    pub queue_tree: &'a [QueueListEntry],
    /// The whole request, for fields that depend on sibling values
    pub request: &'a SubmissionRequest,
}

/// Behaviour of one submission field
pub trait QsubField: Send + Sync {
    fn descriptor(&self) -> &FieldDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Whether `node` can satisfy `value`; only called for present values
    fn is_eligible(&self, node: &PbsNode, value: &FieldValue, ctx: &EvalContext<'_>) -> bool;

    /// `qsub` fragment for `value`, if it contributes one
    ///
    /// Fragments starting with `-l select=` are full selection clauses,
    /// fragments starting with `:` extend the selection, anything else is an
    /// independent flag.
    fn fragment(&self, value: &FieldValue, request: &SubmissionRequest) -> Option<String>;

    /// Values to offer in the form, or `None` for free-form inputs
    fn options(&self, nodes: &[&PbsNode], queues: &[&PbsQueue]) -> Option<Vec<FieldOption>>;
}

/// How a field's fragment joins the `select` statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectStyle {
    /// `-l select=1:<resource>`
    Clause,
    /// `:<resource>`, appended to whatever selection exists
    Continuation,
}

impl SelectStyle {
    fn render(&self, resource: &str) -> String {
        match self {
            SelectStyle::Clause => format!("-l select=1:{}", resource),
            SelectStyle::Continuation => format!(":{}", resource),
        }
    }
}

/// Distinct values of a node attribute, sorted
fn distinct_attribute(nodes: &[&PbsNode], resource: &str) -> Vec<FieldOption> {
    nodes
        .iter()
        .filter_map(|n| n.available(resource))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(FieldOption::Text)
        .collect()
}

/// Distinct items of a comma-separated node attribute, sorted
fn distinct_list_items(nodes: &[&PbsNode], resource: &str) -> Vec<FieldOption> {
    nodes
        .iter()
        .filter_map(|n| n.available(resource))
        .flat_map(split_list)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(FieldOption::Text)
        .collect()
}

/// Required walltime; filtering by walltime happens at queue level, not here
pub struct WalltimeField {
    descriptor: FieldDescriptor,
}

impl WalltimeField {
    pub fn new(descriptor: FieldDescriptor) -> Self {
        Self { descriptor }
    }
}

impl QsubField for WalltimeField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_eligible(&self, _node: &PbsNode, _value: &FieldValue, _ctx: &EvalContext<'_>) -> bool {
        true
    }

    fn fragment(&self, value: &FieldValue, _request: &SubmissionRequest) -> Option<String> {
        let walltime = value.as_text()?.trim();
        (!walltime.is_empty()).then(|| format!("-l walltime={}", walltime))
    }

    fn options(&self, _nodes: &[&PbsNode], _queues: &[&PbsQueue]) -> Option<Vec<FieldOption>> {
        None
    }
}

/// Target queue, optionally qualified with `@server`
///
/// A node qualifies when its `queue_list` names the queue itself or, for a
/// route queue, any execution queue reachable through it.
pub struct QueueField {
    descriptor: FieldDescriptor,
}

impl QueueField {
    pub fn new(descriptor: FieldDescriptor) -> Self {
        Self { descriptor }
    }
}

impl QsubField for QueueField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_eligible(&self, node: &PbsNode, value: &FieldValue, ctx: &EvalContext<'_>) -> bool {
        let Some(requested) = value.as_text() else {
            return false;
        };
        let Some(queue_list) = node.available("queue_list") else {
            return false;
        };
        let short_name = requested.split('@').next().unwrap_or(requested);
        let Some(queue) = find_queue(ctx.queue_tree, short_name) else {
            return false;
        };

        let node_queues = split_list(queue_list);
        execution_queues(queue)
            .iter()
            .any(|q| node_queues.iter().any(|nq| nq == q))
    }

    fn fragment(&self, value: &FieldValue, _request: &SubmissionRequest) -> Option<String> {
        let queue = value.as_text()?.trim();
        (!queue.is_empty()).then(|| format!("-q {}", queue))
    }

    /// Execution queues by name; the option collector replaces this with the
    /// caller's access list
    fn options(&self, _nodes: &[&PbsNode], queues: &[&PbsQueue]) -> Option<Vec<FieldOption>> {
        Some(
            queues
                .iter()
                .filter(|q| QueueType::of(q) == QueueType::Execution)
                .map(|q| q.name.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(FieldOption::Text)
                .collect(),
        )
    }
}

/// Minimum count of an integer resource (`ncpus`, `ngpus`)
pub struct CountField {
    descriptor: FieldDescriptor,
    resource: &'static str,
    style: SelectStyle,
    /// Whether a request of 0 is accepted as "no constraint"
    zero_allowed: bool,
}

impl CountField {
    pub fn new(
        descriptor: FieldDescriptor,
        resource: &'static str,
        style: SelectStyle,
        zero_allowed: bool,
    ) -> Self {
        Self {
            descriptor,
            resource,
            style,
            zero_allowed,
        }
    }
}

impl QsubField for CountField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_eligible(&self, node: &PbsNode, value: &FieldValue, _ctx: &EvalContext<'_>) -> bool {
        let Some(requested) = value.as_number() else {
            return false;
        };
        if requested <= 0.0 {
            return self.zero_allowed;
        }
        parse_count(node.available(self.resource)) as f64 >= requested
    }

    fn fragment(&self, value: &FieldValue, _request: &SubmissionRequest) -> Option<String> {
        let requested = value.as_number()?;
        (requested > 0.0).then(|| {
            self.style
                .render(&format!("{}={}", self.resource, format_number(requested)))
        })
    }

    fn options(&self, nodes: &[&PbsNode], _queues: &[&PbsQueue]) -> Option<Vec<FieldOption>> {
        Some(
            nodes
                .iter()
                .map(|n| parse_count(n.available(self.resource)))
                .filter(|&c| c > 0)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(FieldOption::Integer)
                .collect(),
        )
    }
}

/// Minimum size of a memory resource (`mem`, `gpu_mem`), compared in GB
pub struct MemoryField {
    descriptor: FieldDescriptor,
    resource: &'static str,
}

impl MemoryField {
    pub fn new(descriptor: FieldDescriptor, resource: &'static str) -> Self {
        Self {
            descriptor,
            resource,
        }
    }
}

impl QsubField for MemoryField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_eligible(&self, node: &PbsNode, value: &FieldValue, _ctx: &EvalContext<'_>) -> bool {
        let Some(requested) = value.as_size() else {
            return false;
        };
        if requested.is_empty() {
            return true;
        }
        match node.available(self.resource) {
            Some(available) => parse_size(available) >= requested.as_gb(),
            None => false,
        }
    }

    fn fragment(&self, value: &FieldValue, _request: &SubmissionRequest) -> Option<String> {
        let size = value.as_size().filter(|s| !s.is_empty())?;
        Some(SelectStyle::Continuation.render(&format!("{}={}", self.resource, size.to_pbs())))
    }

    fn options(&self, _nodes: &[&PbsNode], _queues: &[&PbsQueue]) -> Option<Vec<FieldOption>> {
        None
    }
}

/// Scratch storage kinds offered by the form
pub const SCRATCH_TYPES: [(&str, &str); 4] = [
    ("local", "Local"),
    ("shared", "Shared"),
    ("shm", "SHM"),
    ("ssd", "SSD"),
];

/// Node resource backing a sized scratch type; `shm` has no size
fn scratch_resource(scratch_type: &str) -> Option<&'static str> {
    match scratch_type {
        "local" => Some("scratch_local"),
        "shared" => Some("scratch_shared"),
        "ssd" => Some("scratch_ssd"),
        _ => None,
    }
}

/// Kind of scratch space; the size lives in `scratch_memory`
pub struct ScratchTypeField {
    descriptor: FieldDescriptor,
}

impl ScratchTypeField {
    pub fn new(descriptor: FieldDescriptor) -> Self {
        Self { descriptor }
    }
}

impl QsubField for ScratchTypeField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_eligible(&self, node: &PbsNode, value: &FieldValue, _ctx: &EvalContext<'_>) -> bool {
        match value.as_text() {
            Some("shm") => is_true(node.available("scratch_shm")),
            Some(kind) => match scratch_resource(kind) {
                Some(resource) => node.available(resource).is_some_and(|v| !v.is_empty()),
                None => false,
            },
            None => false,
        }
    }

    fn fragment(&self, _value: &FieldValue, _request: &SubmissionRequest) -> Option<String> {
        None
    }

    fn options(&self, _nodes: &[&PbsNode], _queues: &[&PbsQueue]) -> Option<Vec<FieldOption>> {
        Some(
            SCRATCH_TYPES
                .iter()
                .map(|(value, label)| FieldOption::labeled(*value, *label))
                .collect(),
        )
    }
}

/// Scratch size, interpreted against the scratch type chosen in the request
pub struct ScratchMemoryField {
    descriptor: FieldDescriptor,
}

impl ScratchMemoryField {
    pub fn new(descriptor: FieldDescriptor) -> Self {
        Self { descriptor }
    }
}

impl QsubField for ScratchMemoryField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_eligible(&self, node: &PbsNode, value: &FieldValue, ctx: &EvalContext<'_>) -> bool {
        let Some(requested) = value.as_size() else {
            return false;
        };
        let Some(scratch_type) = ctx.request.text("scratch_type") else {
            return true;
        };
        if requested.is_empty() {
            return true;
        }
        // shm is memory backed and unknown kinds carry no size constraint
        let Some(resource) = scratch_resource(scratch_type) else {
            return true;
        };
        parse_size(node.available(resource).unwrap_or("0")) >= requested.as_gb()
    }

    fn fragment(&self, value: &FieldValue, request: &SubmissionRequest) -> Option<String> {
        let scratch_type = request.text("scratch_type")?;
        if scratch_type == "shm" {
            return None;
        }
        let size = value.as_size().filter(|s| !s.is_empty())?;
        let resource = scratch_resource(scratch_type).unwrap_or("scratch_local");
        Some(SelectStyle::Continuation.render(&format!("{}={}", resource, size.to_pbs())))
    }

    fn options(&self, _nodes: &[&PbsNode], _queues: &[&PbsQueue]) -> Option<Vec<FieldOption>> {
        None
    }
}

/// How an attribute selection is written into the select statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorFormat {
    /// `<resource>=<value>`
    Resource,
    /// `cl_<value>=1`, the per-cluster boolean resource
    ClusterFlag,
}

/// Exact match on a string attribute (`arch`, `os`, `cluster`, ...)
pub struct AttributeSelectField {
    descriptor: FieldDescriptor,
    resource: &'static str,
    format: SelectorFormat,
}

impl AttributeSelectField {
    pub fn new(descriptor: FieldDescriptor, resource: &'static str) -> Self {
        Self {
            descriptor,
            resource,
            format: SelectorFormat::Resource,
        }
    }

    pub fn with_format(mut self, format: SelectorFormat) -> Self {
        self.format = format;
        self
    }
}

impl QsubField for AttributeSelectField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_eligible(&self, node: &PbsNode, value: &FieldValue, _ctx: &EvalContext<'_>) -> bool {
        value
            .as_text()
            .is_some_and(|v| node.available(self.resource) == Some(v))
    }

    fn fragment(&self, value: &FieldValue, _request: &SubmissionRequest) -> Option<String> {
        let value = value.as_text().filter(|v| !v.is_empty())?;
        let resource = match self.format {
            SelectorFormat::Resource => format!("{}={}", self.resource, value),
            SelectorFormat::ClusterFlag => format!("cl_{}=1", value),
        };
        Some(SelectStyle::Clause.render(&resource))
    }

    fn options(&self, nodes: &[&PbsNode], _queues: &[&PbsQueue]) -> Option<Vec<FieldOption>> {
        Some(distinct_attribute(nodes, self.resource))
    }
}

/// Every requested item must appear in a comma-separated node attribute
pub struct AttributeListField {
    descriptor: FieldDescriptor,
    resource: &'static str,
    style: SelectStyle,
}

impl AttributeListField {
    pub fn new(descriptor: FieldDescriptor, resource: &'static str, style: SelectStyle) -> Self {
        Self {
            descriptor,
            resource,
            style,
        }
    }
}

impl QsubField for AttributeListField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_eligible(&self, node: &PbsNode, value: &FieldValue, _ctx: &EvalContext<'_>) -> bool {
        let Some(requested) = value.as_list() else {
            return false;
        };
        if requested.is_empty() {
            return true;
        }
        let Some(available) = node.available(self.resource) else {
            return false;
        };
        let available = split_list(available);
        requested.iter().all(|item| available.contains(item))
    }

    fn fragment(&self, value: &FieldValue, _request: &SubmissionRequest) -> Option<String> {
        let items = value.as_list().filter(|items| !items.is_empty())?;
        Some(
            self.style
                .render(&format!("{}={}", self.resource, items.join(","))),
        )
    }

    fn options(&self, nodes: &[&PbsNode], _queues: &[&PbsQueue]) -> Option<Vec<FieldOption>> {
        Some(distinct_list_items(nodes, self.resource))
    }
}

/// Boolean node property (`singularity`, `umg`); `false` means "don't care"
pub struct FlagField {
    descriptor: FieldDescriptor,
    resource: &'static str,
}

impl FlagField {
    pub fn new(descriptor: FieldDescriptor, resource: &'static str) -> Self {
        Self {
            descriptor,
            resource,
        }
    }
}

impl QsubField for FlagField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_eligible(&self, node: &PbsNode, value: &FieldValue, _ctx: &EvalContext<'_>) -> bool {
        match value.as_flag() {
            Some(true) => is_true(node.available(self.resource)),
            Some(false) => true,
            None => false,
        }
    }

    fn fragment(&self, value: &FieldValue, _request: &SubmissionRequest) -> Option<String> {
        (value.as_flag() == Some(true))
            .then(|| SelectStyle::Clause.render(&format!("{}=1", self.resource)))
    }

    fn options(&self, _nodes: &[&PbsNode], _queues: &[&PbsQueue]) -> Option<Vec<FieldOption>> {
        None
    }
}

/// A specific node, matched by vnode name or host name
pub struct VnodeField {
    descriptor: FieldDescriptor,
}

impl VnodeField {
    pub fn new(descriptor: FieldDescriptor) -> Self {
        Self { descriptor }
    }
}

impl QsubField for VnodeField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_eligible(&self, node: &PbsNode, value: &FieldValue, _ctx: &EvalContext<'_>) -> bool {
        value
            .as_text()
            .is_some_and(|v| node.available("vnode") == Some(v) || node.name == v)
    }

    fn fragment(&self, value: &FieldValue, _request: &SubmissionRequest) -> Option<String> {
        let vnode = value.as_text().filter(|v| !v.is_empty())?;
        Some(SelectStyle::Clause.render(&format!("vnode={}", vnode)))
    }

    fn options(&self, nodes: &[&PbsNode], _queues: &[&PbsQueue]) -> Option<Vec<FieldOption>> {
        Some(
            nodes
                .iter()
                .map(|n| n.available("vnode").unwrap_or(&n.name).to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(|v| FieldOption::labeled(v.clone(), v))
                .collect(),
        )
    }
}

/// Sites exposed as boolean node resources
pub const PLACES: [(&str, &str); 5] = [
    ("brno", "Brno"),
    ("budejovice", "Budejovice"),
    ("liberec", "Liberec"),
    ("plzen", "Plzen"),
    ("praha", "Praha"),
];

/// Location of the node, itself a boolean resource named after the site
pub struct PlaceField {
    descriptor: FieldDescriptor,
}

impl PlaceField {
    pub fn new(descriptor: FieldDescriptor) -> Self {
        Self { descriptor }
    }
}

impl QsubField for PlaceField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_eligible(&self, node: &PbsNode, value: &FieldValue, _ctx: &EvalContext<'_>) -> bool {
        value
            .as_text()
            .is_some_and(|place| is_true(node.available(place)))
    }

    fn fragment(&self, value: &FieldValue, _request: &SubmissionRequest) -> Option<String> {
        let place = value.as_text().filter(|v| !v.is_empty())?;
        Some(SelectStyle::Clause.render(&format!("{}=1", place)))
    }

    fn options(&self, _nodes: &[&PbsNode], _queues: &[&PbsQueue]) -> Option<Vec<FieldOption>> {
        Some(
            PLACES
                .iter()
                .map(|(value, label)| FieldOption::labeled(*value, *label))
                .collect(),
        )
    }
}

/// Minimum SPEC performance rating of the node
pub struct SpecField {
    descriptor: FieldDescriptor,
}

impl SpecField {
    pub fn new(descriptor: FieldDescriptor) -> Self {
        Self { descriptor }
    }
}

impl QsubField for SpecField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_eligible(&self, node: &PbsNode, value: &FieldValue, _ctx: &EvalContext<'_>) -> bool {
        match value.as_number() {
            Some(requested) if requested > 0.0 => parse_float(node.available("spec")) >= requested,
            Some(_) => true,
            None => false,
        }
    }

    fn fragment(&self, value: &FieldValue, _request: &SubmissionRequest) -> Option<String> {
        let spec = value.as_number().filter(|&s| s > 0.0)?;
        Some(SelectStyle::Clause.render(&format!("spec>={}", format_number(spec))))
    }

    fn options(&self, nodes: &[&PbsNode], _queues: &[&PbsQueue]) -> Option<Vec<FieldOption>> {
        let mut specs: Vec<f64> = nodes
            .iter()
            .map(|n| parse_float(n.available("spec")))
            .filter(|&s| s > 0.0)
            .collect();
        specs.sort_by(f64::total_cmp);
        specs.dedup();
        Some(specs.into_iter().map(FieldOption::Number).collect())
    }
}
