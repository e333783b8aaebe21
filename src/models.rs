//! Data model shared by the assembler, the queue access list and the HTTP layer
//!
//! PBS entities are kept exactly as the collector dumps them: a name plus a flat
//! string-keyed attribute map. Submission values are a closed sum type so every
//! field implementation matches on shape instead of probing loosely typed JSON.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Prefix of the per-node advertised resources (`resources_available.ncpus`, ...)
pub const AVAILABLE_PREFIX: &str = "resources_available.";

/// Prefix of the per-node assigned resources (`resources_assigned.ncpus`, ...)
pub const ASSIGNED_PREFIX: &str = "resources_assigned.";

/// A PBS entity (node, queue, server...) as collected from the scheduler
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PbsEntity {
    /// Entity name (node hostname, queue name)
    pub name: String,

    /// Raw attributes; every value is a string
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// A PBS execution host
pub type PbsNode = PbsEntity;

/// A PBS queue (Execution or Route)
pub type PbsQueue = PbsEntity;

impl PbsEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    /// Builder-style attribute setter, mostly useful when assembling fixtures
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Raw attribute lookup
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Lookup of `resources_available.<resource>`
    pub fn available(&self, resource: &str) -> Option<&str> {
        self.attr(&format!("{}{}", AVAILABLE_PREFIX, resource))
    }

    /// Lookup of `resources_assigned.<resource>`
    pub fn assigned(&self, resource: &str) -> Option<&str> {
        self.attr(&format!("{}{}", ASSIGNED_PREFIX, resource))
    }

    /// Short hostname: everything before the first dot
    pub fn hostname(&self) -> &str {
        short_hostname(&self.name)
    }
}

/// Strip the domain part of a host name
pub fn short_hostname(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Memory units accepted in submission requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SizeUnit {
    Kb,
    Mb,
    #[default]
    Gb,
    Tb,
}

impl SizeUnit {
    /// Lowercase suffix used by PBS (`kb`, `mb`, `gb`, `tb`)
    pub fn suffix(&self) -> &'static str {
        match self {
            SizeUnit::Kb => "kb",
            SizeUnit::Mb => "mb",
            SizeUnit::Gb => "gb",
            SizeUnit::Tb => "tb",
        }
    }

    /// Factor converting an amount in this unit to gigabytes
    pub fn gb_factor(&self) -> f64 {
        match self {
            SizeUnit::Kb => 1.0 / (1024.0 * 1024.0),
            SizeUnit::Mb => 1.0 / 1024.0,
            SizeUnit::Gb => 1.0,
            SizeUnit::Tb => 1024.0,
        }
    }
}

impl From<String> for SizeUnit {
    /// Unrecognised units fall back to gigabytes
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "kb" => SizeUnit::Kb,
            "mb" => SizeUnit::Mb,
            "tb" => SizeUnit::Tb,
            _ => SizeUnit::Gb,
        }
    }
}

impl From<SizeUnit> for String {
    fn from(value: SizeUnit) -> Self {
        value.suffix().to_string()
    }
}

impl fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A memory quantity as entered in the form: `{"amount": 8, "unit": "gb"}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryAmount {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: f64,
    #[serde(default)]
    pub unit: SizeUnit,
}

impl MemoryAmount {
    pub fn new(amount: f64, unit: SizeUnit) -> Self {
        Self { amount, unit }
    }

    /// Amount normalised to gigabytes
    pub fn as_gb(&self) -> f64 {
        self.amount * self.unit.gb_factor()
    }

    /// Zero (or negative) amounts count as "not requested"
    pub fn is_empty(&self) -> bool {
        !(self.amount > 0.0)
    }

    /// PBS resource value, e.g. `8gb` or `400mb`
    pub fn to_pbs(&self) -> String {
        format!("{}{}", format_number(self.amount), self.unit.suffix())
    }
}

/// Form inputs send amounts as numbers or as (possibly empty) strings
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
        Null(()),
    }

    Ok(match Amount::deserialize(deserializer)? {
        Amount::Number(n) => n,
        Amount::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Amount::Null(()) => 0.0,
    })
}

/// A single submitted field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
    Size(MemoryAmount),
}

impl FieldValue {
    /// Whether the value counts as "not provided" for filtering and assembly
    pub fn is_absent(&self) -> bool {
        match self {
            FieldValue::Flag(_) | FieldValue::Number(_) => false,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Size(size) => size.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Memory-shaped view; a bare number is read as gigabytes
    pub fn as_size(&self) -> Option<MemoryAmount> {
        match self {
            FieldValue::Size(size) => Some(*size),
            FieldValue::Number(n) => Some(MemoryAmount::new(*n, SizeUnit::Gb)),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

impl From<MemoryAmount> for FieldValue {
    fn from(value: MemoryAmount) -> Self {
        FieldValue::Size(value)
    }
}

/// Render a number the way PBS expects it: integral values without a fraction
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// A submission request: field name to value, one per preview call
///
/// JSON `null` entries are dropped on deserialisation so they behave exactly
/// like missing keys.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "HashMap<String, Option<FieldValue>>")]
pub struct SubmissionRequest {
    values: HashMap<String, FieldValue>,
}

impl From<HashMap<String, Option<FieldValue>>> for SubmissionRequest {
    fn from(raw: HashMap<String, Option<FieldValue>>) -> Self {
        Self {
            values: raw
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v)))
                .collect(),
        }
    }
}

impl SubmissionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Raw value, including absent-looking ones such as `""`
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Value only if it counts as provided
    pub fn present(&self, name: &str) -> Option<&FieldValue> {
        self.get(name).filter(|v| !v.is_absent())
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.present(name).and_then(FieldValue::as_text)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.present(name).and_then(FieldValue::as_number)
    }

    pub fn size(&self, name: &str) -> Option<MemoryAmount> {
        self.present(name)
            .and_then(FieldValue::as_size)
            .filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Role of the calling user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

/// Identity of the caller, used for queue ACL checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub username: String,
    #[serde(default)]
    pub role: UserRole,
}

impl UserContext {
    pub fn new(username: impl Into<String>, role: UserRole) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Username without the `@realm` part
    pub fn username_base(&self) -> &str {
        self.username.split('@').next().unwrap_or(&self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialization_drops_nulls() {
        let json = r#"{
            "walltime": "02:00:00",
            "ncpu": 4,
            "memory": {"amount": 8, "unit": "gb"},
            "cgroups": ["cpuacct", "memory"],
            "singularity": true,
            "cluster": null
        }"#;

        let request: SubmissionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.text("walltime"), Some("02:00:00"));
        assert_eq!(request.number("ncpu"), Some(4.0));
        assert_eq!(
            request.size("memory"),
            Some(MemoryAmount::new(8.0, SizeUnit::Gb))
        );
        assert_eq!(
            request.get("cgroups"),
            Some(&FieldValue::List(vec![
                "cpuacct".to_string(),
                "memory".to_string()
            ]))
        );
        assert_eq!(request.get("singularity"), Some(&FieldValue::Flag(true)));
        assert!(request.get("cluster").is_none());
    }

    #[test]
    fn test_memory_amount_accepts_strings_and_unknown_units() {
        let size: MemoryAmount = serde_json::from_str(r#"{"amount": "", "unit": "mb"}"#).unwrap();
        assert!(size.is_empty());

        let size: MemoryAmount =
            serde_json::from_str(r#"{"amount": "16", "unit": "GiB"}"#).unwrap();
        assert_eq!(size.amount, 16.0);
        assert_eq!(size.unit, SizeUnit::Gb);
    }

    #[test]
    fn test_empty_object_is_absent() {
        let request: SubmissionRequest = serde_json::from_str(r#"{"memory": {}}"#).unwrap();
        assert!(request.get("memory").unwrap().is_absent());
        assert!(request.size("memory").is_none());
    }

    #[test]
    fn test_size_unit_conversion() {
        assert_eq!(MemoryAmount::new(1024.0, SizeUnit::Mb).as_gb(), 1.0);
        assert_eq!(MemoryAmount::new(1.0, SizeUnit::Tb).as_gb(), 1024.0);
        assert_eq!(MemoryAmount::new(400.0, SizeUnit::Mb).to_pbs(), "400mb");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-1.0), "-1");
    }

    #[test]
    fn test_username_base() {
        let user = UserContext::new("alice@META", UserRole::User);
        assert_eq!(user.username_base(), "alice");
        assert!(!user.is_admin());
    }

    #[test]
    fn test_entity_lookups() {
        let node = PbsEntity::new("zenon1.cerit-sc.cz")
            .with_attr("resources_available.ncpus", "32")
            .with_attr("resources_assigned.ncpus", "8");
        assert_eq!(node.available("ncpus"), Some("32"));
        assert_eq!(node.assigned("ncpus"), Some("8"));
        assert_eq!(node.hostname(), "zenon1");
        assert!(node.available("ngpus").is_none());
    }
}
