//! Parsing of PBS attribute strings
//!
//! PBS reports every attribute as free text: integers, sizes with a unit
//! suffix, comma-separated lists and `True`/`False`. Everything here is total:
//! malformed input degrades to `0`, `None` or an empty list.

use regex::Regex;
use std::sync::LazyLock;

static SIZE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*(gb|mb|tb|kb)?$").expect("valid size regex")
});

static MEMORY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)\s*([a-z]+)$").expect("valid memory regex"));

/// Parse a PBS size (e.g. "515862kb", "16gb", "1.5tb") to gigabytes
///
/// A missing unit means gigabytes. Unparseable input yields 0.
pub fn parse_size(size: &str) -> f64 {
    let Some(captures) = SIZE_REGEX.captures(size.trim()) else {
        return 0.0;
    };
    let value: f64 = captures[1].parse().unwrap_or(0.0);
    let unit = captures
        .get(2)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| "gb".to_string());

    match unit.as_str() {
        "tb" => value * 1024.0,
        "mb" => value / 1024.0,
        "kb" => value / (1024.0 * 1024.0),
        _ => value,
    }
}

/// Lenient memory parse used for node totals (e.g. "515862mb", "1536 GiB")
///
/// Bare integers are bytes. The result is in gigabytes, rounded to two decimals.
pub fn parse_memory_gb(memory: &str) -> Option<f64> {
    let memory = memory.trim();
    if memory.is_empty() {
        return None;
    }

    if let Some(captures) = MEMORY_REGEX.captures(memory) {
        let value: f64 = captures[1].parse().ok()?;
        let gb = match captures[2].to_lowercase().as_str() {
            "b" | "bytes" => value / (1024.0 * 1024.0 * 1024.0),
            "k" | "kb" => value / (1024.0 * 1024.0),
            "m" | "mb" => value / 1024.0,
            "t" | "tb" | "tib" => value * 1024.0,
            _ => value,
        };
        return Some(round2(gb));
    }

    let bytes = parse_leading_int(memory)?;
    Some(round2(bytes as f64 / (1024.0 * 1024.0 * 1024.0)))
}

/// Parse a count attribute ("32", "4") with 0 as the fallback
pub fn parse_count(value: Option<&str>) -> i64 {
    value.and_then(parse_leading_int).unwrap_or(0)
}

/// Parse a float attribute ("12.4") with 0 as the fallback
pub fn parse_float(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Integer prefix of a string, mirroring how PBS counts are usually written
fn parse_leading_int(value: &str) -> Option<i64> {
    let value = value.trim();
    let end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

/// Split a comma-separated attribute, trimming items and dropping empties
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// PBS booleans are the literal strings "True" and "False"
pub fn is_true(value: Option<&str>) -> bool {
    value == Some("True")
}

/// Round to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
