//! `qsub` command line and `#PBS` script assembly
//!
//! Fields contribute fragments in registry order. Selection fragments from
//! different fields are merged into one `select=1:...` chunk so the job asks
//! for a single node satisfying all of them.

use super::registry::FieldRegistry;
use crate::models::SubmissionRequest;

const SELECT_PREFIX: &str = "-l select=";

/// Resource parts of the single `select` chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectClause {
    parts: Vec<String>,
}

impl SelectClause {
    /// Add the resources of a full `-l select=N:...` fragment; the chunk count
    /// is always 1, whatever the fragment says
    pub fn merge(&mut self, fragment: &str) {
        let body = fragment.strip_prefix(SELECT_PREFIX).unwrap_or(fragment);
        self.push_parts(body.split(':').skip(1));
    }

    /// Add a `:resource=value` continuation
    pub fn extend(&mut self, continuation: &str) {
        self.push_parts(continuation.split(':'));
    }

    fn push_parts<'a>(&mut self, parts: impl Iterator<Item = &'a str>) {
        self.parts.extend(
            parts
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// `select=1:<parts>`
    pub fn render(&self) -> String {
        let mut select = String::from("select=1");
        for part in &self.parts {
            select.push(':');
            select.push_str(part);
        }
        select
    }
}

/// Command line and script produced from one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledCommand {
    pub command: String,
    pub script: String,
}

/// Walk the registry once and render both outputs
pub fn assemble(
    registry: &FieldRegistry,
    request: &SubmissionRequest,
    job_name: &str,
) -> AssembledCommand {
    let mut flags: Vec<String> = Vec::new();
    let mut select: Option<SelectClause> = None;

    for field in registry.fields() {
        let Some(value) = request.present(field.name()) else {
            continue;
        };
        let Some(fragment) = field.fragment(value, request) else {
            continue;
        };

        if fragment.starts_with(SELECT_PREFIX) {
            select.get_or_insert_with(SelectClause::default).merge(&fragment);
        } else if fragment.starts_with(':') {
            select.get_or_insert_with(SelectClause::default).extend(&fragment);
        } else {
            flags.push(fragment);
        }
    }

    let select = select.map(|s| s.render());

    let mut command = vec!["qsub".to_string()];
    command.extend(flags.iter().cloned());
    if let Some(select) = &select {
        command.push(format!("-l {}", select));
    }

    let mut script = vec!["#!/bin/bash".to_string()];
    script.extend(flags.iter().map(|flag| format!("#PBS {}", flag)));
    if let Some(select) = &select {
        script.push(format!("#PBS -l {}", select));
    }
    script.push(format!("#PBS -N {}", job_name));
    script.push(String::new());

    AssembledCommand {
        command: command.join(" "),
        script: script.join("\n"),
    }
}
