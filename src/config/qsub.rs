//! Assembler configuration

use serde::{Deserialize, Serialize};

use crate::qsub::fit::UnmatchedNodePolicy;

/// Configuration for command assembly and the node preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QsubConfig {
    /// Job name written into the `#PBS -N` directive
    pub job_name: String,

    /// Domain appended to the PBS server name in queue options
    pub queue_server_suffix: String,

    /// Qualified nodes missing from the infrastructure view
    pub unmatched_nodes: UnmatchedNodePolicy,
}

impl Default for QsubConfig {
    fn default() -> Self {
        Self {
            job_name: "my_awesome_job".to_string(),
            queue_server_suffix: ".metacentrum.cz".to_string(),
            unmatched_nodes: UnmatchedNodePolicy::Drop,
        }
    }
}
