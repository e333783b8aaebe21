//! PBS `qsub` resource request assembler
//!
//! A registry of submission fields drives three things from one request: the
//! form configuration, the set of nodes able to run the job and the `qsub`
//! command line with its equivalent `#PBS` script header.

pub mod command;
pub mod eligibility;
pub mod fields;
pub mod fit;
pub mod options;
pub mod registry;
pub mod service;
pub mod standard;

pub use command::{AssembledCommand, SelectClause, assemble};
pub use eligibility::qualify;
pub use fields::{EvalContext, FieldDescriptor, FieldOption, QsubField};
pub use fit::{QualifiedNode, ResourceDemand, UnmatchedNodePolicy};
pub use options::{FieldConfig, QsubConfigResponse};
pub use registry::{FieldRegistry, FieldRegistryBuilder};
pub use service::{QsubPreviewResponse, QsubService};
