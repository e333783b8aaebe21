//! qsub - PBS resource request assembler
//!
//! Given a snapshot of a PBS cluster and a job request, this crate lists the
//! nodes able to run the job, tells which of them could start it right away
//! and renders the matching `qsub` command line and `#PBS` script header.

pub mod config;
pub mod models;
pub mod pbs;
pub mod qsub;

pub use models::{
    FieldValue, MemoryAmount, PbsEntity, SizeUnit, SubmissionRequest, UserContext, UserRole,
};
