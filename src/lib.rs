//! Swap Progress - step progress reconciliation for multi-phase swaps
//!
//! Reconciles the step events emitted by a cross-chain swap execution engine
//! into a stable, displayable step list and an "all completed" flag.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ingest;
pub mod metrics;
pub mod steps;
pub mod tracker;

pub use engine::{ProgressEngine, ProgressHandle, TrackerCommand};
pub use error::{ProgressError, ProgressResult};
pub use events::{EventParser, ProgressEvent};
pub use steps::{StepDescriptor, StepIdentity, StepList, StepRecord};
pub use tracker::{ListOutcome, ProgressSnapshot, ProgressTracker, SignaturePolicy};
