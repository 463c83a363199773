//! High-level operations.
//!
//! This module contains the implementation of slipway commands.

pub mod create;
pub mod format;
pub mod lifecycle;
pub mod validate;

pub use create::{create, plan, CreateError, CreateOptions, CreateReport, Plan};
pub use format::{format_create, format_create_json, format_plan, format_plan_json, OutputFormat};
pub use lifecycle::{
    package_id, LifecycleReport, LifecycleSettings, LifecycleStage, Orchestrator, StageCause,
    StageError, StageRecord, StageStatus,
};
pub use validate::{validate_package, ValidationOutcome, ValidationReport, ValidationSettings};
