//! Package consumer validation.
//!
//! A produced package is only trusted once a separate consumer recipe
//! builds against it. The consumer's single dependency is the package at
//! its exact version; it runs Configure, Generate and Build through the
//! usual [`Orchestrator`], and its binary is executed when the host can
//! run binaries for the target platform.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::anyhow;
use serde::Serialize;

use crate::builder::tool::{BuildTool, ToolRequest, ToolStage};
use crate::builder::variables::{cross_compile_variables, generate_variables};
use crate::core::option::OptionOverrides;
use crate::core::platform::Platform;
use crate::core::recipe::{PackageIdentity, Recipe};
use crate::ops::lifecycle::{
    LifecycleSettings, LifecycleStage, Orchestrator, StageError, StageRecord, StageStatus,
};
use crate::resolver::{resolve_dependencies, DependencyDatabase};

/// How validation ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// The consumer binary ran and exited with 0.
    Passed { executable: String },
    /// The consumer was built but cannot run here.
    Skipped { reason: String },
}

/// Result of validating a package.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub consumer: PackageIdentity,
    #[serde(flatten)]
    pub outcome: ValidationOutcome,
    pub stages: Vec<StageRecord>,
}

impl ValidationReport {
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, ValidationOutcome::Skipped { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ValidationSettings {
    /// Work directory for the consumer build.
    pub build_dir: PathBuf,
    pub build_type: String,
    pub jobs: Option<usize>,
    pub generator: Option<String>,
    /// Platform the consumer is built for.
    pub platform: Platform,
    /// Platform this process runs on.
    pub host: Platform,
}

/// Build `consumer` against the package store and run it when possible.
///
/// Every failure, including one inside the consumer's own build, is
/// reported as [`StageError::ValidationFailed`].
pub fn validate_package(
    consumer: &Recipe,
    db: &dyn DependencyDatabase,
    tool: &mut dyn BuildTool,
    settings: &ValidationSettings,
) -> Result<ValidationReport, StageError> {
    let fail = |e: anyhow::Error| StageError::new(LifecycleStage::ValidatePackage, e);
    tracing::info!("validating package with {}", consumer.identity());

    let executable = consumer
        .hooks()
        .test_binary
        .clone()
        .ok_or_else(|| fail(anyhow!("consumer {} declares no executable to run", consumer.identity())))?;

    let config = consumer
        .options()
        .resolve(&OptionOverrides::new(), &settings.platform)
        .map_err(|e| fail(e.into()))?;
    let dependencies = resolve_dependencies(consumer, &config, db).map_err(|e| fail(e.into()))?;
    let mut variables = generate_variables(consumer, &config).map_err(|e| fail(e.into()))?;
    variables.extend(cross_compile_variables(&settings.platform, &settings.host));

    let lifecycle = LifecycleSettings {
        build_dir: settings.build_dir.clone(),
        install_prefix: None,
        skip_tests: true,
        build_type: settings.build_type.clone(),
        jobs: settings.jobs,
        generator: settings.generator.clone(),
        platform: settings.platform,
    };
    let report = Orchestrator::new(consumer, &config, variables, &dependencies, &mut *tool, lifecycle)
        .run()
        .map_err(|e| fail(anyhow::Error::new(e).context(format!("building {}", consumer.identity()))))?;
    let mut stages = report.stages;

    if !settings.platform.can_run_on(&settings.host) {
        let reason = format!(
            "{} binaries cannot run on this {} host",
            settings.platform, settings.host
        );
        tracing::warn!("skipping package validation: {}", reason);
        stages.push(StageRecord {
            stage: LifecycleStage::ValidatePackage,
            status: StageStatus::Skipped {
                reason: reason.clone(),
            },
            duration: Default::default(),
            warnings: Vec::new(),
        });
        return Ok(ValidationReport {
            consumer: consumer.identity().clone(),
            outcome: ValidationOutcome::Skipped { reason },
            stages,
        });
    }

    let request = ToolRequest {
        executable: Some(executable.clone()),
        build_type: settings.build_type.clone(),
        ..ToolRequest::new(consumer.root(), &settings.build_dir)
    };
    let start = Instant::now();
    tool.invoke(ToolStage::Run, &request)
        .map_err(|e| StageError::new(LifecycleStage::ValidatePackage, e))?;
    stages.push(StageRecord {
        stage: LifecycleStage::ValidatePackage,
        status: StageStatus::Passed,
        duration: start.elapsed(),
        warnings: Vec::new(),
    });

    Ok(ValidationReport {
        consumer: consumer.identity().clone(),
        outcome: ValidationOutcome::Passed { executable },
        stages,
    })
}
