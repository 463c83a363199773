//! The lifecycle orchestrator.
//!
//! A recipe becomes an installable package through a fixed sequence of
//! stages:
//!
//! ```text
//! Configure -> Generate -> Build -> Test? -> Package
//! ```
//!
//! Each stage starts only after the previous one succeeded. The first
//! failure ends the run; nothing is retried or rolled back, and the work
//! directory is left as it is for inspection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use serde::Serialize;
use thiserror::Error;

use crate::builder::generate::{
    generators_dir, toolchain_path, write_dependency_files, write_toolchain,
};
use crate::builder::tool::{BuildTool, ToolError, ToolRequest, ToolStage};
use crate::builder::variables::{BuildVariables, GenerateError};
use crate::core::dependency::DependencyKind;
use crate::core::option::ResolvedConfiguration;
use crate::core::platform::Platform;
use crate::core::recipe::{PackageIdentity, Recipe};
use crate::resolver::database::{PackageInfo, PropagatedRequirement, PACKAGE_INFO_FILE};
use crate::resolver::ActiveDependency;
use crate::util::fs::{ensure_dir, files_with_extensions, write_string};
use crate::util::hash::Fingerprint;

/// One ordered phase of turning a recipe into a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Configure,
    Generate,
    Build,
    Test,
    Package,
    ValidatePackage,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleStage::Configure => write!(f, "configure"),
            LifecycleStage::Generate => write!(f, "generate"),
            LifecycleStage::Build => write!(f, "build"),
            LifecycleStage::Test => write!(f, "test"),
            LifecycleStage::Package => write!(f, "package"),
            LifecycleStage::ValidatePackage => write!(f, "validate-package"),
        }
    }
}

/// The underlying failure of a stage.
#[derive(Debug, Error)]
pub enum StageCause {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A stage failed; the run stopped there.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("configuration failed")]
    ConfigurationFailed(#[source] StageCause),

    #[error("generation failed")]
    GenerationFailed(#[source] StageCause),

    #[error("build failed")]
    BuildFailed(#[source] StageCause),

    #[error("tests failed")]
    TestFailed(#[source] StageCause),

    #[error("packaging failed")]
    PackagingFailed(#[source] StageCause),

    #[error("package validation failed")]
    ValidationFailed(#[source] StageCause),
}

impl StageError {
    pub fn new(stage: LifecycleStage, cause: impl Into<StageCause>) -> Self {
        let cause = cause.into();
        match stage {
            LifecycleStage::Configure => StageError::ConfigurationFailed(cause),
            LifecycleStage::Generate => StageError::GenerationFailed(cause),
            LifecycleStage::Build => StageError::BuildFailed(cause),
            LifecycleStage::Test => StageError::TestFailed(cause),
            LifecycleStage::Package => StageError::PackagingFailed(cause),
            LifecycleStage::ValidatePackage => StageError::ValidationFailed(cause),
        }
    }

    /// The stage that failed.
    pub fn stage(&self) -> LifecycleStage {
        match self {
            StageError::ConfigurationFailed(_) => LifecycleStage::Configure,
            StageError::GenerationFailed(_) => LifecycleStage::Generate,
            StageError::BuildFailed(_) => LifecycleStage::Build,
            StageError::TestFailed(_) => LifecycleStage::Test,
            StageError::PackagingFailed(_) => LifecycleStage::Package,
            StageError::ValidationFailed(_) => LifecycleStage::ValidatePackage,
        }
    }

    pub fn cause(&self) -> &StageCause {
        match self {
            StageError::ConfigurationFailed(cause)
            | StageError::GenerationFailed(cause)
            | StageError::BuildFailed(cause)
            | StageError::TestFailed(cause)
            | StageError::PackagingFailed(cause)
            | StageError::ValidationFailed(cause) => cause,
        }
    }
}

/// Outcome of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Passed,
    Skipped { reason: String },
    Failed { message: String },
}

/// Record of one stage of a run.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: LifecycleStage,

    #[serde(flatten)]
    pub status: StageStatus,

    /// Wall time (milliseconds in JSON)
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,

    /// Problems that did not fail the stage
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl StageRecord {
    pub fn passed(&self) -> bool {
        self.status == StageStatus::Passed
    }

    pub fn skipped(&self) -> bool {
        matches!(self.status, StageStatus::Skipped { .. })
    }
}

/// Invocation-wide settings that do not come from the recipe.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    /// Work directory, owned by this run.
    pub build_dir: PathBuf,
    /// Where the Package stage installs to.
    pub install_prefix: Option<PathBuf>,
    /// External directive that bypasses the Test stage.
    pub skip_tests: bool,
    pub build_type: String,
    pub jobs: Option<usize>,
    pub generator: Option<String>,
    /// Target platform.
    pub platform: Platform,
}

impl LifecycleSettings {
    pub fn new(build_dir: impl Into<PathBuf>, platform: Platform) -> Self {
        LifecycleSettings {
            build_dir: build_dir.into(),
            install_prefix: None,
            skip_tests: false,
            build_type: "Release".to_string(),
            jobs: None,
            generator: None,
            platform,
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleReport {
    pub package: PackageIdentity,
    pub package_id: String,
    pub build_dir: PathBuf,
    /// Install prefix for packaging recipes, the build directory otherwise.
    pub artifact_location: PathBuf,
    /// What the package exports, when one was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_info: Option<PackageInfo>,
    pub stages: Vec<StageRecord>,
}

impl LifecycleReport {
    pub fn record(&self, stage: LifecycleStage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }
}

/// Fingerprint of a package identity and the inputs it was built with.
pub fn package_id(recipe: &Recipe, config: &ResolvedConfiguration, platform: &Platform) -> String {
    let mut fp = Fingerprint::new();
    fp.update_pair("package", &recipe.identity().to_string())
        .update_pair("platform", &platform.to_string());
    for (name, value) in config.iter() {
        fp.update_pair(name, &value.to_string());
    }
    fp.finish()
}

/// Sequences the stages of one run.
///
/// Consumed by [`Orchestrator::run`]; a new instance is needed for every
/// invocation.
pub struct Orchestrator<'a> {
    recipe: &'a Recipe,
    config: &'a ResolvedConfiguration,
    variables: BuildVariables,
    dependencies: &'a [ActiveDependency],
    tool: &'a mut dyn BuildTool,
    settings: LifecycleSettings,
    records: Vec<StageRecord>,
    /// Warnings raised by the stage in progress.
    pending_warnings: Vec<String>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        recipe: &'a Recipe,
        config: &'a ResolvedConfiguration,
        variables: BuildVariables,
        dependencies: &'a [ActiveDependency],
        tool: &'a mut dyn BuildTool,
        settings: LifecycleSettings,
    ) -> Self {
        Orchestrator {
            recipe,
            config,
            variables,
            dependencies,
            tool,
            settings,
            records: Vec::new(),
            pending_warnings: Vec::new(),
        }
    }

    /// Run every stage in order, stopping at the first failure.
    pub fn run(mut self) -> Result<LifecycleReport, StageError> {
        tracing::info!(
            "building {} for {} ({})",
            self.recipe.identity(),
            self.settings.platform,
            self.tool.name()
        );

        self.stage(LifecycleStage::Configure, |this| this.configure())?;
        self.stage(LifecycleStage::Generate, |this| this.generate())?;
        self.stage(LifecycleStage::Build, |this| {
            let request = this.request();
            this.tool.invoke(ToolStage::Build, &request)?;
            Ok(())
        })?;

        match self.test_skip_reason() {
            None => self.stage(LifecycleStage::Test, |this| this.test())?,
            Some(reason) => self.skip(LifecycleStage::Test, reason),
        }

        let package_info = if self.recipe.hooks().packages {
            Some(self.stage(LifecycleStage::Package, |this| this.package())?)
        } else {
            self.skip(LifecycleStage::Package, "consumer recipes are not packaged");
            None
        };

        let artifact_location = match (&package_info, &self.settings.install_prefix) {
            (Some(_), Some(prefix)) => prefix.clone(),
            _ => self.settings.build_dir.clone(),
        };
        tracing::info!("{} ready at {}", self.recipe.identity(), artifact_location.display());

        Ok(LifecycleReport {
            package: self.recipe.identity().clone(),
            package_id: package_id(self.recipe, self.config, &self.settings.platform),
            build_dir: self.settings.build_dir.clone(),
            artifact_location,
            package_info,
            stages: self.records,
        })
    }

    fn stage<T>(
        &mut self,
        stage: LifecycleStage,
        f: impl FnOnce(&mut Self) -> Result<T, StageCause>,
    ) -> Result<T, StageError> {
        let span = tracing::info_span!("stage", %stage);
        let _guard = span.enter();
        tracing::debug!("starting");

        let start = Instant::now();
        let result = f(self);
        let duration = start.elapsed();
        let warnings = std::mem::take(&mut self.pending_warnings);

        match result {
            Ok(value) => {
                tracing::debug!("finished in {:.2?}", duration);
                self.records.push(StageRecord {
                    stage,
                    status: StageStatus::Passed,
                    duration,
                    warnings,
                });
                Ok(value)
            }
            Err(cause) => {
                tracing::error!("{} failed: {}", stage, cause);
                self.records.push(StageRecord {
                    stage,
                    status: StageStatus::Failed {
                        message: cause.to_string(),
                    },
                    duration,
                    warnings,
                });
                Err(StageError::new(stage, cause))
            }
        }
    }

    fn skip(&mut self, stage: LifecycleStage, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::info!("skipping {}: {}", stage, reason);
        self.records.push(StageRecord {
            stage,
            status: StageStatus::Skipped { reason },
            duration: Duration::ZERO,
            warnings: Vec::new(),
        });
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.pending_warnings.push(message);
    }

    /// Base request shared by every stage.
    fn request(&self) -> ToolRequest {
        let mut prefix_path = vec![generators_dir(&self.settings.build_dir)];
        prefix_path.extend(self.dependencies.iter().map(|d| d.artifact().root().to_path_buf()));

        ToolRequest {
            source_dir: self.recipe.root().to_path_buf(),
            build_dir: self.settings.build_dir.clone(),
            variables: self.variables.clone(),
            prefix_path,
            build_type: self.settings.build_type.clone(),
            jobs: self.settings.jobs,
            generator: self.settings.generator.clone(),
            ..ToolRequest::default()
        }
    }

    /// Work directory, cache script and a tool check. Nothing here needs
    /// the dependency files yet.
    fn configure(&mut self) -> Result<(), StageCause> {
        ensure_dir(&self.settings.build_dir)?;
        let toolchain = write_toolchain(
            &self.settings.build_dir,
            self.recipe,
            &self.variables,
            self.dependencies,
        )?;
        let request = ToolRequest {
            toolchain_file: Some(toolchain),
            ..self.request()
        };
        self.tool.invoke(ToolStage::Configure, &request)?;
        Ok(())
    }

    /// Dependency files first, then the tool configures the source tree.
    fn generate(&mut self) -> Result<(), StageCause> {
        let files = write_dependency_files(
            &self.settings.build_dir,
            self.recipe,
            self.dependencies,
            self.settings.platform.os,
        )?;
        tracing::debug!("{} package configs in {}", files.package_configs.len(), files.dir.display());

        let request = ToolRequest {
            toolchain_file: Some(toolchain_path(&self.settings.build_dir)),
            ..self.request()
        };
        self.tool.invoke(ToolStage::Generate, &request)?;
        Ok(())
    }

    /// `None` when the Test stage should run.
    fn test_skip_reason(&self) -> Option<String> {
        let hooks = self.recipe.hooks();
        if !hooks.tests_requested(self.config) {
            Some("tests are not enabled".to_string())
        } else if self.settings.skip_tests {
            Some("skip-tests directive is set".to_string())
        } else if hooks.test_binary.is_none() {
            Some("recipe declares no test binary".to_string())
        } else {
            None
        }
    }

    fn test(&mut self) -> Result<(), StageCause> {
        let request = ToolRequest {
            executable: self.recipe.hooks().test_binary.clone(),
            ..self.request()
        };
        self.tool.invoke(ToolStage::Test, &request)?;
        Ok(())
    }

    fn package(&mut self) -> Result<PackageInfo, StageCause> {
        let prefix = self
            .settings
            .install_prefix
            .clone()
            .ok_or_else(|| anyhow!("no install prefix configured"))?;

        let request = ToolRequest {
            install_prefix: Some(prefix.clone()),
            ..self.request()
        };
        self.tool.invoke(ToolStage::Install, &request)?;

        let info = self.package_info();
        for missing in missing_libs(&prefix.join(&info.lib_dir), &info.libs, &self.settings) {
            self.warn(format!(
                "library `{}` is declared but was not installed into {}",
                missing,
                prefix.join(&info.lib_dir).display()
            ));
        }

        let json = serde_json::to_string_pretty(&info).map_err(GenerateError::from)?;
        write_string(&prefix.join(PACKAGE_INFO_FILE), &json)?;
        Ok(info)
    }

    /// Identity exported to consumers.
    fn package_info(&self) -> PackageInfo {
        let mut info = PackageInfo::new(self.recipe.name(), self.recipe.version().clone());
        info.package_id = package_id(self.recipe, self.config, &self.settings.platform);
        info.libs = self.recipe.libs();
        info.requires = self
            .dependencies
            .iter()
            .filter(|d| d.kind() == DependencyKind::Requires)
            .map(|d| PropagatedRequirement::from(d.dependency()))
            .collect();
        info.options = self.config.values().clone();
        info
    }
}

fn missing_libs<'l>(lib_dir: &Path, libs: &'l [String], settings: &LifecycleSettings) -> Vec<&'l str> {
    let files = files_with_extensions(lib_dir, settings.platform.os.library_extensions());
    libs.iter()
        .filter(|lib| {
            !files.iter().any(|f| {
                f.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|stem| stem == lib.as_str() || stem == format!("lib{}", lib))
            })
        })
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::variables::generate_variables;
    use crate::core::option::OptionOverrides;
    use crate::core::platform::{Arch, Os};
    use crate::resolver::{resolve_dependencies, LocalPackageStore};
    use crate::test_support::fixtures::{base_database, base_recipe};
    use crate::test_support::{failure, MockBuildTool};
    use tempfile::TempDir;

    fn linux() -> Platform {
        Platform::new(Os::Linux, Arch::X86_64)
    }

    struct Run {
        tmp: TempDir,
        tool: MockBuildTool,
        result: Result<LifecycleReport, StageError>,
    }

    fn run_with(pairs: &[&str], skip_tests: bool, tool: MockBuildTool) -> Run {
        let recipe = base_recipe();
        let overrides = OptionOverrides::from_pairs(pairs.iter().copied()).unwrap();
        let config = recipe.options().resolve(&overrides, &linux()).unwrap();
        let vars = generate_variables(&recipe, &config).unwrap();
        let deps = resolve_dependencies(&recipe, &config, &base_database()).unwrap();

        let tmp = TempDir::new().unwrap();
        let mut settings = LifecycleSettings::new(tmp.path().join("build"), linux());
        settings.install_prefix = Some(tmp.path().join("store/base/1.0.0"));
        settings.skip_tests = skip_tests;

        let mut tool = tool;
        let result = Orchestrator::new(&recipe, &config, vars, &deps, &mut tool, settings).run();
        Run { tmp, tool, result }
    }

    #[test]
    fn test_defaults_run_every_stage() {
        let run = run_with(&[], false, MockBuildTool::new().installs_lib("libbase.a"));
        let report = run.result.unwrap();

        assert_eq!(
            run.tool.stages(),
            vec![
                ToolStage::Configure,
                ToolStage::Generate,
                ToolStage::Build,
                ToolStage::Test,
                ToolStage::Install,
            ]
        );
        assert!(report.record(LifecycleStage::Test).unwrap().passed());
        assert_eq!(report.artifact_location, run.tmp.path().join("store/base/1.0.0"));
        assert!(report.record(LifecycleStage::Package).unwrap().warnings.is_empty());

        let test_request = run.tool.request(ToolStage::Test).unwrap();
        assert_eq!(test_request.executable.as_deref(), Some("base_tests"));
    }

    #[test]
    fn test_configure_failure_short_circuits() {
        let tool = MockBuildTool::new().fail_on(ToolStage::Configure, failure("CMake Error"));
        let run = run_with(&[], false, tool);

        let err = run.result.unwrap_err();
        assert_eq!(err.stage(), LifecycleStage::Configure);
        assert!(matches!(err, StageError::ConfigurationFailed(StageCause::Tool(_))));
        assert_eq!(run.tool.stages(), vec![ToolStage::Configure]);
        assert!(!run.tmp.path().join("build/generators/spdlog-config.cmake").exists());
    }

    #[test]
    fn test_skip_tests_still_packages() {
        let run = run_with(&["enable_tests=True"], true, MockBuildTool::new());
        let report = run.result.unwrap();

        assert!(!run.tool.stages().contains(&ToolStage::Test));
        assert!(report.record(LifecycleStage::Test).unwrap().skipped());
        assert!(report.record(LifecycleStage::Package).unwrap().passed());
        assert!(run.tmp.path().join("store/base/1.0.0/package.json").is_file());
    }

    #[test]
    fn test_disabled_tests_are_skipped() {
        let run = run_with(&["enable_tests=False"], false, MockBuildTool::new());
        let report = run.result.unwrap();

        assert!(!run.tool.stages().contains(&ToolStage::Test));
        assert_eq!(
            report.record(LifecycleStage::Test).unwrap().status,
            StageStatus::Skipped {
                reason: "tests are not enabled".to_string()
            }
        );
    }

    #[test]
    fn test_failures_map_to_stage() {
        let cases = [
            (ToolStage::Generate, LifecycleStage::Generate),
            (ToolStage::Build, LifecycleStage::Build),
            (ToolStage::Test, LifecycleStage::Test),
            (ToolStage::Install, LifecycleStage::Package),
        ];
        for (tool_stage, expected) in cases {
            let run = run_with(&[], false, MockBuildTool::new().fail_on(tool_stage, failure("boom")));
            let err = run.result.unwrap_err();
            assert_eq!(err.stage(), expected);
            assert_eq!(run.tool.stages().last(), Some(&tool_stage));
        }
    }

    #[test]
    fn test_stage_error_keeps_tool_diagnostic() {
        let run = run_with(
            &[],
            false,
            MockBuildTool::new().fail_on(ToolStage::Test, failure("1 test failed")),
        );
        let err = anyhow::Error::new(run.result.unwrap_err());
        let message = format!("{:#}", err);
        assert!(message.starts_with("tests failed: "));
        assert!(message.contains("1 test failed"));
    }

    #[test]
    fn test_requests_carry_variables_and_generated_files() {
        let run = run_with(&[], true, MockBuildTool::new());
        run.result.unwrap();

        let configure = run.tool.request(ToolStage::Configure).unwrap();
        assert_eq!(configure.prefix_path[0], run.tmp.path().join("build/generators"));
        assert_eq!(configure.prefix_path.len(), 7);
        assert!(configure.variables.get("BUILD_TESTING").is_some());

        let generate = run.tool.request(ToolStage::Generate).unwrap();
        let toolchain = generate.toolchain_file.as_ref().unwrap();
        assert!(toolchain.is_file());
        assert_eq!(configure.toolchain_file.as_ref(), Some(toolchain));
    }

    #[test]
    fn test_dependency_configs_exist_before_source_is_configured() {
        let run = run_with(&[], true, MockBuildTool::new());
        run.result.unwrap();

        let configure = run.tool.generated_files(ToolStage::Configure).unwrap();
        assert_eq!(configure, ["slipway_toolchain.cmake"]);

        let generate = run.tool.generated_files(ToolStage::Generate).unwrap();
        for dep in ["spdlog", "tomlplusplus", "asio", "nlohmann_json", "gtest", "benchmark"] {
            assert!(generate.contains(&format!("{}-config.cmake", dep)), "{}", dep);
        }
        assert!(generate.contains(&"slipway_deps.json".to_string()));
    }

    #[test]
    fn test_package_info_is_readable_by_store() {
        let run = run_with(&["enable_benchmarks=False"], true, MockBuildTool::new());
        let report = run.result.unwrap();

        let info = LocalPackageStore::read_info(&report.artifact_location).unwrap();
        assert_eq!(info.name, "base");
        assert_eq!(info.libs, vec!["base"]);
        assert_eq!(info.package_id, report.package_id);
        // Test requirements are not propagated.
        assert_eq!(info.requires.len(), 4);
        assert!(info.requires.iter().all(|r| r.transitive_headers));
        assert!(!info.options["enable_benchmarks"].is_enabled());
    }

    #[test]
    fn test_missing_library_is_a_warning() {
        let run = run_with(&[], true, MockBuildTool::new());
        let report = run.result.unwrap();

        let package = report.record(LifecycleStage::Package).unwrap();
        assert!(package.passed());
        assert_eq!(package.warnings.len(), 1);
        assert!(package.warnings[0].contains("`base`"));
    }

    #[test]
    fn test_package_id_depends_on_options() {
        let recipe = base_recipe();
        let resolve = |pairs: &[&str]| {
            let overrides = OptionOverrides::from_pairs(pairs.iter().copied()).unwrap();
            recipe.options().resolve(&overrides, &linux()).unwrap()
        };

        let a = package_id(&recipe, &resolve(&[]), &linux());
        let b = package_id(&recipe, &resolve(&[]), &linux());
        let c = package_id(&recipe, &resolve(&["shared=True"]), &linux());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
