//! Implementation of `slipway create` and `slipway resolve`.
//!
//! Everything that can be rejected without touching the disk (option
//! overrides, dependency lookup, variable mapping) is checked first; only
//! then is a work directory created and the build tool started.

use std::path::PathBuf;

use thiserror::Error;

use crate::builder::tool::BuildTool;
use crate::builder::variables::{
    cross_compile_variables, generate_variables, BuildVariables, GenerateError,
};
use crate::core::dependency::Dependency;
use crate::core::option::{OptionError, OptionOverrides, ResolvedConfiguration};
use crate::core::platform::Platform;
use crate::core::recipe::{PackageIdentity, Recipe};
use crate::ops::lifecycle::{
    package_id, LifecycleReport, LifecycleSettings, LifecycleStage, Orchestrator, StageCause,
    StageError,
};
use crate::ops::validate::{validate_package, ValidationReport, ValidationSettings};
use crate::resolver::{
    resolve_dependencies, select_dependencies, ActiveDependency, LocalPackageStore, ResolveError,
};
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Any failure of a create invocation.
#[derive(Debug, Error)]
pub enum CreateError {
    #[error(transparent)]
    Option(#[from] OptionError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Stage(#[from] StageError),
}

impl CreateError {
    /// Whether the error was raised before any process was started.
    pub fn is_pre_build(&self) -> bool {
        !matches!(self, CreateError::Stage(_))
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            CreateError::Option(err) => {
                let diag = Diagnostic::error(err.to_string());
                match err {
                    OptionError::UnknownOption { available, .. } => diag
                        .with_context(format!("declared options: {}", available.join(", ")))
                        .with_suggestion(suggestions::LIST_OPTIONS),
                    OptionError::InvalidOptionValue { .. } => {
                        diag.with_suggestion(suggestions::LIST_OPTIONS)
                    }
                    _ => diag,
                }
            }
            CreateError::Resolve(err) => err.to_diagnostic(),
            CreateError::Generate(err) => Diagnostic::error(err.to_string()),
            CreateError::Stage(err) => {
                let mut diag = Diagnostic::error(format!("{} stage: {}", err.stage(), err));
                for line in err.cause().to_string().lines() {
                    diag = diag.with_context(line.to_string());
                }
                if let StageCause::Other(e) = err.cause() {
                    for cause in e.chain().skip(1) {
                        diag = diag.with_context(cause.to_string());
                    }
                }
                match err.stage() {
                    LifecycleStage::Test => diag
                        .with_suggestion(suggestions::TESTS_FAILED)
                        .with_suggestion(suggestions::BUILD_FAILED),
                    _ => diag.with_suggestion(suggestions::BUILD_FAILED),
                }
            }
        }
    }
}

/// Options for the create command.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    /// Invoker-supplied option values
    pub overrides: OptionOverrides,

    /// Target platform
    pub platform: Platform,

    /// Platform this process runs on
    pub host: Platform,

    /// Bypass the Test stage even when the configuration enables tests
    pub skip_tests: bool,

    pub build_type: String,

    /// Parallel jobs passed to the build tool
    pub jobs: Option<usize>,

    /// CMake generator
    pub generator: Option<String>,

    /// Parent of every work directory
    pub build_root: PathBuf,

    /// Build and run the recipe's test package afterwards
    pub validate: bool,
}

impl CreateOptions {
    pub fn new(build_root: impl Into<PathBuf>) -> Self {
        CreateOptions {
            overrides: OptionOverrides::new(),
            platform: Platform::host(),
            host: Platform::host(),
            skip_tests: false,
            build_type: "Release".to_string(),
            jobs: None,
            generator: None,
            build_root: build_root.into(),
            validate: true,
        }
    }
}

/// What a recipe resolves to, before any lookup or build.
#[derive(Debug, Clone)]
pub struct Plan {
    pub package: PackageIdentity,
    pub platform: Platform,
    pub configuration: ResolvedConfiguration,
    /// Selected dependencies, in declaration order.
    pub dependencies: Vec<Dependency>,
    pub variables: BuildVariables,
    pub package_id: String,
}

/// Result of a successful create.
#[derive(Debug, Clone)]
pub struct CreateReport {
    pub plan: Plan,
    pub dependencies: Vec<ActiveDependency>,
    pub lifecycle: LifecycleReport,
    pub validation: Option<ValidationReport>,
}

/// Resolve options, select dependencies and map build variables.
pub fn plan(
    recipe: &Recipe,
    overrides: &OptionOverrides,
    platform: Platform,
    host: Platform,
) -> Result<Plan, CreateError> {
    let configuration = recipe.options().resolve(overrides, &platform)?;
    let dependencies = select_dependencies(recipe, &configuration)
        .into_iter()
        .cloned()
        .collect();
    let mut variables = generate_variables(recipe, &configuration)?;
    variables.extend(cross_compile_variables(&platform, &host));

    Ok(Plan {
        package: recipe.identity().clone(),
        platform,
        package_id: package_id(recipe, &configuration, &platform),
        configuration,
        dependencies,
        variables,
    })
}

/// Build, test, package and validate `recipe`.
pub fn create(
    recipe: &Recipe,
    opts: &CreateOptions,
    store: &LocalPackageStore,
    tool: &mut dyn BuildTool,
) -> Result<CreateReport, CreateError> {
    let plan = plan(recipe, &opts.overrides, opts.platform, opts.host)?;
    let dependencies = resolve_dependencies(recipe, &plan.configuration, store)?;

    // Tests of a foreign target cannot run here either.
    let runnable = opts.platform.can_run_on(&opts.host);
    if !runnable && !opts.skip_tests {
        tracing::info!("{} binaries cannot run on {}; tests will be skipped", opts.platform, opts.host);
    }

    let work_dir = opts
        .build_root
        .join(format!("{}-{}", recipe.name(), &plan.package_id[..16]));
    let settings = LifecycleSettings {
        build_dir: work_dir.join("build"),
        install_prefix: Some(store.package_dir(recipe.name(), recipe.version())),
        skip_tests: opts.skip_tests || !runnable,
        build_type: opts.build_type.clone(),
        jobs: opts.jobs,
        generator: opts.generator.clone(),
        platform: opts.platform,
    };

    let lifecycle = Orchestrator::new(
        recipe,
        &plan.configuration,
        plan.variables.clone(),
        &dependencies,
        &mut *tool,
        settings,
    )
    .run()?;

    let validation = if opts.validate && lifecycle.package_info.is_some() {
        match (recipe.test_package(), recipe.test_package_dir()) {
            (Some(test_package), Some(dir)) if dir.is_dir() => {
                let consumer = Recipe::consumer_of(recipe.identity(), dir, &test_package.executable);
                let settings = ValidationSettings {
                    build_dir: work_dir.join("test_package"),
                    build_type: opts.build_type.clone(),
                    jobs: opts.jobs,
                    generator: opts.generator.clone(),
                    platform: opts.platform,
                    host: opts.host,
                };
                Some(validate_package(&consumer, store, tool, &settings)?)
            }
            (Some(_), Some(dir)) => {
                tracing::warn!(
                    "test package directory {} does not exist; skipping validation",
                    dir.display()
                );
                None
            }
            _ => None,
        }
    } else {
        None
    };

    Ok(CreateReport {
        plan,
        dependencies,
        lifecycle,
        validation,
    })
}
