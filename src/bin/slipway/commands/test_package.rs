//! `slipway test-package` command
//!
//! Validates a package that is already in the store without rebuilding it.

use anyhow::{bail, Result};

use super::{detect_cmake, load_recipe, target_platform, tool_settings};
use crate::cli::TestPackageArgs;
use slipway::core::{Platform, Recipe};
use slipway::ops::{validate_package, CreateError, ValidationOutcome, ValidationSettings};
use slipway::resolver::LocalPackageStore;
use slipway::util::GlobalContext;

pub fn execute(args: TestPackageArgs, verbose: bool) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(verbose);

    let recipe = load_recipe(&ctx, args.recipe.manifest_path.as_deref())?;
    let (Some(test_package), Some(dir)) = (recipe.test_package(), recipe.test_package_dir()) else {
        bail!("{} declares no [test_package]", recipe.identity());
    };
    if !dir.is_dir() {
        bail!("test package directory {} does not exist", dir.display());
    }

    let host = Platform::host();
    let platform = target_platform(&args.recipe, host)?;
    let mut tool = detect_cmake(&ctx)?;
    let tool_settings = tool_settings(&ctx, &args.tool);

    let consumer = Recipe::consumer_of(recipe.identity(), dir, &test_package.executable);
    let settings = ValidationSettings {
        build_dir: ctx
            .build_root()
            .join(format!("{}-test_package", recipe.name())),
        build_type: tool_settings.build_type,
        jobs: tool_settings.jobs,
        generator: tool_settings.generator,
        platform,
        host,
    };

    let store = LocalPackageStore::new(ctx.store_dir());
    let report = validate_package(&consumer, &store, &mut tool, &settings).map_err(CreateError::from)?;

    match report.outcome {
        ValidationOutcome::Passed { executable } => {
            eprintln!("{} passed: `{}` exited with 0", recipe.identity(), executable)
        }
        ValidationOutcome::Skipped { reason } => {
            eprintln!("{} built; run skipped: {}", recipe.identity(), reason)
        }
    }
    Ok(())
}
