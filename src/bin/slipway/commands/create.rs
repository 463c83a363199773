//! `slipway create` command

use anyhow::Result;

use super::{detect_cmake, load_recipe, output_format, overrides, target_platform, tool_settings};
use crate::cli::CreateArgs;
use slipway::core::Platform;
use slipway::ops::{create, format_create, format_create_json, plan, CreateOptions, OutputFormat};
use slipway::resolver::LocalPackageStore;
use slipway::util::GlobalContext;

pub fn execute(args: CreateArgs, verbose: bool) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(verbose);

    let recipe = load_recipe(&ctx, args.recipe.manifest_path.as_deref())?;
    let host = Platform::host();
    let platform = target_platform(&args.recipe, host)?;
    let format = output_format(&args.recipe)?;
    let overrides = overrides(&args.recipe)?;

    // Reject bad options before requiring a build tool.
    plan(&recipe, &overrides, platform, host)?;
    let mut tool = detect_cmake(&ctx)?;

    let settings = tool_settings(&ctx, &args.tool);
    let opts = CreateOptions {
        overrides,
        platform,
        host,
        skip_tests: args.skip_tests || ctx.config().build.skip_tests,
        build_type: settings.build_type,
        jobs: settings.jobs,
        generator: settings.generator,
        build_root: ctx.build_root(),
        validate: !args.no_validate,
    };

    let store = LocalPackageStore::new(ctx.store_dir());
    let report = create(&recipe, &opts, &store, &mut tool)?;

    match format {
        OutputFormat::Human => print!("{}", format_create(&report, ctx.is_verbose())),
        OutputFormat::Json => println!("{}", format_create_json(&report)),
    }
    Ok(())
}
