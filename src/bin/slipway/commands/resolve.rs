//! `slipway resolve` command

use anyhow::Result;

use super::{load_recipe, output_format, overrides, target_platform};
use crate::cli::ResolveArgs;
use slipway::core::Platform;
use slipway::ops::{format_plan, format_plan_json, plan, OutputFormat};
use slipway::util::GlobalContext;

pub fn execute(args: ResolveArgs, verbose: bool) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(verbose);

    let recipe = load_recipe(&ctx, args.recipe.manifest_path.as_deref())?;
    let host = Platform::host();
    let platform = target_platform(&args.recipe, host)?;
    let format = output_format(&args.recipe)?;

    let plan = plan(&recipe, &overrides(&args.recipe)?, platform, host)?;

    match format {
        OutputFormat::Human => print!("{}", format_plan(&plan)),
        OutputFormat::Json => println!("{}", format_plan_json(&plan)),
    }
    Ok(())
}
