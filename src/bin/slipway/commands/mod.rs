//! Command implementations

pub mod completions;
pub mod create;
pub mod init;
pub mod resolve;
pub mod test_package;

use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::{BuildToolArgs, RecipeArgs};
use slipway::builder::CMakeTool;
use slipway::core::manifest::find_recipe;
use slipway::core::{Arch, OptionOverrides, Os, Platform, Recipe};
use slipway::ops::{CreateError, OutputFormat};
use slipway::util::GlobalContext;

/// Load the recipe named by `--manifest-path`, or the nearest one above cwd.
pub fn load_recipe(ctx: &GlobalContext, manifest_path: Option<&Path>) -> Result<Recipe> {
    let path = match manifest_path {
        Some(path) if path.is_dir() => find_recipe(path)?,
        Some(path) => path.to_path_buf(),
        None => ctx.find_recipe()?,
    };
    Recipe::load(&path)
}

/// Target platform from `--os`/`--arch`, defaulting to the host.
pub fn target_platform(args: &RecipeArgs, host: Platform) -> Result<Platform> {
    let os = match &args.os {
        Some(os) => os.parse::<Os>()?,
        None => host.os,
    };
    let arch = match &args.arch {
        Some(arch) => arch.parse::<Arch>()?,
        None => host.arch,
    };
    Ok(Platform::new(os, arch))
}

pub fn overrides(args: &RecipeArgs) -> Result<OptionOverrides> {
    let overrides = OptionOverrides::from_pairs(args.options.iter().map(String::as_str))
        .map_err(CreateError::from)?;
    Ok(overrides)
}

pub fn output_format(args: &RecipeArgs) -> Result<OutputFormat> {
    Ok(args.format.parse::<OutputFormat>()?)
}

/// Resolved build tool settings: CLI > config > default.
pub struct ToolSettings {
    pub build_type: String,
    pub jobs: Option<usize>,
    pub generator: Option<String>,
}

pub fn tool_settings(ctx: &GlobalContext, args: &BuildToolArgs) -> ToolSettings {
    let config = ctx.config();
    ToolSettings {
        build_type: args
            .build_type
            .clone()
            .unwrap_or_else(|| config.build_type().to_string()),
        jobs: args.jobs.or(config.build.jobs),
        generator: args.generator.clone().or_else(|| config.build.generator.clone()),
    }
}

pub fn detect_cmake(ctx: &GlobalContext) -> Result<CMakeTool> {
    CMakeTool::detect(ctx.config().build.cmake.as_deref())
        .context("CMake is required to build recipes; install it or set `build.cmake` in config.toml")
}
