//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Slipway - build, test and package native components from declarative recipes
#[derive(Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter slipway.toml
    Init(InitArgs),

    /// Show the resolved options, dependencies and build variables
    Resolve(ResolveArgs),

    /// Configure, build, test and package the recipe
    Create(CreateArgs),

    /// Build and run the test package against an installed package
    TestPackage(TestPackageArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Package name (defaults to directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Directory to initialize (defaults to current directory)
    pub path: Option<PathBuf>,
}

/// Arguments shared by every command that reads a recipe.
#[derive(Args)]
pub struct RecipeArgs {
    /// Path to slipway.toml or the directory containing it
    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    /// Override an option (repeatable)
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
    pub options: Vec<String>,

    /// Target operating system (defaults to the host)
    #[arg(long)]
    pub os: Option<String>,

    /// Target architecture (defaults to the host)
    #[arg(long)]
    pub arch: Option<String>,

    /// Output format: human, json
    #[arg(long, default_value = "human")]
    pub format: String,
}

#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub recipe: RecipeArgs,
}

/// Build tool settings.
#[derive(Args)]
pub struct BuildToolArgs {
    /// CMAKE_BUILD_TYPE (default: Release)
    #[arg(long)]
    pub build_type: Option<String>,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// CMake generator, e.g. Ninja
    #[arg(short = 'G', long)]
    pub generator: Option<String>,
}

#[derive(Args)]
pub struct CreateArgs {
    #[command(flatten)]
    pub recipe: RecipeArgs,

    #[command(flatten)]
    pub tool: BuildToolArgs,

    /// Do not run the Test stage even if the recipe enables tests
    #[arg(long, env = "SLIPWAY_SKIP_TESTS")]
    pub skip_tests: bool,

    /// Do not build the test package after packaging
    #[arg(long)]
    pub no_validate: bool,
}

#[derive(Args)]
pub struct TestPackageArgs {
    #[command(flatten)]
    pub recipe: RecipeArgs,

    #[command(flatten)]
    pub tool: BuildToolArgs,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
