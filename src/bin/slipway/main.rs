//! Slipway CLI

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use slipway::core::RecipeNotFound;
use slipway::ops::CreateError;
use slipway::util::diagnostic::emit;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stderr().is_terminal();

    if let Err(e) = run(cli) {
        report(&e, color);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("slipway=debug")
    } else {
        EnvFilter::new("slipway=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let verbose = cli.verbose;
    match cli.command {
        Commands::Init(args) => commands::init::execute(args),
        Commands::Resolve(args) => commands::resolve::execute(args, verbose),
        Commands::Create(args) => commands::create::execute(args, verbose),
        Commands::TestPackage(args) => commands::test_package::execute(args, verbose),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

fn report(err: &anyhow::Error, color: bool) {
    if let Some(missing) = err.downcast_ref::<RecipeNotFound>() {
        emit(&missing.to_diagnostic(), color);
        return;
    }
    match err.downcast_ref::<CreateError>() {
        Some(CreateError::Resolve(resolve)) => {
            eprintln!("{:?}", miette::Report::new(resolve.to_report()))
        }
        Some(create) => emit(&create.to_diagnostic(), color),
        None => eprintln!("error: {:#}", err),
    }
}
