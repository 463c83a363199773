//! `slipway init` command

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::cli::InitArgs;
use slipway::core::manifest::generate_recipe;
use slipway::core::RECIPE_FILE;
use slipway::util::fs::write_string;

/// Package name from `--name`, or the directory name.
fn determine_package_name(name: Option<String>, path: &Path) -> String {
    name.unwrap_or_else(|| {
        path.canonicalize()
            .ok()
            .and_then(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .unwrap_or_else(|| "unnamed".to_string())
    })
}

/// Names become CMake target and file names.
fn validate_package_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("package name cannot be empty");
    }

    if name.starts_with('-') || name.starts_with('.') {
        return Err("package name cannot start with a hyphen or dot");
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("package name contains invalid characters");
    }

    Ok(())
}

pub fn execute(args: InitArgs) -> Result<()> {
    let path = args.path.unwrap_or_else(|| PathBuf::from("."));
    let name = determine_package_name(args.name, &path);

    if let Err(reason) = validate_package_name(&name) {
        bail!("invalid package name `{}`: {}", name, reason);
    }

    let recipe_path = path.join(RECIPE_FILE);
    if recipe_path.exists() {
        bail!("`{}` already exists", recipe_path.display());
    }

    write_string(&recipe_path, &generate_recipe(&name))?;
    eprintln!("     Created recipe `{}` in {}", name, path.display());

    Ok(())
}
