//! Global context for slipway operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::{RecipeNotFound, RECIPE_FILE};
use crate::util::config::{global_config_dir, load_config, project_config_path, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global data (~/.slipway/)
    home: PathBuf,

    /// Merged global and project configuration
    config: Config,

    verbose: bool,
}

impl GlobalContext {
    /// Create a context rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_cwd(cwd)
    }

    /// Create a context for a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let home = match std::env::var_os("SLIPWAY_HOME") {
            Some(home) => PathBuf::from(home),
            None => global_config_dir().unwrap_or_else(|| PathBuf::from(".slipway")),
        };
        Ok(Self::with_paths(cwd, home))
    }

    /// Create a context with explicit working and home directories.
    pub fn with_paths(cwd: PathBuf, home: PathBuf) -> Self {
        let config = load_config(&home.join("config.toml"), &project_config_path(&cwd));
        GlobalContext {
            cwd,
            home,
            config,
            verbose: false,
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The slipway home directory (~/.slipway/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory of installed packages.
    pub fn store_dir(&self) -> PathBuf {
        match &self.config.store.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.cwd.join(path),
            None => self.home.join("packages"),
        }
    }

    /// Root of per-invocation work directories for the current recipe.
    pub fn build_root(&self) -> PathBuf {
        self.cwd.join(".slipway").join("build")
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Find slipway.toml starting from cwd and searching upward.
    pub fn find_recipe(&self) -> Result<PathBuf> {
        let mut current = self.cwd.clone();
        loop {
            let candidate = current.join(RECIPE_FILE);
            if candidate.is_file() {
                return Ok(candidate);
            }
            if !current.pop() {
                return Err(RecipeNotFound::new(&self.cwd, true).into());
            }
        }
    }
}
