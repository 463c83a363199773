//! The native build tool seam.
//!
//! The lifecycle drives an external tool through [`BuildTool::invoke`].
//! Exit status is the only signal; anything else the tool prints is kept
//! for diagnostics.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::builder::variables::BuildVariables;

/// An operation requested from the build tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolStage {
    /// Check the tool and generator before anything reads the source tree.
    Configure,
    /// Configure the source tree from the generated files.
    Generate,
    Build,
    /// Run the recipe's test binary.
    Test,
    /// Install into a prefix.
    Install,
    /// Run a consumer executable.
    Run,
}

impl fmt::Display for ToolStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStage::Configure => write!(f, "configure"),
            ToolStage::Generate => write!(f, "generate"),
            ToolStage::Build => write!(f, "build"),
            ToolStage::Test => write!(f, "test"),
            ToolStage::Install => write!(f, "install"),
            ToolStage::Run => write!(f, "run"),
        }
    }
}

/// Everything the tool needs for one invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolRequest {
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub variables: BuildVariables,
    /// Prepended to `CMAKE_PREFIX_PATH` when the source tree is configured.
    pub prefix_path: Vec<PathBuf>,
    /// Cache script written by the Configure stage.
    pub toolchain_file: Option<PathBuf>,
    /// Destination of `Install`.
    pub install_prefix: Option<PathBuf>,
    /// Executable for `Test` and `Run`.
    pub executable: Option<String>,
    pub build_type: String,
    pub jobs: Option<usize>,
    pub generator: Option<String>,
}

impl ToolRequest {
    pub fn new(source_dir: impl Into<PathBuf>, build_dir: impl Into<PathBuf>) -> Self {
        ToolRequest {
            source_dir: source_dir.into(),
            build_dir: build_dir.into(),
            build_type: "Release".to_string(),
            ..ToolRequest::default()
        }
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
}

/// Failure reported by the build tool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("`{tool}` not found in PATH")]
    NotFound { tool: String },

    #[error("failed to run `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error("`{command}` exited with {}{}", exit_description(.code), stderr_suffix(.stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("generator `{generator}` is not supported by `{tool}` (available: {})", .available.join(", "))]
    UnsupportedGenerator {
        tool: String,
        generator: String,
        available: Vec<String>,
    },

    #[error("executable `{name}` not found under {dir}")]
    MissingExecutable { name: String, dir: PathBuf },

    #[error("{stage} request is missing {field}")]
    IncompleteRequest {
        stage: ToolStage,
        field: &'static str,
    },
}

fn exit_description(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!("\n{}", stderr.trim_end())
    }
}

/// An external build tool.
pub trait BuildTool {
    fn name(&self) -> &str;

    fn invoke(&mut self, stage: ToolStage, request: &ToolRequest) -> Result<ToolOutput, ToolError>;
}
