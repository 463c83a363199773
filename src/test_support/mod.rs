//! Test doubles for the build tool and dependency database seams.
//!
//! # Example
//!
//! ```rust,ignore
//! use slipway::test_support::{MockBuildTool, MemoryDatabase};
//!
//! let mut tool = MockBuildTool::new().fail_on(ToolStage::Build, failure("boom"));
//! let db = MemoryDatabase::new().with_package("spdlog", "1.15.3");
//! ```

pub mod fixtures;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use semver::Version;

use crate::builder::generate::generators_dir;
use crate::builder::tool::{BuildTool, ToolError, ToolOutput, ToolRequest, ToolStage};
use crate::resolver::database::{DependencyDatabase, PackageArtifact, PackageInfo};

/// Build tool that records invocations instead of running anything.
///
/// `Install` creates `include/` and `lib/` under the requested prefix and
/// touches every library registered with [`MockBuildTool::installs_lib`],
/// so packaging code sees a realistic layout. Every invocation also records
/// which generated files existed at that moment.
#[derive(Debug, Default)]
pub struct MockBuildTool {
    invocations: Vec<(ToolStage, ToolRequest)>,
    generated: Vec<Vec<String>>,
    failures: HashMap<ToolStage, ToolError>,
    installed_libs: Vec<String>,
}

impl MockBuildTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every invocation of `stage` fail with `error`.
    pub fn fail_on(mut self, stage: ToolStage, error: ToolError) -> Self {
        self.failures.insert(stage, error);
        self
    }

    /// Archive file created under `lib/` on install.
    pub fn installs_lib(mut self, file_name: impl Into<String>) -> Self {
        self.installed_libs.push(file_name.into());
        self
    }

    pub fn invocations(&self) -> &[(ToolStage, ToolRequest)] {
        &self.invocations
    }

    /// Stages invoked so far, in order.
    pub fn stages(&self) -> Vec<ToolStage> {
        self.invocations.iter().map(|(stage, _)| *stage).collect()
    }

    /// Sorted names in `<build>/generators/` when `stage` was last invoked.
    pub fn generated_files(&self, stage: ToolStage) -> Option<&[String]> {
        self.invocations
            .iter()
            .zip(&self.generated)
            .rev()
            .find(|((s, _), _)| *s == stage)
            .map(|(_, files)| files.as_slice())
    }

    /// Most recent request for `stage`.
    pub fn request(&self, stage: ToolStage) -> Option<&ToolRequest> {
        self.invocations
            .iter()
            .rev()
            .find(|(s, _)| *s == stage)
            .map(|(_, request)| request)
    }
}

impl BuildTool for MockBuildTool {
    fn name(&self) -> &str {
        "mock"
    }

    fn invoke(&mut self, stage: ToolStage, request: &ToolRequest) -> Result<ToolOutput, ToolError> {
        self.invocations.push((stage, request.clone()));
        self.generated.push(list_generated(&request.build_dir));
        if let Some(error) = self.failures.get(&stage) {
            return Err(error.clone());
        }

        if stage == ToolStage::Install {
            if let Some(prefix) = &request.install_prefix {
                let spawn_error = |e: std::io::Error| ToolError::Spawn {
                    command: "mock install".to_string(),
                    message: e.to_string(),
                };
                std::fs::create_dir_all(prefix.join("include")).map_err(spawn_error)?;
                std::fs::create_dir_all(prefix.join("lib")).map_err(spawn_error)?;
                for lib in &self.installed_libs {
                    std::fs::write(prefix.join("lib").join(lib), "").map_err(spawn_error)?;
                }
            }
        }

        Ok(ToolOutput {
            command: format!("mock {}", stage),
            ..ToolOutput::default()
        })
    }
}

fn list_generated(build_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(generators_dir(build_dir))
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// A `Failed` error as a real tool would report it.
pub fn failure(stderr: &str) -> ToolError {
    ToolError::Failed {
        command: "mock".to_string(),
        code: Some(1),
        stderr: stderr.to_string(),
    }
}

/// In-memory dependency database rooted at `/store`.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    packages: BTreeMap<(String, Version), PackageInfo>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` at `version` with a single library of the same name.
    pub fn with_package(self, name: &str, version: &str) -> Self {
        let mut info = PackageInfo::new(name, parse_version(version));
        info.libs = vec![name.to_string()];
        self.with_info(info)
    }

    pub fn with_info(mut self, info: PackageInfo) -> Self {
        self.packages
            .insert((info.name.clone(), info.version.clone()), info);
        self
    }
}

impl DependencyDatabase for MemoryDatabase {
    fn lookup(&self, name: &str, version: &Version) -> Option<PackageArtifact> {
        self.packages
            .get(&(name.to_string(), version.clone()))
            .map(|info| {
                let root = PathBuf::from("/store").join(name).join(version.to_string());
                PackageArtifact::new(root, info.clone())
            })
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

fn parse_version(version: &str) -> Version {
    crate::core::dependency::parse_exact_version(version).expect("fixture version")
}
