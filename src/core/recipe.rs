//! Recipe - the declarative description of a buildable component.
//!
//! A Recipe ties together package identity, the option model, the ordered
//! dependency list and the lifecycle hooks. It is built once per invocation
//! and never mutated; invoker overrides are applied by resolution.

use std::fmt;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::core::dependency::Dependency;
use crate::core::option::{OptionModel, ResolvedConfiguration};

/// Option names that gate the Test stage, checked in order.
pub const DEFAULT_TEST_OPTIONS: &[&str] = &["enable_tests", "with_tests"];

/// What a recipe produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageKind {
    #[default]
    Library,
    HeaderLibrary,
    Application,
    /// Builds against another package and produces nothing installable.
    Consumer,
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageKind::Library => write!(f, "library"),
            PackageKind::HeaderLibrary => write!(f, "header-library"),
            PackageKind::Application => write!(f, "application"),
            PackageKind::Consumer => write!(f, "consumer"),
        }
    }
}

/// Name, exact version and kind of a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PackageIdentity {
    pub name: String,
    pub version: Version,
    pub kind: PackageKind,
}

impl PackageIdentity {
    pub fn new(name: impl Into<String>, version: Version, kind: PackageKind) -> Self {
        PackageIdentity {
            name: name.into(),
            version,
            kind,
        }
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Recipe-level switches for the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleHooks {
    /// Emit `CMAKE_EXPORT_COMPILE_COMMANDS` regardless of options.
    pub export_compile_commands: bool,
    /// Test executable produced by the Build stage.
    pub test_binary: Option<String>,
    /// Options that request testing; the first one present decides.
    pub test_options: Vec<String>,
    /// Whether the Package stage runs.
    pub packages: bool,
}

impl Default for LifecycleHooks {
    fn default() -> Self {
        LifecycleHooks {
            export_compile_commands: true,
            test_binary: None,
            test_options: DEFAULT_TEST_OPTIONS.iter().map(|s| s.to_string()).collect(),
            packages: true,
        }
    }
}

impl LifecycleHooks {
    /// Whether the resolved configuration asks for tests.
    pub fn tests_requested(&self, config: &ResolvedConfiguration) -> bool {
        self.test_options
            .iter()
            .find(|name| config.contains(name))
            .is_some_and(|name| config.is_enabled(name))
    }
}

/// Consumer program used to validate a produced package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPackage {
    /// Source directory of the consumer, relative to the recipe root.
    pub path: PathBuf,
    /// Executable the consumer build produces.
    pub executable: String,
}

impl Default for TestPackage {
    fn default() -> Self {
        TestPackage {
            path: PathBuf::from("test_package"),
            executable: "example".to_string(),
        }
    }
}

/// A buildable component.
#[derive(Debug, Clone)]
pub struct Recipe {
    identity: PackageIdentity,
    description: Option<String>,
    license: Option<String>,
    options: OptionModel,
    dependencies: Vec<Dependency>,
    hooks: LifecycleHooks,
    libs: Vec<String>,
    test_package: Option<TestPackage>,
    root: PathBuf,
}

impl Recipe {
    /// Create a recipe with no options and no dependencies.
    pub fn new(identity: PackageIdentity, root: impl Into<PathBuf>) -> Self {
        let packages = identity.kind != PackageKind::Consumer;
        Recipe {
            identity,
            description: None,
            license: None,
            options: OptionModel::default(),
            dependencies: Vec::new(),
            hooks: LifecycleHooks {
                packages,
                ..LifecycleHooks::default()
            },
            libs: Vec::new(),
            test_package: None,
            root: root.into(),
        }
    }

    /// Build the consumer recipe that validates `package`.
    ///
    /// Its only dependency is the package itself at its exact version.
    pub fn consumer_of(package: &PackageIdentity, source_dir: impl Into<PathBuf>, executable: &str) -> Self {
        let identity = PackageIdentity::new(
            format!("{}-test_package", package.name),
            package.version.clone(),
            PackageKind::Consumer,
        );
        let mut recipe = Recipe::new(identity, source_dir);
        recipe.dependencies.push(Dependency::new(
            package.name.clone(),
            package.version.clone(),
        ));
        recipe.hooks.test_binary = Some(executable.to_string());
        recipe.hooks.test_options.clear();
        recipe
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    pub fn with_options(mut self, options: OptionModel) -> Self {
        self.options = options;
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_libs(mut self, libs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.libs = libs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_test_package(mut self, test_package: TestPackage) -> Self {
        self.test_package = Some(test_package);
        self
    }

    pub fn identity(&self) -> &PackageIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn version(&self) -> &Version {
        &self.identity.version
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }

    pub fn options(&self) -> &OptionModel {
        &self.options
    }

    /// Declared dependencies, in declaration order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    /// Linkable artifact names exported to consumers.
    ///
    /// Falls back to the package name for libraries that declare none.
    pub fn libs(&self) -> Vec<String> {
        if self.libs.is_empty() && self.identity.kind == PackageKind::Library {
            vec![self.identity.name.clone()]
        } else {
            self.libs.clone()
        }
    }

    pub fn test_package(&self) -> Option<&TestPackage> {
        self.test_package.as_ref()
    }

    /// Directory holding the recipe and its sources.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute source directory of the consumer program, if declared.
    pub fn test_package_dir(&self) -> Option<PathBuf> {
        self.test_package.as_ref().map(|tp| self.root.join(&tp.path))
    }
}
