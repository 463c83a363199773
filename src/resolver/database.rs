//! The dependency database seam.
//!
//! The resolver never knows where packages come from. It asks a
//! [`DependencyDatabase`] for an exact `name/version` and either gets an
//! installed artifact back or nothing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::core::dependency::Dependency;
use crate::core::option::OptionValue;

/// File name of the manifest written into every installed package.
pub const PACKAGE_INFO_FILE: &str = "package.json";

/// A requirement an installed package passes on to its consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagatedRequirement {
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub transitive_headers: bool,
}

impl From<&Dependency> for PropagatedRequirement {
    fn from(dep: &Dependency) -> Self {
        PropagatedRequirement {
            name: dep.name().to_string(),
            version: dep.version().clone(),
            transitive_headers: dep.transitive_headers(),
        }
    }
}

/// Contents of `package.json`: the identity a package exports to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: Version,
    /// Fingerprint of the options and platform the package was built with.
    #[serde(default)]
    pub package_id: String,
    /// Linkable artifact names.
    #[serde(default)]
    pub libs: Vec<String>,
    /// Relative to the package root.
    #[serde(default = "default_include_dir")]
    pub include_dir: PathBuf,
    /// Relative to the package root.
    #[serde(default = "default_lib_dir")]
    pub lib_dir: PathBuf,
    #[serde(default)]
    pub requires: Vec<PropagatedRequirement>,
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
}

fn default_include_dir() -> PathBuf {
    PathBuf::from("include")
}

fn default_lib_dir() -> PathBuf {
    PathBuf::from("lib")
}

impl PackageInfo {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        PackageInfo {
            name: name.into(),
            version,
            package_id: String::new(),
            libs: Vec::new(),
            include_dir: default_include_dir(),
            lib_dir: default_lib_dir(),
            requires: Vec::new(),
            options: BTreeMap::new(),
        }
    }
}

/// An installed package found in a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageArtifact {
    root: PathBuf,
    info: PackageInfo,
}

impl PackageArtifact {
    pub fn new(root: impl Into<PathBuf>, info: PackageInfo) -> Self {
        PackageArtifact {
            root: root.into(),
            info,
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn version(&self) -> &Version {
        &self.info.version
    }

    /// Installation prefix of the package.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn info(&self) -> &PackageInfo {
        &self.info
    }

    pub fn include_dir(&self) -> PathBuf {
        self.root.join(&self.info.include_dir)
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.root.join(&self.info.lib_dir)
    }

    pub fn libs(&self) -> &[String] {
        &self.info.libs
    }
}

/// Lookup of installed packages by exact name and version.
pub trait DependencyDatabase {
    /// Find `name` at exactly `version`.
    fn lookup(&self, name: &str, version: &Version) -> Option<PackageArtifact>;

    /// Where this database looks, for diagnostics.
    fn location(&self) -> String;
}
