//! On-disk package store.
//!
//! Installed packages live at `<root>/<name>/<version>/` with a
//! `package.json` describing what they export.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semver::Version;

use crate::resolver::database::{DependencyDatabase, PackageArtifact, PackageInfo, PACKAGE_INFO_FILE};
use crate::util::fs::{read_to_string, write_string};

/// A directory of installed packages.
#[derive(Debug, Clone)]
pub struct LocalPackageStore {
    root: PathBuf,
}

impl LocalPackageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalPackageStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Installation prefix for `name/version`.
    pub fn package_dir(&self, name: &str, version: &Version) -> PathBuf {
        self.root.join(name).join(version.to_string())
    }

    /// Write `package.json` for an installed package.
    pub fn write_info(&self, info: &PackageInfo) -> Result<PathBuf> {
        let path = self
            .package_dir(&info.name, &info.version)
            .join(PACKAGE_INFO_FILE);
        let json = serde_json::to_string_pretty(info).context("failed to serialize package info")?;
        write_string(&path, &json)?;
        Ok(path)
    }

    /// Read `package.json` from an installation prefix.
    pub fn read_info(dir: &Path) -> Result<PackageInfo> {
        let path = dir.join(PACKAGE_INFO_FILE);
        let content = read_to_string(&path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}

impl DependencyDatabase for LocalPackageStore {
    fn lookup(&self, name: &str, version: &Version) -> Option<PackageArtifact> {
        let dir = self.package_dir(name, version);
        if !dir.join(PACKAGE_INFO_FILE).is_file() {
            return None;
        }

        match Self::read_info(&dir) {
            Ok(info) if info.name == name && &info.version == version => {
                Some(PackageArtifact::new(dir, info))
            }
            Ok(info) => {
                tracing::warn!(
                    "{} describes {}/{}, expected {}/{}",
                    dir.display(),
                    info.name,
                    info.version,
                    name,
                    version
                );
                None
            }
            Err(e) => {
                tracing::warn!("ignoring broken package at {}: {:#}", dir.display(), e);
                None
            }
        }
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
