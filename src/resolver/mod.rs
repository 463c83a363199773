//! Dependency resolution.
//!
//! Selection is pure: a dependency is active iff its activation predicate
//! holds for the resolved configuration, and the output keeps declaration
//! order. Resolution then looks every active entry up in a
//! [`DependencyDatabase`]. There is no version solving; every version is
//! exact and a miss is fatal.

pub mod database;
pub mod errors;
pub mod store;

pub use database::{DependencyDatabase, PackageArtifact, PackageInfo, PropagatedRequirement};
pub use errors::ResolveError;
pub use store::LocalPackageStore;

use std::collections::HashSet;
use std::path::PathBuf;

use semver::Version;

use crate::core::dependency::{Dependency, DependencyKind};
use crate::core::option::ResolvedConfiguration;
use crate::core::recipe::Recipe;

/// A selected dependency bound to its installed artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDependency {
    dependency: Dependency,
    artifact: PackageArtifact,
    include_dirs: Vec<PathBuf>,
}

impl ActiveDependency {
    pub fn name(&self) -> &str {
        self.dependency.name()
    }

    pub fn version(&self) -> &Version {
        self.dependency.version()
    }

    pub fn kind(&self) -> DependencyKind {
        self.dependency.kind()
    }

    /// Propagation flag, carried unchanged from the declaration.
    pub fn transitive_headers(&self) -> bool {
        self.dependency.transitive_headers()
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    pub fn artifact(&self) -> &PackageArtifact {
        &self.artifact
    }

    /// The package's own include directory followed by those of the
    /// requirements it propagates, transitively.
    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }
}

/// Dependencies whose activation predicate holds, in declaration order.
pub fn select_dependencies<'a>(
    recipe: &'a Recipe,
    config: &ResolvedConfiguration,
) -> Vec<&'a Dependency> {
    recipe
        .dependencies()
        .iter()
        .filter(|dep| dep.is_active(config))
        .collect()
}

/// Select active dependencies and bind each to its installed artifact.
pub fn resolve_dependencies(
    recipe: &Recipe,
    config: &ResolvedConfiguration,
    db: &dyn DependencyDatabase,
) -> Result<Vec<ActiveDependency>, ResolveError> {
    let required_by = recipe.identity().to_string();
    let mut resolved = Vec::new();

    for dep in select_dependencies(recipe, config) {
        let artifact = lookup(db, dep.name(), dep.version(), &required_by)?;
        let include_dirs = interface_include_dirs(&artifact, db)?;
        tracing::debug!("resolved {} -> {}", dep, artifact.root().display());
        resolved.push(ActiveDependency {
            dependency: dep.clone(),
            artifact,
            include_dirs,
        });
    }

    Ok(resolved)
}

fn lookup(
    db: &dyn DependencyDatabase,
    name: &str,
    version: &Version,
    required_by: &str,
) -> Result<PackageArtifact, ResolveError> {
    db.lookup(name, version)
        .ok_or_else(|| ResolveError::UnresolvedDependency {
            name: name.to_string(),
            version: version.to_string(),
            required_by: required_by.to_string(),
            searched: db.location(),
        })
}

/// Walk the propagated requirements of `root` depth-first.
fn interface_include_dirs(
    root: &PackageArtifact,
    db: &dyn DependencyDatabase,
) -> Result<Vec<PathBuf>, ResolveError> {
    let mut dirs = vec![root.include_dir()];
    let mut visited: HashSet<(String, Version)> = HashSet::new();
    visited.insert((root.name().to_string(), root.version().clone()));

    let mut stack: Vec<(PackageArtifact, usize)> = vec![(root.clone(), 0)];
    while let Some((artifact, next)) = stack.pop() {
        let propagated: Vec<&PropagatedRequirement> = artifact
            .info()
            .requires
            .iter()
            .filter(|r| r.transitive_headers)
            .collect();
        let Some(req) = propagated.get(next) else {
            continue;
        };
        let req = (*req).clone();
        stack.push((artifact.clone(), next + 1));

        if !visited.insert((req.name.clone(), req.version.clone())) {
            continue;
        }
        let required_by = format!("{}/{}", artifact.name(), artifact.version());
        let child = lookup(db, &req.name, &req.version, &required_by)?;
        let include = child.include_dir();
        if !dirs.contains(&include) {
            dirs.push(include);
        }
        stack.push((child, 0));
    }

    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::option::OptionOverrides;
    use crate::core::platform::{Arch, Os, Platform};
    use crate::test_support::fixtures::{base_database, base_recipe};
    use crate::test_support::MemoryDatabase;

    fn linux() -> Platform {
        Platform::new(Os::Linux, Arch::X86_64)
    }

    fn resolve(pairs: &[&str]) -> ResolvedConfiguration {
        let overrides = OptionOverrides::from_pairs(pairs.iter().copied()).unwrap();
        base_recipe().options().resolve(&overrides, &linux()).unwrap()
    }

    fn names(deps: &[&Dependency]) -> Vec<String> {
        deps.iter().map(|d| d.name().to_string()).collect()
    }

    #[test]
    fn test_defaults_select_everything() {
        let recipe = base_recipe();
        let selected = select_dependencies(&recipe, &resolve(&[]));

        assert_eq!(
            names(&selected),
            vec!["spdlog", "tomlplusplus", "asio", "nlohmann_json", "gtest", "benchmark"]
        );
    }

    #[test]
    fn test_enable_tests_controls_gtest() {
        let recipe = base_recipe();

        for value in ["True", "False"] {
            let config = resolve(&[&format!("enable_tests={}", value)]);
            let selected = select_dependencies(&recipe, &config);
            let has_gtest = selected.iter().any(|d| d.name() == "gtest");
            assert_eq!(has_gtest, config.is_enabled("enable_tests"));
        }
    }

    #[test]
    fn test_selection_is_deterministic() {
        let recipe = base_recipe();
        let config = resolve(&["enable_benchmarks=False"]);

        let first = names(&select_dependencies(&recipe, &config));
        let second = names(&select_dependencies(&recipe, &config));
        assert_eq!(first, second);
        assert!(!first.contains(&"benchmark".to_string()));
    }

    #[test]
    fn test_resolve_binds_artifacts() {
        let recipe = base_recipe();
        let resolved = resolve_dependencies(&recipe, &resolve(&[]), &base_database()).unwrap();

        assert_eq!(resolved.len(), 6);
        assert_eq!(resolved[0].name(), "spdlog");
        assert!(resolved[0].transitive_headers());
        assert_eq!(resolved[4].kind(), DependencyKind::TestRequires);
        assert!(!resolved[4].transitive_headers());
        assert_eq!(
            resolved[0].include_dirs()[0],
            PathBuf::from("/store/spdlog/1.15.3/include")
        );
    }

    #[test]
    fn test_missing_package_is_unresolved() {
        let recipe = base_recipe();
        let db = MemoryDatabase::new().with_package("spdlog", "1.15.3");

        let err = resolve_dependencies(&recipe, &resolve(&[]), &db).unwrap_err();
        let ResolveError::UnresolvedDependency {
            name,
            version,
            required_by,
            ..
        } = err;
        assert_eq!(name, "tomlplusplus");
        assert_eq!(version, "3.4.0");
        assert_eq!(required_by, "base/1.0.0");
    }

    #[test]
    fn test_inactive_dependencies_are_not_looked_up() {
        let recipe = base_recipe();
        let db = MemoryDatabase::new()
            .with_package("spdlog", "1.15.3")
            .with_package("tomlplusplus", "3.4.0")
            .with_package("asio", "1.34.2")
            .with_package("nlohmann_json", "3.11.3");

        let config = resolve(&["enable_tests=False", "enable_benchmarks=False"]);
        assert_eq!(resolve_dependencies(&recipe, &config, &db).unwrap().len(), 4);
    }

    #[test]
    fn test_transitive_headers_are_walked() {
        let mut app_info = PackageInfo::new("app_core", Version::new(2, 0, 0));
        app_info.requires = vec![
            PropagatedRequirement {
                name: "fmt".to_string(),
                version: Version::new(11, 0, 0),
                transitive_headers: true,
            },
            PropagatedRequirement {
                name: "private_only".to_string(),
                version: Version::new(1, 0, 0),
                transitive_headers: false,
            },
        ];
        let mut fmt_info = PackageInfo::new("fmt", Version::new(11, 0, 0));
        // Cycle back to app_core must terminate.
        fmt_info.requires = vec![PropagatedRequirement {
            name: "app_core".to_string(),
            version: Version::new(2, 0, 0),
            transitive_headers: true,
        }];
        let db = MemoryDatabase::new().with_info(app_info).with_info(fmt_info);

        let recipe = Recipe::new(
            crate::core::recipe::PackageIdentity::new(
                "consumer",
                Version::new(0, 1, 0),
                crate::core::recipe::PackageKind::Application,
            ),
            "/src",
        )
        .with_dependency(Dependency::new("app_core", Version::new(2, 0, 0)));

        let resolved =
            resolve_dependencies(&recipe, &ResolvedConfiguration::default(), &db).unwrap();
        assert_eq!(
            resolved[0].include_dirs(),
            [
                PathBuf::from("/store/app_core/2.0.0/include"),
                PathBuf::from("/store/fmt/11.0.0/include"),
            ]
        );
    }
}
