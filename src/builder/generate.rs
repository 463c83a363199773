//! Build-tool input files.
//!
//! Everything lands in `<build>/generators/`, in two steps:
//! - Configure writes `slipway_toolchain.cmake`, which caches every build
//!   variable and prepends the generator and dependency directories to
//!   `CMAKE_PREFIX_PATH`
//! - Generate writes one `<dep>-config.cmake` per active dependency, each
//!   declaring an `INTERFACE IMPORTED` target `<dep>::<dep>`, and
//!   `slipway_deps.json` with the dependency graph
//!
//! The tool only configures the source tree after both steps, so
//! `find_package(<dep> CONFIG)` always sees the generated files.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::builder::variables::{BuildVariables, GenerateError};
use crate::core::dependency::DependencyKind;
use crate::core::platform::Os;
use crate::core::recipe::Recipe;
use crate::resolver::ActiveDependency;
use crate::util::fs::{cmake_path, files_with_extensions};

pub const GENERATORS_DIR: &str = "generators";
pub const TOOLCHAIN_FILE: &str = "slipway_toolchain.cmake";
pub const DEPS_FILE: &str = "slipway_deps.json";

/// Paths written by [`write_dependency_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFiles {
    pub dir: PathBuf,
    pub package_configs: Vec<PathBuf>,
    pub graph: PathBuf,
}

/// Directory the generated files go into.
pub fn generators_dir(build_dir: &Path) -> PathBuf {
    build_dir.join(GENERATORS_DIR)
}

/// Path of the toolchain cache script for `build_dir`.
pub fn toolchain_path(build_dir: &Path) -> PathBuf {
    generators_dir(build_dir).join(TOOLCHAIN_FILE)
}

#[derive(Serialize)]
struct DepsGraph<'a> {
    package: String,
    dependencies: Vec<DepsNode<'a>>,
}

#[derive(Serialize)]
struct DepsNode<'a> {
    name: &'a str,
    version: String,
    kind: DependencyKind,
    transitive_headers: bool,
    root: String,
    include_dirs: Vec<String>,
    libs: &'a [String],
}

/// Write the toolchain cache script. Needs no dependency files.
pub fn write_toolchain(
    build_dir: &Path,
    recipe: &Recipe,
    variables: &BuildVariables,
    dependencies: &[ActiveDependency],
) -> Result<PathBuf, GenerateError> {
    let dir = generators_dir(build_dir);
    create_dir(&dir)?;

    let toolchain = dir.join(TOOLCHAIN_FILE);
    write(&toolchain, &render_toolchain(recipe, variables, dependencies, &dir))?;
    Ok(toolchain)
}

/// Write a package config per dependency plus the dependency graph.
pub fn write_dependency_files(
    build_dir: &Path,
    recipe: &Recipe,
    dependencies: &[ActiveDependency],
    os: Os,
) -> Result<GeneratedFiles, GenerateError> {
    let dir = generators_dir(build_dir);
    create_dir(&dir)?;

    let mut package_configs = Vec::with_capacity(dependencies.len());
    for dep in dependencies {
        let path = dir.join(format!("{}-config.cmake", dep.name()));
        write(&path, &render_package_config(dep, os))?;
        package_configs.push(path);
    }

    let graph = dir.join(DEPS_FILE);
    write(&graph, &render_graph(recipe, dependencies)?)?;

    tracing::debug!(
        "generated {} files in {}",
        package_configs.len() + 1,
        dir.display()
    );

    Ok(GeneratedFiles {
        dir,
        package_configs,
        graph,
    })
}

fn render_toolchain(
    recipe: &Recipe,
    variables: &BuildVariables,
    dependencies: &[ActiveDependency],
    generators: &Path,
) -> String {
    let mut out = format!(
        "# Generated by slipway for {}. Do not edit.\n\n",
        recipe.identity()
    );

    for (name, value) in variables.iter() {
        out.push_str(&format!(
            "set({} \"{}\" CACHE {} \"\" FORCE)\n",
            name,
            value,
            value.cache_type()
        ));
    }

    let mut prefixes = vec![cmake_path(generators)];
    prefixes.extend(dependencies.iter().map(|d| cmake_path(d.artifact().root())));
    out.push_str("\nlist(PREPEND CMAKE_PREFIX_PATH");
    for prefix in &prefixes {
        out.push_str(&format!(" \"{}\"", prefix));
    }
    out.push_str(")\n");
    out.push_str("set(CMAKE_PREFIX_PATH \"${CMAKE_PREFIX_PATH}\" CACHE STRING \"\" FORCE)\n");

    out
}

fn render_package_config(dep: &ActiveDependency, os: Os) -> String {
    let target = format!("{0}::{0}", dep.name());
    let artifact = dep.artifact();
    let includes: Vec<String> = dep
        .include_dirs()
        .iter()
        .map(|p| format!("\"{}\"", cmake_path(p)))
        .collect();

    let mut out = format!(
        "# Generated by slipway for {}/{}. Do not edit.\n\n",
        dep.name(),
        dep.version()
    );
    out.push_str(&format!("if(NOT TARGET {})\n", target));
    out.push_str(&format!("  add_library({} INTERFACE IMPORTED)\n", target));
    out.push_str(&format!(
        "  set_target_properties({} PROPERTIES\n    INTERFACE_INCLUDE_DIRECTORIES {}",
        target,
        includes.join(" ")
    ));

    let libs = link_libraries(&artifact.lib_dir(), artifact.libs(), os);
    if !libs.is_empty() {
        out.push_str(&format!(
            "\n    INTERFACE_LINK_LIBRARIES \"{}\"",
            libs.join(";")
        ));
    }
    out.push_str(")\nendif()\n");
    out.push_str(&format!(
        "set({}_FOUND TRUE)\nset({}_VERSION \"{}\")\n",
        dep.name(),
        dep.name(),
        dep.version()
    ));
    out
}

/// Resolve declared lib names to files in `lib_dir`, falling back to the
/// bare name so the linker can search for it.
fn link_libraries(lib_dir: &Path, libs: &[String], os: Os) -> Vec<String> {
    let files = files_with_extensions(lib_dir, os.library_extensions());
    libs.iter()
        .map(|lib| {
            files
                .iter()
                .find(|f| {
                    f.file_stem()
                        .and_then(|s| s.to_str())
                        .is_some_and(|stem| stem == lib || stem == format!("lib{}", lib))
                })
                .map(|f| cmake_path(f))
                .unwrap_or_else(|| lib.clone())
        })
        .collect()
}

fn render_graph(recipe: &Recipe, dependencies: &[ActiveDependency]) -> Result<String, GenerateError> {
    let graph = DepsGraph {
        package: recipe.identity().to_string(),
        dependencies: dependencies
            .iter()
            .map(|d| DepsNode {
                name: d.name(),
                version: d.version().to_string(),
                kind: d.kind(),
                transitive_headers: d.transitive_headers(),
                root: cmake_path(d.artifact().root()),
                include_dirs: d.include_dirs().iter().map(|p| cmake_path(p)).collect(),
                libs: d.artifact().libs(),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&graph)?)
}

fn create_dir(dir: &Path) -> Result<(), GenerateError> {
    std::fs::create_dir_all(dir).map_err(|source| GenerateError::Io {
        path: dir.display().to_string(),
        source,
    })
}

fn write(path: &Path, contents: &str) -> Result<(), GenerateError> {
    std::fs::write(path, contents).map_err(|source| GenerateError::Io {
        path: path.display().to_string(),
        source,
    })
}
