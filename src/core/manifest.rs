//! slipway.toml recipe parsing.
//!
//! The recipe file is deserialized into raw structs first and then
//! converted into the validated [`Recipe`] model. Options are read from an
//! order-preserving table so that constraint evaluation follows the order
//! in which they were written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::core::dependency::{parse_exact_version, Activation, Dependency, DependencyKind};
use crate::core::option::{
    ConstraintAction, Exclusion, OptionDecl, OptionDomain, OptionModel, OptionPredicate,
    OptionValue, VariableMapping,
};
use crate::core::platform::Os;
use crate::core::recipe::{
    LifecycleHooks, PackageIdentity, PackageKind, Recipe, TestPackage, DEFAULT_TEST_OPTIONS,
};

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Canonical recipe file name.
pub const RECIPE_FILE: &str = "slipway.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecipe {
    package: RawPackage,
    #[serde(default)]
    options: toml::Table,
    #[serde(default)]
    requires: Vec<RawDependency>,
    #[serde(default)]
    test_requires: Vec<RawDependency>,
    #[serde(default)]
    build: RawBuild,
    test_package: Option<RawTestPackage>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackage {
    name: String,
    version: String,
    #[serde(default)]
    kind: PackageKind,
    description: Option<String>,
    license: Option<String>,
    #[serde(default)]
    libs: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOption {
    default: OptionValue,
    values: Option<Vec<String>>,
    variable: Option<RawVariable>,
    #[serde(default)]
    unsupported_on: Vec<Os>,
    #[serde(default)]
    removed_when: Vec<String>,
    #[serde(default)]
    disabled_when: Vec<String>,
    description: Option<String>,
}

/// `variable = "NAME"` or `variable = false`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVariable {
    Name(String),
    Flag(bool),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    /// `"spdlog/1.15.3"`
    Simple(String),
    Detailed {
        name: String,
        version: String,
        #[serde(default)]
        transitive_headers: bool,
        when: Option<RawWhen>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawWhen {
    One(String),
    Many(Vec<String>),
}

impl RawWhen {
    fn into_vec(self) -> Vec<String> {
        match self {
            RawWhen::One(s) => vec![s],
            RawWhen::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBuild {
    #[serde(default = "default_true")]
    export_compile_commands: bool,
    test_binary: Option<String>,
    test_options: Option<Vec<String>>,
}

impl Default for RawBuild {
    fn default() -> Self {
        RawBuild {
            export_compile_commands: true,
            test_binary: None,
            test_options: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTestPackage {
    path: Option<PathBuf>,
    executable: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Recipe {
    /// Load a recipe from a `slipway.toml` path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read recipe: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse recipe content. `path` locates the recipe root.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawRecipe =
            toml::from_str(content).with_context(|| format!("failed to parse {}", RECIPE_FILE))?;

        let root = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        let version = parse_exact_version(&raw.package.version)
            .with_context(|| format!("invalid version: {}", raw.package.version))?;
        let identity = PackageIdentity::new(raw.package.name, version, raw.package.kind);

        let options = convert_options(raw.options)?;

        let mut recipe = Recipe::new(identity, root);
        if let Some(description) = raw.package.description {
            recipe = recipe.with_description(description);
        }
        if let Some(license) = raw.package.license {
            recipe = recipe.with_license(license);
        }

        for (raw_deps, kind) in [
            (raw.requires, DependencyKind::Requires),
            (raw.test_requires, DependencyKind::TestRequires),
        ] {
            for raw_dep in raw_deps {
                recipe = recipe.with_dependency(convert_dependency(raw_dep, kind, &options)?);
            }
        }

        let packages = recipe.hooks().packages;
        let hooks = LifecycleHooks {
            export_compile_commands: raw.build.export_compile_commands,
            test_binary: raw.build.test_binary,
            test_options: raw.build.test_options.unwrap_or_else(|| {
                DEFAULT_TEST_OPTIONS.iter().map(|s| s.to_string()).collect()
            }),
            packages,
        };

        let mut recipe = recipe
            .with_options(options)
            .with_hooks(hooks)
            .with_libs(raw.package.libs);

        if let Some(tp) = raw.test_package {
            let defaults = TestPackage::default();
            recipe = recipe.with_test_package(TestPackage {
                path: tp.path.unwrap_or(defaults.path),
                executable: tp.executable.unwrap_or(defaults.executable),
            });
        }

        Ok(recipe)
    }
}

/// No recipe where one was expected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not find `{file}` in {}{}", .dir.display(), parents_suffix(.searched_parents))]
pub struct RecipeNotFound {
    pub file: &'static str,
    pub dir: PathBuf,
    /// Whether parent directories were searched too.
    pub searched_parents: bool,
}

impl RecipeNotFound {
    pub fn new(dir: impl Into<PathBuf>, searched_parents: bool) -> Self {
        RecipeNotFound {
            file: RECIPE_FILE,
            dir: dir.into(),
            searched_parents,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.to_string())
            .with_location(&self.dir)
            .with_suggestion(suggestions::NO_RECIPE)
    }
}

fn parents_suffix(searched_parents: &bool) -> &'static str {
    if *searched_parents {
        " or any parent directory"
    } else {
        ""
    }
}

/// Locate `slipway.toml` in `dir`.
pub fn find_recipe(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(RECIPE_FILE);
    if path.exists() {
        Ok(path)
    } else {
        Err(RecipeNotFound::new(dir, false).into())
    }
}

fn convert_options(table: toml::Table) -> Result<OptionModel> {
    let mut raw_options = Vec::with_capacity(table.len());
    for (name, value) in table {
        let raw: RawOption = value
            .try_into()
            .with_context(|| format!("invalid declaration for option `{}`", name))?;
        raw_options.push((name, raw));
    }

    // Domains are needed up front to type `name=value` triggers.
    let mut domains: HashMap<String, OptionDomain> = HashMap::new();
    for (name, raw) in &raw_options {
        let domain = match &raw.values {
            Some(values) => OptionDomain::Enumerated(values.clone()),
            None => OptionDomain::Boolean,
        };
        domains.insert(name.clone(), domain);
    }

    let mut decls = Vec::with_capacity(raw_options.len());
    for (name, raw) in raw_options {
        let mut decl = match (raw.values, raw.default) {
            (None, OptionValue::Bool(b)) => OptionDecl::boolean(&name, b),
            (Some(values), OptionValue::Str(s)) => OptionDecl::enumerated(&name, values, s),
            (None, OptionValue::Str(s)) => {
                bail!("option `{}`: default `{}` is not a boolean (add `values` for an enumerated option)", name, s)
            }
            (Some(_), OptionValue::Bool(b)) => {
                bail!("option `{}`: default `{}` must be one of its string values", name, b)
            }
        };

        decl.variable = match raw.variable {
            Some(RawVariable::Name(var)) if !var.is_empty() => Some(VariableMapping::Variable(var)),
            Some(RawVariable::Name(_)) => bail!("option `{}`: empty variable name", name),
            Some(RawVariable::Flag(false)) => Some(VariableMapping::NoMapping),
            Some(RawVariable::Flag(true)) => {
                bail!("option `{}`: `variable = true` is not valid, give the variable name", name)
            }
            None => None,
        };
        decl.unsupported_on = raw.unsupported_on;

        for trigger in &raw.removed_when {
            decl.exclusions.push(Exclusion {
                when: parse_predicate(trigger, &domains)?,
                action: ConstraintAction::Remove,
            });
        }
        for trigger in &raw.disabled_when {
            decl.exclusions.push(Exclusion {
                when: parse_predicate(trigger, &domains)?,
                action: ConstraintAction::Disable,
            });
        }
        decl.description = raw.description;

        decls.push(decl);
    }

    Ok(OptionModel::new(decls)?)
}

/// Parse `name` (boolean enabled) or `name=value`.
fn parse_predicate(text: &str, domains: &HashMap<String, OptionDomain>) -> Result<OptionPredicate> {
    match text.split_once('=') {
        None => {
            let name = text.trim();
            match domains.get(name) {
                Some(domain @ OptionDomain::Enumerated(_)) => bail!(
                    "condition `{}`: option `{}` is not boolean, write `{}=<value>` (one of: {})",
                    text,
                    name,
                    name,
                    domain.describe()
                ),
                _ => Ok(OptionPredicate::enabled(name)),
            }
        }
        Some((name, raw_value)) => {
            let name = name.trim();
            let domain = domains
                .get(name)
                .with_context(|| format!("condition `{}` refers to undeclared option `{}`", text, name))?;
            let value = domain.parse(raw_value).with_context(|| {
                format!(
                    "condition `{}`: `{}` is not a valid value (expected one of: {})",
                    text,
                    raw_value.trim(),
                    domain.describe()
                )
            })?;
            Ok(OptionPredicate::equals(name, value))
        }
    }
}

fn convert_dependency(
    raw: RawDependency,
    kind: DependencyKind,
    options: &OptionModel,
) -> Result<Dependency> {
    let (name, version, transitive, when) = match raw {
        RawDependency::Simple(reference) => {
            let (name, version) = reference
                .split_once('/')
                .with_context(|| format!("invalid dependency `{}` (expected name/version)", reference))?;
            (name.to_string(), version.to_string(), false, Vec::new())
        }
        RawDependency::Detailed {
            name,
            version,
            transitive_headers,
            when,
        } => (
            name,
            version,
            transitive_headers,
            when.map(RawWhen::into_vec).unwrap_or_default(),
        ),
    };

    let version = parse_exact_version(&version)
        .with_context(|| format!("dependency `{}`: invalid exact version `{}`", name, version))?;

    let domains: HashMap<String, OptionDomain> = options
        .decls()
        .iter()
        .map(|d| (d.name.clone(), d.domain.clone()))
        .collect();

    let activation = if when.is_empty() {
        Activation::Always
    } else {
        let mut predicates = Vec::with_capacity(when.len());
        for condition in &when {
            let predicate = parse_predicate(condition, &domains)?;
            if !domains.contains_key(&predicate.option) {
                bail!(
                    "dependency `{}` is conditional on undeclared option `{}`",
                    name,
                    predicate.option
                );
            }
            predicates.push(predicate);
        }
        Activation::All(predicates)
    };

    Ok(Dependency::new(name, version)
        .with_kind(kind)
        .with_transitive_headers(transitive)
        .with_activation(activation))
}

/// Starter recipe written by `slipway init`.
pub fn generate_recipe(name: &str) -> String {
    format!(
        r#"[package]
name = "{name}"
version = "0.1.0"
kind = "library"
libs = ["{name}"]

[options.shared]
default = false
variable = "BUILD_SHARED_LIBS"

[options.fPIC]
default = true
variable = "CMAKE_POSITION_INDEPENDENT_CODE"
unsupported_on = ["windows"]
removed_when = ["shared"]

[options.enable_tests]
default = true
variable = "BUILD_TESTING"

[[test_requires]]
name = "gtest"
version = "1.16.0"
when = ["enable_tests"]

[build]
test_binary = "{name}_tests"

[test_package]
executable = "example"
"#
    )
}
