//! Build variables derived from a resolved configuration.
//!
//! Every option a recipe declares must say how it reaches the build tool:
//! either `variable = "NAME"` or an explicit `variable = false`. Options
//! removed during resolution produce nothing.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::core::option::{OptionValue, ResolvedConfiguration, VariableMapping};
use crate::core::platform::{Arch, Os, Platform};
use crate::core::recipe::Recipe;

/// Variable that asks CMake for `compile_commands.json`.
pub const EXPORT_COMPILE_COMMANDS: &str = "CMAKE_EXPORT_COMPILE_COMMANDS";

/// Value of a build variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Str(String),
}

impl VariableValue {
    /// CMake cache type for `-D NAME:TYPE=VALUE`.
    pub fn cache_type(&self) -> &'static str {
        match self {
            VariableValue::Bool(_) => "BOOL",
            VariableValue::Str(_) => "STRING",
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Bool(true) => f.write_str("ON"),
            VariableValue::Bool(false) => f.write_str("OFF"),
            VariableValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&OptionValue> for VariableValue {
    fn from(value: &OptionValue) -> Self {
        match value {
            OptionValue::Bool(b) => VariableValue::Bool(*b),
            OptionValue::Str(s) => VariableValue::Str(s.clone()),
        }
    }
}

/// Errors raised while generating build-tool inputs.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("option `{option}` has no build variable mapping (set `variable = \"NAME\"` or `variable = false`)")]
    UnmappedOption { option: String },

    #[error("options map conflicting values onto `{variable}`: {first} and {second}")]
    ConflictingVariable {
        variable: String,
        first: String,
        second: String,
    },

    #[error("failed to write {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize dependency graph")]
    Serialize(#[from] serde_json::Error),
}

/// Flat, ordered `name -> value` mapping handed to the build tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BuildVariables {
    vars: BTreeMap<String, VariableValue>,
}

impl BuildVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: VariableValue) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.vars.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Add every variable of `other`, overwriting on conflict.
    pub fn extend(&mut self, other: BuildVariables) {
        self.vars.extend(other.vars);
    }

    /// Render as `-DNAME:TYPE=VALUE` arguments.
    pub fn to_cmake_args(&self) -> Vec<String> {
        self.vars
            .iter()
            .map(|(name, value)| format!("-D{}:{}={}", name, value.cache_type(), value))
            .collect()
    }

    /// Merge one option's value into `name`.
    ///
    /// Several boolean options may feed one variable; it is on when any of
    /// them is. String variables must agree.
    fn merge(&mut self, name: &str, value: VariableValue) -> Result<(), GenerateError> {
        match self.vars.entry(name.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match (slot.get_mut(), value) {
                (VariableValue::Bool(existing), VariableValue::Bool(b)) => *existing |= b,
                (existing, value) if *existing == value => {}
                (existing, value) => {
                    return Err(GenerateError::ConflictingVariable {
                        variable: name.to_string(),
                        first: existing.to_string(),
                        second: value.to_string(),
                    })
                }
            },
        }
        Ok(())
    }
}

/// Map a resolved configuration onto build variables.
pub fn generate_variables(
    recipe: &Recipe,
    config: &ResolvedConfiguration,
) -> Result<BuildVariables, GenerateError> {
    let mut vars = BuildVariables::new();

    for decl in recipe.options().decls() {
        let Some(value) = config.get(&decl.name) else {
            continue;
        };
        match &decl.variable {
            Some(VariableMapping::Variable(name)) => vars.merge(name, VariableValue::from(value))?,
            Some(VariableMapping::NoMapping) => {}
            None => {
                return Err(GenerateError::UnmappedOption {
                    option: decl.name.clone(),
                })
            }
        }
    }

    if recipe.hooks().export_compile_commands {
        vars.merge(EXPORT_COMPILE_COMMANDS, VariableValue::Bool(true))?;
    }

    Ok(vars)
}

/// Variables that point CMake at a foreign target.
///
/// Empty when `target` equals `host`.
pub fn cross_compile_variables(target: &Platform, host: &Platform) -> BuildVariables {
    let mut vars = BuildVariables::new();
    if target.os != host.os {
        vars.insert(
            "CMAKE_SYSTEM_NAME",
            VariableValue::Str(cmake_system_name(target.os).to_string()),
        );
    }
    if target.os != host.os || target.arch != host.arch {
        vars.insert(
            "CMAKE_SYSTEM_PROCESSOR",
            VariableValue::Str(cmake_processor(target.arch).to_string()),
        );
    }
    vars
}

fn cmake_system_name(os: Os) -> &'static str {
    match os {
        Os::Linux => "Linux",
        Os::Windows => "Windows",
        Os::Macos => "Darwin",
        Os::FreeBsd => "FreeBSD",
        Os::Android => "Android",
        Os::Ios => "iOS",
    }
}

fn cmake_processor(arch: Arch) -> &'static str {
    match arch {
        Arch::X86_64 => "x86_64",
        Arch::X86 => "i686",
        Arch::Aarch64 => "aarch64",
        Arch::Arm => "armv7-a",
        Arch::Riscv64 => "riscv64",
    }
}
