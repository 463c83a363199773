//! Recipe options and their resolution.
//!
//! Options are declared as data: a domain, a default, an optional build
//! variable mapping and a list of constraints. [`OptionModel::resolve`] is
//! the single generic resolver that turns defaults plus invoker overrides
//! into a conflict-free [`ResolvedConfiguration`].
//!
//! Constraints run in a fixed order after overrides are applied:
//!
//! 1. Platform constraints drop options that do not apply to the target OS.
//! 2. Exclusions run in declaration order. When a trigger predicate holds,
//!    the constrained option is removed or forced to `false`, even if the
//!    invoker set it explicitly. A later exclusion overwrites an earlier one.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::platform::{Os, Platform};

/// Value of a single option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Str(String),
}

impl OptionValue {
    /// Whether this value counts as "enabled" for predicates.
    pub fn is_enabled(&self) -> bool {
        matches!(self, OptionValue::Bool(true))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            OptionValue::Str(_) => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(true) => f.write_str("True"),
            OptionValue::Bool(false) => f.write_str("False"),
            OptionValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Str(s.to_string())
    }
}

/// The set of values an option may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionDomain {
    Boolean,
    Enumerated(Vec<String>),
}

impl OptionDomain {
    /// Parse a raw override string into a value of this domain.
    pub fn parse(&self, raw: &str) -> Option<OptionValue> {
        match self {
            OptionDomain::Boolean => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Some(OptionValue::Bool(true)),
                "false" | "0" | "off" | "no" => Some(OptionValue::Bool(false)),
                _ => None,
            },
            OptionDomain::Enumerated(values) => values
                .iter()
                .find(|v| v.as_str() == raw.trim())
                .map(|v| OptionValue::Str(v.clone())),
        }
    }

    pub fn contains(&self, value: &OptionValue) -> bool {
        match (self, value) {
            (OptionDomain::Boolean, OptionValue::Bool(_)) => true,
            (OptionDomain::Enumerated(values), OptionValue::Str(s)) => values.contains(s),
            _ => false,
        }
    }

    /// Human-readable list of accepted values, for error messages.
    pub fn describe(&self) -> String {
        match self {
            OptionDomain::Boolean => "True, False".to_string(),
            OptionDomain::Enumerated(values) => values.join(", "),
        }
    }
}

/// A condition over option values: `option == value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionPredicate {
    pub option: String,
    pub value: OptionValue,
}

impl OptionPredicate {
    /// Predicate that holds when a boolean option is `true`.
    pub fn enabled(option: impl Into<String>) -> Self {
        OptionPredicate {
            option: option.into(),
            value: OptionValue::Bool(true),
        }
    }

    pub fn equals(option: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        OptionPredicate {
            option: option.into(),
            value: value.into(),
        }
    }

    /// Evaluate against a set of values. An absent option never matches.
    pub fn holds(&self, values: &BTreeMap<String, OptionValue>) -> bool {
        values.get(&self.option) == Some(&self.value)
    }
}

impl fmt::Display for OptionPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.option, self.value)
    }
}

/// What an exclusion does to the option it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintAction {
    /// Drop the option from the configuration.
    Remove,
    /// Force a boolean option to `false`.
    Disable,
}

/// Mutual exclusion attached to an option: when `when` holds, apply `action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub when: OptionPredicate,
    pub action: ConstraintAction,
}

/// How an option maps onto a build-tool variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableMapping {
    Variable(String),
    /// Explicitly has no build-tool analog.
    NoMapping,
}

/// Declaration of a single option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDecl {
    pub name: String,
    pub domain: OptionDomain,
    pub default: OptionValue,
    /// `None` means the recipe forgot to say; generation rejects it.
    pub variable: Option<VariableMapping>,
    pub unsupported_on: Vec<Os>,
    pub exclusions: Vec<Exclusion>,
    pub description: Option<String>,
}

impl OptionDecl {
    /// Declare a boolean option.
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        OptionDecl {
            name: name.into(),
            domain: OptionDomain::Boolean,
            default: OptionValue::Bool(default),
            variable: None,
            unsupported_on: Vec::new(),
            exclusions: Vec::new(),
            description: None,
        }
    }

    /// Declare an option over a fixed list of string values.
    pub fn enumerated(
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
        default: impl Into<String>,
    ) -> Self {
        OptionDecl {
            name: name.into(),
            domain: OptionDomain::Enumerated(values.into_iter().map(Into::into).collect()),
            default: OptionValue::Str(default.into()),
            variable: None,
            unsupported_on: Vec::new(),
            exclusions: Vec::new(),
            description: None,
        }
    }

    pub fn variable(mut self, name: impl Into<String>) -> Self {
        self.variable = Some(VariableMapping::Variable(name.into()));
        self
    }

    pub fn no_variable(mut self) -> Self {
        self.variable = Some(VariableMapping::NoMapping);
        self
    }

    pub fn unsupported_on(mut self, os: Os) -> Self {
        self.unsupported_on.push(os);
        self
    }

    /// Remove this option whenever `trigger` is enabled.
    pub fn removed_when(mut self, trigger: impl Into<String>) -> Self {
        self.exclusions.push(Exclusion {
            when: OptionPredicate::enabled(trigger),
            action: ConstraintAction::Remove,
        });
        self
    }

    /// Force this option to `false` whenever `trigger` is enabled.
    pub fn disabled_when(mut self, trigger: impl Into<String>) -> Self {
        self.exclusions.push(Exclusion {
            when: OptionPredicate::enabled(trigger),
            action: ConstraintAction::Disable,
        });
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Errors raised while building an option model or resolving options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("invalid value `{value}` for option `{option}` (expected one of: {expected})")]
    InvalidOptionValue {
        option: String,
        value: String,
        expected: String,
    },

    #[error("unknown option `{option}`")]
    UnknownOption {
        option: String,
        available: Vec<String>,
    },

    #[error("option `{0}` is declared more than once")]
    DuplicateOption(String),

    #[error("default `{value}` of option `{option}` is outside its domain")]
    InvalidDefault { option: String, value: String },

    #[error("option `{option}` has a constraint on undeclared option `{target}`")]
    UnknownConstraintTarget { option: String, target: String },

    #[error("option `{option}` is not boolean and cannot be disabled by a constraint")]
    DisableNonBoolean { option: String },

    #[error("malformed option override `{0}` (expected name=value)")]
    MalformedOverride(String),
}

/// Invoker-supplied option overrides, keyed by option name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    values: BTreeMap<String, String>,
}

impl OptionOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `name=value` pairs as given on the command line.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Result<Self, OptionError> {
        let mut overrides = Self::new();
        for pair in pairs {
            let (name, value) = pair
                .split_once('=')
                .filter(|(name, _)| !name.trim().is_empty())
                .ok_or_else(|| OptionError::MalformedOverride(pair.to_string()))?;
            overrides.set(name.trim(), value.trim());
        }
        Ok(overrides)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Merge `other` into this set; `other` wins on conflicts.
    pub fn merge(&mut self, other: &OptionOverrides) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Why an option is missing from a resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Removal {
    /// Not applicable on the target OS.
    Platform { os: Os },
    /// Removed by an exclusion whose trigger held.
    Exclusion { trigger: String },
}

impl fmt::Display for Removal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Removal::Platform { os } => write!(f, "not applicable on {}", os),
            Removal::Exclusion { trigger } => write!(f, "excluded by {}", trigger),
        }
    }
}

/// An option dropped during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RemovedOption {
    pub name: String,
    #[serde(flatten)]
    pub reason: Removal,
}

/// Conflict-free option assignment for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedConfiguration {
    values: BTreeMap<String, OptionValue>,
    removed: Vec<RemovedOption>,
}

impl ResolvedConfiguration {
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// True only if the option is present and set to `true`.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(OptionValue::is_enabled)
    }

    pub fn values(&self) -> &BTreeMap<String, OptionValue> {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn removed(&self) -> &[RemovedOption] {
        &self.removed
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The declared options of a recipe, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionModel {
    decls: Vec<OptionDecl>,
}

impl OptionModel {
    /// Build a model, validating defaults and constraint targets.
    pub fn new(decls: Vec<OptionDecl>) -> Result<Self, OptionError> {
        let mut seen = HashSet::new();
        for decl in &decls {
            if !seen.insert(decl.name.as_str()) {
                return Err(OptionError::DuplicateOption(decl.name.clone()));
            }
            if !decl.domain.contains(&decl.default) {
                return Err(OptionError::InvalidDefault {
                    option: decl.name.clone(),
                    value: decl.default.to_string(),
                });
            }
        }

        for decl in &decls {
            for exclusion in &decl.exclusions {
                let trigger = decls.iter().find(|d| d.name == exclusion.when.option);
                match trigger {
                    Some(t) if t.domain.contains(&exclusion.when.value) => {}
                    _ => {
                        return Err(OptionError::UnknownConstraintTarget {
                            option: decl.name.clone(),
                            target: exclusion.when.option.clone(),
                        })
                    }
                }
                if exclusion.action == ConstraintAction::Disable
                    && decl.domain != OptionDomain::Boolean
                {
                    return Err(OptionError::DisableNonBoolean {
                        option: decl.name.clone(),
                    });
                }
            }
        }

        Ok(OptionModel { decls })
    }

    pub fn decls(&self) -> &[OptionDecl] {
        &self.decls
    }

    pub fn get(&self, name: &str) -> Option<&OptionDecl> {
        self.decls.iter().find(|d| d.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.decls.iter().map(|d| d.name.clone()).collect()
    }

    /// Resolve defaults, overrides and constraints for `platform`.
    pub fn resolve(
        &self,
        overrides: &OptionOverrides,
        platform: &Platform,
    ) -> Result<ResolvedConfiguration, OptionError> {
        let mut values: BTreeMap<String, OptionValue> = self
            .decls
            .iter()
            .map(|d| (d.name.clone(), d.default.clone()))
            .collect();

        for (name, raw) in overrides.iter() {
            let decl = self.get(name).ok_or_else(|| OptionError::UnknownOption {
                option: name.to_string(),
                available: self.names(),
            })?;
            let value = decl
                .domain
                .parse(raw)
                .ok_or_else(|| OptionError::InvalidOptionValue {
                    option: name.to_string(),
                    value: raw.to_string(),
                    expected: decl.domain.describe(),
                })?;
            values.insert(name.to_string(), value);
        }

        let mut removed = Vec::new();

        for decl in &self.decls {
            if decl.unsupported_on.contains(&platform.os) && values.remove(&decl.name).is_some() {
                tracing::debug!("option `{}` dropped on {}", decl.name, platform.os);
                removed.push(RemovedOption {
                    name: decl.name.clone(),
                    reason: Removal::Platform { os: platform.os },
                });
            }
        }

        for decl in &self.decls {
            for exclusion in &decl.exclusions {
                if !exclusion.when.holds(&values) || !values.contains_key(&decl.name) {
                    continue;
                }
                match exclusion.action {
                    ConstraintAction::Remove => {
                        values.remove(&decl.name);
                        tracing::debug!("option `{}` removed by {}", decl.name, exclusion.when);
                        removed.push(RemovedOption {
                            name: decl.name.clone(),
                            reason: Removal::Exclusion {
                                trigger: exclusion.when.option.clone(),
                            },
                        });
                    }
                    ConstraintAction::Disable => {
                        tracing::debug!("option `{}` disabled by {}", decl.name, exclusion.when);
                        values.insert(decl.name.clone(), OptionValue::Bool(false));
                    }
                }
            }
        }

        Ok(ResolvedConfiguration { values, removed })
    }
}
