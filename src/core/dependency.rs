//! Dependency declarations.
//!
//! A Dependency names another package at an exact version, says whether its
//! headers leak to our own consumers, and carries an activation predicate
//! over the recipe's options.

use std::fmt;

use semver::Version;
use serde::Serialize;

use crate::core::option::{OptionPredicate, ResolvedConfiguration};

/// Whether a dependency is needed to use the package or only to test it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Regular requirement, part of the package's link surface.
    Requires,
    /// Needed only while building and testing (test frameworks, benchmarks).
    TestRequires,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Requires => write!(f, "requires"),
            DependencyKind::TestRequires => write!(f, "test_requires"),
        }
    }
}

/// When a dependency is active.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Always,
    /// Active only when every predicate holds.
    All(Vec<OptionPredicate>),
}

impl Activation {
    pub fn when(option: impl Into<String>) -> Self {
        Activation::All(vec![OptionPredicate::enabled(option)])
    }

    pub fn is_active(&self, config: &ResolvedConfiguration) -> bool {
        match self {
            Activation::Always => true,
            Activation::All(predicates) => predicates.iter().all(|p| p.holds(config.values())),
        }
    }
}

/// A declared dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    name: String,
    version: Version,
    transitive_headers: bool,
    kind: DependencyKind,
    activation: Activation,
}

impl Dependency {
    /// Create an unconditional regular dependency.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Dependency {
            name: name.into(),
            version,
            transitive_headers: false,
            kind: DependencyKind::Requires,
            activation: Activation::Always,
        }
    }

    /// Create an unconditional test-only dependency.
    pub fn test(name: impl Into<String>, version: Version) -> Self {
        Dependency::new(name, version).with_kind(DependencyKind::TestRequires)
    }

    pub fn with_transitive_headers(mut self, transitive: bool) -> Self {
        self.transitive_headers = transitive;
        self
    }

    pub fn with_kind(mut self, kind: DependencyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Whether this dependency's headers are visible to our consumers.
    pub fn transitive_headers(&self) -> bool {
        self.transitive_headers
    }

    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    pub fn activation(&self) -> &Activation {
        &self.activation
    }

    pub fn is_active(&self, config: &ResolvedConfiguration) -> bool {
        self.activation.is_active(config)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Parse an exact version, accepting the short `1.0` and `3` forms.
///
/// Missing minor/patch components are filled with zero; ranges and
/// requirement operators are rejected.
pub fn parse_exact_version(s: &str) -> Result<Version, semver::Error> {
    let s = s.trim();
    let (core, rest) = match s.find(['-', '+']) {
        Some(idx) => s.split_at(idx),
        None => (s, ""),
    };
    let dots = core.matches('.').count();
    let padded = match dots {
        0 => format!("{}.0.0{}", core, rest),
        1 => format!("{}.0{}", core, rest),
        _ => s.to_string(),
    };
    Version::parse(&padded)
}
