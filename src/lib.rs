//! Slipway - a declarative package-recipe engine for native C/C++ components
//!
//! A recipe declares options, dependencies and lifecycle switches. This
//! crate resolves the options for a platform, selects and looks up the
//! dependencies, maps the result onto build-tool variables and drives the
//! build tool through configure, build, test and packaging.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

/// Test doubles for the build tool and dependency database.
///
/// Only compiled for unit tests.
#[cfg(test)]
pub mod test_support;

pub use core::{
    dependency::Dependency, option::OptionModel, option::ResolvedConfiguration, platform::Platform,
    recipe::Recipe,
};

pub use resolver::{DependencyDatabase, LocalPackageStore};
pub use util::context::GlobalContext;
