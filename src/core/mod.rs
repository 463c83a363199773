//! Core data structures for Slipway.
//!
//! This module contains the foundational recipe types:
//! - Options, their constraints and resolution
//! - Dependencies and activation predicates
//! - Target platforms
//! - Recipes and the slipway.toml format

pub mod dependency;
pub mod manifest;
pub mod option;
pub mod platform;
pub mod recipe;

pub use dependency::{Activation, Dependency, DependencyKind};
pub use manifest::{find_recipe, RecipeNotFound, RECIPE_FILE};
pub use option::{
    OptionDecl, OptionError, OptionModel, OptionOverrides, OptionValue, ResolvedConfiguration,
};
pub use platform::{Arch, Os, Platform};
pub use recipe::{LifecycleHooks, PackageIdentity, PackageKind, Recipe, TestPackage};
