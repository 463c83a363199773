//! Resolution error types and diagnostics.

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic, UnresolvedDependencyError};

/// Error during dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unresolved dependency `{name}/{version}` (required by {required_by})")]
    UnresolvedDependency {
        name: String,
        version: String,
        required_by: String,
        /// Where the database looked.
        searched: String,
    },
}

impl ResolveError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::UnresolvedDependency {
                name,
                version,
                required_by,
                searched,
            } => Diagnostic::error(format!("unresolved dependency `{}/{}`", name, version))
                .with_context(format!("required by {}", required_by))
                .with_context(format!("searched {}", searched))
                .with_suggestion(format!(
                    "Create {}/{} so it is installed in the package store",
                    name, version
                ))
                .with_suggestion(suggestions::MISSING_PACKAGE),
        }
    }

    /// Convert to a miette report for rich terminal output.
    pub fn to_report(&self) -> UnresolvedDependencyError {
        match self {
            ResolveError::UnresolvedDependency {
                name,
                version,
                required_by,
                searched,
            } => UnresolvedDependencyError {
                name: name.clone(),
                version: version.clone(),
                help: Some(format!(
                    "{} requires it; nothing matching was found in {}",
                    required_by, searched
                )),
            },
        }
    }
}
