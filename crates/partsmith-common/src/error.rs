//! Unified error types for the Partsmith workspace.
//!
//! Configuration-time problems found while validating a composition are
//! collected as [`Violation`]s and reported together through
//! [`CompositionError::Validation`]; everything else fails the single
//! operation that hit it.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Cardinality, ContractIdentity, PartId, ScopeId, TypeRef};

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CompositionError {
    /// Two descriptors in one catalog share a part identity.
    #[error("duplicate part in catalog: \"{id}\"")]
    DuplicatePart {
        /// The repeated identity.
        id: PartId,
    },

    /// One part declares two imports with the same site name.
    #[error("part \"{part}\" declares import \"{import}\" more than once")]
    DuplicateImport {
        /// The declaring part.
        part: PartId,
        /// The repeated import site name.
        import: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A composable part was built without exactly one entry per import.
    #[error("incomplete binding for part \"{part}\": {message}")]
    IncompleteBinding {
        /// Part whose import mapping is malformed.
        part: PartId,
        /// Description of the malformed entry.
        message: String,
    },

    /// The composition failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// The dependency graph has no activation order.
    #[error("cyclic dependency detected in part graph at \"{part}\"")]
    CyclicGraph {
        /// A part on the cycle.
        part: PartId,
    },

    /// A root request did not match exactly one export.
    #[error("expected exactly one export for contract {contract}, found {found}")]
    RootCardinality {
        /// Requested contract.
        contract: ContractIdentity,
        /// Number of exports available.
        found: usize,
    },

    /// A shared part was requested from a scope with no matching boundary.
    #[error("part \"{part}\" is shared within boundary \"{boundary}\" but no enclosing scope carries it")]
    BoundaryNotFound {
        /// Part being resolved.
        part: PartId,
        /// Boundary the part is shared within.
        boundary: String,
    },

    /// A shared part's construction-time imports lead back to itself.
    #[error("part \"{part}\" requires itself while it is being constructed")]
    CircularConstruction {
        /// Part under construction.
        part: PartId,
    },

    /// The scope was disposed before or during the request.
    #[error("scope {scope} has been disposed")]
    ScopeDisposed {
        /// Disposed scope.
        scope: ScopeId,
    },

    /// No activator was registered for a part.
    #[error("no activator registered for part \"{part}\"")]
    MissingActivator {
        /// Part lacking an activator.
        part: PartId,
    },

    /// An instance was not of the requested Rust type.
    #[error("instance of part \"{part}\" is not a {expected}")]
    TypeMismatch {
        /// Part that produced the instance.
        part: PartId,
        /// Requested Rust type name.
        expected: &'static str,
    },

    /// An import value was accessed in a way its binding cannot support.
    #[error("import \"{import}\": {message}")]
    ImportShape {
        /// Import site name.
        import: String,
        /// What went wrong.
        message: String,
    },

    /// A part's activator failed.
    #[error("activation of part \"{part}\" failed: {source}")]
    Activation {
        /// Part whose activator failed.
        part: PartId,
        /// Error returned by the activator.
        source: anyhow::Error,
    },

    /// A persisted resolution plan does not belong to the catalog.
    #[error("resolution plan does not match catalog: expected {expected}, got {actual}")]
    PlanMismatch {
        /// Value derived from the catalog.
        expected: String,
        /// Value recorded in the plan.
        actual: String,
    },

    /// A runtime lock was poisoned by a panicking thread.
    #[error("{what} lock poisoned")]
    LockPoisoned {
        /// Name of the guarded state.
        what: &'static str,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CompositionError>;

/// A single problem found while validating a composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// An import has too few or too many satisfying exports.
    Cardinality {
        /// Importing part.
        part: PartId,
        /// Import site name.
        import: String,
        /// Required contract.
        contract: ContractIdentity,
        /// Declared cardinality.
        cardinality: Cardinality,
        /// Parts owning the satisfying exports, in binding order.
        candidates: Vec<PartId>,
    },
    /// A satisfying export produces a type the import cannot accept.
    TypeMismatch {
        /// Importing part.
        part: PartId,
        /// Import site name.
        import: String,
        /// Required contract.
        contract: ContractIdentity,
        /// Part owning the offending export.
        exporter: PartId,
        /// Type produced by the export.
        produced: TypeRef,
        /// Type expected by the import.
        expected: TypeRef,
    },
    /// Non-shared parts depend on each other in a loop.
    NonSharedCycle {
        /// Parts on the cycle, in catalog order.
        parts: Vec<PartId>,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cardinality {
                part,
                import,
                contract,
                cardinality,
                candidates,
            } => {
                write!(
                    f,
                    "part \"{part}\" import \"{import}\" requires {cardinality} export(s) of {contract}, found {}",
                    candidates.len()
                )?;
                if !candidates.is_empty() {
                    let names: Vec<&str> = candidates.iter().map(PartId::as_str).collect();
                    write!(f, " ({})", names.join(", "))?;
                }
                Ok(())
            }
            Self::TypeMismatch {
                part,
                import,
                contract,
                exporter,
                produced,
                expected,
            } => write!(
                f,
                "part \"{part}\" import \"{import}\" expects {expected} for {contract}, but \"{exporter}\" produces {produced}"
            ),
            Self::NonSharedCycle { parts } => {
                let names: Vec<&str> = parts.iter().map(PartId::as_str).collect();
                write!(f, "cycle among non-shared parts: {}", names.join(" -> "))
            }
        }
    }
}

/// Every violation found while validating one composition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationFailure {
    violations: Vec<Violation>,
}

impl ValidationFailure {
    /// Wraps a non-empty list of violations.
    #[must_use]
    pub const fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Returns the violations in the order they were found.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Returns whether any violation names the given part.
    #[must_use]
    pub fn mentions(&self, id: &PartId) -> bool {
        self.violations.iter().any(|v| match v {
            Violation::Cardinality { part, .. } => part == id,
            Violation::TypeMismatch { part, exporter, .. } => part == id || exporter == id,
            Violation::NonSharedCycle { parts } => parts.contains(id),
        })
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "composition is invalid ({} violation(s))",
            self.violations.len()
        )?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_lists_every_violation() {
        let failure = ValidationFailure::new(vec![
            Violation::Cardinality {
                part: PartId::new("b"),
                import: "logger".into(),
                contract: ContractIdentity::new("Logger"),
                cardinality: Cardinality::ExactlyOne,
                candidates: Vec::new(),
            },
            Violation::NonSharedCycle {
                parts: vec![PartId::new("x"), PartId::new("y")],
            },
        ]);
        let msg = failure.to_string();
        assert!(msg.contains("2 violation(s)"), "got: {msg}");
        assert!(msg.contains("import \"logger\""), "got: {msg}");
        assert!(msg.contains("x -> y"), "got: {msg}");
    }

    #[test]
    fn failure_mentions_exporter_of_type_mismatch() {
        let failure = ValidationFailure::new(vec![Violation::TypeMismatch {
            part: PartId::new("consumer"),
            import: "repo".into(),
            contract: ContractIdentity::new("Repo"),
            exporter: PartId::new("provider"),
            produced: TypeRef::named("Cache"),
            expected: TypeRef::named("Repo"),
        }]);
        assert!(failure.mentions(&PartId::new("consumer")));
        assert!(failure.mentions(&PartId::new("provider")));
        assert!(!failure.mentions(&PartId::new("other")));
    }

    #[test]
    fn validation_error_is_transparent() {
        let err = CompositionError::from(ValidationFailure::new(vec![
            Violation::NonSharedCycle {
                parts: vec![PartId::new("a")],
            },
        ]));
        assert!(err.to_string().starts_with("composition is invalid"));
    }
}
