//! Boundary factories.
//!
//! An import that declares a boundary receives an [`ExportFactory`]
//! instead of an instance. Each [`ExportFactory::create`] call opens a
//! fresh child scope tagged with the boundary and resolves the exporting
//! part inside it, so parts shared within that boundary get one instance
//! per call.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use partsmith_common::error::{CompositionError, Result};
use partsmith_common::types::{PartId, ScopeId};

use crate::activator::Instance;
use crate::import::downcast;
use crate::scope::{Scope, ScopeInner};

/// Creates instances of one export, each in its own boundary scope.
#[derive(Clone)]
pub struct ExportFactory {
    parent: Weak<ScopeInner>,
    parent_id: ScopeId,
    boundary: String,
    part: usize,
    part_id: PartId,
}

impl ExportFactory {
    pub(crate) const fn new(
        parent: Weak<ScopeInner>,
        parent_id: ScopeId,
        boundary: String,
        part: usize,
        part_id: PartId,
    ) -> Self {
        Self {
            parent,
            parent_id,
            boundary,
            part,
            part_id,
        }
    }

    /// Returns the boundary opened by each call.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Returns the exporting part.
    #[must_use]
    pub const fn part(&self) -> &PartId {
        &self.part_id
    }

    /// Opens a new boundary scope and resolves the export inside it.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::ScopeDisposed`] if the scope that
    /// produced this factory is gone, or any error raised while resolving
    /// the part. A scope opened for a failed call is disposed before
    /// returning.
    pub fn create(&self) -> Result<ScopedExport> {
        let parent = self
            .parent
            .upgrade()
            .ok_or_else(|| CompositionError::ScopeDisposed {
                scope: self.parent_id.clone(),
            })?;
        let child = parent.child(self.boundary.clone())?;
        tracing::debug!(
            part = %self.part_id,
            boundary = %self.boundary,
            scope = %child.id(),
            "creating export in boundary scope"
        );

        let scope = Scope::from_inner(child);
        match scope.inner().request(self.part) {
            Ok(value) => Ok(ScopedExport {
                part: self.part_id.clone(),
                value,
                scope,
            }),
            Err(e) => {
                if let Err(cleanup) = scope.dispose() {
                    tracing::warn!(
                        scope = %scope.id(),
                        error = %cleanup,
                        "boundary scope disposal failed after a failed export"
                    );
                }
                Err(e)
            }
        }
    }
}

impl fmt::Debug for ExportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportFactory")
            .field("part", &self.part_id)
            .field("boundary", &self.boundary)
            .field("parent", &self.parent_id)
            .finish_non_exhaustive()
    }
}

/// An instance paired with the boundary scope that owns it.
///
/// Dropping the last handle of the scope disposes it, releasing every
/// instance created inside.
#[derive(Debug)]
pub struct ScopedExport {
    part: PartId,
    value: Instance,
    scope: Scope,
}

impl ScopedExport {
    /// Returns the created instance.
    #[must_use]
    pub const fn value(&self) -> &Instance {
        &self.value
    }

    /// Returns the created instance as a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::TypeMismatch`] if the instance is not
    /// a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        downcast(&self.part, &self.value)
    }

    /// Returns the boundary scope created for this instance.
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Disposes the boundary scope.
    ///
    /// # Errors
    ///
    /// See [`Scope::dispose`].
    pub fn dispose(self) -> Result<()> {
        self.scope.dispose()
    }
}
