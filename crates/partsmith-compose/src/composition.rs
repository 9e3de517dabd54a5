//! The validated, immutable result of binding a catalog.

use partsmith_common::error::Result;
use partsmith_common::types::ContractIdentity;

use crate::binder;
use crate::catalog::{Catalog, ExportRef};
use crate::descriptor::PartDescriptor;
use crate::part::ComposablePart;
use crate::plan::ResolutionPlan;
use crate::validator;

/// A catalog together with its fully bound and validated parts.
///
/// Built once and never mutated; changing the configuration means
/// building a new composition.
#[derive(Debug)]
pub struct Composition {
    catalog: Catalog,
    parts: Vec<ComposablePart>,
}

impl Composition {
    /// Binds and validates every part of `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::Validation`] listing every violation
    /// if the bound graph is not well-formed. No partially valid
    /// composition is ever returned.
    ///
    /// [`CompositionError::Validation`]: partsmith_common::error::CompositionError::Validation
    pub fn build(catalog: Catalog) -> Result<Self> {
        let parts = binder::bind(&catalog);
        validator::validate(&catalog, &parts)?;
        tracing::info!(
            parts = parts.len(),
            fingerprint = %catalog.fingerprint(),
            "composition built"
        );
        Ok(Self { catalog, parts })
    }

    /// Rebuilds a composition from a verified resolution plan, skipping
    /// binding and validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan does not belong to `catalog` or does
    /// not bind every import of every part exactly once.
    pub fn from_plan(catalog: Catalog, plan: &ResolutionPlan) -> Result<Self> {
        plan.verify(&catalog)?;
        let parts = (0..catalog.len())
            .map(|idx| {
                let planned = plan.part(idx);
                let mapping = planned
                    .construction
                    .iter()
                    .chain(&planned.settable)
                    .map(|p| (p.import, p.satisfiers.clone()))
                    .collect();
                ComposablePart::new(&catalog, idx, mapping)
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(parts = parts.len(), "composition restored from plan");
        Ok(Self { catalog, parts })
    }

    /// Returns the underlying catalog.
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns every composable part in catalog order.
    #[must_use]
    pub fn parts(&self) -> &[ComposablePart] {
        &self.parts
    }

    /// Returns the composable part at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn part(&self, index: usize) -> &ComposablePart {
        &self.parts[index]
    }

    /// Returns the descriptor of the part at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn descriptor(&self, index: usize) -> &PartDescriptor {
        self.catalog.part(index)
    }

    /// Returns the exports a root-level request for `contract` can use.
    #[must_use]
    pub fn root_exports(&self, contract: &ContractIdentity) -> &[ExportRef] {
        self.catalog.exports_for(contract)
    }
}
