//! Precompiled resolution plans.
//!
//! A plan flattens a composition's bindings into per-part construction and
//! settable import lists plus a contract table for root requests. It can be
//! persisted and reloaded to skip binding and validation; a plan is only
//! accepted next to the exact catalog it was compiled from.

use std::collections::HashMap;
use std::path::Path;

use partsmith_common::constants::PLAN_FORMAT_VERSION;
use partsmith_common::error::{CompositionError, Result};
use partsmith_common::types::ContractIdentity;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ExportRef};
use crate::composition::Composition;
use crate::descriptor::ImportDescriptor;

/// An import together with the exports satisfying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedImport {
    /// Index of the import within its part.
    pub import: usize,
    /// Satisfying exports in binding order.
    pub satisfiers: Vec<ExportRef>,
}

/// The imports of one part, split by when they are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedPart {
    /// Imports resolved before construction, in declaration order.
    pub construction: Vec<PlannedImport>,
    /// Imports applied after construction, in declaration order.
    pub settable: Vec<PlannedImport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RootEntry {
    contract: ContractIdentity,
    exports: Vec<ExportRef>,
}

/// A compiled, persistable form of a composition's bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionPlan {
    version: u32,
    fingerprint: String,
    parts: Vec<PlannedPart>,
    roots: Vec<RootEntry>,
    #[serde(skip)]
    root_index: HashMap<ContractIdentity, usize>,
}

impl ResolutionPlan {
    /// Compiles the bindings of a validated composition.
    #[must_use]
    pub fn compile(composition: &Composition) -> Self {
        let catalog = composition.catalog();
        let parts = composition
            .parts()
            .iter()
            .map(|part| {
                let descriptor = catalog.part(part.part());
                let planned = |(idx, _): (usize, &ImportDescriptor)| PlannedImport {
                    import: idx,
                    satisfiers: part.satisfiers(idx).to_vec(),
                };
                PlannedPart {
                    construction: descriptor.construction_imports().map(planned).collect(),
                    settable: descriptor.settable_imports().map(planned).collect(),
                }
            })
            .collect();

        let mut contracts: Vec<&ContractIdentity> = catalog.contracts().collect();
        contracts.sort();
        let roots = contracts
            .into_iter()
            .map(|contract| RootEntry {
                contract: contract.clone(),
                exports: catalog.exports_for(contract).to_vec(),
            })
            .collect();

        let mut plan = Self {
            version: PLAN_FORMAT_VERSION,
            fingerprint: catalog.fingerprint().to_owned(),
            parts,
            roots,
            root_index: HashMap::new(),
        };
        plan.rebuild_index();
        tracing::debug!(parts = plan.parts.len(), "resolution plan compiled");
        plan
    }

    /// Writes the plan as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| CompositionError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::info!(path = %path.display(), "resolution plan saved");
        Ok(())
    }

    /// Reads a plan and checks it against the catalog it will run with.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or
    /// [`CompositionError::PlanMismatch`] if it was compiled from a
    /// different catalog or by an incompatible format version.
    pub fn load(path: &Path, catalog: &Catalog) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CompositionError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut plan: Self = serde_json::from_str(&content)?;
        plan.verify(catalog)?;
        plan.rebuild_index();
        tracing::info!(path = %path.display(), parts = plan.parts.len(), "resolution plan loaded");
        Ok(plan)
    }

    /// Checks that the plan was compiled from `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::PlanMismatch`] on any mismatch.
    pub fn verify(&self, catalog: &Catalog) -> Result<()> {
        if self.version != PLAN_FORMAT_VERSION {
            return Err(CompositionError::PlanMismatch {
                expected: format!("format version {PLAN_FORMAT_VERSION}"),
                actual: format!("format version {}", self.version),
            });
        }
        if self.fingerprint != catalog.fingerprint() {
            return Err(CompositionError::PlanMismatch {
                expected: catalog.fingerprint().to_owned(),
                actual: self.fingerprint.clone(),
            });
        }
        if self.parts.len() != catalog.len() {
            return Err(CompositionError::PlanMismatch {
                expected: format!("{} parts", catalog.len()),
                actual: format!("{} parts", self.parts.len()),
            });
        }
        Ok(())
    }

    /// Returns the planned imports of the part at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn part(&self, index: usize) -> &PlannedPart {
        &self.parts[index]
    }

    /// Returns the number of planned parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns whether the plan covers no parts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns the exports a root request for `contract` can use.
    #[must_use]
    pub fn root_exports(&self, contract: &ContractIdentity) -> &[ExportRef] {
        self.root_index
            .get(contract)
            .map_or(&[], |&idx| self.roots[idx].exports.as_slice())
    }

    /// Returns the catalog fingerprint the plan was compiled from.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn rebuild_index(&mut self) {
        self.root_index = self
            .roots
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.contract.clone(), idx))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use partsmith_common::types::{Cardinality, TypeRef};

    use super::*;
    use crate::descriptor::{ExportDescriptor, PartDescriptor};

    fn parts() -> Vec<PartDescriptor> {
        vec![
            PartDescriptor::new("clock")
                .shared()
                .export(ExportDescriptor::new("Clock", TypeRef::named("Clock"))),
            PartDescriptor::new("audit")
                .export(ExportDescriptor::new("Audit", TypeRef::named("Audit")))
                .import(ImportDescriptor::new("clock", "Clock", TypeRef::named("Clock")))
                .import(
                    ImportDescriptor::new("sinks", "Sink", TypeRef::named("Sink"))
                        .cardinality(Cardinality::ZeroOrMore)
                        .settable(),
                ),
        ]
    }

    fn composition() -> Composition {
        Composition::build(Catalog::new(parts()).expect("catalog")).expect("composition")
    }

    #[test]
    fn compile_splits_imports_by_kind() {
        let plan = ResolutionPlan::compile(&composition());
        assert_eq!(plan.len(), 2);
        let audit = plan.part(1);
        assert_eq!(audit.construction.len(), 1);
        assert_eq!(audit.construction[0].satisfiers, vec![ExportRef { part: 0, export: 0 }]);
        assert_eq!(audit.settable.len(), 1);
        assert!(audit.settable[0].satisfiers.is_empty());
    }

    #[test]
    fn root_exports_match_catalog() {
        let composition = composition();
        let plan = ResolutionPlan::compile(&composition);
        let contract = ContractIdentity::new("Audit");
        assert_eq!(plan.root_exports(&contract), composition.root_exports(&contract));
        assert!(plan.root_exports(&"Unknown".into()).is_empty());
    }

    #[test]
    fn save_and_load_against_same_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.plan.json");
        let plan = ResolutionPlan::compile(&composition());
        plan.save(&path).expect("save");

        let catalog = Catalog::new(parts()).expect("catalog");
        let loaded = ResolutionPlan::load(&path, &catalog).expect("load");
        assert_eq!(loaded.fingerprint(), plan.fingerprint());
        assert_eq!(loaded.part(1), plan.part(1));
        assert_eq!(loaded.root_exports(&"Clock".into()).len(), 1);
    }

    #[test]
    fn load_rejects_changed_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.plan.json");
        ResolutionPlan::compile(&composition()).save(&path).expect("save");

        let mut changed = parts();
        changed[0] = changed[0].clone().shared_within("request");
        let catalog = Catalog::new(changed).expect("catalog");
        let err = ResolutionPlan::load(&path, &catalog).unwrap_err();
        assert!(matches!(err, CompositionError::PlanMismatch { .. }), "got: {err}");
    }

    #[test]
    fn load_reports_missing_file() {
        let catalog = Catalog::new(parts()).expect("catalog");
        let err = ResolutionPlan::load(Path::new("/nonexistent/app.plan.json"), &catalog)
            .unwrap_err();
        assert!(matches!(err, CompositionError::Io { .. }), "got: {err}");
    }
}
