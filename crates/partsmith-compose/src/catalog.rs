//! Immutable, contract-indexed collection of part descriptors.
//!
//! The catalog performs no graph validation: it may describe an
//! unsatisfiable or cyclic configuration. Its invariants are that every
//! part identity appears once and that import site names are unique
//! within their part.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use partsmith_common::error::{CompositionError, Result};
use partsmith_common::types::{ContractIdentity, PartId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::descriptor::{ExportDescriptor, ImportDescriptor, PartDescriptor};

/// A bound export: an export descriptor together with its owning part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportRef {
    /// Index of the owning part in the catalog.
    pub part: usize,
    /// Index of the export within the owning part.
    pub export: usize,
}

/// A bound import, identified by its owning part and descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportRef {
    /// Index of the owning part in the catalog.
    pub part: usize,
    /// Index of the import within the owning part.
    pub import: usize,
}

/// An immutable set of part descriptors with a contract index.
#[derive(Debug)]
pub struct Catalog {
    parts: Vec<PartDescriptor>,
    by_id: HashMap<PartId, usize>,
    index: HashMap<ContractIdentity, Vec<ExportRef>>,
    fingerprint: String,
}

impl Catalog {
    /// Builds a catalog and its reverse contract index.
    ///
    /// Index entries keep descriptor insertion order, then export
    /// declaration order, so lookups and diagnostics are reproducible.
    ///
    /// # Errors
    ///
    /// Returns an error if two descriptors share a part identity, or if
    /// one descriptor repeats an import site name.
    pub fn new(parts: Vec<PartDescriptor>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(parts.len());
        let mut index: HashMap<ContractIdentity, Vec<ExportRef>> = HashMap::new();

        for (part_idx, part) in parts.iter().enumerate() {
            match by_id.entry(part.id.clone()) {
                Entry::Occupied(_) => {
                    return Err(CompositionError::DuplicatePart {
                        id: part.id.clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    let _ = slot.insert(part_idx);
                }
            }
            let mut names = HashSet::with_capacity(part.imports.len());
            if let Some(repeated) = part.imports.iter().find(|i| !names.insert(i.name.as_str())) {
                return Err(CompositionError::DuplicateImport {
                    part: part.id.clone(),
                    import: repeated.name.clone(),
                });
            }
            for (export_idx, export) in part.exports.iter().enumerate() {
                index
                    .entry(export.contract.clone())
                    .or_default()
                    .push(ExportRef {
                        part: part_idx,
                        export: export_idx,
                    });
            }
        }

        let fingerprint = fingerprint_of(&parts)?;
        tracing::debug!(
            parts = parts.len(),
            contracts = index.len(),
            %fingerprint,
            "catalog created"
        );

        Ok(Self {
            parts,
            by_id,
            index,
            fingerprint,
        })
    }

    /// Returns the exports satisfying `contract`, in catalog order.
    #[must_use]
    pub fn exports_for(&self, contract: &ContractIdentity) -> &[ExportRef] {
        self.index.get(contract).map_or(&[], Vec::as_slice)
    }

    /// Returns every part descriptor in insertion order.
    #[must_use]
    pub fn parts(&self) -> &[PartDescriptor] {
        &self.parts
    }

    /// Returns the part descriptor at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range for this catalog.
    #[must_use]
    pub fn part(&self, index: usize) -> &PartDescriptor {
        &self.parts[index]
    }

    /// Returns the index of the part with the given identity.
    #[must_use]
    pub fn find_part(&self, id: &PartId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Returns the export descriptor behind a bound export.
    ///
    /// # Panics
    ///
    /// Panics if the reference does not belong to this catalog.
    #[must_use]
    pub fn export(&self, export: ExportRef) -> &ExportDescriptor {
        &self.parts[export.part].exports[export.export]
    }

    /// Returns the import descriptor behind a bound import.
    ///
    /// # Panics
    ///
    /// Panics if the reference does not belong to this catalog.
    #[must_use]
    pub fn import(&self, import: ImportRef) -> &ImportDescriptor {
        &self.parts[import.part].imports[import.import]
    }

    /// Returns every contract that has at least one export.
    pub fn contracts(&self) -> impl Iterator<Item = &ContractIdentity> {
        self.index.keys()
    }

    /// Returns the number of parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns whether the catalog has no parts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns the SHA-256 digest of the catalog's descriptors.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Hashes the canonical JSON rendering of every descriptor.
fn fingerprint_of(parts: &[PartDescriptor]) -> Result<String> {
    let canonical = serde_json::to_vec(parts)?;
    let digest = Sha256::digest(&canonical);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use partsmith_common::types::TypeRef;

    use super::*;

    fn exporter(id: &str, contract: &str) -> PartDescriptor {
        PartDescriptor::new(id).export(ExportDescriptor::new(contract, TypeRef::named(contract)))
    }

    #[test]
    fn empty_catalog_has_no_exports() {
        let catalog = Catalog::new(Vec::new()).expect("catalog");
        assert!(catalog.is_empty());
        assert!(catalog.exports_for(&"X".into()).is_empty());
    }

    #[test]
    fn index_preserves_insertion_order() {
        let catalog = Catalog::new(vec![
            exporter("second", "Log"),
            exporter("other", "Db"),
            exporter("first", "Log"),
        ])
        .expect("catalog");

        let owners: Vec<&str> = catalog
            .exports_for(&"Log".into())
            .iter()
            .map(|e| catalog.part(e.part).id.as_str())
            .collect();
        assert_eq!(owners, vec!["second", "first"]);
    }

    #[test]
    fn contracts_with_constraints_are_indexed_separately() {
        let tagged = ContractIdentity::new("Db").with_constraint("role", "replica");
        let catalog = Catalog::new(vec![
            exporter("primary", "Db"),
            PartDescriptor::new("replica")
                .export(ExportDescriptor::new(tagged.clone(), TypeRef::named("Db"))),
        ])
        .expect("catalog");

        assert_eq!(catalog.exports_for(&"Db".into()).len(), 1);
        let replica = catalog.exports_for(&tagged);
        assert_eq!(replica.len(), 1);
        assert_eq!(catalog.part(replica[0].part).id.as_str(), "replica");
    }

    #[test]
    fn duplicate_part_is_rejected() {
        let err = Catalog::new(vec![exporter("a", "X"), exporter("a", "Y")]).unwrap_err();
        assert!(err.to_string().contains("duplicate part"), "got: {err}");
    }

    #[test]
    fn repeated_import_name_is_rejected() {
        let part = PartDescriptor::new("audit")
            .import(ImportDescriptor::new("sink", "Log", TypeRef::named("Log")))
            .import(ImportDescriptor::new("sink", "Db", TypeRef::named("Db")));
        let err = Catalog::new(vec![part]).unwrap_err();
        assert!(
            matches!(&err, CompositionError::DuplicateImport { part, import }
                if part.as_str() == "audit" && import == "sink"),
            "got: {err}"
        );
    }

    #[test]
    fn find_part_by_identity() {
        let catalog = Catalog::new(vec![exporter("a", "X"), exporter("b", "Y")]).expect("catalog");
        assert_eq!(catalog.find_part(&PartId::new("b")), Some(1));
        assert_eq!(catalog.find_part(&PartId::new("zz")), None);
    }

    #[test]
    fn fingerprint_tracks_descriptor_changes() {
        let a = Catalog::new(vec![exporter("a", "X")]).expect("catalog");
        let same = Catalog::new(vec![exporter("a", "X")]).expect("catalog");
        let changed = Catalog::new(vec![exporter("a", "Y")]).expect("catalog");
        assert_eq!(a.fingerprint(), same.fingerprint());
        assert_ne!(a.fingerprint(), changed.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
