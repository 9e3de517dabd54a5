//! Part, export, and import descriptors.
//!
//! Descriptors are plain immutable data produced by whatever discovers
//! parts. They carry no behavior; activation logic is paired with a part
//! at container creation time.

use std::collections::BTreeMap;

use partsmith_common::types::{Cardinality, ContractIdentity, ImportKind, PartId, Sharing, TypeRef};
use serde::Serialize;

/// A capability offered by a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportDescriptor {
    /// Contract the export satisfies.
    pub contract: ContractIdentity,
    /// Concrete type the export produces.
    pub produced_type: TypeRef,
    /// Further types the produced type can be used as.
    pub assignable_to: Vec<TypeRef>,
    /// Export metadata matched against import constraints.
    pub metadata: BTreeMap<String, String>,
}

impl ExportDescriptor {
    /// Creates an export of `contract` producing `produced_type`.
    #[must_use]
    pub fn new(contract: impl Into<ContractIdentity>, produced_type: TypeRef) -> Self {
        Self {
            contract: contract.into(),
            produced_type,
            assignable_to: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Declares an additional type the produced value is assignable to.
    #[must_use]
    pub fn assignable_to(mut self, ty: TypeRef) -> Self {
        self.assignable_to.push(ty);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns whether this export can satisfy an import expecting `expected`.
    #[must_use]
    pub fn satisfies_type(&self, expected: &TypeRef) -> bool {
        std::iter::once(&self.produced_type)
            .chain(&self.assignable_to)
            .any(|ty| ty.is_assignable_to(expected))
    }
}

/// A dependency declared by a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDescriptor {
    /// Import site name, unique within the owning part.
    pub name: String,
    /// Contract the import requires.
    pub contract: ContractIdentity,
    /// Element type the import accepts.
    pub expected_type: TypeRef,
    /// How many exports may satisfy the import.
    pub cardinality: Cardinality,
    /// Whether the import is needed to construct the owner.
    pub kind: ImportKind,
    /// When set, the import receives factories creating scopes with this name.
    pub boundary: Option<String>,
    /// Metadata every satisfying export must carry.
    pub constraints: BTreeMap<String, String>,
}

impl ImportDescriptor {
    /// Creates a construction-time import of exactly one `contract` export.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        contract: impl Into<ContractIdentity>,
        expected_type: TypeRef,
    ) -> Self {
        Self {
            name: name.into(),
            contract: contract.into(),
            expected_type,
            cardinality: Cardinality::ExactlyOne,
            kind: ImportKind::Construction,
            boundary: None,
            constraints: BTreeMap::new(),
        }
    }

    /// Sets the cardinality.
    #[must_use]
    pub const fn cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Marks the import as applied after construction.
    #[must_use]
    pub const fn settable(mut self) -> Self {
        self.kind = ImportKind::Settable;
        self
    }

    /// Requests boundary factories for the named sharing boundary.
    #[must_use]
    pub fn boundary(mut self, name: impl Into<String>) -> Self {
        self.boundary = Some(name.into());
        self
    }

    /// Requires satisfying exports to carry the given metadata entry.
    #[must_use]
    pub fn constraint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.constraints.insert(key.into(), value.into());
        self
    }

    /// Returns whether the import is resolved before construction.
    #[must_use]
    pub fn is_construction(&self) -> bool {
        self.kind == ImportKind::Construction
    }

    /// Returns whether `export` carries every required metadata entry.
    #[must_use]
    pub fn accepts_metadata(&self, export: &ExportDescriptor) -> bool {
        self.constraints
            .iter()
            .all(|(key, value)| export.metadata.get(key) == Some(value))
    }
}

/// A unit of composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartDescriptor {
    /// Part identity.
    pub id: PartId,
    /// Instance lifetime policy.
    pub sharing: Sharing,
    /// Capabilities the part offers.
    pub exports: Vec<ExportDescriptor>,
    /// Dependencies the part declares.
    pub imports: Vec<ImportDescriptor>,
}

impl PartDescriptor {
    /// Creates a non-shared part with no exports or imports.
    #[must_use]
    pub fn new(id: impl Into<PartId>) -> Self {
        Self {
            id: id.into(),
            sharing: Sharing::NonShared,
            exports: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Shares the part at the root.
    #[must_use]
    pub fn shared(mut self) -> Self {
        self.sharing = Sharing::Shared { boundary: None };
        self
    }

    /// Shares the part within the named boundary.
    #[must_use]
    pub fn shared_within(mut self, boundary: impl Into<String>) -> Self {
        self.sharing = Sharing::Shared {
            boundary: Some(boundary.into()),
        };
        self
    }

    /// Adds an export.
    #[must_use]
    pub fn export(mut self, export: ExportDescriptor) -> Self {
        self.exports.push(export);
        self
    }

    /// Adds an import.
    #[must_use]
    pub fn import(mut self, import: ImportDescriptor) -> Self {
        self.imports.push(import);
        self
    }

    /// Returns the construction-time imports with their indices, in
    /// declaration order.
    pub fn construction_imports(&self) -> impl Iterator<Item = (usize, &ImportDescriptor)> {
        self.imports
            .iter()
            .enumerate()
            .filter(|(_, import)| import.is_construction())
    }

    /// Returns the settable imports with their indices, in declaration order.
    pub fn settable_imports(&self) -> impl Iterator<Item = (usize, &ImportDescriptor)> {
        self.imports
            .iter()
            .enumerate()
            .filter(|(_, import)| !import.is_construction())
    }

    /// Returns the index of the named import.
    #[must_use]
    pub fn import_index(&self, name: &str) -> Option<usize> {
        self.imports.iter().position(|import| import.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_defaults_to_exactly_one_at_construction() {
        let import = ImportDescriptor::new("db", "Db", TypeRef::named("Db"));
        assert_eq!(import.cardinality, Cardinality::ExactlyOne);
        assert!(import.is_construction());
        assert!(import.boundary.is_none());
    }

    #[test]
    fn construction_imports_keep_declaration_order() {
        let part = PartDescriptor::new("svc")
            .import(ImportDescriptor::new("a", "A", TypeRef::named("A")))
            .import(ImportDescriptor::new("b", "B", TypeRef::named("B")).settable())
            .import(ImportDescriptor::new("c", "C", TypeRef::named("C")));
        let names: Vec<&str> = part
            .construction_imports()
            .map(|(_, import)| import.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        let settable: Vec<usize> = part.settable_imports().map(|(idx, _)| idx).collect();
        assert_eq!(settable, vec![1]);
    }

    #[test]
    fn metadata_constraints_must_all_match() {
        let export = ExportDescriptor::new("Db", TypeRef::named("Db"))
            .metadata("role", "replica")
            .metadata("region", "eu");
        let matching = ImportDescriptor::new("db", "Db", TypeRef::named("Db"))
            .constraint("role", "replica");
        let mismatching = ImportDescriptor::new("db", "Db", TypeRef::named("Db"))
            .constraint("role", "primary");
        assert!(matching.accepts_metadata(&export));
        assert!(!mismatching.accepts_metadata(&export));
    }

    #[test]
    fn export_satisfies_declared_interfaces() {
        let export = ExportDescriptor::new("Store", TypeRef::named("PgStore"))
            .assignable_to(TypeRef::named("Store"));
        assert!(export.satisfies_type(&TypeRef::named("Store")));
        assert!(export.satisfies_type(&TypeRef::named("PgStore")));
        assert!(!export.satisfies_type(&TypeRef::named("Cache")));
    }

    #[test]
    fn shared_within_sets_boundary() {
        let part = PartDescriptor::new("session").shared_within("request");
        assert_eq!(part.sharing.boundary(), Some("request"));
    }
}
