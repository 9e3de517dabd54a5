//! Graph binder: matches every import to the exports that satisfy it.
//!
//! Binding never fails. An import with no or too many matches is bound
//! to exactly what the catalog offers and left for the validator to judge.

use crate::catalog::{Catalog, ExportRef};
use crate::part::ComposablePart;

/// Binds every part in the catalog, in catalog order.
#[must_use]
pub fn bind(catalog: &Catalog) -> Vec<ComposablePart> {
    let parts: Vec<ComposablePart> = (0..catalog.len())
        .map(|idx| bind_part(catalog, idx))
        .collect();
    tracing::debug!(parts = parts.len(), "catalog bound");
    parts
}

/// Binds a single part: one satisfier list per import, possibly empty.
#[must_use]
pub fn bind_part(catalog: &Catalog, part: usize) -> ComposablePart {
    let descriptor = catalog.part(part);
    let satisfiers = descriptor
        .imports
        .iter()
        .map(|import| {
            catalog
                .exports_for(&import.contract)
                .iter()
                .copied()
                .filter(|export| import.accepts_metadata(catalog.export(*export)))
                .collect::<Vec<ExportRef>>()
        })
        .collect();
    ComposablePart::from_ordered(part, satisfiers)
}

#[cfg(test)]
mod tests {
    use partsmith_common::types::{Cardinality, TypeRef};

    use super::*;
    use crate::descriptor::{ExportDescriptor, ImportDescriptor, PartDescriptor};

    #[test]
    fn unsatisfied_import_gets_empty_entry() {
        let catalog = Catalog::new(vec![
            PartDescriptor::new("lonely").import(ImportDescriptor::new(
                "missing",
                "Nowhere",
                TypeRef::named("Nowhere"),
            )),
        ])
        .expect("catalog");

        let parts = bind(&catalog);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].import_count(), 1);
        assert!(parts[0].satisfiers(0).is_empty());
    }

    #[test]
    fn excess_matches_are_kept_in_catalog_order() {
        let catalog = Catalog::new(vec![
            PartDescriptor::new("first").export(ExportDescriptor::new("Log", TypeRef::named("Log"))),
            PartDescriptor::new("second")
                .export(ExportDescriptor::new("Log", TypeRef::named("Log"))),
            PartDescriptor::new("app").import(ImportDescriptor::new(
                "log",
                "Log",
                TypeRef::named("Log"),
            )),
        ])
        .expect("catalog");

        let app = bind_part(&catalog, 2);
        let owners: Vec<usize> = app.satisfiers(0).iter().map(|e| e.part).collect();
        assert_eq!(owners, vec![0, 1]);
    }

    #[test]
    fn metadata_constraints_filter_candidates() {
        let catalog = Catalog::new(vec![
            PartDescriptor::new("pg").export(
                ExportDescriptor::new("Db", TypeRef::named("Db")).metadata("engine", "postgres"),
            ),
            PartDescriptor::new("sqlite").export(
                ExportDescriptor::new("Db", TypeRef::named("Db")).metadata("engine", "sqlite"),
            ),
            PartDescriptor::new("app").import(
                ImportDescriptor::new("db", "Db", TypeRef::named("Db"))
                    .cardinality(Cardinality::ZeroOrMore)
                    .constraint("engine", "sqlite"),
            ),
        ])
        .expect("catalog");

        let app = bind_part(&catalog, 2);
        assert_eq!(app.satisfiers(0), &[ExportRef { part: 1, export: 0 }]);
    }

    #[test]
    fn part_may_satisfy_its_own_import() {
        let catalog = Catalog::new(vec![
            PartDescriptor::new("node")
                .export(ExportDescriptor::new("Node", TypeRef::named("Node")))
                .import(
                    ImportDescriptor::new("next", "Node", TypeRef::named("Node"))
                        .cardinality(Cardinality::OneOrZero)
                        .settable(),
                ),
        ])
        .expect("catalog");

        let node = bind_part(&catalog, 0);
        assert_eq!(node.satisfiers(0), &[ExportRef { part: 0, export: 0 }]);
    }
}
