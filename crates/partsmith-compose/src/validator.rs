//! Static validation of a bound part graph.
//!
//! Checks performed, all aggregated into one failure:
//!
//! 1. Every import's satisfier count matches its cardinality.
//! 2. Every satisfying export produces a type the import accepts.
//! 3. Non-shared parts do not depend on each other in a loop.

use std::collections::HashMap;

use partsmith_common::error::{Result, ValidationFailure, Violation};
use partsmith_common::types::PartId;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::catalog::{Catalog, ImportRef};
use crate::part::ComposablePart;

/// Validates the bound parts of a catalog.
///
/// # Errors
///
/// Returns every violation found, in part order, then import order,
/// then cycles ordered by their first member.
pub fn validate(catalog: &Catalog, parts: &[ComposablePart]) -> Result<()> {
    let mut violations = Vec::new();
    for part in parts {
        check_imports(catalog, part, &mut violations);
    }
    violations.extend(find_non_shared_cycles(catalog, parts));

    if violations.is_empty() {
        return Ok(());
    }
    tracing::warn!(count = violations.len(), "composition failed validation");
    Err(ValidationFailure::new(violations).into())
}

fn check_imports(catalog: &Catalog, part: &ComposablePart, out: &mut Vec<Violation>) {
    let owner = &catalog.part(part.part()).id;
    for (import_ref, exports) in part.bindings() {
        let import = catalog.import(import_ref);

        if !import.cardinality.accepts(exports.len()) {
            out.push(Violation::Cardinality {
                part: owner.clone(),
                import: import.name.clone(),
                contract: import.contract.clone(),
                cardinality: import.cardinality,
                candidates: exports
                    .iter()
                    .map(|e| catalog.part(e.part).id.clone())
                    .collect(),
            });
        }

        for &export_ref in exports {
            let export = catalog.export(export_ref);
            if !export.satisfies_type(&import.expected_type) {
                out.push(Violation::TypeMismatch {
                    part: owner.clone(),
                    import: import.name.clone(),
                    contract: import.contract.clone(),
                    exporter: catalog.part(export_ref.part).id.clone(),
                    produced: export.produced_type.clone(),
                    expected: import.expected_type.clone(),
                });
            }
        }
    }
}

/// Finds dependency loops made only of non-shared parts.
///
/// Every strongly connected component with more than one part is a
/// cycle, as is a part that satisfies one of its own imports. Parts
/// reached along several non-cyclic paths are not reported.
fn find_non_shared_cycles(catalog: &Catalog, parts: &[ComposablePart]) -> Vec<Violation> {
    let mut graph: DiGraph<usize, ImportRef> = DiGraph::new();
    let mut nodes: HashMap<usize, NodeIndex> = HashMap::new();
    for part in parts {
        if !catalog.part(part.part()).sharing.is_shared() {
            let _ = nodes.insert(part.part(), graph.add_node(part.part()));
        }
    }

    for part in parts {
        let Some(&from) = nodes.get(&part.part()) else {
            continue;
        };
        for (import_ref, exports) in part.bindings() {
            for export in exports {
                if let Some(&to) = nodes.get(&export.part) {
                    let _ = graph.update_edge(from, to, import_ref);
                }
            }
        }
    }

    let mut cycles: Vec<Vec<usize>> = petgraph::algo::tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut members: Vec<usize> = scc.iter().map(|&n| graph[n]).collect();
            members.sort_unstable();
            members
        })
        .collect();
    cycles.sort();

    cycles
        .into_iter()
        .map(|members| Violation::NonSharedCycle {
            parts: members
                .into_iter()
                .map(|idx| catalog.part(idx).id.clone())
                .collect::<Vec<PartId>>(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use partsmith_common::error::CompositionError;
    use partsmith_common::types::{Cardinality, TypeRef};

    use super::*;
    use crate::binder::bind;
    use crate::descriptor::{ExportDescriptor, ImportDescriptor, PartDescriptor};

    fn exports(id: &str, contract: &str) -> PartDescriptor {
        PartDescriptor::new(id).export(ExportDescriptor::new(contract, TypeRef::named(contract)))
    }

    fn needs(contract: &str) -> ImportDescriptor {
        ImportDescriptor::new(contract.to_lowercase(), contract, TypeRef::named(contract))
    }

    fn violations_of(parts: Vec<PartDescriptor>) -> Vec<Violation> {
        let catalog = Catalog::new(parts).expect("catalog");
        let bound = bind(&catalog);
        match validate(&catalog, &bound) {
            Ok(()) => Vec::new(),
            Err(CompositionError::Validation(failure)) => failure.violations().to_vec(),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn satisfied_graph_has_no_violations() {
        let violations = violations_of(vec![exports("a", "X"), exports("b", "Y").import(needs("X"))]);
        assert!(violations.is_empty(), "got: {violations:?}");
    }

    #[test]
    fn exactly_one_rejects_missing_and_excess() {
        let violations = violations_of(vec![
            exports("x1", "X"),
            exports("x2", "X"),
            PartDescriptor::new("wants_x").import(needs("X")),
            PartDescriptor::new("wants_y").import(needs("Y")),
        ]);
        assert_eq!(violations.len(), 2, "got: {violations:?}");
        assert!(matches!(
            &violations[0],
            Violation::Cardinality { part, candidates, .. }
                if part.as_str() == "wants_x" && candidates.len() == 2
        ));
        assert!(matches!(
            &violations[1],
            Violation::Cardinality { part, candidates, .. }
                if part.as_str() == "wants_y" && candidates.is_empty()
        ));
    }

    #[test]
    fn optional_and_many_cardinalities() {
        let violations = violations_of(vec![
            exports("x1", "X"),
            exports("x2", "X"),
            PartDescriptor::new("optional_y")
                .import(needs("Y").cardinality(Cardinality::OneOrZero)),
            PartDescriptor::new("many_x").import(needs("X").cardinality(Cardinality::ZeroOrMore)),
            PartDescriptor::new("optional_x")
                .import(needs("X").cardinality(Cardinality::OneOrZero)),
        ]);
        assert_eq!(violations.len(), 1, "got: {violations:?}");
        assert!(matches!(
            &violations[0],
            Violation::Cardinality { part, .. } if part.as_str() == "optional_x"
        ));
    }

    #[test]
    fn type_mismatch_names_part_and_import() {
        let violations = violations_of(vec![
            PartDescriptor::new("cache")
                .export(ExportDescriptor::new("Store", TypeRef::named("Cache"))),
            PartDescriptor::new("app").import(ImportDescriptor::new(
                "store",
                "Store",
                TypeRef::named("Store"),
            )),
        ]);
        assert_eq!(violations.len(), 1);
        let msg = violations[0].to_string();
        assert!(msg.contains("\"app\""), "got: {msg}");
        assert!(msg.contains("\"store\""), "got: {msg}");
        assert!(msg.contains("\"cache\" produces Cache"), "got: {msg}");
    }

    #[test]
    fn open_generic_export_satisfies_closed_import() {
        let closed = TypeRef::generic("Repo", vec![TypeRef::named("User")]);
        let violations = violations_of(vec![
            PartDescriptor::new("repo").export(ExportDescriptor::new("Repo", TypeRef::open("Repo", 1))),
            PartDescriptor::new("users").import(ImportDescriptor::new("repo", "Repo", closed)),
        ]);
        assert!(violations.is_empty(), "got: {violations:?}");
    }

    #[test]
    fn non_shared_mutual_imports_form_cycle() {
        let violations = violations_of(vec![
            exports("a", "A").import(needs("B")),
            exports("b", "B").import(needs("A")),
        ]);
        assert_eq!(
            violations,
            vec![Violation::NonSharedCycle {
                parts: vec![PartId::new("a"), PartId::new("b")],
            }]
        );
    }

    #[test]
    fn shared_member_breaks_cycle() {
        let violations = violations_of(vec![
            exports("a", "A").import(needs("B")),
            exports("b", "B").shared().import(needs("A")),
        ]);
        assert!(violations.is_empty(), "got: {violations:?}");
    }

    #[test]
    fn non_shared_self_import_is_a_cycle() {
        let violations = violations_of(vec![exports("a", "A").import(
            needs("A").cardinality(Cardinality::OneOrZero).settable(),
        )]);
        assert_eq!(
            violations,
            vec![Violation::NonSharedCycle {
                parts: vec![PartId::new("a")],
            }]
        );
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let violations = violations_of(vec![
            exports("top", "Top").import(needs("Left")).import(needs("Right")),
            exports("left", "Left").import(needs("Bottom")),
            exports("right", "Right").import(needs("Bottom")),
            exports("bottom", "Bottom"),
        ]);
        assert!(violations.is_empty(), "got: {violations:?}");
    }

    #[test]
    fn all_violations_are_aggregated() {
        let violations = violations_of(vec![
            exports("a", "A").import(needs("B")),
            exports("b", "B").import(needs("A")).import(needs("Missing")),
            PartDescriptor::new("c").import(needs("Absent")),
        ]);
        assert_eq!(violations.len(), 3, "got: {violations:?}");
        assert!(matches!(violations[0], Violation::Cardinality { .. }));
        assert!(matches!(violations[1], Violation::Cardinality { .. }));
        assert!(matches!(violations[2], Violation::NonSharedCycle { .. }));
    }
}
