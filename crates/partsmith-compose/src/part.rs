//! Composable parts: descriptors with their imports bound to exports.

use partsmith_common::error::{CompositionError, Result};

use crate::catalog::{Catalog, ExportRef, ImportRef};

/// A part descriptor plus the exports satisfying each of its imports.
///
/// Holds exactly one satisfier list per import, indexed like the
/// descriptor's imports. A list may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposablePart {
    part: usize,
    satisfiers: Vec<Vec<ExportRef>>,
}

impl ComposablePart {
    /// Builds a composable part from an explicit import mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping omits an import, repeats one,
    /// names an import the part does not declare, or references an
    /// export outside the catalog.
    pub fn new(
        catalog: &Catalog,
        part: usize,
        mapping: Vec<(usize, Vec<ExportRef>)>,
    ) -> Result<Self> {
        let Some(descriptor) = catalog.parts().get(part) else {
            return Err(CompositionError::NotFound {
                kind: "part",
                id: format!("index {part}"),
            });
        };
        let incomplete = |message: String| CompositionError::IncompleteBinding {
            part: descriptor.id.clone(),
            message,
        };

        let mut satisfiers: Vec<Option<Vec<ExportRef>>> = vec![None; descriptor.imports.len()];
        for (import, exports) in mapping {
            let slot = satisfiers
                .get_mut(import)
                .ok_or_else(|| incomplete(format!("unknown import index {import}")))?;
            if slot.is_some() {
                return Err(incomplete(format!(
                    "import \"{}\" is mapped twice",
                    descriptor.imports[import].name
                )));
            }
            if let Some(bad) = exports.iter().find(|e| !in_catalog(catalog, **e)) {
                return Err(incomplete(format!(
                    "import \"{}\" references unknown export {}/{}",
                    descriptor.imports[import].name, bad.part, bad.export
                )));
            }
            *slot = Some(exports);
        }

        let satisfiers = satisfiers
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                entry.ok_or_else(|| {
                    incomplete(format!(
                        "import \"{}\" has no entry",
                        descriptor.imports[idx].name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { part, satisfiers })
    }

    /// Wraps a satisfier list already built in import order.
    pub(crate) fn from_ordered(part: usize, satisfiers: Vec<Vec<ExportRef>>) -> Self {
        Self { part, satisfiers }
    }

    /// Returns the index of the underlying part descriptor.
    #[must_use]
    pub const fn part(&self) -> usize {
        self.part
    }

    /// Returns the exports satisfying the import at `import`.
    ///
    /// # Panics
    ///
    /// Panics if `import` is not an import index of this part.
    #[must_use]
    pub fn satisfiers(&self, import: usize) -> &[ExportRef] {
        &self.satisfiers[import]
    }

    /// Returns every import with its satisfiers, in declaration order.
    pub fn bindings(&self) -> impl Iterator<Item = (ImportRef, &[ExportRef])> {
        self.satisfiers.iter().enumerate().map(move |(import, exports)| {
            (
                ImportRef {
                    part: self.part,
                    import,
                },
                exports.as_slice(),
            )
        })
    }

    /// Returns the number of bound imports.
    #[must_use]
    pub fn import_count(&self) -> usize {
        self.satisfiers.len()
    }
}

fn in_catalog(catalog: &Catalog, export: ExportRef) -> bool {
    catalog
        .parts()
        .get(export.part)
        .is_some_and(|p| export.export < p.exports.len())
}
