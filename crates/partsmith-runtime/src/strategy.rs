//! Interchangeable ways of walking a composition's bindings.
//!
//! Both strategies answer the same questions from different sources: the
//! interpretive one reads the bound parts directly, the compiled one reads
//! a [`ResolutionPlan`] that may have been loaded from disk. Given the same
//! catalog they resolve the same instance graph.

use std::fmt;
use std::sync::Arc;

use partsmith_common::config::{ProviderKind, RuntimeConfig};
use partsmith_common::error::Result;
use partsmith_common::types::ContractIdentity;
use partsmith_compose::catalog::ExportRef;
use partsmith_compose::composition::Composition;
use partsmith_compose::plan::ResolutionPlan;

/// When an import is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Resolved before the instance is constructed.
    Construction,
    /// Applied to the instance after it is published.
    Settable,
}

/// Source of import bindings used while resolving parts.
pub trait ResolutionStrategy: Send + Sync + fmt::Debug {
    /// Returns the composition being resolved.
    fn composition(&self) -> &Composition;

    /// Returns the imports of `part` applied in `phase`, in declaration
    /// order, with their satisfying exports.
    fn imports(&self, part: usize, phase: Phase) -> Vec<(usize, &[ExportRef])>;

    /// Returns the exports a root request for `contract` can use.
    fn root_exports(&self, contract: &ContractIdentity) -> &[ExportRef];

    /// Returns the name used in logs.
    fn name(&self) -> &'static str;
}

/// Reads bindings straight from the bound parts.
#[derive(Debug)]
pub struct InterpretiveStrategy {
    composition: Arc<Composition>,
}

impl InterpretiveStrategy {
    /// Creates a strategy over `composition`.
    #[must_use]
    pub const fn new(composition: Arc<Composition>) -> Self {
        Self { composition }
    }
}

impl ResolutionStrategy for InterpretiveStrategy {
    fn composition(&self) -> &Composition {
        &self.composition
    }

    fn imports(&self, part: usize, phase: Phase) -> Vec<(usize, &[ExportRef])> {
        let bound = self.composition.part(part);
        let descriptor = self.composition.descriptor(part);
        let construction = phase == Phase::Construction;
        descriptor
            .imports
            .iter()
            .enumerate()
            .filter(|(_, import)| import.is_construction() == construction)
            .map(|(idx, _)| (idx, bound.satisfiers(idx)))
            .collect()
    }

    fn root_exports(&self, contract: &ContractIdentity) -> &[ExportRef] {
        self.composition.root_exports(contract)
    }

    fn name(&self) -> &'static str {
        "interpretive"
    }
}

/// Reads bindings from a precompiled plan.
#[derive(Debug)]
pub struct CompiledStrategy {
    composition: Arc<Composition>,
    plan: ResolutionPlan,
}

impl CompiledStrategy {
    /// Compiles a plan for `composition`.
    #[must_use]
    pub fn compile(composition: Arc<Composition>) -> Self {
        let plan = ResolutionPlan::compile(&composition);
        Self { composition, plan }
    }

    /// Uses an existing plan for `composition`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::PlanMismatch`] if the plan was compiled
    /// from a different catalog.
    ///
    /// [`CompositionError::PlanMismatch`]: partsmith_common::error::CompositionError::PlanMismatch
    pub fn with_plan(composition: Arc<Composition>, plan: ResolutionPlan) -> Result<Self> {
        plan.verify(composition.catalog())?;
        Ok(Self { composition, plan })
    }

    /// Returns the plan in use.
    #[must_use]
    pub const fn plan(&self) -> &ResolutionPlan {
        &self.plan
    }
}

impl ResolutionStrategy for CompiledStrategy {
    fn composition(&self) -> &Composition {
        &self.composition
    }

    fn imports(&self, part: usize, phase: Phase) -> Vec<(usize, &[ExportRef])> {
        let planned = self.plan.part(part);
        let imports = match phase {
            Phase::Construction => &planned.construction,
            Phase::Settable => &planned.settable,
        };
        imports
            .iter()
            .map(|p| (p.import, p.satisfiers.as_slice()))
            .collect()
    }

    fn root_exports(&self, contract: &ContractIdentity) -> &[ExportRef] {
        self.plan.root_exports(contract)
    }

    fn name(&self) -> &'static str {
        "compiled"
    }
}

/// Selects the strategy named by `config`.
///
/// A compiled provider with a `plan_path` loads the plan from that file;
/// without one the plan is compiled in memory.
///
/// # Errors
///
/// Returns an error if a configured plan cannot be loaded or does not
/// match the composition's catalog.
pub fn from_config(
    composition: Arc<Composition>,
    config: &RuntimeConfig,
) -> Result<Box<dyn ResolutionStrategy>> {
    match (config.provider, &config.plan_path) {
        (ProviderKind::Interpretive, _) => Ok(Box::new(InterpretiveStrategy::new(composition))),
        (ProviderKind::Compiled, None) => Ok(Box::new(CompiledStrategy::compile(composition))),
        (ProviderKind::Compiled, Some(path)) => {
            let plan = ResolutionPlan::load(path, composition.catalog())?;
            Ok(Box::new(CompiledStrategy::with_plan(composition, plan)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use partsmith_common::error::CompositionError;
    use partsmith_common::types::{Cardinality, TypeRef};
    use partsmith_compose::catalog::Catalog;
    use partsmith_compose::descriptor::{ExportDescriptor, ImportDescriptor, PartDescriptor};

    use super::*;

    fn parts() -> Vec<PartDescriptor> {
        vec![
            PartDescriptor::new("store")
                .shared()
                .export(ExportDescriptor::new("Store", TypeRef::named("Store"))),
            PartDescriptor::new("handler")
                .export(ExportDescriptor::new("Handler", TypeRef::named("Handler")))
                .import(ImportDescriptor::new("store", "Store", TypeRef::named("Store")))
                .import(
                    ImportDescriptor::new("peers", "Handler", TypeRef::named("Handler"))
                        .cardinality(Cardinality::ZeroOrMore)
                        .settable(),
                ),
        ]
    }

    fn composition() -> Arc<Composition> {
        Arc::new(Composition::build(Catalog::new(parts()).expect("catalog")).expect("composition"))
    }

    #[test]
    fn strategies_agree() {
        let composition = composition();
        let interpretive = InterpretiveStrategy::new(Arc::clone(&composition));
        let compiled = CompiledStrategy::compile(Arc::clone(&composition));

        for part in 0..composition.parts().len() {
            for phase in [Phase::Construction, Phase::Settable] {
                assert_eq!(interpretive.imports(part, phase), compiled.imports(part, phase));
            }
        }
        let contract = ContractIdentity::new("Handler");
        assert_eq!(interpretive.root_exports(&contract), compiled.root_exports(&contract));
    }

    #[test]
    fn phases_split_imports() {
        let strategy = InterpretiveStrategy::new(composition());
        let construction = strategy.imports(1, Phase::Construction);
        let settable = strategy.imports(1, Phase::Settable);
        assert_eq!(construction.len(), 1);
        assert_eq!(construction[0].0, 0);
        assert_eq!(settable.len(), 1);
        assert_eq!(settable[0].0, 1);
    }

    #[test]
    fn config_selects_strategy() {
        let interpretive = from_config(composition(), &RuntimeConfig::default()).expect("strategy");
        assert_eq!(interpretive.name(), "interpretive");
        let compiled = from_config(composition(), &RuntimeConfig::compiled()).expect("strategy");
        assert_eq!(compiled.name(), "compiled");
    }

    #[test]
    fn config_loads_persisted_plan() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.plan.json");
        ResolutionPlan::compile(&composition()).save(&path).expect("save");

        let config = RuntimeConfig {
            provider: ProviderKind::Compiled,
            plan_path: Some(path),
        };
        let strategy = from_config(composition(), &config).expect("plan should load");
        assert_eq!(strategy.root_exports(&"Store".into()).len(), 1);
    }

    #[test]
    fn mismatched_plan_is_rejected() {
        let other = Composition::build(
            Catalog::new(vec![PartDescriptor::new("lonely")]).expect("catalog"),
        )
        .expect("composition");
        let plan = ResolutionPlan::compile(&other);
        let err = CompiledStrategy::with_plan(composition(), plan).unwrap_err();
        assert!(matches!(err, CompositionError::PlanMismatch { .. }), "got: {err}");
    }
}
