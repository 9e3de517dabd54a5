//! One-stop host: builds the catalog, the composition, and the container.
//!
//! Wraps `partsmith-compose` and `partsmith-runtime` into a high-level API
//! for SDK consumers.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use partsmith_common::config::RuntimeConfig;
use partsmith_common::constants::{APP_NAME, PLAN_FILE_EXTENSION};
use partsmith_common::error::Result;
use partsmith_common::types::ContractIdentity;
use partsmith_compose::catalog::Catalog;
use partsmith_compose::composition::Composition;
use partsmith_compose::graph::CompositionGraph;
use partsmith_compose::plan::ResolutionPlan;
use partsmith_runtime::activator::Activators;
use partsmith_runtime::container::Container;
use partsmith_runtime::scope::Scope;

use crate::builder::PartBuilder;

/// A running composition.
#[derive(Debug)]
pub struct CompositionHost {
    container: Container,
}

impl CompositionHost {
    /// Starts describing a host.
    #[must_use]
    pub fn builder() -> CompositionHostBuilder {
        CompositionHostBuilder::default()
    }

    /// Returns the underlying container.
    #[must_use]
    pub const fn container(&self) -> &Container {
        &self.container
    }

    /// Returns the root scope.
    #[must_use]
    pub const fn root(&self) -> &Scope {
        self.container.root()
    }

    /// Returns the validated composition.
    #[must_use]
    pub fn composition(&self) -> &Composition {
        self.container.composition()
    }

    /// Resolves the single export of `T`'s default contract.
    ///
    /// # Errors
    ///
    /// See [`Container::get_exported_value`].
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.container.get_exported_value(None)
    }

    /// Resolves every export of `T`'s default contract.
    ///
    /// # Errors
    ///
    /// See [`Container::get_exported_values`].
    pub fn get_all<T: Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>> {
        self.container.get_exported_values(None)
    }

    /// Resolves the single export of `contract`.
    ///
    /// # Errors
    ///
    /// See [`Container::get_exported_value`].
    pub fn get_named<T: Any + Send + Sync>(&self, contract: &ContractIdentity) -> Result<Arc<T>> {
        self.container.get_exported_value(Some(contract))
    }

    /// Projects the composition into a dependency graph.
    #[must_use]
    pub fn graph(&self) -> CompositionGraph {
        CompositionGraph::from_composition(self.composition())
    }

    /// Compiles and writes a resolution plan for later compiled-mode runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be written.
    pub fn save_plan(&self, path: &Path) -> Result<()> {
        ResolutionPlan::compile(self.composition()).save(path)
    }

    /// Returns the conventional plan file location inside `dir`.
    #[must_use]
    pub fn default_plan_path(dir: &Path) -> PathBuf {
        dir.join(format!("{APP_NAME}{PLAN_FILE_EXTENSION}"))
    }

    /// Disposes every scope and releases owned instances.
    ///
    /// # Errors
    ///
    /// See [`Container::dispose`].
    pub fn dispose(&self) -> Result<()> {
        self.container.dispose()
    }
}

/// Collects parts and configuration for a [`CompositionHost`].
#[derive(Debug, Default)]
pub struct CompositionHostBuilder {
    parts: Vec<PartBuilder>,
    config: RuntimeConfig,
}

impl CompositionHostBuilder {
    /// Adds a part.
    #[must_use]
    pub fn part(mut self, part: PartBuilder) -> Self {
        self.parts.push(part);
        self
    }

    /// Sets the runtime configuration.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the catalog, validates the composition, and creates the
    /// container.
    ///
    /// # Errors
    ///
    /// Returns the first catalog error, every validation violation at
    /// once, or an error creating the container.
    pub fn build(self) -> Result<CompositionHost> {
        let mut descriptors = Vec::with_capacity(self.parts.len());
        let mut activators = Activators::new();
        for part in self.parts {
            let (descriptor, activator) = part.build()?;
            activators.register(descriptor.id.clone(), activator);
            descriptors.push(descriptor);
        }

        let catalog = Catalog::new(descriptors)?;
        let composition = Composition::build(catalog)?;
        let container = Container::create(composition, &activators, &self.config)?;
        tracing::info!(
            parts = container.composition().parts().len(),
            strategy = container.strategy_name(),
            "composition host ready"
        );
        Ok(CompositionHost { container })
    }
}

#[cfg(test)]
mod tests {
    use partsmith_common::error::CompositionError;

    use super::*;

    struct Greeting(String);

    struct Greeter {
        greeting: Arc<Greeting>,
    }

    fn greeter_host() -> CompositionHost {
        CompositionHost::builder()
            .part(
                PartBuilder::of::<Greeting>()
                    .shared()
                    .instance(Greeting("hello".into())),
            )
            .part(
                PartBuilder::of::<Greeter>()
                    .imports::<Greeting>("greeting")
                    .activate(|imports| {
                        Ok(Arc::new(Greeter {
                            greeting: imports.instance("greeting")?,
                        }))
                    }),
            )
            .build()
            .expect("host")
    }

    #[test]
    fn resolves_by_type() {
        let host = greeter_host();
        let greeter = host.get::<Greeter>().expect("greeter");
        assert_eq!(greeter.greeting.0, "hello");
        assert!(Arc::ptr_eq(&greeter.greeting, &host.get::<Greeting>().expect("greeting")));
        assert_eq!(host.get_all::<Greeter>().expect("all").len(), 1);
    }

    #[test]
    fn unsatisfied_import_fails_the_build() {
        let err = CompositionHost::builder()
            .part(
                PartBuilder::of::<Greeter>()
                    .imports::<Greeting>("greeting")
                    .activate(|_| Ok(Arc::new(()))),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, CompositionError::Validation(_)), "got: {err}");
    }

    #[test]
    fn graph_orders_dependencies_first() {
        let host = greeter_host();
        let order = host.graph().activation_order().expect("acyclic");
        let greeting = ContractIdentity::of::<Greeting>();
        assert_eq!(order[0].as_str(), greeting.name());
    }

    #[test]
    fn saved_plan_drives_compiled_host() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = CompositionHost::default_plan_path(dir.path());
        assert!(path.to_string_lossy().ends_with("partsmith.plan.json"));
        greeter_host().save_plan(&path).expect("save");

        let host = CompositionHost::builder()
            .part(
                PartBuilder::of::<Greeting>()
                    .shared()
                    .instance(Greeting("hello".into())),
            )
            .part(
                PartBuilder::of::<Greeter>()
                    .imports::<Greeting>("greeting")
                    .activate(|imports| {
                        Ok(Arc::new(Greeter {
                            greeting: imports.instance("greeting")?,
                        }))
                    }),
            )
            .config(RuntimeConfig {
                provider: partsmith_common::config::ProviderKind::Compiled,
                plan_path: Some(path),
            })
            .build()
            .expect("host");
        assert_eq!(host.container().strategy_name(), "compiled");
        assert_eq!(host.get::<Greeter>().expect("greeter").greeting.0, "hello");
    }
}
