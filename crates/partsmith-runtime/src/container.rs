//! The runtime entry point for a composition.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use partsmith_common::config::RuntimeConfig;
use partsmith_common::error::{CompositionError, Result};
use partsmith_common::types::{ContractIdentity, PartId};
use partsmith_compose::composition::Composition;

use crate::activator::{Activators, Instance};
use crate::scope::{Runtime, Scope, ScopeInner};
use crate::strategy;

/// Resolves instances from a validated composition.
///
/// Owns the root scope; dropping the container disposes it along with
/// every boundary scope still open beneath it.
pub struct Container {
    root: Scope,
}

impl Container {
    /// Creates a container, pairing every part with its activator.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::MissingActivator`] if a part has no
    /// registered activator, or an error if the configured resolution
    /// plan cannot be loaded or does not match the composition.
    pub fn create(
        composition: impl Into<Arc<Composition>>,
        activators: &Activators,
        config: &RuntimeConfig,
    ) -> Result<Self> {
        let composition = composition.into();
        let paired = composition
            .catalog()
            .parts()
            .iter()
            .map(|p| {
                activators
                    .get(&p.id)
                    .cloned()
                    .ok_or_else(|| CompositionError::MissingActivator { part: p.id.clone() })
            })
            .collect::<Result<Vec<_>>>()?;

        let strategy = strategy::from_config(composition, config)?;
        tracing::info!(
            parts = paired.len(),
            strategy = strategy.name(),
            "container created"
        );
        let runtime = Arc::new(Runtime::new(strategy, paired));
        Ok(Self {
            root: Scope::from_inner(ScopeInner::root(runtime)),
        })
    }

    /// Returns the root scope.
    #[must_use]
    pub const fn root(&self) -> &Scope {
        &self.root
    }

    /// Returns the composition being resolved.
    #[must_use]
    pub fn composition(&self) -> &Composition {
        self.root.runtime().strategy().composition()
    }

    /// Returns the name of the resolution strategy in use.
    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.root.runtime().strategy().name()
    }

    /// Resolves the single export of `contract` from the root scope.
    ///
    /// # Errors
    ///
    /// See [`Scope::get_exported_value`].
    pub fn get_exported_value<T: Any + Send + Sync>(
        &self,
        contract: Option<&ContractIdentity>,
    ) -> Result<Arc<T>> {
        self.root.get_exported_value(contract)
    }

    /// Resolves every export of `contract` from the root scope.
    ///
    /// # Errors
    ///
    /// See [`Scope::get_exported_values`].
    pub fn get_exported_values<T: Any + Send + Sync>(
        &self,
        contract: Option<&ContractIdentity>,
    ) -> Result<Vec<Arc<T>>> {
        self.root.get_exported_values(contract)
    }

    /// Resolves the part with identity `part` from the root scope.
    ///
    /// # Errors
    ///
    /// See [`Scope::resolve`].
    pub fn resolve(&self, part: &PartId) -> Result<Instance> {
        self.root.resolve(part)
    }

    /// Disposes the root scope and everything beneath it.
    ///
    /// # Errors
    ///
    /// See [`Scope::dispose`].
    pub fn dispose(&self) -> Result<()> {
        tracing::info!(scope = %self.root.id(), "disposing container");
        self.root.dispose()
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if let Err(e) = self.root.dispose() {
            tracing::warn!(error = %e, "container disposal failed on drop");
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("root", &self.root)
            .finish()
    }
}
