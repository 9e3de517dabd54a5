//! Fluent API for declaring parts together with their activation logic.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use partsmith_common::error::{CompositionError, Result};
use partsmith_common::types::{Cardinality, ContractIdentity, PartId, TypeRef};
use partsmith_compose::descriptor::{ExportDescriptor, ImportDescriptor, PartDescriptor};
use partsmith_runtime::activator::{
    ActivateFn, Activator, FnActivator, Instance, ReleaseFn, SatisfyFn,
};
use partsmith_runtime::import::{ImportValue, ImportValues};

/// Builder for one part: its descriptor and how to activate it.
pub struct PartBuilder {
    descriptor: PartDescriptor,
    activate: Option<Box<ActivateFn>>,
    satisfy: Option<Box<SatisfyFn>>,
    release: Option<Box<ReleaseFn>>,
    custom: Option<Arc<dyn Activator>>,
}

impl PartBuilder {
    /// Creates a builder for the part with the given identity.
    #[must_use]
    pub fn new(id: impl Into<PartId>) -> Self {
        Self {
            descriptor: PartDescriptor::new(id),
            activate: None,
            satisfy: None,
            release: None,
            custom: None,
        }
    }

    /// Creates a builder for a part named after `T` that exports `T`
    /// under its default contract.
    #[must_use]
    pub fn of<T: Any + Send + Sync>() -> Self {
        let contract = ContractIdentity::of::<T>();
        Self::new(contract.name()).exports::<T>()
    }

    /// Shares one instance per container.
    #[must_use]
    pub fn shared(mut self) -> Self {
        self.descriptor = self.descriptor.shared();
        self
    }

    /// Shares one instance per scope carrying `boundary`.
    #[must_use]
    pub fn shared_within(mut self, boundary: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.shared_within(boundary);
        self
    }

    /// Adds an export.
    #[must_use]
    pub fn export(mut self, export: ExportDescriptor) -> Self {
        self.descriptor = self.descriptor.export(export);
        self
    }

    /// Exports `T` under its default contract.
    #[must_use]
    pub fn exports<T: Any + Send + Sync>(self) -> Self {
        self.export(ExportDescriptor::new(
            ContractIdentity::of::<T>(),
            TypeRef::of::<T>(),
        ))
    }

    /// Adds an import.
    #[must_use]
    pub fn import(mut self, import: ImportDescriptor) -> Self {
        self.descriptor = self.descriptor.import(import);
        self
    }

    /// Imports exactly one `T` under its default contract.
    #[must_use]
    pub fn imports<T: Any + Send + Sync>(self, name: impl Into<String>) -> Self {
        self.import(typed_import::<T>(name))
    }

    /// Imports every `T` exported under its default contract.
    #[must_use]
    pub fn imports_many<T: Any + Send + Sync>(self, name: impl Into<String>) -> Self {
        self.import(typed_import::<T>(name).cardinality(Cardinality::ZeroOrMore))
    }

    /// Sets the constructor.
    #[must_use]
    pub fn activate<F>(mut self, activate: F) -> Self
    where
        F: Fn(ImportValues) -> anyhow::Result<Instance> + Send + Sync + 'static,
    {
        self.activate = Some(Box::new(activate));
        self
    }

    /// Activates by handing out clones of one prebuilt value.
    ///
    /// Every activation returns the same `Arc`, so even a non-shared part
    /// yields one instance everywhere. Its release handler, if any, still
    /// runs once per activation.
    #[must_use]
    pub fn instance<T: Any + Send + Sync>(self, value: T) -> Self {
        let value: Instance = Arc::new(value);
        self.activate(move |_| Ok(Arc::clone(&value)))
    }

    /// Sets the handler for settable imports.
    #[must_use]
    pub fn on_satisfy<F>(mut self, satisfy: F) -> Self
    where
        F: Fn(&Instance, ImportValue) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.satisfy = Some(Box::new(satisfy));
        self
    }

    /// Sets the teardown handler.
    #[must_use]
    pub fn on_release<F>(mut self, release: F) -> Self
    where
        F: Fn(&Instance) + Send + Sync + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    /// Uses a hand-written activator instead of closures.
    #[must_use]
    pub fn activator(mut self, activator: impl Activator + 'static) -> Self {
        self.custom = Some(Arc::new(activator));
        self
    }

    /// Returns the descriptor built so far.
    #[must_use]
    pub const fn descriptor(&self) -> &PartDescriptor {
        &self.descriptor
    }

    /// Finishes the part.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::MissingActivator`] if neither a
    /// constructor nor an activator was supplied.
    pub fn build(self) -> Result<(PartDescriptor, Arc<dyn Activator>)> {
        if let Some(custom) = self.custom {
            return Ok((self.descriptor, custom));
        }
        let activate = self.activate.ok_or_else(|| CompositionError::MissingActivator {
            part: self.descriptor.id.clone(),
        })?;

        let mut activator = FnActivator::new(activate);
        if let Some(satisfy) = self.satisfy {
            activator = activator.on_satisfy(satisfy);
        }
        if let Some(release) = self.release {
            activator = activator.on_release(release);
        }
        Ok((self.descriptor, Arc::new(activator)))
    }
}

impl fmt::Debug for PartBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartBuilder")
            .field("descriptor", &self.descriptor)
            .field("activate", &self.activate.is_some())
            .field("custom", &self.custom.is_some())
            .finish_non_exhaustive()
    }
}

fn typed_import<T: Any + Send + Sync>(name: impl Into<String>) -> ImportDescriptor {
    ImportDescriptor::new(name, ContractIdentity::of::<T>(), TypeRef::of::<T>())
}

#[cfg(test)]
mod tests {
    use partsmith_common::types::Sharing;

    use super::*;

    struct Clock;

    #[test]
    fn of_exports_default_contract() {
        let (descriptor, _) = PartBuilder::of::<Clock>()
            .shared()
            .instance(Clock)
            .build()
            .expect("build");

        assert_eq!(descriptor.id.as_str(), ContractIdentity::of::<Clock>().name());
        assert_eq!(descriptor.sharing, Sharing::Shared { boundary: None });
        assert_eq!(descriptor.exports.len(), 1);
        assert_eq!(descriptor.exports[0].contract, ContractIdentity::of::<Clock>());
    }

    #[test]
    fn typed_imports_use_default_contract() {
        let builder = PartBuilder::new("audit")
            .imports::<Clock>("clock")
            .imports_many::<String>("tags");
        let imports = &builder.descriptor().imports;
        assert_eq!(imports[0].contract, ContractIdentity::of::<Clock>());
        assert_eq!(imports[0].cardinality, Cardinality::ExactlyOne);
        assert_eq!(imports[1].cardinality, Cardinality::ZeroOrMore);
    }

    #[test]
    fn missing_constructor_is_rejected() {
        let err = PartBuilder::new("empty").build().err().expect("build should fail");
        assert!(
            matches!(&err, CompositionError::MissingActivator { part } if part.as_str() == "empty"),
            "got: {err}"
        );
    }

    #[test]
    fn prebuilt_instance_is_handed_out_on_every_activation() {
        let (_, activator) = PartBuilder::of::<Clock>().instance(Clock).build().expect("build");
        let first = activator.activate(ImportValues::new(Vec::new())).expect("first");
        let second = activator.activate(ImportValues::new(Vec::new())).expect("second");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn release_handler_marks_teardown() {
        let (_, activator) = PartBuilder::new("conn")
            .activate(|_| Ok(Arc::new(1_u8)))
            .on_release(|_| {})
            .build()
            .expect("build");
        assert!(activator.has_teardown());
    }
}
