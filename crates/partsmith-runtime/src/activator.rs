//! Activation logic paired with part descriptors.
//!
//! Descriptors only say what a part needs and offers; an [`Activator`]
//! says how to build it from resolved imports, how to complete it with
//! settable imports, and how to tear it down.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use partsmith_common::types::PartId;

use crate::import::{ImportValue, ImportValues};

/// A constructed part instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Builds, completes, and releases instances of one part.
pub trait Activator: Send + Sync {
    /// Constructs an instance from the part's construction-time imports.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance cannot be constructed.
    fn activate(&self, imports: ImportValues) -> anyhow::Result<Instance>;

    /// Applies one settable import to a constructed instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be applied.
    fn satisfy(&self, _instance: &Instance, _import: ImportValue) -> anyhow::Result<()> {
        Ok(())
    }

    /// Returns whether instances need [`release`](Self::release) when
    /// their scope is disposed.
    fn has_teardown(&self) -> bool {
        false
    }

    /// Tears down an instance owned by a disposed scope.
    fn release(&self, _instance: &Instance) {}
}

/// Constructor closure of a [`FnActivator`].
pub type ActivateFn = dyn Fn(ImportValues) -> anyhow::Result<Instance> + Send + Sync;
/// Settable-import handler of a [`FnActivator`].
pub type SatisfyFn = dyn Fn(&Instance, ImportValue) -> anyhow::Result<()> + Send + Sync;
/// Teardown handler of a [`FnActivator`].
pub type ReleaseFn = dyn Fn(&Instance) + Send + Sync;

/// An activator assembled from closures.
pub struct FnActivator {
    activate: Box<ActivateFn>,
    satisfy: Option<Box<SatisfyFn>>,
    release: Option<Box<ReleaseFn>>,
}

impl FnActivator {
    /// Creates an activator that constructs instances with `activate`.
    pub fn new<F>(activate: F) -> Self
    where
        F: Fn(ImportValues) -> anyhow::Result<Instance> + Send + Sync + 'static,
    {
        Self {
            activate: Box::new(activate),
            satisfy: None,
            release: None,
        }
    }

    /// Sets the handler applying settable imports.
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
}

impl Activator for FnActivator {
    fn activate(&self, imports: ImportValues) -> anyhow::Result<Instance> {
        (self.activate)(imports)
    }

    fn satisfy(&self, instance: &Instance, import: ImportValue) -> anyhow::Result<()> {
        self.satisfy
            .as_ref()
            .map_or(Ok(()), |satisfy| satisfy(instance, import))
    }

    fn has_teardown(&self) -> bool {
        self.release.is_some()
    }

    fn release(&self, instance: &Instance) {
        if let Some(release) = &self.release {
            release(instance);
        }
    }
}

impl fmt::Debug for FnActivator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnActivator")
            .field("satisfy", &self.satisfy.is_some())
            .field("release", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

/// Activators keyed by the part they build.
#[derive(Clone, Default)]
pub struct Activators {
    by_part: HashMap<PartId, Arc<dyn Activator>>,
}

impl Activators {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the activator for a part, replacing any previous one.
    pub fn register(&mut self, part: impl Into<PartId>, activator: Arc<dyn Activator>) {
        let _ = self.by_part.insert(part.into(), activator);
    }

    /// Registers an activator and returns the registry.
    #[must_use]
    pub fn with(mut self, part: impl Into<PartId>, activator: impl Activator + 'static) -> Self {
        self.register(part, Arc::new(activator));
        self
    }

    /// Returns the activator registered for `part`.
    #[must_use]
    pub fn get(&self, part: &PartId) -> Option<&Arc<dyn Activator>> {
        self.by_part.get(part)
    }

    /// Returns the number of registered activators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_part.len()
    }

    /// Returns whether no activator is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_part.is_empty()
    }
}

impl fmt::Debug for Activators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<&str> = self.by_part.keys().map(PartId::as_str).collect();
        parts.sort_unstable();
        f.debug_struct("Activators").field("parts", &parts).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn fn_activator_without_release_has_no_teardown() {
        let activator = FnActivator::new(|_| Ok(Arc::new(7_u32)));
        assert!(!activator.has_teardown());
        let instance = activator.activate(ImportValues::default()).expect("activate");
        assert_eq!(instance.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn fn_activator_runs_release_handler() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let activator = FnActivator::new(|_| Ok(Arc::new("conn")))
            .on_release(move |_| {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
            });
        assert!(activator.has_teardown());

        let instance = activator.activate(ImportValues::default()).expect("activate");
        activator.release(&instance);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registry_replaces_and_looks_up_by_part() {
        let mut activators = Activators::new().with("a", FnActivator::new(|_| Ok(Arc::new(1_u8))));
        activators.register("a", Arc::new(FnActivator::new(|_| Ok(Arc::new(2_u8)))));
        assert_eq!(activators.len(), 1);

        let activator = activators.get(&PartId::new("a")).expect("registered");
        let instance = activator.activate(ImportValues::default()).expect("activate");
        assert_eq!(instance.downcast_ref::<u8>(), Some(&2));
        assert!(activators.get(&PartId::new("b")).is_none());
    }
}
