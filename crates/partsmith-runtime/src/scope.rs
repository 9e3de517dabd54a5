//! Lifetime scopes, shared-instance caches, and disposal.
//!
//! Every container has one root scope. Boundary factories open child
//! scopes tagged with a boundary name; a shared part lives in the nearest
//! scope carrying its boundary (or the root when it names none) and is
//! constructed at most once there, even under concurrent requests.
//!
//! Threads blocked on each other's constructions are tracked in one
//! wait-for graph per container, so a construction cycle among shared
//! parts fails with [`CompositionError::CircularConstruction`] even when
//! two threads enter it from opposite ends.
//!
//! Disposal is ordered: child scopes first, then the instances a scope
//! owns, newest first.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread::{self, ThreadId};

use partsmith_common::constants::ROOT_SCOPE_LABEL;
use partsmith_common::error::{CompositionError, Result};
use partsmith_common::types::{ContractIdentity, PartId, ScopeId, Sharing};
use partsmith_compose::catalog::ExportRef;
use partsmith_compose::descriptor::PartDescriptor;

use crate::activator::{Activator, Instance};
use crate::factory::ExportFactory;
use crate::import::{ImportValue, ImportValues, Resolved, downcast};
use crate::strategy::{Phase, ResolutionStrategy};

/// State shared by every scope of one container.
pub(crate) struct Runtime {
    strategy: Box<dyn ResolutionStrategy>,
    activators: Vec<Arc<dyn Activator>>,
    waits: Mutex<WaitGraph>,
    next_slot: AtomicU64,
}

impl Runtime {
    pub(crate) fn new(
        strategy: Box<dyn ResolutionStrategy>,
        activators: Vec<Arc<dyn Activator>>,
    ) -> Self {
        Self {
            strategy,
            activators,
            waits: Mutex::default(),
            next_slot: AtomicU64::new(0),
        }
    }

    pub(crate) fn strategy(&self) -> &dyn ResolutionStrategy {
        self.strategy.as_ref()
    }

    fn descriptor(&self, part: usize) -> &PartDescriptor {
        self.strategy.composition().descriptor(part)
    }

    fn part_id(&self, part: usize) -> &PartId {
        &self.descriptor(part).id
    }

    fn new_slot(&self) -> Arc<Slot> {
        Arc::new(Slot {
            key: self.next_slot.fetch_add(1, Ordering::Relaxed),
            state: Mutex::default(),
            ready: Condvar::new(),
        })
    }
}

/// Which thread is building each slot, and which slot each blocked
/// thread waits for.
///
/// Lock order: a slot's state may be held while taking this graph,
/// never the reverse.
#[derive(Default)]
struct WaitGraph {
    builders: HashMap<u64, ThreadId>,
    waiting: HashMap<ThreadId, u64>,
}

impl WaitGraph {
    /// Returns whether blocking `me` on `slot` would close a loop of
    /// threads, each waiting for a slot the next one is building.
    fn closes_cycle(&self, me: ThreadId, slot: u64) -> bool {
        let mut next = slot;
        for _ in 0..=self.waiting.len() {
            let Some(&builder) = self.builders.get(&next) else {
                return false;
            };
            if builder == me {
                return true;
            }
            let Some(&blocked_on) = self.waiting.get(&builder) else {
                return false;
            };
            next = blocked_on;
        }
        false
    }
}

struct OwnedInstance {
    part: usize,
    instance: Instance,
}

#[derive(Default)]
struct ScopeState {
    disposed: bool,
    owned: Vec<OwnedInstance>,
    children: Vec<Weak<ScopeInner>>,
}

#[derive(Default)]
enum SlotState {
    #[default]
    Empty,
    Constructing(ThreadId),
    Ready(Instance),
}

/// Cache entry for one shared part in one scope.
struct Slot {
    key: u64,
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Slot {
    fn holds(&self, instance: &Instance) -> bool {
        self.state.lock().is_ok_and(
            |state| matches!(&*state, SlotState::Ready(cached) if Arc::ptr_eq(cached, instance)),
        )
    }
}

/// Resets a slot when construction does not complete, so waiting threads
/// can retry instead of blocking forever. Either way the builder leaves
/// the wait graph.
struct Pending<'a> {
    slot: &'a Slot,
    waits: &'a Mutex<WaitGraph>,
    published: bool,
}

impl Pending<'_> {
    fn publish(mut self, instance: &Instance) -> Result<()> {
        *lock(&self.slot.state, "instance slot")? = SlotState::Ready(Arc::clone(instance));
        self.published = true;
        self.slot.ready.notify_all();
        Ok(())
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if !self.published {
            if let Ok(mut state) = self.slot.state.lock() {
                *state = SlotState::Empty;
            }
            self.slot.ready.notify_all();
        }
        if let Ok(mut waits) = self.waits.lock() {
            let _ = waits.builders.remove(&self.slot.key);
        }
    }
}

enum SlotAction {
    Hit(Instance),
    Reentered,
    Wait,
    Build,
}

struct Deferred {
    scope: Arc<ScopeInner>,
    part: usize,
    instance: Instance,
    shared: bool,
}

impl Deferred {
    /// Evicts a shared instance that never received its settable imports.
    fn abandon(self) {
        if self.shared {
            self.scope.discard(self.part, &self.instance);
        }
    }
}

/// Settable imports waiting for the outermost request to finish.
///
/// Applying them only after every construction in the request completes
/// lets shared parts that import each other through settable imports
/// resolve to the cached instances.
#[derive(Default)]
struct Operation {
    deferred: VecDeque<Deferred>,
}

impl Operation {
    fn defer(&mut self, scope: &Arc<ScopeInner>, part: usize, instance: &Instance, shared: bool) {
        if !scope.runtime.strategy.imports(part, Phase::Settable).is_empty() {
            self.deferred.push_back(Deferred {
                scope: Arc::clone(scope),
                part,
                instance: Arc::clone(instance),
                shared,
            });
        }
    }

    /// Applies every deferred settable import. On failure, shared
    /// instances still waiting for theirs are evicted from their caches.
    fn complete(mut self) -> Result<()> {
        while let Some(next) = self.deferred.pop_front() {
            if let Err(e) = next.scope.apply_settable(next.part, &next.instance, &mut self) {
                next.abandon();
                self.abandon();
                return Err(e);
            }
        }
        Ok(())
    }

    fn abandon(self) {
        for entry in self.deferred {
            entry.abandon();
        }
    }
}

pub(crate) struct ScopeInner {
    id: ScopeId,
    boundary: Option<String>,
    parent: Option<Arc<ScopeInner>>,
    runtime: Arc<Runtime>,
    state: Mutex<ScopeState>,
    cache: Mutex<HashMap<usize, Arc<Slot>>>,
}

/// Acquires a mutex, mapping poisoning to a composition error.
fn lock<'a, T>(mutex: &'a Mutex<T>, what: &'static str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| CompositionError::LockPoisoned { what })
}

/// Maps an activator failure, passing nested composition errors through.
fn activation_error(part: &PartId, error: anyhow::Error) -> CompositionError {
    match error.downcast::<CompositionError>() {
        Ok(inner) => inner,
        Err(source) => CompositionError::Activation {
            part: part.clone(),
            source,
        },
    }
}

impl ScopeInner {
    pub(crate) fn root(runtime: Arc<Runtime>) -> Arc<Self> {
        Arc::new(Self {
            id: ScopeId::generate(),
            boundary: None,
            parent: None,
            runtime,
            state: Mutex::default(),
            cache: Mutex::default(),
        })
    }

    pub(crate) const fn id(&self) -> &ScopeId {
        &self.id
    }

    pub(crate) fn part_id(&self, part: usize) -> &PartId {
        self.runtime.part_id(part)
    }

    /// Opens a child scope tagged with `boundary`.
    pub(crate) fn child(self: &Arc<Self>, boundary: String) -> Result<Arc<Self>> {
        let child = Arc::new(Self {
            id: ScopeId::generate(),
            boundary: Some(boundary),
            parent: Some(Arc::clone(self)),
            runtime: Arc::clone(&self.runtime),
            state: Mutex::default(),
            cache: Mutex::default(),
        });

        let mut state = lock(&self.state, "scope state")?;
        if state.disposed {
            return Err(CompositionError::ScopeDisposed {
                scope: self.id.clone(),
            });
        }
        state.children.retain(|c| c.strong_count() > 0);
        state.children.push(Arc::downgrade(&child));
        drop(state);

        tracing::debug!(
            scope = %child.id,
            parent = %self.id,
            boundary = child.boundary.as_deref().unwrap_or_default(),
            "boundary scope opened"
        );
        Ok(child)
    }

    fn ensure_active(&self) -> Result<()> {
        if lock(&self.state, "scope state")?.disposed {
            return Err(CompositionError::ScopeDisposed {
                scope: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Resolves `part` as a top-level request, then applies every settable
    /// import deferred while resolving it.
    pub(crate) fn request(self: &Arc<Self>, part: usize) -> Result<Instance> {
        let mut op = Operation::default();
        match self.resolve_part(part, &mut op) {
            Ok(instance) => {
                op.complete()?;
                Ok(instance)
            }
            Err(e) => {
                op.abandon();
                Err(e)
            }
        }
    }

    fn resolve_part(self: &Arc<Self>, part: usize, op: &mut Operation) -> Result<Instance> {
        self.ensure_active()?;
        match &self.runtime.descriptor(part).sharing {
            Sharing::NonShared => {
                let instance = self.construct(part, op)?;
                op.defer(self, part, &instance, false);
                Ok(instance)
            }
            Sharing::Shared { boundary } => {
                let owner = self.owner_for(part, boundary.as_deref())?;
                owner.get_or_create(part, op)
            }
        }
    }

    /// Finds the scope that owns a shared part: the nearest scope tagged
    /// with `boundary`, or the root when there is none.
    fn owner_for(self: &Arc<Self>, part: usize, boundary: Option<&str>) -> Result<Arc<Self>> {
        let mut current = Arc::clone(self);
        loop {
            let owns = match boundary {
                None => current.parent.is_none(),
                Some(name) => current.boundary.as_deref() == Some(name),
            };
            if owns {
                return Ok(current);
            }
            let Some(parent) = current.parent.clone() else {
                return Err(CompositionError::BoundaryNotFound {
                    part: self.runtime.part_id(part).clone(),
                    boundary: boundary.unwrap_or_default().to_owned(),
                });
            };
            current = parent;
        }
    }

    fn get_or_create(self: &Arc<Self>, part: usize, op: &mut Operation) -> Result<Instance> {
        let slot = {
            let mut cache = lock(&self.cache, "scope cache")?;
            Arc::clone(cache.entry(part).or_insert_with(|| self.runtime.new_slot()))
        };

        let me = thread::current().id();
        let mut state = lock(&slot.state, "instance slot")?;
        loop {
            let action = match &*state {
                SlotState::Ready(instance) => SlotAction::Hit(Arc::clone(instance)),
                SlotState::Constructing(owner) if *owner == me => SlotAction::Reentered,
                SlotState::Constructing(_) => SlotAction::Wait,
                SlotState::Empty => SlotAction::Build,
            };
            match action {
                SlotAction::Hit(instance) => {
                    tracing::trace!(part = %self.part_id(part), scope = %self.id, "shared instance reused");
                    return Ok(instance);
                }
                SlotAction::Reentered => {
                    return Err(CompositionError::CircularConstruction {
                        part: self.part_id(part).clone(),
                    });
                }
                SlotAction::Wait => {
                    {
                        let mut waits = lock(&self.runtime.waits, "wait graph")?;
                        if waits.closes_cycle(me, slot.key) {
                            return Err(CompositionError::CircularConstruction {
                                part: self.part_id(part).clone(),
                            });
                        }
                        let _ = waits.waiting.insert(me, slot.key);
                    }
                    let woken = slot.ready.wait(state);
                    let _ = lock(&self.runtime.waits, "wait graph")?.waiting.remove(&me);
                    state = woken.map_err(|_| CompositionError::LockPoisoned {
                        what: "instance slot",
                    })?;
                }
                SlotAction::Build => {
                    let _ = lock(&self.runtime.waits, "wait graph")?
                        .builders
                        .insert(slot.key, me);
                    *state = SlotState::Constructing(me);
                    break;
                }
            }
        }
        drop(state);

        let pending = Pending {
            slot: &slot,
            waits: &self.runtime.waits,
            published: false,
        };
        let instance = self.construct(part, op)?;
        pending.publish(&instance)?;
        op.defer(self, part, &instance, true);
        Ok(instance)
    }

    /// Resolves construction imports and activates a new instance owned
    /// by this scope.
    fn construct(self: &Arc<Self>, part: usize, op: &mut Operation) -> Result<Instance> {
        let runtime = Arc::clone(&self.runtime);
        let imports = runtime.strategy.imports(part, Phase::Construction);
        let mut values = Vec::with_capacity(imports.len());
        for (import, satisfiers) in imports {
            values.push(self.resolve_import(part, import, satisfiers, op)?);
        }

        let id = runtime.part_id(part);
        tracing::debug!(part = %id, scope = %self.id, "activating part");
        let activator = &runtime.activators[part];
        let instance = activator
            .activate(ImportValues::new(values))
            .map_err(|e| activation_error(id, e))?;
        self.track(part, activator.as_ref(), &instance)?;
        Ok(instance)
    }

    fn apply_settable(
        self: &Arc<Self>,
        part: usize,
        instance: &Instance,
        op: &mut Operation,
    ) -> Result<()> {
        let runtime = Arc::clone(&self.runtime);
        for (import, satisfiers) in runtime.strategy.imports(part, Phase::Settable) {
            let value = self.resolve_import(part, import, satisfiers, op)?;
            runtime.activators[part]
                .satisfy(instance, value)
                .map_err(|e| activation_error(runtime.part_id(part), e))?;
        }
        Ok(())
    }

    fn resolve_import(
        self: &Arc<Self>,
        part: usize,
        import: usize,
        satisfiers: &[ExportRef],
        op: &mut Operation,
    ) -> Result<ImportValue> {
        let descriptor = &self.runtime.descriptor(part).imports[import];
        let mut items = Vec::with_capacity(satisfiers.len());
        for export in satisfiers {
            let part_id = self.part_id(export.part).clone();
            let item = match &descriptor.boundary {
                Some(boundary) => Resolved::Factory(ExportFactory::new(
                    Arc::downgrade(self),
                    self.id.clone(),
                    boundary.clone(),
                    export.part,
                    part_id,
                )),
                None => Resolved::Value {
                    instance: self.resolve_part(export.part, op)?,
                    part: part_id,
                },
            };
            items.push(item);
        }
        Ok(ImportValue::new(
            descriptor.name.clone(),
            descriptor.cardinality,
            items,
        ))
    }

    /// Records an instance needing teardown. If the scope was disposed
    /// meanwhile, the instance is released at once and the request fails.
    fn track(&self, part: usize, activator: &dyn Activator, instance: &Instance) -> Result<()> {
        let mut state = lock(&self.state, "scope state")?;
        if state.disposed {
            drop(state);
            if activator.has_teardown() {
                activator.release(instance);
            }
            return Err(CompositionError::ScopeDisposed {
                scope: self.id.clone(),
            });
        }
        if activator.has_teardown() {
            state.owned.push(OwnedInstance {
                part,
                instance: Arc::clone(instance),
            });
        }
        Ok(())
    }

    /// Forgets a shared instance whose settable imports were never
    /// applied, so the next request builds a fresh one. Its teardown runs
    /// at once.
    fn discard(&self, part: usize, instance: &Instance) {
        if let Ok(mut cache) = self.cache.lock() {
            if cache.get(&part).is_some_and(|slot| slot.holds(instance)) {
                let _ = cache.remove(&part);
            }
        }
        let owned = self.state.lock().ok().and_then(|mut state| {
            let at = state
                .owned
                .iter()
                .position(|entry| Arc::ptr_eq(&entry.instance, instance))?;
            Some(state.owned.remove(at))
        });
        tracing::debug!(part = %self.part_id(part), scope = %self.id, "shared instance evicted");
        if let Some(entry) = owned {
            self.runtime.activators[entry.part].release(&entry.instance);
        }
    }

    pub(crate) fn dispose(&self) -> Result<()> {
        let (owned, children) = {
            let mut state = lock(&self.state, "scope state")?;
            if state.disposed {
                return Ok(());
            }
            state.disposed = true;
            (
                std::mem::take(&mut state.owned),
                std::mem::take(&mut state.children),
            )
        };

        for child in children.iter().rev().filter_map(Weak::upgrade) {
            child.dispose()?;
        }

        let released = owned.len();
        for entry in owned.into_iter().rev() {
            tracing::debug!(part = %self.part_id(entry.part), scope = %self.id, "releasing instance");
            self.runtime.activators[entry.part].release(&entry.instance);
        }
        lock(&self.cache, "scope cache")?.clear();

        tracing::debug!(
            scope = %self.id,
            boundary = self.label(),
            released,
            "scope disposed"
        );
        Ok(())
    }

    fn label(&self) -> &str {
        self.boundary.as_deref().unwrap_or(ROOT_SCOPE_LABEL)
    }

    fn is_disposed(&self) -> bool {
        self.state.lock().map_or(true, |state| state.disposed)
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            tracing::warn!(scope = %self.id, error = %e, "scope disposal failed on drop");
        }
    }
}

/// A handle to a lifetime scope.
///
/// Cloning yields another handle to the same scope. Dropping the last
/// handle of a boundary scope disposes it; the root scope is disposed
/// with its container.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    pub(crate) const fn from_inner(inner: Arc<ScopeInner>) -> Self {
        Self { inner }
    }

    pub(crate) const fn inner(&self) -> &Arc<ScopeInner> {
        &self.inner
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Returns the scope identifier.
    #[must_use]
    pub fn id(&self) -> &ScopeId {
        &self.inner.id
    }

    /// Returns the boundary tag, or `None` for the root scope.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.inner.boundary.as_deref()
    }

    /// Returns the enclosing scope, or `None` for the root scope.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.inner.parent.as_ref().map(|p| Self::from_inner(Arc::clone(p)))
    }

    /// Returns whether the scope has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Opens a child scope tagged with `boundary`.
    ///
    /// Boundary factories do this on every call; opening one directly is
    /// useful when several parts should share one boundary instance.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::ScopeDisposed`] if this scope has been
    /// disposed.
    pub fn open_boundary(&self, boundary: impl Into<String>) -> Result<Self> {
        self.inner.child(boundary.into()).map(Self::from_inner)
    }

    /// Resolves an instance of the part with identity `part`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::NotFound`] if no such part exists, or
    /// any error raised while resolving it.
    pub fn resolve(&self, part: &PartId) -> Result<Instance> {
        let index = self
            .inner
            .runtime
            .strategy
            .composition()
            .catalog()
            .find_part(part)
            .ok_or_else(|| CompositionError::NotFound {
                kind: "part",
                id: part.to_string(),
            })?;
        self.inner.request(index)
    }

    /// Resolves the single export of `contract`, defaulting to the
    /// contract named after `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::RootCardinality`] unless exactly one
    /// export matches, [`CompositionError::TypeMismatch`] if it is not a
    /// `T`, or any error raised while resolving it.
    pub fn get_exported_value<T: Any + Send + Sync>(
        &self,
        contract: Option<&ContractIdentity>,
    ) -> Result<Arc<T>> {
        let contract = contract.cloned().unwrap_or_else(ContractIdentity::of::<T>);
        let exports = self.inner.runtime.strategy.root_exports(&contract);
        let [export] = exports else {
            return Err(CompositionError::RootCardinality {
                contract,
                found: exports.len(),
            });
        };
        let instance = self.inner.request(export.part)?;
        downcast(self.inner.part_id(export.part), &instance)
    }

    /// Resolves every export of `contract`, defaulting to the contract
    /// named after `T`. An unknown contract yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::TypeMismatch`] if an instance is not a
    /// `T`, or any error raised while resolving one.
    pub fn get_exported_values<T: Any + Send + Sync>(
        &self,
        contract: Option<&ContractIdentity>,
    ) -> Result<Vec<Arc<T>>> {
        let contract = contract.cloned().unwrap_or_else(ContractIdentity::of::<T>);
        self.inner
            .runtime
            .strategy
            .root_exports(&contract)
            .iter()
            .map(|export| {
                let instance = self.inner.request(export.part)?;
                downcast(self.inner.part_id(export.part), &instance)
            })
            .collect()
    }

    /// Disposes child scopes, then releases owned instances newest first.
    ///
    /// Idempotent: later calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::LockPoisoned`] if a thread panicked
    /// while holding scope state.
    pub fn dispose(&self) -> Result<()> {
        self.inner.dispose()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("boundary", &self.inner.label())
            .field("strategy", &self.inner.runtime.strategy.name())
            .finish_non_exhaustive()
    }
}
