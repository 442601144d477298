//! Arena-backed graph of memoized, dependency-tracked nodes.
//!
//! Every node owns one cached value, a list of named dependencies and a set of
//! listeners. Nodes live in a single arena owned by [`Graph`] and refer to each
//! other by [`NodeId`]; typed [`Node<V>`] handles carry the value type.
//!
//! Reading a node with [`Graph::get`] first reads every dependency (so the
//! whole chain is validated bottom-up), then checks the node's own cached
//! value. A missing, stale or invalid value is rebuilt and the rebuild is
//! pushed to every dependent in one wave.
//!
//! Invalidation is a wave over the invalidated roots and all of their
//! transitive dependents, processed in topological order so each node rebuilds
//! and notifies at most once per wave.
//!
//! # Example
//!
//! ```rust
//! use quarry_reactive::{compute, Dependencies, Graph};
//!
//! let graph = Graph::new();
//! let base = graph.constant("base", 20);
//! let doubled = graph
//!     .add(
//!         "doubled",
//!         compute(|deps, _| Ok(deps.get::<i32>("base")? * 2)),
//!         Dependencies::new().value("base", base),
//!     )
//!     .unwrap();
//!
//! assert_eq!(graph.get(doubled).unwrap(), 40);
//! assert_eq!(graph.get(doubled).unwrap(), 40);
//! assert_eq!(graph.rebuild_count(doubled), 1);
//! ```

use crate::subscription::{ListenerId, Listeners};
use hashbrown::{HashMap, HashSet};
use quarry_core::{Error, Result};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use tracing::{debug, trace};

type Erased = Rc<dyn Any>;

/// Stable identifier of a node in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Returns the arena index of this node.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed handle to a node producing values of type `V`.
pub struct Node<V> {
    id: NodeId,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Node<V> {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Returns the untyped id of this node.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl<V> Clone for Node<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Node<V> {}

impl<V> PartialEq for Node<V> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<V> Eq for Node<V> {}

impl<V> fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.id)
    }
}

impl<V> From<Node<V>> for NodeId {
    fn from(node: Node<V>) -> Self {
        node.id
    }
}

/// How a dependency is handed to its dependent on rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dependency {
    /// Resolved to the dependency's current value.
    Value(NodeId),
    /// Passed as the raw node id; only its invalidation matters.
    Observable(NodeId),
}

impl Dependency {
    /// Returns the node this dependency refers to.
    #[inline]
    pub fn node(&self) -> NodeId {
        match self {
            Dependency::Value(id) | Dependency::Observable(id) => *id,
        }
    }
}

/// Named dependencies of a node, declared at construction.
#[derive(Clone, Debug, Default)]
pub struct Dependencies {
    entries: Vec<(String, Dependency)>,
}

impl Dependencies {
    /// Creates an empty dependency list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dependency resolved to its value on rebuild.
    pub fn value<V>(mut self, name: impl Into<String>, node: Node<V>) -> Self {
        self.entries.push((name.into(), Dependency::Value(node.id)));
        self
    }

    /// Adds a dependency that only signals invalidation.
    pub fn observable(mut self, name: impl Into<String>, node: impl Into<NodeId>) -> Self {
        self.entries
            .push((name.into(), Dependency::Observable(node.into())));
        self
    }

    /// Returns the number of declared dependencies.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no dependency was declared.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum Resolved {
    Value(Erased),
    Observable(NodeId),
}

/// Dependency values handed to [`Compute::construct`], keyed by name.
pub struct DepValues {
    values: HashMap<String, Resolved>,
}

impl DepValues {
    /// Returns a clone of the named dependency's value.
    pub fn get<V: Clone + 'static>(&self, name: &str) -> Result<V> {
        match self.values.get(name) {
            Some(Resolved::Value(value)) => {
                let any: &dyn Any = &**value;
                any.downcast_ref::<V>().cloned().ok_or_else(|| {
                    Error::invalid_operation(format!("dependency {} has a different type", name))
                })
            }
            Some(Resolved::Observable(_)) => Err(Error::invalid_operation(format!(
                "dependency {} is observed, not valued",
                name
            ))),
            None => Err(Error::invalid_operation(format!(
                "unknown dependency {}",
                name
            ))),
        }
    }

    /// Returns the raw node id of the named dependency.
    pub fn observable(&self, name: &str) -> Result<NodeId> {
        match self.values.get(name) {
            Some(Resolved::Observable(id)) => Ok(*id),
            Some(Resolved::Value(_)) => Err(Error::invalid_operation(format!(
                "dependency {} is valued, not observed",
                name
            ))),
            None => Err(Error::invalid_operation(format!(
                "unknown dependency {}",
                name
            ))),
        }
    }

    /// Returns the number of dependencies.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the node has no dependencies.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The behavior of a node: how its value is checked, built and retired.
pub trait Compute: 'static {
    /// The value this node produces.
    type Value: Clone + 'static;

    /// Returns whether a cached value may still be handed out.
    fn validate(&self, _value: &Self::Value) -> Result<bool> {
        Ok(true)
    }

    /// Builds a new value from the dependency values.
    ///
    /// `previous` is the value being replaced, already disposed, so a node
    /// may reuse the object in place.
    fn construct(&mut self, deps: &DepValues, previous: Option<&Self::Value>)
        -> Result<Self::Value>;

    /// Releases resources held by an outgoing value.
    fn dispose(&self, _value: &Self::Value) {}
}

/// A node that always holds the same value.
pub struct Constant<V>(V);

impl<V: Clone + 'static> Constant<V> {
    /// Creates a constant behavior.
    pub fn new(value: V) -> Self {
        Self(value)
    }
}

impl<V: Clone + 'static> Compute for Constant<V> {
    type Value = V;

    fn construct(&mut self, _deps: &DepValues, _previous: Option<&V>) -> Result<V> {
        Ok(self.0.clone())
    }
}

type ConstructFn<V> = Box<dyn FnMut(&DepValues, Option<&V>) -> Result<V>>;
type ValidateFn<V> = Box<dyn Fn(&V) -> Result<bool>>;
type DisposeFn<V> = Box<dyn Fn(&V)>;

/// A node behavior assembled from closures. See [`compute`].
pub struct FnCompute<V> {
    construct: ConstructFn<V>,
    validate: Option<ValidateFn<V>>,
    dispose: Option<DisposeFn<V>>,
}

/// Creates a closure-backed node behavior.
pub fn compute<V, F>(construct: F) -> FnCompute<V>
where
    V: Clone + 'static,
    F: FnMut(&DepValues, Option<&V>) -> Result<V> + 'static,
{
    FnCompute {
        construct: Box::new(construct),
        validate: None,
        dispose: None,
    }
}

impl<V: Clone + 'static> FnCompute<V> {
    /// Sets the validity predicate.
    pub fn with_validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&V) -> Result<bool> + 'static,
    {
        self.validate = Some(Box::new(validate));
        self
    }

    /// Sets the disposal hook.
    pub fn with_dispose<F>(mut self, dispose: F) -> Self
    where
        F: Fn(&V) + 'static,
    {
        self.dispose = Some(Box::new(dispose));
        self
    }
}

impl<V: Clone + 'static> Compute for FnCompute<V> {
    type Value = V;

    fn validate(&self, value: &V) -> Result<bool> {
        match &self.validate {
            Some(validate) => validate(value),
            None => Ok(true),
        }
    }

    fn construct(&mut self, deps: &DepValues, previous: Option<&V>) -> Result<V> {
        (self.construct)(deps, previous)
    }

    fn dispose(&self, value: &V) {
        if let Some(dispose) = &self.dispose {
            dispose(value);
        }
    }
}

trait Behavior {
    fn validate(&self, value: &dyn Any) -> Result<bool>;
    fn construct(&mut self, deps: &DepValues, previous: Option<&dyn Any>) -> Result<Erased>;
    fn dispose(&self, value: &dyn Any);
}

struct Typed<C>(C);

impl<C: Compute> Behavior for Typed<C> {
    fn validate(&self, value: &dyn Any) -> Result<bool> {
        match value.downcast_ref::<C::Value>() {
            Some(value) => self.0.validate(value),
            None => Ok(false),
        }
    }

    fn construct(&mut self, deps: &DepValues, previous: Option<&dyn Any>) -> Result<Erased> {
        let previous = previous.and_then(|p| p.downcast_ref::<C::Value>());
        let value = self.0.construct(deps, previous)?;
        Ok(Rc::new(value))
    }

    fn dispose(&self, value: &dyn Any) {
        if let Some(value) = value.downcast_ref::<C::Value>() {
            self.0.dispose(value);
        }
    }
}

/// Passed to invalidation listeners after their node rebuilt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Invalidation {
    /// The node that rebuilt.
    pub node: NodeId,
    /// The node that started the wave, if any.
    pub source: Option<NodeId>,
}

type ChangeFn = dyn Fn(Option<&dyn Any>, &dyn Any);

enum Listener {
    Invalidate(Rc<dyn Fn(&Invalidation)>),
    Change(Rc<ChangeFn>),
}

struct Slot {
    label: String,
    dependencies: Vec<(String, Dependency)>,
    dependents: BTreeSet<NodeId>,
    value: Option<Erased>,
    behavior: Option<Box<dyn Behavior>>,
    listeners: Listeners<Listener>,
    rebuilds: u64,
    /// Epoch in which the value was last built or validated.
    checked: u64,
    stale: bool,
    building: bool,
    released: bool,
}

impl Slot {
    fn new(label: String, dependencies: Vec<(String, Dependency)>, behavior: Box<dyn Behavior>) -> Self {
        Self {
            label,
            dependencies,
            dependents: BTreeSet::new(),
            value: None,
            behavior: Some(behavior),
            listeners: Listeners::new(),
            rebuilds: 0,
            checked: 0,
            stale: false,
            building: false,
            released: false,
        }
    }
}

/// The arena owning every node of one context.
///
/// A value is validated at most once per top-level operation (a `get` or a
/// wave started from outside any listener or rebuild).
pub struct Graph {
    slots: RefCell<Vec<Slot>>,
    epoch: Cell<u64>,
    depth: Cell<u32>,
}

struct Operation<'a> {
    graph: &'a Graph,
}

impl Drop for Operation<'_> {
    fn drop(&mut self) {
        self.graph.depth.set(self.graph.depth.get() - 1);
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
            epoch: Cell::new(0),
            depth: Cell::new(0),
        }
    }

    fn begin(&self) -> Operation<'_> {
        if self.depth.get() == 0 {
            self.epoch.set(self.epoch.get() + 1);
        }
        self.depth.set(self.depth.get() + 1);
        Operation { graph: self }
    }

    /// Returns the number of nodes ever added, released ones included.
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Returns true if no node was ever added.
    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// Adds a node with the given behavior and dependencies.
    ///
    /// The node is built lazily on first [`get`](Self::get).
    pub fn add<C: Compute>(
        &self,
        label: impl Into<String>,
        behavior: C,
        dependencies: Dependencies,
    ) -> Result<Node<C::Value>> {
        let mut slots = self.slots.borrow_mut();
        for (_, dep) in &dependencies.entries {
            match slots.get(dep.node().index()) {
                Some(slot) if !slot.released => {}
                _ => return Err(Error::StaleNode {
                    node: dep.node().index(),
                }),
            }
        }
        let id = NodeId(slots.len() as u32);
        for (_, dep) in &dependencies.entries {
            slots[dep.node().index()].dependents.insert(id);
        }
        let label = label.into();
        trace!(node = %id, label = %label, "node added");
        slots.push(Slot::new(
            label,
            dependencies.entries,
            Box::new(Typed(behavior)),
        ));
        Ok(Node::new(id))
    }

    /// Adds a dependency-free node that always holds `value`.
    pub fn constant<V: Clone + 'static>(&self, label: impl Into<String>, value: V) -> Node<V> {
        self.push_leaf(label.into(), Constant::new(value))
    }

    /// Adds a bare observable: a leaf whose only purpose is to be invalidated.
    pub fn trigger(&self, label: impl Into<String>) -> Node<()> {
        self.push_leaf(label.into(), Constant::new(()))
    }

    fn push_leaf<C: Compute>(&self, label: String, behavior: C) -> Node<C::Value> {
        let mut slots = self.slots.borrow_mut();
        let id = NodeId(slots.len() as u32);
        slots.push(Slot::new(label, Vec::new(), Box::new(Typed(behavior))));
        Node::new(id)
    }

    /// Returns the current value of a node, rebuilding whatever is invalid.
    pub fn get<V: Clone + 'static>(&self, node: Node<V>) -> Result<V> {
        let _op = self.begin();
        let value = self.refresh(node.id, None, true)?;
        let any: &dyn Any = &*value;
        any.downcast_ref::<V>().cloned().ok_or(Error::StaleNode {
            node: node.id.index(),
        })
    }

    /// Returns the cached value without validating or rebuilding anything.
    pub fn peek<V: Clone + 'static>(&self, node: Node<V>) -> Option<V> {
        let slots = self.slots.borrow();
        let value = slots.get(node.id.index())?.value.as_ref()?;
        let any: &dyn Any = &**value;
        any.downcast_ref::<V>().cloned()
    }

    /// Invalidates one node and everything downstream of it.
    pub fn invalidate(&self, node: impl Into<NodeId>) -> Result<()> {
        let node = node.into();
        self.invalidate_all([node], Some(node))
    }

    /// Invalidates a set of roots and everything downstream of them in a
    /// single wave. Each affected node rebuilds and notifies at most once.
    ///
    /// Nodes that were never built stay unbuilt and are marked stale.
    pub fn invalidate_all<I>(&self, roots: I, source: Option<NodeId>) -> Result<()>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let _op = self.begin();
        let order = self.downstream(roots);
        self.run_wave(order, source)
    }

    /// Registers a listener called after the node rebuilds.
    pub fn on_invalidate<F>(&self, node: impl Into<NodeId>, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Invalidation) + 'static,
    {
        let node = node.into();
        self.with_live_slot(node, |slot| {
            slot.listeners
                .add(Rc::new(Listener::Invalidate(Rc::new(listener))))
        })
    }

    /// Registers a listener called with `(old, new)` after the node rebuilds.
    pub fn on_change<V, F>(&self, node: Node<V>, listener: F) -> Result<ListenerId>
    where
        V: 'static,
        F: Fn(Option<&V>, &V) + 'static,
    {
        let adapter = move |old: Option<&dyn Any>, new: &dyn Any| {
            if let Some(new) = new.downcast_ref::<V>() {
                listener(old.and_then(|o| o.downcast_ref::<V>()), new);
            }
        };
        self.with_live_slot(node.id, |slot| {
            slot.listeners
                .add(Rc::new(Listener::Change(Rc::new(adapter))))
        })
    }

    /// Removes a listener of either kind. Returns true if it was registered.
    pub fn remove_listener(&self, node: impl Into<NodeId>, id: ListenerId) -> bool {
        let node = node.into();
        let mut slots = self.slots.borrow_mut();
        slots
            .get_mut(node.index())
            .map(|slot| slot.listeners.remove(id))
            .unwrap_or(false)
    }

    /// Returns how many times the node has been rebuilt.
    pub fn rebuild_count(&self, node: impl Into<NodeId>) -> u64 {
        let node = node.into();
        self.slots
            .borrow()
            .get(node.index())
            .map(|slot| slot.rebuilds)
            .unwrap_or(0)
    }

    /// Returns the label given to the node at construction.
    pub fn label(&self, node: impl Into<NodeId>) -> Option<String> {
        let node = node.into();
        self.slots
            .borrow()
            .get(node.index())
            .map(|slot| slot.label.clone())
    }

    /// Returns the direct dependents of a node.
    pub fn dependents(&self, node: impl Into<NodeId>) -> Vec<NodeId> {
        let node = node.into();
        self.slots
            .borrow()
            .get(node.index())
            .map(|slot| slot.dependents.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns true if the node holds a value that is not known to be stale.
    pub fn is_cached(&self, node: impl Into<NodeId>) -> bool {
        let node = node.into();
        self.slots
            .borrow()
            .get(node.index())
            .map(|slot| slot.value.is_some() && !slot.stale)
            .unwrap_or(false)
    }

    /// Removes a node from the graph, disposing its value.
    ///
    /// The id stays reserved; later reads fail with [`Error::StaleNode`].
    pub fn release(&self, node: impl Into<NodeId>) {
        let node = node.into();
        let (value, behavior) = {
            let mut slots = self.slots.borrow_mut();
            let Some(slot) = slots.get_mut(node.index()) else {
                return;
            };
            if slot.released {
                return;
            }
            slot.released = true;
            slot.listeners.clear();
            let dependencies = std::mem::take(&mut slot.dependencies);
            let value = slot.value.take();
            let behavior = slot.behavior.take();
            for (_, dep) in dependencies {
                if let Some(parent) = slots.get_mut(dep.node().index()) {
                    parent.dependents.remove(&node);
                }
            }
            (value, behavior)
        };
        if let (Some(value), Some(behavior)) = (value, behavior) {
            behavior.dispose(&*value);
        }
        trace!(node = %node, "node released");
    }

    fn with_live_slot<R>(&self, node: NodeId, f: impl FnOnce(&mut Slot) -> R) -> Result<R> {
        let mut slots = self.slots.borrow_mut();
        match slots.get_mut(node.index()) {
            Some(slot) if !slot.released => Ok(f(slot)),
            _ => Err(Error::StaleNode { node: node.index() }),
        }
    }

    /// Brings one node up to date and returns its value.
    ///
    /// With `propagate`, a rebuild is pushed to every dependent in a wave.
    fn refresh(&self, node: NodeId, source: Option<NodeId>, propagate: bool) -> Result<Erased> {
        let deps = self.resolve(node)?;
        if let Some(value) = self.current(node)? {
            return Ok(value);
        }
        let value = self.rebuild(node, &deps, source)?;
        if propagate {
            let order = self.downstream(self.dependents(node));
            self.run_wave(order, Some(node))?;
        }
        Ok(value)
    }

    fn resolve(&self, node: NodeId) -> Result<DepValues> {
        let entries = self.with_live_slot(node, |slot| slot.dependencies.clone())?;
        let mut values = HashMap::with_capacity(entries.len());
        for (name, dep) in entries {
            let resolved = match dep {
                Dependency::Value(id) => Resolved::Value(self.refresh(id, None, true)?),
                Dependency::Observable(id) => Resolved::Observable(id),
            };
            values.insert(name, resolved);
        }
        Ok(DepValues { values })
    }

    /// Returns the cached value if it is present, fresh and valid.
    fn current(&self, node: NodeId) -> Result<Option<Erased>> {
        let (value, label) = {
            let slots = self.slots.borrow();
            let slot = &slots[node.index()];
            if slot.stale || slot.building {
                return Ok(None);
            }
            match &slot.value {
                Some(value) if slot.checked == self.epoch.get() => return Ok(Some(value.clone())),
                Some(value) => (value.clone(), slot.label.clone()),
                None => return Ok(None),
            }
        };
        let behavior = self.slots.borrow_mut()[node.index()].behavior.take();
        let Some(behavior) = behavior else {
            return Err(Error::Reentrant { node: node.index() });
        };
        let valid = behavior.validate(&*value);
        {
            let mut slots = self.slots.borrow_mut();
            let slot = &mut slots[node.index()];
            slot.behavior = Some(behavior);
            if matches!(valid, Ok(true)) {
                slot.checked = self.epoch.get();
            }
        }
        match valid.map_err(|e| e.in_node(node.index(), &label))? {
            true => Ok(Some(value)),
            false => {
                trace!(node = %node, label = %label, "cached value no longer valid");
                Ok(None)
            }
        }
    }

    fn rebuild(&self, node: NodeId, deps: &DepValues, source: Option<NodeId>) -> Result<Erased> {
        let (old, mut behavior, label) = {
            let mut slots = self.slots.borrow_mut();
            let slot = &mut slots[node.index()];
            if slot.building {
                return Err(Error::Reentrant { node: node.index() });
            }
            let Some(behavior) = slot.behavior.take() else {
                return Err(Error::Reentrant { node: node.index() });
            };
            slot.stale = false;
            slot.building = true;
            (slot.value.take(), behavior, slot.label.clone())
        };

        if let Some(old) = &old {
            behavior.dispose(&**old);
        }
        let result = behavior.construct(deps, old.as_deref());

        let listeners = {
            let mut slots = self.slots.borrow_mut();
            let slot = &mut slots[node.index()];
            slot.building = false;
            if slot.released {
                if let Ok(value) = &result {
                    behavior.dispose(&**value);
                }
                return Err(Error::StaleNode { node: node.index() });
            }
            slot.behavior = Some(behavior);
            if let Ok(value) = &result {
                slot.value = Some(value.clone());
                slot.rebuilds += 1;
                slot.checked = self.epoch.get();
            }
            slot.listeners.snapshot()
        };

        let value = result.map_err(|e| e.in_node(node.index(), &label))?;
        debug!(node = %node, label = %label, "node rebuilt");

        let invalidation = Invalidation { node, source };
        for listener in &listeners {
            if let Listener::Invalidate(f) = &**listener {
                f(&invalidation);
            }
        }
        for listener in &listeners {
            if let Listener::Change(f) = &**listener {
                f(old.as_deref(), &*value);
            }
        }
        Ok(value)
    }

    fn run_wave(&self, order: Vec<NodeId>, source: Option<NodeId>) -> Result<()> {
        if order.is_empty() {
            return Ok(());
        }
        {
            let mut slots = self.slots.borrow_mut();
            for id in &order {
                slots[id.index()].stale = true;
            }
        }
        debug!(nodes = order.len(), source = ?source, "invalidation wave");
        for id in order {
            let pending = {
                let slots = self.slots.borrow();
                let slot = &slots[id.index()];
                slot.stale && slot.value.is_some() && !slot.building && !slot.released
            };
            if pending {
                self.refresh(id, source, false)?;
            }
        }
        Ok(())
    }

    /// Returns the roots and all their transitive dependents in topological
    /// order (reverse DFS post-order).
    fn downstream<I>(&self, roots: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let slots = self.slots.borrow();
        let children = |id: NodeId| -> Vec<NodeId> {
            slots
                .get(id.index())
                .filter(|slot| !slot.released)
                .map(|slot| slot.dependents.iter().rev().copied().collect())
                .unwrap_or_default()
        };
        let mut visited = HashSet::new();
        let mut post = Vec::new();
        for root in roots {
            if slots.get(root.index()).map_or(true, |slot| slot.released) {
                continue;
            }
            if !visited.insert(root) {
                continue;
            }
            let mut stack = vec![(root, children(root))];
            loop {
                let next = match stack.last_mut() {
                    None => break,
                    Some((_, pending)) => pending.pop(),
                };
                match next {
                    Some(child) => {
                        if visited.insert(child) {
                            stack.push((child, children(child)));
                        }
                    }
                    None => {
                        if let Some((done, _)) = stack.pop() {
                            post.push(done);
                        }
                    }
                }
            }
        }
        post.reverse();
        post
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        let slots = self.slots.get_mut();
        for slot in slots.iter_mut().rev() {
            if let (Some(value), Some(behavior)) = (slot.value.take(), slot.behavior.as_ref()) {
                behavior.dispose(&*value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn counter_node(graph: &Graph, base: Node<i32>) -> Node<i32> {
        graph
            .add(
                "plus_one",
                compute(|deps, _| Ok(deps.get::<i32>("base")? + 1)),
                Dependencies::new().value("base", base),
            )
            .unwrap()
    }

    #[test]
    fn test_memoization() {
        let graph = Graph::new();
        let base = graph.constant("base", 1);
        let node = counter_node(&graph, base);

        assert_eq!(graph.get(node).unwrap(), 2);
        assert_eq!(graph.get(node).unwrap(), 2);
        assert_eq!(graph.rebuild_count(node), 1);
        assert_eq!(graph.rebuild_count(base), 1);
    }

    #[test]
    fn test_invalidate_rebuilds_downstream_once() {
        let graph = Graph::new();
        let base = graph.constant("base", 1);
        let left = counter_node(&graph, base);
        let right = counter_node(&graph, base);
        let join = graph
            .add(
                "join",
                compute(|deps, _| Ok(deps.get::<i32>("l")? + deps.get::<i32>("r")?)),
                Dependencies::new().value("l", left).value("r", right),
            )
            .unwrap();
        assert_eq!(graph.get(join).unwrap(), 4);

        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        graph
            .on_invalidate(join, move |_| counter.set(counter.get() + 1))
            .unwrap();

        graph.invalidate(base).unwrap();
        assert_eq!(fired.get(), 1);
        assert_eq!(graph.rebuild_count(join), 2);
        assert_eq!(graph.rebuild_count(left), 2);
        assert_eq!(graph.rebuild_count(right), 2);

        // Already rebuilt by the wave.
        assert_eq!(graph.get(join).unwrap(), 4);
        assert_eq!(graph.rebuild_count(join), 2);
    }

    #[test]
    fn test_change_listener_sees_old_and_new() {
        let graph = Graph::new();
        let source = Rc::new(Cell::new(10));
        let read = source.clone();
        let node = graph
            .add("cell", compute(move |_, _| Ok(read.get())), Dependencies::new())
            .unwrap();
        assert_eq!(graph.get(node).unwrap(), 10);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        graph
            .on_change(node, move |old: Option<&i32>, new: &i32| {
                sink.borrow_mut().push((old.copied(), *new))
            })
            .unwrap();

        source.set(11);
        graph.invalidate(node).unwrap();
        assert_eq!(*seen.borrow(), vec![(Some(10), 11)]);
    }

    #[test]
    fn test_validate_false_rebuilds_and_disposes() {
        let graph = Graph::new();
        let open = Rc::new(Cell::new(true));
        let disposed = Rc::new(Cell::new(0));
        let (check, count) = (open.clone(), disposed.clone());
        let node = graph
            .add(
                "resource",
                compute(|_, _| Ok(7))
                    .with_validate(move |_| Ok(check.get()))
                    .with_dispose(move |_| count.set(count.get() + 1)),
                Dependencies::new(),
            )
            .unwrap();

        graph.get(node).unwrap();
        graph.get(node).unwrap();
        assert_eq!(graph.rebuild_count(node), 1);

        open.set(false);
        graph.get(node).unwrap();
        assert_eq!(graph.rebuild_count(node), 2);
        assert_eq!(disposed.get(), 1);
    }

    #[test]
    fn test_lazy_rebuild_propagates_to_dependents() {
        let graph = Graph::new();
        let open = Rc::new(Cell::new(true));
        let check = open.clone();
        let root = graph
            .add(
                "root",
                compute(|_, _| Ok(1)).with_validate(move |_| Ok(check.get())),
                Dependencies::new(),
            )
            .unwrap();
        let a = counter_node(&graph, root);
        let b = counter_node(&graph, root);
        graph.get(a).unwrap();
        graph.get(b).unwrap();

        open.set(false);
        graph.get(a).unwrap();
        open.set(true);
        assert_eq!(graph.rebuild_count(a), 2);
        // The sibling was rebuilt by the same wave.
        assert_eq!(graph.rebuild_count(b), 2);
        graph.get(b).unwrap();
        assert_eq!(graph.rebuild_count(b), 2);
    }

    #[test]
    fn test_error_is_wrapped_and_not_cached() {
        let graph = Graph::new();
        let fail = Rc::new(Cell::new(true));
        let flag = fail.clone();
        let node = graph
            .add(
                "flaky",
                compute(move |_, _| {
                    if flag.get() {
                        Err(Error::connection("refused"))
                    } else {
                        Ok(5)
                    }
                }),
                Dependencies::new(),
            )
            .unwrap();
        let downstream = counter_node(&graph, node);

        let err = graph.get(downstream).unwrap_err();
        match &err {
            Error::Node { label, .. } => assert_eq!(label, "flaky"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(err.root_cause(), Error::Connection { .. }));

        fail.set(false);
        assert_eq!(graph.get(downstream).unwrap(), 6);
    }

    #[test]
    fn test_reentrant_rebuild_is_error() {
        let graph = Rc::new(Graph::new());
        let handle: Rc<Cell<Option<Node<i32>>>> = Rc::new(Cell::new(None));
        let (g, h) = (Rc::downgrade(&graph), handle.clone());
        let node = graph
            .add(
                "self_reader",
                compute(move |_, _| {
                    let graph = g.upgrade().ok_or(Error::invalid_operation("dropped"))?;
                    match h.get() {
                        Some(me) => graph.get(me),
                        None => Ok(0),
                    }
                }),
                Dependencies::new(),
            )
            .unwrap();
        handle.set(Some(node));

        let err = graph.get(node).unwrap_err();
        assert!(matches!(err, Error::Reentrant { .. }));
    }

    #[test]
    fn test_observable_dependency_passes_id() {
        let graph = Graph::new();
        let trigger = graph.trigger("trigger");
        let node = graph
            .add(
                "watcher",
                compute(|deps, _| Ok(deps.observable("t")?.index())),
                Dependencies::new().observable("t", trigger),
            )
            .unwrap();
        assert_eq!(graph.get(node).unwrap(), trigger.id().index());

        graph.invalidate(trigger).unwrap();
        assert_eq!(graph.rebuild_count(node), 2);
    }

    #[test]
    fn test_previous_value_reused() {
        let graph = Graph::new();
        let trigger = graph.trigger("trigger");
        let node = graph
            .add(
                "shared",
                compute(|_, previous: Option<&Rc<Cell<u32>>>| {
                    Ok(match previous {
                        Some(prev) => {
                            prev.set(prev.get() + 1);
                            prev.clone()
                        }
                        None => Rc::new(Cell::new(0)),
                    })
                }),
                Dependencies::new().observable("t", trigger),
            )
            .unwrap();
        let first = graph.get(node).unwrap();
        graph.invalidate(trigger).unwrap();
        let second = graph.get(node).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn test_listener_added_during_notification_waits() {
        let graph = Rc::new(Graph::new());
        let trigger = graph.trigger("trigger");
        graph.get(trigger).unwrap();
        let late = Rc::new(Cell::new(0));
        let (g, l) = (Rc::downgrade(&graph), late.clone());
        graph
            .on_invalidate(trigger, move |inv| {
                if let Some(graph) = g.upgrade() {
                    let l = l.clone();
                    graph
                        .on_invalidate(inv.node, move |_| l.set(l.get() + 1))
                        .unwrap();
                }
            })
            .unwrap();

        graph.invalidate(trigger).unwrap();
        assert_eq!(late.get(), 0);
        graph.invalidate(trigger).unwrap();
        assert_eq!(late.get(), 1);
    }

    #[test]
    fn test_unbuilt_nodes_stay_lazy() {
        let graph = Graph::new();
        let base = graph.constant("base", 1);
        let node = counter_node(&graph, base);
        graph.invalidate(base).unwrap();
        assert_eq!(graph.rebuild_count(node), 0);
        assert_eq!(graph.get(node).unwrap(), 2);
    }

    #[test]
    fn test_release() {
        let graph = Graph::new();
        let base = graph.constant("base", 1);
        let node = counter_node(&graph, base);
        graph.get(node).unwrap();
        graph.release(node);

        assert!(graph.dependents(base).is_empty());
        assert!(matches!(graph.get(node), Err(Error::StaleNode { .. })));
        assert!(graph
            .add("late", compute(|_, _| Ok(0)), Dependencies::new().value("n", node))
            .is_err());
    }

    #[test]
    fn test_remove_listener() {
        let graph = Graph::new();
        let trigger = graph.trigger("trigger");
        graph.get(trigger).unwrap();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let id = graph
            .on_invalidate(trigger, move |_| counter.set(counter.get() + 1))
            .unwrap();
        assert!(graph.remove_listener(trigger, id));
        graph.invalidate(trigger).unwrap();
        assert_eq!(fired.get(), 0);
    }
}
