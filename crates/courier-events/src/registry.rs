//! Per-event-type listener registries.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};

use tracing::{debug, trace, warn};

use crate::event::{Event, EventType, Projection, TypeKey};
use crate::listener::{ListenerId, RegisteredListener};
use crate::order::Order;

/// Listeners of one stage, in registration order.
pub type Stage = Arc<[Arc<RegisteredListener>]>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn empty_stage() -> RwLock<Stage> {
    RwLock::new(Arc::from(Vec::new()))
}

#[derive(Clone)]
struct ParentLink {
    list: Arc<ListenerList>,
    projection: Projection,
}

/// One registry in a resolved dispatch chain, with the projections that map
/// the posted event onto the view its listeners expect.
#[derive(Clone)]
pub struct ChainLink {
    list: Arc<ListenerList>,
    path: Vec<Projection>,
}

impl ChainLink {
    /// The registry.
    #[must_use]
    pub fn list(&self) -> &Arc<ListenerList> {
        &self.list
    }

    /// Number of projections between the posted type and this registry.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Project the posted event onto this registry's event type.
    pub fn project<'e>(&self, event: &'e mut dyn Event) -> Option<&'e mut dyn Event> {
        self.path
            .iter()
            .try_fold(event, |view, projection| projection(view))
    }
}

impl fmt::Debug for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainLink")
            .field("event_type", &self.list.event_type)
            .field("depth", &self.path.len())
            .finish()
    }
}

/// A resolved dispatch chain: the posted type's registry first, then its
/// ancestors depth-first in declaration order, each at its first occurrence.
#[derive(Clone)]
pub struct Chain {
    head: ChainLink,
    ancestors: Arc<[ChainLink]>,
}

impl Chain {
    /// Links in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &ChainLink> {
        std::iter::once(&self.head).chain(self.ancestors.iter())
    }

    /// Link at `index`; `0` is the posted type's registry.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ChainLink> {
        match index.checked_sub(1) {
            None => Some(&self.head),
            Some(ancestor) => self.ancestors.get(ancestor),
        }
    }

    /// The cached ancestor links.
    #[must_use]
    pub fn ancestors(&self) -> &Arc<[ChainLink]> {
        &self.ancestors
    }

    /// Number of links, including the head.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ancestors.len().saturating_add(1)
    }

    /// Always `false`: a chain contains at least its head.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// The listeners registered for one event type.
///
/// Each stage is an immutable snapshot swapped on write, so dispatch never
/// holds a lock while listeners run. Parent registries are linked with
/// [`add_parent`](Self::add_parent); the resolved chain of ancestors is
/// cached until the hierarchy changes.
pub struct ListenerList {
    event_type: EventType,
    stages: [RwLock<Stage>; Order::COUNT],
    parents: RwLock<Vec<ParentLink>>,
    children: Mutex<Vec<Weak<ListenerList>>>,
    ancestors: RwLock<Option<Arc<[ChainLink]>>>,
    epoch: AtomicU64,
}

impl ListenerList {
    /// Create an empty registry for `event_type`.
    #[must_use]
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            stages: std::array::from_fn(|_| empty_stage()),
            parents: RwLock::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            ancestors: RwLock::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    /// The event type this registry serves.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Append a listener to its stage.
    pub fn register(&self, listener: Arc<RegisteredListener>) {
        let order = listener.order();
        let name = listener.name().to_string();
        {
            let mut stage = write(&self.stages[order.index()]);
            let mut next = Vec::with_capacity(stage.len().saturating_add(1));
            next.extend(stage.iter().cloned());
            next.push(listener);
            *stage = next.into();
        }
        debug!(
            event_type = %self.event_type,
            listener = %name,
            order = %order,
            "Listener registered"
        );
    }

    /// Remove the listener with the same id.
    ///
    /// Returns `true` if it was registered here.
    pub fn unregister(&self, listener: &RegisteredListener) -> bool {
        let id = listener.id();
        let removed = self.remove_from(listener.order(), |candidate| candidate.id() == id);
        if removed > 0 {
            debug!(
                event_type = %self.event_type,
                listener = %listener.name(),
                "Listener unregistered"
            );
        }
        removed > 0
    }

    /// Remove the listener with `id` from any stage.
    pub fn unregister_id(&self, id: ListenerId) -> bool {
        self.unregister_where(|candidate| candidate.id() == id) > 0
    }

    /// Remove every listener matching `predicate`. Returns how many were
    /// removed.
    pub fn unregister_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&RegisteredListener) -> bool,
    {
        let removed = Order::ALL
            .iter()
            .map(|&order| self.remove_from(order, &predicate))
            .fold(0_usize, usize::saturating_add);
        if removed > 0 {
            debug!(event_type = %self.event_type, removed, "Listeners unregistered");
        }
        removed
    }

    fn remove_from<P>(&self, order: Order, predicate: P) -> usize
    where
        P: Fn(&RegisteredListener) -> bool,
    {
        let mut stage = write(&self.stages[order.index()]);
        if !stage.iter().any(|listener| predicate(listener.as_ref())) {
            return 0;
        }
        let (dropped, kept): (Vec<_>, Vec<_>) =
            stage.iter().cloned().partition(|listener| predicate(listener.as_ref()));
        let previous = std::mem::replace(&mut *stage, kept.into());
        drop(stage);
        // Listener destructors may re-enter the registry.
        drop(previous);
        let count = dropped.len();
        drop(dropped);
        count
    }

    /// The listeners of one stage, in registration order.
    #[must_use]
    pub fn snapshot(&self, order: Order) -> Stage {
        Arc::clone(&read(&self.stages[order.index()]))
    }

    /// Every listener, in dispatch order.
    #[must_use]
    pub fn listeners(&self) -> Vec<Arc<RegisteredListener>> {
        Order::ALL
            .iter()
            .flat_map(|&order| self.snapshot(order).iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Number of listeners registered here.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.iter().map(|stage| read(stage).len()).sum()
    }

    /// Whether no listener is registered here.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(|stage| read(stage).is_empty())
    }

    /// Remove every listener.
    pub fn clear(&self) {
        let previous: Vec<Stage> = self
            .stages
            .iter()
            .map(|stage| std::mem::replace(&mut *write(stage), Arc::from(Vec::new())))
            .collect();
        drop(previous);
        debug!(event_type = %self.event_type, "Listeners cleared");
    }

    /// Declare `parent` as a more general registry consulted after this one.
    ///
    /// Returns `false` if `parent` is this registry's own type or is already
    /// linked.
    pub fn add_parent(
        self: &Arc<Self>,
        parent: &Arc<ListenerList>,
        projection: Projection,
    ) -> bool {
        if parent.event_type == self.event_type {
            warn!(event_type = %self.event_type, "Ignoring registry declared as its own parent");
            return false;
        }
        {
            let mut parents = write(&self.parents);
            if parents
                .iter()
                .any(|link| link.list.event_type == parent.event_type)
            {
                return false;
            }
            parents.push(ParentLink {
                list: Arc::clone(parent),
                projection,
            });
        }
        {
            let mut children = lock(&parent.children);
            children.retain(|child| child.strong_count() > 0);
            children.push(Arc::downgrade(self));
        }
        debug!(
            event_type = %self.event_type,
            parent = %parent.event_type,
            "Parent registry linked"
        );
        self.invalidate();
        true
    }

    /// Event types of the directly linked parents, in declaration order.
    #[must_use]
    pub fn parents(&self) -> Vec<EventType> {
        read(&self.parents)
            .iter()
            .map(|link| link.list.event_type)
            .collect()
    }

    /// Unlink every parent and child.
    pub(crate) fn detach(&self) {
        let parents = std::mem::take(&mut *write(&self.parents));
        lock(&self.children).clear();
        *write(&self.ancestors) = None;
        drop(parents);
    }

    /// The resolved dispatch chain.
    ///
    /// Ancestors are resolved once and cached until a parent is linked
    /// anywhere above this registry.
    pub fn chain(self: &Arc<Self>) -> Chain {
        Chain {
            head: ChainLink {
                list: Arc::clone(self),
                path: Vec::new(),
            },
            ancestors: self.resolved_ancestors(),
        }
    }

    fn resolved_ancestors(&self) -> Arc<[ChainLink]> {
        if let Some(ancestors) = read(&self.ancestors).as_ref() {
            return Arc::clone(ancestors);
        }
        let epoch = self.epoch.load(Ordering::Acquire);
        let mut links = Vec::new();
        let mut seen = HashSet::from([self.event_type.key()]);
        let mut stack = vec![self.event_type.key()];
        self.collect_ancestors(&[], &mut seen, &mut stack, &mut links);
        let ancestors: Arc<[ChainLink]> = links.into();

        let mut slot = write(&self.ancestors);
        if self.epoch.load(Ordering::Acquire) == epoch {
            *slot = Some(Arc::clone(&ancestors));
        }
        trace!(
            event_type = %self.event_type,
            ancestors = ancestors.len(),
            "Ancestor chain resolved"
        );
        ancestors
    }

    fn collect_ancestors(
        &self,
        path: &[Projection],
        seen: &mut HashSet<TypeKey>,
        stack: &mut Vec<TypeKey>,
        links: &mut Vec<ChainLink>,
    ) {
        let parents = read(&self.parents).clone();
        for parent in parents {
            let key = parent.list.event_type.key();
            if stack.contains(&key) {
                warn!(
                    event_type = %self.event_type,
                    parent = %parent.list.event_type,
                    "Ignoring cyclic parent registry"
                );
                continue;
            }
            if !seen.insert(key) {
                continue;
            }
            let mut parent_path = path.to_vec();
            parent_path.push(parent.projection);
            links.push(ChainLink {
                list: Arc::clone(&parent.list),
                path: parent_path.clone(),
            });
            stack.push(key);
            parent
                .list
                .collect_ancestors(&parent_path, seen, stack, links);
            stack.pop();
        }
    }

    fn invalidate(&self) {
        let mut visited = HashSet::new();
        self.invalidate_from(&mut visited);
    }

    fn invalidate_from(&self, visited: &mut HashSet<TypeKey>) {
        if !visited.insert(self.event_type.key()) {
            return;
        }
        self.epoch.fetch_add(1, Ordering::AcqRel);
        *write(&self.ancestors) = None;
        let children: Vec<Arc<ListenerList>> = lock(&self.children)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for child in children {
            child.invalidate_from(visited);
        }
    }
}

impl fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("event_type", &self.event_type)
            .field("listener_count", &self.len())
            .field("parents", &self.parents())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::error::InvocationError;
    use crate::invoke::{EventListener, FnListener};
    use crate::listener::ListenerSpec;

    struct Ping;
    impl Event for Ping {}

    struct Root {
        tag: u32,
    }
    impl Event for Root {}

    fn listener(order: Order) -> Arc<RegisteredListener> {
        let target = Arc::new(FnListener::new(|_: &mut Ping| {}));
        Arc::new(RegisteredListener::new(
            EventType::of::<Ping>(),
            ListenerSpec::new().with_order(order),
            target,
        ))
    }

    fn project_nothing(_: &mut dyn Event) -> Option<&mut dyn Event> {
        None
    }

    fn names(chain: &Chain) -> Vec<&'static str> {
        chain
            .iter()
            .map(|link| link.list().event_type().key().name())
            .collect()
    }

    fn list_of<T: Event>() -> Arc<ListenerList> {
        Arc::new(ListenerList::new(EventType::of::<T>()))
    }

    #[test]
    fn test_register_preserves_order_within_stage() {
        let list = list_of::<Ping>();
        let first = listener(Order::Normal);
        let second = listener(Order::Normal);
        let early = listener(Order::Early);
        list.register(Arc::clone(&first));
        list.register(Arc::clone(&second));
        list.register(Arc::clone(&early));

        let normal = list.snapshot(Order::Normal);
        assert_eq!(normal.len(), 2);
        assert_eq!(normal[0].id(), first.id());
        assert_eq!(normal[1].id(), second.id());

        let all: Vec<_> = list.listeners().iter().map(|l| l.id()).collect();
        assert_eq!(all, vec![early.id(), first.id(), second.id()]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let list = list_of::<Ping>();
        let kept = listener(Order::Normal);
        let gone = listener(Order::Normal);
        list.register(Arc::clone(&kept));
        list.register(Arc::clone(&gone));

        assert!(list.unregister(&gone));
        assert!(!list.unregister(&gone));
        assert!(!list.unregister(&listener(Order::Last)));
        assert_eq!(list.len(), 1);
        assert_eq!(list.snapshot(Order::Normal)[0].id(), kept.id());
    }

    #[test]
    fn test_snapshot_survives_later_writes() {
        let list = list_of::<Ping>();
        list.register(listener(Order::Normal));
        let snapshot = list.snapshot(Order::Normal);
        list.register(listener(Order::Normal));
        list.clear();
        assert_eq!(snapshot.len(), 1);
        assert!(list.is_empty());
    }

    #[test]
    fn test_unregister_where_counts_across_stages() {
        let list = list_of::<Ping>();
        for order in Order::ALL {
            list.register(listener(order));
        }
        let removed = list.unregister_where(|l| l.order() >= Order::Normal);
        assert_eq!(removed, 3);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_unregister_by_id() {
        let list = list_of::<Ping>();
        let target = listener(Order::Late);
        list.register(Arc::clone(&target));
        assert!(list.unregister_id(target.id()));
        assert!(list.is_empty());
    }

    #[test]
    fn test_chain_depth_first_with_diamond() {
        struct A;
        impl Event for A {}
        struct B;
        impl Event for B {}
        struct C;
        impl Event for C {}
        struct D;
        impl Event for D {}

        // D -> (B, C), B -> A, C -> A
        let a = list_of::<A>();
        let b = list_of::<B>();
        let c = list_of::<C>();
        let d = list_of::<D>();
        assert!(b.add_parent(&a, project_nothing));
        assert!(c.add_parent(&a, project_nothing));
        assert!(d.add_parent(&b, project_nothing));
        assert!(d.add_parent(&c, project_nothing));
        assert!(!d.add_parent(&c, project_nothing));

        let chain = d.chain();
        let expected: Vec<_> = [
            TypeKey::of::<D>(),
            TypeKey::of::<B>(),
            TypeKey::of::<A>(),
            TypeKey::of::<C>(),
        ]
        .iter()
        .map(TypeKey::name)
        .collect();
        assert_eq!(names(&chain), expected);
        assert_eq!(chain.get(2).unwrap().depth(), 2);
        assert!(chain.get(4).is_none());
    }

    #[test]
    fn test_chain_ignores_cycles() {
        struct A;
        impl Event for A {}
        struct B;
        impl Event for B {}

        let a = list_of::<A>();
        let b = list_of::<B>();
        assert!(a.add_parent(&b, project_nothing));
        assert!(b.add_parent(&a, project_nothing));
        assert!(!a.add_parent(&a, project_nothing));

        assert_eq!(a.chain().len(), 2);
        assert_eq!(b.chain().len(), 2);
        a.detach();
        b.detach();
    }

    #[test]
    fn test_chain_cache_invalidated_for_descendants() {
        struct A;
        impl Event for A {}
        struct B;
        impl Event for B {}
        struct C;
        impl Event for C {}

        let a = list_of::<A>();
        let b = list_of::<B>();
        let c = list_of::<C>();
        c.add_parent(&b, project_nothing);
        assert_eq!(c.chain().len(), 2);
        // Cached until the hierarchy changes.
        assert!(Arc::ptr_eq(c.chain().ancestors(), c.chain().ancestors()));

        b.add_parent(&a, project_nothing);
        assert_eq!(c.chain().len(), 3);
    }

    #[test]
    fn test_chain_link_projects_event() {
        struct Leaf {
            root: Root,
        }
        impl Event for Leaf {}
        fn leaf_to_root(event: &mut dyn Event) -> Option<&mut dyn Event> {
            let leaf = event.downcast_mut::<Leaf>()?;
            let root: &mut dyn Event = &mut leaf.root;
            Some(root)
        }

        let root = list_of::<Root>();
        let leaf = list_of::<Leaf>();
        leaf.add_parent(&root, leaf_to_root);
        let chain = leaf.chain();

        let mut event = Leaf {
            root: Root { tag: 4 },
        };
        let view = chain.get(1).unwrap().project(&mut event).unwrap();
        assert_eq!(view.downcast_ref::<Root>().map(|r| r.tag), Some(4));
        assert!(chain.get(0).unwrap().project(&mut event).is_some());
    }

    #[test]
    fn test_drop_during_unregister_can_reenter() {
        struct Reentrant {
            list: Arc<ListenerList>,
            observed: Arc<AtomicUsize>,
        }
        impl EventListener for Reentrant {
            fn post(&self, _: &mut dyn Event) -> Result<(), InvocationError> {
                Ok(())
            }
        }
        impl Drop for Reentrant {
            fn drop(&mut self) {
                // Deadlocks if the stage lock is still held.
                self.observed.store(self.list.len(), Ordering::SeqCst);
            }
        }

        let list = list_of::<Ping>();
        let observed = Arc::new(AtomicUsize::new(usize::MAX));
        let target = Arc::new(Reentrant {
            list: Arc::clone(&list),
            observed: Arc::clone(&observed),
        });
        list.register(Arc::new(RegisteredListener::new(
            EventType::of::<Ping>(),
            ListenerSpec::new(),
            target,
        )));

        assert_eq!(list.unregister_where(|_| true), 1);
        assert_eq!(observed.load(Ordering::SeqCst), 0);
    }
}
