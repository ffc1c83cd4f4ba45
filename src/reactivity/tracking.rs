// ============================================================================
// spark-reactive - Dependency Tracking
// The subscription registry: subscribing reads and notifying writes
// ============================================================================
//
// Every dependency edge is stored twice: the computation sits in the
// subscriber set of an (object, key) slot, and that set sits in the
// computation's own dependency list. The second half lets a computation
// detach itself from every slot before each re-run.
//
// Borrow scoping follows the "collect-then-mutate" pattern: subscribers are
// collected while the registry is borrowed and dispatched after the borrow
// is released, since dispatching runs arbitrary user code.
// ============================================================================

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::core::constants::MAX_CASCADE_DEPTH;
use crate::core::context::{try_with_context, with_context};
use crate::core::types::{AnySubscriber, Change, ComputationId, ObjectId, PropKey, TrackKey};
use crate::observable::raw::RawObject;

// =============================================================================
// SUBSCRIBER SET
// =============================================================================

/// The computations currently depending on one (object, key) slot.
///
/// Holds subscribers weakly and in subscription order.
#[derive(Default)]
pub struct SubscriberSet {
    subscribers: RefCell<IndexMap<ComputationId, Weak<dyn AnySubscriber>>>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Returns false if it was already present.
    pub fn insert(&self, subscriber: &Rc<dyn AnySubscriber>) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.contains_key(&subscriber.id()) {
            return false;
        }
        subscribers.insert(subscriber.id(), Rc::downgrade(subscriber));
        true
    }

    /// Remove a subscriber by id, keeping the order of the others.
    pub fn remove(&self, id: ComputationId) -> bool {
        self.subscribers.borrow_mut().shift_remove(&id).is_some()
    }

    pub fn contains(&self, id: ComputationId) -> bool {
        self.subscribers.borrow().contains_key(&id)
    }

    /// Number of entries, including ones whose computation is gone
    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upgrade every live subscriber, pruning dead entries on the way.
    pub fn live(&self) -> Vec<Rc<dyn AnySubscriber>> {
        let mut live = Vec::new();
        self.subscribers.borrow_mut().retain(|_, weak| match weak.upgrade() {
            Some(subscriber) => {
                live.push(subscriber);
                true
            }
            None => false,
        });
        live
    }
}

// =============================================================================
// SUBSCRIBE - Register dependency when reading a tracked slot
// =============================================================================

/// Subscribe the active computation to `(target, key)`.
///
/// No-op outside a computation or while tracking is paused.
pub fn subscribe(target: ObjectId, key: impl Into<TrackKey>) {
    let key = key.into();
    let linked = with_context(|ctx| {
        if !ctx.is_tracking() {
            return None;
        }
        let active = ctx.active()?;
        let set = ctx
            .registry
            .borrow_mut()
            .entry(target)
            .or_default()
            .entry(key)
            .or_insert_with(|| Rc::new(SubscriberSet::new()))
            .clone();
        Some((active, set))
    });

    if let Some((active, set)) = linked {
        if set.insert(&active) {
            active.add_dep(set);
        }
    }
}

/// Subscribe the active computation to an existing subscriber set.
///
/// Returns false if nothing was linked.
pub fn link_active(set: &Rc<SubscriberSet>) -> bool {
    let Some(active) = with_context(|ctx| if ctx.is_tracking() { ctx.active() } else { None }) else {
        return false;
    };
    if set.insert(&active) {
        active.add_dep(set.clone());
        true
    } else {
        false
    }
}

/// Subscribe the active computation to every set `source` belongs to.
///
/// Lets a read of a cached value stand in for the reads that produced it.
pub fn track_through(source: &dyn AnySubscriber) {
    if !with_context(|ctx| ctx.is_tracking()) {
        return;
    }
    let mut sets = Vec::with_capacity(source.dep_count());
    source.for_each_dep(&mut |set| sets.push(set.clone()));
    for set in &sets {
        link_active(set);
    }
}

// =============================================================================
// NOTIFY - Wake the subscribers of a written slot
// =============================================================================

/// Notify the subscribers of `(target, key)` that a `change` happened.
///
/// The execution set is deduplicated and never contains the active
/// computation. Structural changes also reach enumeration subscribers; on a
/// sequence, an `Add` also reaches length subscribers, and a length write
/// reaches every index at or beyond the new length.
pub fn notify(target: &RawObject, key: &PropKey, change: Change) {
    let sequence_len = target.sequence_len();

    let to_run = with_context(|ctx| {
        let registry = ctx.registry.borrow();
        let Some(slots) = registry.get(&target.id()) else {
            return Vec::new();
        };
        let active = ctx.active_id();

        let mut run: IndexMap<ComputationId, Rc<dyn AnySubscriber>> = IndexMap::new();
        let mut pull = |set: Option<&Rc<SubscriberSet>>| {
            let Some(set) = set else { return };
            for subscriber in set.live() {
                if Some(subscriber.id()) != active && !subscriber.is_stopped() {
                    run.entry(subscriber.id()).or_insert(subscriber);
                }
            }
        };

        pull(slots.get(&TrackKey::Prop(key.clone())));

        if change.is_structural() {
            pull(slots.get(&TrackKey::Iterate));
        }

        if let Some(len) = sequence_len {
            if change == Change::Add {
                pull(slots.get(&TrackKey::Prop(PropKey::Length)));
            }
            if *key == PropKey::Length {
                for (slot, set) in slots.iter() {
                    if let TrackKey::Prop(PropKey::Index(i)) = slot {
                        if *i >= len {
                            pull(Some(set));
                        }
                    }
                }
            }
        }

        run.into_values().collect::<Vec<_>>()
    });

    if to_run.is_empty() {
        return;
    }

    tracing::trace!(object = %target.id(), %key, ?change, subscribers = to_run.len(), "notify");

    let _cascade = CascadeGuard::enter();

    // Dirty-marking subscribers first, so nothing re-runs against a stale cache
    let (derived, rest): (Vec<_>, Vec<_>) = to_run.into_iter().partition(|s| s.is_derived());
    for subscriber in derived.into_iter().chain(rest) {
        // A parent that re-ran earlier in this loop may have stopped it
        if subscriber.is_stopped() {
            continue;
        }
        subscriber.dispatch();
    }
}

/// Counts notifications nested inside subscriber dispatch.
///
/// Each level is a subscriber writing state that wakes another subscriber,
/// so the depth grows only while writes keep re-triggering each other.
struct CascadeGuard;

impl CascadeGuard {
    fn enter() -> Self {
        with_context(|ctx| {
            let depth = ctx.cascade_depth.get() + 1;
            if depth > MAX_CASCADE_DEPTH {
                panic!(
                    "Maximum update depth exceeded. This can happen when computations \
                     keep re-triggering each other. Check for computations that write \
                     to state read by another computation that writes back."
                );
            }
            ctx.cascade_depth.set(depth);
        });
        CascadeGuard
    }
}

impl Drop for CascadeGuard {
    fn drop(&mut self) {
        try_with_context(|ctx| ctx.cascade_depth.set(ctx.cascade_depth.get().saturating_sub(1)));
    }
}

// =============================================================================
// REGISTRY MAINTENANCE
// =============================================================================

/// Drop the registry entry and cached wrappers of a raw object.
///
/// Called when the raw object's last owner goes away.
pub(crate) fn expire_object(id: ObjectId) {
    let removed = try_with_context(|ctx| {
        ctx.wrappers.borrow_mut().retain(|(object, _), _| *object != id);
        ctx.registry.borrow_mut().remove(&id)
    });
    drop(removed);
}

/// Number of live subscribers on `(target, key)`. Diagnostic helper.
pub fn subscriber_count(target: ObjectId, key: impl Into<TrackKey>) -> usize {
    let key = key.into();
    let set = with_context(|ctx| {
        ctx.registry.borrow().get(&target).and_then(|slots| slots.get(&key)).cloned()
    });
    set.map(|set| set.live().len()).unwrap_or(0)
}

/// Whether the registry has an entry for `target`.
pub fn is_registered(target: ObjectId) -> bool {
    with_context(|ctx| ctx.registry.borrow().contains_key(&target))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::computation::{run, run_with, RunOptions};
    use crate::{reactive, record, sequence, untrack};
    use std::cell::Cell;

    #[test]
    fn subscriber_set_dedup_and_order() {
        let set = SubscriberSet::new();
        let a = run(|| ());
        let b = run(|| ());
        let a_dyn = a.as_subscriber();
        let b_dyn = b.as_subscriber();

        assert!(set.insert(&b_dyn));
        assert!(set.insert(&a_dyn));
        assert!(!set.insert(&a_dyn));
        assert_eq!(set.len(), 2);

        let ids: Vec<_> = set.live().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![b.id(), a.id()]);

        assert!(set.remove(b.id()));
        assert!(!set.contains(b.id()));
        assert!(set.contains(a.id()));
    }

    #[test]
    fn live_prunes_dropped_subscribers() {
        let set = SubscriberSet::new();
        {
            let gone = run(|| ());
            set.insert(&gone.as_subscriber());
        }
        assert_eq!(set.len(), 1);
        assert!(set.live().is_empty());
        assert!(set.is_empty());
    }

    #[test]
    fn read_outside_computation_does_not_subscribe() {
        let state = reactive(record! { "foo" => 1 });
        let _ = state.get("foo");
        assert!(!is_registered(state.id()));
    }

    #[test]
    fn read_inside_computation_links_both_directions() {
        let state = reactive(record! { "foo" => 1 });
        let state_clone = state.clone();
        let computation = run(move || {
            let _ = state_clone.get("foo");
            let _ = state_clone.get("foo");
        });

        assert_eq!(subscriber_count(state.id(), PropKey::from("foo")), 1);
        assert_eq!(computation.dep_count(), 1);
    }

    #[test]
    fn untracked_read_does_not_subscribe() {
        let state = reactive(record! { "foo" => 1 });
        let state_clone = state.clone();
        let computation = run(move || {
            untrack(|| state_clone.get("foo"));
        });

        assert_eq!(computation.dep_count(), 0);
        assert_eq!(subscriber_count(state.id(), PropKey::from("foo")), 0);
    }

    #[test]
    fn notify_without_entry_is_noop() {
        let state = reactive(record! { "foo" => 1 });
        // Never read inside a computation: nothing to wake
        state.set("foo", 2);
        assert!(!is_registered(state.id()));
    }

    #[test]
    fn notify_dedups_within_one_event() {
        let items = reactive(sequence!["a"]);
        let runs = Rc::new(Cell::new(0));

        let items_clone = items.clone();
        let runs_clone = runs.clone();
        // Reads both index 1 and length: an append reaches it through both
        let _c = run(move || {
            runs_clone.set(runs_clone.get() + 1);
            let _ = items_clone.get(1usize);
            let _ = items_clone.len();
        });
        assert_eq!(runs.get(), 1);

        items.set(1usize, "b");
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn child_stopped_by_rerunning_parent_is_skipped() {
        let state = reactive(record! { "x" => 1 });
        let child_runs = Rc::new(Cell::new(0));

        let state_clone = state.clone();
        let child_runs_clone = child_runs.clone();
        // Parent subscribes first, so it is dispatched before its child
        let _parent = run(move || {
            let _ = state_clone.get("x");
            let state = state_clone.clone();
            let child_runs = child_runs_clone.clone();
            let _ = run(move || {
                child_runs.set(child_runs.get() + 1);
                let _ = state.get("x");
            });
        });
        assert_eq!(child_runs.get(), 1);

        // The parent's re-run replaces the child; the old one must not run
        state.set("x", 2);
        assert_eq!(child_runs.get(), 2);
    }

    #[test]
    fn scheduler_receives_notifications() {
        let state = reactive(record! { "foo" => 1 });
        let scheduled = Rc::new(Cell::new(0));

        let state_clone = state.clone();
        let scheduled_clone = scheduled.clone();
        let _c = run_with(
            move || {
                let _ = state_clone.get("foo");
            },
            RunOptions::new().scheduler(move |_| scheduled_clone.set(scheduled_clone.get() + 1)),
        );

        state.set("foo", 2);
        state.set("foo", 3);
        assert_eq!(scheduled.get(), 2);
    }

    #[test]
    fn dropping_raw_object_expires_registry_entry() {
        let id;
        {
            let state = reactive(record! { "foo" => 1 });
            id = state.id();
            let state_clone = state.clone();
            let computation = run(move || {
                let _ = state_clone.get("foo");
            });
            assert!(is_registered(id));
            drop(computation);
        }
        assert!(!is_registered(id));
    }
}
