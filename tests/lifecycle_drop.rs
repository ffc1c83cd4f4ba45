use spark_reactive::{
    cloned, derive, is_registered, reactive, readonly, record, run, subscriber_count, watch,
    with_context, PropKey, WatchOptions,
};
use std::cell::Cell;
use std::rc::Rc;

fn bump(c: &Cell<u32>) {
    c.set(c.get() + 1);
}

fn cached_wrappers() -> usize {
    with_context(|ctx| ctx.wrappers.borrow().len())
}

#[test]
fn test_computation_drop_unsubscribes() {
    let state = reactive(record! { "foo" => 1 });
    let runs = Rc::new(Cell::new(0));

    {
        let _c = run(cloned!(state, runs => move || {
            bump(&runs);
            let _ = state.get("foo");
        }));
        assert_eq!(subscriber_count(state.id(), PropKey::from("foo")), 1);
    }

    assert_eq!(subscriber_count(state.id(), PropKey::from("foo")), 0);
    state.set("foo", 2);
    assert_eq!(runs.get(), 1, "Dropped computation should not re-run");
}

#[test]
fn test_watcher_drop_stops_callback() {
    let state = reactive(record! { "foo" => 1 });
    let calls = Rc::new(Cell::new(0));

    {
        let _w = watch(
            cloned!(state => move || state.get("foo")),
            cloned!(calls => move |_, _, _| bump(&calls)),
            WatchOptions::new(),
        );
        state.set("foo", 2);
        assert_eq!(calls.get(), 1);
    }

    state.set("foo", 3);
    assert_eq!(calls.get(), 1, "Dropped watcher should not fire");
}

#[test]
fn test_derived_drop_releases_subscription() {
    let state = reactive(record! { "n" => 1 });

    {
        let d = derive(cloned!(state => move || state.get("n")));
        let _ = d.value();
        assert_eq!(subscriber_count(state.id(), PropKey::from("n")), 1);
    }

    assert_eq!(subscriber_count(state.id(), PropKey::from("n")), 0);
}

#[test]
fn test_registry_entry_expires_with_object() {
    let id;
    {
        let state = reactive(record! { "foo" => 1 });
        id = state.id();
        let _c = run(cloned!(state => move || {
            let _ = state.get("foo");
        }));
        assert!(is_registered(id));
    }

    assert!(!is_registered(id), "Registry entry should go away with its object");
}

#[test]
fn test_wrapper_cache_entries_are_evicted() {
    let before = cached_wrappers();
    {
        let raw = record! { "foo" => 1 };
        let a = reactive(raw.clone());
        let b = reactive(raw.clone());
        let view = readonly(raw);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&view));
        assert_eq!(cached_wrappers(), before + 2);
    }

    assert_eq!(cached_wrappers(), before);
}

#[test]
fn test_dropping_wrapper_keeps_raw_data() {
    let raw = record! { "foo" => 1 };
    {
        let state = reactive(raw.clone());
        state.set("foo", 2);
    }

    // A fresh wrapper over the same data sees the write
    let state = reactive(raw);
    assert_eq!(state.get("foo"), 2);
}

#[test]
fn test_stopped_parent_releases_children() {
    let state = reactive(record! { "inner" => 1 });
    let inner_runs = Rc::new(Cell::new(0));

    let parent = run(cloned!(state, inner_runs => move || {
        let _ = run(cloned!(state, inner_runs => move || {
            bump(&inner_runs);
            let _ = state.get("inner");
        }));
    }));
    assert_eq!(parent.child_count(), 1);

    state.set("inner", 2);
    assert_eq!(inner_runs.get(), 2);

    parent.stop();
    assert_eq!(parent.child_count(), 0);
    state.set("inner", 3);
    assert_eq!(inner_runs.get(), 2, "Child should stop with its parent");
}

#[test]
fn test_dropped_parent_releases_children() {
    let state = reactive(record! { "inner" => 1 });
    let inner_runs = Rc::new(Cell::new(0));

    {
        let _parent = run(cloned!(state, inner_runs => move || {
            let _ = run(cloned!(state, inner_runs => move || {
                bump(&inner_runs);
                let _ = state.get("inner");
            }));
        }));
    }

    state.set("inner", 2);
    assert_eq!(inner_runs.get(), 1);
}

#[test]
fn test_self_referencing_record_can_be_released() {
    let raw = record! { "n" => 1 };
    let id = raw.id();
    {
        let state = reactive(raw.clone());
        state.set("me", raw.clone());
        let _c = run(cloned!(state => move || {
            let _ = state.get("n");
        }));

        // Break the cycle before letting go
        state.delete("me");
    }
    drop(raw);

    assert!(!is_registered(id));
}
