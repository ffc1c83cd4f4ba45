use spark_reactive::{
    batch, cloned, derive, observe, reactive, record, run, sequence, tick, watch, FlushTiming,
    Value, WatchOptions, WatchSource,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn num(value: &Value) -> f64 {
    value.as_number().unwrap_or(f64::NAN)
}

// =============================================================================
// DERIVED
// =============================================================================

#[test]
fn test_derived_is_lazy_and_cached() {
    let state = reactive(record! { "foo" => 1, "bar" => 2 });
    let runs = Rc::new(Cell::new(0));

    let sum = derive(cloned!(state, runs => move || {
        runs.set(runs.get() + 1);
        num(&state.get("foo")) + num(&state.get("bar"))
    }));
    assert_eq!(runs.get(), 0);

    assert_eq!(sum.value(), 3.0);
    assert_eq!(sum.value(), 3.0);
    assert_eq!(runs.get(), 1);

    state.set("foo", 2);
    assert_eq!(runs.get(), 1);
    assert_eq!(sum.value(), 4.0);
    assert_eq!(runs.get(), 2);
}

#[test]
fn test_computation_reading_derived_reruns() {
    let state = reactive(record! { "foo" => 1, "bar" => 2 });
    let sum = derive(cloned!(state => move || num(&state.get("foo")) + num(&state.get("bar"))));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let _c = run(cloned!(sum, seen => move || seen.borrow_mut().push(sum.value())));

    state.set("bar", 5);
    assert_eq!(*seen.borrow(), vec![3.0, 6.0]);
}

#[test]
fn test_derived_over_sequence() {
    let items = reactive(sequence![1, 2]);
    let total = derive(cloned!(items => move || items.values().iter().map(num).sum::<f64>()));

    assert_eq!(total.value(), 3.0);
    items.push(3);
    assert_eq!(total.value(), 6.0);
    items.pop();
    items.pop();
    assert_eq!(total.value(), 1.0);
}

// =============================================================================
// WATCH
// =============================================================================

#[test]
fn test_watch_object_source() {
    let state = reactive(record! { "foo" => 1 });
    let calls = Rc::new(Cell::new(0));

    let _w = observe(
        &state,
        cloned!(calls => move |_: &Value, _, _| calls.set(calls.get() + 1)),
        WatchOptions::new(),
    );

    state.set("foo", 2);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_watch_getter_source() {
    let state = reactive(record! { "foo" => 1, "bar" => 1 });
    let calls = Rc::new(Cell::new(0));

    let _w = observe(
        WatchSource::getter(cloned!(state => move || state.get("foo"))),
        cloned!(calls => move |_, _, _| calls.set(calls.get() + 1)),
        WatchOptions::new(),
    );

    state.set("bar", 2);
    assert_eq!(calls.get(), 0);
    state.set("foo", 2);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_watch_old_and_new_values() {
    let state = reactive(record! { "foo" => 1 });
    let pairs = Rc::new(RefCell::new(Vec::new()));

    let _w = watch(
        cloned!(state => move || state.get("foo")),
        cloned!(pairs => move |new: &Value, old: Option<&Value>, _| {
            pairs.borrow_mut().push((new.clone(), old.cloned()));
        }),
        WatchOptions::new(),
    );

    state.set("foo", 2);
    assert_eq!(*pairs.borrow(), vec![(Value::from(2), Some(Value::from(1)))]);
}

#[test]
fn test_watch_immediate() {
    let state = reactive(record! { "foo" => 1 });
    let pairs = Rc::new(RefCell::new(Vec::new()));

    let _w = watch(
        cloned!(state => move || num(&state.get("foo"))),
        cloned!(pairs => move |new, old, _| pairs.borrow_mut().push((*new, old.copied()))),
        WatchOptions::new().immediate(true),
    );

    assert_eq!(*pairs.borrow(), vec![(1.0, None)]);
    state.set("foo", 2);
    assert_eq!(*pairs.borrow(), vec![(1.0, None), (2.0, Some(1.0))]);
}

#[test]
fn test_watch_post_flush() {
    let state = reactive(record! { "foo" => 1 });
    let calls = Rc::new(Cell::new(0));

    let _w = watch(
        cloned!(state => move || state.get("foo")),
        cloned!(calls => move |_, _, _| calls.set(calls.get() + 1)),
        WatchOptions::new().flush(FlushTiming::Post),
    );

    state.set("foo", 2);
    assert_eq!(calls.get(), 0);
    tick();
    assert_eq!(calls.get(), 1);

    batch(|| {
        state.set("foo", 3);
        state.set("foo", 4);
        assert_eq!(calls.get(), 1);
    });
    assert_eq!(calls.get(), 2);
}

/// The classic stale-response race: the first callback's result arrives after
/// the second one started, and must be discarded.
#[test]
fn test_watch_invalidation_discards_stale_results() {
    let state = reactive(record! { "query" => "a" });
    let pending: Rc<RefCell<Vec<(String, Rc<Cell<bool>>)>>> = Rc::new(RefCell::new(Vec::new()));
    let applied = Rc::new(RefCell::new(Vec::new()));

    let _w = watch(
        cloned!(state => move || state.get("query").to_string()),
        cloned!(pending => move |query: &String, _, on_invalidate| {
            let expired = Rc::new(Cell::new(false));
            on_invalidate.register(cloned!(expired => move || expired.set(true)));
            pending.borrow_mut().push((query.clone(), expired));
        }),
        WatchOptions::new(),
    );

    state.set("query", "b");
    state.set("query", "c");

    // Responses resolve in order; only the latest is still valid
    for (query, expired) in pending.borrow().iter() {
        if !expired.get() {
            applied.borrow_mut().push(query.clone());
        }
    }
    assert_eq!(*applied.borrow(), vec!["c".to_string()]);
}

#[test]
fn test_watch_stop() {
    let state = reactive(record! { "foo" => 1 });
    let calls = Rc::new(Cell::new(0));

    let w = watch(
        cloned!(state => move || state.get("foo")),
        cloned!(calls => move |_, _, _| calls.set(calls.get() + 1)),
        WatchOptions::new(),
    );

    state.set("foo", 2);
    w.stop();
    state.set("foo", 3);
    assert_eq!(calls.get(), 1);
    assert_eq!(w.last_value(), Some(Value::from(2)));
}
