// ============================================================================
// spark-reactive - Ergonomic Macros
// ============================================================================

/// Helper macro to clone variables into a move closure.
///
/// This reduces the boilerplate of manually cloning `Rc` or `Tracked`
/// handles before moving them into a closure.
///
/// # Usage
///
/// ```rust
/// use spark_reactive::{cloned, reactive, record, run};
///
/// let state = reactive(record! { "count" => 1 });
///
/// let _c = run(cloned!(state => move || {
///     let _ = state.get("count");
/// }));
///
/// state.set("count", 2);
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Build a raw record from `key => value` pairs.
///
/// Values go through `Value::from`, so numbers, strings, booleans and nested
/// `record!` / `sequence!` literals can be mixed freely.
///
/// # Usage
///
/// ```rust
/// use spark_reactive::{reactive, record, sequence};
///
/// let state = reactive(record! {
///     "name" => "spark",
///     "tags" => sequence!["a", "b"],
///     "meta" => record! { "stars" => 5 },
/// });
///
/// assert_eq!(state.get("name"), "spark");
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::RawObject::record()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::RawObject::from_entries(::std::vec![
            $( (::std::rc::Rc::<str>::from($key), $crate::Value::from($value)) ),+
        ])
    };
}

/// Build a raw sequence from a list of values.
///
/// # Usage
///
/// ```rust
/// use spark_reactive::{reactive, sequence};
///
/// let items = reactive(sequence![1, "two", 3.5]);
/// assert_eq!(items.len(), 3);
/// ```
#[macro_export]
macro_rules! sequence {
    () => {
        $crate::RawObject::sequence()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::RawObject::from_values(::std::vec![ $( $crate::Value::from($value) ),+ ])
    };
}
