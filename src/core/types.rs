// ============================================================================
// spark-reactive - Type Definitions
// Identities, property keys and the type-erased subscriber trait
// ============================================================================

use std::fmt;
use std::rc::Rc;

use super::constants::*;
use crate::reactivity::tracking::SubscriberSet;

// =============================================================================
// IDENTITIES
// =============================================================================
//
// The registry never owns the objects it tracks. Raw objects and computations
// are addressed by opaque ids handed out by the thread-local context, and
// their entries are removed when the owner drops them.
// =============================================================================

/// Stable identity of a raw object, shared by every wrapper over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable identity of a computation, used to deduplicate subscriber sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputationId(pub(crate) u64);

// =============================================================================
// PROPERTY KEYS
// =============================================================================

/// A key addressing one slot of a record or sequence.
///
/// Records are addressed by `Name`. Sequences are addressed by `Index`, and
/// their length is the first-class `Length` key. Keys are normalized against
/// the target shape on every access, so `"0"` reaches index 0 of a sequence
/// and `"length"` reaches its length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
    Name(Rc<str>),
    Index(usize),
    Length,
}

impl PropKey {
    /// Returns the index if this key addresses a sequence element.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PropKey::Index(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKey::Name(name) => f.write_str(name),
            PropKey::Index(i) => write!(f, "{}", i),
            PropKey::Length => f.write_str("length"),
        }
    }
}

impl From<&str> for PropKey {
    fn from(name: &str) -> Self {
        PropKey::Name(Rc::from(name))
    }
}

impl From<String> for PropKey {
    fn from(name: String) -> Self {
        PropKey::Name(Rc::from(name))
    }
}

impl From<Rc<str>> for PropKey {
    fn from(name: Rc<str>) -> Self {
        PropKey::Name(name)
    }
}

impl From<usize> for PropKey {
    fn from(index: usize) -> Self {
        PropKey::Index(index)
    }
}

impl From<&PropKey> for PropKey {
    fn from(key: &PropKey) -> Self {
        key.clone()
    }
}

/// A registry slot: either a concrete property or the "all keys" sentinel
/// used by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    Prop(PropKey),
    Iterate,
}

impl From<PropKey> for TrackKey {
    fn from(key: PropKey) -> Self {
        TrackKey::Prop(key)
    }
}

/// Kind of mutation reported to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    /// A key that did not exist was written
    Add,
    /// An existing key was overwritten
    Set,
    /// An existing key was removed
    Delete,
}

impl Change {
    /// Structural changes alter the key set and reach enumeration subscribers.
    pub fn is_structural(self) -> bool {
        matches!(self, Change::Add | Change::Delete)
    }
}

// =============================================================================
// TYPE-ERASED SUBSCRIBER
// =============================================================================

/// Type-erased computation interface used by the registry.
///
/// Subscriber sets hold `Weak<dyn AnySubscriber>` so the registry never keeps
/// a computation alive; computations hold their sets strongly so they can
/// detach themselves before every run.
pub trait AnySubscriber {
    /// Identity used for deduplication and self-exclusion
    fn id(&self) -> ComputationId;

    /// Flags bitmask (kind + lifecycle)
    fn flags(&self) -> u32;

    /// Record that this computation now belongs to `set`
    fn add_dep(&self, set: Rc<SubscriberSet>);

    /// Number of subscriber sets this computation belongs to
    fn dep_count(&self) -> usize;

    /// Visit every subscriber set this computation belongs to
    fn for_each_dep(&self, f: &mut dyn FnMut(&Rc<SubscriberSet>));

    /// Take ownership of a computation created during this one's run
    fn adopt(&self, child: Rc<dyn AnySubscriber>);

    /// Detach permanently from every subscriber set
    fn stop(&self);

    /// React to a notification: call the scheduler, or run directly
    fn dispatch(self: Rc<Self>);

    fn is_derived(&self) -> bool {
        self.flags() & DERIVED != 0
    }

    fn is_stopped(&self) -> bool {
        self.flags() & STOPPED != 0
    }
}

// =============================================================================
// TESTS
// =============================================================================
