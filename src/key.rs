//! Identity for cells: the [`Key`] trait and the handful of concrete key
//! kinds cells are constructed with.
//!
//! Two cells holding a [`Key`] that compare equal are, for the purposes of
//! the state registry, the *same* cell: looking either one up returns the
//! same backing state (see [`crate::registry`]). `UniqueKey` never compares
//! equal to any other key instance, which is how mutable cells and other
//! cells with no natural value identity avoid being accidentally shared.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a cell within the state registry.
///
/// Implementors must be consistent: `a.key_eq(b) == b.key_eq(a)`, and equal
/// keys must produce equal hashes.
pub trait Key: fmt::Debug {
    fn key_eq(&self, other: &dyn Key) -> bool;
    fn key_hash(&self, state: &mut dyn Hasher);
    fn as_any(&self) -> &dyn Any;

    /// Unique keys are never looked up or shared by the registry; every
    /// cell holding one gets its own independent state.
    fn is_unique(&self) -> bool {
        false
    }
}

/// A cheaply-cloneable handle to a [`Key`], suitable for use as a hash map
/// key (see the `Eq`/`Hash` impls below, which defer to [`Key::key_eq`] /
/// [`Key::key_hash`]).
#[derive(Clone)]
pub struct KeyRef(Rc<dyn Key>);

impl KeyRef {
    pub fn new<K: Key + 'static>(key: K) -> Self {
        KeyRef(Rc::new(key))
    }

    pub fn from_rc(key: Rc<dyn Key>) -> Self {
        KeyRef(key)
    }

    pub fn is_unique(&self) -> bool {
        self.0.is_unique()
    }

    pub fn downcast_ref<K: Key + 'static>(&self) -> Option<&K> {
        self.0.as_any().downcast_ref::<K>()
    }
}

impl fmt::Debug for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl PartialEq for KeyRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.key_eq(other.0.as_ref())
    }
}

impl Eq for KeyRef {}

impl Hash for KeyRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key_hash(state);
    }
}

/// A key with no natural value: every instance is distinct from every
/// other, identified only by an internally assigned id. Used by mutable
/// cells, watchers, and anything else that has no meaningful notion of
/// "the same cell" beyond object identity.
pub struct UniqueKey(u64);

impl UniqueKey {
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        UniqueKey(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for UniqueKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniqueKey({})", self.0)
    }
}

impl Key for UniqueKey {
    fn key_eq(&self, other: &dyn Key) -> bool {
        other
            .as_any()
            .downcast_ref::<UniqueKey>()
            .is_some_and(|o| o.0 == self.0)
    }

    fn key_hash(&self, mut state: &mut dyn Hasher) {
        self.0.hash(&mut state);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_unique(&self) -> bool {
        true
    }
}

/// A key identifying a cell by a single wrapped value: two `ValueKey<T>`s
/// with equal `T`s are the same cell. Mirrors a constant cell's key, whose
/// identity is entirely determined by the constant it holds.
pub struct ValueKey<T>(pub T);

impl<T: fmt::Debug> fmt::Debug for ValueKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueKey({:?})", self.0)
    }
}

impl<T: Eq + Hash + fmt::Debug + 'static> Key for ValueKey<T> {
    fn key_eq(&self, other: &dyn Key) -> bool {
        other
            .as_any()
            .downcast_ref::<ValueKey<T>>()
            .is_some_and(|o| o.0 == self.0)
    }

    fn key_hash(&self, mut state: &mut dyn Hasher) {
        // Salt with the type so `ValueKey<u32>(0)` and `ValueKey<i64>(0)`
        // don't collide just because their hashes happen to match.
        std::any::TypeId::of::<T>().hash(&mut state);
        self.0.hash(&mut state);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A key identifying a cell by a pair of wrapped values (e.g. a binary
/// computed cell's fixed argument pair). Rust has no variadic generics, so
/// arities are enumerated explicitly up to 4 — which covers every
/// `computed1..4` helper.
pub struct ValueKey2<A, B>(pub A, pub B);

impl<A: fmt::Debug, B: fmt::Debug> fmt::Debug for ValueKey2<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueKey2({:?}, {:?})", self.0, self.1)
    }
}

impl<A, B> Key for ValueKey2<A, B>
where
    A: Eq + Hash + fmt::Debug + 'static,
    B: Eq + Hash + fmt::Debug + 'static,
{
    fn key_eq(&self, other: &dyn Key) -> bool {
        other
            .as_any()
            .downcast_ref::<ValueKey2<A, B>>()
            .is_some_and(|o| o.0 == self.0 && o.1 == self.1)
    }

    fn key_hash(&self, mut state: &mut dyn Hasher) {
        self.0.hash(&mut state);
        self.1.hash(&mut state);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_keys_never_compare_equal() {
        let a = KeyRef::new(UniqueKey::new());
        let b = KeyRef::new(UniqueKey::new());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn value_keys_compare_by_value() {
        let a = KeyRef::new(ValueKey(5_i32));
        let b = KeyRef::new(ValueKey(5_i32));
        let c = KeyRef::new(ValueKey(6_i32));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
