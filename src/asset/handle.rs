use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A typed slot index into an [`AssetCache`](super::AssetCache).
///
/// Handles are assigned at insertion time and double as the identity slots
/// packed into batch sort keys, so state-compatible draws cluster together
/// without any pointer arithmetic.
pub struct Handle<T> {
    index: usize,
    _marker: PhantomData<*const T>,
}

// Implemented by hand so none of these require anything of T; a Handle
// carries only its index.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.index).finish()
    }
}

// The phantom pointer is only a type tag; a Handle carries no data of T.
unsafe impl<T> Send for Handle<T> {}
unsafe impl<T> Sync for Handle<T> {}

impl<T> Handle<T> {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}
