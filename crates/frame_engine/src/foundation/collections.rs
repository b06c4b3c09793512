//! Specialized collection types

use slotmap::new_key_type;
use std::fmt;
use std::marker::PhantomData;

pub use slotmap::SlotMap;

new_key_type! {
    /// Generation-stamped key for registered GPU resources
    pub struct ResourceKey;
}

/// Typed handle for type-safe resource references
///
/// The key carries the slot generation, so a handle kept after its resource
/// was reclaimed never resolves to whatever later reuses the slot.
pub struct Handle<T> {
    key: ResourceKey,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Create a new typed handle from a key
    pub(crate) const fn new(key: ResourceKey) -> Self {
        Self {
            key,
            _phantom: PhantomData,
        }
    }

    /// Get the underlying key
    pub const fn key(&self) -> ResourceKey {
        self.key
    }
}

// Manual impls: derives would put bounds on `T`.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle<{}>({:?})", std::any::type_name::<T>(), self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_handle_does_not_alias_reused_slot() {
        let mut map: SlotMap<ResourceKey, u32> = SlotMap::with_key();
        let first = Handle::<u32>::new(map.insert(1));
        map.remove(first.key());
        let second = Handle::<u32>::new(map.insert(2));

        assert_ne!(first, second);
        assert!(map.get(first.key()).is_none());
        assert_eq!(map.get(second.key()), Some(&2));
    }
}
