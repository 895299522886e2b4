use super::Handle;

/// Slot arena for pooled render resources.
///
/// Every insert assigns the next free slot and returns a typed [`Handle`].
/// Slots freed by [`remove`](Self::remove) are recycled through a free list,
/// so handle indices stay small and dense enough to pack into sort keys.
pub struct AssetCache<T> {
    items: Vec<Option<T>>,
    free: Vec<usize>,
}

impl<T> AssetCache<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, item: T) -> Handle<T> {
        if let Some(index) = self.free.pop() {
            self.items[index] = Some(item);
            Handle::new(index)
        } else {
            let index = self.items.len();
            self.items.push(Some(item));
            Handle::new(index)
        }
    }

    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.items.get_mut(handle.index())?;
        let item = slot.take();
        if item.is_some() {
            self.free.push(handle.index());
        }
        item
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.items.get_mut(handle.index()).and_then(Option::as_mut)
    }

    pub fn len(&self) -> usize {
        self.items.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_assigns_sequential_slots() {
        let mut cache = AssetCache::new();
        let a = cache.insert("a");
        let b = cache.insert("b");
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(cache.get(a), Some(&"a"));
        assert_eq!(cache.get(b), Some(&"b"));
    }

    #[test]
    fn removed_slots_are_recycled() {
        let mut cache = AssetCache::new();
        let a = cache.insert(1);
        let _b = cache.insert(2);
        assert_eq!(cache.remove(a), Some(1));
        assert!(cache.get(a).is_none());

        let c = cache.insert(3);
        assert_eq!(c.index(), a.index());
        assert_eq!(cache.len(), 2);
    }
}
