use std::sync::Arc;

use parking_lot::RwLock;

/// Unit of atomic swap: one database's current handle behind its own lock.
///
/// Readers clone the `Arc` under the shared lock and keep using it after a
/// swap. The handle only changes inside [`swap`](Self::swap) and
/// [`take`](Self::take), each a single pointer move under the exclusive lock.
pub struct DatabaseSlot<D> {
    handle: RwLock<Option<Arc<D>>>,
}

impl<D> Default for DatabaseSlot<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> DatabaseSlot<D> {
    pub fn new() -> Self {
        Self {
            handle: RwLock::new(None),
        }
    }

    pub fn read(&self) -> Option<Arc<D>> {
        self.handle.read().clone()
    }

    /// Installs `new` and hands back the previous handle for the caller to close
    /// once the lock is released.
    pub fn swap(&self, new: Arc<D>) -> Option<Arc<D>> {
        let mut guard = self.handle.write();
        guard.replace(new)
    }

    pub fn take(&self) -> Option<Arc<D>> {
        self.handle.write().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_returns_previous_handle() {
        let slot = DatabaseSlot::new();
        assert!(slot.read().is_none());
        assert!(slot.swap(Arc::new(1u32)).is_none());

        let old = slot.swap(Arc::new(2u32));
        assert_eq!(old.as_deref(), Some(&1));
        assert_eq!(slot.read().as_deref(), Some(&2));
    }

    #[test]
    fn test_reader_keeps_handle_across_swap() {
        let slot = DatabaseSlot::new();
        slot.swap(Arc::new(String::from("build-1")));

        let held = slot.read().unwrap();
        let old = slot.swap(Arc::new(String::from("build-2"))).unwrap();
        drop(old);

        assert_eq!(held.as_str(), "build-1");
        assert_eq!(slot.read().unwrap().as_str(), "build-2");
    }

    #[test]
    fn test_take_empties_slot() {
        let slot = DatabaseSlot::new();
        slot.swap(Arc::new(7u8));
        assert_eq!(slot.take().as_deref(), Some(&7));
        assert!(slot.read().is_none());
        assert!(slot.take().is_none());
    }
}
