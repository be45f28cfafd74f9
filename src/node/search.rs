use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Bounded set of flood-fill search ids already handled by this node.
/// When full, the oldest id is forgotten first.
pub struct SearchCache {
    capacity: usize,
    inner: Mutex<(VecDeque<String>, HashSet<String>)>,
}

impl SearchCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new((VecDeque::new(), HashSet::new())),
        }
    }

    /// Record `id`; false if it was already present.
    pub fn insert(&self, id: &str) -> bool {
        let mut guard = self.inner.lock().expect("mutex poisoned");
        let (order, seen) = &mut *guard;
        if !seen.insert(id.to_string()) {
            return false;
        }
        order.push_back(id.to_string());
        while order.len() > self.capacity {
            if let Some(old) = order.pop_front() {
                seen.remove(&old);
            }
        }
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().expect("mutex poisoned").1.contains(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("mutex poisoned").0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::SearchCache;

    #[test]
    fn first_seen_wins_and_oldest_is_evicted() {
        let cache = SearchCache::new(2);
        assert!(cache.insert("a"));
        assert!(!cache.insert("a"));
        assert!(cache.insert("b"));
        assert!(cache.insert("c"));
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("a"));
        assert!(cache.contains("c"));
    }
}
