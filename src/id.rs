//! Record id generation
//!
//! Ids are lexicographically sortable and time-ordered: sorting ids sorts
//! records by creation. The engine holds one generator per instance and
//! may call it from many threads at once.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use ulid::Generator;

/// Source of new record ids
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> String;
}

/// Monotonic ULIDs. Ids generated within the same millisecond increment
/// the random part, so creation order is preserved.
pub struct UlidGenerator {
    inner: Mutex<Generator>,
}

impl UlidGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }
}

impl Default for UlidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UlidGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UlidGenerator").finish_non_exhaustive()
    }
}

impl IdGenerator for UlidGenerator {
    fn new_id(&self) -> String {
        // the generator state is always valid, so a poisoned lock is reusable
        let mut generator = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        loop {
            match generator.generate() {
                Ok(ulid) => return ulid.to_string(),
                // random part exhausted for this millisecond
                Err(_) => std::thread::yield_now(),
            }
        }
    }
}

/// Zero-padded counter ids (`00000000000000000001`, ...). Deterministic,
/// for tests and fixtures.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn new_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{:020}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_ulid_monotonic() {
        let g = UlidGenerator::new();
        let ids: Vec<String> = (0..1000).map(|_| g.new_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
        assert_eq!(ids[0].len(), 26);
    }

    #[test]
    fn test_sequential_sorts_lexicographically() {
        let g = SequentialIdGenerator::new();
        let a = g.new_id();
        let b = g.new_id();
        assert_eq!(a, "00000000000000000001");
        assert!(a < b);
    }

    #[test]
    fn test_concurrent_ids_unique() {
        let g = Arc::new(UlidGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let g = Arc::clone(&g);
                thread::spawn(move || (0..200).map(|_| g.new_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(all.len(), 1600);
    }
}
