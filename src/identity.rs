//! Stable slot assignment for churning process identifiers.
//!
//! Passenger recycles worker processes all the time, so pids make terrible
//! label values: every restart opens a new series and orphans the old one.
//! Instead each live pid is mapped to a slot in `[0, capacity)`. A surviving
//! pid keeps its slot; a replacement process inherits the lowest slot freed
//! by a process that went away. Passenger lists processes ascending by pid,
//! so new pids fill free slots in that order.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use tracing::warn;

/// Mapping from pid to slot, replaced wholesale on every successful poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    slots: HashMap<String, usize>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot assigned to `pid`, if any.
    pub fn get(&self, pid: &str) -> Option<usize> {
        self.slots.get(pid).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.slots.iter().map(|(pid, slot)| (pid.as_str(), *slot))
    }

    /// Number of entries sitting outside `[0, capacity)`.
    pub fn overflow_count(&self, capacity: usize) -> usize {
        self.slots.values().filter(|&&slot| slot >= capacity).count()
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for IdentityMap {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().map(|(pid, slot)| (pid.into(), slot)).collect(),
        }
    }
}

/// Computes the slot assignment for the current process list.
///
/// At most `capacity` pids are considered; the rest are dropped for this
/// cycle. Retained pids keep their previous slot; new pids fill the empty
/// slots in ascending order. A retained pid whose old slot is out of range or
/// already taken is handled like a new pid, and a pid listed twice is only
/// assigned once.
///
/// Calling `update` again with its own output and the same pids returns an
/// identical map.
pub fn update<'a, I>(previous: &IdentityMap, pids: I, capacity: usize) -> IdentityMap
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut taken: HashSet<usize> = HashSet::new();
    let mut missing: Vec<&str> = Vec::new();
    let mut updated = IdentityMap::new();

    for pid in pids.into_iter().take(capacity) {
        if !seen.insert(pid) {
            continue;
        }
        match previous.get(pid) {
            Some(slot) if slot < capacity && taken.insert(slot) => {
                updated.slots.insert(pid.to_string(), slot);
            }
            _ => missing.push(pid),
        }
    }

    // `capacity` comes from the status document; never materialise it.
    let mut free = (0..capacity).filter(|slot| !taken.contains(slot));
    let mut next_overflow = capacity;

    for pid in missing {
        let slot = match free.next() {
            Some(slot) => slot,
            // Unreachable while every retained slot is unique and below capacity.
            None => {
                warn!(
                    "No free slot for pid {} within capacity {}, assigning overflow slot {}",
                    pid, capacity, next_overflow
                );
                next_overflow += 1;
                next_overflow - 1
            }
        };
        updated.slots.insert(pid.to_string(), slot);
    }

    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_len() {
        let map: IdentityMap = [("100", 0), ("200", 1)].into_iter().collect();
        assert_eq!(map.get("100"), Some(0));
        assert_eq!(map.get("300"), None);
        assert_eq!(map.len(), 2);
        assert!(!map.is_empty());
    }

    #[test]
    fn test_overflow_count() {
        let map: IdentityMap = [("a", 0), ("b", 3), ("c", 4)].into_iter().collect();
        assert_eq!(map.overflow_count(3), 2);
        assert_eq!(map.overflow_count(5), 0);
    }

    #[test]
    fn test_zero_capacity_yields_empty_map() {
        let previous: IdentityMap = [("a", 0)].into_iter().collect();
        let updated = update(&previous, ["a", "b"], 0);
        assert!(updated.is_empty());
    }

    #[test]
    fn test_duplicate_pid_assigned_once() {
        let updated = update(&IdentityMap::new(), ["a", "a", "b"], 3);
        let expected: IdentityMap = [("a", 0), ("b", 1)].into_iter().collect();
        assert_eq!(updated, expected);
    }
}
