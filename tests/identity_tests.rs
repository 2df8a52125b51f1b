//! Integration tests for stable slot assignment.
//!
//! These tests walk the assignment through realistic process churn and check
//! that slots stay bounded, stable and dense.

use passenger_exporter::identity::{update, IdentityMap};

fn map(entries: &[(&str, usize)]) -> IdentityMap {
    entries.iter().map(|&(pid, slot)| (pid, slot)).collect()
}

#[test]
fn test_first_poll_assigns_slots_in_order() {
    let updated = update(&IdentityMap::new(), ["abc", "cdf", "dfe"], 3);
    assert_eq!(updated, map(&[("abc", 0), ("cdf", 1), ("dfe", 2)]));
}

#[test]
fn test_replacements_take_freed_slots_first() {
    let previous = map(&[("abc", 0), ("cdf", 1), ("dfe", 2), ("efg", 3)]);
    let updated = update(&previous, ["abc", "dfe", "newPID", "newPID2"], 6);
    assert_eq!(
        updated,
        map(&[("abc", 0), ("dfe", 2), ("newPID", 1), ("newPID2", 3)])
    );
}

#[test]
fn test_excess_processes_are_dropped_then_admitted() {
    let previous = map(&[("abc", 0), ("def", 1), ("hij", 2)]);

    let updated = update(&previous, ["abc", "def", "hij", "klm"], 3);
    assert_eq!(updated, previous);

    let updated = update(&updated, ["abc", "def", "klm"], 3);
    assert_eq!(updated, map(&[("abc", 0), ("def", 1), ("klm", 2)]));
}

#[test]
fn test_update_is_idempotent() {
    let pids = ["10", "11", "12", "13"];
    let first = update(&IdentityMap::new(), pids, 8);
    let second = update(&first, pids, 8);
    assert_eq!(first, second);
}

#[test]
fn test_cardinality_is_bounded_by_capacity() {
    let pids: Vec<String> = (100..120).map(|p| p.to_string()).collect();
    let pid_refs = pids.iter().map(String::as_str);

    for capacity in [0usize, 1, 5, 20, 50] {
        let updated = update(&IdentityMap::new(), pid_refs.clone(), capacity);
        assert_eq!(updated.len(), pids.len().min(capacity));
        assert!(updated.iter().all(|(_, slot)| slot < capacity));
        assert_eq!(updated.overflow_count(capacity), 0);
    }
}

#[test]
fn test_slots_are_unique() {
    let previous = map(&[("a", 0), ("b", 2)]);
    let updated = update(&previous, ["x", "a", "y", "b", "z"], 5);

    let mut slots: Vec<usize> = updated.iter().map(|(_, slot)| slot).collect();
    slots.sort_unstable();
    assert_eq!(slots, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_surviving_processes_keep_their_slot_across_churn() {
    let mut current = update(&IdentityMap::new(), ["1", "2", "3", "4"], 4);
    let survivor_slot = current.get("3");

    for round in 0..10 {
        let a = format!("n{}a", round);
        let b = format!("n{}b", round);
        current = update(&current, ["3", a.as_str(), b.as_str()], 4);
        assert_eq!(current.get("3"), survivor_slot);
        assert_eq!(current.len(), 3);
    }
}

#[test]
fn test_corrupted_previous_slots_are_reassigned() {
    // Out of range and duplicate slots in the previous map.
    let previous = map(&[("a", 7), ("b", 1), ("c", 1)]);
    let updated = update(&previous, ["a", "b", "c"], 3);

    assert_eq!(updated.get("b"), Some(1));
    assert_eq!(updated.len(), 3);
    assert_eq!(updated.overflow_count(3), 0);

    let mut slots: Vec<usize> = updated.iter().map(|(_, slot)| slot).collect();
    slots.sort_unstable();
    assert_eq!(slots, vec![0, 1, 2]);
}

#[test]
fn test_huge_capacity_does_not_allocate_slots() {
    let updated = update(&IdentityMap::new(), ["a", "b"], usize::MAX);
    assert_eq!(updated, map(&[("a", 0), ("b", 1)]));
}
