//! Property tests over arbitrary registration sequences.

use lastcall::prelude::*;
use lastcall_test_utils::{CallLog, RecordingFallback};
use proptest::prelude::*;

proptest! {
    #[test]
    fn snapshots_survive_mutation(values in proptest::collection::vec(any::<i64>(), 1..24)) {
        let log = CallLog::new();
        {
            let heap = HeapFallback::new();
            let mut arena = ScopeArena::new(ScopeConfig::new(128)).unwrap();
            let mut scope = DeferScope::new(&mut arena, Some(&heap));
            for &v in &values {
                let mut current = v;
                defer!(scope, [current] => { log.record(current.to_string()); }).unwrap();
                current = current.wrapping_add(1);
                prop_assert_ne!(current, v);
            }
        }
        let expected: Vec<String> = values.iter().rev().map(|v| v.to_string()).collect();
        prop_assert_eq!(log.entries(), expected);
    }

    #[test]
    fn overflow_records_released_exactly_once_in_lifo(
        capacity_records in 0usize..6,
        n in 1usize..20,
    ) {
        let log = CallLog::new();
        let fallback = RecordingFallback::with_log(log.clone());
        {
            let mut arena = ScopeArena::new(ScopeConfig::new(capacity_records * 16)).unwrap();
            let mut scope = DeferScope::new(&mut arena, Some(&fallback));
            for i in 0..n {
                let handle = scope.defer(|| log.record("run")).unwrap();
                let expected = if i < capacity_records {
                    RecordSource::Arena
                } else {
                    RecordSource::Fallback
                };
                prop_assert_eq!(handle.source(), expected);
            }
        }
        let spilled = n.saturating_sub(capacity_records) as u64;
        let released: Vec<u64> = (0..spilled).rev().collect();
        prop_assert_eq!(fallback.released_ids(), released);
        prop_assert_eq!(fallback.outstanding(), 0);
        let runs = log.entries().iter().filter(|e| e.as_str() == "run").count();
        prop_assert_eq!(runs, n);
    }

    #[test]
    fn recoverable_scope_runs_only_accepted_actions(
        capacity_records in 0usize..8,
        n in 0usize..20,
    ) {
        let log = CallLog::new();
        let mut accepted = 0usize;
        {
            let config = ScopeConfig::new(capacity_records * 16).recoverable();
            let mut arena = ScopeArena::new(config).unwrap();
            let mut scope = DeferScope::new(&mut arena, None);
            for i in 0..n {
                if scope.defer_with(i, |i| log.record(i.to_string())).is_ok() {
                    accepted += 1;
                }
            }
        }
        prop_assert_eq!(accepted, n.min(capacity_records * 16 / 24));
        prop_assert_eq!(log.len(), accepted);
    }
}
