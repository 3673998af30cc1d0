//! Property-based tests for the TTL cache using proptest

use proptest::prelude::*;
use rust_resource_system::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn cache(capacity: usize) -> (TtlCache<String, i64>, MockClock) {
    let clock = MockClock::new();
    let cache = TtlCache::with_clock(
        CacheConfig::new().with_capacity(capacity),
        Arc::new(clock.clone()),
    );
    (cache, clock)
}

proptest! {
    /// A put is immediately visible to the same caller
    #[test]
    fn test_read_your_write(key in "[a-z]{1,12}", value in any::<i64>(), ttl_ms in 1u64..1_000_000) {
        let (cache, _) = cache(8);

        cache.put(key.clone(), value, Duration::from_millis(ttl_ms)).unwrap();
        prop_assert_eq!(cache.get(&key), Some(value));
    }

    /// Once the TTL has elapsed the value is gone, swept or not
    #[test]
    fn test_expired_values_are_absent(
        key in "[a-z]{1,12}",
        ttl_ms in 1u64..10_000,
        extra_ms in 0u64..10_000,
        sweep in any::<bool>(),
    ) {
        let (cache, clock) = cache(8);

        cache.put(key.clone(), 1, Duration::from_millis(ttl_ms)).unwrap();
        clock.advance(Duration::from_millis(ttl_ms + extra_ms));
        if sweep {
            prop_assert_eq!(cache.sweep(), 1);
        }
        prop_assert_eq!(cache.get(&key), None);
    }

    /// Size never exceeds capacity and rejected puts leave stored values alone
    #[test]
    fn test_capacity_is_never_exceeded(
        capacity in 1usize..16,
        keys in prop::collection::vec("[a-e]{1,2}", 1..64),
    ) {
        let (cache, _) = cache(capacity);
        let mut stored = HashSet::new();

        for (i, key) in keys.into_iter().enumerate() {
            let result = cache.put(key.clone(), i as i64, Duration::from_secs(60));
            if stored.contains(&key) || stored.len() < capacity {
                prop_assert!(result.is_ok());
                stored.insert(key.clone());
                prop_assert_eq!(cache.get(&key), Some(i as i64));
            } else {
                prop_assert_eq!(result, Err(CacheError::CapacityExceeded { capacity }));
                prop_assert_eq!(cache.get(&key), None);
            }
            prop_assert!(cache.size() <= capacity);
        }

        prop_assert_eq!(cache.size(), stored.len());
    }

    /// Flush hides every key stored before it
    #[test]
    fn test_flush_clears_everything(keys in prop::collection::hash_set("[a-z]{1,8}", 0..32)) {
        let (cache, _) = cache(64);

        for key in &keys {
            cache.put(key.clone(), 7, Duration::from_secs(60)).unwrap();
        }
        cache.flush();

        prop_assert_eq!(cache.size(), 0);
        for key in &keys {
            prop_assert_eq!(cache.get(key), None);
        }
    }

    /// A sweep removes exactly the expired entries
    #[test]
    fn test_sweep_removes_exactly_expired(
        ttls in prop::collection::vec(1u64..100, 1..32),
        now in 0u64..120,
    ) {
        let (cache, clock) = cache(64);

        for (i, ttl) in ttls.iter().enumerate() {
            cache.put(format!("k{}", i), i as i64, Duration::from_secs(*ttl)).unwrap();
        }
        clock.advance(Duration::from_secs(now));

        let expected = ttls.iter().filter(|ttl| **ttl <= now).count();
        prop_assert_eq!(cache.sweep(), expected);
        prop_assert_eq!(cache.size(), ttls.len() - expected);

        for (i, ttl) in ttls.iter().enumerate() {
            let live = cache.get(format!("k{}", i).as_str()).is_some();
            prop_assert_eq!(live, *ttl > now);
        }
    }
}
