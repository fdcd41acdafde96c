// Copyright 2025 cacheline Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fuzzy test for the concurrent cache.

use std::{sync::Arc, thread};

use cacheline::{ConcurrentCache, Error, Line, Lru, SimpleLine};
use rand::{rngs::SmallRng, Rng, SeedableRng};

const CAPACITY: usize = 8;
const POOL: u64 = 64;

const WORKERS: usize = 8;
const ROUNDS: usize = 2000;

const INTERVAL: usize = 500;

#[test_log::test]
fn test_fuzzy_concurrent_workload() {
    let cache: Arc<ConcurrentCache<SimpleLine, Lru>> = Arc::new(ConcurrentCache::new(CAPACITY, Lru::default()));
    let pool: Vec<_> = (0..POOL).map(|id| Arc::new(SimpleLine::new(id))).collect();

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let cache = cache.clone();
            let pool = pool.clone();
            thread::spawn(move || workload(worker as u64, cache, pool))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Residency invariants after the dust settles.
    assert!(cache.len() <= CAPACITY);
    let snapshot = cache.metrics().snapshot();
    assert_eq!(snapshot.release, snapshot.hit + snapshot.insert);
    assert!(snapshot.miss >= snapshot.insert);

    cache.clear().unwrap();
    assert!(cache.is_empty());

    // Nothing was corrupted along the way: every line still verifies against the digest
    // stored by its final unload.
    for line in &pool {
        line.load().unwrap();
    }
}

fn workload(worker: u64, cache: Arc<ConcurrentCache<SimpleLine, Lru>>, pool: Vec<Arc<SimpleLine>>) {
    let mut rng = SmallRng::seed_from_u64(worker);

    for round in 0..ROUNDS {
        let line = &pool[rng.random_range(0..pool.len())];
        match cache.acquire(line) {
            Ok(()) => {
                if rng.random_bool(0.5) {
                    line.data().push(round as u8);
                }
                cache.release(line).unwrap();

                if rng.random_bool(0.1) {
                    match cache.remove(line) {
                        // Another worker may hold it or have evicted it already.
                        Ok(()) | Err(Error::NotFound { .. }) | Err(Error::InvalidOperation { .. }) => {}
                        Err(e) => panic!("unexpected remove failure: {e}"),
                    }
                }
            }
            Err(Error::CapacityExhausted { .. }) => {}
            Err(e) => panic!("unexpected acquire failure: {e}"),
        }

        assert!(cache.len() <= CAPACITY);

        if round % INTERVAL == 0 {
            tracing::info!("[fuzzy]: worker {worker} finished {round} rounds");
        }
    }
}
