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

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{atomic::Ordering, Arc},
};

use itertools::Itertools;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{
    cache::{select_victim, Cache, Slot},
    error::{Error, Result},
    heuristic::Heuristic,
    line::{Line, LineId},
    metrics::Metrics,
};

struct Inner<L, H>
where
    L: Line,
    H: Heuristic,
{
    slots: BTreeMap<LineId, Slot<L>>,
    /// Identifiers of just-evicted lines whose unload is still running. Such an identifier
    /// cannot be re-admitted until it settles.
    draining: BTreeSet<LineId>,
    heuristic: H,
    stamp: u64,
}

/// Thread-safe implementation of the cache contract.
///
/// Observably equivalent to [`crate::SerialCache`] under any serialization of its operations.
/// A single mutex guards the store, held counts and heuristic state; line `load`/`unload` side
/// effects run outside the lock. While a miss is loading, its slot is resident but marked
/// busy; while a victim is unloading, its identifier drains through a side set. Operations
/// that meet either state wait on a condvar and re-check, so per-identifier transitions stay
/// serialized, every miss triggers exactly one load, and the capacity bound holds at every
/// observable point.
pub struct ConcurrentCache<L, H>
where
    L: Line,
    H: Heuristic,
{
    inner: Mutex<Inner<L, H>>,
    settled: Condvar,
    capacity: usize,
    metrics: Arc<Metrics>,
}

impl<L, H> ConcurrentCache<L, H>
where
    L: Line,
    H: Heuristic,
{
    /// Create a cache holding at most `capacity` resident lines, evicting under `heuristic`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, heuristic: H) -> Self {
        assert!(capacity > 0, "cache capacity must be non-zero");
        Self {
            inner: Mutex::new(Inner {
                slots: BTreeMap::new(),
                draining: BTreeSet::new(),
                heuristic,
                stamp: 0,
            }),
            settled: Condvar::new(),
            capacity,
            metrics: Arc::new(Metrics::default()),
        }
    }

    /// Configured maximum number of resident lines.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently resident lines.
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Whether no line is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership test by identifier.
    pub fn contains(&self, id: LineId) -> bool {
        self.inner.lock().slots.contains_key(&id)
    }

    /// Operation counters of this cache.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Shared handle to this cache's counters.
    pub fn metrics_handle(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// [`ConcurrentCache::acquire_with`] with the default hint.
    pub fn acquire(&self, line: &Arc<L>) -> Result<()> {
        self.acquire_with(line, H::Hint::default())
    }

    /// Ensure `line`'s identifier is resident and take a hold on it.
    ///
    /// See [`Cache::acquire_with`] for the contract. Concurrent acquires of one identifier
    /// coalesce: the first miss loads, the rest wait for it to settle and then hit.
    pub fn acquire_with(&self, line: &Arc<L>, hint: H::Hint) -> Result<()> {
        let id = line.id();
        let mut guard = self.inner.lock();

        loop {
            if guard.draining.contains(&id) {
                self.settled.wait(&mut guard);
                continue;
            }
            let busy = match guard.slots.get(&id) {
                Some(slot) => slot.busy,
                None => break,
            };
            if busy {
                // Another thread is loading this identifier; its failure may leave the
                // identifier absent, so re-check from scratch.
                self.settled.wait(&mut guard);
                continue;
            }

            let inner = &mut *guard;
            inner.slots.get_mut(&id).unwrap().held += 1;
            inner.heuristic.access(id, &hint);
            self.metrics.hit.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("[concurrent]: acquire hit on line {id}");
            return Ok(());
        }

        self.metrics.miss.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("[concurrent]: acquire miss on line {id}");

        // Make room. The victim leaves the store immediately so the capacity bound holds
        // while the new slot is reserved, and drains until its unload settles.
        let inner = &mut *guard;
        let victim = if inner.slots.len() >= self.capacity {
            let vid = select_victim(&inner.slots, &inner.heuristic).ok_or(Error::CapacityExhausted {
                capacity: self.capacity,
            })?;
            let slot = inner.slots.remove(&vid).unwrap();
            inner.heuristic.forget(vid);
            inner.draining.insert(vid);
            self.metrics.evict.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("[concurrent]: evict line {vid}");
            Some((vid, slot.line))
        } else {
            None
        };

        // Reserve the slot before giving up the lock: a concurrent acquire of the same
        // identifier must wait for this load instead of starting its own.
        inner.stamp += 1;
        let stamp = inner.stamp;
        inner.slots.insert(
            id,
            Slot {
                line: line.clone(),
                held: 1,
                stamp,
                busy: true,
            },
        );
        inner.heuristic.access(id, &hint);
        self.metrics.insert.fetch_add(1, Ordering::Relaxed);
        drop(guard);

        let result = match &victim {
            Some((_, victim_line)) => victim_line.unload().and_then(|()| line.load()),
            None => line.load(),
        };

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if let Some((vid, _)) = victim {
            inner.draining.remove(&vid);
        }
        match &result {
            Ok(()) => {
                // The slot cannot have been removed: remove and clear wait out busy slots,
                // and eviction never selects them.
                inner.slots.get_mut(&id).unwrap().busy = false;
            }
            Err(_) => {
                inner.slots.remove(&id);
                inner.heuristic.forget(id);
            }
        }
        drop(guard);
        self.settled.notify_all();
        result
    }

    /// Give up one hold on `line`. See [`Cache::release`].
    pub fn release(&self, line: &Arc<L>) -> Result<()> {
        let id = line.id();
        let mut guard = self.inner.lock();
        let slot = guard.slots.get_mut(&id).ok_or(Error::InvalidOperation {
            reason: "release of a line that is not resident",
        })?;
        if slot.held == 0 {
            return Err(Error::InvalidOperation {
                reason: "release of a line that is not acquired",
            });
        }
        slot.held -= 1;
        self.metrics.release.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("[concurrent]: release line {id}");
        Ok(())
    }

    /// Forcibly evict `line`'s identifier, unloading it first. See [`Cache::remove`].
    pub fn remove(&self, line: &Arc<L>) -> Result<()> {
        let id = line.id();
        let mut guard = self.inner.lock();

        loop {
            if guard.draining.contains(&id) {
                self.settled.wait(&mut guard);
                continue;
            }
            let (busy, held) = match guard.slots.get(&id) {
                None => return Err(Error::NotFound { id }),
                Some(slot) => (slot.busy, slot.held),
            };
            if busy {
                self.settled.wait(&mut guard);
                continue;
            }
            if held > 0 {
                return Err(Error::InvalidOperation {
                    reason: "remove of a held line",
                });
            }
            break;
        }

        let inner = &mut *guard;
        let slot = inner.slots.remove(&id).unwrap();
        inner.heuristic.forget(id);
        inner.draining.insert(id);
        self.metrics.remove.fetch_add(1, Ordering::Relaxed);
        drop(guard);

        let result = slot.line.unload();

        self.inner.lock().draining.remove(&id);
        self.settled.notify_all();
        tracing::trace!("[concurrent]: remove line {id}");
        result
    }

    /// Unload and evict every resident line. See [`Cache::clear`].
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        self.wait_settled(&mut guard);

        let inner = &mut *guard;
        let drained = std::mem::take(&mut inner.slots)
            .into_iter()
            .map(|(id, slot)| (id, slot.line))
            .collect_vec();
        for (id, _) in &drained {
            inner.heuristic.forget(*id);
            inner.draining.insert(*id);
            self.metrics.remove.fetch_add(1, Ordering::Relaxed);
        }
        drop(guard);

        let mut first_err = None;
        for (id, line) in &drained {
            if let Err(e) = line.unload() {
                tracing::warn!("[concurrent]: unload of line {id} failed on clear: {e}");
                first_err.get_or_insert(e);
            }
        }

        let mut guard = self.inner.lock();
        for (id, _) in &drained {
            guard.draining.remove(id);
        }
        drop(guard);
        self.settled.notify_all();

        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Block until no load or unload is in flight.
    fn wait_settled(&self, guard: &mut MutexGuard<'_, Inner<L, H>>) {
        while !guard.draining.is_empty() || guard.slots.values().any(|slot| slot.busy) {
            self.settled.wait(guard);
        }
    }
}

impl<L, H> Cache<L> for ConcurrentCache<L, H>
where
    L: Line,
    H: Heuristic,
{
    type Hint = H::Hint;

    fn capacity(&self) -> usize {
        ConcurrentCache::capacity(self)
    }

    fn len(&self) -> usize {
        ConcurrentCache::len(self)
    }

    fn contains(&self, id: LineId) -> bool {
        ConcurrentCache::contains(self, id)
    }

    fn metrics(&self) -> &Metrics {
        ConcurrentCache::metrics(self)
    }

    fn acquire_with(&mut self, line: &Arc<L>, hint: Self::Hint) -> Result<()> {
        ConcurrentCache::acquire_with(self, line, hint)
    }

    fn release(&mut self, line: &Arc<L>) -> Result<()> {
        ConcurrentCache::release(self, line)
    }

    fn remove(&mut self, line: &Arc<L>) -> Result<()> {
        ConcurrentCache::remove(self, line)
    }

    fn clear(&mut self) -> Result<()> {
        ConcurrentCache::clear(self)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{heuristic::Lru, line::SimpleLine, test_utils::TrackingLine};

    fn lru_cache(capacity: usize) -> ConcurrentCache<TrackingLine, Lru> {
        ConcurrentCache::new(capacity, Lru::default())
    }

    #[test]
    fn test_contract_matches_serial() {
        let cache = lru_cache(2);
        let a = Arc::new(TrackingLine::new(1));
        let b = Arc::new(TrackingLine::new(2));
        let c = Arc::new(TrackingLine::new(3));

        cache.acquire(&a).unwrap();
        cache.release(&a).unwrap();
        cache.acquire(&b).unwrap();
        cache.release(&b).unwrap();

        cache.acquire(&c).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(1));
        assert!(cache.contains(3));

        assert_eq!(cache.remove(&a), Err(Error::NotFound { id: 1 }));
        assert!(matches!(cache.remove(&c), Err(Error::InvalidOperation { .. })));
        cache.release(&c).unwrap();
        cache.remove(&c).unwrap();

        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_exhausted_when_all_held() {
        let cache = lru_cache(1);
        let a = Arc::new(TrackingLine::new(1));
        let b = Arc::new(TrackingLine::new(2));

        cache.acquire(&a).unwrap();
        assert_eq!(
            cache.acquire(&b),
            Err(Error::CapacityExhausted { capacity: 1 })
        );
    }

    #[test]
    fn test_failed_load_settles_waiters() {
        let cache: Arc<ConcurrentCache<SimpleLine, Lru>> = Arc::new(ConcurrentCache::new(2, Lru::default()));
        let line = Arc::new(SimpleLine::corrupted(1));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let line = line.clone();
                thread::spawn(move || cache.acquire(&line))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        // At least one thread observed the integrity failure; none is left hanging, and the
        // identifier is not resident afterward.
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(Error::DataIntegrity { .. }))));
        assert!(!cache.contains(1));
    }

    #[test]
    fn test_concurrent_acquires_coalesce() {
        const THREADS: usize = 8;

        let cache = Arc::new(lru_cache(4));
        let line = Arc::new(TrackingLine::new(7));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cache = cache.clone();
                let line = line.clone();
                thread::spawn(move || cache.acquire(&line))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        // One miss loaded; every other acquire hit, possibly after waiting for the load.
        assert_eq!(line.populates(), 1);
        assert_eq!(cache.len(), 1);
        let snapshot = cache.metrics().snapshot();
        assert_eq!(snapshot.miss, 1);
        assert_eq!(snapshot.hit, THREADS as u64 - 1);
    }

    #[test]
    fn test_contention_keeps_invariants() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 500;
        const CAPACITY: usize = 4;

        let cache = Arc::new(lru_cache(CAPACITY));
        let pool: Vec<_> = (0..16).map(|id| Arc::new(TrackingLine::new(id))).collect();

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let cache = cache.clone();
                let pool = pool.clone();
                thread::spawn(move || {
                    for i in 0..ROUNDS {
                        let line = &pool[(t * 31 + i * 17) % pool.len()];
                        match cache.acquire(line) {
                            Ok(()) => {
                                line.data().push(i as u8);
                                cache.release(line).unwrap();
                            }
                            Err(Error::CapacityExhausted { .. }) => {}
                            Err(e) => panic!("unexpected acquire failure: {e}"),
                        }
                        assert!(cache.len() <= CAPACITY);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= CAPACITY);
        // Every successful acquire (hit or admission) was matched by a release.
        let snapshot = cache.metrics().snapshot();
        assert_eq!(snapshot.release, snapshot.hit + snapshot.insert);

        cache.clear().unwrap();
        assert!(cache.is_empty());
    }
}
