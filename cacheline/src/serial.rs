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
    collections::BTreeMap,
    sync::{atomic::Ordering, Arc},
};

use crate::{
    cache::{select_victim, Cache, Slot},
    error::{Error, Result},
    heuristic::Heuristic,
    line::{Line, LineId},
    metrics::Metrics,
};

/// Non-concurrent reference implementation of the cache contract.
///
/// Has no internal synchronization: every operation takes `&mut self`, so the borrow checker
/// enforces the external serialization the contract requires. Backed by an ordered id → slot
/// mapping whose deterministic iteration order drives victim-selection tie-breaks.
pub struct SerialCache<L, H>
where
    L: Line,
    H: Heuristic,
{
    slots: BTreeMap<LineId, Slot<L>>,
    heuristic: H,
    capacity: usize,
    stamp: u64,
    metrics: Arc<Metrics>,
}

impl<L, H> SerialCache<L, H>
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
            slots: BTreeMap::new(),
            heuristic,
            capacity,
            stamp: 0,
            metrics: Arc::new(Metrics::default()),
        }
    }

    /// Shared handle to this cache's counters.
    pub fn metrics_handle(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Insert `line` into the store. Capacity must have been ensured by the caller.
    fn allocate(&mut self, line: Arc<L>) {
        assert!(self.slots.len() < self.capacity, "allocation would exceed capacity");
        self.stamp += 1;
        let prev = self.slots.insert(
            line.id(),
            Slot {
                line,
                held: 1,
                stamp: self.stamp,
                busy: false,
            },
        );
        assert!(prev.is_none(), "identifier already resident");
        self.metrics.insert.fetch_add(1, Ordering::Relaxed);
    }

    /// Unload and drop the victim `id`.
    ///
    /// The victim is unloaded before it leaves the store, so a failed unload keeps it
    /// resident and aborts the caller's operation.
    fn evict(&mut self, id: LineId) -> Result<()> {
        let slot = self.slots.get(&id).unwrap();
        slot.line.unload()?;
        self.slots.remove(&id);
        self.heuristic.forget(id);
        self.metrics.evict.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("[serial]: evict line {id}");
        Ok(())
    }
}

impl<L, H> Cache<L> for SerialCache<L, H>
where
    L: Line,
    H: Heuristic,
{
    type Hint = H::Hint;

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn contains(&self, id: LineId) -> bool {
        self.slots.contains_key(&id)
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn acquire_with(&mut self, line: &Arc<L>, hint: Self::Hint) -> Result<()> {
        let id = line.id();

        if let Some(slot) = self.slots.get_mut(&id) {
            slot.held += 1;
            self.heuristic.access(id, &hint);
            self.metrics.hit.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("[serial]: acquire hit on line {id}, held: {}", slot.held);
            return Ok(());
        }

        self.metrics.miss.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("[serial]: acquire miss on line {id}");

        if self.slots.len() >= self.capacity {
            let victim = select_victim(&self.slots, &self.heuristic).ok_or(Error::CapacityExhausted {
                capacity: self.capacity,
            })?;
            self.evict(victim)?;
        }

        self.allocate(line.clone());
        self.heuristic.access(id, &hint);

        if let Err(e) = line.load() {
            // Roll the admission back; the caller gets the load failure.
            self.slots.remove(&id);
            self.heuristic.forget(id);
            return Err(e);
        }
        Ok(())
    }

    fn release(&mut self, line: &Arc<L>) -> Result<()> {
        let id = line.id();
        let slot = self.slots.get_mut(&id).ok_or(Error::InvalidOperation {
            reason: "release of a line that is not resident",
        })?;
        if slot.held == 0 {
            return Err(Error::InvalidOperation {
                reason: "release of a line that is not acquired",
            });
        }
        slot.held -= 1;
        self.metrics.release.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("[serial]: release line {id}, held: {}", slot.held);
        Ok(())
    }

    fn remove(&mut self, line: &Arc<L>) -> Result<()> {
        let id = line.id();
        let slot = self.slots.get(&id).ok_or(Error::NotFound { id })?;
        if slot.held > 0 {
            return Err(Error::InvalidOperation {
                reason: "remove of a held line",
            });
        }
        slot.line.unload()?;
        self.slots.remove(&id);
        self.heuristic.forget(id);
        self.metrics.remove.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("[serial]: remove line {id}");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let mut first_err = None;
        for (id, slot) in std::mem::take(&mut self.slots) {
            self.heuristic.forget(id);
            self.metrics.remove.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = slot.line.unload() {
                tracing::warn!("[serial]: unload of line {id} failed on clear: {e}");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}
