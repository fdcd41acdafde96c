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

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    error::Result,
    heuristic::Heuristic,
    line::{Line, LineId},
    metrics::Metrics,
};

/// The cache engine contract.
///
/// A cache holds at most `capacity` resident [`Line`]s, admits on miss, and evicts under an
/// injected [`Heuristic`]. Lines are shared handles: a caller that has acquired a line holds it
/// until the matching release, and a held line is never selected as an eviction victim.
///
/// Per identifier the cache walks `Absent → Resident(held = 0) ⇄ Resident(held ≥ 1) → Absent`:
/// acquire may admit and always increments the hold, release decrements it, and eviction is
/// only permitted at `held = 0`.
///
/// Dropping a cache does not unload resident lines; [`Cache::clear`] is the explicit flush
/// path.
pub trait Cache<L>
where
    L: Line,
{
    /// Per-call hint forwarded to the eviction heuristic.
    type Hint: Default;

    /// Configured maximum number of resident lines. Fixed for the cache's lifetime.
    fn capacity(&self) -> usize;

    /// Number of currently resident lines. Never exceeds [`Cache::capacity`].
    fn len(&self) -> usize;

    /// Whether no line is resident.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership test by identifier.
    fn contains(&self, id: LineId) -> bool;

    /// Operation counters of this cache.
    fn metrics(&self) -> &Metrics;

    /// [`Cache::acquire_with`] with the default hint.
    fn acquire(&mut self, line: &Arc<L>) -> Result<()> {
        self.acquire_with(line, Self::Hint::default())
    }

    /// Ensure `line`'s identifier is resident and take a hold on it.
    ///
    /// A hit updates the heuristic bookkeeping and binds the existing resident copy; the
    /// argument's own content is not consulted. A miss admits the line: at capacity, the
    /// releasable resident line minimizing `(score, residency age)` is unloaded and evicted
    /// first, then the new line is allocated and loaded.
    ///
    /// Fails with [`crate::Error::CapacityExhausted`] when the cache is full and every
    /// resident line is held, and with [`crate::Error::DataIntegrity`] when the admitted
    /// line's load fails verification (the admission is rolled back).
    fn acquire_with(&mut self, line: &Arc<L>, hint: Self::Hint) -> Result<()>;

    /// Give up one hold on `line`. It stays resident but becomes eligible for eviction once
    /// no holds remain.
    ///
    /// Releasing a line that is not currently acquired is a caller error
    /// ([`crate::Error::InvalidOperation`]).
    fn release(&mut self, line: &Arc<L>) -> Result<()>;

    /// Forcibly evict `line`'s identifier regardless of heuristic score, unloading it first.
    ///
    /// Fails with [`crate::Error::NotFound`] if the identifier is not resident and with
    /// [`crate::Error::InvalidOperation`] if the line is currently held.
    fn remove(&mut self, line: &Arc<L>) -> Result<()>;

    /// Unload and evict every resident line, resetting the cache to empty.
    ///
    /// Outstanding holds are discarded: this is teardown. All lines are attempted; the first
    /// unload error is returned.
    fn clear(&mut self) -> Result<()>;
}

/// Residency record for one line.
pub(crate) struct Slot<L> {
    pub line: Arc<L>,
    /// Outstanding acquires without a matching release.
    pub held: usize,
    /// Admission order, monotonically increasing per cache. Victim-selection tie-break.
    pub stamp: u64,
    /// A load or unload is in flight outside the store lock. Serial caches never set this.
    pub busy: bool,
}

/// Choose the eviction victim: the releasable resident line minimizing `(score, stamp)`.
///
/// BTreeMap iteration is id-ordered and `min_by_key` keeps the first minimum, so the result is
/// deterministic for identical scores across runs.
pub(crate) fn select_victim<L, H>(slots: &BTreeMap<LineId, Slot<L>>, heuristic: &H) -> Option<LineId>
where
    L: Line,
    H: Heuristic,
{
    slots
        .iter()
        .filter(|(_, slot)| slot.held == 0 && !slot.busy)
        .min_by_key(|(id, slot)| (heuristic.score(**id), slot.stamp))
        .map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{heuristic::Fifo, line::SimpleLine};

    fn slot(id: LineId, held: usize, stamp: u64) -> (LineId, Slot<SimpleLine>) {
        (
            id,
            Slot {
                line: Arc::new(SimpleLine::new(id)),
                held,
                stamp,
                busy: false,
            },
        )
    }

    #[test]
    fn test_select_oldest_on_ties() {
        let slots: BTreeMap<_, _> = [slot(3, 0, 2), slot(1, 0, 3), slot(2, 0, 1)].into_iter().collect();
        assert_eq!(select_victim(&slots, &Fifo), Some(2));
    }

    #[test]
    fn test_select_skips_held_and_busy() {
        let mut slots: BTreeMap<_, _> = [slot(1, 1, 1), slot(2, 0, 2), slot(3, 0, 3)].into_iter().collect();
        slots.get_mut(&2).unwrap().busy = true;
        assert_eq!(select_victim(&slots, &Fifo), Some(3));

        slots.get_mut(&3).unwrap().held = 2;
        assert_eq!(select_victim(&slots, &Fifo), None);
    }
}
