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

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::Heuristic;
use crate::line::LineId;

/// Hint for [`Lru`] to decide the priority of a specific line.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LruHint {
    /// The line is accessed like any other.
    #[default]
    Normal,
    /// Suggest the priority of the line is low.
    ///
    /// On first access the line is pinned to the cold end and becomes the preferred victim
    /// until a later `Normal` access promotes it.
    Low,
}

/// Least-recently-used eviction.
///
/// Recency is a logical clock bumped on every `Normal` access; the victim is the line with the
/// smallest last-access tick.
#[derive(Debug, Default)]
pub struct Lru {
    clock: u64,
    last: HashMap<LineId, u64>,
}

impl Heuristic for Lru {
    type Hint = LruHint;

    fn access(&mut self, id: LineId, hint: &Self::Hint) {
        match hint {
            LruHint::Normal => {
                self.clock += 1;
                self.last.insert(id, self.clock);
            }
            LruHint::Low => {
                self.last.entry(id).or_insert(0);
            }
        }
    }

    fn forget(&mut self, id: LineId) {
        self.last.remove(&id);
    }

    fn score(&self, id: LineId) -> u64 {
        debug_assert!(self.last.contains_key(&id));
        self.last.get(&id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_recency() {
        let mut lru = Lru::default();
        lru.access(1, &LruHint::Normal);
        lru.access(2, &LruHint::Normal);
        lru.access(3, &LruHint::Normal);
        assert!(lru.score(1) < lru.score(2));
        assert!(lru.score(2) < lru.score(3));

        // A hit promotes.
        lru.access(1, &LruHint::Normal);
        assert!(lru.score(1) > lru.score(3));
    }

    #[test]
    fn test_lru_low_hint() {
        let mut lru = Lru::default();
        lru.access(1, &LruHint::Normal);
        lru.access(2, &LruHint::Low);
        assert_eq!(lru.score(2), 0);
        assert!(lru.score(2) < lru.score(1));

        // A later normal access promotes a low-priority line.
        lru.access(2, &LruHint::Normal);
        assert!(lru.score(2) > lru.score(1));

        // A repeated low hint does not demote.
        lru.access(2, &LruHint::Low);
        assert!(lru.score(2) > lru.score(1));
    }

    #[test]
    fn test_lru_forget() {
        let mut lru = Lru::default();
        lru.access(1, &LruHint::Normal);
        lru.forget(1);
        assert!(lru.last.is_empty());
    }
}
