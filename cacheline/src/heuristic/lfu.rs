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

use super::Heuristic;
use crate::line::LineId;

/// Least-frequently-used eviction.
///
/// The victim is the resident line with the fewest accesses; equally frequent lines fall back
/// to oldest-resident order.
#[derive(Debug, Default)]
pub struct Lfu {
    counts: HashMap<LineId, u64>,
}

impl Heuristic for Lfu {
    type Hint = ();

    fn access(&mut self, id: LineId, _: &Self::Hint) {
        *self.counts.entry(id).or_default() += 1;
    }

    fn forget(&mut self, id: LineId) {
        self.counts.remove(&id);
    }

    fn score(&self, id: LineId) -> u64 {
        debug_assert!(self.counts.contains_key(&id));
        self.counts.get(&id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lfu_frequency() {
        let mut lfu = Lfu::default();
        lfu.access(1, &());
        lfu.access(1, &());
        lfu.access(2, &());
        assert!(lfu.score(2) < lfu.score(1));

        lfu.access(2, &());
        assert_eq!(lfu.score(1), lfu.score(2));

        // Frequency does not survive departure.
        lfu.forget(1);
        lfu.access(1, &());
        assert_eq!(lfu.score(1), 1);
    }
}
