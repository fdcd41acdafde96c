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

use super::Heuristic;
use crate::line::LineId;

/// First-in-first-out eviction.
///
/// Scores every line equally; the oldest-resident tie-break of victim selection then yields
/// strict insertion order. Keeps no state of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl Heuristic for Fifo {
    type Hint = ();

    fn access(&mut self, _: LineId, _: &Self::Hint) {}

    fn forget(&mut self, _: LineId) {}

    fn score(&self, _: LineId) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_constant_score() {
        let mut fifo = Fifo;
        fifo.access(1, &());
        fifo.access(2, &());
        fifo.access(1, &());
        assert_eq!(fifo.score(1), fifo.score(2));
        fifo.forget(1);
        assert_eq!(fifo.score(1), 0);
    }
}
