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

//! Pluggable eviction scoring.
//!
//! A [`Heuristic`] is the single extension point distinguishing eviction policies. The cache
//! owns one as an injected strategy value and consults it on every admission, hit and
//! departure; victim selection evicts the releasable resident line minimizing
//! `(score, residency stamp)`, so ties always break toward the oldest resident.

use crate::line::LineId;

/// Eviction scoring policy.
pub trait Heuristic: Send + Sync + 'static {
    /// Per-call hint passed by callers to inform the policy.
    ///
    /// Policies that need no hint use `()`.
    type Hint: Default;

    /// Bookkeeping on admission and on every subsequent hit of `id`.
    fn access(&mut self, id: LineId, hint: &Self::Hint);

    /// Bookkeeping when `id` leaves residency.
    fn forget(&mut self, id: LineId);

    /// Victim preference for a resident `id`. The line minimizing the score is evicted first.
    fn score(&self, id: LineId) -> u64;
}

pub mod fifo;
pub mod lfu;
pub mod lru;

pub use fifo::Fifo;
pub use lfu::Lfu;
pub use lru::{Lru, LruHint};
