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

//! In-process operation counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters maintained by a cache.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Admissions of a non-resident line.
    pub insert: AtomicU64,
    /// Acquires of an already-resident line.
    pub hit: AtomicU64,
    /// Acquires of a non-resident line.
    pub miss: AtomicU64,
    /// Victims evicted under capacity pressure.
    pub evict: AtomicU64,
    /// Lines taken out of residency by `remove` or `clear`.
    pub remove: AtomicU64,
    /// Released holds.
    pub release: AtomicU64,
}

impl Metrics {
    /// Consistent-enough point-in-time view of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            insert: self.insert.load(Ordering::Relaxed),
            hit: self.hit.load(Ordering::Relaxed),
            miss: self.miss.load(Ordering::Relaxed),
            evict: self.evict.load(Ordering::Relaxed),
            remove: self.remove.load(Ordering::Relaxed),
            release: self.release.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Admissions of a non-resident line.
    pub insert: u64,
    /// Acquires of an already-resident line.
    pub hit: u64,
    /// Acquires of a non-resident line.
    pub miss: u64,
    /// Victims evicted under capacity pressure.
    pub evict: u64,
    /// Lines taken out of residency by `remove` or `clear`.
    pub remove: u64,
    /// Released holds.
    pub release: u64,
}

impl MetricsSnapshot {
    /// Fraction of acquires that missed, in `[0, 1]`. Zero when nothing was acquired.
    pub fn miss_rate(&self) -> f64 {
        let total = self.hit + self.miss;
        if total == 0 {
            return 0.0;
        }
        self.miss as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = Metrics::default();
        metrics.hit.fetch_add(3, Ordering::Relaxed);
        metrics.miss.fetch_add(1, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hit, 3);
        assert_eq!(snapshot.miss, 1);
        assert_eq!(snapshot.miss_rate(), 0.25);
        assert_eq!(MetricsSnapshot::default().miss_rate(), 0.0);
    }
}
