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

//! Synthetic access-pattern generation.

use cacheline::LineId;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Zipf};

/// Shape of the synthetic identifier sequence driven through the cache.
#[derive(Debug, Clone, Copy)]
pub enum Pattern {
    /// Cycle through the pool in identifier order.
    Sequential,
    /// Uniformly random identifiers.
    Uniform,
    /// Zipf-distributed identifiers: low identifiers are hot.
    Zipf {
        /// Skew exponent.
        s: f64,
    },
}

impl Pattern {
    /// Resolve a pattern name from the command line.
    pub fn new(name: &str, zipf_s: f64) -> anyhow::Result<Self> {
        match name {
            "sequential" => Ok(Pattern::Sequential),
            "uniform" => Ok(Pattern::Uniform),
            "zipf" => Ok(Pattern::Zipf { s: zipf_s }),
            other => anyhow::bail!("unsupported access pattern: {other}"),
        }
    }

    /// Generate `length` identifiers drawn from a pool of `pool` lines.
    ///
    /// Deterministic in `seed` for reproducible trials.
    pub fn generate(&self, pool: u64, length: usize, seed: u64) -> Vec<LineId> {
        let mut rng = StdRng::seed_from_u64(seed);
        match self {
            Pattern::Sequential => (0..length).map(|i| i as u64 % pool).collect(),
            Pattern::Uniform => (0..length).map(|_| rng.random_range(0..pool)).collect(),
            Pattern::Zipf { s } => {
                let zipf = Zipf::new(pool as f64, *s).expect("valid zipf parameters");
                (0..length).map(|_| zipf.sample(&mut rng) as u64 - 1).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert!(matches!(Pattern::new("sequential", 0.9), Ok(Pattern::Sequential)));
        assert!(matches!(Pattern::new("zipf", 0.9), Ok(Pattern::Zipf { .. })));
        assert!(Pattern::new("gaussian", 0.9).is_err());
    }

    #[test]
    fn test_bounds_and_determinism() {
        for pattern in [Pattern::Sequential, Pattern::Uniform, Pattern::Zipf { s: 0.9 }] {
            let ids = pattern.generate(16, 1000, 7);
            assert_eq!(ids.len(), 1000);
            assert!(ids.iter().all(|id| *id < 16));
            assert_eq!(ids, pattern.generate(16, 1000, 7));
        }
    }

    #[test]
    fn test_sequential_cycles() {
        let ids = Pattern::Sequential.generate(4, 10, 0);
        assert_eq!(ids, vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1]);
    }
}
