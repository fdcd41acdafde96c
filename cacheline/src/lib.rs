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

//! Capacity-bounded caching engine with pluggable eviction heuristics.
//!
//! The cached unit is a [`Line`]: an identified byte payload with a load/unload lifecycle
//! bracketed by integrity verification. A [`Cache`] holds a bounded set of resident lines,
//! admits on miss and evicts under an injected [`Heuristic`] scoring policy, never evicting a
//! line its callers still hold.
//!
//! Two implementations of the one contract are provided: [`SerialCache`], the non-concurrent
//! reference implementation, and [`ConcurrentCache`], its thread-safe sibling.
//!
//! ```
//! use std::sync::Arc;
//!
//! use cacheline::{Cache, Line, Lru, SerialCache, SimpleLine};
//!
//! let mut cache = SerialCache::new(2, Lru::default());
//! let line = Arc::new(SimpleLine::new(42));
//!
//! cache.acquire(&line)?;
//! line.data().extend_from_slice(b"payload");
//! cache.release(&line)?;
//! # Ok::<(), cacheline::Error>(())
//! ```

mod cache;
mod concurrent;
mod serial;

pub mod error;
pub mod heuristic;
pub mod line;
pub mod metrics;
pub mod prelude;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use prelude::*;
