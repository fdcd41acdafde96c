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

//! Error taxonomy of the cache engine.

use crate::line::LineId;

/// Cache engine error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The digest recomputed on load disagrees with the one stored on the last unload.
    ///
    /// Non-retryable for the affected line instance. The payload is left populated, but the line
    /// must be treated as unusable.
    #[error("data integrity violation on line {id}: stored checksum {stored:#x}, computed {computed:#x}")]
    DataIntegrity {
        /// Affected line.
        id: LineId,
        /// Digest stored on the last unload.
        stored: u64,
        /// Digest recomputed over the current payload.
        computed: u64,
    },
    /// The cache is full and every resident line is held by a caller.
    ///
    /// Retryable once holders release their lines.
    #[error("cache capacity exhausted: all {capacity} resident lines are held")]
    CapacityExhausted {
        /// Configured capacity of the cache.
        capacity: usize,
    },
    /// An operation was invoked in a state that violates its contract.
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// What the caller did wrong.
        reason: &'static str,
    },
    /// The targeted identifier is not resident.
    #[error("line {id} is not resident")]
    NotFound {
        /// Requested line.
        id: LineId,
    },
}

impl Error {
    /// Whether retrying the failed operation can succeed without further intervention.
    ///
    /// Only capacity exhaustion clears on its own, once holders release their lines.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::CapacityExhausted { .. })
    }
}

/// Cache engine result.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<Error>();
    }

    #[test]
    fn test_retryable() {
        assert!(Error::CapacityExhausted { capacity: 4 }.is_retryable());
        assert!(!Error::NotFound { id: 42 }.is_retryable());
        assert!(!Error::DataIntegrity {
            id: 1,
            stored: 0,
            computed: 1
        }
        .is_retryable());
    }
}
