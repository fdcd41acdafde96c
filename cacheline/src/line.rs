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

//! The cached unit and its load/unload lifecycle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, Result};

/// Identifier uniquely naming a line.
///
/// Two lines with the same identifier denote the same logical resource; a cache never holds two
/// resident entries for one identifier.
pub type LineId = u64;

/// The unit of cached content.
///
/// A line owns an opaque byte payload and a load/unload lifecycle bracketed by integrity
/// verification: [`Line::unload`] stores a digest over the current payload, and the next
/// [`Line::load`] recomputes and verifies it. Variants supply the digest function and the
/// load/unload side effects; the lifecycle sequencing itself is provided by this trait.
///
/// Lines are shared between a cache and its callers via [`std::sync::Arc`], so all state is
/// behind interior mutability.
pub trait Line: Send + Sync + 'static {
    /// Identifier of this line. Immutable after construction.
    fn id(&self) -> LineId;

    /// Exclusive access to the payload.
    ///
    /// The view is shared with any other holder of the line; no copy is made.
    fn data(&self) -> MutexGuard<'_, Vec<u8>>;

    /// Deterministic digest over the current payload.
    fn checksum(&self) -> u64;

    /// Digest stored by the last [`Line::unload`].
    fn stored_checksum(&self) -> u64;

    /// Store `checksum` as the verification state for the next [`Line::load`].
    fn store_checksum(&self, checksum: u64);

    /// Variant-specific population of the payload, run first on [`Line::load`].
    fn populate(&self) -> Result<()>;

    /// Variant-specific teardown, run last on [`Line::unload`].
    fn flush(&self) -> Result<()>;

    /// Bring the line into a usable state: populate the payload, then verify it against the
    /// stored digest.
    ///
    /// Fails with [`Error::DataIntegrity`] if the recomputed digest disagrees with the stored
    /// one. The payload stays populated, but the line instance must then be treated as
    /// unusable.
    fn load(&self) -> Result<()> {
        self.populate()?;
        let computed = self.checksum();
        let stored = self.stored_checksum();
        if computed != stored {
            return Err(Error::DataIntegrity {
                id: self.id(),
                stored,
                computed,
            });
        }
        Ok(())
    }

    /// Take the line out of residency: store the digest over the current payload, then run the
    /// variant teardown.
    fn unload(&self) -> Result<()> {
        self.store_checksum(self.checksum());
        self.flush()
    }
}

/// Parity-checked reference line.
///
/// The digest is the byte-sum parity of the payload. New instances start with a single zero
/// byte. Population and teardown are no-ops.
///
/// The corruption flag is a test-only capability: while set, the stored verification state
/// reads back inverted, so every [`Line::load`] fails with [`Error::DataIntegrity`]. This
/// simulates tampering with content the cache does not currently control.
#[derive(Debug)]
pub struct SimpleLine {
    id: LineId,
    data: Mutex<Vec<u8>>,
    parity: AtomicU64,
    corrupt: AtomicBool,
}

impl SimpleLine {
    /// Create a line with a single zero byte of payload and a matching stored digest.
    pub fn new(id: LineId) -> Self {
        Self::with_corruption(id, false)
    }

    /// Create a line whose loads fail with [`Error::DataIntegrity`].
    pub fn corrupted(id: LineId) -> Self {
        Self::with_corruption(id, true)
    }

    fn with_corruption(id: LineId, corrupt: bool) -> Self {
        let data = vec![0];
        let parity = parity(&data);
        Self {
            id,
            data: Mutex::new(data),
            parity: AtomicU64::new(parity),
            corrupt: AtomicBool::new(corrupt),
        }
    }

    /// Toggle corruption simulation.
    pub fn set_corrupt(&self, corrupt: bool) {
        self.corrupt.store(corrupt, Ordering::Release);
    }
}

fn parity(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |sum, b| sum.wrapping_add(*b as u64)) & 1
}

impl Line for SimpleLine {
    fn id(&self) -> LineId {
        self.id
    }

    fn data(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data.lock()
    }

    fn checksum(&self) -> u64 {
        parity(&self.data.lock())
    }

    fn stored_checksum(&self) -> u64 {
        self.parity.load(Ordering::Acquire) ^ self.corrupt.load(Ordering::Acquire) as u64
    }

    fn store_checksum(&self, checksum: u64) {
        self.parity.store(checksum, Ordering::Release);
    }

    fn populate(&self) -> Result<()> {
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_fresh() {
        let line = SimpleLine::new(1);
        assert_eq!(line.id(), 1);
        line.load().unwrap();
        assert_eq!(line.data().as_slice(), &[0]);
    }

    #[test]
    fn test_roundtrip() {
        let line = SimpleLine::new(1);
        line.load().unwrap();
        line.data().extend_from_slice(&[1, 2, 3]);
        line.unload().unwrap();
        // Content unchanged between unload and the next load.
        line.load().unwrap();
    }

    #[test]
    fn test_corrupted_load_fails() {
        let line = SimpleLine::corrupted(7);
        let err = line.load().unwrap_err();
        assert!(matches!(err, Error::DataIntegrity { id: 7, .. }));
        // The payload stays populated on a failed load.
        assert_eq!(line.data().as_slice(), &[0]);

        let line = SimpleLine::new(7);
        line.load().unwrap();
    }

    #[test]
    fn test_corruption_between_unload_and_load() {
        let line = SimpleLine::new(3);
        line.load().unwrap();
        line.unload().unwrap();

        line.set_corrupt(true);
        assert!(matches!(line.load(), Err(Error::DataIntegrity { id: 3, .. })));

        line.set_corrupt(false);
        line.load().unwrap();
    }

    #[test]
    fn test_external_mutation_detected() {
        let line = SimpleLine::new(9);
        line.load().unwrap();
        line.unload().unwrap();

        // Payload tampered with while outside the cache's control, parity flips.
        line.data().push(1);
        assert!(matches!(line.load(), Err(Error::DataIntegrity { .. })));
    }

    #[test]
    fn test_parity() {
        assert_eq!(parity(&[]), 0);
        assert_eq!(parity(&[0]), 0);
        assert_eq!(parity(&[1]), 1);
        assert_eq!(parity(&[1, 2]), 1);
        assert_eq!(parity(&[255, 1]), 0);
    }
}
