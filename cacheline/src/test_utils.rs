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

//! Test utilities.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::{
    error::Result,
    line::{Line, LineId},
};

/// Line that counts its lifecycle side effects.
///
/// Lets tests assert how often a cache actually invoked `load` (via [`Line::populate`]) and
/// `unload` (via [`Line::flush`]) for a given identifier.
#[derive(Debug)]
pub struct TrackingLine {
    id: LineId,
    data: Mutex<Vec<u8>>,
    checksum: AtomicU64,
    populates: AtomicUsize,
    flushes: AtomicUsize,
}

impl TrackingLine {
    /// Create a tracking line with an empty payload.
    pub fn new(id: LineId) -> Self {
        Self {
            id,
            data: Mutex::new(Vec::new()),
            checksum: AtomicU64::new(0),
            populates: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
        }
    }

    /// How many loads reached this line.
    pub fn populates(&self) -> usize {
        self.populates.load(Ordering::Acquire)
    }

    /// How many unloads reached this line.
    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::Acquire)
    }
}

impl Line for TrackingLine {
    fn id(&self) -> LineId {
        self.id
    }

    fn data(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data.lock()
    }

    fn checksum(&self) -> u64 {
        self.data
            .lock()
            .iter()
            .fold(0u64, |sum, b| sum.wrapping_add(*b as u64))
    }

    fn stored_checksum(&self) -> u64 {
        self.checksum.load(Ordering::Acquire)
    }

    fn store_checksum(&self, checksum: u64) {
        self.checksum.store(checksum, Ordering::Release);
    }

    fn populate(&self) -> Result<()> {
        self.populates.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
