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

//! Trial-record accumulation and rendering.

use std::time::Duration;

use cacheline::{Error, Result};
use itertools::Itertools;

/// Observations of one benchmark trial.
#[derive(Debug, Clone)]
pub struct TrialRecord {
    /// Label of the trial, e.g. `lru/zipf`.
    pub tag: String,
    /// Total acquires issued.
    pub n_acquire: u64,
    /// Number of distinct lines in the pool.
    pub pool_size: usize,
    /// Configured cache capacity.
    pub cache_size: usize,
    /// Payload bytes moved through acquired lines.
    pub total_bytes: u64,
    /// Fraction of read operations in `[0, 1]`.
    pub read_rate: f64,
    /// Fraction of acquires that missed, in `[0, 1]`.
    pub miss_rate: f64,
    /// Mean payload size per operation in bytes.
    pub line_size: f64,
    /// Wall-clock duration of the trial.
    pub runtime: Duration,
    /// Whether the trial drove the concurrent cache from multiple threads.
    pub parallel: bool,
    /// Worker thread count of a parallel trial.
    pub threads: usize,
    /// Mean latency of read operations in microseconds.
    pub r_lat_us: f64,
    /// Mean latency of write operations in microseconds.
    pub w_lat_us: f64,
}

impl TrialRecord {
    /// Payload bytes moved per millisecond.
    pub fn throughput(&self) -> f64 {
        self.total_bytes as f64 / self.runtime.as_secs_f64() / 1000.0
    }

    /// Mean microseconds per acquire.
    pub fn latency(&self) -> f64 {
        if self.n_acquire == 0 {
            return 0.0;
        }
        self.runtime.as_secs_f64() * 1_000_000.0 / self.n_acquire as f64
    }
}

/// Append-only sequence of trial records.
#[derive(Debug, Default)]
pub struct Report {
    records: Vec<TrialRecord>,
}

const PAD: usize = 12;
const SEP: &str = " | ";

const HEADER: [&str; 13] = [
    "trial",
    "tag",
    "cache",
    "pool",
    "read (%)",
    "miss (%)",
    "tput (B/ms)",
    "lat (us)",
    "line (B)",
    "parallel",
    "threads",
    "r-lat (us)",
    "w-lat (us)",
];

impl Report {
    /// Append one trial record.
    pub fn push(&mut self, record: TrialRecord) {
        self.records.push(record);
    }

    /// Number of recorded trials.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no trial was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render the accumulated records as an aligned table, or as a tab-separated export.
    ///
    /// Rendering with zero recorded trials is a caller error.
    pub fn render(&self, tsv: bool) -> Result<String> {
        if self.is_empty() {
            return Err(Error::InvalidOperation {
                reason: "reporting zero recorded trials",
            });
        }

        let rows = self
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| row(index, record))
            .collect_vec();

        let mut buffer = String::new();
        if tsv {
            buffer.push_str(&HEADER.join("\t"));
            buffer.push('\n');
            for cells in rows {
                buffer.push_str(&cells.join("\t"));
                buffer.push('\n');
            }
        } else {
            let header = HEADER.iter().map(|cell| format!("{cell:>PAD$}")).join(SEP);
            buffer.push_str(&header);
            buffer.push('\n');
            buffer.push_str(&"=".repeat(header.len()));
            buffer.push('\n');
            for cells in rows {
                buffer.push_str(&cells.iter().map(|cell| format!("{cell:>PAD$}")).join(SEP));
                buffer.push('\n');
            }
        }
        Ok(buffer)
    }
}

fn row(index: usize, record: &TrialRecord) -> Vec<String> {
    vec![
        format!("{}", index + 1),
        record.tag.clone(),
        format!("{}", record.cache_size),
        format!("{}", record.pool_size),
        format!("{:.1}", record.read_rate * 100.0),
        format!("{:.1}", record.miss_rate * 100.0),
        format!("{:.1}", record.throughput()),
        format!("{:.3}", record.latency()),
        format!("{:.0}", record.line_size),
        format!("{}", record.parallel),
        if record.parallel {
            format!("{}", record.threads)
        } else {
            "--".to_string()
        },
        format!("{:.3}", record.r_lat_us),
        format!("{:.3}", record.w_lat_us),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TrialRecord {
        TrialRecord {
            tag: "lru/uniform".to_string(),
            n_acquire: 1000,
            pool_size: 64,
            cache_size: 16,
            total_bytes: 4_096_000,
            read_rate: 0.8,
            miss_rate: 0.25,
            line_size: 4096.0,
            runtime: Duration::from_millis(500),
            parallel: false,
            threads: 0,
            r_lat_us: 1.5,
            w_lat_us: 2.5,
        }
    }

    #[test]
    fn test_zero_trials_is_invalid() {
        let report = Report::default();
        assert_eq!(
            report.render(false),
            Err(Error::InvalidOperation {
                reason: "reporting zero recorded trials",
            })
        );
    }

    #[test]
    fn test_derived_rates() {
        let record = record();
        assert!((record.throughput() - 8192.0).abs() < 1e-6);
        assert!((record.latency() - 500.0).abs() < 1e-6);
    }

    #[test]
    fn test_table_shape() {
        let mut report = Report::default();
        report.push(record());
        report.push(TrialRecord {
            parallel: true,
            threads: 8,
            ..record()
        });

        let table = report.render(false).unwrap();
        let lines = table.lines().collect_vec();
        // Header, ruler, one row per trial.
        assert_eq!(lines.len(), 4);
        assert!(lines[1].chars().all(|c| c == '='));
        assert!(lines[2].contains("--"));
        assert!(lines[3].contains('8'));
    }

    #[test]
    fn test_tsv_shape() {
        let mut report = Report::default();
        report.push(record());

        let tsv = report.render(true).unwrap();
        let lines = tsv.lines().collect_vec();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split('\t').count(), HEADER.len());
        assert_eq!(lines[1].split('\t').count(), HEADER.len());
        assert!(!tsv.contains('='));
    }
}
