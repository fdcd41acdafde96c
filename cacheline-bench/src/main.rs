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

//! Correctness and performance trials driven through the public cache contract.

mod pattern;
mod report;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use cacheline::{
    Cache, ConcurrentCache, Error, Fifo, Heuristic, Lfu, Line, LineId, Lru, MetricsSnapshot, SerialCache, SimpleLine,
};
use clap::Parser;
use hdrhistogram::Histogram;
use itertools::Itertools;
use pattern::Pattern;
use rand::{rngs::StdRng, Rng, SeedableRng};
use report::{Report, TrialRecord};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Trial mode.
    ///
    /// Available values: "performance", "correctness".
    #[arg(long, default_value = "performance")]
    mode: String,

    /// Eviction policy.
    ///
    /// Available values: "fifo", "lru", "lfu".
    #[arg(long, default_value = "lru")]
    eviction: String,

    /// Cache capacity. (lines)
    #[arg(long, default_value_t = 64)]
    capacity: usize,

    /// Distinct lines in the pool.
    #[arg(long, default_value_t = 1024)]
    pool: u64,

    /// Acquires per trial, per worker thread in parallel trials.
    #[arg(long, default_value_t = 100_000)]
    ops: usize,

    /// Fraction of operations that only read the payload.
    #[arg(long, default_value_t = 0.8)]
    read_rate: f64,

    /// Payload size written by write operations. (B)
    #[arg(long, default_value_t = 4096)]
    line_size: usize,

    /// Access pattern.
    ///
    /// Available values: "sequential", "uniform", "zipf".
    #[arg(long, default_value = "uniform")]
    pattern: String,

    /// For `--pattern zipf` only.
    #[arg(long, default_value_t = 0.9)]
    zipf_s: f64,

    /// Worker threads. `0` drives the serial cache single-threaded.
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Trial repetitions.
    #[arg(long, default_value_t = 1)]
    trials: usize,

    /// RNG seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Emit the report as tab-separated values.
    #[arg(long, default_value_t = false)]
    tsv: bool,
}

fn init_logger() {
    use tracing_subscriber::{prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_line_number(true))
        .with(EnvFilter::from_default_env())
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logger();

    #[cfg(feature = "deadlock")]
    {
        std::thread::spawn(move || loop {
            std::thread::sleep(Duration::from_secs(1));
            let deadlocks = parking_lot::deadlock::check_deadlock();
            if deadlocks.is_empty() {
                continue;
            }

            println!("{} deadlocks detected", deadlocks.len());
            for (i, threads) in deadlocks.iter().enumerate() {
                println!("Deadlock #{}", i);
                for t in threads {
                    println!("Thread Id {:#?}", t.thread_id());
                    println!("{:#?}", t.backtrace());
                }
            }
            panic!()
        });
    }

    let args = Args::parse();
    println!("{args:#?}");

    anyhow::ensure!(args.capacity > 0, "\"--capacity\" value must be greater than 0");
    anyhow::ensure!(args.pool > 0, "\"--pool\" value must be greater than 0");
    anyhow::ensure!(args.ops > 0, "\"--ops\" value must be greater than 0");
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.read_rate),
        "\"--read-rate\" value must be in [0.0, 1.0]"
    );

    match args.eviction.as_str() {
        "fifo" => run(&args, Fifo::default),
        "lru" => run(&args, Lru::default),
        "lfu" => run(&args, Lfu::default),
        other => anyhow::bail!("unsupported eviction policy: {other}"),
    }
}

fn run<H>(args: &Args, make: fn() -> H) -> anyhow::Result<()>
where
    H: Heuristic,
{
    match args.mode.as_str() {
        "performance" => performance(args, make),
        "correctness" => correctness(args, make),
        other => anyhow::bail!("unsupported mode: {other}"),
    }
}

fn pool(size: u64) -> Vec<Arc<SimpleLine>> {
    (0..size).map(|id| Arc::new(SimpleLine::new(id))).collect()
}

/// Per-worker observations, merged across threads after the trial.
struct WorkerStats {
    bytes: u64,
    r_lats: Histogram<u64>,
    w_lats: Histogram<u64>,
}

impl WorkerStats {
    fn new() -> Self {
        Self {
            bytes: 0,
            r_lats: Histogram::new(3).unwrap(),
            w_lats: Histogram::new(3).unwrap(),
        }
    }

    fn observe(&mut self, write: bool, bytes: u64, lat: Duration) {
        self.bytes += bytes;
        let us = lat.as_micros() as u64;
        let hist = if write { &mut self.w_lats } else { &mut self.r_lats };
        if let Err(e) = hist.record(us) {
            tracing::error!("histogram error: {e:?}, value: {us}");
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.bytes += other.bytes;
        if let Err(e) = self.r_lats.add(&other.r_lats) {
            tracing::error!("histogram merge error: {e:?}");
        }
        if let Err(e) = self.w_lats.add(&other.w_lats) {
            tracing::error!("histogram merge error: {e:?}");
        }
        self
    }
}

/// Read or overwrite the payload of an acquired line. Returns the bytes moved.
fn touch(line: &Arc<SimpleLine>, write: bool, fill: u8, line_size: usize) -> u64 {
    if write {
        let mut data = line.data();
        data.clear();
        data.resize(line_size, fill);
        line_size as u64
    } else {
        let data = line.data();
        std::hint::black_box(data.iter().fold(0u64, |sum, b| sum.wrapping_add(*b as u64)));
        data.len() as u64
    }
}

fn performance<H>(args: &Args, make: fn() -> H) -> anyhow::Result<()>
where
    H: Heuristic,
{
    let pattern = Pattern::new(&args.pattern, args.zipf_s)?;
    let tag = format!("{}/{}", args.eviction, args.pattern);
    let mut report = Report::default();

    let start = Instant::now();
    for trial in 0..args.trials {
        let seed = args.seed.wrapping_add(trial as u64);
        let record = if args.threads == 0 {
            serial_trial(args, make(), pattern, &tag, seed)?
        } else {
            parallel_trial(args, make(), pattern, &tag, seed)?
        };
        report.push(record);
        tracing::info!("finished trial {}/{}", trial + 1, args.trials);
    }

    println!("{}", report.render(args.tsv)?);
    let total = Duration::from_millis(start.elapsed().as_millis() as u64);
    println!("total: {}", humantime::format_duration(total));
    Ok(())
}

fn serial_trial<H>(args: &Args, heuristic: H, pattern: Pattern, tag: &str, seed: u64) -> anyhow::Result<TrialRecord>
where
    H: Heuristic,
{
    let mut cache = SerialCache::new(args.capacity, heuristic);
    let pool = pool(args.pool);
    let ids = pattern.generate(args.pool, args.ops, seed);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut stats = WorkerStats::new();

    let start = Instant::now();
    for id in &ids {
        let line = &pool[*id as usize];
        let write = rng.random_bool(1.0 - args.read_rate);
        let op = Instant::now();
        cache.acquire(line)?;
        let bytes = touch(line, write, *id as u8, args.line_size);
        cache.release(line)?;
        stats.observe(write, bytes, op.elapsed());
    }
    let runtime = start.elapsed();

    let snapshot = cache.metrics().snapshot();
    cache.clear()?;

    Ok(trial_record(args, tag, &ids, snapshot, stats, runtime))
}

fn parallel_trial<H>(args: &Args, heuristic: H, pattern: Pattern, tag: &str, seed: u64) -> anyhow::Result<TrialRecord>
where
    H: Heuristic,
{
    let cache = Arc::new(ConcurrentCache::new(args.capacity, heuristic));
    let pool = Arc::new(pool(args.pool));
    let all_ids: Vec<Vec<LineId>> = (0..args.threads)
        .map(|t| pattern.generate(args.pool, args.ops, seed.wrapping_add(t as u64)))
        .collect_vec();

    let start = Instant::now();
    let stats = thread::scope(|scope| {
        let handles = all_ids
            .iter()
            .enumerate()
            .map(|(t, ids)| {
                let cache = cache.clone();
                let pool = pool.clone();
                scope.spawn(move || perf_worker(args, cache, pool, ids, seed.wrapping_add(t as u64)))
            })
            .collect_vec();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .fold(WorkerStats::new(), WorkerStats::merge)
    });
    let runtime = start.elapsed();

    let snapshot = cache.metrics().snapshot();
    cache.clear()?;

    let ids = all_ids.into_iter().flatten().collect_vec();
    Ok(trial_record(args, tag, &ids, snapshot, stats, runtime))
}

fn perf_worker<H>(
    args: &Args,
    cache: Arc<ConcurrentCache<SimpleLine, H>>,
    pool: Arc<Vec<Arc<SimpleLine>>>,
    ids: &[LineId],
    seed: u64,
) -> WorkerStats
where
    H: Heuristic,
{
    let mut rng = StdRng::seed_from_u64(seed);
    let mut stats = WorkerStats::new();

    for id in ids {
        let line = &pool[*id as usize];
        let write = rng.random_bool(1.0 - args.read_rate);
        let op = Instant::now();
        loop {
            match cache.acquire(line) {
                Ok(()) => break,
                // All residents transiently held by the other workers.
                Err(Error::CapacityExhausted { .. }) => thread::yield_now(),
                Err(e) => panic!("unexpected acquire failure: {e}"),
            }
        }
        let bytes = touch(line, write, *id as u8, args.line_size);
        cache.release(line).unwrap();
        stats.observe(write, bytes, op.elapsed());
    }
    stats
}

fn trial_record(
    args: &Args,
    tag: &str,
    ids: &[LineId],
    snapshot: MetricsSnapshot,
    stats: WorkerStats,
    runtime: Duration,
) -> TrialRecord {
    TrialRecord {
        tag: tag.to_string(),
        n_acquire: ids.len() as u64,
        pool_size: args.pool as usize,
        cache_size: args.capacity,
        total_bytes: stats.bytes,
        read_rate: args.read_rate,
        miss_rate: snapshot.miss_rate(),
        line_size: stats.bytes as f64 / ids.len() as f64,
        runtime,
        parallel: args.threads > 0,
        threads: args.threads,
        r_lat_us: stats.r_lats.mean(),
        w_lat_us: stats.w_lats.mean(),
    }
}

fn correctness<H>(args: &Args, make: fn() -> H) -> anyhow::Result<()>
where
    H: Heuristic,
{
    let n_success = Arc::new(AtomicUsize::new(0));
    let attempts = args.ops * args.threads.max(1);

    let start = Instant::now();
    if args.threads == 0 {
        let mut cache = SerialCache::new(args.capacity, make());
        let pool = pool(args.pool);
        let mut rng = StdRng::seed_from_u64(args.seed);

        for _ in 0..args.ops {
            let line = &pool[rng.random_range(0..pool.len())];
            match cache.acquire(line) {
                Ok(()) => {
                    assert!(cache.contains(line.id()));
                    let byte = rng.random::<u8>();
                    line.data().push(byte);
                    assert_eq!(line.data().last().copied(), Some(byte));
                    cache.release(line).unwrap();
                    n_success.fetch_add(1, Ordering::Relaxed);
                }
                Err(Error::CapacityExhausted { .. }) => {}
                Err(e) => panic!("unexpected acquire failure: {e}"),
            }
            assert!(cache.len() <= cache.capacity());
        }
    } else {
        let cache = Arc::new(ConcurrentCache::new(args.capacity, make()));
        let pool = Arc::new(pool(args.pool));

        thread::scope(|scope| {
            for t in 0..args.threads {
                let cache = cache.clone();
                let pool = pool.clone();
                let n_success = n_success.clone();
                let ops = args.ops;
                let capacity = args.capacity;
                let seed = args.seed.wrapping_add(t as u64);
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    for _ in 0..ops {
                        let line = &pool[rng.random_range(0..pool.len())];
                        match cache.acquire(line) {
                            Ok(()) => {
                                assert!(cache.contains(line.id()));
                                line.data().push(rng.random::<u8>());
                                cache.release(line).unwrap();
                                n_success.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(Error::CapacityExhausted { .. }) => {}
                            Err(e) => panic!("unexpected acquire failure: {e}"),
                        }
                        assert!(cache.len() <= capacity);
                    }
                });
            }
        });
    }

    println!(
        "correctness: {}/{} acquires succeeded in {}",
        n_success.load(Ordering::Relaxed),
        attempts,
        humantime::format_duration(Duration::from_millis(start.elapsed().as_millis() as u64)),
    );
    Ok(())
}
