use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::client::ReportClient;
use crate::pacer::{IDLE_BACKOFF, convergence_delay};
use crate::rate::Rate;
use crate::reporter::WorkerReport;
use crate::requests::ReportSynthesizer;

/// The shared background goal rate, in requests per second per worker.
///
/// Single writer (the orchestrator), many readers (every worker). The value
/// is advisory and eventually consistent: a reader may observe a stale
/// target for up to one pacing decision, which only mistimes a sleep and
/// can never corrupt request content.
#[derive(Debug, Default)]
pub struct TargetRate(AtomicU64);

impl TargetRate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, rps: f64) {
        self.0.store(rps.to_bits(), Ordering::Relaxed);
    }

    pub fn per_second(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct WorkerShared {
    /// Last full-lap window the worker published. Whole snapshots behind a
    /// mutex, so the orchestrator never reads a torn rate.
    rate: Mutex<Option<Rate>>,
    errors: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    /// Worker thread stack size in bytes; 0 keeps the platform default.
    pub stack_size: usize,
    /// Bucket-swap interval. One second in production.
    pub lap: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            stack_size: 0,
            lap: Duration::from_secs(1),
        }
    }
}

/// A fixed set of background threads, each continuously sending while
/// self-throttling toward the shared target rate.
pub struct WorkerPool {
    shared: Vec<Arc<WorkerShared>>,
    handles: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn the workers. A thread that fails to spawn is logged and
    /// dropped; the pool runs with whatever started.
    pub fn start<C>(
        client: Arc<C>,
        synth: Arc<ReportSynthesizer>,
        target: Arc<TargetRate>,
        cfg: &PoolConfig,
    ) -> Self
    where
        C: ReportClient + ?Sized + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut shared = Vec::with_capacity(cfg.workers);
        let mut handles = Vec::with_capacity(cfg.workers);

        for id in 0..cfg.workers {
            let state = Arc::new(WorkerShared {
                rate: Mutex::new(None),
                errors: AtomicU64::new(0),
            });
            let mut builder = thread::Builder::new().name(format!("bgworker-{id}"));
            if cfg.stack_size != 0 {
                builder = builder.stack_size(cfg.stack_size);
            }

            let client = Arc::clone(&client);
            let synth = Arc::clone(&synth);
            let target = Arc::clone(&target);
            let worker_state = Arc::clone(&state);
            let stop = Arc::clone(&shutdown);
            let lap = cfg.lap;

            match builder
                .spawn(move || worker_loop(id, &*client, &synth, &target, &worker_state, &stop, lap))
            {
                Ok(handle) => {
                    shared.push(state);
                    handles.push(handle);
                }
                Err(err) => {
                    tracing::error!(worker = id, %err, "failed to spawn worker thread");
                }
            }
        }

        Self {
            shared,
            handles,
            shutdown,
        }
    }

    /// Number of workers that actually started.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Per-worker published rates and error counts.
    pub fn snapshot(&self) -> Vec<WorkerReport> {
        self.shared
            .iter()
            .enumerate()
            .map(|(id, state)| WorkerReport {
                id,
                rate: *state.rate.lock(),
                errors: state.errors.load(Ordering::Relaxed),
            })
            .collect()
    }

    /// Signal all workers to stop and join them.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.handles {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

/// The background send loop.
///
/// Two time-sliced buckets record every attempt; each lap the older bucket
/// (which now holds a full lap of history) is published and pacing switches
/// to the bucket warmed during the previous lap. Pacing against a window
/// with at least one complete lap behind it avoids the bias of an
/// in-progress partial window.
fn worker_loop<C: ReportClient + ?Sized>(
    id: usize,
    client: &C,
    synth: &ReportSynthesizer,
    target: &TargetRate,
    state: &WorkerShared,
    shutdown: &AtomicBool,
    lap: Duration,
) {
    let mut current = Rate::started();
    let mut warming = Rate::started();
    let mut lap_start = Instant::now();
    let mut i = 0u64;

    while !shutdown.load(Ordering::Relaxed) {
        let goal = target.per_second();
        if !(goal > 0.0) {
            // No goal published yet: withhold rather than flood.
            thread::sleep(IDLE_BACKOFF);
            continue;
        }

        if lap_start.elapsed() >= lap {
            let mut published = current;
            published.stop();
            *state.rate.lock() = Some(published);
            current = warming;
            warming = Rate::started();
            lap_start = Instant::now();
        }

        // Attempts count regardless of outcome, so failed sends still weigh
        // into the pacing denominator. The warming bucket records too; that
        // is what makes it a full window by the time it takes over.
        current.add();
        warming.add();
        if let Err(err) = client.submit(&synth.build(i)) {
            state.errors.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(worker = id, %err, "background send failed");
        }

        if let Some(delay) = convergence_delay(goal, &current) {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
        i += 1;
    }
}
