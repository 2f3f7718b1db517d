use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tlsrpt_bench::burst::{self, BurstConfig, OrchestratorConfig};
use tlsrpt_bench::calibrate::{RampUpConfig, ramp_up};
use tlsrpt_bench::client::{ClientError, ConnectionMode, DEFAULT_SOCKET_PATH, SocketClient};
use tlsrpt_bench::reporter::{HumanReporter, JsonlReporter, Reporter};
use tlsrpt_bench::requests::ReportSynthesizer;
use tlsrpt_bench::worker::{PoolConfig, TargetRate, WorkerPool};

/// CLI arguments configuring the harness.
#[derive(Debug, Parser)]
#[command(name = "tlsrpt-bench")]
#[command(bin_name = "tlsrpt-bench")]
#[command(version, about, long_about = None)]
struct Args {
    /// unix socket path of the collector under test
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// number of background worker threads
    #[arg(long, default_value_t = 10)]
    threads: usize,

    /// number of different domains to report on
    #[arg(long, default_value_t = 1000)]
    domains: u32,

    /// seconds to run the ramp-up phase before the baseline is established
    #[arg(long, value_name = "SECONDS", default_value_t = 15)]
    rampup: u64,

    /// 0 for a varying mix of policies, 1-15 to always use a fixed set of up to 4 policies
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=15))]
    policy: u8,

    /// reuse one connection for every request instead of opening a fresh one per request
    #[arg(long, default_value_t = false)]
    reuse_connection: bool,

    /// show per-attempt error detail during ramp-up (might flood the output)
    #[arg(long, default_value_t = false)]
    show_rampup_errors: bool,

    /// seconds to wait between bursts
    #[arg(long, value_name = "SECONDS", default_value_t = 10)]
    burst_wait: u64,

    /// maximum number of datagrams in a burst
    #[arg(long, default_value_t = 20_000)]
    max_burst: u64,

    /// maximum number of seconds for a burst
    #[arg(long, value_name = "SECONDS", default_value_t = 2)]
    max_burst_secs: u64,

    /// worker thread stack size in bytes, 0 for the platform default
    #[arg(long, default_value_t = 0)]
    stack_size: usize,

    /// number of burst cycles to run, 0 to run until terminated
    #[arg(long, default_value_t = 0)]
    cycles: u64,

    /// report JSON lines instead of a human-friendly format
    #[arg(long, default_value_t = false)]
    json: bool,

    /// debug logging as default instead of info; use RUST_LOG env for more options
    #[arg(long, short = 'v', default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<(), ClientError> {
    let args = Args::parse();
    init_tracing(args.verbose);

    tracing::info!(
        socket = %args.socket.display(),
        threads = args.threads,
        domains = args.domains,
        rampup = args.rampup,
        policy = args.policy,
        reuse_connection = args.reuse_connection,
        show_rampup_errors = args.show_rampup_errors,
        burst_wait = args.burst_wait,
        max_burst = args.max_burst,
        max_burst_secs = args.max_burst_secs,
        stack_size = args.stack_size,
        cycles = args.cycles,
        "harness parameters ready",
    );

    let mut reporter: Box<dyn Reporter> = if args.json {
        Box::new(JsonlReporter::new())
    } else {
        Box::new(HumanReporter::new())
    };
    let synth = Arc::new(ReportSynthesizer::new(args.domains, args.policy));

    // Failing to reach the collector at all is the only fatal error; every
    // later send failure is merely counted.
    let mut client = SocketClient::connect(&args.socket)?;

    tracing::info!("baseline ramp-up phase");
    let rampup_cfg = RampUpConfig {
        duration: Duration::from_secs(args.rampup),
        show_errors: args.show_rampup_errors,
        ..RampUpConfig::default()
    };
    let calibration = ramp_up(&client, &synth, &rampup_cfg, reporter.as_mut());

    // The measured phase runs non-blocking: a saturated collector surfaces
    // as counted errors instead of stalling the schedule.
    if let Err(err) = client.set_blocking(false) {
        tracing::warn!(%err, "could not switch to non-blocking sends");
    }
    if !args.reuse_connection {
        if let Err(err) = client.set_mode(ConnectionMode::PerRequest) {
            tracing::warn!(%err, "could not switch to per-request connections");
        }
    }
    let client = Arc::new(client);

    let target = Arc::new(TargetRate::new());
    let workers = args.threads.max(1);
    target.set(
        calibration
            .baseline
            .scale(0.1 / workers as f64)
            .per_second(),
    );

    let pool = WorkerPool::start(
        Arc::clone(&client),
        Arc::clone(&synth),
        Arc::clone(&target),
        &PoolConfig {
            workers,
            stack_size: args.stack_size,
            ..PoolConfig::default()
        },
    );
    if pool.len() < workers {
        tracing::warn!(
            requested = workers,
            started = pool.len(),
            "running with a reduced worker pool",
        );
    }

    let orchestrator_cfg = OrchestratorConfig {
        burst_wait: Duration::from_secs(args.burst_wait),
        burst: BurstConfig {
            max_count: args.max_burst,
            max_duration: Duration::from_secs(args.max_burst_secs),
        },
        cycles: (args.cycles > 0).then_some(args.cycles),
    };
    burst::run(
        &*client,
        &synth,
        &calibration.baseline,
        &target,
        &pool,
        &orchestrator_cfg,
        reporter.as_mut(),
    );

    pool.shutdown();
    reporter.finish();
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
