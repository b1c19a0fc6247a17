use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use sru_core::{Buffer, Device, SruDims};
use sru_engine::{scan_chunked, RecurrenceEngine, ScanConfig, ScanInputs, ScanOutput};

const BANNER: &str = r#"
  ____  ____  _   _
 / ___||  _ \| | | |
 \___ \| |_) | | | |
  ___) |  _ <| |_| |
 |____/|_| \_\\___/"#;

/// Largest tolerated difference between two runs of `check`.
const CHECK_TOLERANCE: f32 = 1e-5;

#[derive(Parser)]
#[command(
    name = "sru",
    about = "SRU forward recurrence CLI",
    long_about = "Simple Recurrent Unit forward scan on CPU (rayon) or CUDA.\n\n\
                  The scan consumes precomputed gate pre-activations and runs the\n\
                  elementwise recurrence over time, one independent column per worker.",
    version
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show system info (threads, CUDA devices)
    Info,
    /// Scan random inputs several ways and compare the results
    Check {
        #[arg(long, default_value = "48")]
        batch: usize,
        #[arg(long, default_value = "128")]
        feature: usize,
        #[arg(long, default_value = "50")]
        time: usize,
        /// Time steps per chunk for the chained run
        #[arg(long, default_value = "7")]
        chunk: usize,
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Use the cell state directly instead of tanh(cell)
        #[arg(long)]
        no_tanh: bool,
        /// Device to check against the CPU result: cpu, cuda, cuda:N
        #[arg(long, default_value = "cpu")]
        device: Device,
    },
    /// Time the scan
    Bench {
        #[arg(long, default_value = "48")]
        batch: usize,
        #[arg(long, default_value = "128")]
        feature: usize,
        #[arg(long, default_value = "50")]
        time: usize,
        #[arg(long, default_value = "100")]
        iters: usize,
        /// Engine config (JSON); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Info => cmd_info(),
        Commands::Check {
            batch,
            feature,
            time,
            chunk,
            seed,
            no_tanh,
            device,
        } => cmd_check(SruDims::new(batch, feature, time), chunk, seed, !no_tanh, device),
        Commands::Bench {
            batch,
            feature,
            time,
            iters,
            config,
        } => cmd_bench(SruDims::new(batch, feature, time), iters, config),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn cmd_info() -> Result<()> {
    println!("{}", BANNER);
    println!("  v{}  -  SRU forward recurrence\n", env!("CARGO_PKG_VERSION"));

    println!("Platform");
    println!("  OS:   {}", std::env::consts::OS);
    println!("  Arch: {}", std::env::consts::ARCH);

    println!("\nCPU");
    println!("  rayon threads: {}", rayon::current_num_threads());

    println!("\nCUDA");
    print_cuda_info();

    println!("\nDefaults");
    println!("{}", ScanConfig::default().to_json()?);
    Ok(())
}

#[cfg(feature = "cuda")]
fn print_cuda_info() {
    let count = sru_kernels::cuda::context::device_count();
    if count == 0 {
        println!("  built with cuda, no device found");
    }
    for idx in 0..count {
        println!("  cuda:{}", idx);
    }
}

#[cfg(not(feature = "cuda"))]
fn print_cuda_info() {
    println!("  not built (enable the `cuda` feature)");
}

/// Random inputs for one problem, drawn like the gate pre-activations
/// of a freshly initialized layer.
struct Problem {
    dims: SruDims,
    x: Buffer,
    u: Buffer,
    bias: Buffer,
    c0: Buffer,
}

impl Problem {
    fn random(dims: SruDims, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut fill = |shape: sru_core::Shape| {
            let data = (0..shape.numel()).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            Buffer::new(data, shape)
        };
        Ok(Self {
            dims,
            x: fill(dims.seq_shape())?,
            u: fill(dims.gate_shape())?,
            bias: fill(dims.bias_shape())?,
            c0: fill(dims.state_shape())?,
        })
    }

    fn inputs(&self) -> ScanInputs<'_> {
        ScanInputs::new(self.x.view(), self.u.view(), self.bias.view())
            .with_initial_state(self.c0.view())
    }
}

fn max_abs_diff(a: &ScanOutput, b: &ScanOutput) -> f32 {
    [
        (a.hidden.data(), b.hidden.data()),
        (a.cell.data(), b.cell.data()),
        (a.last_cell.data(), b.last_cell.data()),
    ]
    .iter()
    .flat_map(|(x, y)| x.iter().zip(y.iter()).map(|(p, q)| (p - q).abs()))
    .fold(0.0f32, f32::max)
}

fn cmd_check(dims: SruDims, chunk: usize, seed: u64, use_tanh: bool, device: Device) -> Result<()> {
    println!("=== SRU Check ===");
    println!("{}  chunk={}  seed={}  tanh={}  device={}\n", dims, chunk, seed, use_tanh, device);

    let problem = Problem::random(dims, seed)?;
    let inputs = problem.inputs();

    let cpu = RecurrenceEngine::cpu().with_tanh(use_tanh);
    let reference = cpu.scan(&inputs)?;

    let mut worst = 0.0f32;
    let mut report = |label: &str, out: &ScanOutput| {
        let diff = max_abs_diff(&reference, out);
        worst = worst.max(diff);
        println!("  {:<28} max |diff| = {:.3e}", label, diff);
    };

    let sequential = RecurrenceEngine::new(ScanConfig {
        min_parallel_columns: usize::MAX,
        ..cpu.config().clone()
    })?;
    report("cpu sequential", &sequential.scan(&inputs)?);
    report(&format!("cpu chunked ({} steps)", chunk), &scan_chunked(&cpu, &inputs, chunk)?);

    if device.is_cuda() {
        let gpu = RecurrenceEngine::new(ScanConfig::on(device).with_tanh(use_tanh))?;
        gpu.init().with_context(|| format!("initializing {}", device))?;
        report(&format!("{} single call", device), &gpu.scan(&inputs)?);
        let chunked = scan_chunked(&gpu, &inputs, chunk)?;
        report(&format!("{} chunked ({} steps)", device, chunk), &chunked);
    }

    let shown = problem.dims.columns().min(4);
    println!("\nlast_cell[0..4] = {:?}", &reference.last_cell.data()[..shown]);
    if worst > CHECK_TOLERANCE {
        bail!("max difference {:.3e} exceeds tolerance {:.0e}", worst, CHECK_TOLERANCE);
    }
    println!("OK (tolerance {:.0e})", CHECK_TOLERANCE);
    Ok(())
}

fn cmd_bench(dims: SruDims, iters: usize, config: Option<PathBuf>) -> Result<()> {
    let config = match config {
        Some(path) => ScanConfig::from_json_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ScanConfig::default(),
    };
    let engine = RecurrenceEngine::new(config)?;
    engine.init()?;

    let problem = Problem::random(dims, 0)?;
    let inputs = problem.inputs();

    println!("=== SRU Scan Benchmark ===");
    println!("{}  device={}  tanh={}\n", dims, engine.device(), engine.config().use_tanh);

    let mut failure = None;
    let secs = time_it(iters.max(1), || {
        if let Err(e) = engine.scan(&inputs) {
            failure.get_or_insert(e);
        }
    });
    if let Some(e) = failure {
        return Err(e.into());
    }

    let steps = dims.columns() as f64 * dims.time as f64;
    println!("{:<14} {:>12} {:>16}", "Iters", "Mean (ms)", "Col-steps/s");
    println!("{}", "-".repeat(44));
    let rate = steps / secs.max(f64::MIN_POSITIVE);
    println!("{:<14} {:>10.3}ms {:>16.3e}", iters.max(1), secs * 1000.0, rate);
    Ok(())
}

fn time_it(iters: usize, mut f: impl FnMut()) -> f64 {
    f(); // warm-up
    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    start.elapsed().as_secs_f64() / iters as f64
}
