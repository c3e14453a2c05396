//! Pallet loading job runner.

mod job;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use job::{ConfigOverrides, JobRequest, JobResponse};
use pallet_piler::core::{OrderingKey, PackConfig, ProgressCallback};
use pallet_piler::pack::{format, Item, ItemCatalog, PalletPacker, PalletSpec, StackClass};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pallet-piler")]
#[command(about = "Stack orders onto pallets under physical constraints")]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a job file and write the loading plan as JSON
    Pack {
        /// Path to the JSON job file
        job: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Check a job file without packing it
    Validate {
        /// Path to the JSON job file
        job: PathBuf,
    },

    /// Pack a built-in sample load
    Demo {
        /// Pack this many random items instead of the sample load
        #[arg(long)]
        random: Option<usize>,

        /// Seed for the random load
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        overrides: OverrideArgs,
    },
}

#[derive(clap::Args, Default)]
struct OverrideArgs {
    /// Minimum supported fraction of an item's base (0.0 - 1.0)
    #[arg(long)]
    min_support: Option<f64>,

    /// Use a single pallet
    #[arg(long)]
    single_pallet: bool,

    /// Upper bound on the number of pallets
    #[arg(long)]
    max_pallets: Option<usize>,

    /// Improvement iterations (0 disables the pass)
    #[arg(long)]
    improvement_iterations: Option<u32>,

    /// Time limit in milliseconds
    #[arg(long)]
    time_limit: Option<u64>,

    /// Priority order of the units
    #[arg(long, value_enum)]
    ordering: Option<OrderingArg>,

    /// Try every insertion order for jobs with at most this many units
    #[arg(long)]
    exhaustive: Option<usize>,

    /// Never place an item on a lighter one
    #[arg(long)]
    heavy_bottom: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderingArg {
    /// Largest volume first
    Volume,
    /// Heaviest first
    Weight,
    /// Largest footprint first
    Footprint,
    /// Tallest first
    Height,
    /// As listed in the job
    Input,
}

impl From<OrderingArg> for OrderingKey {
    fn from(arg: OrderingArg) -> Self {
        match arg {
            OrderingArg::Volume => OrderingKey::VolumeDesc,
            OrderingArg::Weight => OrderingKey::WeightDesc,
            OrderingArg::Footprint => OrderingKey::FootprintDesc,
            OrderingArg::Height => OrderingKey::HeightDesc,
            OrderingArg::Input => OrderingKey::Input,
        }
    }
}

impl From<&OverrideArgs> for ConfigOverrides {
    fn from(args: &OverrideArgs) -> Self {
        Self {
            min_support_fraction: args.min_support,
            allow_multiple_pallets: args.single_pallet.then_some(false),
            max_pallets: args.max_pallets,
            improvement_iterations: args.improvement_iterations,
            improvement_time_limit_ms: None,
            ordering_key: args.ordering.map(Into::into),
            time_limit_ms: args.time_limit,
            exhaustive_max_items: args.exhaustive,
            forbid_heavier_on_lighter: args.heavy_bottom.then_some(true),
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Pack {
            job,
            output,
            pretty,
            overrides,
        } => {
            let request = read_job(&job)?;
            let config = request.resolve_config(&ConfigOverrides::from(&overrides));
            let response = run(&request.items, &request.pallet, config);
            write_response(&response, output.as_deref(), pretty)?;
            if let Some(err) = response.error {
                bail!("job {} rejected: {}", job.display(), err);
            }
        }

        Commands::Validate { job } => {
            let request = read_job(&job)?;
            let config = request.resolve_config(&ConfigOverrides::default());
            config.validate()?;
            request.pallet.validate()?;
            let catalog = ItemCatalog::new(&request.items)?;
            println!(
                "{}: {} item line(s), {} unit(s), {:.1} total volume, pallet {}x{}x{}",
                job.display(),
                request.items.len(),
                catalog.len(),
                catalog.total_volume(),
                request.pallet.length(),
                request.pallet.width(),
                request.pallet.max_height()
            );
        }

        Commands::Demo {
            random,
            seed,
            pretty,
            overrides,
        } => {
            let items = match random {
                Some(n) => random_load(n, seed),
                None => sample_load(),
            };
            let pallet = PalletSpec::new(120.0, 100.0, 150.0, 1000.0);
            let config = ConfigOverrides::from(&overrides).apply(PackConfig::default());
            let response = run(&items, &pallet, config);
            write_response(&response, None, pretty)?;
        }
    }

    Ok(())
}

fn read_job(path: &Path) -> anyhow::Result<JobRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read job file {}", path.display()))?;
    let request: JobRequest = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse job file {}", path.display()))?;
    if let Some(version) = &request.version {
        if version != job::API_VERSION {
            log::warn!(
                "job written for version {}, running {}",
                version,
                job::API_VERSION
            );
        }
    }
    Ok(request)
}

fn run(items: &[Item], pallet: &PalletSpec, config: PackConfig) -> JobResponse {
    let start = Instant::now();
    let packer = PalletPacker::new(config);
    let progress: ProgressCallback = Box::new(|info| {
        log::debug!(
            "[{}] {}/{} placed on {} pallet(s), utilization {:.3}",
            info.phase,
            info.items_placed,
            info.total_items,
            info.pallets_used,
            info.utilization
        );
    });

    match packer.pack_with_progress(items, pallet, progress) {
        Ok(session) => {
            let report = format(&session);
            log::info!(
                "{} item(s) on {} pallet(s), {} unplaced, utilization {:.1}%",
                report.summary.items_placed,
                report.summary.pallets_used,
                report.summary.items_unplaced,
                report.summary.volume_utilization * 100.0
            );
            JobResponse::success(report, start.elapsed().as_millis() as u64)
        }
        Err(e) => {
            log::error!("job rejected: {}", e);
            JobResponse::error(e.to_string())
        }
    }
}

fn write_response(response: &JobResponse, output: Option<&Path>, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(response)?
    } else {
        serde_json::to_string(response)?
    };
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            log::info!("plan written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// The reference load: heavy bases, a flat light item that must go on top,
/// a small dense anvil, fillers and a tall item.
fn sample_load() -> Vec<Item> {
    vec![
        Item::new("Heavy1", 45.0, 45.0, 20.0, 98.0),
        Item::new("Heavy2", 45.0, 45.0, 20.0, 99.0),
        Item::new("Heavy3", 45.0, 45.0, 20.0, 101.0),
        Item::new("Heavy4", 45.0, 45.0, 20.0, 97.0),
        Item::new("Flat", 60.0, 60.0, 5.0, 20.0),
        Item::new("Anvil", 10.0, 10.0, 10.0, 50.0),
        Item::new("Med1", 20.0, 20.0, 20.0, 10.0),
        Item::new("Med2", 20.0, 20.0, 20.0, 10.0),
        Item::new("Tall", 10.0, 10.0, 60.0, 15.0),
    ]
}

fn random_load(n: usize, seed: u64) -> Vec<Item> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let item = Item::new(
                format!("R{}", i),
                rng.gen_range(10.0..60.0),
                rng.gen_range(10.0..60.0),
                rng.gen_range(5.0..50.0),
                rng.gen_range(1.0..80.0),
            );
            if rng.gen_bool(0.1) {
                item.with_stack_class(StackClass::NonStackable)
            } else {
                item
            }
        })
        .collect()
}
