use anyhow::{bail, Context, Result};
use clap::Parser;
use lattice::{EnvironmentMode, HostMesh, Lattice, LatticeConfig};
use log::{info, warn};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::PathBuf,
    str::FromStr,
};

mod obj;
mod summary;

use summary::RunSummary;

/// `RXxRY`, e.g. `64x48`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResolutionArg {
    x: u32,
    y: u32,
}

impl FromStr for ResolutionArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected RXxRY, got '{s}'"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|e| format!("bad resolution component '{v}': {e}"))
        };
        Ok(Self {
            x: parse(x)?,
            y: parse(y)?,
        })
    }
}

/// `TICK:RXxRY`: switch resolution before the given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResizeAt {
    tick: u32,
    resolution: ResolutionArg,
}

impl FromStr for ResizeAt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tick, res) = s
            .split_once(':')
            .ok_or_else(|| format!("expected TICK:RXxRY, got '{s}'"))?;
        Ok(Self {
            tick: tick
                .trim()
                .parse()
                .map_err(|e| format!("bad tick '{tick}': {e}"))?,
            resolution: res.parse()?,
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "latticegen", version, about = "Run the lattice generator headless")]
struct Args {
    /// JSON config file; individual flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grid cells, `RXxRY` (each axis is raised to at least 3).
    #[arg(long)]
    resolution: Option<ResolutionArg>,

    /// World-space size of the lattice.
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    extent: Option<Vec<f32>>,

    #[arg(long)]
    frequency: Option<f32>,

    #[arg(long)]
    octaves: Option<u32>,

    #[arg(long)]
    amplitude: Option<f32>,

    /// Noise phase advance per second of animation time.
    #[arg(long)]
    animation: Option<f32>,

    #[arg(long)]
    seed: Option<u32>,

    #[arg(long, default_value_t = 120)]
    ticks: u32,

    /// Animation time step per tick, seconds.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Worker threads (default: one per logical CPU).
    #[arg(long)]
    threads: Option<usize>,

    /// Items handed to a worker at a time.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Change resolution mid-run, `TICK:RXxRY`; may be repeated.
    #[arg(long)]
    resize_at: Vec<ResizeAt>,

    /// Write the final frame as Wavefront OBJ.
    #[arg(long)]
    obj_out: Option<PathBuf>,

    /// Print the effective config as JSON and exit.
    #[arg(long, default_value_t = false)]
    dump_config: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn load_config(args: &Args) -> Result<LatticeConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            LatticeConfig::from_json_reader(BufReader::new(file))
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => LatticeConfig::default(),
    };

    if let Some(r) = args.resolution {
        config.set_resolution(r.x, r.y);
    }
    if let Some(e) = &args.extent {
        config.set_extent(e[0], e[1]);
    }
    if let Some(f) = args.frequency {
        config.set_noise_frequency(f);
    }
    if let Some(o) = args.octaves {
        config.set_noise_octaves(o);
    }
    if let Some(a) = args.amplitude {
        config.set_noise_amplitude(a);
    }
    if let Some(a) = args.animation {
        config.set_noise_animation(a);
    }
    if let Some(s) = args.seed {
        config.set_seed(s);
    }
    Ok(config)
}

fn run(args: &Args, config: LatticeConfig) -> Result<RunSummary> {
    let mut lattice = Lattice::new(config, HostMesh::new(), EnvironmentMode::Headless, args.threads)?;
    if let Some(batch) = args.batch_size {
        lattice.set_batch_size(batch);
    }
    info!(
        "running {} ticks of {} on {} workers (batch {})",
        args.ticks,
        lattice.config().resolution(),
        lattice.threads(),
        lattice.batch_size()
    );

    for r in args.resize_at.iter().filter(|r| r.tick >= args.ticks) {
        warn!("--resize-at {}:{}x{} is past the last tick", r.tick, r.resolution.x, r.resolution.y);
    }

    let mut summary = RunSummary::default();
    for tick in 0..args.ticks {
        for r in args.resize_at.iter().filter(|r| r.tick == tick) {
            lattice.config_mut().set_resolution(r.resolution.x, r.resolution.y);
            info!("tick {tick}: resolution -> {}", lattice.config().resolution());
        }

        let time = tick as f32 * args.dt;
        let report = lattice
            .tick(time)
            .with_context(|| format!("tick {tick} (t = {time:.3})"))?;
        summary.record(&report);
    }
    summary.mesh_writes = Some(lattice.mesh().stats().into());

    if let Some(path) = &args.obj_out {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        obj::write_obj(BufWriter::new(file), &lattice.mesh().vertices())
            .with_context(|| format!("writing {}", path.display()))?;
        info!("wrote {}", path.display());
    }

    lattice.release();
    Ok(summary)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let args = Args::parse();
    if args.dt < 0.0 || !args.dt.is_finite() {
        bail!("--dt must be a finite, non-negative number of seconds");
    }
    let config = load_config(&args)?;

    if args.dump_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    let summary = run(&args, config)?;
    summary.log();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}
