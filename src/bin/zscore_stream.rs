use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::{Receiver, bounded};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use zscore_stream::config::{Baseline, Settings};
use zscore_stream::pipeline::{self, RunSummary};
use zscore_stream::error::ShardError;
use zscore_stream::shard::{KeyedDetection, ShardPool};
use zscore_stream::sink::{JsonLinesSink, Sink, TracingSink};
use zscore_stream::stream::{SyntheticStream, ValueReader};
use zscore_stream::{RollingAnomalyDetector, metrics};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BaselineArg {
    Inclusive,
    Trailing,
}

impl From<BaselineArg> for Baseline {
    fn from(arg: BaselineArg) -> Self {
        match arg {
            BaselineArg::Inclusive => Baseline::Inclusive,
            BaselineArg::Trailing => Baseline::Trailing,
        }
    }
}

/// Flag anomalous points in a numeric stream with a rolling Z-score.
#[derive(Parser, Debug)]
#[command(name = "zscore-stream", version)]
struct Args {
    /// JSON settings file; flags override its values.
    #[arg(long, env = "ZSCORE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "ZSCORE_WINDOW_SIZE")]
    window_size: Option<usize>,

    #[arg(long, env = "ZSCORE_THRESHOLD")]
    threshold: Option<f64>,

    #[arg(long, value_enum)]
    baseline: Option<BaselineArg>,

    /// Synthetic stream length.
    #[arg(long)]
    length: Option<u64>,

    /// Run the synthetic stream until interrupted.
    #[arg(long, conflicts_with = "length")]
    unbounded: bool,

    #[arg(long, env = "ZSCORE_SEED")]
    seed: Option<u64>,

    #[arg(long)]
    noise_level: Option<f64>,

    #[arg(long)]
    anomaly_probability: Option<f64>,

    /// Read one value per line from a file, or `-` for stdin, instead of
    /// generating a synthetic stream.
    #[arg(long, conflicts_with = "streams")]
    input: Option<String>,

    /// Write JSON lines here instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[arg(long)]
    anomalies_only: bool,

    /// Log anomalies instead of writing JSON lines, in single and sharded mode.
    #[arg(long)]
    quiet: bool,

    /// Number of independent synthetic streams, routed through a shard pool.
    #[arg(long, default_value_t = 1)]
    streams: usize,

    #[arg(long, default_value_t = 4)]
    shards: usize,

    #[arg(long, default_value_t = 10_000)]
    queue_capacity: usize,

    /// Print the prometheus exposition to stderr on exit.
    #[arg(long)]
    metrics: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let settings = load_settings(&args)?;

    info!(
        window_size = settings.detector.window_size,
        threshold = settings.detector.threshold,
        baseline = ?settings.detector.baseline,
        "zscore-stream starting."
    );

    if args.streams > 1 {
        run_sharded(&args, &settings)?;
    } else {
        let summary = run_single(&args, &settings)?;
        info!(
            samples = summary.samples,
            anomalies = summary.anomalies,
            warmup = summary.warmup,
            rejected = summary.rejected,
            eps = summary.throughput().round(),
            "Done."
        );
    }

    if args.metrics {
        eprint!("{}", metrics::render());
    }
    Ok(())
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };

    if let Some(window_size) = args.window_size {
        settings.detector.window_size = window_size;
    }
    if let Some(threshold) = args.threshold {
        settings.detector.threshold = threshold;
    }
    if let Some(baseline) = args.baseline {
        settings.detector.baseline = baseline.into();
    }
    if args.unbounded {
        settings.stream.length = None;
    } else if let Some(length) = args.length {
        settings.stream.length = Some(length);
    }
    if let Some(seed) = args.seed {
        settings.stream.seed = Some(seed);
    }
    if let Some(noise_level) = args.noise_level {
        settings.stream.noise_level = noise_level;
    }
    if let Some(p) = args.anomaly_probability {
        settings.stream.anomaly_probability = p;
    }

    settings.validate().context("invalid configuration")?;
    Ok(settings)
}

fn open_output(args: &Args) -> Result<Box<dyn Write + Send>> {
    Ok(match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn run_single(args: &Args, settings: &Settings) -> Result<RunSummary> {
    let mut detector = RollingAnomalyDetector::with_config(settings.detector)?;

    let mut sink: Box<dyn Sink> = if args.quiet {
        Box::new(TracingSink)
    } else {
        Box::new(JsonLinesSink::new(open_output(args)?).anomalies_only(args.anomalies_only))
    };

    match args.input.as_deref() {
        Some(input) => {
            let reader: Box<dyn BufRead> = if input == "-" {
                Box::new(io::stdin().lock())
            } else {
                Box::new(BufReader::new(
                    File::open(input).with_context(|| format!("opening {}", input))?,
                ))
            };
            pipeline::try_run(&mut detector, ValueReader::new(reader), &mut sink)
                .with_context(|| format!("processing {}", input))
        }
        None => {
            let mut stream = SyntheticStream::new(settings.stream.clone())?;
            let summary = pipeline::run(&mut detector, stream.by_ref(), &mut sink)?;
            info!(injected = stream.injected(), "Synthetic stream exhausted.");
            Ok(summary)
        }
    }
}

fn run_sharded(args: &Args, settings: &Settings) -> Result<()> {
    let (out_tx, out_rx) = bounded::<KeyedDetection>(args.queue_capacity);
    let out = if args.quiet {
        None
    } else {
        Some(open_output(args)?)
    };
    let writer = spawn_writer(out_rx, out, args.anomalies_only)?;

    let pool = ShardPool::spawn(settings.detector, args.shards, args.queue_capacity, out_tx)?;

    let mut streams = (0..args.streams)
        .map(|i| {
            let mut config = settings.stream.clone();
            config.seed = config.seed.map(|seed| seed.wrapping_add(i as u64));
            SyntheticStream::new(config).map(|s| (format!("stream-{}", i), s))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let fed = feed_round_robin(&pool, &mut streams);
    let stopped = pool.shutdown();

    // Workers stop once the writer is gone, so its error explains a
    // disconnected pool.
    let (written, anomalies) = writer
        .join()
        .map_err(|_| anyhow::anyhow!("output writer panicked"))?
        .context("writing detections")?;
    let submitted = fed?;
    stopped?;

    let injected: u64 = streams.iter().map(|(_, s)| s.injected()).sum();
    info!(
        streams = args.streams,
        submitted, written, anomalies, injected, "Done."
    );
    Ok(())
}

/// Interleaves one sample per stream until every stream is exhausted.
fn feed_round_robin(
    pool: &ShardPool,
    streams: &mut [(String, SyntheticStream)],
) -> Result<u64, ShardError> {
    let mut submitted = 0u64;
    loop {
        let mut progressed = false;
        for (key, stream) in streams.iter_mut() {
            if let Some(value) = stream.next() {
                pool.submit(key.as_str(), value)?;
                submitted += 1;
                progressed = true;
            }
        }
        if !progressed {
            return Ok(submitted);
        }
    }
}

/// Drains keyed detections on its own thread, into `out` as JSON lines or,
/// without an output, into the log.
fn spawn_writer(
    rx: Receiver<KeyedDetection>,
    mut out: Option<Box<dyn Write + Send>>,
    anomalies_only: bool,
) -> Result<thread::JoinHandle<Result<(u64, u64)>>> {
    let handle = thread::Builder::new()
        .name("zscore-writer".into())
        .spawn(move || -> Result<(u64, u64)> {
            let mut written = 0u64;
            let mut anomalies = 0u64;
            while let Ok(keyed) = rx.recv() {
                let detection = &keyed.detection;
                if detection.is_anomaly {
                    anomalies += 1;
                }
                let Some(out) = out.as_mut() else {
                    if detection.is_anomaly {
                        warn!(
                            key = %keyed.key,
                            index = detection.index,
                            value = detection.value,
                            z_score = detection.verdict.z_score(),
                            "ANOMALY"
                        );
                    }
                    continue;
                };
                if anomalies_only && !detection.is_anomaly {
                    continue;
                }
                serde_json::to_writer(&mut *out, &keyed)?;
                out.write_all(b"\n")?;
                written += 1;
            }
            if let Some(out) = out.as_mut() {
                out.flush()?;
            }
            Ok((written, anomalies))
        })
        .context("spawning output writer")?;
    Ok(handle)
}
