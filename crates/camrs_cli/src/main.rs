//! camrs CLI: explain reference classifiers with class activation maps.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn::prelude::*;
use camrs_core::backend::NdArray;
use camrs_core::{from_host, CamModel, ClassIndex, MapShape, Seed};
use camrs_explain::{
    AttributionMap, AttributionMethod, Cam, CamMethod, IsCam, IsCamConfig, ScoreCam, ScoreCamConfig,
    SsCam, SsCamConfig,
};
use camrs_models::{ConvNet1dConfig, ConvNet2dConfig};

/// Backend used by the CLI.
type CliBackend = NdArray;

#[derive(Parser)]
#[command(name = "camrs")]
#[command(author, version)]
#[command(about = "Class activation maps for convolutional classifiers")]
#[command(long_about = "camrs: class activation maps (CAM, Score-CAM, SS-CAM, IS-CAM) for burn classifiers.

EXAMPLES:
  # List available methods
  camrs methods

  # Score-CAM on a randomly initialized 2-D conv net
  camrs explain --method scorecam --arch conv2d --height 32 --width 32 --class 3

  # SS-CAM on a 1-D conv net, tuned from a JSON config
  camrs explain --method sscam --arch conv1d --length 128 --config sscam.json

  # Write the summary to a file
  camrs explain --method iscam --output map.json")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available methods
    Methods,
    /// Compute a class activation map for a reference model
    Explain(ExplainArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Arch {
    /// 1-D conv net over (channels, length) inputs
    Conv1d,
    /// 2-D conv net over (channels, height, width) inputs
    Conv2d,
}

#[derive(clap::Args, Debug)]
struct ExplainArgs {
    /// Method: cam, scorecam, sscam, iscam
    #[arg(long, default_value = "scorecam", value_name = "METHOD")]
    method: String,

    /// Reference architecture
    #[arg(long, value_enum, default_value = "conv2d")]
    arch: Arch,

    /// Input channels
    #[arg(long, default_value = "3", value_name = "N")]
    channels: usize,

    /// Input height (conv2d)
    #[arg(long, default_value = "32", value_name = "N")]
    height: usize,

    /// Input width (conv2d)
    #[arg(long, default_value = "32", value_name = "N")]
    width: usize,

    /// Input length (conv1d)
    #[arg(long, default_value = "64", value_name = "N")]
    length: usize,

    /// Number of output classes
    #[arg(long, default_value = "10", value_name = "N")]
    classes: usize,

    /// Number of random inputs
    #[arg(long, default_value = "1", value_name = "N")]
    samples: usize,

    /// Target class, or one class per sample
    #[arg(long, default_value = "0", value_delimiter = ',', value_name = "CLASS")]
    class: Vec<usize>,

    /// Target layer (repeatable); located automatically when omitted
    #[arg(long = "layer", value_name = "NAME")]
    layers: Vec<String>,

    /// Masked inputs per forward pass
    #[arg(long, default_value = "32", value_name = "SIZE")]
    batch_size: usize,

    /// Noisy passes (sscam) or integration steps (iscam)
    #[arg(long, value_name = "N")]
    num_samples: Option<usize>,

    /// Noise standard deviation (sscam)
    #[arg(long, default_value = "2.0", value_name = "STD")]
    std: f32,

    /// Random seed for the model, the input and the noise [default: from the clock]
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// JSON method configuration, overrides the tuning flags
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the JSON summary here instead of stdout
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

/// Peak of one sample's map.
#[derive(Debug, Serialize)]
struct SampleSummary {
    peak_index: Vec<usize>,
    peak_value: f32,
    mean: f32,
}

/// Output of `camrs explain`.
#[derive(Debug, Serialize)]
struct ExplainSummary {
    method: AttributionMethod,
    perturbation_based: bool,
    extractor: String,
    target_layers: Vec<String>,
    class: ClassIndex,
    shared_class: bool,
    seed: u64,
    shape: Vec<usize>,
    samples: Vec<SampleSummary>,
    values: Vec<f32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Methods => handle_methods(),
        Commands::Explain(args) => handle_explain(args),
    }
}

fn handle_methods() -> Result<()> {
    println!("Available methods:\n");
    for method in AttributionMethod::ALL {
        let description = match method {
            AttributionMethod::Cam => "weights from the final linear layer",
            AttributionMethod::ScoreCam => "weights from masked-input class scores",
            AttributionMethod::SsCam => "Score-CAM averaged over noisy masks",
            AttributionMethod::IsCam => "Score-CAM integrated over mask intensity",
        };
        println!("  {:<10} {}", method.name(), description);
    }

    println!("\nUsage:");
    println!("  camrs explain --method <cam|scorecam|sscam|iscam> [OPTIONS]");
    Ok(())
}

fn handle_explain(args: ExplainArgs) -> Result<()> {
    let method: AttributionMethod = args.method.parse()?;
    if args.samples == 0 {
        bail!("--samples must be positive");
    }

    let class = match args.class.as_slice() {
        [single] => ClassIndex::Single(*single),
        many => ClassIndex::PerSample(many.to_vec()),
    };

    let seed = args.seed.map(Seed::new).unwrap_or_else(Seed::from_entropy);
    let device: <CliBackend as Backend>::Device = Default::default();
    CliBackend::seed(seed.value());

    tracing::info!("Explaining {:?} model with {} (seed {})", args.arch, method, seed.value());

    let summary = match args.arch {
        Arch::Conv1d => {
            let model = ConvNet1dConfig::new(args.channels, args.length, args.classes)
                .init::<CliBackend>(&device);
            let input_shape = model.input_shape();
            let input = random_input::<3>(args.samples, &input_shape, seed, &device);
            run(method, model, input, &input_shape, &class, seed, &args)?
        }
        Arch::Conv2d => {
            let model = ConvNet2dConfig::new(args.channels, args.height, args.width, args.classes)
                .init::<CliBackend>(&device);
            let input_shape = model.input_shape();
            let input = random_input::<4>(args.samples, &input_shape, seed, &device);
            run(method, model, input, &input_shape, &class, seed, &args)?
        }
    };

    let json = serde_json::to_string_pretty(&summary)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write summary to '{}'", path.display()))?;
            println!("Wrote {} summary to {}", summary.method, path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Uniform `[0, 1)` input of shape `(samples, input_shape...)`.
fn random_input<const D: usize>(
    samples: usize,
    input_shape: &[usize],
    seed: Seed,
    device: &<CliBackend as Backend>::Device,
) -> Tensor<CliBackend, D> {
    let mut dims = [samples; D];
    dims[1..].copy_from_slice(input_shape);

    let mut rng = seed.to_rng();
    let values = (0..dims.iter().product::<usize>())
        .map(|_| rng.gen::<f32>())
        .collect();

    from_host(values, dims, device)
}

fn run<M, const D: usize>(
    method: AttributionMethod,
    model: M,
    input: Tensor<CliBackend, D>,
    input_shape: &[usize],
    class: &ClassIndex,
    seed: Seed,
    args: &ExplainArgs,
) -> Result<ExplainSummary>
where
    M: CamModel<CliBackend, D>,
{
    let layers: Vec<&str> = args.layers.iter().map(String::as_str).collect();

    match method {
        AttributionMethod::Cam => {
            let extractor = Cam::new(model, &layers, None, input_shape)?;
            explain(extractor, input, class, seed)
        }
        AttributionMethod::ScoreCam => {
            let config = load_config(
                args.config.as_deref(),
                ScoreCamConfig::default().with_batch_size(args.batch_size),
            )?
            .with_input_shape(input_shape);
            explain(ScoreCam::new(model, &layers, config)?, input, class, seed)
        }
        AttributionMethod::SsCam => {
            let mut flags = SsCamConfig::default()
                .with_batch_size(args.batch_size)
                .with_std(args.std)
                .with_seed(seed);
            if let Some(n) = args.num_samples {
                flags = flags.with_num_samples(n);
            }
            let config = load_config(args.config.as_deref(), flags)?.with_input_shape(input_shape);
            explain(SsCam::new(model, &layers, config)?, input, class, seed)
        }
        AttributionMethod::IsCam => {
            let mut flags = IsCamConfig::default().with_batch_size(args.batch_size);
            if let Some(n) = args.num_samples {
                flags = flags.with_num_samples(n);
            }
            let config = load_config(args.config.as_deref(), flags)?.with_input_shape(input_shape);
            explain(IsCam::new(model, &layers, config)?, input, class, seed)
        }
    }
}

/// Read a method config from JSON, or keep the one built from flags.
fn load_config<C: DeserializeOwned>(path: Option<&Path>, flags: C) -> Result<C> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config '{}'", path.display()))?;
            let config = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse config '{}'", path.display()))?;
            tracing::info!("Loaded method config from {}", path.display());
            Ok(config)
        }
        None => Ok(flags),
    }
}

fn explain<E, M, const D: usize>(
    mut extractor: E,
    input: Tensor<CliBackend, D>,
    class: &ClassIndex,
    seed: Seed,
) -> Result<ExplainSummary>
where
    E: CamMethod<CliBackend, M, D> + Display,
    M: CamModel<CliBackend, D>,
{
    tracing::info!("Running {}", extractor);

    let logits = extractor.forward(input);
    tracing::debug!("Logits shape: {:?}", logits.dims());

    let map = extractor.explain(class)?;
    summarize(
        &map,
        extractor.to_string(),
        extractor.core().target_layers().to_vec(),
        seed,
    )
}

fn summarize<const D: usize>(
    map: &AttributionMap<CliBackend, D>,
    extractor: String,
    target_layers: Vec<String>,
    seed: Seed,
) -> Result<ExplainSummary> {
    let map_shape = MapShape::from_dims(&map.shape())?;
    let values = map.to_host()?;
    if values.len() != map_shape.numel() {
        bail!("Map {} holds {} values", map_shape, values.len());
    }
    let spatial = map_shape.spatial();

    let samples = values
        .chunks(map_shape.spatial_numel().max(1))
        .map(|sample| {
            let (peak, peak_value) = sample
                .iter()
                .copied()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best });
            SampleSummary {
                peak_index: unravel(peak, spatial),
                peak_value,
                mean: sample.iter().sum::<f32>() / sample.len() as f32,
            }
        })
        .collect();

    let class = map.target.clone().unwrap_or(ClassIndex::Single(0));
    Ok(ExplainSummary {
        method: map.method,
        perturbation_based: map.method.is_perturbation_based(),
        extractor,
        target_layers,
        shared_class: class.is_single(),
        class,
        seed: seed.value(),
        shape: map_shape.dims(),
        samples,
        values,
    })
}

/// Row-major flat index to per-axis coordinates.
fn unravel(mut index: usize, dims: &[usize]) -> Vec<usize> {
    let mut coords = vec![0; dims.len()];
    for (axis, &dim) in dims.iter().enumerate().rev() {
        coords[axis] = index % dim.max(1);
        index /= dim.max(1);
    }
    coords
}
