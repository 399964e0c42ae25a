//! court-keypoints CLI: reference masks, training targets and heatmap
//! post-processing.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use court_keypoints::core::Segment;
use court_keypoints::io::{
    gray_view, load_dataset, load_heatmap_channels, save_gray, save_heatmap_channels, write_report,
    DecodeReport, EncodeBatchReport, EncodeSampleReport, PipelineConfig,
};
use court_keypoints::pipeline::BatchStats;
use court_keypoints::reference::{build_reference_mask, CourtKind, CourtReferenceModel, CourtSpec};
use serde::Serialize;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "court-keypoints")]
#[command(about = "Court landmark heatmap encoding, decoding and homography reconciliation")]
#[command(version)]
struct Cli {
    /// Log level: error, warn, info, debug, trace.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit JSON log lines (requires the `tracing` feature).
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CourtArg {
    Pickleball,
    Tennis,
}

impl From<CourtArg> for CourtKind {
    fn from(arg: CourtArg) -> Self {
        match arg {
            CourtArg::Pickleball => CourtKind::Pickleball,
            CourtArg::Tennis => CourtKind::Tennis,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render the reference court mask.
    Reference {
        #[arg(long, value_enum, default_value_t = CourtArg::Pickleball)]
        court: CourtArg,

        /// Output PNG path.
        #[arg(long)]
        output: PathBuf,

        /// Also write reference landmark coordinates (JSON).
        #[arg(long)]
        points: Option<PathBuf>,
    },

    /// Build heatmap training targets for an annotation file.
    Encode {
        /// Pipeline config (JSON).
        #[arg(long)]
        config: PathBuf,

        /// Annotations: JSON array of `{ "id", "kps" }`.
        #[arg(long)]
        dataset: PathBuf,

        /// One sub-directory of channel PNGs per sample plus `encode_report.json`.
        #[arg(long)]
        output_dir: PathBuf,

        /// Process at most this many samples.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Decode predicted channel PNGs into landmarks.
    Decode {
        /// Pipeline config (JSON).
        #[arg(long)]
        config: PathBuf,

        /// Directory holding `channel_00.png` .. `channel_KK.png`.
        #[arg(long)]
        heatmaps: PathBuf,

        /// Output report path (JSON).
        #[arg(long)]
        output: PathBuf,

        /// Source frame, used for keypoint refinement.
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ReferencePoints {
    court: CourtSpec,
    canvas_size: (usize, usize),
    landmarks: Vec<[f64; 2]>,
    center: Option<[f64; 2]>,
    lines: Vec<(&'static str, Segment)>,
}

#[cfg(feature = "tracing")]
fn init_logging(level: &str, json: bool) -> CliResult<()> {
    let _ = tracing_log::LogTracer::init();
    court_keypoints::core::init_tracing(json, level);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: &str, json: bool) -> CliResult<()> {
    court_keypoints::core::init_with_level(court_keypoints::core::parse_level_filter(level))?;
    if json {
        log::warn!("--json-logs needs the `tracing` feature; using plain logs");
    }
    Ok(())
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Reference {
            court,
            output,
            points,
        } => run_reference(court.into(), &output, points.as_deref()),
        Commands::Encode {
            config,
            dataset,
            output_dir,
            limit,
        } => run_encode(&config, &dataset, &output_dir, limit),
        Commands::Decode {
            config,
            heatmaps,
            output,
            image,
        } => run_decode(&config, &heatmaps, &output, image.as_deref()),
    }
}

fn run_reference(kind: CourtKind, output: &Path, points: Option<&Path>) -> CliResult<()> {
    let model = CourtReferenceModel::new(CourtSpec::for_kind(kind))?;
    let mask = build_reference_mask(&model);
    save_gray(&mask, output)?;
    log::info!(
        "wrote {}x{} reference mask to {}",
        mask.width,
        mask.height,
        output.display()
    );

    if let Some(path) = points {
        let report = ReferencePoints {
            court: *model.spec(),
            canvas_size: model.canvas_size(),
            landmarks: model
                .landmark_coordinates()
                .iter()
                .map(|p| [p.x, p.y])
                .collect(),
            center: model.center_point().map(|c| [c.x, c.y]),
            lines: model
                .reference_lines()
                .iter()
                .map(|l| (l.name, l.segment))
                .collect(),
        };
        write_report(&report, path)?;
        log::info!("wrote reference points to {}", path.display());
    }
    Ok(())
}

fn sample_dir_name(id: &str) -> String {
    id.replace(['/', '\\'], "_")
}

fn run_encode(
    config: &Path,
    dataset: &Path,
    output_dir: &Path,
    limit: Option<usize>,
) -> CliResult<()> {
    let cfg = PipelineConfig::load_json(config)?;
    let model = cfg.build_model()?;
    let builder = cfg.training_builder(model);
    let bounds = cfg.bounds();
    let entries = load_dataset(dataset)?;
    log::info!("loaded {} samples from {}", entries.len(), dataset.display());

    std::fs::create_dir_all(output_dir)?;
    let mut stats = BatchStats::default();
    let mut samples = Vec::new();
    for entry in entries.iter().take(limit.unwrap_or(usize::MAX)) {
        let sample = match builder.build(&entry.kps, bounds) {
            Ok(sample) => sample,
            Err(err) => {
                log::warn!("skipping sample {}: {err}", entry.id);
                continue;
            }
        };
        stats.record_training(&sample);
        let channels =
            save_heatmap_channels(&sample.heatmaps, output_dir.join(sample_dir_name(&entry.id)))?;
        samples.push(EncodeSampleReport {
            id: entry.id.clone(),
            reconcile: sample.reconcile,
            center: sample.encode.center,
            drawn: sample.encode.drawn.iter().filter(|d| **d).count(),
            landmarks: sample.landmarks,
            channels,
        });
    }

    log::info!(
        "encoded {} samples: {} reconciled, {} too few landmarks, {} degenerate, {} without center",
        stats.samples,
        stats.reconciled,
        stats.skipped_insufficient,
        stats.skipped_degenerate,
        stats.missing_center
    );

    let report_path = output_dir.join("encode_report.json");
    write_report(
        &EncodeBatchReport {
            config_path: config.display().to_string(),
            dataset_path: dataset.display().to_string(),
            stats,
            samples,
        },
        &report_path,
    )?;
    println!("wrote encode report to {}", report_path.display());
    Ok(())
}

fn run_decode(
    config: &Path,
    heatmaps: &Path,
    output: &Path,
    image: Option<&Path>,
) -> CliResult<()> {
    let cfg = PipelineConfig::load_json(config)?;
    let model = cfg.build_model()?;
    let stack = load_heatmap_channels(heatmaps, model.num_channels())?;
    let frame = image
        .map(|path| ::image::open(path).map(|img| img.to_luma8()))
        .transpose()?;
    let view = frame.as_ref().map(gray_view);

    let post = cfg.post_processor(model);
    let result = post.process(&stack, cfg.bounds(), view.as_ref())?;
    log::info!(
        "decoded {}/{} landmarks ({:?})",
        result.landmarks.count_present(),
        result.landmarks.len(),
        result.reconcile
    );

    write_report(
        &DecodeReport {
            config_path: config.display().to_string(),
            heatmaps_dir: heatmaps.display().to_string(),
            image_path: image.map(|p| p.display().to_string()),
            result,
        },
        output,
    )?;
    println!("wrote decode report to {}", output.display());
    Ok(())
}
