use super::CliError;
use super::helpers::*;
use iron_core::chip::Chip;
use iron_core::domain::IronError;
use iron_core::fit::ReplayFitter;
use iron_core::floor::{
    floor_probe, floor_probeset, floor_probeset_non_zero_to_one, floor_probeset_to_min_non_zero,
    unlog_probeset,
};
use iron_core::pairwise::PairwiseNormalizer;
use iron_core::summary::{WeightedMean, probeset_weighted_mean};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(super) enum Level {
    Probe,
    Probeset,
}

#[derive(clap::Args)]
pub(super) struct NormalizeArgs {
    /// Chip set JSON (layout plus chips)
    #[arg(long)]
    chipset: PathBuf,

    /// Model chip JSON
    #[arg(long)]
    model: PathBuf,

    /// Recorded fit outcomes keyed by input chip file stem
    #[arg(long)]
    scales: PathBuf,

    /// Normalize probe intensities or probeset summaries
    #[arg(long, value_enum, default_value = "probeset")]
    level: Level,

    /// Normalization config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Treat probeset values as log2 regardless of the config
    #[arg(long)]
    unlog: bool,

    /// Normalized chip set output path
    #[arg(long)]
    output: PathBuf,

    /// JSON report output path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Args)]
#[command(group(clap::ArgGroup::new("mode").required(true).args(["value", "min_non_zero", "non_zero_to_one"])))]
pub(super) struct FloorArgs {
    /// Chip set JSON (layout plus chips)
    #[arg(long)]
    chipset: PathBuf,

    /// Floor probe intensities or probeset summaries
    #[arg(long, value_enum, default_value = "probeset")]
    level: Level,

    /// Clamp every value below this floor up to it
    #[arg(long)]
    value: Option<f64>,

    /// Raise probesets to each chip's smallest non-zero value
    #[arg(long)]
    min_non_zero: bool,

    /// Raise non-zero probesets below 1 to 1
    #[arg(long)]
    non_zero_to_one: bool,

    /// Normalization config JSON (supplies the non-zero threshold)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Floored chip set output path
    #[arg(long)]
    output: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct UnlogArgs {
    /// Chip set JSON (layout plus chips)
    #[arg(long)]
    chipset: PathBuf,

    /// Linear-scale chip set output path
    #[arg(long)]
    output: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct WeightedMeanArgs {
    /// Chip set JSON (layout plus chips)
    #[arg(long)]
    chipset: PathBuf,

    /// JSON summary output path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChipSummary {
    filename: String,
    #[serde(flatten)]
    summary: WeightedMean,
}

pub(super) fn run_normalize_command(args: NormalizeArgs) -> Result<i32, CliError> {
    let config = load_config(args.config.as_deref())?;
    let mut options = config.to_pairwise_options();
    options.unlog_inputs |= args.unlog;

    let mut set = load_chip_set(&args.chipset)?;
    let model: Chip = read_json(&args.model, "model chip")?;
    let fitter: ReplayFitter = read_json(&args.scales, "recorded scale factors")?;

    let mut normalizer = PairwiseNormalizer::new(fitter, options)
        .with_diagnostic_sink(|diagnostic| eprintln!("{diagnostic}"));
    let report = match args.level {
        Level::Probe => normalizer.normalize_probes(&mut set, &model),
        Level::Probeset => normalizer.normalize_probesets(&mut set, &model),
    }
    .map_err(CliError::Compute)?;

    write_json(&args.output, &set, "normalized chip set")?;
    if let Some(report_path) = &args.report {
        write_json(report_path, &report, "normalization report")?;
    }

    info!(
        chips = set.len(),
        scaled = report.scaled_values,
        level = %report.granularity,
        "normalization finished"
    );
    Ok(0)
}

pub(super) fn run_floor_command(args: FloorArgs) -> Result<i32, CliError> {
    let config = load_config(args.config.as_deref())?;
    let mut set = load_chip_set(&args.chipset)?;
    let threshold = config.min_non_zero_threshold;

    match (args.level, args.value) {
        (Level::Probe, Some(value)) => floor_probe(&mut set, value).map_err(CliError::Compute)?,
        (Level::Probeset, Some(value)) => floor_probeset(&mut set, value),
        (Level::Probe, None) => {
            return Err(CliError::Usage(
                "probe-level floors require --value".to_string(),
            ));
        }
        (Level::Probeset, None) if args.min_non_zero => {
            floor_probeset_to_min_non_zero(&mut set, threshold)
        }
        (Level::Probeset, None) => floor_probeset_non_zero_to_one(&mut set, threshold),
    }

    write_json(&args.output, &set, "floored chip set")?;
    Ok(0)
}

pub(super) fn run_unlog_command(args: UnlogArgs) -> Result<i32, CliError> {
    let mut set = load_chip_set(&args.chipset)?;
    unlog_probeset(&mut set);
    write_json(&args.output, &set, "linear chip set")?;
    Ok(0)
}

pub(super) fn run_weighted_mean_command(args: WeightedMeanArgs) -> Result<i32, CliError> {
    let set = load_chip_set(&args.chipset)?;
    if set.is_empty() {
        return Err(CliError::Compute(IronError::input_validation(
            "INPUT.CLI_EMPTY_CHIPSET",
            format!("chip set '{}' contains no chips", args.chipset.display()),
        )));
    }

    let mut summaries = Vec::with_capacity(set.len());
    for chip in &set.chips {
        let summary = probeset_weighted_mean(chip).map_err(CliError::Compute)?;
        println!("{}\t{:.6}", chip.filename, summary.value);
        summaries.push(ChipSummary {
            filename: chip.filename.clone(),
            summary,
        });
    }

    if let Some(output) = &args.output {
        write_json(output, &summaries, "weighted mean summary")?;
    }
    Ok(0)
}
