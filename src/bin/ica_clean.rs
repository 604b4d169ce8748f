/// ica_clean: remove ocular and cardiac artifacts from a FIF recording with ICA.
///
/// Loads the first `--tmax` seconds, averages blink and heartbeat epochs,
/// fits ICA on a high-passed copy, removes the `--exclude` components from
/// the unfiltered data and prints a before/after table.  With `--output`,
/// the signals needed to redraw the comparison are written as safetensors.
///
/// Logging goes through `env_logger` (`RUST_LOG=debug` for per-iteration
/// detail).
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use artica::{pipeline, ChannelType, FixedSelection, IcaParams, MaxIter, WorkflowConfig};

#[derive(Parser, Debug)]
#[command(name = "ica_clean", about = "ICA artifact removal for MEG/EEG (FIFF)")]
struct Args {
    /// Input raw FIF file.
    #[arg(long)]
    fif: PathBuf,

    /// Start of the analysed window (s).
    #[arg(long, default_value_t = 0.0)]
    tmin: f64,

    /// End of the analysed window (s).
    #[arg(long, default_value_t = 120.0)]
    tmax: f64,

    /// Channel types to keep.
    #[arg(long, value_delimiter = ',', default_value = "mag,eeg,stim,eog")]
    picks: Vec<ChannelType>,

    /// Extra bad channels (comma-separated names).
    #[arg(long, value_delimiter = ',')]
    bads: Vec<String>,

    /// High-pass cutoff for the fitting copy (Hz).
    #[arg(long, default_value_t = 1.0)]
    hp: f64,

    /// Optional low-pass cutoff for the fitting copy (Hz).
    #[arg(long)]
    lp: Option<f64>,

    /// Number of ICA components.
    #[arg(long, default_value_t = 15)]
    n_components: usize,

    /// FastICA iteration cap ("auto" or a count).
    #[arg(long, default_value = "auto")]
    max_iter: MaxIter,

    /// Random seed of the FastICA initialisation.
    #[arg(long, default_value_t = 97)]
    seed: u64,

    /// Components to remove (comma-separated; `--exclude` alone removes none).
    #[arg(long, value_delimiter = ',', num_args = 0.., default_value = "0,1")]
    exclude: Vec<usize>,

    /// Remove no component (same as an empty `--exclude`).
    #[arg(long, conflicts_with = "exclude")]
    no_exclude: bool,

    /// Components to summarise for inspection (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "0,1,4")]
    inspect: Vec<usize>,

    /// Skip the averaged blink/heartbeat responses.
    #[arg(long)]
    no_artifact_evoked: bool,

    /// Channels compared before/after cleaning.
    #[arg(long, default_value = artica::DEFAULT_ARTIFACT_REGEXP)]
    regexp: String,

    /// Optional safetensors dump of the results.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn workflow_config(args: &Args) -> WorkflowConfig {
    WorkflowConfig {
        crop_tmin: args.tmin,
        crop_tmax: Some(args.tmax),
        picks: args.picks.clone(),
        bads: args.bads.clone(),
        hp_freq: Some(args.hp),
        lp_freq: args.lp,
        ica: IcaParams {
            n_components: args.n_components,
            max_iter: args.max_iter,
            random_state: Some(args.seed),
            ..IcaParams::default()
        },
        exclude: if args.no_exclude { Vec::new() } else { args.exclude.clone() },
        inspect: args.inspect.clone(),
        artifact_evoked: !args.no_artifact_evoked,
        artifact_regexp: args.regexp.clone(),
        ..WorkflowConfig::default()
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = workflow_config(&args);

    let selector = FixedSelection(cfg.exclude.clone());
    let out = pipeline::run(&args.fif, &cfg, &selector)?;

    println!("{}", out.original.info);
    println!("{}", out.ica);
    for c in &out.inspected {
        println!("{c}");
    }
    println!("{}", out.report);
    for (stage, ms) in &out.timings {
        eprintln!("  {stage:<16} {ms:>10.1} ms");
    }

    if let Some(path) = &args.output {
        out.write_safetensors(path)?;
        eprintln!("Written → {}", path.display());
    }
    Ok(())
}
