mod common;
use common::{synthetic_recording, write_fif, FRONTAL_EEG, FRONTAL_MAGS};

use anyhow::Result;
use artica::{pipeline, ChannelType, FixedSelection, SelectionContext, StReader, WorkflowConfig};
use std::path::{Path, PathBuf};

/// Components whose time course follows the EOG channel.
fn by_eog_correlation(ctx: &SelectionContext<'_>) -> Result<Vec<usize>> {
    let scores = ctx.ica.score_sources(ctx.original, "EOG 061")?;
    Ok(scores
        .iter()
        .enumerate()
        .filter(|(_, r)| r.abs() > 0.5)
        .map(|(i, _)| i)
        .collect())
}

fn out_of_range(ctx: &SelectionContext<'_>) -> Result<Vec<usize>> {
    Ok(vec![ctx.ica.n_components()])
}

fn recording_on_disk(dir: &Path) -> PathBuf {
    let path = dir.join("synthetic_raw.fif");
    write_fif(&path, &synthetic_recording(130.0).raw, 1500);
    path
}

// ── Full run ──────────────────────────────────────────────────────────────────

#[test]
fn default_run_on_a_fif_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = recording_on_disk(dir.path());
    let cfg = WorkflowConfig::default();

    let loaded = pipeline::load(&path, &cfg).unwrap();
    let out = pipeline::run(&path, &cfg, &FixedSelection(cfg.exclude.clone())).unwrap();

    // Loading: 0–120 s, gradiometers dropped.
    assert_eq!(out.original.n_chan(), 32);
    assert_eq!(out.original.n_times(), 18_000);
    assert_eq!(out.original, loaded, "the original recording must not change");

    // Fitting copy.
    assert_eq!(out.filtered.data.dim(), out.original.data.dim());
    assert_ne!(out.filtered.data, out.original.data);
    assert_eq!(out.filtered.info.highpass, Some(1.0));

    // Decomposition and exclusion.
    assert_eq!(out.ica.n_components(), 15);
    assert_eq!(out.ica.exclude(), &[0, 1]);
    assert_eq!(out.cleaned.data.dim(), out.original.data.dim());
    assert_ne!(out.cleaned.data, out.original.data);

    // Artifact responses.
    let eog = out.eog_evoked.as_ref().unwrap();
    let ecg = out.ecg_evoked.as_ref().unwrap();
    assert!(eog.nave >= 20, "only {} blinks averaged", eog.nave);
    assert!(ecg.nave >= 100, "only {} heartbeats averaged", ecg.nave);
    assert_eq!(eog.times.len(), 151);

    // Inspection and report.
    let inspected: Vec<usize> = out.inspected.iter().map(|c| c.index).collect();
    assert_eq!(inspected, vec![0, 1, 4]);
    assert!(out.inspected.iter().all(|c| c.eog_score.is_some()));
    for c in &out.inspected {
        let types: Vec<ChannelType> = c.rms_reduction.iter().map(|(t, _)| *t).collect();
        assert_eq!(types, [ChannelType::Mag, ChannelType::Eeg], "ICA{:03}", c.index);
        assert!(c.reduction(ChannelType::Grad).is_none());
    }
    assert_eq!(out.report.exclude, vec![0, 1]);
    assert_eq!(out.report.channels.len(), FRONTAL_MAGS.len() + 9);
    assert!(out.report.to_string().contains("excluded components [0, 1]"));

    let stages: Vec<&str> = out.timings.iter().map(|(s, _)| *s).collect();
    assert_eq!(stages, ["load", "artifact_evoked", "filter", "fit_ica", "select", "clean"]);
}

#[test]
fn selector_driven_by_eog_correlation_removes_blinks() {
    let original = synthetic_recording(60.0).raw;
    let cfg = WorkflowConfig { crop_tmax: None, artifact_evoked: false, ..WorkflowConfig::default() };
    let out = pipeline::run_on(original.clone(), &cfg, &by_eog_correlation).unwrap();

    assert_eq!(out.original, original);
    assert!(out.eog_evoked.is_none() && out.ecg_evoked.is_none());
    assert!(!out.ica.exclude().is_empty());

    let eog = out.original.channel("EOG 061").unwrap();
    for name in FRONTAL_EEG {
        let before = out.original.channel(name).unwrap();
        let after = out.cleaned.channel(name).unwrap();
        let removed = &before - &after;
        let r = pearson(removed.view(), eog);
        assert!(r.abs() > 0.8, "{name}: removed signal correlates {r:.3} with EOG");
    }
    assert!(out.report.mean_reduction() > 0.0);
}

#[test]
fn invalid_selection_stops_the_run() {
    let cfg = WorkflowConfig { crop_tmax: None, artifact_evoked: false, ..WorkflowConfig::default() };
    let err = pipeline::run_on(synthetic_recording(20.0).raw, &cfg, &out_of_range).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<artica::Error>(),
        Some(artica::Error::ExcludeOutOfRange { index: 15, n_components: 15 })
    ));
}

#[test]
fn crop_past_the_end_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short_raw.fif");
    write_fif(&path, &synthetic_recording(30.0).raw, 1500);
    let err = pipeline::run(&path, &WorkflowConfig::default(), &FixedSelection(vec![0])).unwrap_err();
    assert!(matches!(err.downcast_ref::<artica::Error>(), Some(artica::Error::InvalidCrop { .. })));
}

// ── Results on disk ───────────────────────────────────────────────────────────

#[test]
fn results_are_written_as_safetensors() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = WorkflowConfig { crop_tmax: Some(40.0), ..WorkflowConfig::default() };
    let out = pipeline::run_on(
        {
            let mut raw = synthetic_recording(45.0).raw;
            raw.crop(0.0, cfg.crop_tmax).unwrap();
            raw.pick(&cfg.picks).unwrap();
            raw
        },
        &cfg,
        &FixedSelection(vec![1, 0]),
    )
    .unwrap();

    let path = dir.path().join("results.safetensors");
    out.write_safetensors(&path).unwrap();
    let st = StReader::open(&path).unwrap();

    let n_t = out.original.n_times();
    let n_report = out.report.channels.len();
    assert_eq!(st.shape("original").unwrap(), vec![n_report, n_t]);
    assert_eq!(st.shape("cleaned").unwrap(), vec![n_report, n_t]);
    assert_eq!(st.shape("sources").unwrap(), vec![15, n_t]);
    assert_eq!(st.arr2("mixing").unwrap(), out.ica.mixing);
    assert_eq!(st.shape("evoked_eog_times").unwrap(), vec![151]);
    assert!(st.names().contains(&"evoked_ecg"));
    assert_eq!(st.metadata("exclude"), Some("[0,1]"));
    assert_eq!(st.metadata("sfreq"), Some("150"));
}

fn pearson(a: ndarray::ArrayView1<'_, f64>, b: ndarray::ArrayView1<'_, f64>) -> f64 {
    let n = a.len() as f64;
    let (ma, mb) = (a.sum() / n, b.sum() / n);
    let cov: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - ma) * (y - mb)).sum();
    let va: f64 = a.iter().map(|x| (x - ma).powi(2)).sum();
    let vb: f64 = b.iter().map(|y| (y - mb).powi(2)).sum();
    cov / (va * vb).sqrt()
}
