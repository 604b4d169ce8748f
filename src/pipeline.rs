//! The artifact-removal workflow as explicit stages.
//!
//! ```text
//! load ─→ artifact_evoked (eog, ecg) ─→ prefilter ─→ fit_ica
//!      ─→ inspect_components ─→ select_components ─→ clean ─→ compare
//! ```
//!
//! Every stage takes the values it needs and returns new ones; nothing is
//! shared or mutated behind the caller's back.  The original recording is
//! borrowed immutably by every stage after `load`.
use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;
use std::time::Instant;

use crate::channels::{pick_channels_regexp, ChannelType};
use crate::config::WorkflowConfig;
use crate::epochs::{create_ecg_epochs, create_eog_epochs, Evoked};
use crate::fiff::open_raw;
use crate::ica::Ica;
use crate::io::StWriter;
use crate::recording::Raw;
use crate::selection::{ComponentSelector, SelectionContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Ocular,
    Cardiac,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Ocular => "eog",
            ArtifactKind::Cardiac => "ecg",
        }
    }
}

/// Open a FIF file, read the configured window, mark bads, pick channel types.
pub fn load(path: &Path, cfg: &WorkflowConfig) -> Result<Raw> {
    let fif = open_raw(path).with_context(|| format!("open {}", path.display()))?;
    log::info!(
        "{}: {} channels, {} samples at {:.3} Hz ({:.1} s)",
        path.display(), fif.info.n_chan, fif.n_times(), fif.info.sfreq, fif.duration_secs()
    );
    let mut raw = Raw::from_fif_window(&fif, cfg.crop_tmin, cfg.crop_tmax)?;
    mark_bads(&mut raw, cfg);
    raw.pick(&cfg.picks)?;
    log::info!("{}", raw.info);
    Ok(raw)
}

/// Append `cfg.bads` matches to `raw.info.bads`.
pub fn mark_bads(raw: &mut Raw, cfg: &WorkflowConfig) {
    let found: Vec<String> = raw
        .info
        .chs
        .iter()
        .map(|ch| ch.name.clone())
        .filter(|name| cfg.is_bad(name) && !raw.info.bads.contains(name))
        .collect();
    if !found.is_empty() {
        log::info!("marking bad: {}", found.join(", "));
    }
    raw.info.bads.extend(found);
}

/// Averaged, baseline-corrected response around detected artifacts.
pub fn artifact_evoked(raw: &Raw, kind: ArtifactKind, cfg: &WorkflowConfig) -> Result<Evoked> {
    let (tmin, tmax) = cfg.epoch_window;
    let epochs = match kind {
        ArtifactKind::Ocular => create_eog_epochs(raw, tmin, tmax)?,
        ArtifactKind::Cardiac => create_ecg_epochs(raw, tmin, tmax)?,
    };
    let mut evoked = epochs.average()?;
    evoked.apply_baseline(cfg.baseline)?;

    for t in ChannelType::ALL {
        if let Some((time, value)) = evoked.gfp_peak(t) {
            log::info!(
                "{} evoked (nave={}): {} GFP peak {value:.3e} at {:+.3} s",
                kind.as_str(), evoked.nave, t.label(), time
            );
        }
    }
    Ok(evoked)
}

/// Filtered copy used for fitting; the input is returned cloned when no
/// cutoff is configured.
pub fn prefilter(raw: &Raw, cfg: &WorkflowConfig) -> Result<Raw> {
    match (cfg.hp_freq, cfg.lp_freq) {
        (None, None) => Ok(raw.clone()),
        (l, h) => raw.filter(l, h),
    }
}

pub fn fit_ica(filtered: &Raw, cfg: &WorkflowConfig) -> Result<Ica> {
    let ica = cfg.ica.fit(filtered)?;
    log::info!("{ica}");
    Ok(ica)
}

/// What the inspection plots would show for one component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSummary {
    pub index:         usize,
    /// Largest |r| with any EOG channel.
    pub eog_score:     Option<f64>,
    /// Mean RMS reduction per channel type when removing only this component.
    pub rms_reduction: Vec<(ChannelType, f64)>,
}

impl ComponentSummary {
    pub fn reduction(&self, ch_type: ChannelType) -> Option<f64> {
        self.rms_reduction.iter().find(|(t, _)| *t == ch_type).map(|(_, r)| *r)
    }
}

impl fmt::Display for ComponentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ICA{:03}  |r(eog)| ", self.index)?;
        match self.eog_score {
            Some(r) => write!(f, "{r:>6.3}")?,
            None => write!(f, "{:>6}", "n/a")?,
        }
        write!(f, "  rms reduction")?;
        for (t, r) in &self.rms_reduction {
            write!(f, "  {} {:5.1} %", t.as_str(), 100.0 * r)?;
        }
        Ok(())
    }
}

/// Per-component summaries for `cfg.inspect`.  Indices beyond the fitted
/// component count are skipped with a warning.
pub fn inspect_components(ica: &Ica, original: &Raw, cfg: &WorkflowConfig) -> Result<Vec<ComponentSummary>> {
    let eog: Vec<String> = original
        .picks(&[ChannelType::Eog])
        .into_iter()
        .map(|p| original.info.chs[p].name.clone())
        .collect();
    let mut eog_scores: Vec<Vec<f64>> = Vec::with_capacity(eog.len());
    for name in &eog {
        eog_scores.push(ica.score_sources(original, name)?);
    }

    let mut out = Vec::with_capacity(cfg.inspect.len());
    for &index in &cfg.inspect {
        if index >= ica.n_components() {
            log::warn!("cannot inspect component {index}: only {} fitted", ica.n_components());
            continue;
        }
        let overlay = ica.overlay(original, &[index], &[ChannelType::Mag, ChannelType::Grad, ChannelType::Eeg])?;
        let eog_score = eog_scores
            .iter()
            .map(|s| s[index].abs())
            .fold(None, |best: Option<f64>, r| Some(best.map_or(r, |b| b.max(r))));
        let summary = ComponentSummary { index, eog_score, rms_reduction: overlay.reduction_by_type() };
        log::info!("{summary}");
        out.push(summary);
    }
    Ok(out)
}

/// Ask `selector` for the exclusion list and record it on the model.
pub fn select_components(
    ica: &mut Ica,
    filtered: &Raw,
    original: &Raw,
    cfg: &WorkflowConfig,
    selector: &dyn ComponentSelector,
) -> Result<()> {
    let exclude = {
        let ctx = SelectionContext { ica: &*ica, filtered, original, inspect: &cfg.inspect };
        selector.select(&ctx)?
    };
    ica.set_exclude(&exclude)?;
    log::info!("excluding components {:?}", ica.exclude());
    Ok(())
}

/// Cleaned copy of `original`.
pub fn clean(ica: &Ica, original: &Raw) -> Result<Raw> {
    ica.apply(original)
}

/// RMS of one channel before and after cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelChange {
    pub name:       String,
    pub rms_before: f64,
    pub rms_after:  f64,
}

/// Before/after comparison on the channels matching the artifact regexp.
#[derive(Debug, Clone, PartialEq)]
pub struct CleaningReport {
    pub channels: Vec<ChannelChange>,
    pub exclude:  Vec<usize>,
}

impl CleaningReport {
    pub fn mean_reduction(&self) -> f64 {
        let per: Vec<f64> = self
            .channels
            .iter()
            .filter(|c| c.rms_before > 0.0)
            .map(|c| 1.0 - c.rms_after / c.rms_before)
            .collect();
        if per.is_empty() { 0.0 } else { per.iter().sum::<f64>() / per.len() as f64 }
    }
}

impl fmt::Display for CleaningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "excluded components {:?}", self.exclude)?;
        writeln!(f, "{:<10} {:>12} {:>12} {:>8}", "channel", "rms before", "rms after", "change")?;
        for c in &self.channels {
            let pct = if c.rms_before > 0.0 { 100.0 * (c.rms_after / c.rms_before - 1.0) } else { 0.0 };
            writeln!(f, "{:<10} {:>12.3e} {:>12.3e} {:>+7.1}%", c.name, c.rms_before, c.rms_after, pct)?;
        }
        write!(f, "mean rms reduction {:.1} %", 100.0 * self.mean_reduction())
    }
}

pub fn compare(original: &Raw, cleaned: &Raw, cfg: &WorkflowConfig, exclude: &[usize]) -> Result<CleaningReport> {
    let picks = artifact_picks(original, cfg)?;
    let channels = picks
        .iter()
        .map(|&p| -> Result<ChannelChange> {
            let name = original.info.chs[p].name.clone();
            let after = cleaned
                .channel(&name)
                .ok_or_else(|| crate::Error::MissingChannel(name.clone()))?;
            Ok(ChannelChange {
                rms_before: rms(original.data.row(p).iter()),
                rms_after: rms(after.iter()),
                name,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let report = CleaningReport { channels, exclude: exclude.to_vec() };
    log::info!("before/after cleaning:\n{report}");
    Ok(report)
}

/// Channels matching `cfg.artifact_regexp`.
pub fn artifact_picks(raw: &Raw, cfg: &WorkflowConfig) -> Result<Vec<usize>> {
    let picks = pick_channels_regexp(&raw.ch_names(), &cfg.artifact_regexp)?;
    if picks.is_empty() {
        log::warn!("no channel matches {:?}", cfg.artifact_regexp);
    }
    Ok(picks)
}

/// Everything the workflow produced.
#[derive(Debug, Clone)]
pub struct WorkflowOutput {
    pub original:   Raw,
    pub filtered:   Raw,
    pub ica:        Ica,
    pub cleaned:    Raw,
    pub eog_evoked: Option<Evoked>,
    pub ecg_evoked: Option<Evoked>,
    pub inspected:  Vec<ComponentSummary>,
    pub report:     CleaningReport,
    /// `(stage, milliseconds)`.
    pub timings:    Vec<(&'static str, f64)>,
}

impl WorkflowOutput {
    /// Store the signals a viewer needs to redraw the comparison.
    ///
    /// Keys: `original`, `cleaned` (artifact channels), `sources`, `mixing`,
    /// `unmixing`, `times`, `evoked_eog`, `evoked_ecg`, `evoked_times`
    /// (when built), `exclude`; metadata `ch_names`, `sfreq`, `exclude`.
    pub fn write_safetensors(&self, path: &Path) -> Result<()> {
        let names: Vec<String> = self.report.channels.iter().map(|c| c.name.clone()).collect();
        let picks: Vec<usize> = names.iter().filter_map(|n| self.original.info.index_of(n)).collect();

        let mut w = StWriter::new();
        w.add_arr2("original", &self.original.get_data(&picks));
        w.add_arr2("cleaned", &self.cleaned.get_data(&picks));
        w.add_arr1("times", &self.original.times());
        w.add_arr2("sources", &self.ica.get_sources(&self.original)?);
        w.add_arr2("mixing", &self.ica.mixing);
        w.add_arr2("unmixing", &self.ica.unmixing);
        let exclude: Vec<i64> = self.ica.exclude().iter().map(|&i| i as i64).collect();
        w.add_i64("exclude", &exclude, &[exclude.len()]);
        for (key, evoked) in [("evoked_eog", &self.eog_evoked), ("evoked_ecg", &self.ecg_evoked)] {
            if let Some(ev) = evoked {
                w.add_arr2(key, &ev.data);
                w.add_arr1(&format!("{key}_times"), &ev.times);
            }
        }
        w.add_metadata("ch_names", serde_json::to_string(&names)?);
        w.add_metadata("sfreq", self.original.sfreq().to_string());
        w.add_metadata("exclude", serde_json::to_string(self.ica.exclude())?);
        w.write(path)?;
        log::info!("wrote {} tensors to {}", w.len(), path.display());
        Ok(())
    }
}

/// Load `path` and run every stage.
pub fn run(path: &Path, cfg: &WorkflowConfig, selector: &dyn ComponentSelector) -> Result<WorkflowOutput> {
    let t = Instant::now();
    let raw = load(path, cfg)?;
    let ms_load = ms_since(t);
    let mut out = run_on(raw, cfg, selector)?;
    out.timings.insert(0, ("load", ms_load));
    Ok(out)
}

/// Run every stage after loading on an in-memory recording.
pub fn run_on(original: Raw, cfg: &WorkflowConfig, selector: &dyn ComponentSelector) -> Result<WorkflowOutput> {
    let mut timings = Vec::new();

    // ── 1. Artifact responses ──────────────────────────────────────────────
    let t = Instant::now();
    let (eog_evoked, ecg_evoked) = if cfg.artifact_evoked {
        (
            Some(artifact_evoked(&original, ArtifactKind::Ocular, cfg)?),
            Some(artifact_evoked(&original, ArtifactKind::Cardiac, cfg)?),
        )
    } else {
        (None, None)
    };
    timings.push(("artifact_evoked", ms_since(t)));

    // ── 2. High-pass copy ──────────────────────────────────────────────────
    let t = Instant::now();
    let filtered = prefilter(&original, cfg)?;
    timings.push(("filter", ms_since(t)));

    // ── 3. Decomposition ───────────────────────────────────────────────────
    let t = Instant::now();
    let mut ica = fit_ica(&filtered, cfg)?;
    timings.push(("fit_ica", ms_since(t)));

    // ── 4. Inspection + exclusion ──────────────────────────────────────────
    let t = Instant::now();
    let inspected = inspect_components(&ica, &original, cfg)?;
    select_components(&mut ica, &filtered, &original, cfg, selector)?;
    timings.push(("select", ms_since(t)));

    // ── 5. Clean + compare ─────────────────────────────────────────────────
    let t = Instant::now();
    let cleaned = clean(&ica, &original)?;
    let report = compare(&original, &cleaned, cfg, ica.exclude())?;
    timings.push(("clean", ms_since(t)));

    let line: Vec<String> = timings.iter().map(|(s, ms)| format!("{s}={ms:.1}ms")).collect();
    log::info!("TIMING {}", line.join(" "));

    Ok(WorkflowOutput {
        original,
        filtered,
        ica,
        cleaned,
        eog_evoked,
        ecg_evoked,
        inspected,
        report,
        timings,
    })
}

fn ms_since(t: Instant) -> f64 {
    t.elapsed().as_secs_f64() * 1000.0
}

fn rms<'a>(x: impl Iterator<Item = &'a f64>) -> f64 {
    let (sum, n) = x.fold((0.0, 0usize), |(s, n), v| (s + v * v, n + 1));
    if n == 0 { 0.0 } else { (sum / n as f64).sqrt() }
}
