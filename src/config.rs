//! Workflow configuration.
//!
//! [`WorkflowConfig`] holds every tunable parameter of the artifact-removal
//! workflow.  The defaults reproduce the classic MNE tutorial run on the
//! `sample_audvis_raw.fif` recording.

use crate::channels::ChannelType;
use crate::ica::IcaParams;

/// Channels shown before/after cleaning: frontal magnetometers and the first
/// ten EEG electrodes.
pub const DEFAULT_ARTIFACT_REGEXP: &str = r"(MEG [12][45][123]1|EEG 00.)";

/// Configuration for the full cleaning workflow.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use artica::{IcaParams, WorkflowConfig};
///
/// let cfg = WorkflowConfig {
///     crop_tmax: Some(60.0),                  // first minute only
///     ica: IcaParams { n_components: 20, ..IcaParams::default() },
///     exclude: vec![0],
///     ..WorkflowConfig::default()
/// };
/// assert_eq!(cfg.hp_freq, Some(1.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Start of the analysed window in seconds.
    ///
    /// Default: `0.0`.
    pub crop_tmin: f64,

    /// End of the analysed window in seconds; `None` keeps the whole
    /// recording.  The kept samples are `[round(tmin·sfreq), floor(tmax·sfreq))`,
    /// and an end past the recording is an error.
    ///
    /// Default: `Some(120.0)`.
    pub crop_tmax: Option<f64>,

    /// Channel types kept after loading, in file order.
    ///
    /// Default: magnetometers, EEG, stimulus and EOG.
    pub picks: Vec<ChannelType>,

    /// Extra channels to mark bad before fitting.
    ///
    /// Name matching is case-insensitive and ignores spaces
    /// (e.g. `"meg2443"` matches `"MEG 2443"`).  Bad channels are never
    /// used to fit the decomposition.
    ///
    /// Default: `[]`.
    pub bads: Vec<String>,

    /// High-pass cutoff of the copy used for fitting, in Hz.
    ///
    /// Slow drifts reduce the independence of the sources, so the model is
    /// fitted on a filtered copy and applied to the unfiltered data.  At
    /// 1 Hz the Hamming design uses a 1 Hz transition band and
    /// `⌈3.3 · sfreq⌉` taps (rounded to odd).
    ///
    /// Default: `Some(1.0)` Hz.
    pub hp_freq: Option<f64>,

    /// Optional low-pass cutoff of the fitting copy in Hz.
    ///
    /// Default: `None`.
    pub lp_freq: Option<f64>,

    /// Decomposition parameters (15 components, `max_iter = auto`, seed 97).
    pub ica: IcaParams,

    /// Components removed during cleaning.
    ///
    /// This is the outcome of visual inspection of the sample recording
    /// (component 0 is ocular, component 1 cardiac) and must be revisited
    /// for any other recording or seed.
    ///
    /// Default: `[0, 1]`.
    pub exclude: Vec<usize>,

    /// Components summarised for inspection.
    ///
    /// Default: `[0, 1, 4]`.
    pub inspect: Vec<usize>,

    /// Whether to build averaged ocular/cardiac responses before fitting.
    ///
    /// Default: `true`.
    pub artifact_evoked: bool,

    /// Artifact epoch window around each detected event, in seconds
    /// (both ends inclusive).
    ///
    /// Default: `(-0.5, 0.5)`.
    pub epoch_window: (f64, f64),

    /// Baseline of the averaged artifact responses; `None` is the epoch edge.
    ///
    /// Default: `(None, Some(-0.2))`.
    pub baseline: (Option<f64>, Option<f64>),

    /// Channels compared before and after cleaning.
    ///
    /// Default: [`DEFAULT_ARTIFACT_REGEXP`].
    pub artifact_regexp: String,
}

impl Default for WorkflowConfig {
    /// 0–120 s · mag/eeg/stim/eog · 1 Hz HP · 15 components · exclude `[0, 1]`.
    fn default() -> Self {
        Self {
            crop_tmin: 0.0,
            crop_tmax: Some(120.0),
            picks: vec![ChannelType::Mag, ChannelType::Eeg, ChannelType::Stim, ChannelType::Eog],
            bads: vec![],
            hp_freq: Some(1.0),
            lp_freq: None,
            ica: IcaParams::default(),
            exclude: vec![0, 1],
            inspect: vec![0, 1, 4],
            artifact_evoked: true,
            epoch_window: (-0.5, 0.5),
            baseline: (None, Some(-0.2)),
            artifact_regexp: DEFAULT_ARTIFACT_REGEXP.to_string(),
        }
    }
}

impl WorkflowConfig {
    /// Whether `name` is listed in [`bads`](Self::bads).
    ///
    /// ```
    /// use artica::WorkflowConfig;
    /// let cfg = WorkflowConfig { bads: vec!["meg2443".into()], ..WorkflowConfig::default() };
    /// assert!(cfg.is_bad("MEG 2443"));
    /// assert!(!cfg.is_bad("MEG 2442"));
    /// ```
    pub fn is_bad(&self, name: &str) -> bool {
        let norm = |s: &str| s.replace(' ', "").to_lowercase();
        self.bads.iter().any(|b| norm(b) == norm(name))
    }
}
