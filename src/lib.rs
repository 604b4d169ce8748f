//! # artica: ocular and cardiac artifact removal for MEG/EEG in pure Rust
//!
//! `artica` reads a FIFF raw recording natively, finds blink and heartbeat
//! artifacts, decomposes the data with ICA and removes the components a
//! person has judged to be artifacts.  Every numerical step follows
//! [MNE-Python](https://mne.tools): the FIR design, the FastICA fit with
//! PCA pre-whitening, and the reconstruction.
//!
//! ## Workflow
//!
//! ```text
//! sample_audvis_raw.fif
//!   │
//!   ├─ pipeline::load()          read 0–120 s, keep mag/eeg/stim/eog
//!   ├─ pipeline::artifact_evoked blink / heartbeat epochs → average → baseline
//!   ├─ pipeline::prefilter()     1 Hz high-pass on a copy
//!   ├─ pipeline::fit_ica()       PCA whitening + FastICA, 15 components, seed 97
//!   ├─ pipeline::select_components()   injected decision, default [0, 1]
//!   ├─ pipeline::clean()         subtract excluded components from a copy
//!   └─ pipeline::compare()       rms before/after on frontal channels
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use artica::{pipeline, FixedSelection, WorkflowConfig};
//! use std::path::Path;
//!
//! let cfg = WorkflowConfig::default();
//! let out = pipeline::run(
//!     Path::new("sample_audvis_raw.fif"),
//!     &cfg,
//!     &FixedSelection(cfg.exclude.clone()),
//! ).unwrap();
//!
//! println!("{}", out.ica);
//! println!("{}", out.report);
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use artica::{ChannelType, IcaParams, Raw};
//! use artica::fiff::open_raw;
//!
//! let fif = open_raw("sample_audvis_raw.fif").unwrap();
//! let mut raw = Raw::from_fif_window(&fif, 0.0, Some(60.0)).unwrap();
//! raw.pick(&[ChannelType::Mag, ChannelType::Eeg, ChannelType::Eog]).unwrap();
//!
//! let filtered = raw.filter(Some(1.0), None).unwrap();
//! let mut ica = IcaParams::default().fit(&filtered).unwrap();
//! ica.set_exclude(&[0, 1]).unwrap();
//! let cleaned = ica.apply(&raw).unwrap();
//! assert_eq!(cleaned.n_times(), raw.n_times());
//! ```

pub mod channels;
pub mod config;
pub mod epochs;
pub mod error;
pub mod events;
pub mod fiff;
pub mod filter;
pub mod ica;
pub mod io;
pub mod pipeline;
pub mod recording;
pub mod selection;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use channels::{pick_channels_regexp, pick_types, ChannelType};
pub use config::{WorkflowConfig, DEFAULT_ARTIFACT_REGEXP};
pub use epochs::{create_ecg_epochs, create_eog_epochs, Epochs, Evoked};
pub use error::Error;
pub use events::{find_ecg_events, find_eog_events, EcgEvents, Event, ECG_EVENT_ID, EOG_EVENT_ID};
pub use fiff::{open_raw, ChannelInfo, MeasInfo, RawFif};
pub use ica::{Ica, IcaParams, MaxIter, Overlay};
pub use io::{StReader, StWriter};
pub use pipeline::{run, run_on, CleaningReport, WorkflowOutput};
pub use recording::Raw;
pub use selection::{ComponentSelector, FixedSelection, SelectionContext};
