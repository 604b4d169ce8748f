//! Channel types and channel selection.
//!
//! [`ChannelType`] is the coarse sensor category MNE uses for `pick()`:
//! MEG sensors are split into magnetometers and gradiometers by their unit,
//! everything else maps one-to-one from the FIFF channel kind.
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use regex::Regex;

use crate::error::Error;
use crate::fiff::constants::*;
use crate::fiff::info::{ChannelInfo, MeasInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelType {
    Mag,
    Grad,
    Eeg,
    Stim,
    Eog,
    Ecg,
    Emg,
    Misc,
}

impl ChannelType {
    pub const ALL: [ChannelType; 8] = [
        ChannelType::Mag,
        ChannelType::Grad,
        ChannelType::Eeg,
        ChannelType::Stim,
        ChannelType::Eog,
        ChannelType::Ecg,
        ChannelType::Emg,
        ChannelType::Misc,
    ];

    /// Category of a FIFF channel record.
    pub fn of(ch: &ChannelInfo) -> Self {
        match ch.kind {
            FIFFV_MEG_CH if ch.unit == FIFF_UNIT_T_M => ChannelType::Grad,
            FIFFV_MEG_CH => ChannelType::Mag,
            FIFFV_EEG_CH => ChannelType::Eeg,
            FIFFV_STIM_CH => ChannelType::Stim,
            FIFFV_EOG_CH => ChannelType::Eog,
            FIFFV_ECG_CH => ChannelType::Ecg,
            FIFFV_EMG_CH => ChannelType::Emg,
            _ => ChannelType::Misc,
        }
    }

    /// Brain-signal channels: the ones filtered and decomposed.
    pub fn is_data(self) -> bool {
        matches!(self, ChannelType::Mag | ChannelType::Grad | ChannelType::Eeg)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelType::Mag => "mag",
            ChannelType::Grad => "grad",
            ChannelType::Eeg => "eeg",
            ChannelType::Stim => "stim",
            ChannelType::Eog => "eog",
            ChannelType::Ecg => "ecg",
            ChannelType::Emg => "emg",
            ChannelType::Misc => "misc",
        }
    }

    /// Plural label used in the info summary ("102 Magnetometers").
    pub fn label(self) -> &'static str {
        match self {
            ChannelType::Mag => "Magnetometers",
            ChannelType::Grad => "Gradiometers",
            ChannelType::Eeg => "EEG",
            ChannelType::Stim => "Stimulus",
            ChannelType::Eog => "EOG",
            ChannelType::Ecg => "ECG",
            ChannelType::Emg => "EMG",
            ChannelType::Misc => "misc",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        ChannelType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(Error::UnknownChannelType(s))
    }
}

/// Indices of channels whose type is in `types`, in channel order.
///
/// Mirrors `mne.pick_types`; bad channels are dropped when `exclude_bads`.
pub fn pick_types(info: &MeasInfo, types: &[ChannelType], exclude_bads: bool) -> Vec<usize> {
    info.chs
        .iter()
        .enumerate()
        .filter(|(_, ch)| types.contains(&ChannelType::of(ch)))
        .filter(|(_, ch)| !(exclude_bads && info.bads.contains(&ch.name)))
        .map(|(i, _)| i)
        .collect()
}

/// Indices of the names matching `pattern` (anchored at the start, like
/// `mne.pick_channels_regexp`).
pub fn pick_channels_regexp<S: AsRef<str>>(names: &[S], pattern: &str) -> Result<Vec<usize>> {
    let re = Regex::new(&format!("^(?:{pattern})"))
        .with_context(|| format!("invalid channel regexp {pattern:?}"))?;
    Ok(names
        .iter()
        .enumerate()
        .filter(|(_, n)| re.is_match(n.as_ref()))
        .map(|(i, _)| i)
        .collect())
}
