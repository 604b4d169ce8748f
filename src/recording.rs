//! In-memory continuous recording (MNE's preloaded `Raw`).
//!
//! [`Raw`] owns `[n_chan, n_times]` samples in SI units together with the
//! measurement info.  Restriction (`crop`, `pick`) happens in place;
//! `filter` returns a new recording so the caller keeps its original.
use anyhow::{bail, Context, Result};
use ndarray::{s, Array1, Array2, ArrayView1, Axis};

use crate::channels::{pick_types, ChannelType};
use crate::error::Error;
use crate::fiff::{MeasInfo, RawFif};
use crate::filter::{apply_fir_zero_phase, design_fir};

#[derive(Debug, Clone, PartialEq)]
pub struct Raw {
    pub info:       MeasInfo,
    /// `[n_chan, n_times]`.
    pub data:       Array2<f64>,
    /// Index of the first sample in acquisition time.
    pub first_samp: u64,
}

impl Raw {
    pub fn new(info: MeasInfo, data: Array2<f64>, first_samp: u64) -> Result<Self> {
        if data.nrows() != info.n_chan {
            bail!("data has {} rows but info lists {} channels", data.nrows(), info.n_chan);
        }
        Ok(Raw { info, data, first_samp })
    }

    /// Load only the `[tmin, tmax)` window of an opened FIF file
    /// (`raw.crop(...).load_data()` without reading the rest).
    pub fn from_fif_window(fif: &RawFif, tmin: f64, tmax: Option<f64>) -> Result<Self> {
        let (start, end) = crop_window(fif.n_times(), fif.info.sfreq, tmin, tmax)?;
        let data = fif
            .read_slice(start, end)
            .with_context(|| format!("load samples {start}..{end} of {}", fif.path.display()))?;
        Raw::new(fif.info.clone(), data, fif.first_samp + start as u64)
    }

    #[inline]
    pub fn n_chan(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn sfreq(&self) -> f64 {
        self.info.sfreq
    }

    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.sfreq()
    }

    /// Sample times in seconds relative to the first kept sample.
    pub fn times(&self) -> Array1<f64> {
        let sfreq = self.sfreq();
        Array1::from_shape_fn(self.n_times(), |i| i as f64 / sfreq)
    }

    pub fn ch_names(&self) -> Vec<&str> {
        self.info.ch_names()
    }

    pub fn channel(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.info.index_of(name).map(|i| self.data.row(i))
    }

    /// Copy of the selected rows.
    pub fn get_data(&self, picks: &[usize]) -> Array2<f64> {
        self.data.select(Axis(0), picks)
    }

    pub fn picks(&self, types: &[ChannelType]) -> Vec<usize> {
        pick_types(&self.info, types, false)
    }

    /// Keep samples `[round(tmin·sfreq), floor(tmax·sfreq))`; `None` keeps
    /// everything after `tmin`.
    pub fn crop(&mut self, tmin: f64, tmax: Option<f64>) -> Result<&mut Self> {
        let (start, end) = crop_window(self.n_times(), self.sfreq(), tmin, tmax)?;
        self.data = self.data.slice(s![.., start..end]).to_owned();
        self.first_samp += start as u64;
        Ok(self)
    }

    /// Keep only channels of the listed types, in their original order.
    pub fn pick(&mut self, types: &[ChannelType]) -> Result<&mut Self> {
        let picks = self.picks(types);
        if picks.is_empty() {
            let wanted: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
            return Err(Error::NoChannels(wanted.join("/")).into());
        }
        self.pick_indices(&picks)
    }

    pub fn pick_indices(&mut self, picks: &[usize]) -> Result<&mut Self> {
        if let Some(&bad) = picks.iter().find(|&&i| i >= self.n_chan()) {
            bail!("channel index {bad} out of range for {} channels", self.n_chan());
        }
        self.info = self.info.pick(picks);
        self.data = self.get_data(picks);
        Ok(self)
    }

    /// Zero-phase FIR filter of the data channels (mag/grad/eeg) on a copy.
    ///
    /// `l_freq` alone is a high-pass, `h_freq` alone a low-pass, both a
    /// band-pass.  Stimulus and auxiliary channels are copied unchanged.
    pub fn filter(&self, l_freq: Option<f64>, h_freq: Option<f64>) -> Result<Raw> {
        let h = design_fir(self.sfreq(), l_freq, h_freq)?;
        let rows: Vec<usize> = self
            .info
            .ch_types()
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_data())
            .map(|(i, _)| i)
            .collect();
        log::info!(
            "filtering {} data channels: l_freq={:?} h_freq={:?} ({} taps)",
            rows.len(), l_freq, h_freq, h.len()
        );

        let mut out = self.clone();
        apply_fir_zero_phase(&mut out.data, &rows, &h)?;
        if let Some(l) = l_freq {
            out.info.highpass = Some(out.info.highpass.map_or(l, |hp| hp.max(l)));
        }
        if let Some(hf) = h_freq {
            out.info.lowpass = Some(out.info.lowpass.map_or(hf, |lp| lp.min(hf)));
        }
        Ok(out)
    }
}

/// Sample range kept by a crop from `tmin` to `tmax` seconds.
pub fn crop_window(n_times: usize, sfreq: f64, tmin: f64, tmax: Option<f64>) -> Result<(usize, usize)> {
    let duration = n_times as f64 / sfreq;
    let invalid = || Error::InvalidCrop { tmin, tmax: tmax.unwrap_or(duration), duration };

    if tmin.is_nan() || tmin < 0.0 {
        return Err(invalid().into());
    }
    let start = (tmin * sfreq).round() as usize;
    let end = match tmax {
        Some(t) if t.is_finite() && t >= 0.0 => (t * sfreq).floor() as usize,
        Some(_) => return Err(invalid().into()),
        None => n_times,
    };
    if end > n_times || start >= end {
        return Err(invalid().into());
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiff::constants::*;
    use crate::fiff::ChannelInfo;

    fn info(kinds: &[(&str, i32, i32)], sfreq: f64) -> MeasInfo {
        let chs = kinds
            .iter()
            .map(|&(name, kind, unit)| ChannelInfo {
                scan_no: 0, log_no: 0, kind, range: 1.0, cal: 1.0, coil_type: 0,
                loc: [0.0; 12], unit, unit_mul: 0, name: name.into(),
            })
            .collect();
        MeasInfo::new(chs, sfreq)
    }

    fn raw(n_times: usize) -> Raw {
        let info = info(
            &[
                ("MEG 0111", FIFFV_MEG_CH, FIFF_UNIT_T),
                ("MEG 0112", FIFFV_MEG_CH, FIFF_UNIT_T_M),
                ("EEG 001", FIFFV_EEG_CH, FIFF_UNIT_V),
                ("STI 014", FIFFV_STIM_CH, 0),
                ("EOG 061", FIFFV_EOG_CH, FIFF_UNIT_V),
            ],
            100.0,
        );
        let data = Array2::from_shape_fn((5, n_times), |(c, t)| c as f64 + t as f64 * 1e-3);
        Raw::new(info, data, 1000).unwrap()
    }

    #[test]
    fn crop_keeps_floor_of_tmax_samples() {
        let mut r = raw(1500);
        r.crop(0.0, Some(12.345)).unwrap();
        assert_eq!(r.n_times(), 1234);
        assert_eq!(r.first_samp, 1000);

        r.crop(2.0, None).unwrap();
        assert_eq!(r.n_times(), 1034);
        assert_eq!(r.first_samp, 1200);
        approx::assert_abs_diff_eq!(r.data[[0, 0]], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn crop_beyond_recording_fails() {
        let mut r = raw(1000);
        let err = r.crop(0.0, Some(10.5)).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidCrop { .. })));
        assert!(r.crop(-1.0, None).is_err());
        assert!(r.crop(5.0, Some(5.0)).is_err());
        assert_eq!(r.n_times(), 1000);
    }

    #[test]
    fn pick_drops_gradiometers() {
        let mut r = raw(10);
        r.pick(&[ChannelType::Mag, ChannelType::Eeg, ChannelType::Stim, ChannelType::Eog]).unwrap();
        assert_eq!(r.ch_names(), vec!["MEG 0111", "EEG 001", "STI 014", "EOG 061"]);
        assert_eq!(r.data.row(1)[0], 2.0);
    }

    #[test]
    fn pick_without_matches_fails() {
        let mut r = raw(10);
        let err = r.pick(&[ChannelType::Ecg]).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::NoChannels("ecg".into())));
    }

    #[test]
    fn filter_leaves_original_and_stim_untouched() {
        let r = raw(2000);
        let before = r.clone();
        let f = r.filter(Some(1.0), None).unwrap();

        assert_eq!(r, before);
        assert_eq!(f.data.dim(), r.data.dim());
        assert_eq!(f.data.row(3), r.data.row(3));
        assert_eq!(f.data.row(4), r.data.row(4));
        assert_ne!(f.data.row(2), r.data.row(2));
        assert_eq!(f.info.highpass, Some(1.0));
    }
}
