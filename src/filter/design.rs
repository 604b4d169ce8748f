//! Zero-phase FIR design matching `mne.filter.create_filter` with
//! `fir_design='firwin'`, `fir_window='hamming'`, `filter_length='auto'`.
//!
//! * l_trans_bandwidth = min(max(0.25 · l_freq, 2), l_freq)
//! * h_trans_bandwidth = min(max(0.25 · h_freq, 2), nyquist − h_freq)
//! * length            = ceil(3.3 · sfreq / min(transition bandwidths)), made odd
//! * each edge sits in the middle of its transition band
use std::f64::consts::PI;
use anyhow::Result;

use crate::error::Error;

/// Hamming window length factor used by MNE.
const HAMMING_LENGTH_FACTOR: f64 = 3.3;

pub fn auto_l_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

pub fn auto_h_trans_bandwidth(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Odd tap count for the narrowest transition band.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n = (HAMMING_LENGTH_FACTOR * sfreq / trans_bw).ceil().max(1.0) as usize;
    n | 1
}

/// Design a high-pass (`h_freq = None`), low-pass (`l_freq = None`) or
/// band-pass filter.
pub fn design_fir(sfreq: f64, l_freq: Option<f64>, h_freq: Option<f64>) -> Result<Vec<f64>> {
    let nyq = sfreq / 2.0;
    let invalid = |msg: String| -> anyhow::Error { Error::InvalidFilter(msg).into() };

    if let Some(l) = l_freq {
        if !(l > 0.0 && l < nyq) {
            return Err(invalid(format!("l_freq {l} Hz must lie in (0, {nyq}) Hz")));
        }
    }
    if let Some(h) = h_freq {
        if !(h > 0.0 && h < nyq) {
            return Err(invalid(format!("h_freq {h} Hz must lie in (0, {nyq}) Hz")));
        }
    }

    match (l_freq, h_freq) {
        (None, None) => Err(invalid("neither l_freq nor h_freq given".into())),
        (Some(l), None) => Ok(design_highpass(l, sfreq)),
        (None, Some(h)) => Ok(design_lowpass(h, sfreq)),
        (Some(l), Some(h)) if l >= h => {
            Err(invalid(format!("l_freq {l} Hz must be below h_freq {h} Hz")))
        }
        (Some(l), Some(h)) => Ok(design_bandpass(l, h, sfreq)),
    }
}

pub fn design_highpass(l_freq: f64, sfreq: f64) -> Vec<f64> {
    let tb = auto_l_trans_bandwidth(l_freq);
    let n = auto_filter_length(tb, sfreq);
    let mut h = firwin(n, l_freq - tb / 2.0, sfreq);
    spectral_invert(&mut h);
    h
}

pub fn design_lowpass(h_freq: f64, sfreq: f64) -> Vec<f64> {
    let tb = auto_h_trans_bandwidth(h_freq, sfreq);
    let n = auto_filter_length(tb, sfreq);
    firwin(n, h_freq + tb / 2.0, sfreq)
}

/// Difference of two low-passes sharing the length of the narrower band.
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Vec<f64> {
    let l_tb = auto_l_trans_bandwidth(l_freq);
    let h_tb = auto_h_trans_bandwidth(h_freq, sfreq);
    let n = auto_filter_length(l_tb.min(h_tb), sfreq);
    let upper = firwin(n, h_freq + h_tb / 2.0, sfreq);
    let lower = firwin(n, l_freq - l_tb / 2.0, sfreq);
    upper.iter().zip(&lower).map(|(u, l)| u - l).collect()
}

/// Hamming-windowed sinc low-pass of odd length `n`, unit DC gain.
/// `cutoff_hz` is the −6 dB point.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64) -> Vec<f64> {
    debug_assert!(n % 2 == 1, "linear-phase FIR needs an odd length");
    let centre = (n - 1) as f64 / 2.0;
    let fc = cutoff_hz / (sfreq / 2.0);
    let win = hamming(n);

    let mut h: Vec<f64> = win
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let x = i as f64 - centre;
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * w
        })
        .collect();
    let dc: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= dc);
    h
}

pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// `δ[n/2] − h`: low-pass → high-pass.
fn spectral_invert(h: &mut [f64]) {
    h.iter_mut().for_each(|v| *v = -*v);
    h[h.len() / 2] += 1.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highpass_1hz_matches_mne_length() {
        // MNE at 1 Hz: transition band 1 Hz → ceil(3.3 · sfreq) taps.
        let sfreq = 600.614990234375;
        let h = design_highpass(1.0, sfreq);
        assert_eq!(h.len(), 1983);
        assert_eq!(design_highpass(0.5, 256.0).len(), 1691);
    }

    #[test]
    fn highpass_blocks_dc_and_is_symmetric() {
        let h = design_highpass(1.0, 150.0);
        approx::assert_abs_diff_eq!(h.iter().sum::<f64>(), 0.0, epsilon = 1e-9);
        let n = h.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn lowpass_has_unity_dc_gain() {
        let h = design_lowpass(40.0, 150.0);
        approx::assert_abs_diff_eq!(h.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn bandpass_rejects_dc() {
        let h = design_bandpass(1.0, 10.0, 150.0);
        assert_eq!(h.len() % 2, 1);
        approx::assert_abs_diff_eq!(h.iter().sum::<f64>(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn invalid_cutoffs_are_rejected() {
        for (l, h) in [(None, None), (Some(0.0), None), (None, Some(75.0)), (Some(10.0), Some(5.0))] {
            let err = design_fir(150.0, l, h).unwrap_err();
            assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidFilter(_))), "{err}");
        }
    }
}
