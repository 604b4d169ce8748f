//! Ocular (blink) and cardiac (QRS) event detection.
//!
//! Both detectors band-pass a reference signal, threshold it, and keep one
//! sample per supra-threshold excursion, following MNE's
//! `find_eog_events` / `find_ecg_events`, simplified to a single threshold.
//!
//! * EOG: 1–10 Hz, threshold `(max − min) / 4`, channel with the largest RMS.
//! * ECG: 5–35 Hz, rectified, threshold `0.6 ×` the mean of the first three
//!   one-second maxima, one event per 0.3 s window.  Without an ECG channel
//!   the reference is synthesised as the mean of the magnetometers (or
//!   gradiometers).
use anyhow::{Context, Result};
use ndarray::{Array1, ArrayView1, Axis};

use crate::channels::ChannelType;
use crate::error::Error;
use crate::filter::{design_fir, filter_1d};
use crate::recording::Raw;

/// Event id MNE assigns to detected blinks.
pub const EOG_EVENT_ID: i32 = 998;
/// Event id MNE assigns to detected heartbeats.
pub const ECG_EVENT_ID: i32 = 999;

const EOG_BAND: (f64, f64) = (1.0, 10.0);
const ECG_BAND: (f64, f64) = (5.0, 35.0);
const QRS_THRESH: f64 = 0.6;
const QRS_WINDOW_S: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Sample index relative to the first sample of the recording.
    pub sample: usize,
    pub id:     i32,
}

/// Outcome of the heartbeat detector.
#[derive(Debug, Clone)]
pub struct EcgEvents {
    pub events:    Vec<Event>,
    /// Channel used as reference (`"ECG-SYN"` when synthesised).
    pub channel:   String,
    pub pulse_bpm: f64,
}

/// Locate blinks on the EOG channel(s) of `raw`.
pub fn find_eog_events(raw: &Raw) -> Result<Vec<Event>> {
    let picks = raw.picks(&[ChannelType::Eog]);
    if picks.is_empty() {
        return Err(Error::NoChannels("eog".into()).into());
    }
    let h = design_fir(raw.sfreq(), Some(EOG_BAND.0), Some(EOG_BAND.1))
        .context("design EOG band-pass")?;

    let mut best: Option<(f64, Vec<f64>, &str)> = None;
    for &p in &picks {
        let row = raw.data.row(p).to_vec();
        let filtered = filter_1d(&row, &h)?;
        let rms = (filtered.iter().map(|v| v * v).sum::<f64>() / filtered.len().max(1) as f64).sqrt();
        if best.as_ref().map_or(true, |(r, _, _)| rms > *r) {
            best = Some((rms, filtered, raw.info.chs[p].name.as_str()));
        }
    }
    let Some((_, mut sig, name)) = best else {
        return Err(Error::NoChannels("eog".into()).into());
    };

    let mean = sig.iter().sum::<f64>() / sig.len().max(1) as f64;
    sig.iter_mut().for_each(|v| *v -= mean);
    let (lo, hi) = min_max(&sig);
    // Blinks may be recorded with either polarity.
    if lo.abs() > hi.abs() {
        sig.iter_mut().for_each(|v| *v = -*v);
    }
    let thresh = (hi - lo) / 4.0;

    let events: Vec<Event> = excursion_peaks(&sig, thresh)
        .into_iter()
        .map(|sample| Event { sample, id: EOG_EVENT_ID })
        .collect();
    log::info!("{name}: {} EOG events (threshold {thresh:.3e})", events.len());
    Ok(events)
}

/// Locate heartbeats; see the module docs for the reference signal.
pub fn find_ecg_events(raw: &Raw) -> Result<EcgEvents> {
    let (channel, reference) = ecg_reference(raw)?;
    let h = design_fir(raw.sfreq(), Some(ECG_BAND.0), Some(ECG_BAND.1))
        .context("design ECG band-pass")?;
    let filtered = filter_1d(&reference.to_vec(), &h)?;
    let rectified: Vec<f64> = filtered.iter().map(|v| v.abs()).collect();

    let sfreq = raw.sfreq();
    let samples = qrs_detector(&rectified, sfreq);
    let minutes = raw.duration_secs() / 60.0;
    let pulse_bpm = if minutes > 0.0 { samples.len() as f64 / minutes } else { 0.0 };
    log::info!("{channel}: {} ECG events, average pulse {pulse_bpm:.0} bpm", samples.len());

    Ok(EcgEvents {
        events: samples.into_iter().map(|sample| Event { sample, id: ECG_EVENT_ID }).collect(),
        channel,
        pulse_bpm,
    })
}

fn ecg_reference(raw: &Raw) -> Result<(String, Array1<f64>)> {
    if let Some(&p) = raw.picks(&[ChannelType::Ecg]).first() {
        return Ok((raw.info.chs[p].name.clone(), raw.data.row(p).to_owned()));
    }
    for kind in [ChannelType::Mag, ChannelType::Grad] {
        let picks = raw.picks(&[kind]);
        if picks.is_empty() {
            continue;
        }
        log::info!("no ECG channel; synthesising one from {} {kind} channels", picks.len());
        let mean = raw
            .get_data(&picks)
            .mean_axis(Axis(0))
            .context("average MEG channels")?;
        return Ok(("ECG-SYN".to_string(), mean));
    }
    Err(Error::NoChannels("ecg/mag/grad".into()).into())
}

/// Threshold crossings of the rectified QRS band, one peak per window.
fn qrs_detector(rectified: &[f64], sfreq: f64) -> Vec<usize> {
    let n = rectified.len();
    if n == 0 {
        return Vec::new();
    }
    let second = (sfreq.round() as usize).max(1);
    let window = ((QRS_WINDOW_S * sfreq).round() as usize).max(1);

    let maxima: Vec<f64> = rectified
        .chunks(second)
        .take(3)
        .map(|c| min_max(c).1)
        .collect();
    let thresh = QRS_THRESH * maxima.iter().sum::<f64>() / maxima.len() as f64;

    let mut out = Vec::new();
    let mut i = 0;
    while i < n {
        if rectified[i] > thresh {
            let end = (i + window).min(n);
            out.push(i + argmax(ArrayView1::from(&rectified[i..end])));
            i = end;
        } else {
            i += 1;
        }
    }
    out
}

/// Index of the maximum of every maximal run of samples above `thresh`.
fn excursion_peaks(x: &[f64], thresh: f64) -> Vec<usize> {
    let mut out = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &v) in x.iter().enumerate() {
        match (v > thresh, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(s)) => {
                out.push(s + argmax(ArrayView1::from(&x[s..i])));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = run_start {
        out.push(s + argmax(ArrayView1::from(&x[s..])));
    }
    out
}

fn argmax(x: ArrayView1<'_, f64>) -> usize {
    x.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}

fn min_max(x: &[f64]) -> (f64, f64) {
    x.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excursions_yield_one_peak_each() {
        let x = [0.0, 2.0, 5.0, 3.0, 0.0, 0.0, 4.0, 6.0];
        assert_eq!(excursion_peaks(&x, 1.0), vec![2, 7]);
        assert!(excursion_peaks(&x, 10.0).is_empty());
    }

    #[test]
    fn qrs_detector_skips_a_window_after_each_beat() {
        let sfreq = 100.0;
        let mut x = vec![0.0; 500];
        for beat in [50, 130, 210, 290, 370, 450] {
            x[beat] = 1.0;
            x[beat + 2] = 0.7; // trailing lobe inside the refractory window
        }
        assert_eq!(qrs_detector(&x, sfreq), vec![50, 130, 210, 290, 370, 450]);
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(ArrayView1::from(&[1.0, 3.0, 3.0, 2.0])), 1);
    }
}
