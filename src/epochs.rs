//! Event-locked epochs, their average, and baseline correction.
//!
//! An epoch spans `[tmin, tmax]` seconds around an event, both ends
//! inclusive, so it holds `round(tmax·sfreq) − round(tmin·sfreq) + 1`
//! samples.  Events whose window leaves the recording are dropped.
//! Stimulus channels are not epoched.
use anyhow::{Context, Result};
use ndarray::{s, Array1, Array2, Array3, Axis};

use crate::channels::ChannelType;
use crate::error::Error;
use crate::events::{find_ecg_events, find_eog_events, Event};
use crate::fiff::MeasInfo;
use crate::recording::Raw;

#[derive(Debug, Clone)]
pub struct Epochs {
    pub info:      MeasInfo,
    /// `[n_epochs, n_chan, n_times]`.
    pub data:      Array3<f64>,
    pub times:     Array1<f64>,
    /// Events that produced an epoch, in order.
    pub events:    Vec<Event>,
    pub n_dropped: usize,
    /// Label carried into the evoked comment (`"eog"`, `"ecg"`).
    pub kind:      &'static str,
}

impl Epochs {
    pub fn new(raw: &Raw, events: &[Event], tmin: f64, tmax: f64, kind: &'static str) -> Result<Self> {
        if !(tmin <= tmax) {
            anyhow::bail!("epoch window tmin={tmin} must not exceed tmax={tmax}");
        }
        let sfreq = raw.sfreq();
        let off_lo = (tmin * sfreq).round() as i64;
        let off_hi = (tmax * sfreq).round() as i64;
        let n_t = (off_hi - off_lo + 1) as usize;
        let times = Array1::from_shape_fn(n_t, |i| (off_lo + i as i64) as f64 / sfreq);

        let picks: Vec<usize> = raw
            .info
            .ch_types()
            .iter()
            .enumerate()
            .filter(|(_, t)| **t != ChannelType::Stim)
            .map(|(i, _)| i)
            .collect();

        let n_times = raw.n_times() as i64;
        let kept: Vec<Event> = events
            .iter()
            .copied()
            .filter(|ev| {
                let start = ev.sample as i64 + off_lo;
                start >= 0 && ev.sample as i64 + off_hi < n_times
            })
            .collect();
        let n_dropped = events.len() - kept.len();
        if n_dropped > 0 {
            log::warn!("{kind}: dropped {n_dropped} of {} epochs at the recording edges", events.len());
        }

        let mut data = Array3::<f64>::zeros((kept.len(), picks.len(), n_t));
        for (e, ev) in kept.iter().enumerate() {
            let start = (ev.sample as i64 + off_lo) as usize;
            for (c, &p) in picks.iter().enumerate() {
                data.slice_mut(s![e, c, ..])
                    .assign(&raw.data.slice(s![p, start..start + n_t]));
            }
        }
        log::debug!("{kind}: {} epochs × {} channels × {n_t} samples", kept.len(), picks.len());

        Ok(Epochs { info: raw.info.pick(&picks), data, times, events: kept, n_dropped, kind })
    }

    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mean over epochs.
    pub fn average(&self) -> Result<Evoked> {
        if self.is_empty() {
            return Err(Error::NoEpochs(self.kind).into());
        }
        let data = self
            .data
            .mean_axis(Axis(0))
            .context("average epochs")?;
        Ok(Evoked {
            info:    self.info.clone(),
            data,
            times:   self.times.clone(),
            nave:    self.len(),
            comment: format!("{} artifact", self.kind),
        })
    }
}

/// Epochs around detected blinks.
pub fn create_eog_epochs(raw: &Raw, tmin: f64, tmax: f64) -> Result<Epochs> {
    let events = find_eog_events(raw)?;
    Epochs::new(raw, &events, tmin, tmax, "eog")
}

/// Epochs around detected heartbeats.
pub fn create_ecg_epochs(raw: &Raw, tmin: f64, tmax: f64) -> Result<Epochs> {
    let ecg = find_ecg_events(raw)?;
    Epochs::new(raw, &ecg.events, tmin, tmax, "ecg")
}

/// Averaged response.
#[derive(Debug, Clone)]
pub struct Evoked {
    pub info:    MeasInfo,
    /// `[n_chan, n_times]`.
    pub data:    Array2<f64>,
    pub times:   Array1<f64>,
    pub nave:    usize,
    pub comment: String,
}

impl Evoked {
    /// Subtract, per channel, the mean over `[bmin, bmax]` (`None` = edge of
    /// the epoch).  Bounds snap to the nearest sample.
    pub fn apply_baseline(&mut self, baseline: (Option<f64>, Option<f64>)) -> Result<&mut Self> {
        let range = baseline_range(&self.times, self.info.sfreq, baseline)?;
        baseline_correct(&mut self.data, range);
        Ok(self)
    }

    /// Root-mean-square over the channels of `kind` at every time point.
    pub fn gfp(&self, kind: ChannelType) -> Option<Array1<f64>> {
        let picks: Vec<usize> = self
            .info
            .ch_types()
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == kind)
            .map(|(i, _)| i)
            .collect();
        if picks.is_empty() {
            return None;
        }
        let sel = self.data.select(Axis(0), &picks);
        sel.mapv(|v| v * v).mean_axis(Axis(0)).map(|m| m.mapv(f64::sqrt))
    }

    /// `(time, value)` of the largest GFP sample for `kind`.
    pub fn gfp_peak(&self, kind: ChannelType) -> Option<(f64, f64)> {
        let gfp = self.gfp(kind)?;
        gfp.iter()
            .zip(self.times.iter())
            .fold(None, |best: Option<(f64, f64)>, (&g, &t)| match best {
                Some((_, bg)) if bg >= g => best,
                _ => Some((t, g)),
            })
    }
}

/// Half-open sample range covered by a `(bmin, bmax)` baseline window.
pub fn baseline_range(
    times: &Array1<f64>,
    sfreq: f64,
    (bmin, bmax): (Option<f64>, Option<f64>),
) -> Result<(usize, usize)> {
    let invalid = || -> anyhow::Error { Error::InvalidBaseline { tmin: bmin, tmax: bmax }.into() };
    let (Some(&t0), Some(&t1)) = (times.first(), times.last()) else {
        return Err(invalid());
    };
    let lo = bmin.map_or(t0, |b| (b * sfreq).round() / sfreq);
    let hi = bmax.map_or(t1, |b| (b * sfreq).round() / sfreq);
    let half = 0.5 / sfreq;

    let start = times.iter().position(|&t| t >= lo - half);
    let end = times.iter().rposition(|&t| t <= hi + half);
    match (start, end) {
        (Some(s), Some(e)) if s <= e => Ok((s, e + 1)),
        _ => Err(invalid()),
    }
}

/// `data[c, :] -= mean(data[c, range])` for every channel.
pub fn baseline_correct(data: &mut Array2<f64>, (start, end): (usize, usize)) {
    for mut row in data.rows_mut() {
        let m = row.slice(s![start..end]).mean().unwrap_or(0.0);
        row.mapv_inplace(|v| v - m);
    }
}
