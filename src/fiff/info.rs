//! Measurement info (MNE's `Info`) read from `FIFFB_MEAS_INFO`.
//!
//! Only what the artifact workflow needs is kept: channel records, sampling
//! rate, online filter settings, bad channels and a couple of free-text
//! fields.  Projectors, digitisation and coordinate transforms are skipped.
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Seek};
use anyhow::{anyhow, bail, Result};

use super::constants::*;
use super::tag::TagReader;
use super::tree::Node;
use crate::channels::ChannelType;

/// One `FIFFT_CH_INFO_STRUCT` record.
///
/// ```text
///  0 scanno  4 logno  8 kind  12 range  16 cal  20 coil_type
/// 24 loc[12] (f32)   72 unit  76 unit_mul  80 ch_name[16]  → 96 bytes
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub scan_no:   i32,
    pub log_no:    i32,
    pub kind:      i32,
    pub range:     f32,
    pub cal:       f32,
    pub coil_type: i32,
    /// Sensor position and orientation, metres.
    pub loc:       [f32; 12],
    pub unit:      i32,
    pub unit_mul:  i32,
    pub name:      String,
}

impl ChannelInfo {
    pub const WIRE_LEN: usize = 96;

    /// Factor from stored sample to SI units: `cal × range`.
    #[inline]
    pub fn calibration(&self) -> f64 {
        self.cal as f64 * self.range as f64
    }

    #[inline]
    pub fn channel_type(&self) -> ChannelType {
        ChannelType::of(self)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < Self::WIRE_LEN {
            bail!("ch_info payload too short: {} bytes (need {})", raw.len(), Self::WIRE_LEN);
        }
        let word = |at: usize| [raw[at], raw[at + 1], raw[at + 2], raw[at + 3]];
        let int = |at: usize| i32::from_be_bytes(word(at));
        let float = |at: usize| f32::from_be_bytes(word(at));

        let mut loc = [0f32; 12];
        for (i, v) in loc.iter_mut().enumerate() {
            *v = float(24 + 4 * i);
        }
        let name_field = &raw[80..96];
        let end = name_field.iter().position(|&b| b == 0).unwrap_or(name_field.len());

        Ok(ChannelInfo {
            scan_no:   int(0),
            log_no:    int(4),
            kind:      int(8),
            range:     float(12),
            cal:       float(16),
            coil_type: int(20),
            loc,
            unit:      int(72),
            unit_mul:  int(76),
            name:      name_field[..end].iter().map(|&b| b as char).collect(),
        })
    }

    /// Inverse of [`from_bytes`](Self::from_bytes); names longer than 15
    /// bytes are truncated.
    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut out = [0u8; Self::WIRE_LEN];
        out[0..4].copy_from_slice(&self.scan_no.to_be_bytes());
        out[4..8].copy_from_slice(&self.log_no.to_be_bytes());
        out[8..12].copy_from_slice(&self.kind.to_be_bytes());
        out[12..16].copy_from_slice(&self.range.to_be_bytes());
        out[16..20].copy_from_slice(&self.cal.to_be_bytes());
        out[20..24].copy_from_slice(&self.coil_type.to_be_bytes());
        for (i, v) in self.loc.iter().enumerate() {
            out[24 + 4 * i..28 + 4 * i].copy_from_slice(&v.to_be_bytes());
        }
        out[72..76].copy_from_slice(&self.unit.to_be_bytes());
        out[76..80].copy_from_slice(&self.unit_mul.to_be_bytes());
        let name = self.name.as_bytes();
        let n = name.len().min(15);
        out[80..80 + n].copy_from_slice(&name[..n]);
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasInfo {
    pub n_chan:       usize,
    pub sfreq:        f64,
    pub lowpass:      Option<f64>,
    pub highpass:     Option<f64>,
    pub line_freq:    Option<f64>,
    pub chs:          Vec<ChannelInfo>,
    pub bads:         Vec<String>,
    pub experimenter: Option<String>,
    pub description:  Option<String>,
}

impl MeasInfo {
    /// Minimal info for in-memory recordings.
    pub fn new(chs: Vec<ChannelInfo>, sfreq: f64) -> Self {
        MeasInfo {
            n_chan: chs.len(),
            sfreq,
            lowpass: Some(sfreq / 2.0),
            highpass: Some(0.0),
            line_freq: None,
            chs,
            bads: Vec::new(),
            experimenter: None,
            description: None,
        }
    }

    pub fn cals(&self) -> Vec<f64> {
        self.chs.iter().map(ChannelInfo::calibration).collect()
    }

    pub fn ch_names(&self) -> Vec<&str> {
        self.chs.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn ch_types(&self) -> Vec<ChannelType> {
        self.chs.iter().map(ChannelInfo::channel_type).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.chs.iter().position(|c| c.name == name)
    }

    /// Info restricted to `picks` (in the given order).  Bad channels that
    /// are dropped disappear from `bads` too.
    pub fn pick(&self, picks: &[usize]) -> MeasInfo {
        let chs: Vec<ChannelInfo> = picks.iter().map(|&i| self.chs[i].clone()).collect();
        let bads = self
            .bads
            .iter()
            .filter(|b| chs.iter().any(|c| &c.name == *b))
            .cloned()
            .collect();
        MeasInfo { n_chan: chs.len(), chs, bads, ..self.clone() }
    }

    /// Channel count per type, in [`ChannelType::ALL`] order.
    pub fn type_counts(&self) -> BTreeMap<ChannelType, usize> {
        let mut counts = BTreeMap::new();
        for t in self.ch_types() {
            *counts.entry(t).or_insert(0) += 1;
        }
        counts
    }
}

impl fmt::Display for MeasInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chs = self
            .type_counts()
            .iter()
            .map(|(t, n)| format!("{n} {}", t.label()))
            .collect::<Vec<_>>()
            .join(", ");
        let hz = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1} Hz"));

        writeln!(f, "<Info | {} channels", self.n_chan)?;
        writeln!(f, " bads: {}", if self.bads.is_empty() { "[]".to_string() } else { self.bads.join(", ") })?;
        writeln!(f, " chs: {chs}")?;
        if let Some(d) = &self.description {
            writeln!(f, " description: {d}")?;
        }
        if let Some(e) = &self.experimenter {
            writeln!(f, " experimenter: {e}")?;
        }
        writeln!(f, " highpass: {}", hz(self.highpass))?;
        writeln!(f, " lowpass: {}", hz(self.lowpass))?;
        if let Some(l) = self.line_freq {
            writeln!(f, " line_freq: {l:.1} Hz")?;
        }
        write!(f, " sfreq: {:.1} Hz\n>", self.sfreq)
    }
}

/// Parse `FIFFB_MEAS_INFO` below `tree`.
pub fn read_meas_info<R: Read + Seek>(reader: &mut TagReader<R>, tree: &Node) -> Result<MeasInfo> {
    let node = tree
        .find_block(FIFFB_MEAS)
        .and_then(|m| m.find_block(FIFFB_MEAS_INFO))
        .ok_or_else(|| anyhow!("FIFFB_MEAS_INFO block not found"))?;

    let mut n_chan = None::<usize>;
    let mut sfreq = None::<f64>;
    let mut lowpass = None;
    let mut highpass = None;
    let mut line_freq = None;
    let mut chs = Vec::new();
    let mut bads = Vec::new();
    let mut experimenter = None;
    let mut description = None;

    // Online filter fields are NaN when the acquisition did not set them.
    let finite = |v: f32| v.is_finite().then_some(v as f64);

    for tag in &node.entries {
        match tag.kind {
            FIFF_NCHAN => n_chan = Some(reader.int(tag)?.max(0) as usize),
            FIFF_SFREQ => sfreq = Some(reader.float(tag)? as f64),
            FIFF_LOWPASS => lowpass = finite(reader.float(tag)?),
            FIFF_HIGHPASS => highpass = finite(reader.float(tag)?),
            FIFF_LINE_FREQ => line_freq = finite(reader.float(tag)?),
            FIFF_CH_INFO => chs.push(ChannelInfo::from_bytes(&reader.bytes(tag)?)?),
            FIFF_BAD_CHS => {
                bads = reader
                    .string(tag)?
                    .split(':')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            FIFF_EXPERIMENTER => experimenter = Some(reader.string(tag)?),
            FIFF_COMMENT => description = Some(reader.string(tag)?),
            _ => {}
        }
    }

    let n_chan = n_chan.ok_or_else(|| anyhow!("FIFF_NCHAN not found"))?;
    let sfreq = sfreq.ok_or_else(|| anyhow!("FIFF_SFREQ not found"))?;
    if chs.len() != n_chan {
        bail!("expected {n_chan} ch_info records, got {}", chs.len());
    }
    if sfreq.is_nan() || sfreq <= 0.0 {
        bail!("invalid sampling frequency {sfreq}");
    }

    Ok(MeasInfo { n_chan, sfreq, lowpass, highpass, line_freq, chs, bads, experimenter, description })
}
