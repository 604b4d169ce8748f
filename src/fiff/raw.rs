//! Raw FIF reader, the counterpart of `mne.io.read_raw_fif(preload=False)`.
//!
//! # Algorithm
//! 1. Load the tag directory (embedded directory, else walk the tag chain).
//! 2. Fold it into the block tree.
//! 3. Read `MeasInfo` from `FIFFB_MEAS_INFO`.
//! 4. Find `FIFFB_RAW_DATA` (or `FIFFB_CONTINUOUS_DATA`) and index its
//!    data buffers, turning `FIFF_DATA_SKIP` runs into zero-filled gaps.
//!
//! Samples are only read on [`RawFif::read_slice`], calibrated as
//! `value × cal × range` (MNE's `_cals`).
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use ndarray::{s, Array2};

use super::constants::*;
use super::info::{read_meas_info, MeasInfo};
use super::tag::{TagHeader, TagReader};
use super::tree::read_tree;

/// One contiguous block of samples in the file.
#[derive(Debug, Clone)]
pub struct BufferRecord {
    /// `None` for a skipped (zero-filled) stretch.
    pub tag:        Option<TagHeader>,
    /// First sample in acquisition time.
    pub first_samp: u64,
    pub n_samp:     usize,
}

/// An opened, not yet loaded, raw FIF recording.
#[derive(Debug, Clone)]
pub struct RawFif {
    pub info:       MeasInfo,
    pub first_samp: u64,
    /// Inclusive.
    pub last_samp:  u64,
    pub path:       PathBuf,
    pub buffers:    Vec<BufferRecord>,
}

impl RawFif {
    #[inline]
    pub fn n_times(&self) -> usize {
        (self.last_samp - self.first_samp + 1) as usize
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.info.sfreq
    }

    /// Every sample, `[n_chan, n_times]`.
    pub fn read_all_data(&self) -> Result<Array2<f64>> {
        self.read_slice(0, self.n_times())
    }

    /// Samples `[start, end)` counted from `first_samp`, `[n_chan, end - start]`.
    pub fn read_slice(&self, start: usize, end: usize) -> Result<Array2<f64>> {
        if start > end || end > self.n_times() {
            bail!("slice [{start}, {end}) outside recording of {} samples", self.n_times());
        }
        let n_ch = self.info.n_chan;
        let cals = self.info.cals();
        let mut out = Array2::<f64>::zeros((n_ch, end - start));

        let file = File::open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        let mut reader = TagReader::new(BufReader::new(file));

        let mut base = 0usize;
        for buf in &self.buffers {
            let buf_end = base + buf.n_samp;
            if base < end && buf_end > start {
                let lo = start.saturating_sub(base);
                let hi = buf.n_samp.min(end - base);
                let dst = base + lo - start;
                if let Some(tag) = &buf.tag {
                    let block = read_buffer(&mut reader, tag, buf.n_samp, n_ch, &cals)?;
                    out.slice_mut(s![.., dst..dst + hi - lo])
                        .assign(&block.slice(s![.., lo..hi]));
                }
            }
            base = buf_end;
            if base >= end {
                break;
            }
        }
        Ok(out)
    }
}

/// Open a FIF file: parse the header and index the data buffers.
pub fn open_raw<P: AsRef<Path>>(path: P) -> Result<RawFif> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = TagReader::new(BufReader::new(file));

    let directory = reader
        .directory()
        .with_context(|| format!("read tag directory of {}", path.display()))?;
    let tree = read_tree(&mut reader, &directory)?;
    let info = read_meas_info(&mut reader, &tree)?;

    let meas = tree
        .find_block(FIFFB_MEAS)
        .ok_or_else(|| anyhow!("FIFFB_MEAS not found"))?;
    let raw_node = meas
        .find_block(FIFFB_RAW_DATA)
        .or_else(|| meas.find_block(FIFFB_CONTINUOUS_DATA))
        .ok_or_else(|| anyhow!("no raw-data block in {}", path.display()))?;

    let mut next_samp = match raw_node.tags(FIFF_FIRST_SAMPLE).next() {
        Some(tag) => reader.int(tag)?.max(0) as u64,
        None => 0,
    };
    let mut buffers: Vec<BufferRecord> = Vec::new();
    let mut pending_skip = 0usize;

    for tag in &raw_node.entries {
        match tag.kind {
            FIFF_DATA_SKIP => pending_skip += reader.int(tag)?.max(0) as usize,
            FIFF_DATA_BUFFER => {
                let bps = bytes_per_sample(tag.ftype)
                    .ok_or_else(|| anyhow!("unsupported buffer type {}", tag.ftype))?;
                if info.n_chan == 0 {
                    bail!("data buffer in a recording without channels");
                }
                let n_samp = tag.payload_len() / (bps * info.n_chan);

                if pending_skip > 0 {
                    let gap = pending_skip * n_samp;
                    // A skip before any data only moves the first sample.
                    if !buffers.is_empty() {
                        buffers.push(BufferRecord { tag: None, first_samp: next_samp, n_samp: gap });
                    }
                    next_samp += gap as u64;
                    pending_skip = 0;
                }
                buffers.push(BufferRecord { tag: Some(*tag), first_samp: next_samp, n_samp });
                next_samp += n_samp as u64;
            }
            _ => {}
        }
    }

    let Some(first) = buffers.first() else {
        bail!("no FIFF_DATA_BUFFER tags in {}", path.display());
    };
    let first_samp = first.first_samp;
    log::debug!(
        "{}: {} buffers, samples {}..{}",
        path.display(), buffers.len(), first_samp, next_samp - 1
    );

    Ok(RawFif {
        info,
        first_samp,
        last_samp: next_samp - 1,
        path: path.to_path_buf(),
        buffers,
    })
}

/// Decode one buffer into calibrated `[n_chan, n_samp]`.
///
/// On disk the buffer is `[n_samp, n_chan]` big-endian, channels interleaved.
fn read_buffer<R: Read + Seek>(
    reader: &mut TagReader<R>,
    tag: &TagHeader,
    n_samp: usize,
    n_chan: usize,
    cals: &[f64],
) -> Result<Array2<f64>> {
    let bps = bytes_per_sample(tag.ftype)
        .ok_or_else(|| anyhow!("unsupported buffer type {}", tag.ftype))?;
    let mut bytes = vec![0u8; n_samp * n_chan * bps];
    reader
        .seek_payload(tag)?
        .read_exact(&mut bytes)
        .with_context(|| format!("read data buffer @ {:#x}", tag.pos))?;

    let decode: fn(&[u8]) -> f64 = match tag.ftype {
        FIFFT_FLOAT => be_f32,
        FIFFT_DOUBLE => be_f64,
        FIFFT_INT => be_i32,
        FIFFT_SHORT | FIFFT_DAU_PACK16 => be_i16,
        other => bail!("unsupported buffer type {other}"),
    };

    let mut out = Array2::<f64>::zeros((n_chan, n_samp));
    for (i, chunk) in bytes.chunks_exact(bps).enumerate() {
        let (t, c) = (i / n_chan, i % n_chan);
        out[[c, t]] = decode(chunk) * cals[c];
    }
    Ok(out)
}

fn be_f32(b: &[u8]) -> f64 {
    f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64
}

fn be_f64(b: &[u8]) -> f64 {
    f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

fn be_i32(b: &[u8]) -> f64 {
    i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64
}

fn be_i16(b: &[u8]) -> f64 {
    i16::from_be_bytes([b[0], b[1]]) as f64
}
