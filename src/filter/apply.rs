//! Overlap-add zero-phase FIR convolution.
//!
//! Matches MNE's `_overlap_add_filter`: the signal is padded on both sides
//! with `N − 1` reflect-limited samples (`_smart_pad`), convolved block by
//! block in the frequency domain, and shifted left by `(N − 1) / 2` so the
//! linear-phase kernel introduces no delay.
use std::sync::Arc;
use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// A kernel prepared for signals of one length: the FFT size, the kernel
/// spectrum and both FFT plans are computed once and reused per channel.
pub struct OverlapAdd {
    n_h:   usize,
    n_x:   usize,
    n_fft: usize,
    h_fft: Vec<Complex<f64>>,
    fwd:   Arc<dyn Fft<f64>>,
    inv:   Arc<dyn Fft<f64>>,
}

impl OverlapAdd {
    pub fn new(h: &[f64], n_x: usize) -> Result<Self> {
        if h.is_empty() || h.len() % 2 == 0 {
            bail!("zero-phase FIR needs an odd, non-empty kernel (got {} taps)", h.len());
        }
        let n_h = h.len();
        let n_fft = choose_fft_len(n_h, n_x + 2 * (n_h - 1));

        let mut planner = FftPlanner::<f64>::new();
        let fwd = planner.plan_fft_forward(n_fft);
        let inv = planner.plan_fft_inverse(n_fft);

        let mut h_fft = complex_padded(h, n_fft);
        fwd.process(&mut h_fft);

        Ok(Self { n_h, n_x, n_fft, h_fft, fwd, inv })
    }

    /// Filter one signal of the length given to [`new`](Self::new).
    pub fn apply(&self, x: ArrayView1<'_, f64>) -> Result<Vec<f64>> {
        if x.len() != self.n_x {
            bail!("signal has {} samples, filter was prepared for {}", x.len(), self.n_x);
        }
        if self.n_x == 0 {
            return Ok(Vec::new());
        }
        let x: Vec<f64> = x.to_vec();
        let n_edge = self.n_h - 1;
        let shift = n_edge / 2;
        let x_ext = smart_pad(&x, n_edge);
        let n_ext = x_ext.len();

        let n_seg = self.n_fft - self.n_h + 1;
        let scale = 1.0 / self.n_fft as f64;
        let mut y = vec![0.0_f64; n_ext];

        for start in (0..n_ext).step_by(n_seg) {
            let stop = (start + n_seg).min(n_ext);
            let mut buf = complex_padded(&x_ext[start..stop], self.n_fft);
            self.fwd.process(&mut buf);
            for (b, hf) in buf.iter_mut().zip(&self.h_fft) {
                *b *= hf;
            }
            self.inv.process(&mut buf);

            // Output sample o receives product sample o − start + shift.
            let out_lo = start.saturating_sub(shift);
            let prod_lo = shift.saturating_sub(start);
            for (o, p) in (out_lo..n_ext).zip(prod_lo..self.n_fft) {
                y[o] += buf[p].re * scale;
            }
        }

        Ok(y[n_edge..n_edge + self.n_x].to_vec())
    }
}

/// Filter the listed rows of `data` (`[C, T]`) in place.
pub fn apply_fir_zero_phase(data: &mut Array2<f64>, rows: &[usize], h: &[f64]) -> Result<()> {
    let ola = OverlapAdd::new(h, data.ncols())?;
    for &r in rows {
        let y = ola.apply(data.row(r))?;
        data.row_mut(r).assign(&ArrayView1::from(&y));
    }
    Ok(())
}

/// Filter a single signal.
pub fn filter_1d(x: &[f64], h: &[f64]) -> Result<Vec<f64>> {
    OverlapAdd::new(h, x.len())?.apply(ArrayView1::from(x))
}

/// Odd reflection about the end samples, limited to `len − 1` samples per
/// side; any remaining pad is zeros on the outside.
fn smart_pad(x: &[f64], n_pad: usize) -> Vec<f64> {
    let n = x.len();
    let reflect = n_pad.min(n - 1);
    let zeros = n_pad - reflect;
    let (first, last) = (x[0], x[n - 1]);

    let mut out = Vec::with_capacity(n + 2 * n_pad);
    out.extend(std::iter::repeat(0.0).take(zeros));
    out.extend((1..=reflect).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=reflect).map(|i| 2.0 * last - x[n - 1 - i]));
    out.extend(std::iter::repeat(0.0).take(zeros));
    out
}

/// Power-of-two FFT size minimising MNE's cost estimate
/// `ceil(n_x / (N − n_h + 1)) · N · (log2 N + 1) + 4e-5 · N · n_x`.
fn choose_fft_len(n_h: usize, n_x: usize) -> usize {
    let min_fft = 2 * n_h - 1;
    let lo = (min_fft as f64).log2().ceil() as u32;
    let hi = ((n_x.max(min_fft)) as f64).log2().ceil() as u32 + 1;

    (lo..=hi)
        .map(|p| {
            let n = 1_usize << p;
            let n_seg = (n - n_h + 1) as f64;
            let cost = (n_x as f64 / n_seg).ceil() * n as f64 * (p as f64 + 1.0)
                + 4e-5 * n as f64 * n_x as f64;
            (n, cost)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(1 << hi, |(n, _)| n)
}

fn complex_padded(x: &[f64], n: usize) -> Vec<Complex<f64>> {
    let mut buf: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v, 0.0)).collect();
    buf.resize(n, Complex::new(0.0, 0.0));
    buf
}
