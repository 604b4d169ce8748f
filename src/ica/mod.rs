//! Independent component analysis of a continuous recording.
//!
//! Fitting follows `mne.preprocessing.ICA(method='fastica')`:
//!
//! 1. fit on the good mag/grad/eeg channels;
//! 2. pre-whiten every channel type by the standard deviation of all its samples;
//! 3. PCA of the centred data, components ordered by explained variance and
//!    sign-fixed, the first `n_components` scaled to unit variance;
//! 4. parallel FastICA ([`fastica`]) on those scores;
//! 5. unmixing expressed on PCA scores, mixing = its inverse, components
//!    sorted by explained variance of the reconstructed signal.
//!
//! Cleaning subtracts only the excluded components, so PCA dimensions
//! beyond `n_components` survive untouched and an empty exclusion list
//! returns the input unchanged.
pub mod fastica;

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::channels::{pick_types, ChannelType};
use crate::error::Error;
use crate::recording::Raw;

pub use fastica::{fastica, sym_decorrelation, FastIcaFit};

/// Iteration cap; `Auto` is MNE's `max_iter='auto'` for FastICA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxIter {
    #[default]
    Auto,
    Fixed(usize),
}

impl MaxIter {
    pub fn resolve(self) -> usize {
        match self {
            MaxIter::Auto => 1000,
            MaxIter::Fixed(n) => n,
        }
    }
}

impl FromStr for MaxIter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "auto" => Ok(MaxIter::Auto),
            n => n
                .parse()
                .map(MaxIter::Fixed)
                .map_err(|_| format!("max_iter must be \"auto\" or a count, got {s:?}")),
        }
    }
}

impl fmt::Display for MaxIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxIter::Auto => write!(f, "auto"),
            MaxIter::Fixed(n) => write!(f, "{n}"),
        }
    }
}

/// Fit parameters.  `fit` is the only way to obtain an [`Ica`].
#[derive(Debug, Clone, PartialEq)]
pub struct IcaParams {
    pub n_components: usize,
    pub max_iter:     MaxIter,
    pub random_state: Option<u64>,
    pub tol:          f64,
}

impl Default for IcaParams {
    fn default() -> Self {
        Self { n_components: 15, max_iter: MaxIter::Auto, random_state: Some(97), tol: 1e-4 }
    }
}

impl IcaParams {
    pub fn fit(&self, raw: &Raw) -> Result<Ica> {
        let picks = pick_types(&raw.info, &[ChannelType::Mag, ChannelType::Grad, ChannelType::Eeg], true);
        if picks.is_empty() {
            return Err(Error::NoChannels("mag/grad/eeg".into()).into());
        }
        let k = self.n_components;
        if k == 0 || k > picks.len() {
            return Err(Error::InvalidComponents { requested: k, available: picks.len() }.into());
        }
        let n_t = raw.n_times();
        if n_t < 2 {
            anyhow::bail!("cannot fit ICA on {n_t} samples");
        }

        let all_types = raw.info.ch_types();
        let ch_types: Vec<ChannelType> = picks.iter().map(|&p| all_types[p]).collect();
        let ch_names: Vec<String> = picks.iter().map(|&p| raw.info.chs[p].name.clone()).collect();
        log::info!(
            "fitting ICA to {} channels × {n_t} samples: {k} components, max_iter={}",
            picks.len(), self.max_iter
        );

        let x = raw.get_data(&picks);
        let pre_whitener = pre_whitener(&x, &ch_types)?;
        let xw = &x / &pre_whitener.view().insert_axis(Axis(1));
        let pca_mean = xw.mean_axis(Axis(1)).context("channel means")?;
        let xc = &xw - &pca_mean.view().insert_axis(Axis(1));

        let pca = Pca::fit(&xc);
        let components = pca.components.slice(ndarray::s![..k, ..]).to_owned();
        let var = pca.explained_variance.slice(ndarray::s![..k]).to_owned();
        let floor = pca.explained_variance[0] * 1e-12;
        if let Some(r) = var.iter().position(|&v| v <= floor) {
            log::warn!("PCA component {r} carries no variance; data rank is below {k}");
            return Err(Error::Singular("PCA whitening").into());
        }

        let scores = components.dot(&xc);
        let std = var.mapv(f64::sqrt);
        let z = &scores / &std.view().insert_axis(Axis(1));
        let z = to_dmatrix(&z);

        let fit = fastica(&z, self.max_iter.resolve(), self.tol, self.random_state)?;
        log::info!("FastICA converged after {} iterations", fit.n_iter);

        // Unmixing on PCA scores: W · diag(1/√λ).
        let mut unmixing = fit.unmixing.clone();
        for (j, s) in std.iter().enumerate() {
            unmixing.column_mut(j).unscale_mut(*s);
        }
        let mixing = unmixing
            .clone()
            .try_inverse()
            .ok_or(Error::Singular("unmixing matrix"))?;

        // Order by variance of each component's contribution to the data.
        let sources = &fit.unmixing * &z;
        let energy: Vec<f64> = (0..k)
            .map(|j| mixing.column(j).norm_squared() * sources.row(j).norm_squared())
            .collect();
        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| energy[b].total_cmp(&energy[a]));

        let mut unmix_sorted = DMatrix::<f64>::zeros(k, k);
        let mut mix_sorted = DMatrix::<f64>::zeros(k, k);
        for (dst, &src) in order.iter().enumerate() {
            let sign = sign_of_largest(mixing.column(src).iter().copied());
            unmix_sorted.set_row(dst, &(unmixing.row(src) * sign));
            mix_sorted.set_column(dst, &(mixing.column(src) * sign));
        }

        let total: f64 = energy.iter().sum();
        log::debug!(
            "component variance share: {:?}",
            order.iter().map(|&j| energy[j] / total).collect::<Vec<_>>()
        );

        Ok(Ica {
            ch_names,
            ch_types,
            pre_whitener,
            pca_mean,
            pca_components: components,
            pca_explained_variance: pca.explained_variance,
            unmixing: to_array2(&unmix_sorted),
            mixing: to_array2(&mix_sorted),
            n_iter: fit.n_iter,
            n_samples: n_t,
            exclude: Vec::new(),
            params: self.clone(),
        })
    }
}

/// A fitted decomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Ica {
    pub ch_names:               Vec<String>,
    pub ch_types:               Vec<ChannelType>,
    /// Per-channel scale applied before PCA.
    pub pre_whitener:           Array1<f64>,
    pub pca_mean:               Array1<f64>,
    /// `[n_components, n_channels]`, rows are principal axes.
    pub pca_components:         Array2<f64>,
    /// Eigenvalues of every PCA axis, not only the kept ones.
    pub pca_explained_variance: Array1<f64>,
    /// `[n_components, n_components]` on PCA scores.
    pub unmixing:               Array2<f64>,
    pub mixing:                 Array2<f64>,
    pub n_iter:                 usize,
    pub n_samples:              usize,
    exclude:                    Vec<usize>,
    pub params:                 IcaParams,
}

impl Ica {
    pub fn n_components(&self) -> usize {
        self.unmixing.nrows()
    }

    pub fn exclude(&self) -> &[usize] {
        &self.exclude
    }

    /// Record the components to remove.  Every index must be below
    /// `n_components`; duplicates collapse.
    pub fn set_exclude(&mut self, exclude: &[usize]) -> Result<()> {
        self.check_indices(exclude)?;
        let mut ex = exclude.to_vec();
        ex.sort_unstable();
        ex.dedup();
        self.exclude = ex;
        Ok(())
    }

    /// Component time courses `[n_components, n_times]` of `raw`.
    pub fn get_sources(&self, raw: &Raw) -> Result<Array2<f64>> {
        let rows = self.fitted_rows(raw)?;
        let xc = self.centred(raw, &rows);
        Ok(self.unmixing.dot(&self.pca_components.dot(&xc)))
    }

    /// Copy of `raw` with the excluded components removed.
    pub fn apply(&self, raw: &Raw) -> Result<Raw> {
        self.apply_excluding(raw, &self.exclude)
    }

    /// Like [`apply`](Self::apply) with an explicit exclusion list.
    pub fn apply_excluding(&self, raw: &Raw, exclude: &[usize]) -> Result<Raw> {
        self.check_indices(exclude)?;
        let rows = self.fitted_rows(raw)?;
        if exclude.is_empty() {
            return Ok(raw.clone());
        }
        let xc = self.centred(raw, &rows);
        let sources = self.unmixing.dot(&self.pca_components.dot(&xc));

        let s_ex = sources.select(Axis(0), exclude);
        let a_ex = self.mixing.select(Axis(1), exclude);
        let artifact = self.pca_components.t().dot(&a_ex.dot(&s_ex));

        let mut out = raw.clone();
        for (r, &row) in rows.iter().enumerate() {
            let scale = self.pre_whitener[r];
            out.data
                .row_mut(row)
                .zip_mut_with(&artifact.row(r), |v, a| *v -= a * scale);
        }
        log::debug!("removed components {exclude:?} from {} channels", rows.len());
        Ok(out)
    }

    /// Original vs cleaned signals of the channels of `types`.
    pub fn overlay(&self, raw: &Raw, exclude: &[usize], types: &[ChannelType]) -> Result<Overlay> {
        let cleaned = self.apply_excluding(raw, exclude)?;
        let picks = raw.picks(types);
        if picks.is_empty() {
            let wanted: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
            return Err(Error::NoChannels(wanted.join("/")).into());
        }
        Ok(Overlay {
            ch_names: picks.iter().map(|&p| raw.info.chs[p].name.clone()).collect(),
            ch_types: picks.iter().map(|&p| raw.info.chs[p].channel_type()).collect(),
            original: raw.get_data(&picks),
            cleaned:  cleaned.get_data(&picks),
            exclude:  exclude.to_vec(),
        })
    }

    /// Pearson correlation of every component with channel `ch_name`.
    pub fn score_sources(&self, raw: &Raw, ch_name: &str) -> Result<Vec<f64>> {
        let target = raw
            .channel(ch_name)
            .ok_or_else(|| Error::MissingChannel(ch_name.to_string()))?;
        let sources = self.get_sources(raw)?;
        Ok(sources.rows().into_iter().map(|s| pearson(s, target)).collect())
    }

    fn check_indices(&self, exclude: &[usize]) -> Result<()> {
        let n = self.n_components();
        match exclude.iter().find(|&&i| i >= n) {
            Some(&index) => Err(Error::ExcludeOutOfRange { index, n_components: n }.into()),
            None => Ok(()),
        }
    }

    /// Row index in `raw` of every fitted channel.
    fn fitted_rows(&self, raw: &Raw) -> Result<Vec<usize>> {
        let rows = self
            .ch_names
            .iter()
            .map(|name| raw.info.index_of(name).ok_or_else(|| Error::MissingChannel(name.clone())))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Pre-whitened, centred data of `rows`.
    fn centred(&self, raw: &Raw, rows: &[usize]) -> Array2<f64> {
        let x = raw.get_data(rows);
        let xw = &x / &self.pre_whitener.view().insert_axis(Axis(1));
        &xw - &self.pca_mean.view().insert_axis(Axis(1))
    }
}

impl fmt::Display for Ica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds = self.ch_types.clone();
        kinds.sort();
        kinds.dedup();
        let kinds: Vec<&str> = kinds.iter().map(|t| t.as_str()).collect();
        write!(
            f,
            "<ICA | raw data decomposition, method: fastica (fit in {} iterations on {} samples), \
             {} ICA components ({} PCA components available), channel types: {}, {} sources marked for exclusion>",
            self.n_iter,
            self.n_samples,
            self.n_components(),
            self.pca_explained_variance.len(),
            kinds.join(", "),
            self.exclude.len(),
        )
    }
}

/// Signals before and after removing a set of components.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub ch_names: Vec<String>,
    pub ch_types: Vec<ChannelType>,
    pub original: Array2<f64>,
    pub cleaned:  Array2<f64>,
    pub exclude:  Vec<usize>,
}

impl Overlay {
    /// `(rms_original, rms_cleaned)` per channel.
    pub fn rms(&self) -> Vec<(f64, f64)> {
        self.original
            .rows()
            .into_iter()
            .zip(self.cleaned.rows())
            .map(|(a, b)| (rms(a.iter()), rms(b.iter())))
            .collect()
    }

    /// Mean fractional RMS reduction over channels.
    pub fn mean_reduction(&self) -> f64 {
        mean_reduction(self.rms().into_iter())
    }

    /// Mean fractional RMS reduction per channel type, in [`ChannelType`] order.
    pub fn reduction_by_type(&self) -> Vec<(ChannelType, f64)> {
        let rms = self.rms();
        let mut types = self.ch_types.clone();
        types.sort();
        types.dedup();
        types
            .into_iter()
            .map(|t| {
                let of_type = rms.iter().zip(&self.ch_types).filter(|(_, ct)| **ct == t).map(|(r, _)| *r);
                (t, mean_reduction(of_type))
            })
            .collect()
    }
}

fn mean_reduction(rms: impl Iterator<Item = (f64, f64)>) -> f64 {
    let per: Vec<f64> = rms.filter(|(a, _)| *a > 0.0).map(|(a, b)| 1.0 - b / a).collect();
    if per.is_empty() { 0.0 } else { per.iter().sum::<f64>() / per.len() as f64 }
}

struct Pca {
    /// `[n_channels, n_channels]`, rows are principal axes.
    components:         Array2<f64>,
    explained_variance: Array1<f64>,
}

impl Pca {
    /// Eigendecomposition of the covariance of centred `[C, T]` data.
    fn fit(xc: &Array2<f64>) -> Self {
        let (c, t) = xc.dim();
        let cov = xc.dot(&xc.t()) / (t - 1) as f64;
        let eig = SymmetricEigen::new(to_dmatrix(&cov));

        let mut order: Vec<usize> = (0..c).collect();
        order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

        let mut components = Array2::<f64>::zeros((c, c));
        let mut explained_variance = Array1::<f64>::zeros(c);
        for (r, &src) in order.iter().enumerate() {
            let axis = eig.eigenvectors.column(src);
            let sign = sign_of_largest(axis.iter().copied());
            for i in 0..c {
                components[[r, i]] = axis[i] * sign;
            }
            explained_variance[r] = eig.eigenvalues[src].max(0.0);
        }
        Pca { components, explained_variance }
    }
}

/// Standard deviation of all samples of each channel type, broadcast to its
/// channels.
fn pre_whitener(x: &Array2<f64>, types: &[ChannelType]) -> Result<Array1<f64>> {
    let mut out = Array1::<f64>::zeros(types.len());
    let mut kinds = types.to_vec();
    kinds.sort();
    kinds.dedup();
    for kind in kinds {
        let rows: Vec<usize> = (0..types.len()).filter(|&i| types[i] == kind).collect();
        let sel = x.select(Axis(0), &rows);
        let std = sel.std(0.0);
        if std <= 0.0 || !std.is_finite() {
            anyhow::bail!("{kind} channels have zero variance; cannot pre-whiten");
        }
        log::debug!("pre-whitener for {} {kind} channels: {std:.3e}", rows.len());
        for r in rows {
            out[r] = std;
        }
    }
    Ok(out)
}

/// `-1.0` when the largest-magnitude entry is negative, else `1.0`.
fn sign_of_largest(values: impl Iterator<Item = f64>) -> f64 {
    let largest = values.fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
    if largest < 0.0 { -1.0 } else { 1.0 }
}

fn pearson(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let n = a.len().min(b.len()) as f64;
    let ma = a.iter().sum::<f64>() / n;
    let mb = b.iter().sum::<f64>() / n;
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b.iter()) {
        let (dx, dy) = (x - ma, y - mb);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    if saa == 0.0 || sbb == 0.0 { 0.0 } else { sab / (saa * sbb).sqrt() }
}

fn rms<'a>(x: impl Iterator<Item = &'a f64>) -> f64 {
    let (sum, n) = x.fold((0.0, 0usize), |(s, n), v| (s + v * v, n + 1));
    if n == 0 { 0.0 } else { (sum / n as f64).sqrt() }
}

fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    let (r, c) = a.dim();
    DMatrix::from_fn(r, c, |i, j| a[[i, j]])
}

fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}
