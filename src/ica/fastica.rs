//! Parallel FastICA on whitened data.
//!
//! Fixed-point iteration with the `logcosh` contrast (`g = tanh`,
//! `g' = 1 − tanh²`) and symmetric decorrelation after every update:
//!
//! ```text
//! W₁ = E[g(W Z) Zᵀ] − diag(E[g'(W Z)]) W
//! W₁ ← (W₁ W₁ᵀ)^{-1/2} W₁
//! ```
//!
//! Converged when `max |1 − |diag(W₁ Wᵀ)|| < tol`.
use anyhow::Result;
use nalgebra::{DMatrix, SymmetricEigen};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct FastIcaFit {
    /// `[k, k]` unmixing of the whitened input: `S = W Z`.
    pub unmixing: DMatrix<f64>,
    pub n_iter:   usize,
}

/// Run FastICA on `z` (`[k, T]`, zero mean, identity covariance).
pub fn fastica(z: &DMatrix<f64>, max_iter: usize, tol: f64, seed: Option<u64>) -> Result<FastIcaFit> {
    let k = z.nrows();
    let n = z.ncols();
    if k == 0 || n == 0 {
        anyhow::bail!("FastICA needs a non-empty [k, T] matrix (got {k}×{n})");
    }

    let w_init = random_normal(k, seed);
    let mut w = sym_decorrelation(&w_init)?;
    let inv_n = 1.0 / n as f64;
    let mut lim = f64::INFINITY;

    for it in 1..=max_iter {
        let mut g = &w * z;
        let mut gp_mean = vec![0.0_f64; k];
        for (i, mean) in gp_mean.iter_mut().enumerate() {
            let mut row = g.row_mut(i);
            let mut acc = 0.0;
            for v in row.iter_mut() {
                let t = v.tanh();
                acc += 1.0 - t * t;
                *v = t;
            }
            *mean = acc * inv_n;
        }

        let mut w1 = (&g * z.transpose()) * inv_n;
        for i in 0..k {
            for j in 0..k {
                w1[(i, j)] -= gp_mean[i] * w[(i, j)];
            }
        }
        let w1 = sym_decorrelation(&w1)?;

        let overlap = &w1 * w.transpose();
        lim = (0..k)
            .map(|i| (overlap[(i, i)].abs() - 1.0).abs())
            .fold(0.0, f64::max);
        w = w1;
        log::debug!("fastica iteration {it}: lim={lim:.3e}");

        if lim < tol {
            return Ok(FastIcaFit { unmixing: w, n_iter: it });
        }
    }
    Err(Error::NotConverged { max_iter, tol, last: lim }.into())
}

/// `(W Wᵀ)^{-1/2} W`.
pub fn sym_decorrelation(w: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let eig = SymmetricEigen::new(w * w.transpose());
    if eig.eigenvalues.iter().any(|&s| s <= f64::EPSILON) {
        return Err(Error::Singular("symmetric decorrelation").into());
    }
    let u = &eig.eigenvectors;
    let inv_sqrt = DMatrix::from_diagonal(&eig.eigenvalues.map(|s| 1.0 / s.sqrt()));
    Ok(u * inv_sqrt * u.transpose() * w)
}

/// `[k, k]` standard-normal draws, filled row by row.
fn random_normal(k: usize, seed: Option<u64>) -> DMatrix<f64> {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let draws: Vec<f64> = (0..k * k)
        .map(|_| Distribution::<f64>::sample(&StandardNormal, &mut rng))
        .collect();
    DMatrix::from_row_slice(k, k, &draws)
}
