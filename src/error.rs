//! Typed failures of the artifact-removal workflow.
//!
//! Fallible functions in this crate return [`anyhow::Result`]; the variants
//! below are what ends up inside the `anyhow::Error` when the failure is a
//! domain condition rather than I/O.  Match on them with
//! `err.downcast_ref::<artica::Error>()`.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("component index {index} out of range for {n_components} components")]
    ExcludeOutOfRange { index: usize, n_components: usize },

    #[error("ICA did not converge after {max_iter} iterations (tol = {tol:e}, last change = {last:e})")]
    NotConverged { max_iter: usize, tol: f64, last: f64 },

    #[error("no {0} epochs found")]
    NoEpochs(&'static str),

    #[error("channel {0:?} used to fit the decomposition is missing from the recording")]
    MissingChannel(String),

    #[error("unknown channel type {0:?}")]
    UnknownChannelType(String),

    #[error("crop window [{tmin}, {tmax}] s is outside the recording (duration {duration} s)")]
    InvalidCrop { tmin: f64, tmax: f64, duration: f64 },

    #[error("n_components = {requested} is invalid for {available} channels")]
    InvalidComponents { requested: usize, available: usize },

    #[error("no channels of type {0}")]
    NoChannels(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("baseline window ({tmin:?}, {tmax:?}) selects no samples")]
    InvalidBaseline { tmin: Option<f64>, tmax: Option<f64> },

    #[error("singular matrix in {0}")]
    Singular(&'static str),
}
