//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc high/low/band-pass design, matching
//!   `mne.filter.create_filter(fir_window='hamming', phase='zero')`.
//! - [`apply`]: overlap-add zero-phase convolution, matching MNE's
//!   `_overlap_add_filter`.

pub mod apply;
pub mod design;

pub use apply::{apply_fir_zero_phase, filter_1d, OverlapAdd};
pub use design::{
    auto_filter_length, auto_h_trans_bandwidth, auto_l_trans_bandwidth, design_bandpass,
    design_fir, design_highpass, design_lowpass, firwin, hamming,
};
