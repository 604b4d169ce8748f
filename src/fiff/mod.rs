//! Native FIFF reader for `*_raw.fif` recordings written by Neuromag/MEGIN
//! systems and MNE-Python.
//!
//! ```no_run
//! use artica::fiff::open_raw;
//!
//! let fif = open_raw("sample_audvis_filt-0-40_raw.fif").unwrap();
//! println!("{}", fif.info);
//! let first_second = fif.read_slice(0, fif.info.sfreq as usize).unwrap();
//! ```
pub mod constants;
pub mod info;
pub mod raw;
pub mod tag;
pub mod tree;

pub use info::{read_meas_info, ChannelInfo, MeasInfo};
pub use raw::{open_raw, BufferRecord, RawFif};
pub use tag::{TagHeader, TagReader};
pub use tree::{read_tree, Node};
