//! FIFF format constants.
//!
//! Names follow `mne/_fiff/constants.py` so the reader can be checked
//! against MNE tag by tag.  Only the codes this crate reads are listed.
//!
//! A FIF file is a chain of **tags** (16-byte header + payload) grouped into
//! nested **blocks** by `FIFF_BLOCK_START` / `FIFF_BLOCK_END` sentinels.

// ── Block kinds ───────────────────────────────────────────────────────────

/// Measurement block: top-level container for one recording.
pub const FIFFB_MEAS:            i32 = 100;
/// Channel metadata, sfreq, bad channels.
pub const FIFFB_MEAS_INFO:       i32 = 101;
/// Raw (continuous) data block.
pub const FIFFB_RAW_DATA:        i32 = 102;
/// Continuous data block written by some acquisition systems.
pub const FIFFB_CONTINUOUS_DATA: i32 = 112;

// ── Tag kinds ─────────────────────────────────────────────────────────────

pub const FIFF_FILE_ID:      i32 = 100;
/// Payload is the byte offset of the embedded tag directory (or -1).
pub const FIFF_DIR_POINTER:  i32 = 101;
pub const FIFF_BLOCK_START:  i32 = 104;
pub const FIFF_BLOCK_END:    i32 = 105;

pub const FIFF_NCHAN:        i32 = 200;
pub const FIFF_SFREQ:        i32 = 201;
pub const FIFF_CH_INFO:      i32 = 203;
pub const FIFF_COMMENT:      i32 = 206;
pub const FIFF_FIRST_SAMPLE: i32 = 208;
pub const FIFF_EXPERIMENTER: i32 = 212;
/// Online lowpass in Hz; NaN when unset.
pub const FIFF_LOWPASS:      i32 = 219;
/// Colon-separated bad channel names.
pub const FIFF_BAD_CHS:      i32 = 220;
/// Online highpass in Hz; NaN when unset.
pub const FIFF_HIGHPASS:     i32 = 223;
pub const FIFF_LINE_FREQ:    i32 = 235;

/// Interleaved `[n_samp, n_chan]` big-endian samples.
pub const FIFF_DATA_BUFFER:  i32 = 300;
/// Skip `n` whole buffers.
pub const FIFF_DATA_SKIP:    i32 = 301;

// ── Tag payload types ─────────────────────────────────────────────────────

pub const FIFFT_SHORT:            u32 = 2;
pub const FIFFT_INT:              u32 = 3;
pub const FIFFT_FLOAT:            u32 = 4;
pub const FIFFT_DOUBLE:           u32 = 5;
pub const FIFFT_STRING:           u32 = 10;
pub const FIFFT_DAU_PACK16:       u32 = 16;
pub const FIFFT_CH_INFO_STRUCT:   u32 = 30;
pub const FIFFT_DIR_ENTRY_STRUCT: u32 = 32;

// ── `next` sentinels ──────────────────────────────────────────────────────

/// Next tag follows immediately.
pub const FIFFV_NEXT_SEQ:  i32 = 0;
/// End of the tag chain.
pub const FIFFV_NEXT_NONE: i32 = -1;

// ── Channel kinds (`ChannelInfo::kind`) ───────────────────────────────────

/// MEG sensor; magnetometer vs gradiometer is decided by the unit.
pub const FIFFV_MEG_CH:  i32 = 1;
pub const FIFFV_EEG_CH:  i32 = 2;
pub const FIFFV_STIM_CH: i32 = 3;
pub const FIFFV_EOG_CH:  i32 = 202;
pub const FIFFV_EMG_CH:  i32 = 302;
pub const FIFFV_ECG_CH:  i32 = 402;
pub const FIFFV_MISC_CH: i32 = 502;

// ── Units (`ChannelInfo::unit`) ───────────────────────────────────────────

pub const FIFF_UNIT_V:   i32 = 107;
/// Tesla (magnetometers).
pub const FIFF_UNIT_T:   i32 = 112;
/// Tesla per metre (planar gradiometers).
pub const FIFF_UNIT_T_M: i32 = 201;

/// Bytes occupied by one sample of a data-buffer tag type.
///
/// ```
/// use artica::fiff::constants::{bytes_per_sample, FIFFT_FLOAT, FIFFT_SHORT};
/// assert_eq!(bytes_per_sample(FIFFT_FLOAT), Some(4));
/// assert_eq!(bytes_per_sample(FIFFT_SHORT), Some(2));
/// assert_eq!(bytes_per_sample(99), None);
/// ```
pub fn bytes_per_sample(tag_type: u32) -> Option<usize> {
    match tag_type {
        FIFFT_DAU_PACK16 | FIFFT_SHORT => Some(2),
        FIFFT_FLOAT | FIFFT_INT        => Some(4),
        FIFFT_DOUBLE                   => Some(8),
        _                              => None,
    }
}
