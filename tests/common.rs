/// Shared helpers: a synthetic MEG/EEG recording and a minimal FIF writer.
use artica::fiff::constants::*;
use artica::{ChannelInfo, MeasInfo, Raw};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use std::path::Path;

pub const SFREQ: f64 = 150.0;

/// Frontal magnetometers, all matched by the default artifact regexp.
pub const FRONTAL_MAGS: [&str; 10] = [
    "MEG 1411", "MEG 1421", "MEG 1431", "MEG 1511", "MEG 1521",
    "MEG 1531", "MEG 2411", "MEG 2421", "MEG 2431", "MEG 2511",
];
pub const OTHER_MAGS: [&str; 10] = [
    "MEG 0111", "MEG 0121", "MEG 0131", "MEG 0211", "MEG 0221",
    "MEG 0231", "MEG 0311", "MEG 0321", "MEG 0331", "MEG 0411",
];
pub const FRONTAL_EEG: [&str; 3] = ["EEG 001", "EEG 002", "EEG 003"];
pub const GRADS: [&str; 2] = ["MEG 0112", "MEG 0113"];
pub const N_EEG: usize = 10;
pub const N_BACKGROUND: usize = 13;

#[allow(unused)]
pub struct Synthetic {
    pub raw:    Raw,
    /// Blink peak samples.
    pub blinks: Vec<usize>,
    /// Heartbeat peak samples.
    pub beats:  Vec<usize>,
}

pub fn channel(name: &str, kind: i32, unit: i32) -> ChannelInfo {
    ChannelInfo {
        scan_no: 1,
        log_no: 1,
        kind,
        range: 1.0,
        cal: 1.0,
        coil_type: 0,
        loc: [0.0; 12],
        unit,
        unit_mul: 0,
        name: name.to_string(),
    }
}

/// 20 mags, 2 grads, 10 EEG, one stim and one EOG channel, in that order.
pub fn channels() -> Vec<ChannelInfo> {
    let mut chs: Vec<ChannelInfo> = FRONTAL_MAGS
        .iter()
        .chain(OTHER_MAGS.iter())
        .map(|n| channel(n, FIFFV_MEG_CH, FIFF_UNIT_T))
        .collect();
    chs.extend(GRADS.iter().map(|n| channel(n, FIFFV_MEG_CH, FIFF_UNIT_T_M)));
    chs.extend((1..=N_EEG).map(|i| channel(&format!("EEG {i:03}"), FIFFV_EEG_CH, FIFF_UNIT_V)));
    chs.push(channel("STI 014", FIFFV_STIM_CH, 0));
    chs.push(channel("EOG 061", FIFFV_EOG_CH, FIFF_UNIT_V));
    chs
}

/// Gaussian bump of width `sigma` samples centred on every peak.
fn pulse_train(n: usize, peaks: &[usize], sigma: f64, amps: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; n];
    let reach = (5.0 * sigma).ceil() as usize;
    for (&p, &a) in peaks.iter().zip(amps) {
        for t in p.saturating_sub(reach)..(p + reach + 1).min(n) {
            let d = (t as f64 - p as f64) / sigma;
            out[t] += a * (-0.5 * d * d).exp();
        }
    }
    out
}

/// Deterministic recording of `seconds` seconds.
///
/// Sources: blinks (≈ every 4 s, 0.1 s wide, frontal channels and EOG),
/// heartbeats (≈ every 0.9 s, 20 ms wide, same sign on every
/// magnetometer) and 13 uniform background sources, mixed into mag and EEG
/// channels with 1 % Gaussian sensor noise.
pub fn synthetic_recording(seconds: f64) -> Synthetic {
    let mut rng = StdRng::seed_from_u64(2024);
    let n = (seconds * SFREQ) as usize;

    let mut blinks = Vec::new();
    let mut t = 2.0;
    while t < seconds - 1.0 {
        blinks.push((t * SFREQ) as usize);
        t += rng.gen_range(3.0..5.0);
    }
    let blink_amps: Vec<f64> = blinks.iter().map(|_| rng.gen_range(0.8..1.0)).collect();

    let mut beats = Vec::new();
    let mut t = 0.4;
    while t < seconds - 0.2 {
        beats.push((t * SFREQ) as usize);
        t += rng.gen_range(0.85..1.0);
    }
    let beat_amps = vec![1.0; beats.len()];

    let blink = pulse_train(n, &blinks, 0.1 * SFREQ, &blink_amps);
    let heart = pulse_train(n, &beats, 0.02 * SFREQ, &beat_amps);
    let background: Vec<Vec<f64>> = (0..N_BACKGROUND)
        .map(|_| (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();

    let chs = channels();
    let n_chan = chs.len();
    let mut data = Array2::<f64>::zeros((n_chan, n));
    let mut normal = || -> f64 { StandardNormal.sample(&mut rng) };

    for (c, ch) in chs.iter().enumerate() {
        let name = ch.name.as_str();
        let frontal = FRONTAL_MAGS.contains(&name) || FRONTAL_EEG.contains(&name);
        let (scale, w_blink, w_heart) = match ch.kind {
            FIFFV_MEG_CH => (1e-12, if frontal { 3.0 } else { 0.3 }, 4.0 + normal().abs()),
            FIFFV_EEG_CH => (1e-5, if frontal { 8.0 } else { 2.0 }, 0.5 * normal()),
            _ => continue,
        };
        let w_bg: Vec<f64> = (0..N_BACKGROUND).map(|_| normal()).collect();
        for t in 0..n {
            let mut v = w_blink * blink[t] + w_heart * heart[t];
            for (w, s) in w_bg.iter().zip(&background) {
                v += w * s[t];
            }
            v += 0.01 * normal();
            data[[c, t]] = v * scale;
        }
    }

    let stim = n_chan - 2;
    for t in (3 * SFREQ as usize..n).step_by(2 * SFREQ as usize) {
        data[[stim, t]] = 1.0;
    }
    let eog = n_chan - 1;
    for t in 0..n {
        data[[eog, t]] = (blink[t] + 0.01 * normal()) * 1e-4;
    }

    let raw = Raw::new(MeasInfo::new(chs, SFREQ), data, 0).expect("consistent shape");
    Synthetic { raw, blinks, beats }
}

fn tag(out: &mut Vec<u8>, kind: i32, ftype: u32, payload: &[u8], next: i32) {
    out.extend_from_slice(&kind.to_be_bytes());
    out.extend_from_slice(&ftype.to_be_bytes());
    out.extend_from_slice(&(payload.len() as i32).to_be_bytes());
    out.extend_from_slice(&next.to_be_bytes());
    out.extend_from_slice(payload);
}

/// Write `raw` as a FIF file: float buffers of `buffer_len` samples, no
/// embedded directory (readers walk the tag chain).
#[allow(unused)]
pub fn write_fif(path: &Path, raw: &Raw, buffer_len: usize) {
    let info = &raw.info;
    let seq = FIFFV_NEXT_SEQ;
    let mut b = Vec::new();

    tag(&mut b, FIFF_FILE_ID, FIFFT_INT, &[0u8; 20], seq);
    tag(&mut b, FIFF_DIR_POINTER, FIFFT_INT, &(-1_i32).to_be_bytes(), seq);
    tag(&mut b, FIFF_BLOCK_START, FIFFT_INT, &FIFFB_MEAS.to_be_bytes(), seq);
    tag(&mut b, FIFF_BLOCK_START, FIFFT_INT, &FIFFB_MEAS_INFO.to_be_bytes(), seq);
    tag(&mut b, FIFF_NCHAN, FIFFT_INT, &(info.n_chan as i32).to_be_bytes(), seq);
    tag(&mut b, FIFF_SFREQ, FIFFT_FLOAT, &(info.sfreq as f32).to_be_bytes(), seq);
    if let Some(lp) = info.lowpass {
        tag(&mut b, FIFF_LOWPASS, FIFFT_FLOAT, &(lp as f32).to_be_bytes(), seq);
    }
    if let Some(hp) = info.highpass {
        tag(&mut b, FIFF_HIGHPASS, FIFFT_FLOAT, &(hp as f32).to_be_bytes(), seq);
    }
    tag(&mut b, FIFF_LINE_FREQ, FIFFT_FLOAT, &60.0_f32.to_be_bytes(), seq);
    tag(&mut b, FIFF_EXPERIMENTER, FIFFT_STRING, b"synthetic", seq);
    for ch in &info.chs {
        tag(&mut b, FIFF_CH_INFO, FIFFT_CH_INFO_STRUCT, &ch.to_bytes(), seq);
    }
    if !info.bads.is_empty() {
        tag(&mut b, FIFF_BAD_CHS, FIFFT_STRING, info.bads.join(":").as_bytes(), seq);
    }
    tag(&mut b, FIFF_BLOCK_END, FIFFT_INT, &FIFFB_MEAS_INFO.to_be_bytes(), seq);

    tag(&mut b, FIFF_BLOCK_START, FIFFT_INT, &FIFFB_RAW_DATA.to_be_bytes(), seq);
    tag(&mut b, FIFF_FIRST_SAMPLE, FIFFT_INT, &(raw.first_samp as i32).to_be_bytes(), seq);
    let cals = info.cals();
    let n_times = raw.n_times();
    for start in (0..n_times).step_by(buffer_len) {
        let end = (start + buffer_len).min(n_times);
        let mut payload = Vec::with_capacity((end - start) * info.n_chan * 4);
        for t in start..end {
            for c in 0..info.n_chan {
                payload.extend_from_slice(&((raw.data[[c, t]] / cals[c]) as f32).to_be_bytes());
            }
        }
        tag(&mut b, FIFF_DATA_BUFFER, FIFFT_FLOAT, &payload, seq);
    }
    tag(&mut b, FIFF_BLOCK_END, FIFFT_INT, &FIFFB_RAW_DATA.to_be_bytes(), seq);
    tag(&mut b, FIFF_BLOCK_END, FIFFT_INT, &FIFFB_MEAS.to_be_bytes(), FIFFV_NEXT_NONE);

    std::fs::write(path, b).expect("write FIF");
}
