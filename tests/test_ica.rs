mod common;
use common::{synthetic_recording, FRONTAL_EEG};

use artica::{ChannelType, Error, Ica, IcaParams, MaxIter, Raw};
use ndarray::ArrayView1;

fn corr(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let n = a.len() as f64;
    let (ma, mb) = (a.sum() / n, b.sum() / n);
    let cov: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - ma) * (y - mb)).sum();
    let va: f64 = a.iter().map(|x| (x - ma).powi(2)).sum();
    let vb: f64 = b.iter().map(|y| (y - mb).powi(2)).sum();
    cov / (va * vb).sqrt()
}

/// 60 s recording and the model fitted on its 1 Hz high-passed copy.
fn fitted() -> (Raw, Ica) {
    let raw = synthetic_recording(60.0).raw;
    let filtered = raw.filter(Some(1.0), None).unwrap();
    let ica = IcaParams::default().fit(&filtered).unwrap();
    (raw, ica)
}

fn blink_component(ica: &Ica, raw: &Raw) -> (usize, f64) {
    let scores = ica.score_sources(raw, "EOG 061").unwrap();
    scores
        .iter()
        .enumerate()
        .map(|(i, r)| (i, r.abs()))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best })
}

// ── Fit ───────────────────────────────────────────────────────────────────────

#[test]
fn fit_uses_good_data_channels_only() {
    let mut raw = synthetic_recording(20.0).raw;
    raw.pick(&[ChannelType::Mag, ChannelType::Eeg, ChannelType::Stim, ChannelType::Eog]).unwrap();
    raw.info.bads.push("EEG 010".into());

    let ica = IcaParams::default().fit(&raw.filter(Some(1.0), None).unwrap()).unwrap();
    assert_eq!(ica.ch_names.len(), 29);
    assert!(!ica.ch_names.iter().any(|n| n == "EEG 010" || n == "STI 014" || n == "EOG 061"));
    assert_eq!(ica.n_components(), 15);
    assert_eq!(ica.pca_explained_variance.len(), 29);
    assert!(ica.exclude().is_empty());

    let text = ica.to_string();
    assert!(text.contains("15 ICA components (29 PCA components available)"), "{text}");
    assert!(text.contains("channel types: mag, eeg"), "{text}");
    assert!(text.contains("0 sources marked for exclusion"), "{text}");
}

#[test]
fn pca_variance_is_sorted_and_mixing_inverts_unmixing() {
    let (_, ica) = fitted();
    let var = &ica.pca_explained_variance;
    assert!(var.windows(2).into_iter().all(|w| w[0] >= w[1]));

    let k = ica.n_components();
    let eye = ica.mixing.dot(&ica.unmixing);
    for i in 0..k {
        for j in 0..k {
            approx::assert_abs_diff_eq!(eye[[i, j]], if i == j { 1.0 } else { 0.0 }, epsilon = 1e-8);
        }
    }
}

#[test]
fn seeded_fit_is_reproducible() {
    let raw = synthetic_recording(20.0).raw.filter(Some(1.0), None).unwrap();
    let a = IcaParams::default().fit(&raw).unwrap();
    let b = IcaParams::default().fit(&raw).unwrap();
    assert_eq!(a, b);
}

#[test]
fn capped_iterations_report_non_convergence() {
    let raw = synthetic_recording(20.0).raw.filter(Some(1.0), None).unwrap();
    let params = IcaParams { max_iter: MaxIter::Fixed(1), ..IcaParams::default() };
    let err = params.fit(&raw).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotConverged { max_iter: 1, .. })));
}

#[test]
fn too_many_components_are_rejected() {
    let raw = synthetic_recording(5.0).raw;
    let params = IcaParams { n_components: 33, ..IcaParams::default() };
    let err = params.fit(&raw).unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::InvalidComponents { requested: 33, available: 32 })
    );
}

// ── Apply ─────────────────────────────────────────────────────────────────────

#[test]
fn one_component_carries_the_blinks() {
    let (raw, ica) = fitted();
    let (_, score) = blink_component(&ica, &raw);
    assert!(score > 0.9, "best |r| with EOG is {score:.3}");
}

#[test]
fn removing_the_blink_component_decorrelates_frontal_eeg() {
    let (raw, mut ica) = fitted();
    let (blink, _) = blink_component(&ica, &raw);
    ica.set_exclude(&[blink]).unwrap();
    let cleaned = ica.apply(&raw).unwrap();

    let eog = raw.channel("EOG 061").unwrap();
    for name in FRONTAL_EEG {
        let before = corr(raw.channel(name).unwrap(), eog).abs();
        let after = corr(cleaned.channel(name).unwrap(), eog).abs();
        assert!(before > 0.3, "{name}: |r| before cleaning {before:.3}");
        assert!(after < 0.1, "{name}: |r| after cleaning {after:.3}");
    }
    assert_eq!(cleaned.channel("EOG 061").unwrap(), eog);
    assert_eq!(cleaned.channel("STI 014").unwrap(), raw.channel("STI 014").unwrap());
    assert_eq!(raw.info, cleaned.info);
}

#[test]
fn empty_exclusion_returns_the_input() {
    let (raw, ica) = fitted();
    assert_eq!(ica.apply(&raw).unwrap(), raw);
    assert_eq!(ica.apply_excluding(&raw, &[]).unwrap(), raw);
}

#[test]
fn exclusion_is_validated_sorted_and_deduplicated() {
    let (raw, mut ica) = fitted();
    ica.set_exclude(&[4, 1, 4]).unwrap();
    assert_eq!(ica.exclude(), &[1, 4]);

    let err = ica.set_exclude(&[15]).unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::ExcludeOutOfRange { index: 15, n_components: 15 })
    );
    assert_eq!(ica.exclude(), &[1, 4]);
    assert!(ica.apply_excluding(&raw, &[0, 99]).is_err());
}

#[test]
fn applying_to_a_recording_without_fitted_channels_fails() {
    let (mut raw, ica) = fitted();
    raw.pick(&[ChannelType::Eeg, ChannelType::Eog]).unwrap();
    let err = ica.apply_excluding(&raw, &[0]).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::MissingChannel(_))));
}

#[test]
fn empty_exclusion_still_requires_the_fitted_channels() {
    let (mut raw, ica) = fitted();
    raw.pick(&[ChannelType::Eeg, ChannelType::Eog]).unwrap();
    assert!(ica.exclude().is_empty());
    for result in [ica.apply(&raw), ica.apply_excluding(&raw, &[])] {
        let err = result.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::MissingChannel(_))));
    }
}

#[test]
fn overlay_shows_the_reduction_on_frontal_channels() {
    let (raw, ica) = fitted();
    let (blink, _) = blink_component(&ica, &raw);
    let overlay = ica.overlay(&raw, &[blink], &[ChannelType::Eeg]).unwrap();
    assert_eq!(overlay.ch_names.len(), 10);
    assert_eq!(overlay.exclude, vec![blink]);
    for (name, (before, after)) in overlay.ch_names.iter().zip(overlay.rms()) {
        if FRONTAL_EEG.contains(&name.as_str()) {
            assert!(after < before, "{name}: rms {before:.3e} → {after:.3e}");
        }
    }
    assert!(overlay.mean_reduction() > 0.0);
}
