// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ndarray::Array2;
use voxfit_core::{EncodingConfig, NoopObserver, TracingObserver, median, summarize};
use voxfit_eval::{
    LogEntry, SyntheticEncodingConfig, append_log, parse_log, run_multi_subjects,
    synthetic_encoding_dataset,
};
use voxfit_features::{fir_embed_flat, reduce_features};

fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn planted_signal_survives_the_full_pipeline() {
    let data = synthetic_encoding_dataset(&SyntheticEncodingConfig {
        n_trs: 160,
        gap_every: 9,
        noise_std: 0.2,
        ..SyntheticEncodingConfig::default()
    })
    .expect("synthetic data");

    let config = EncodingConfig {
        kfold: 4,
        alphas: vec![1e-2, 1.0, 1e2],
        pca_dim: None,
        ..EncodingConfig::default()
    };
    let reduced = reduce_features(data.aligned.view(), config.effective_pca_dim()).expect("reduce");
    let x = fir_embed_flat(reduced.view(), config.fir_window, config.fir_offset).expect("fir");
    let subjects: Vec<u32> = data.responses.keys().copied().collect();
    let observer = TracingObserver::new("synthetic");

    let result =
        run_multi_subjects(x.view(), &data.responses, &subjects, &config, &observer).expect("fit");
    assert_eq!(result.subject_means.len(), 3);
    assert_eq!(result.last_correlation_map.len(), 8);
    for &mean in &result.subject_means {
        assert!(mean > 0.8, "planted signal should be recovered, got {mean}");
    }

    let stats = result.summary().expect("non-empty");
    let means = &result.subject_means;
    let n = means.len() as f64;
    let mean = means.iter().sum::<f64>() / n;
    let std = (means.iter().map(|m| (m - mean) * (m - mean)).sum::<f64>() / n).sqrt();
    assert_close(stats.mean, mean, 1e-12);
    assert_close(stats.std, std, 1e-12);
    assert_close(stats.median, median(means), 1e-12);
    assert_eq!(stats.min, means.iter().copied().fold(f64::INFINITY, f64::min));
    assert_eq!(stats.max, means.iter().copied().fold(f64::NEG_INFINITY, f64::max));
}

#[test]
fn nan_subject_poisons_every_statistic() {
    let stats = summarize(&[0.1, f64::NAN, 0.3]).expect("non-empty");
    assert!(stats.mean.is_nan());
    assert!(stats.std.is_nan());
    assert!(stats.min.is_nan());
    assert!(stats.max.is_nan());
    assert!(stats.median.is_nan());
}

#[test]
fn constant_response_subject_poisons_the_run_summary() {
    let mut data = synthetic_encoding_dataset(&SyntheticEncodingConfig {
        n_trs: 80,
        subjects: vec![75, 131],
        ..SyntheticEncodingConfig::default()
    })
    .expect("synthetic data");
    data.responses.insert(190, Array2::from_elem((80, 8), 2.0));
    let config = EncodingConfig {
        excluded_start: 5,
        excluded_end: 5,
        single_split_alpha: 1.0,
        ..EncodingConfig::default()
    };
    let x = fir_embed_flat(data.aligned.view(), 4, 1).expect("fir");

    let result = run_multi_subjects(x.view(), &data.responses, &[75, 190, 131], &config, &NoopObserver)
        .expect("degenerate targets are not errors");
    assert!(result.subject_means[0].is_finite());
    assert!(result.subject_means[1].is_nan());
    assert!(result.last_correlation_map.iter().all(|r| r.is_finite()));

    let stats = result.summary().expect("non-empty");
    assert!(stats.has_nan());
    assert!(stats.mean.is_nan());
    assert!(stats.std.is_nan());
    assert!(stats.min.is_nan());
    assert!(stats.max.is_nan());
    assert!(stats.median.is_nan());
}

#[test]
fn completed_configurations_stay_in_the_log() {
    let data = synthetic_encoding_dataset(&SyntheticEncodingConfig {
        n_trs: 80,
        subjects: vec![75, 131],
        ..SyntheticEncodingConfig::default()
    })
    .expect("synthetic data");
    let config = EncodingConfig {
        excluded_start: 5,
        excluded_end: 5,
        single_split_alpha: 1.0,
        ..EncodingConfig::default()
    };
    let path = std::env::temp_dir().join(format!("voxfit-e2e-{}.txt", std::process::id()));
    let _ = std::fs::remove_file(&path);

    for layer in [1usize, 2] {
        let x = fir_embed_flat(data.aligned.view(), 4, 1).expect("fir");
        let result = run_multi_subjects(x.view(), &data.responses, &[75, 131], &config, &NoopObserver)
            .expect("fit");
        let entry = LogEntry::for_layer(layer, result.summary().expect("stats")).with_tag("model", "synthetic");
        append_log(&path, &entry).expect("append");
    }
    // A failing configuration must not disturb what was already written.
    let missing = run_multi_subjects(
        data.aligned.view(),
        &data.responses,
        &[999],
        &config,
        &NoopObserver,
    );
    assert!(missing.is_err_and(|err| err.is_configuration_error()));

    let entries = parse_log(&std::fs::read_to_string(&path).expect("log")).expect("parse");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].tag("layer"), Some("1"));
    assert_eq!(entries[1].tag("model"), Some("synthetic"));
    let _ = std::fs::remove_file(&path);
}
