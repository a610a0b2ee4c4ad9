// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ndarray::Array2;
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use voxfit_ridge::{KFold, Ridge, aggregate_fold_correlations};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/proptest_invariants.txt"))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn kfold_tiles_rows_in_order(n in 2usize..200, k in 2usize..12) {
        prop_assume!(k <= n);
        let folds = KFold::new(k).expect("k >= 2").split(n).expect("k <= n");
        prop_assert_eq!(folds.len(), k);

        let mut next = 0usize;
        for fold in &folds {
            prop_assert_eq!(fold.test.start, next);
            prop_assert!(!fold.test.is_empty());
            prop_assert_eq!(fold.train.len() + fold.test.len(), n);
            prop_assert!(fold.train.iter().all(|row| !fold.test.contains(row)));
            prop_assert!(fold.train.windows(2).all(|pair| pair[0] < pair[1]));
            next = fold.test.end;
        }
        prop_assert_eq!(next, n);

        let sizes: Vec<usize> = folds.iter().map(|fold| fold.test.len()).collect();
        let largest = sizes.iter().copied().max().unwrap_or(0);
        let smallest = sizes.iter().copied().min().unwrap_or(0);
        prop_assert!(largest - smallest <= 1);
    }

    #[test]
    fn fisher_average_stays_within_fold_range(
        values in prop::collection::vec(-0.99f64..0.99, 2..40),
    ) {
        let folds = Array2::from_shape_vec((values.len(), 1), values.clone()).expect("column");
        let aggregated = aggregate_fold_correlations(folds.view());
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(aggregated[0] >= lo - 1e-12 && aggregated[0] <= hi + 1e-12);
    }

    #[test]
    fn coefficient_norm_shrinks_with_alpha(
        seed_values in prop::collection::vec(-10.0f64..10.0, 60),
        target in prop::collection::vec(-10.0f64..10.0, 20),
        small in 1e-3f64..1.0,
        factor in 2.0f64..1e3,
    ) {
        let x = Array2::from_shape_vec((20, 3), seed_values).expect("20x3");
        let y = Array2::from_shape_vec((20, 1), target).expect("20x1");
        let weak = Ridge::fit(x.view(), y.view(), small).expect("valid");
        let strong = Ridge::fit(x.view(), y.view(), small * factor).expect("valid");
        let norm = |m: &Ridge| m.coef.iter().map(|v| v * v).sum::<f64>();
        prop_assert!(norm(&strong) <= norm(&weak) + 1e-9);
    }
}
