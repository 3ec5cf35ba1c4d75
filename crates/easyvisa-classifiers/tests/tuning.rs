//! Integration tests for the tuning harness, using a one-feature threshold
//! classifier so the winning candidate is known in advance.

use std::sync::atomic::{AtomicUsize, Ordering};

use easyvisa_classifiers::config::{ClassifierSpec, GradientBoostingParams};
use easyvisa_classifiers::error::{BenchError, Result};
use easyvisa_classifiers::evaluation::{Metric, ScoreFn};
use easyvisa_classifiers::models::Classifier;
use easyvisa_classifiers::tuning::{
    tune, CancelFlag, EstimatorFactory, ParamGrid, ParamSet, SearchStrategy, TuneOptions,
    TuneOutcome,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Predicts 1 when the first feature exceeds `threshold`.
struct ThresholdStub {
    threshold: f64,
    fitted: bool,
}

impl Classifier for ThresholdStub {
    fn fit(&mut self, _x: ArrayView2<f64>, _y: ArrayView1<usize>) -> Result<()> {
        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(BenchError::UnfittedModel {
                model: self.name().to_string(),
            });
        }
        Ok(x.column(0).mapv(|v| if v > self.threshold { 1.0 } else { 0.0 }))
    }

    fn name(&self) -> &str {
        "threshold_stub"
    }
}

struct ThresholdFactory;

impl EstimatorFactory for ThresholdFactory {
    fn build(&self, params: &ParamSet) -> Result<Box<dyn Classifier>> {
        let threshold = match params.get("threshold") {
            Some(value) => value.as_f64("threshold")?,
            None => 0.5,
        };
        if threshold < 0.0 {
            return Err(BenchError::InvalidParameter {
                parameter: "threshold".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        Ok(Box::new(ThresholdStub {
            threshold,
            fitted: false,
        }))
    }

    fn family(&self) -> &str {
        "threshold_stub"
    }
}

/// Rows 0..20 with the row index as feature; rows 10.. are positive.
fn ramp() -> (Array2<f64>, Array1<usize>) {
    let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
    let y = Array1::from_shape_fn(20, |i| usize::from(i >= 10));
    (x, y)
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[test]
fn picks_the_separating_threshold() {
    let (x, y) = ramp();
    let grid = ParamGrid::new().with("threshold", [2.5, 9.5, 15.5]);
    let outcome = tune(
        &ThresholdFactory,
        &grid,
        &Metric::F1,
        &TuneOptions::default(),
        x.view(),
        y.view(),
    )
    .unwrap();

    assert_eq!(outcome.best_params.get("threshold").unwrap().as_f64("threshold").unwrap(), 9.5);
    assert!((outcome.best_score - 1.0).abs() < 1e-12);
    assert_eq!(outcome.candidates.len(), 3);
    assert!(outcome.candidates.iter().all(|c| c.fold_scores.len() == 5));
    let predicted = outcome.best_model.predict(x.view()).unwrap();
    assert_eq!(predicted, y);
}

#[test]
fn ties_go_to_the_first_candidate() {
    let (x, y) = ramp();
    let grid = ParamGrid::new().with("threshold", [9.6, 9.5, 9.7]);
    let outcome = tune(
        &ThresholdFactory,
        &grid,
        &Metric::Accuracy,
        &TuneOptions::default(),
        x.view(),
        y.view(),
    )
    .unwrap();
    assert_eq!(outcome.best_params.get("threshold").unwrap().as_f64("threshold").unwrap(), 9.6);
}

#[test]
fn single_candidate_is_returned_whatever_its_score() {
    let (x, y) = ramp();
    let grid = ParamGrid::new().with("threshold", [19.5]);
    let outcome = tune(
        &ThresholdFactory,
        &grid,
        &Metric::F1,
        &TuneOptions::default(),
        x.view(),
        y.view(),
    )
    .unwrap();
    assert_eq!(outcome.best_score, 0.0);
    assert_eq!(outcome.candidates.len(), 1);
}

#[test]
fn fewer_than_two_folds_is_rejected() {
    let (x, y) = ramp();
    let options = TuneOptions {
        cv_folds: 1,
        ..TuneOptions::default()
    };
    let grid = ParamGrid::new().with("threshold", [9.5]);
    let err = tune(&ThresholdFactory, &grid, &Metric::F1, &options, x.view(), y.view()).unwrap_err();
    assert!(matches!(err, BenchError::InvalidFolds(1)));
}

#[test]
fn parallel_and_serial_runs_agree() {
    let (x, y) = ramp();
    let grid = ParamGrid::new().with("threshold", [0.5, 4.5, 9.5, 12.5, 18.5]);
    let serial = TuneOptions {
        n_jobs: 1,
        ..TuneOptions::default()
    };
    let parallel = TuneOptions {
        n_jobs: 4,
        ..TuneOptions::default()
    };
    let a = tune(&ThresholdFactory, &grid, &Metric::F1, &serial, x.view(), y.view()).unwrap();
    let b = tune(&ThresholdFactory, &grid, &Metric::F1, &parallel, x.view(), y.view()).unwrap();
    assert_eq!(a.best_params, b.best_params);
    let scores_a: Vec<_> = a.candidates.iter().map(|c| c.mean_score).collect();
    let scores_b: Vec<_> = b.candidates.iter().map(|c| c.mean_score).collect();
    assert_eq!(scores_a, scores_b);
}

#[test]
fn custom_scorer_is_used() {
    let (x, y) = ramp();
    // rewards predicting as few positives as possible
    let fewest_positives = ScoreFn::new("fewest_positives", |_truth, predicted| {
        -(predicted.iter().sum::<usize>() as f64)
    });
    let grid = ParamGrid::new().with("threshold", [2.5, 9.5, 19.5]);
    let outcome = tune(
        &ThresholdFactory,
        &grid,
        &fewest_positives,
        &TuneOptions::default(),
        x.view(),
        y.view(),
    )
    .unwrap();
    assert_eq!(outcome.best_params.get("threshold").unwrap().as_f64("threshold").unwrap(), 19.5);
}

#[test]
fn randomized_search_visits_n_iter_candidates() {
    let (x, y) = ramp();
    let grid = ParamGrid::new().with("threshold", [1.5, 3.5, 5.5, 7.5, 9.5, 11.5]);
    let options = TuneOptions {
        strategy: SearchStrategy::Randomized { n_iter: 3 },
        seed: 7,
        ..TuneOptions::default()
    };
    let outcome = tune(&ThresholdFactory, &grid, &Metric::F1, &options, x.view(), y.view()).unwrap();
    assert_eq!(outcome.candidates.len(), 3);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn failing_candidates_are_skipped() {
    let (x, y) = ramp();
    let grid = ParamGrid::new().with("threshold", [-1.0, 9.5, -2.0]);
    let outcome = tune(
        &ThresholdFactory,
        &grid,
        &Metric::F1,
        &TuneOptions::default(),
        x.view(),
        y.view(),
    )
    .unwrap();
    assert_eq!(outcome.best_params.get("threshold").unwrap().as_f64("threshold").unwrap(), 9.5);
    let failed: Vec<_> = outcome.candidates.iter().filter(|c| c.error.is_some()).collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|c| c.mean_score.is_none()));
}

#[test]
fn all_candidates_failing_is_an_error() {
    let (x, y) = ramp();
    let grid = ParamGrid::new().with("threshold", [-1.0, -2.0]);
    let err = tune(
        &ThresholdFactory,
        &grid,
        &Metric::F1,
        &TuneOptions::default(),
        x.view(),
        y.view(),
    )
    .unwrap_err();
    assert!(matches!(err, BenchError::NoViableCandidate(2)));
}

#[test]
fn empty_grid_axis_is_rejected() {
    let (x, y) = ramp();
    let grid = ParamGrid::new()
        .with("threshold", [9.5])
        .with("unused", Vec::<f64>::new());
    let err = tune(
        &ThresholdFactory,
        &grid,
        &Metric::F1,
        &TuneOptions::default(),
        x.view(),
        y.view(),
    )
    .unwrap_err();
    assert!(matches!(err, BenchError::EmptyGrid { ref parameter } if parameter == "unused"));
}

#[test]
fn too_few_positives_for_the_folds() {
    let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
    let y = Array1::from_shape_fn(20, |i| usize::from(i >= 17));
    let grid = ParamGrid::new().with("threshold", [16.5]);
    let err = tune(
        &ThresholdFactory,
        &grid,
        &Metric::F1,
        &TuneOptions::default(),
        x.view(),
        y.view(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        BenchError::InsufficientData { class: 1, count: 3, folds: 5 }
    ));
}

#[test]
fn shape_mismatch_aborts_before_fitting() {
    let x = Array2::<f64>::zeros((10, 1));
    let y = Array1::from_vec(vec![0, 1, 0, 1]);
    let grid = ParamGrid::new().with("threshold", [0.5]);
    let err = tune(
        &ThresholdFactory,
        &grid,
        &Metric::F1,
        &TuneOptions::default(),
        x.view(),
        y.view(),
    )
    .unwrap_err();
    assert!(matches!(err, BenchError::ShapeMismatch { features: 10, labels: 4 }));
}

#[test]
fn cancelled_search_reports_cancellation() {
    let (x, y) = ramp();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let options = TuneOptions {
        cancel,
        ..TuneOptions::default()
    };
    let grid = ParamGrid::new().with("threshold", [9.5]);
    let err = tune(&ThresholdFactory, &grid, &Metric::F1, &options, x.view(), y.view()).unwrap_err();
    assert!(matches!(err, BenchError::Cancelled));
}

#[test]
fn non_finite_scores_are_never_chosen() {
    let (x, y) = ramp();
    // undefined when nothing is predicted positive
    let nan_without_positives = ScoreFn::new("nan_without_positives", |truth, predicted| {
        if predicted.iter().all(|&p| p == 0) {
            f64::NAN
        } else {
            Metric::F1.compute(truth, predicted)
        }
    });
    let grid = ParamGrid::new().with("threshold", [19.5, 2.5, 9.5]);
    let outcome = tune(
        &ThresholdFactory,
        &grid,
        &nan_without_positives,
        &TuneOptions::default(),
        x.view(),
        y.view(),
    )
    .unwrap();
    assert_eq!(outcome.best_params.get("threshold").unwrap().as_f64("threshold").unwrap(), 9.5);
    assert!(outcome.best_score.is_finite());
    let first = &outcome.candidates[0];
    assert!(first.mean_score.is_none());
    assert!(first.error.as_deref().unwrap().contains("non-finite"));
}

#[test]
fn repeated_grid_parameter_is_rejected() {
    let (x, y) = ramp();
    let json = r#"[{"name": "threshold", "values": [2.5]}, {"name": "threshold", "values": [9.5]}]"#;
    let grid: ParamGrid = serde_json::from_str(json).unwrap();
    let err = tune(
        &ThresholdFactory,
        &grid,
        &Metric::F1,
        &TuneOptions::default(),
        x.view(),
        y.view(),
    )
    .unwrap_err();
    assert!(matches!(err, BenchError::InvalidParameter { ref parameter, .. } if parameter == "threshold"));
}

/// Threshold factory that raises the shared cancel flag on its `cancel_at`-th build.
struct CancellingFactory {
    cancel: CancelFlag,
    cancel_at: usize,
    builds: AtomicUsize,
}

impl EstimatorFactory for CancellingFactory {
    fn build(&self, params: &ParamSet) -> Result<Box<dyn Classifier>> {
        if self.builds.fetch_add(1, Ordering::SeqCst) + 1 == self.cancel_at {
            self.cancel.cancel();
        }
        ThresholdFactory.build(params)
    }

    fn family(&self) -> &str {
        "threshold_stub"
    }
}

#[test]
fn cancelling_mid_search_keeps_only_complete_candidates() {
    let (x, y) = ramp();
    let cancel = CancelFlag::new();
    // the second candidate is cancelled after two of its five folds
    let factory = CancellingFactory {
        cancel: cancel.clone(),
        cancel_at: 7,
        builds: AtomicUsize::new(0),
    };
    let options = TuneOptions {
        n_jobs: 1,
        cancel,
        ..TuneOptions::default()
    };
    let grid = ParamGrid::new().with("threshold", [2.5, 9.5, 15.5]);
    let outcome = tune(&factory, &grid, &Metric::F1, &options, x.view(), y.view()).unwrap();

    assert_eq!(outcome.candidates.len(), 1);
    assert!(outcome.candidates.iter().all(|c| c.fold_scores.len() == 5 && c.mean_score.is_some()));
    assert_eq!(outcome.best_params, outcome.candidates[0].params);
    assert_eq!(outcome.best_params.get("threshold").unwrap().as_f64("threshold").unwrap(), 2.5);
}

// ---------------------------------------------------------------------------
// Real classifier families
// ---------------------------------------------------------------------------

#[test]
fn tunes_a_decision_tree_spec() {
    // the classes are separated by a wide gap on the first feature
    let x = Array2::from_shape_fn((40, 2), |(i, j)| match (j, i >= 20) {
        (0, false) => i as f64,
        (0, true) => i as f64 + 20.0,
        _ => (i % 4) as f64,
    });
    let y = Array1::from_shape_fn(40, |i| usize::from(i >= 20));
    let spec: ClassifierSpec = "decision_tree".parse().unwrap();
    let grid = ParamGrid::new()
        .with("max_depth", [Some(1usize), Some(3)])
        .with("min_samples_leaf", [1usize, 2]);
    let outcome = tune(&spec, &grid, &Metric::F1, &TuneOptions::default(), x.view(), y.view()).unwrap();
    assert_eq!(outcome.candidates.len(), 4);
    assert!((outcome.best_score - 1.0).abs() < 1e-12);
}

#[test]
fn unknown_parameter_fails_every_candidate() {
    let (x, y) = ramp();
    let spec: ClassifierSpec = "decision_tree".parse().unwrap();
    let grid = ParamGrid::new().with("gamma", [0.1, 0.2]);
    let err = tune(&spec, &grid, &Metric::F1, &TuneOptions::default(), x.view(), y.view()).unwrap_err();
    assert!(matches!(err, BenchError::NoViableCandidate(2)));
}

#[test]
fn subsampled_boosting_tunes_the_same_twice() {
    let x = Array2::from_shape_fn((60, 3), |(i, j)| match (j, i >= 30) {
        (0, false) => i as f64,
        (0, true) => i as f64 + 30.0,
        (1, _) => ((i * 7) % 11) as f64,
        _ => (i % 3) as f64,
    });
    let y = Array1::from_shape_fn(60, |i| usize::from(i >= 30));
    let spec = ClassifierSpec::GradientBoosting(GradientBoostingParams {
        n_estimators: 10,
        ..GradientBoostingParams::default()
    });
    let grid = ParamGrid::new()
        .with("subsample", [0.5, 0.6])
        .with("max_features", [0.5, 0.75]);
    let run = || tune(&spec, &grid, &Metric::F1, &TuneOptions::default(), x.view(), y.view()).unwrap();

    let first = run();
    let second = run();
    assert_eq!(first.best_params, second.best_params);
    let scores = |o: &TuneOutcome| -> Vec<Option<f64>> {
        o.candidates.iter().map(|c| c.mean_score).collect()
    };
    assert_eq!(scores(&first), scores(&second));
}
