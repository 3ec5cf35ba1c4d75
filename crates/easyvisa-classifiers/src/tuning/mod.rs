//! Tuning Harness: cross-validated search over a hyperparameter grid.
//!
//! Every (candidate, fold) pair is an independent job on a rayon pool. Jobs
//! share the feature matrix read-only and each owns its freshly built model.
//! Results are reduced in candidate order, so the outcome never depends on
//! which job finished first.
pub mod folds;
pub mod grid;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::{ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ClassifierSpec;
use crate::data_handling::validate_xy;
use crate::error::{BenchError, Result};
use crate::evaluation::Scorer;
use crate::models::{build_model, Classifier};

pub use folds::{stratified_k_fold, Fold};
pub use grid::{ParamGrid, ParamSet, ParamValue, SearchStrategy};

/// Shared flag that stops a running search between folds.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuneOptions {
    pub cv_folds: usize,
    pub strategy: SearchStrategy,
    /// Seed for randomized candidate sampling.
    pub seed: u64,
    /// Shuffle rows inside each class before dealing folds.
    pub shuffle_seed: Option<u64>,
    /// Worker threads; 0 uses all cores.
    pub n_jobs: usize,
    #[serde(skip)]
    pub cancel: CancelFlag,
}

impl Default for TuneOptions {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            strategy: SearchStrategy::Exhaustive,
            seed: 1,
            shuffle_seed: None,
            n_jobs: 0,
            cancel: CancelFlag::new(),
        }
    }
}

/// Builds an unfitted estimator for one candidate configuration.
pub trait EstimatorFactory: Sync {
    fn build(&self, params: &ParamSet) -> Result<Box<dyn Classifier>>;

    fn family(&self) -> &str;
}

impl EstimatorFactory for ClassifierSpec {
    fn build(&self, params: &ParamSet) -> Result<Box<dyn Classifier>> {
        build_model(&self.with_params(params)?)
    }

    fn family(&self) -> &str {
        self.family_name()
    }
}

/// Cross-validation result of one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    /// Position in the visited candidate sequence.
    pub index: usize,
    pub params: ParamSet,
    /// Mean held-out score; `None` if the candidate failed.
    pub mean_score: Option<f64>,
    pub fold_scores: Vec<f64>,
    pub error: Option<String>,
}

pub struct TuneOutcome {
    /// Winner refit on the full data.
    pub best_model: Box<dyn Classifier>,
    pub best_params: ParamSet,
    pub best_score: f64,
    pub candidates: Vec<CandidateScore>,
}

impl std::fmt::Debug for TuneOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TuneOutcome")
            .field("best_model", &self.best_model.name())
            .field("best_params", &self.best_params)
            .field("best_score", &self.best_score)
            .field("candidates", &self.candidates.len())
            .finish()
    }
}

enum FoldResult {
    Scored(f64),
    Failed(BenchError),
    Skipped,
}

fn run_fold(
    factory: &dyn EstimatorFactory,
    params: &ParamSet,
    fold: &Fold,
    scorer: &dyn Scorer,
    x: ArrayView2<f64>,
    y: ArrayView1<usize>,
) -> Result<f64> {
    let mut model = factory.build(params)?;
    let x_train = x.select(Axis(0), &fold.train);
    let y_train = y.select(Axis(0), &fold.train);
    model.fit(x_train.view(), y_train.view())?;
    let x_test = x.select(Axis(0), &fold.test);
    let y_test = y.select(Axis(0), &fold.test);
    let predicted = model.predict(x_test.view())?;
    Ok(scorer.score(y_test.view(), predicted.view()))
}

fn candidates_for(grid: &ParamGrid, options: &TuneOptions) -> Result<Vec<ParamSet>> {
    match options.strategy {
        SearchStrategy::Exhaustive => grid.candidates(),
        SearchStrategy::Randomized { n_iter } => {
            if n_iter == 0 {
                return Err(BenchError::invalid("n_iter", "randomized search needs at least one candidate"));
            }
            grid.sample(n_iter, options.seed)
        }
    }
}

/// Pick the configuration from `grid` that maximises the mean cross-validated
/// `scorer`, then refit it on all of `(x, y)`.
///
/// Ties go to the earliest candidate. Candidates that fail to build or fit, or
/// whose mean score is not finite, are logged and skipped; input shape and
/// label problems abort before any fit.
pub fn tune(
    factory: &dyn EstimatorFactory,
    grid: &ParamGrid,
    scorer: &dyn Scorer,
    options: &TuneOptions,
    x: ArrayView2<f64>,
    y: ArrayView1<usize>,
) -> Result<TuneOutcome> {
    validate_xy(x, y)?;
    let candidates = candidates_for(grid, options)?;
    let folds = stratified_k_fold(y, options.cv_folds, options.shuffle_seed)?;

    log::info!(
        "Tuning {}: {} candidates x {} folds, scoring {}",
        factory.family(),
        candidates.len(),
        folds.len(),
        scorer.name()
    );

    let jobs: Vec<(usize, usize)> = (0..candidates.len())
        .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
        .collect();

    let run_all = || -> Vec<FoldResult> {
        jobs.par_iter()
            .map(|&(c, f)| {
                if options.cancel.is_cancelled() {
                    return FoldResult::Skipped;
                }
                match run_fold(factory, &candidates[c], &folds[f], scorer, x, y) {
                    Ok(score) => {
                        log::trace!("candidate {} fold {}: {:.6}", c, f, score);
                        FoldResult::Scored(score)
                    }
                    Err(e) => FoldResult::Failed(e),
                }
            })
            .collect()
    };

    let results = if options.n_jobs > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.n_jobs)
            .build()
            .map_err(|e| BenchError::backend("rayon", e))?;
        pool.install(run_all)
    } else {
        run_all()
    };

    // reduce in candidate order; strict > keeps the earliest of tied candidates
    let mut scores = Vec::with_capacity(candidates.len());
    let mut best: Option<(usize, f64)> = None;
    let mut any_skipped = false;
    for (c, (params, chunk)) in candidates.iter().zip(results.chunks(folds.len())).enumerate() {
        let mut fold_scores = Vec::with_capacity(folds.len());
        let mut error = None;
        let mut skipped = false;
        for result in chunk {
            match result {
                FoldResult::Scored(s) => fold_scores.push(*s),
                FoldResult::Failed(e) if error.is_none() => error = Some(e.to_string()),
                FoldResult::Failed(_) => {}
                FoldResult::Skipped => skipped = true,
            }
        }
        if skipped {
            any_skipped = true;
            log::debug!("candidate {} {} discarded: search cancelled", c, params);
            continue;
        }
        let mut mean_score = None;
        if error.is_none() {
            let mean = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            if mean.is_finite() {
                mean_score = Some(mean);
            } else {
                error = Some(format!("non-finite {} score {}", scorer.name(), mean));
            }
        }
        match (&error, mean_score) {
            (Some(e), _) => log::warn!("Skipping {} candidate {}: {}", factory.family(), params, e),
            (None, Some(mean)) => {
                log::debug!("candidate {} {}: mean {} {:.6}", c, params, scorer.name(), mean);
                if best.map_or(true, |(_, b)| mean > b) {
                    best = Some((c, mean));
                }
            }
            (None, None) => {}
        }
        scores.push(CandidateScore {
            index: c,
            params: params.clone(),
            mean_score,
            fold_scores,
            error,
        });
    }

    let (best_index, best_score) = match best {
        Some(b) => b,
        None if any_skipped && options.cancel.is_cancelled() => return Err(BenchError::Cancelled),
        None => return Err(BenchError::NoViableCandidate(candidates.len())),
    };
    let best_params = candidates[best_index].clone();

    let mut best_model = factory.build(&best_params)?;
    best_model.fit(x, y)?;
    log::info!(
        "Best {} parameters {} with mean {} {:.6}",
        factory.family(),
        best_params,
        scorer.name(),
        best_score
    );

    Ok(TuneOutcome {
        best_model,
        best_params,
        best_score,
        candidates: scores,
    })
}
