//! Benchmark pipeline: baseline, tuning and evaluation for every classifier family.
//!
//! Each family goes through the same `run_family` procedure. The stacking
//! ensemble is assembled afterwards from models produced by earlier families,
//! referenced by their table column names.
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::comparison::{build_table, ComparisonTable};
use crate::config::{
    AdaBoostParams, ClassWeight, ClassifierSpec, ForestParams, GradientBoostingParams,
    NamedSpec, StackingParams, TreeParams, XGBoostParams,
};
use crate::data_handling::{train_test_split, DatasetSplit};
use crate::evaluation::{evaluate, render_confusion_matrix, ConfusionMatrix, Metric, PerformanceRecord};
use crate::importance::{rank_feature_importances, FeatureImportance};
use crate::io::{read_visa_csv, VisaApplication};
use crate::models::{build_model, Classifier};
use crate::preprocessing::{clean, encode};
use crate::stats::{describe, DatasetSummary};
use crate::tuning::{tune, CancelFlag, ParamGrid, ParamSet, SearchStrategy, TuneOptions};

/// Tuned variant of a family: starting spec plus the grid searched over it.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TuningPlan {
    /// Column name of the tuned model; defaults to `Tuned <family name>`.
    #[serde(default)]
    pub name: Option<String>,
    pub spec: ClassifierSpec,
    pub grid: ParamGrid,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FamilyPlan {
    /// Column name of the baseline model.
    pub name: String,
    pub baseline: ClassifierSpec,
    #[serde(default)]
    pub tuning: Option<TuningPlan>,
}

impl FamilyPlan {
    pub fn tuned_name(&self) -> Option<String> {
        self.tuning
            .as_ref()
            .map(|t| t.name.clone().unwrap_or_else(|| format!("Tuned {}", self.name)))
    }
}

/// Stacking over already benchmarked models, referenced by column name.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StackingPlan {
    pub name: String,
    pub estimators: Vec<String>,
    pub final_estimator: String,
    #[serde(default = "default_folds")]
    pub cv_folds: usize,
}

fn default_folds() -> usize {
    5
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub cv_folds: usize,
    pub scoring: Metric,
    pub search: SearchStrategy,
    /// Shuffle rows inside each class before dealing cross-validation folds.
    pub shuffle_folds: bool,
    pub n_jobs: usize,
    pub families: Vec<FamilyPlan>,
    pub stacking: Option<StackingPlan>,
    /// Model whose importances are ranked; defaults to the best test F1.
    pub final_model: Option<String>,
}

fn grid_plan(name: &str, spec: ClassifierSpec, grid: ParamGrid) -> Option<TuningPlan> {
    Some(TuningPlan {
        name: Some(name.to_string()),
        spec,
        grid,
    })
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        let families = vec![
            FamilyPlan {
                name: "Decision Tree".to_string(),
                baseline: ClassifierSpec::DecisionTree(TreeParams::default()),
                tuning: grid_plan(
                    "Tuned Decision Tree",
                    ClassifierSpec::DecisionTree(TreeParams {
                        class_weight: ClassWeight::Balanced,
                        ..TreeParams::default()
                    }),
                    ParamGrid::new()
                        .with("max_depth", [5, 10, 15])
                        .with("min_samples_leaf", [3, 5, 7])
                        .with("min_impurity_decrease", [0.0001, 0.001]),
                ),
            },
            FamilyPlan {
                name: "Bagging Classifier".to_string(),
                baseline: ClassifierSpec::Bagging(Default::default()),
                tuning: grid_plan(
                    "Tuned Bagging Classifier",
                    ClassifierSpec::Bagging(Default::default()),
                    ParamGrid::new()
                        .with("max_samples", [0.7, 0.9])
                        .with("max_features", [0.7, 0.9])
                        .with("n_estimators", [90, 100, 110]),
                ),
            },
            FamilyPlan {
                name: "Random Forest".to_string(),
                baseline: ClassifierSpec::RandomForest(ForestParams {
                    class_weight: ClassWeight::Balanced,
                    ..ForestParams::default()
                }),
                tuning: grid_plan(
                    "Tuned Random Forest",
                    ClassifierSpec::RandomForest(ForestParams {
                        oob_score: true,
                        ..ForestParams::default()
                    }),
                    ParamGrid::new()
                        .with("max_depth", [5, 10])
                        .with("max_features", ["sqrt", "log2"])
                        .with("min_samples_split", [5, 7])
                        .with("n_estimators", [15, 20, 25]),
                ),
            },
            FamilyPlan {
                name: "Adaboost Classifier".to_string(),
                baseline: ClassifierSpec::AdaBoost(AdaBoostParams::default()),
                tuning: grid_plan(
                    "Tuned Adaboost Classifier",
                    ClassifierSpec::AdaBoost(AdaBoostParams {
                        class_weight: ClassWeight::Balanced,
                        ..AdaBoostParams::default()
                    }),
                    ParamGrid::new()
                        .with("base_max_depth", [1, 2])
                        .with("n_estimators", [80, 90, 100])
                        .with("learning_rate", [0.1, 0.2, 0.3]),
                ),
            },
            FamilyPlan {
                name: "Gradient Boost Classifier".to_string(),
                baseline: ClassifierSpec::GradientBoosting(GradientBoostingParams::default()),
                tuning: grid_plan(
                    "Tuned Gradient Boost Classifier",
                    ClassifierSpec::GradientBoosting(GradientBoostingParams {
                        init: Some(Box::new(ClassifierSpec::AdaBoost(AdaBoostParams::default()))),
                        ..GradientBoostingParams::default()
                    }),
                    ParamGrid::new()
                        .with("n_estimators", [200, 250])
                        .with("subsample", [0.9, 1.0])
                        .with("max_features", [0.8, 0.9])
                        .with("learning_rate", [0.1, 0.2]),
                ),
            },
            FamilyPlan {
                name: "XGBoost Classifier".to_string(),
                baseline: ClassifierSpec::XGBoost(XGBoostParams::default()),
                tuning: grid_plan(
                    "XGBoost Classifier Tuned",
                    ClassifierSpec::XGBoost(XGBoostParams::default()),
                    ParamGrid::new()
                        .with("n_estimators", [150, 200])
                        .with("scale_pos_weight", [1.0, 2.0])
                        .with("subsample", [0.9, 1.0])
                        .with("learning_rate", [0.1, 0.2])
                        .with("colsample_bytree", [0.8, 0.9]),
                ),
            },
        ];

        Self {
            test_fraction: 0.3,
            seed: 1,
            cv_folds: 5,
            scoring: Metric::F1,
            search: SearchStrategy::Exhaustive,
            shuffle_folds: false,
            n_jobs: 0,
            families,
            stacking: Some(StackingPlan {
                name: "Stacking Classifier".to_string(),
                estimators: vec![
                    "Adaboost Classifier".to_string(),
                    "Tuned Gradient Boost Classifier".to_string(),
                    "Tuned Random Forest".to_string(),
                ],
                final_estimator: "XGBoost Classifier Tuned".to_string(),
                cv_folds: default_folds(),
            }),
            final_model: None,
        }
    }
}

impl BenchmarkConfig {
    pub fn tune_options(&self, cancel: &CancelFlag) -> TuneOptions {
        TuneOptions {
            cv_folds: self.cv_folds,
            strategy: self.search,
            seed: self.seed,
            shuffle_seed: self.shuffle_folds.then_some(self.seed),
            n_jobs: self.n_jobs,
            cancel: cancel.clone(),
        }
    }
}

/// Read a JSON benchmark configuration; missing keys take their defaults.
pub fn load_benchmark_config<P: AsRef<Path>>(path: P) -> Result<BenchmarkConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: BenchmarkConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// One benchmarked model with its scores on both splits.
pub struct ModelOutcome {
    pub name: String,
    /// Fully resolved spec, including tuned parameters.
    pub spec: ClassifierSpec,
    pub model: Box<dyn Classifier>,
    pub train: PerformanceRecord,
    pub test: PerformanceRecord,
    pub train_confusion: ConfusionMatrix,
    pub test_confusion: ConfusionMatrix,
    pub best_params: Option<ParamSet>,
    pub cv_score: Option<f64>,
}

fn assess(
    name: String,
    spec: ClassifierSpec,
    model: Box<dyn Classifier>,
    train: &DatasetSplit,
    test: &DatasetSplit,
) -> Result<ModelOutcome> {
    let train_record = evaluate(&*model, train.features(), train.labels())?;
    let test_record = evaluate(&*model, test.features(), test.labels())?;
    let train_confusion = render_confusion_matrix(&*model, train.features(), train.labels())?;
    let test_confusion = render_confusion_matrix(&*model, test.features(), test.labels())?;
    log::info!("{} train: {}", name, train_record);
    log::info!("{} test:  {}", name, test_record);
    log::debug!("{} test confusion matrix:\n{}", name, test_confusion);
    Ok(ModelOutcome {
        name,
        spec,
        model,
        train: train_record,
        test: test_record,
        train_confusion,
        test_confusion,
        best_params: None,
        cv_score: None,
    })
}

/// Fit the baseline, evaluate it, then tune, refit and evaluate the tuned model.
///
/// The tuned model is always scored as itself, never through the baseline.
pub fn run_family(
    plan: &FamilyPlan,
    train: &DatasetSplit,
    test: &DatasetSplit,
    scoring: Metric,
    options: &TuneOptions,
) -> Result<Vec<ModelOutcome>> {
    log::info!("----- {} -----", plan.name);
    let mut baseline = build_model(&plan.baseline)?;
    baseline
        .fit(train.features(), train.labels())
        .with_context(|| format!("Failed to fit {}", plan.name))?;
    let mut outcomes = vec![assess(plan.name.clone(), plan.baseline.clone(), baseline, train, test)?];

    if let (Some(tuning), Some(tuned_name)) = (&plan.tuning, plan.tuned_name()) {
        let outcome = tune(
            &tuning.spec,
            &tuning.grid,
            &scoring,
            options,
            train.features(),
            train.labels(),
        )
        .with_context(|| format!("Failed to tune {}", plan.name))?;
        let spec = tuning.spec.with_params(&outcome.best_params)?;
        let mut tuned = assess(tuned_name, spec, outcome.best_model, train, test)?;
        tuned.best_params = Some(outcome.best_params);
        tuned.cv_score = Some(outcome.best_score);
        outcomes.push(tuned);
    }

    Ok(outcomes)
}

fn find_spec(outcomes: &[ModelOutcome], name: &str) -> Result<ClassifierSpec> {
    outcomes
        .iter()
        .find(|o| o.name == name)
        .map(|o| o.spec.clone())
        .ok_or_else(|| anyhow!("Stacking refers to unknown model '{}'", name))
}

/// Fit and evaluate a stacking ensemble over earlier models.
pub fn run_stacking(
    plan: &StackingPlan,
    outcomes: &[ModelOutcome],
    train: &DatasetSplit,
    test: &DatasetSplit,
) -> Result<ModelOutcome> {
    log::info!("----- {} -----", plan.name);
    let estimators = plan
        .estimators
        .iter()
        .map(|name| {
            Ok(NamedSpec {
                name: name.clone(),
                spec: find_spec(outcomes, name)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let spec = ClassifierSpec::Stacking(StackingParams {
        estimators,
        final_estimator: Box::new(find_spec(outcomes, &plan.final_estimator)?),
        cv_folds: plan.cv_folds,
    });
    let mut model = build_model(&spec)?;
    model
        .fit(train.features(), train.labels())
        .with_context(|| format!("Failed to fit {}", plan.name))?;
    assess(plan.name.clone(), spec, model, train, test)
}

/// Everything a benchmark run produces.
pub struct BenchmarkResults {
    pub outcomes: Vec<ModelOutcome>,
    pub train_table: ComparisonTable,
    pub test_table: ComparisonTable,
    pub final_model: Option<String>,
    pub importances: Vec<FeatureImportance>,
}

impl BenchmarkResults {
    pub fn outcome(&self, name: &str) -> Option<&ModelOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

fn select_final_model<'a>(outcomes: &'a [ModelOutcome], configured: Option<&str>) -> Result<Option<&'a ModelOutcome>> {
    if let Some(name) = configured {
        let found = outcomes
            .iter()
            .find(|o| o.name == name)
            .ok_or_else(|| anyhow!("final_model '{}' is not a benchmarked model", name))?;
        return Ok(Some(found));
    }
    let mut best: Option<&ModelOutcome> = None;
    for outcome in outcomes.iter().filter(|o| o.model.feature_importances().is_some()) {
        if best.map_or(true, |b| outcome.test.f1 > b.test.f1) {
            best = Some(outcome);
        }
    }
    Ok(best)
}

/// Run every configured family, the stacking ensemble and the final-model ranking.
pub fn run_benchmark(
    config: &BenchmarkConfig,
    train: &DatasetSplit,
    test: &DatasetSplit,
    cancel: &CancelFlag,
) -> Result<BenchmarkResults> {
    let options = config.tune_options(cancel);
    let mut outcomes = Vec::new();
    for plan in &config.families {
        outcomes.extend(run_family(plan, train, test, config.scoring, &options)?);
    }
    if let Some(stacking) = &config.stacking {
        let outcome = run_stacking(stacking, &outcomes, train, test)?;
        outcomes.push(outcome);
    }

    let train_table = build_table(outcomes.iter().map(|o| (o.name.clone(), o.train)))?;
    let test_table = build_table(outcomes.iter().map(|o| (o.name.clone(), o.test)))?;

    let final_outcome = select_final_model(&outcomes, config.final_model.as_deref())?;
    let (final_model, importances) = match final_outcome {
        Some(outcome) => {
            let importances = match outcome.model.feature_importances() {
                Some(values) => rank_feature_importances(train.feature_names(), values.view())?,
                None => {
                    log::warn!("{} does not expose feature importances", outcome.name);
                    Vec::new()
                }
            };
            log::info!("Final model: {}", outcome.name);
            (Some(outcome.name.clone()), importances)
        }
        None => {
            log::warn!("No benchmarked model exposes feature importances");
            (None, Vec::new())
        }
    };

    Ok(BenchmarkResults {
        outcomes,
        train_table,
        test_table,
        final_model,
        importances,
    })
}

/// Clean, encode and split raw applications.
pub fn prepare_data(
    records: &mut [VisaApplication],
    test_fraction: f64,
    seed: u64,
) -> Result<(DatasetSplit, DatasetSplit)> {
    if records.is_empty() {
        bail!("No applications to benchmark");
    }
    clean(records);
    let encoded = encode(records)?;
    let (train, test) = train_test_split(
        &encoded.features,
        &encoded.labels,
        &encoded.feature_names,
        test_fraction,
        seed,
    )?;
    Ok((train, test))
}

/// Load a CSV, summarise it, and run the full benchmark on it.
pub fn run_from_csv<P: AsRef<Path>>(
    path: P,
    config: &BenchmarkConfig,
    cancel: &CancelFlag,
) -> Result<(DatasetSummary, BenchmarkResults)> {
    let mut records = read_visa_csv(path)?;
    let summary = describe(&records);
    log::info!("{} rows, {} duplicated", summary.rows, summary.duplicated_rows);
    let (train, test) = prepare_data(&mut records, config.test_fraction, config.seed)?;
    let results = run_benchmark(config, &train, &test, cancel)?;
    Ok((summary, results))
}
