//! Stacking: base estimators' out-of-fold probabilities feed a final estimator.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::config::StackingParams;
use crate::data_handling::validate_xy;
use crate::error::{BenchError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::factory::build_model;
use crate::tuning::folds::stratified_k_fold;

pub struct StackingClassifier {
    params: StackingParams,
    base: Vec<Box<dyn Classifier>>,
    final_estimator: Option<Box<dyn Classifier>>,
}

impl StackingClassifier {
    pub fn new(params: StackingParams) -> Self {
        StackingClassifier {
            params,
            base: Vec::new(),
            final_estimator: None,
        }
    }

    pub fn estimator_names(&self) -> Vec<&str> {
        self.params.estimators.iter().map(|e| e.name.as_str()).collect()
    }

    /// Out-of-fold positive-class probabilities, one column per base estimator.
    fn cross_val_meta_features(&self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<Array2<f64>> {
        let folds = stratified_k_fold(y, self.params.cv_folds, None)?;
        let mut meta = Array2::<f64>::zeros((x.nrows(), self.params.estimators.len()));

        for (column, named) in self.params.estimators.iter().enumerate() {
            for (k, fold) in folds.iter().enumerate() {
                let mut model = build_model(&named.spec)?;
                let x_train = x.select(Axis(0), &fold.train);
                let y_train = y.select(Axis(0), &fold.train);
                model.fit(x_train.view(), y_train.view())?;
                let proba = model.predict_proba(x.select(Axis(0), &fold.test).view())?;
                for (&row, &p) in fold.test.iter().zip(proba.iter()) {
                    meta[(row, column)] = p;
                }
                log::trace!("Stacking: '{}' fold {} done", named.name, k);
            }
        }
        Ok(meta)
    }

    fn meta_features(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let mut meta = Array2::<f64>::zeros((x.nrows(), self.base.len()));
        for (column, model) in self.base.iter().enumerate() {
            let proba = model.predict_proba(x)?;
            meta.column_mut(column).assign(&proba);
        }
        Ok(meta)
    }
}

impl Classifier for StackingClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<()> {
        validate_xy(x, y)?;
        if self.params.estimators.is_empty() {
            return Err(BenchError::invalid("estimators", "stacking needs at least one base estimator"));
        }

        let meta = self.cross_val_meta_features(x, y)?;

        let mut base = Vec::with_capacity(self.params.estimators.len());
        for named in &self.params.estimators {
            let mut model = build_model(&named.spec)?;
            model.fit(x, y)?;
            base.push(model);
        }

        let mut final_estimator = build_model(&self.params.final_estimator)?;
        final_estimator.fit(meta.view(), y)?;

        log::debug!(
            "Fitted stacking ensemble of [{}] with final estimator {}",
            self.estimator_names().join(", "),
            self.params.final_estimator
        );
        self.base = base;
        self.final_estimator = Some(final_estimator);
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let final_estimator = self
            .final_estimator
            .as_ref()
            .ok_or_else(|| BenchError::UnfittedModel {
                model: self.name().to_string(),
            })?;
        let meta = self.meta_features(x)?;
        final_estimator.predict_proba(meta.view())
    }

    fn name(&self) -> &str {
        "stacking"
    }
}
