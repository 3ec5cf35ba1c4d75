use crate::config::ClassifierSpec;
use crate::error::Result;
use crate::models::adaboost::AdaBoostClassifier;
use crate::models::bagging::{BaggingClassifier, RandomForestClassifier};
use crate::models::classifier_trait::Classifier;
use crate::models::decision_tree::DecisionTreeClassifier;
use crate::models::gbdt::{GradientBoostingClassifier, XGBoostClassifier};
use crate::models::stacking::StackingClassifier;

/// Build an unfitted boxed classifier from its spec.
pub fn build_model(spec: &ClassifierSpec) -> Result<Box<dyn Classifier>> {
    spec.validate()?;
    let model: Box<dyn Classifier> = match spec {
        ClassifierSpec::DecisionTree(p) => Box::new(DecisionTreeClassifier::new(p.clone())),
        ClassifierSpec::Bagging(p) => Box::new(BaggingClassifier::new(p.clone())),
        ClassifierSpec::RandomForest(p) => Box::new(RandomForestClassifier::new(p.clone())),
        ClassifierSpec::AdaBoost(p) => Box::new(AdaBoostClassifier::new(p.clone())),
        ClassifierSpec::GradientBoosting(p) => {
            Box::new(GradientBoostingClassifier::new(p.clone()))
        }
        ClassifierSpec::XGBoost(p) => Box::new(XGBoostClassifier::new(p.clone())),
        ClassifierSpec::Stacking(p) => Box::new(StackingClassifier::new(p.clone())),
    };
    Ok(model)
}
