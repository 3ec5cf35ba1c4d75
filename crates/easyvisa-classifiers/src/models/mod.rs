pub mod adaboost;
pub mod bagging;
pub mod classifier_trait;
pub mod decision_tree;
pub mod factory;
pub mod gbdt;
pub mod stacking;
pub mod utils;

pub use classifier_trait::Classifier;
pub use factory::build_model;
