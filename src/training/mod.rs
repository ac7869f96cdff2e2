//! Regression estimators
//!
//! Provides the candidate families considered during model selection:
//! - Ordinary least squares
//! - Epsilon-SVR with RBF/linear/polynomial kernels
//! - K-Nearest Neighbors
//! - CART regression trees and Random Forests
//! - AdaBoost.R2, gradient boosting, CatBoost-style and XGBoost-style boosting
//!
//! plus hyperparameter grids and K-fold cross-validation.

mod models;
pub mod params;
pub mod estimator;
pub mod cross_validation;
pub mod linear_models;
pub mod decision_tree;
pub mod random_forest;
pub mod gradient_boosting;
pub mod knn;
pub mod svm;
pub mod adaboost;
pub mod xgboost;
pub mod catboost;

pub use models::{r2_score, Regressor};
pub(crate) use models::{check_fit_shapes, check_n_features};
pub use params::{ParamGrid, ParamSet, ParamValue};
pub use estimator::Estimator;
pub use cross_validation::{cross_val_score, CrossValidator, CVSplit, CVResults};
pub use linear_models::LinearRegression;
pub use decision_tree::{DecisionTreeRegressor, TreeNode};
pub use random_forest::{RandomForestRegressor, MaxFeatures};
pub use gradient_boosting::{GradientBoostingRegressor, GradientBoostingConfig};
pub use knn::{KNNRegressor, KNNConfig, DistanceMetric, WeightScheme};
pub use svm::{SVMRegressor, SVMConfig, KernelType};
pub use adaboost::{AdaBoostRegressor, AdaBoostLoss};
pub use xgboost::{XGBoostRegressor, XGBoostConfig};
pub use catboost::{CatBoostRegressor, CatBoostConfig};
