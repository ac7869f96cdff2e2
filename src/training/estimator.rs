//! Serializable union of the built-in estimator families

use crate::error::Result;
use super::adaboost::AdaBoostRegressor;
use super::catboost::CatBoostRegressor;
use super::decision_tree::DecisionTreeRegressor;
use super::gradient_boosting::GradientBoostingRegressor;
use super::knn::KNNRegressor;
use super::linear_models::LinearRegression;
use super::models::Regressor;
use super::params::{ParamSet, ParamValue};
use super::random_forest::RandomForestRegressor;
use super::svm::SVMRegressor;
use super::xgboost::XGBoostRegressor;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Enum to hold any built-in regressor, fitted or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    LinearRegression(LinearRegression),
    SVM(SVMRegressor),
    KNeighbors(KNNRegressor),
    DecisionTree(DecisionTreeRegressor),
    RandomForest(RandomForestRegressor),
    AdaBoost(AdaBoostRegressor),
    GradientBoost(GradientBoostingRegressor),
    CatBoost(CatBoostRegressor),
    XGBoost(XGBoostRegressor),
}

macro_rules! dispatch {
    ($self:expr, $model:ident => $body:expr) => {
        match $self {
            Estimator::LinearRegression($model) => $body,
            Estimator::SVM($model) => $body,
            Estimator::KNeighbors($model) => $body,
            Estimator::DecisionTree($model) => $body,
            Estimator::RandomForest($model) => $body,
            Estimator::AdaBoost($model) => $body,
            Estimator::GradientBoost($model) => $body,
            Estimator::CatBoost($model) => $body,
            Estimator::XGBoost($model) => $body,
        }
    };
}

impl Estimator {
    /// Catalog identifier of this family
    pub fn family(&self) -> &'static str {
        match self {
            Estimator::LinearRegression(_) => "LinearRegression",
            Estimator::SVM(_) => "SVM",
            Estimator::KNeighbors(_) => "KNeighbors",
            Estimator::DecisionTree(_) => "DecisionTree",
            Estimator::RandomForest(_) => "RandomForest",
            Estimator::AdaBoost(_) => "AdaBoost",
            Estimator::GradientBoost(_) => "GradientBoost",
            Estimator::CatBoost(_) => "CatBoost",
            Estimator::XGBoost(_) => "XGBoost",
        }
    }

    /// Default-configured estimator for a catalog identifier
    pub fn from_family(family: &str) -> Option<Self> {
        let estimator = match family {
            "LinearRegression" => Estimator::LinearRegression(LinearRegression::new()),
            "SVM" => Estimator::SVM(SVMRegressor::default()),
            "KNeighbors" => Estimator::KNeighbors(KNNRegressor::default()),
            "DecisionTree" => Estimator::DecisionTree(DecisionTreeRegressor::new()),
            "RandomForest" => Estimator::RandomForest(RandomForestRegressor::default()),
            "AdaBoost" => Estimator::AdaBoost(AdaBoostRegressor::default()),
            "GradientBoost" => Estimator::GradientBoost(GradientBoostingRegressor::default()),
            "CatBoost" => Estimator::CatBoost(CatBoostRegressor::default()),
            "XGBoost" => Estimator::XGBoost(XGBoostRegressor::default()),
            _ => return None,
        };
        Some(estimator)
    }

    /// Seed the families that draw random numbers; the others are left untouched.
    ///
    /// `None` makes those families draw their seed from entropy on every fit.
    pub fn with_random_state(mut self, seed: Option<u64>) -> Result<Self> {
        let value = seed.map_or(ParamValue::Unset, |s| ParamValue::from(s as usize));
        let params = ParamSet::new().with("random_state", value);
        match &mut self {
            Estimator::DecisionTree(m) => m.set_params(&params)?,
            Estimator::RandomForest(m) => m.set_params(&params)?,
            Estimator::GradientBoost(m) => m.set_params(&params)?,
            Estimator::CatBoost(m) => m.set_params(&params)?,
            Estimator::XGBoost(m) => m.set_params(&params)?,
            Estimator::LinearRegression(_)
            | Estimator::SVM(_)
            | Estimator::KNeighbors(_)
            | Estimator::AdaBoost(_) => {}
        }
        Ok(self)
    }
}

impl Regressor for Estimator {
    fn name(&self) -> &str {
        dispatch!(self, m => m.name())
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        dispatch!(self, m => m.fit(x, y))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        dispatch!(self, m => m.predict(x))
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        dispatch!(self, m => m.set_params(params))
    }
}
