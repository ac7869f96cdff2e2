//! Candidate and search-space tables

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, TrainerError};
use crate::training::{Estimator, ParamGrid};

/// Minimum held-out R² the best candidate must reach before it is persisted
pub const QUALITY_FLOOR: f64 = 0.6;

/// Identifiers of the built-in candidates, in selection order
pub const DEFAULT_MODEL_IDS: [&str; 9] = [
    "LinearRegression",
    "SVM",
    "KNeighbors",
    "DecisionTree",
    "RandomForest",
    "AdaBoost",
    "GradientBoost",
    "CatBoost",
    "XGBoost",
];

/// Ordered mapping from a unique identifier to an estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog<R> {
    entries: Vec<(String, R)>,
}

impl<R> Default for ModelCatalog<R> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<R> ModelCatalog<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate; identifiers must be unique
    pub fn insert(&mut self, id: impl Into<String>, model: R) -> Result<()> {
        let id = id.into();
        if self.position(&id).is_some() {
            return Err(TrainerError::DuplicateModel(id));
        }
        self.entries.push((id, model));
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, id: impl Into<String>, model: R) -> Result<Self> {
        self.insert(id, model)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &R)> {
        self.entries.iter().map(|(id, m)| (id.as_str(), m))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut R)> {
        self.entries.iter_mut().map(|(id, m)| (id.as_str(), m))
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|(existing, _)| existing == id)
    }

    pub fn get(&self, id: &str) -> Option<&R> {
        self.position(id).map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut R> {
        let i = self.position(id)?;
        Some(&mut self.entries[i].1)
    }

    /// Take a candidate out of the catalog
    pub fn remove(&mut self, id: &str) -> Option<R> {
        let i = self.position(id)?;
        Some(self.entries.remove(i).1)
    }

    pub fn into_entries(self) -> Vec<(String, R)> {
        self.entries
    }
}

/// Mapping from candidate identifier to its hyperparameter grid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCatalog {
    grids: BTreeMap<String, ParamGrid>,
}

impl SearchCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, grid: ParamGrid) {
        self.grids.insert(id.into(), grid);
    }

    pub fn with(mut self, id: impl Into<String>, grid: ParamGrid) -> Self {
        self.insert(id, grid);
        self
    }

    /// Grid for `id`; `None` means fit with defaults
    pub fn get(&self, id: &str) -> Option<&ParamGrid> {
        self.grids.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamGrid)> {
        self.grids.iter().map(|(id, g)| (id.as_str(), g))
    }

    /// Every grid must name a candidate present in `catalog`
    pub fn validate_against<R>(&self, catalog: &ModelCatalog<R>) -> Result<()> {
        match self.grids.keys().find(|id| catalog.position(id).is_none()) {
            Some(id) => Err(TrainerError::UnknownModel(id.clone())),
            None => Ok(()),
        }
    }
}

/// The nine built-in candidates, seeded with `random_state` where they draw random numbers
pub fn default_catalog(random_state: Option<u64>) -> Result<ModelCatalog<Estimator>> {
    let mut catalog = ModelCatalog::new();
    for id in DEFAULT_MODEL_IDS {
        let estimator = Estimator::from_family(id)
            .ok_or_else(|| TrainerError::UnknownModel(id.to_string()))?
            .with_random_state(random_state)?;
        catalog.insert(id, estimator)?;
    }
    Ok(catalog)
}

/// Fixed search grids for the default candidates
pub fn default_search_catalog() -> SearchCatalog {
    SearchCatalog::new()
        .with("LinearRegression", ParamGrid::new())
        .with("SVM", ParamGrid::new())
        .with("KNeighbors", ParamGrid::new())
        .with(
            "DecisionTree",
            ParamGrid::new()
                .add("max_depth", [Some(3usize), Some(5), Some(8), None])
                .add("min_samples_leaf", [1usize, 3]),
        )
        .with(
            "RandomForest",
            ParamGrid::new().add("n_estimators", [16usize, 32, 64]),
        )
        .with(
            "AdaBoost",
            ParamGrid::new()
                .add("learning_rate", [0.1, 0.5, 1.0])
                .add("n_estimators", [16usize, 32, 64]),
        )
        .with(
            "GradientBoost",
            ParamGrid::new()
                .add("learning_rate", [0.05, 0.1])
                .add("subsample", [0.7, 0.85, 1.0])
                .add("n_estimators", [32usize, 64, 128]),
        )
        .with(
            "CatBoost",
            ParamGrid::new()
                .add("depth", [4usize, 6])
                .add("learning_rate", [0.05, 0.1])
                .add("iterations", [30usize, 60]),
        )
        .with(
            "XGBoost",
            ParamGrid::new()
                .add("learning_rate", [0.05, 0.1, 0.3])
                .add("n_estimators", [32usize, 64, 128]),
        )
}
