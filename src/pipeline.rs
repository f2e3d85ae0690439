//! Training pipeline
//!
//! validation → grouping → per-group training and evaluation → persistence →
//! reload-and-verify. A failing group is reported and skipped; it never stops
//! its siblings.

use crate::config::Config;
use crate::domain::{build_observations, validate_records, CompressorObservation};
use crate::ml::{group_by_model, CompressorRegressor, FitMetrics, ModelError, ModelGroup, ModelStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{dispatcher, error, info, info_span, warn, Dispatch};

/// A model that was trained, evaluated and saved
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metrics: FitMetrics,
    pub trained_at: DateTime<Utc>,
}

/// Outcome of one model group
#[derive(Debug)]
pub struct GroupReport {
    pub model: String,
    pub rows: usize,
    pub outcome: Result<TrainedModel, ModelError>,
}

/// Score of a model reloaded from the store
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub model: String,
    pub metrics: FitMetrics,
}

#[derive(Debug, Default)]
pub struct TrainingReport {
    /// One entry per model group, in grouping order
    pub groups: Vec<GroupReport>,
    /// `None` when verification is disabled or the model was not in the input
    pub verification: Option<Result<VerifyReport, ModelError>>,
}

impl TrainingReport {
    pub fn trained(&self) -> impl Iterator<Item = &TrainedModel> {
        self.groups.iter().filter_map(|g| g.outcome.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &ModelError)> {
        self.groups
            .iter()
            .filter_map(|g| g.outcome.as_ref().err().map(|e| (g.model.as_str(), e)))
    }

    pub fn group(&self, model: &str) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.model == model)
    }
}

/// Read the raw JSON records of an input file
pub fn read_input(path: &Path) -> Result<Vec<serde_json::Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading input file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing input file {}", path.display()))
}

pub struct Pipeline {
    config: Config,
    store: Arc<dyn ModelStore>,
    dispatch: Dispatch,
}

impl Pipeline {
    pub fn new(config: Config, store: Arc<dyn ModelStore>, dispatch: Dispatch) -> Self {
        Self {
            config,
            store,
            dispatch,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate raw records and build observations; rejects the whole batch
    /// if any record is invalid.
    pub fn prepare(&self, values: Vec<serde_json::Value>) -> Result<Vec<CompressorObservation>> {
        dispatcher::with_default(&self.dispatch, || {
            let checked = validate_records(values).and_then(build_observations);
            match checked {
                Ok(observations) => {
                    info!(records = observations.len(), "validated input records");
                    Ok(observations)
                }
                Err(err) => {
                    for failure in &err.failures {
                        error!(
                            index = failure.index,
                            field = %failure.field,
                            message = %failure.message,
                            "invalid input record"
                        );
                    }
                    Err(err.into())
                }
            }
        })
    }

    /// Validate, train and verify from the configured input file
    pub async fn run_file(&self) -> Result<TrainingReport> {
        let values = read_input(&self.config.input.path)?;
        let observations = self.prepare(values)?;
        self.run(observations).await
    }

    pub async fn run(&self, observations: Vec<CompressorObservation>) -> Result<TrainingReport> {
        let groups = group_by_model(observations);
        dispatcher::with_default(&self.dispatch, || {
            info!(groups = groups.len(), parallel = self.config.training.parallel, "training model groups");
        });

        let reports = if self.config.training.parallel {
            self.train_parallel(&groups).await?
        } else {
            groups
                .iter()
                .map(|group| {
                    dispatcher::with_default(&self.dispatch, || {
                        report_group(group, self.config.training.test_fraction, self.config.training.seed, self.store.as_ref())
                    })
                })
                .collect()
        };

        // Every save has completed by now, so the reload sees the fresh blob.
        let verification = if self.config.verify.enabled {
            dispatcher::with_default(&self.dispatch, || self.verify(&groups))
        } else {
            None
        };

        Ok(TrainingReport {
            groups: reports,
            verification,
        })
    }

    async fn train_parallel(&self, groups: &[ModelGroup]) -> Result<Vec<GroupReport>> {
        let mut workers = JoinSet::new();
        for (index, group) in groups.iter().enumerate() {
            let group = group.clone();
            let store = Arc::clone(&self.store);
            let dispatch = self.dispatch.clone();
            let test_fraction = self.config.training.test_fraction;
            let seed = self.config.training.seed;
            workers.spawn_blocking(move || {
                let report = dispatcher::with_default(&dispatch, || {
                    report_group(&group, test_fraction, seed, store.as_ref())
                });
                (index, report)
            });
        }

        let mut reports = Vec::with_capacity(groups.len());
        while let Some(joined) = workers.join_next().await {
            reports.push(joined.context("training worker failed")?);
        }
        reports.sort_by_key(|(index, _)| *index);
        Ok(reports.into_iter().map(|(_, report)| report).collect())
    }

    fn verify(&self, groups: &[ModelGroup]) -> Option<Result<VerifyReport, ModelError>> {
        let name = &self.config.verify.model;
        let Some(group) = groups.iter().find(|g| &g.model == name) else {
            warn!(model = %name, "model to verify is not present in the input");
            return None;
        };

        let _span = info_span!("verify", model = %name).entered();
        let result = verify_group(group, self.config.training.test_fraction, self.config.verify.seed, self.store.as_ref());
        match &result {
            Ok(report) => info!(
                model = %report.model,
                r2 = report.metrics.r2,
                mae = report.metrics.mae,
                rmse = report.metrics.rmse,
                "accuracy after reloading persisted model"
            ),
            Err(e) => warn!(model = %name, error = %e, "verification failed"),
        }
        Some(result)
    }
}

fn report_group(group: &ModelGroup, test_fraction: f64, seed: u64, store: &dyn ModelStore) -> GroupReport {
    let _span = info_span!("train", model = %group.model, rows = group.len()).entered();
    let outcome = train_group(group, test_fraction, seed, store);
    match &outcome {
        Ok(trained) => info!(
            model = %trained.model,
            r2 = trained.metrics.r2,
            mae = trained.metrics.mae,
            rmse = trained.metrics.rmse,
            train_rows = trained.train_rows,
            test_rows = trained.test_rows,
            trained_at = %trained.trained_at.to_rfc3339(),
            "model trained"
        ),
        Err(e) => warn!(model = %group.model, error = %e, "skipping model group"),
    }
    GroupReport {
        model: group.model.clone(),
        rows: group.len(),
        outcome,
    }
}

/// Split, fit, evaluate and persist one model group
pub fn train_group(
    group: &ModelGroup,
    test_fraction: f64,
    seed: u64,
    store: &dyn ModelStore,
) -> Result<TrainedModel, ModelError> {
    let mut regressor = CompressorRegressor::new(group)?;
    let split = regressor.split(test_fraction, seed)?;
    regressor.fit_polynomial(&split.x_train, &split.y_train)?;
    let metrics = regressor.evaluate_metrics(&split.x_test, &split.y_test)?;
    store.save_regressor(&regressor, &group.model)?;

    Ok(TrainedModel {
        model: group.model.clone(),
        train_rows: split.y_train.len(),
        test_rows: split.y_test.len(),
        metrics,
        trained_at: Utc::now(),
    })
}

/// Reload a persisted model and score it on a fresh split of its group
pub fn verify_group(
    group: &ModelGroup,
    test_fraction: f64,
    seed: u64,
    store: &dyn ModelStore,
) -> Result<VerifyReport, ModelError> {
    let mut regressor = CompressorRegressor::new(group)?;
    store.load_into(&mut regressor, &group.model)?;
    let split = regressor.split(test_fraction, seed)?;
    let metrics = regressor.evaluate_metrics(&split.x_test, &split.y_test)?;

    Ok(VerifyReport {
        model: group.model.clone(),
        metrics,
    })
}
