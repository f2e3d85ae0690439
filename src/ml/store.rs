//! Model persistence
//!
//! Only the learned coefficients and a description of the fixed basis are
//! stored. The basis itself is rebuilt from [`features`] when a blob is
//! loaded, so a blob written by one build can be read by any other as long as
//! the basis description matches.

use super::features::{self, DEGREE, N_INPUTS, N_TERMS};
use super::models::PolynomialModel;
use super::training::CompressorRegressor;
use super::{ModelError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Version of the blob layout
pub const BLOB_FORMAT: u16 = 1;

/// On-disk representation of a fitted model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelBlob {
    pub format: u16,
    pub model: String,
    pub degree: u32,
    pub n_inputs: u32,
    pub coefficients: Vec<f64>,
}

impl ModelBlob {
    pub fn from_model(model: &PolynomialModel) -> Self {
        Self {
            format: BLOB_FORMAT,
            model: model.model().to_string(),
            degree: model.degree(),
            n_inputs: N_INPUTS as u32,
            coefficients: model.coefficients().to_vec(),
        }
    }

    pub fn encode(&self, key: &str) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| ModelError::persistence(key, io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    pub fn decode(key: &str, bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| ModelError::persistence(key, io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Check the basis description and rebuild the model
    pub fn into_model(self, key: &str) -> Result<PolynomialModel> {
        let mismatch = |expected: String, found: String| ModelError::SchemaMismatch {
            key: key.to_string(),
            expected,
            found,
        };

        if self.format != BLOB_FORMAT {
            return Err(mismatch(
                format!("blob format {}", BLOB_FORMAT),
                format!("blob format {}", self.format),
            ));
        }
        if self.degree != features::DEGREE {
            return Err(mismatch(
                format!("degree {}", DEGREE),
                format!("degree {}", self.degree),
            ));
        }
        if self.n_inputs as usize != N_INPUTS {
            return Err(mismatch(
                format!("{} inputs", N_INPUTS),
                format!("{} inputs", self.n_inputs),
            ));
        }
        if self.coefficients.len() != N_TERMS {
            return Err(mismatch(
                format!("{} coefficients", N_TERMS),
                format!("{} coefficients", self.coefficients.len()),
            ));
        }

        PolynomialModel::new(self.model, self.coefficients)
    }
}

/// Durable storage of fitted models, keyed by model identifier
pub trait ModelStore: Send + Sync {
    /// Persist `model` under `key`, replacing any existing blob
    fn save(&self, model: &PolynomialModel, key: &str) -> Result<()>;

    /// Read the model stored under `key`
    fn load(&self, key: &str) -> Result<PolynomialModel>;

    /// Persist the regressor's fitted model; fails with `NotFitted` before a fit
    fn save_regressor(&self, regressor: &CompressorRegressor, key: &str) -> Result<()> {
        self.save(regressor.fitted()?, key)
    }

    /// Load `key` into `regressor`, replacing any fitted state
    fn load_into(&self, regressor: &mut CompressorRegressor, key: &str) -> Result<()> {
        let model = self.load(key)?;
        regressor.load_fitted(model);
        Ok(())
    }
}

fn check_key(key: &str) -> Result<()> {
    let invalid = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\'])
        || key.contains('\0');
    if invalid {
        return Err(ModelError::persistence(
            key,
            io::Error::new(io::ErrorKind::InvalidInput, "invalid model key"),
        ));
    }
    Ok(())
}

/// Stores one blob file per key under a directory
#[derive(Debug, Clone)]
pub struct FileModelStore {
    dir: PathBuf,
    extension: String,
}

impl FileModelStore {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the blob for `key`, e.g. `models/MT064-4.bin`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.dir.join(format!("{}.{}", key, self.extension)))
    }
}

impl ModelStore for FileModelStore {
    fn save(&self, model: &PolynomialModel, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let bytes = ModelBlob::from_model(model).encode(key)?;

        std::fs::create_dir_all(&self.dir).map_err(|e| ModelError::persistence(key, e))?;

        // Write-then-rename so readers never observe a partial blob.
        let tmp = path.with_extension(format!("{}.tmp", self.extension));
        std::fs::write(&tmp, &bytes).map_err(|e| ModelError::persistence(key, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| ModelError::persistence(key, e))?;

        info!(model = %model.model(), path = %path.display(), bytes = bytes.len(), "saved model");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<PolynomialModel> {
        let path = self.path_for(key)?;
        let bytes = std::fs::read(&path).map_err(|e| ModelError::persistence(key, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "read model blob");
        ModelBlob::decode(key, &bytes)?.into_model(key)
    }
}

/// Keeps encoded blobs in memory
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl ModelStore for MemoryModelStore {
    fn save(&self, model: &PolynomialModel, key: &str) -> Result<()> {
        check_key(key)?;
        let bytes = ModelBlob::from_model(model).encode(key)?;
        self.blobs.write().insert(key.to_string(), bytes);
        Ok(())
    }

    fn load(&self, key: &str) -> Result<PolynomialModel> {
        let blobs = self.blobs.read();
        let bytes = blobs.get(key).ok_or_else(|| {
            ModelError::persistence(key, io::Error::new(io::ErrorKind::NotFound, "no such model"))
        })?;
        ModelBlob::decode(key, bytes)?.into_model(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::grouping::tests::observation;
    use crate::ml::grouping::ModelGroup;
    use nalgebra::DMatrix;

    fn temp_store() -> (tempfile::TempDir, FileModelStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path().join("models"), "bin");
        (dir, store)
    }

    fn fitted_regressor() -> CompressorRegressor {
        let group = ModelGroup {
            model: "MT064-4".to_string(),
            observations: vec![
                observation("MT064-4", 30.0, -10.0, 500.0),
                observation("MT064-4", 35.0, -5.0, 520.0),
                observation("MT064-4", 40.0, 0.0, 545.0),
                observation("MT064-4", 45.0, -8.0, 571.0),
                observation("MT064-4", 50.0, 2.0, 600.0),
                observation("MT064-4", 33.0, -12.0, 507.0),
                observation("MT064-4", 42.0, -3.0, 556.0),
            ],
        };
        let mut regressor = CompressorRegressor::new(&group).unwrap();
        let x = regressor.x().clone();
        let y = regressor.y().clone();
        regressor.fit_polynomial(&x, &y).unwrap();
        regressor
    }

    #[test]
    fn test_file_round_trip_reproduces_predictions() {
        let (_dir, store) = temp_store();
        let regressor = fitted_regressor();
        store.save_regressor(&regressor, "MT064-4").unwrap();
        assert!(store.dir().join("MT064-4.bin").exists());

        let group = ModelGroup {
            model: "MT064-4".to_string(),
            observations: vec![observation("MT064-4", 0.0, 0.0, 0.0)],
        };
        let mut reloaded = CompressorRegressor::new(&group).unwrap();
        store.load_into(&mut reloaded, "MT064-4").unwrap();

        let batch = DMatrix::from_row_slice(3, 2, &[31.0, -7.0, 48.5, 1.5, -5.0, -30.0]);
        assert_eq!(
            regressor.predict(&batch).unwrap(),
            reloaded.predict(&batch).unwrap()
        );
    }

    #[test]
    fn test_save_io_failure_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let occupied = dir.path().join("models");
        std::fs::write(&occupied, b"not a directory").unwrap();

        let store = FileModelStore::new(&occupied, "bin");
        assert!(matches!(
            store.save_regressor(&fitted_regressor(), "MT064-4"),
            Err(ModelError::Persistence { .. })
        ));

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("models")]);
        assert_eq!(std::fs::read(&occupied).unwrap(), b"not a directory");
    }

    #[test]
    fn test_save_overwrites_existing_blob() {
        let store = MemoryModelStore::new();
        let first = PolynomialModel::new("M", vec![1.0; N_TERMS]).unwrap();
        let second = PolynomialModel::new("M", vec![2.0; N_TERMS]).unwrap();

        store.save(&first, "M").unwrap();
        store.save(&second, "M").unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.load("M").unwrap(), second);
    }

    #[test]
    fn test_save_unfitted_regressor_fails() {
        let group = ModelGroup {
            model: "M".to_string(),
            observations: vec![observation("M", 30.0, -10.0, 500.0)],
        };
        let regressor = CompressorRegressor::new(&group).unwrap();
        let store = MemoryModelStore::new();

        assert!(matches!(
            store.save_regressor(&regressor, "M"),
            Err(ModelError::NotFitted { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_missing_blob_is_persistence_error() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.load("nope"),
            Err(ModelError::Persistence { .. })
        ));
    }

    #[test]
    fn test_load_corrupt_blob_is_persistence_error() {
        let store = MemoryModelStore::new();
        store.blobs.write().insert("M".to_string(), vec![0xff, 0x01]);
        assert!(matches!(
            store.load("M"),
            Err(ModelError::Persistence { .. })
        ));
    }

    #[test]
    fn test_load_wrong_shape_is_schema_mismatch() {
        let store = MemoryModelStore::new();
        let blob = ModelBlob {
            format: BLOB_FORMAT,
            model: "M".to_string(),
            degree: 3,
            n_inputs: 2,
            coefficients: vec![0.0; 10],
        };
        store
            .blobs
            .write()
            .insert("M".to_string(), blob.encode("M").unwrap());
        assert!(matches!(
            store.load("M"),
            Err(ModelError::SchemaMismatch { .. })
        ));

        let blob = ModelBlob {
            degree: DEGREE,
            coefficients: vec![0.0; 4],
            ..blob
        };
        store
            .blobs
            .write()
            .insert("M".to_string(), blob.encode("M").unwrap());
        assert!(matches!(
            store.load("M"),
            Err(ModelError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let (_dir, store) = temp_store();
        assert!(store.path_for("../escape").is_err());
        assert!(store.path_for("").is_err());
        assert_eq!(
            store.path_for("MT064-4").unwrap().file_name().unwrap(),
            "MT064-4.bin"
        );
    }
}
