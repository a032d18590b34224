//! Bundled model resources, mapped read-only for loading

use crate::error::{ClassifierError, Result};
use log::debug;
use memmap2::Mmap;
use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the model bytes come from
#[derive(Debug, Clone)]
pub enum ModelResource {
    /// Model file on disk
    File(PathBuf),
    /// Model already held in memory
    Memory { name: String, bytes: Arc<[u8]> },
}

impl ModelResource {
    /// Resource `name` inside an asset directory
    pub fn named<P: AsRef<Path>>(asset_dir: P, name: &str) -> Self {
        Self::File(asset_dir.as_ref().join(name))
    }

    pub fn from_path<P: Into<PathBuf>>(path: P) -> Self {
        Self::File(path.into())
    }

    pub fn from_bytes<S: Into<String>>(name: S, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Memory {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Human-readable name used in logs and errors
    pub fn name(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Memory { name, .. } => name.clone(),
        }
    }

    /// Open the resource. Files are memory-mapped; empty resources are rejected.
    pub fn open(&self) -> Result<ModelBytes> {
        match self {
            Self::File(path) => {
                let file = File::open(path)
                    .map_err(|e| ClassifierError::model_load(self.name(), e))?;
                let len = file
                    .metadata()
                    .map_err(|e| ClassifierError::model_load(self.name(), e))?
                    .len();
                if len == 0 {
                    return Err(ClassifierError::model_load(
                        self.name(),
                        "model resource is empty",
                    ));
                }

                // SAFETY: the map is read-only and model files are not
                // rewritten while the application is running.
                let map = unsafe { Mmap::map(&file) }
                    .map_err(|e| ClassifierError::model_load(self.name(), e))?;
                debug!("Mapped model '{}' ({} bytes)", self.name(), map.len());
                Ok(ModelBytes::Mapped(map))
            }
            Self::Memory { bytes, .. } => {
                if bytes.is_empty() {
                    return Err(ClassifierError::model_load(
                        self.name(),
                        "model resource is empty",
                    ));
                }
                Ok(ModelBytes::Shared(Arc::clone(bytes)))
            }
        }
    }
}

/// Model bytes, either mapped from disk or shared from memory
#[derive(Debug)]
pub enum ModelBytes {
    Mapped(Mmap),
    Shared(Arc<[u8]>),
}

impl Deref for ModelBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            ModelBytes::Mapped(map) => map,
            ModelBytes::Shared(bytes) => bytes,
        }
    }
}
