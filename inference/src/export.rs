//! Training-example export
//!
//! Collects labelled drawings as text records and rewrites them to a flat
//! file. Each record is the normalized pixel buffer followed by the label:
//!
//! ```text
//! [0.0, 0.5, 1.0, ...],
//! [7]
//! ```

use crate::error::Result;
use crate::types::NormalizedPixelBuffer;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

const RECORD_SEPARATOR: &str = ",\n";

/// In-memory log of labelled examples backed by one output file
#[derive(Debug, Clone)]
pub struct ExampleLog {
    path: PathBuf,
    records: Vec<String>,
}

impl ExampleLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            records: Vec::new(),
        }
    }

    /// Append one drawing and its label
    pub fn record(&mut self, pixels: &NormalizedPixelBuffer, label: u8) {
        self.records.push(pixels.to_string());
        self.records.push(format!("[{}]", label));
        debug!("Recorded example labelled {} ({} values)", label, pixels.len());
    }

    /// Overwrite the output file with everything recorded so far
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, self.render())?;
        info!(
            "Saved {} example(s) to {}",
            self.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn render(&self) -> String {
        self.records.join(RECORD_SEPARATOR)
    }

    pub fn records(&self) -> &[String] {
        &self.records
    }

    /// Number of labelled examples (two records each)
    pub fn len(&self) -> usize {
        self.records.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
