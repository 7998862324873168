//! CSV Data Loader Module
//! Reads the raw extracts and pipeline artefacts, and writes tables back to disk.

use crate::config::{self, PipelineConfig};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Rows scanned for schema inference.
const INFER_SCHEMA_ROWS: usize = 10_000;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read or write CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Dataset not found at {0}")]
    NotFound(PathBuf),
    #[error("Load failed: output file {0} was not written or is empty")]
    EmptyOutput(PathBuf),
}

/// Handles CSV file loading and persistence with Polars.
pub struct DataLoader;

impl DataLoader {
    /// Read the production-by-fuel extract from the raw directory.
    pub fn read_production_extract(cfg: &PipelineConfig) -> Result<DataFrame, LoaderError> {
        Self::read_csv(&cfg.raw(config::PRODUCTION_EXTRACT), 0)
    }

    /// Read the balance-by-category extract, skipping its metadata preamble.
    pub fn read_balance_extract(cfg: &PipelineConfig) -> Result<DataFrame, LoaderError> {
        Self::read_csv(
            &cfg.raw(config::BALANCE_EXTRACT),
            config::BALANCE_METADATA_ROWS,
        )
    }

    /// Read a table previously written by the pipeline.
    pub fn read_table(path: &Path) -> Result<DataFrame, LoaderError> {
        Self::read_csv(path, 0)
    }

    /// Load a CSV file, skipping `skip_rows` lines before the header.
    pub fn read_csv(path: &Path, skip_rows: usize) -> Result<DataFrame, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::NotFound(path.to_path_buf()));
        }

        info!(path = %path.display(), "loading");
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_skip_rows(skip_rows)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        info!(path = %path.display(), rows = df.height(), columns = df.width(), "loaded");
        Ok(df)
    }

    /// Persist a table as CSV (header, no index column) and verify the result.
    pub fn write_table(df: &DataFrame, path: &Path) -> Result<(), LoaderError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| LoaderError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut file = File::create(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df.clone())?;

        let written = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(LoaderError::EmptyOutput(path.to_path_buf()));
        }

        debug!(path = %path.display(), bytes = written, "table written");
        info!(path = %path.display(), rows = df.height(), "dataset written");
        Ok(())
    }
}
