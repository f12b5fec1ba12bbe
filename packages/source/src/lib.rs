#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Open-data fetching and sheet normalization.
//!
//! Datasets are described by TOML definitions embedded at compile time
//! (see [`registry`]). The [`fetch`] module resolves them against a CKAN
//! portal and downloads the resources, [`sheet`] reads workbooks into
//! string grids, and [`normalize`] maps those grids onto the canonical
//! [`RawRecord`](ward_energy_records_models::RawRecord) schema.

pub mod archive;
pub mod ckan;
pub mod fetch;
pub mod normalize;
pub mod progress;
pub mod registry;
pub mod retry;
pub mod sheet;
pub mod source_def;

use std::path::PathBuf;

/// Errors that can occur while fetching or normalizing source data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Zip archive could not be read or extracted.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A workbook could not be opened or a sheet could not be read.
    #[error("Workbook error in {path}: {message}")]
    Workbook {
        /// Workbook path.
        path: String,
        /// Reader error message.
        message: String,
    },

    /// A sheet does not match the layout its format requires. Fatal: every
    /// column position downstream depends on it.
    #[error("Schema error: {message}")]
    Schema {
        /// Description of the mismatch.
        message: String,
    },

    /// A resource named in a dataset definition is not published, or was
    /// not downloaded before an offline run.
    #[error("Missing resource '{resource}' for dataset '{dataset}'")]
    MissingResource {
        /// Dataset identifier.
        dataset: String,
        /// Resource name or file name.
        resource: String,
    },

    /// Response or data normalization error.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },
}

/// Where downloads go and whether to download at all.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Directory that receives downloaded files.
    pub raw_dir: PathBuf,
    /// Directory the ward archive is unpacked into.
    pub wards_dir: PathBuf,
    /// Reuse files already in `raw_dir` instead of downloading.
    pub skip_fetch: bool,
}
