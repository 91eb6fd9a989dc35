//! Error handling and custom error types
//!
//! `Error` covers failures that stop a whole run. `ConvertError` covers a single
//! file; those are reported and the batch moves on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Directory traversal error: {0}")]
    Traversal(#[from] walkdir::Error),

    #[cfg(feature = "remote-assets")]
    #[error("Asset store error: {0}")]
    Asset(#[from] crate::assets::AssetError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure converting one file. Each variant is a distinct step of the engine.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("error opening {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error decoding {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("unsupported image format '{format}' in {}", path.display())]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("error writing output file {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error encoding {} to jpeg: {source}", path.display())]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("error moving converted file into {}: {source}", path.display())]
    Finalize {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "error removing original {} (converted copy kept at {}): {source}",
        path.display(),
        output.display()
    )]
    Delete {
        path: PathBuf,
        output: PathBuf,
        source: std::io::Error,
    },

    #[error("conversion task for {} failed: {message}", path.display())]
    Task { path: PathBuf, message: String },
}

/// Which engine step a [`ConvertError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvertErrorKind {
    Open,
    Decode,
    UnsupportedFormat,
    OutputWrite,
    Encode,
    Finalize,
    Delete,
    Task,
}

impl ConvertError {
    pub fn kind(&self) -> ConvertErrorKind {
        match self {
            Self::Open { .. } => ConvertErrorKind::Open,
            Self::Decode { .. } => ConvertErrorKind::Decode,
            Self::UnsupportedFormat { .. } => ConvertErrorKind::UnsupportedFormat,
            Self::OutputWrite { .. } => ConvertErrorKind::OutputWrite,
            Self::Encode { .. } => ConvertErrorKind::Encode,
            Self::Finalize { .. } => ConvertErrorKind::Finalize,
            Self::Delete { .. } => ConvertErrorKind::Delete,
            Self::Task { .. } => ConvertErrorKind::Task,
        }
    }

    /// The input file this error is about.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Open { path, .. }
            | Self::Decode { path, .. }
            | Self::UnsupportedFormat { path, .. }
            | Self::OutputWrite { path, .. }
            | Self::Encode { path, .. }
            | Self::Finalize { path, .. }
            | Self::Delete { path, .. }
            | Self::Task { path, .. } => path,
        }
    }

    /// The converted artifact left on disk, if the failure happened after it was written.
    pub fn retained_output(&self) -> Option<&PathBuf> {
        match self {
            Self::Delete { output, .. } => Some(output),
            _ => None,
        }
    }
}

impl fmt::Display for ConvertErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Decode => "decode",
            Self::UnsupportedFormat => "unsupported_format",
            Self::OutputWrite => "output_write",
            Self::Encode => "encode",
            Self::Finalize => "finalize",
            Self::Delete => "delete",
            Self::Task => "task",
        };
        f.write_str(name)
    }
}
