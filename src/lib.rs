//! Batch converter that turns uploaded images into JPEG files
//!
//! Walks an upload folder, classifies every image by its content, re-encodes the
//! selected ones as JPEG into an output directory and removes the originals.
//! Source images can optionally be pulled from a remote asset store first.

pub mod app;
#[cfg(feature = "remote-assets")]
pub mod assets;
pub mod batch;
pub mod collector;
pub mod convert;
pub mod error;
pub mod models;

pub use error::{ConvertError, ConvertErrorKind, Error, Result};
