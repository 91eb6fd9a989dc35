//! JPEG conversion engine
//!
//! Decodes one image chosen by content sniffing, re-encodes it as JPEG into the
//! output directory and removes the original once the JPEG is in place.

pub mod mock;
pub mod processor;

pub use mock::MockConverter;
pub use processor::{
    convert_file, output_path_for, prepare_output_dir, remove_original, JpegConverter,
    JPEG_QUALITY,
};

use crate::models::SourceFormat;
use crate::ConvertError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedImage {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: SourceFormat,
    pub width: u32,
    pub height: u32,
    /// An artifact with the same name existed and was overwritten.
    pub replaced: bool,
}

#[async_trait]
pub trait ConversionService: Send + Sync {
    /// Convert `input` into a JPEG and remove it on success.
    async fn convert(&self, input: &Path) -> Result<ConvertedImage, ConvertError>;

    /// Where the JPEG for `input` will be written.
    fn output_path(&self, input: &Path) -> PathBuf;
}
