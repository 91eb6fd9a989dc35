use super::{ConversionService, ConvertedImage};
use crate::collector::open_sniffed;
use crate::models::{format_name, SourceFormat};
use crate::ConvertError;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::ffi::OsString;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Fixed JPEG quality on the 0-100 scale.
pub const JPEG_QUALITY: u8 = 90;

pub struct JpegConverter {
    output_dir: PathBuf,
}

impl JpegConverter {
    /// The output directory must already exist; see [`prepare_output_dir`].
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl ConversionService for JpegConverter {
    async fn convert(&self, input: &Path) -> Result<ConvertedImage, ConvertError> {
        tokio::task::spawn_blocking({
            let input = input.to_path_buf();
            let output_dir = self.output_dir.clone();
            move || convert_file(&input, &output_dir)
        })
        .await
        .map_err(|e| ConvertError::Task {
            path: input.to_path_buf(),
            message: format!("Image conversion task join error: {}", e),
        })?
    }

    fn output_path(&self, input: &Path) -> PathBuf {
        output_path_for(input, &self.output_dir)
    }
}

/// Create the output directory if it is missing. Existing contents are untouched.
pub fn prepare_output_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// `<output_dir>/<input stem>.jpg`
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let mut name: OsString = match (input.file_stem(), input.extension()) {
        // A bare dotfile such as `.png` is all extension.
        (Some(stem), None) if stem.to_string_lossy().starts_with('.') => OsString::new(),
        (Some(stem), _) => stem.to_os_string(),
        (None, _) => OsString::new(),
    };
    name.push(".jpg");
    output_dir.join(name)
}

/// Convert one file to JPEG inside `output_dir`, then delete the original.
pub fn convert_file(input: &Path, output_dir: &Path) -> Result<ConvertedImage, ConvertError> {
    let (image, format) = decode(input)?;
    let (width, height) = (image.width(), image.height());

    let output = output_path_for(input, output_dir);
    let replaced = write_jpeg(image, &output)?;
    remove_original(input, &output)?;

    Ok(ConvertedImage {
        input: input.to_path_buf(),
        output,
        format,
        width,
        height,
        replaced,
    })
}

/// Delete a converted input. `output` is the artifact already written for it.
pub fn remove_original(input: &Path, output: &Path) -> Result<(), ConvertError> {
    fs::remove_file(input).map_err(|source| ConvertError::Delete {
        path: input.to_path_buf(),
        output: output.to_path_buf(),
        source,
    })
}

fn decode(input: &Path) -> Result<(DynamicImage, SourceFormat), ConvertError> {
    let reader = open_sniffed(input).map_err(|source| ConvertError::Open {
        path: input.to_path_buf(),
        source,
    })?;

    let format = match reader.format() {
        Some(detected) => SourceFormat::from_image_format(detected).ok_or_else(|| {
            ConvertError::UnsupportedFormat {
                path: input.to_path_buf(),
                format: format_name(detected),
            }
        })?,
        None => {
            return Err(ConvertError::UnsupportedFormat {
                path: input.to_path_buf(),
                format: "unknown".to_string(),
            })
        }
    };

    let image = reader.decode().map_err(|source| ConvertError::Decode {
        path: input.to_path_buf(),
        source,
    })?;

    Ok((image, format))
}

/// Returns whether an earlier artifact with the same name was overwritten.
fn write_jpeg(image: DynamicImage, output: &Path) -> Result<bool, ConvertError> {
    let output_write = |source: io::Error| ConvertError::OutputWrite {
        path: output.to_path_buf(),
        source,
    };

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut prefix = OsString::from(".");
    if let Some(name) = output.file_name() {
        prefix.push(name);
        prefix.push(".");
    }

    // Removed on drop unless persisted.
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(output_write)?;

    {
        let mut writer = BufWriter::new(&mut tmp);
        let rgb = image.into_rgb8();
        JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
            .encode_image(&rgb)
            .map_err(|source| ConvertError::Encode {
                path: output.to_path_buf(),
                source,
            })?;
        writer.flush().map_err(output_write)?;
    }
    tmp.as_file().sync_all().map_err(output_write)?;

    let replaced = output.try_exists().unwrap_or(false);
    if replaced {
        warn!("Replacing existing converted file {}", output.display());
    }

    tmp.persist(output).map_err(|e| ConvertError::Finalize {
        path: output.to_path_buf(),
        source: e.error,
    })?;

    Ok(replaced)
}
