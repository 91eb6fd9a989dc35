//! Discovery of candidate image files
//!
//! Walks a root directory, keeps files whose names carry a known image
//! extension and classifies each one by sniffing its leading bytes.

use crate::models::{format_name, Classification, SourceFormat};
use crate::Result;
use image::ImageReader;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name suffixes (matched case-insensitively) that mark a file as a candidate.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp",
];

/// A discovered file together with what its name and its bytes say it is.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub path: PathBuf,
    pub declared: Option<SourceFormat>,
    pub classification: Classification,
}

pub fn has_image_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Recursively list every image-named file under `root`.
///
/// The first entry that cannot be read aborts the walk.
pub fn collect_image_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        if has_image_extension(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Open `path` with a reader whose format is guessed from content only.
pub fn open_sniffed(path: &Path) -> io::Result<ImageReader<BufReader<File>>> {
    let file = File::open(path)?;
    ImageReader::new(BufReader::new(file)).with_guessed_format()
}

pub fn classify(path: &Path) -> io::Result<Classification> {
    let reader = open_sniffed(path)?;
    Ok(match reader.format() {
        Some(format) => match SourceFormat::from_image_format(format) {
            Some(supported) => Classification::Supported(supported),
            None => Classification::Unsupported(format_name(format)),
        },
        None => Classification::NotAnImage,
    })
}

/// Collect and classify every candidate under `root`.
pub fn scan(root: &Path) -> Result<Vec<Candidate>> {
    let files = collect_image_files(root)?;
    tracing::debug!("Collected {} image files under {}", files.len(), root.display());

    Ok(files
        .into_iter()
        .map(|path| {
            let classification = classify(&path).unwrap_or_else(|e| {
                tracing::warn!("Could not sniff {}: {}", path.display(), e);
                Classification::NotAnImage
            });
            Candidate {
                declared: SourceFormat::from_extension(&path),
                path,
                classification,
            }
        })
        .collect())
}
