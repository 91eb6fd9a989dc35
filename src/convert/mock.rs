use super::{processor::output_path_for, ConversionService, ConvertedImage};
use crate::models::SourceFormat;
use crate::{ConvertError, ConvertErrorKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory converter that records calls and never touches the filesystem.
#[derive(Clone)]
pub struct MockConverter {
    output_dir: PathBuf,
    calls: Arc<Mutex<Vec<PathBuf>>>,
    failures: Arc<Mutex<HashMap<PathBuf, ConvertErrorKind>>>,
}

impl MockConverter {
    pub fn new() -> Self {
        Self {
            output_dir: PathBuf::from("/tmp/converted"),
            calls: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }

    /// Make conversions of `path` fail with an error of the given kind.
    pub fn with_failure(self, path: PathBuf, kind: ConvertErrorKind) -> Self {
        self.failures.lock().unwrap().insert(path, kind);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn get_calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }

    fn failure_for(&self, path: &Path, kind: ConvertErrorKind) -> ConvertError {
        let path = path.to_path_buf();
        let io = || std::io::Error::other("Mock failure");
        match kind {
            ConvertErrorKind::Open => ConvertError::Open { path, source: io() },
            ConvertErrorKind::Decode => ConvertError::Decode {
                path,
                source: image::ImageError::IoError(io()),
            },
            ConvertErrorKind::UnsupportedFormat => ConvertError::UnsupportedFormat {
                path,
                format: "mock".to_string(),
            },
            ConvertErrorKind::OutputWrite => ConvertError::OutputWrite { path, source: io() },
            ConvertErrorKind::Encode => ConvertError::Encode {
                path,
                source: image::ImageError::IoError(io()),
            },
            ConvertErrorKind::Finalize => ConvertError::Finalize { path, source: io() },
            ConvertErrorKind::Delete => ConvertError::Delete {
                output: self.output_path(&path),
                path,
                source: io(),
            },
            ConvertErrorKind::Task => ConvertError::Task {
                path,
                message: "Mock failure".to_string(),
            },
        }
    }
}

impl Default for MockConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversionService for MockConverter {
    async fn convert(&self, input: &Path) -> Result<ConvertedImage, ConvertError> {
        self.calls.lock().unwrap().push(input.to_path_buf());

        let failure = self.failures.lock().unwrap().get(input).copied();
        if let Some(kind) = failure {
            return Err(self.failure_for(input, kind));
        }

        Ok(ConvertedImage {
            input: input.to_path_buf(),
            output: self.output_path(input),
            format: SourceFormat::from_extension(input).unwrap_or(SourceFormat::Png),
            width: 1,
            height: 1,
            replaced: false,
        })
    }

    fn output_path(&self, input: &Path) -> PathBuf {
        output_path_for(input, &self.output_dir)
    }
}
