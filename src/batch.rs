//! Batch planning and per-file outcomes
//!
//! Decides which classified candidates get converted, guards against two
//! inputs writing the same output name, and aggregates the results of a run.

use crate::collector::Candidate;
use crate::convert::ConvertedImage;
use crate::models::{Classification, SourceFormat};
use crate::{ConvertError, ConvertErrorKind};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    NotSelected { classification: Classification },
    OutputConflict { output: PathBuf, kept: PathBuf },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Converted {
        output: PathBuf,
        /// Set when an older artifact with the same name was overwritten.
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        replaced: bool,
    },
    Failed {
        kind: ConvertErrorKind,
        message: String,
        /// Set when the JPEG was written but the original could not be removed.
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<PathBuf>,
    },
    Skipped {
        #[serde(flatten)]
        reason: SkipReason,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub input: PathBuf,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl FileOutcome {
    pub fn converted(image: &ConvertedImage) -> Self {
        Self {
            input: image.input.clone(),
            status: OutcomeStatus::Converted {
                output: image.output.clone(),
                replaced: image.replaced,
            },
        }
    }

    pub fn failed(error: &ConvertError) -> Self {
        Self {
            input: error.path().clone(),
            status: OutcomeStatus::Failed {
                kind: error.kind(),
                message: error.to_string(),
                output: error.retained_output().cloned(),
            },
        }
    }

    pub fn skipped(input: PathBuf, reason: SkipReason) -> Self {
        Self {
            input,
            status: OutcomeStatus::Skipped { reason },
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self.status, OutcomeStatus::Converted { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, OutcomeStatus::Skipped { .. })
    }
}

/// Jobs to run plus the candidates that were set aside while planning.
#[derive(Debug, Default)]
pub struct BatchPlan {
    pub jobs: Vec<PathBuf>,
    pub skipped: Vec<FileOutcome>,
}

/// Whether a candidate should be handed to the engine.
///
/// A candidate is selected when either its sniffed format or the format its
/// extension declares is wanted. A `.png` holding jpeg bytes is converted, and
/// a `.png` holding webp or garbage reaches the engine and fails visibly.
pub fn is_selected(candidate: &Candidate, formats: &[SourceFormat]) -> bool {
    let declared = candidate
        .declared
        .is_some_and(|declared| formats.contains(&declared));
    match &candidate.classification {
        Classification::Supported(format) => formats.contains(format) || declared,
        Classification::Unsupported(_) | Classification::NotAnImage => declared,
    }
}

/// Build the job list for a batch.
///
/// `output_path` maps an input to its output file; the first input in path
/// order keeps a contested output name.
pub fn plan<F>(candidates: Vec<Candidate>, formats: &[SourceFormat], output_path: F) -> BatchPlan
where
    F: Fn(&Path) -> PathBuf,
{
    let mut candidates = candidates;
    candidates.sort_by(|a, b| a.path.cmp(&b.path));

    let mut batch = BatchPlan::default();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

    for candidate in candidates {
        if !is_selected(&candidate, formats) {
            tracing::debug!(
                "Skipping {} ({})",
                candidate.path.display(),
                candidate.classification
            );
            batch.skipped.push(FileOutcome::skipped(
                candidate.path,
                SkipReason::NotSelected {
                    classification: candidate.classification,
                },
            ));
            continue;
        }

        let output = output_path(&candidate.path);
        if let Some(kept) = claimed.get(&output) {
            tracing::warn!(
                "Skipping {}: {} is already produced from {}",
                candidate.path.display(),
                output.display(),
                kept.display()
            );
            batch.skipped.push(FileOutcome::skipped(
                candidate.path,
                SkipReason::OutputConflict {
                    output,
                    kept: kept.clone(),
                },
            ));
            continue;
        }

        claimed.insert(output, candidate.path.clone());
        batch.jobs.push(candidate.path);
    }

    batch
}

/// Aggregate result of one run, sorted by input path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn new(mut outcomes: Vec<FileOutcome>) -> Self {
        outcomes.sort_by(|a, b| a.input.cmp(&b.input));
        Self { outcomes }
    }

    pub fn converted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_converted()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    pub fn outcome_for(&self, input: &Path) -> Option<&FileOutcome> {
        self.outcomes.iter().find(|o| o.input == input)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} files checked: {} converted, {} failed, {} skipped",
            self.outcomes.len(),
            self.converted(),
            self.failed(),
            self.skipped()
        )
    }
}
