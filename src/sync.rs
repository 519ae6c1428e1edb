use serde::Serialize;

use crate::convert::convert_annotation;
use crate::error::ConversionError;
use crate::logger::SyncLogger;
use crate::model::{NormalizedHighlight, SourceAnnotation};
use crate::ordering::sort_reading_order;

/// Readwise rejects highlights at or above this many characters.
pub const MAX_HIGHLIGHT_CHARS: usize = 8191;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    OversizeContent { length: usize },
    Conversion(ConversionError),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::OversizeContent { length } => write!(
                f,
                "OversizeContent: {} characters (limit {})",
                length, MAX_HIGHLIGHT_CHARS
            ),
            FailureReason::Conversion(e) => write!(f, "ConversionFailure: {}", e),
        }
    }
}

#[derive(Debug)]
pub enum ItemOutcome {
    Converted(NormalizedHighlight),
    Failed {
        annotation: SourceAnnotation,
        reason: FailureReason,
    },
}

impl ItemOutcome {
    pub fn record(self, report: &mut SyncReport) {
        match self {
            ItemOutcome::Converted(highlight) => {
                report.stats.converted += 1;
                report.highlights.push(highlight);
            }
            ItemOutcome::Failed { annotation, reason } => {
                report.stats.failed += 1;
                if matches!(reason, FailureReason::OversizeContent { .. }) {
                    report.stats.oversize += 1;
                }
                report.failed.push(FailedRecord {
                    annotation,
                    reason: reason.to_string(),
                });
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub converted: usize,
    pub failed: usize,
    pub oversize: usize,
}

/// Dead-letter entry: the annotation's non-empty fields plus why it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRecord {
    #[serde(flatten)]
    pub annotation: SourceAnnotation,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub highlights: Vec<NormalizedHighlight>,
    pub failed: Vec<FailedRecord>,
    pub stats: SyncStats,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        format!(
            "{} highlights converted, {} failed ({} over the {} character limit)",
            self.stats.converted, self.stats.failed, self.stats.oversize, MAX_HIGHLIGHT_CHARS
        )
    }
}

pub fn process_annotation(annotation: SourceAnnotation) -> ItemOutcome {
    let length = annotation.text.chars().count();
    if length >= MAX_HIGHLIGHT_CHARS {
        return ItemOutcome::Failed {
            annotation,
            reason: FailureReason::OversizeContent { length },
        };
    }

    match convert_annotation(&annotation) {
        Ok(highlight) => ItemOutcome::Converted(highlight),
        Err(e) => ItemOutcome::Failed {
            annotation,
            reason: FailureReason::Conversion(e),
        },
    }
}

pub struct Normalizer<'a> {
    logger: &'a dyn SyncLogger,
}

impl<'a> Normalizer<'a> {
    pub fn new(logger: &'a dyn SyncLogger) -> Self {
        Self { logger }
    }

    /// Sorts into reading order and converts one item at a time. A failing
    /// item is diverted to `failed` and never aborts the batch.
    pub fn normalize(&self, mut annotations: Vec<SourceAnnotation>) -> SyncReport {
        self.logger.info(&format!(
            "formatting {} annotations/notes",
            annotations.len()
        ));
        sort_reading_order(&mut annotations);

        let mut report = SyncReport::default();
        for annotation in annotations {
            let outcome = process_annotation(annotation);
            if let ItemOutcome::Failed { annotation, reason } = &outcome {
                self.log_failure(annotation, reason);
            }
            outcome.record(&mut report);
        }

        report
    }

    fn log_failure(&self, annotation: &SourceAnnotation, reason: &FailureReason) {
        let title = annotation.title.as_deref().unwrap_or("untitled item");
        match reason {
            FailureReason::OversizeContent { .. } => self.logger.warn(&format!(
                "annotation from {} (item_key={}, version={}) cannot be uploaded: {}",
                title, annotation.key, annotation.version, reason
            )),
            FailureReason::Conversion(_) => self.logger.error(&format!(
                "failed to convert annotation from {} (item_key={}): {}",
                title, annotation.key, reason
            )),
        }
    }
}
