use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error while {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse TextGrid '{}': {message}", path.display())]
    TextGrid { path: PathBuf, message: String },
    #[error("no interval tier named 'phone' in TextGrid '{}'", path.display())]
    MissingPhoneTier { path: PathBuf },
    #[error("failed to parse score '{context}': {message}")]
    Score { context: String, message: String },
    #[error("unexpected corpus layout: {message}")]
    CorpusLayout { message: String },
    #[error("resampling '{}' failed: {message}", path.display())]
    Resample { path: PathBuf, message: String },
    #[error("malformed cached-label file '{}' near line {line}: {message}", path.display())]
    CachedLabelFile {
        path: PathBuf,
        line: usize,
        message: String,
    },
    /// The score asked for more phonemes than the alignment provides.
    #[error("{utterance}: score consumed all {consumed} alignment labels before the last note")]
    LabelOverrun { utterance: String, consumed: usize },
    #[error("{utterance}: alignment carries {expected} phonemes but the score consumed {found}")]
    LabelCountMismatch {
        utterance: String,
        expected: usize,
        found: usize,
    },
    #[error("{utterance}: phoneme mismatch at index {index}: alignment '{expected}' vs score '{found}'")]
    LabelMismatch {
        utterance: String,
        index: usize,
        expected: String,
        found: String,
    },
}

impl PrepError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// True for the reconciliation failures that the subset builder may skip
    /// instead of aborting the run.
    pub fn is_label_mismatch(&self) -> bool {
        matches!(
            self,
            Self::LabelOverrun { .. } | Self::LabelCountMismatch { .. } | Self::LabelMismatch { .. }
        )
    }
}
