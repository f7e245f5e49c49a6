pub mod config;
pub mod error;
pub mod labels;
pub mod reconcile;
pub mod resample;
pub mod romanize;
pub mod score;
pub mod subset;
pub mod types;

pub use config::{
    CachedLabels, MismatchPolicy, PrepConfig, PronunciationOverrides, SongPartition, Subset,
    UTT_PREFIX,
};
pub use error::PrepError;
pub use labels::UtteranceLabels;
pub use reconcile::{reconcile, ReconciledUtterance};
pub use resample::{Resampler, SoxResampler};
pub use score::{read_musicxml, Score, ScoreWriter};
pub use subset::{
    build_subset, enumerate_utterances, prepare_utterance, resample_utterance, NullObserver,
    ProcessedUtterance, SubsetObserver, SubsetSummary, SubsetWriter, UtteranceEntry,
};
pub use types::{AlignmentInterval, LabeledNote, ScoreNote, ScoreRecord};
