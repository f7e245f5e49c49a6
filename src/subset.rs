use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{MismatchPolicy, PrepConfig, SongPartition, Subset, UTT_PREFIX};
use crate::error::PrepError;
use crate::labels::utterance_labels;
use crate::reconcile::reconcile;
use crate::resample::Resampler;
use crate::score::{read_musicxml, ScoreWriter};
use crate::types::ScoreRecord;

const TAKES_PER_SONG: usize = 12;
const CONTROL_GROUP: &str = "Control";

/// One take selected for a subset, located during the corpus walk.
#[derive(Debug, Clone)]
pub struct UtteranceEntry {
    pub utt_id: String,
    pub speaker: String,
    /// Extension-less take path; `.wav`, `.musicxml` and `.TextGrid`
    /// siblings hang off it.
    pub base_path: PathBuf,
    pub wav_path: PathBuf,
    pub score_path: PathBuf,
    /// Corpus-relative id keying the cached-label and override tables.
    pub source_id: String,
}

/// The manifest payload of one utterance after score/label reconciliation.
#[derive(Debug, Clone)]
pub struct ProcessedUtterance {
    pub label_line: String,
    pub text_line: String,
    pub record: ScoreRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsetSummary {
    pub emitted: usize,
    pub skipped: usize,
}

/// Progress seam for the CLI; every hook is optional.
pub trait SubsetObserver {
    fn begin_resample(&mut self, _total: usize) {}
    fn resampled(&mut self, _utt_id: &str) {}
    fn begin_reconcile(&mut self, _total: usize) {}
    fn reconciled(&mut self, _utt_id: &str) {}
}

pub struct NullObserver;

impl SubsetObserver for NullObserver {}

/// Walks `singer/technique/song/{group}_Group/NNNN.wav` in sorted order and
/// returns the takes whose song belongs to `subset`. Takes without a wav
/// file are silently skipped.
pub fn enumerate_utterances(
    src_data: &Path,
    subset: Subset,
    partition: &SongPartition,
) -> Result<Vec<UtteranceEntry>, PrepError> {
    let mut entries = Vec::new();
    for singer_dir in sorted_subdirs(src_data)? {
        let singer = dir_name(&singer_dir)?;
        let speaker = speaker_id(&singer, &singer_dir)?;
        for technique_dir in sorted_subdirs(&singer_dir)? {
            let technique = dir_name(&technique_dir)?;
            for song_dir in sorted_subdirs(&technique_dir)? {
                let song = dir_name(&song_dir)?;
                if !partition.accepts(subset, &song) {
                    continue;
                }
                for take in 0..TAKES_PER_SONG {
                    for group in [technique.as_str(), CONTROL_GROUP] {
                        let base_path = song_dir
                            .join(format!("{group}_Group"))
                            .join(format!("{take:04}"));
                        let wav_path = base_path.with_extension("wav");
                        if !wav_path.exists() {
                            continue;
                        }
                        entries.push(UtteranceEntry {
                            utt_id: format!(
                                "{UTT_PREFIX}_{speaker}_{technique}_{song}_{group}Group_{take:04}"
                            ),
                            speaker: speaker.clone(),
                            score_path: base_path.with_extension("musicxml"),
                            source_id: source_id(&base_path),
                            base_path,
                            wav_path,
                        });
                    }
                }
            }
        }
    }
    Ok(entries)
}

/// Converts the take's audio into the wav dump and returns the dumped path.
pub fn resample_utterance(
    entry: &UtteranceEntry,
    config: &PrepConfig,
    resampler: &dyn Resampler,
) -> Result<PathBuf, PrepError> {
    let dest = config.wav_dump.join(format!("{}.wav", entry.utt_id));
    resampler.resample(&entry.wav_path, &dest, config.sample_rate_hz)?;
    Ok(dest)
}

/// Reads the take's score, loads its alignment labels, and reconciles the
/// two into the manifest payload.
pub fn prepare_utterance(
    entry: &UtteranceEntry,
    config: &PrepConfig,
) -> Result<ProcessedUtterance, PrepError> {
    let score = read_musicxml(&entry.score_path)?;
    let labels = utterance_labels(&entry.base_path, &entry.source_id, &config.cached_labels)?;
    let reconciled = reconcile(
        &entry.source_id,
        &score.notes,
        &labels,
        &config.overrides,
    )?;
    Ok(ProcessedUtterance {
        label_line: labels.intervals.join(" "),
        text_line: labels.phones.join(" "),
        record: ScoreRecord::new(score.tempo, &reconciled.notes),
    })
}

/// Emits the five manifest files of one subset. Creating the writer wipes
/// and recreates the destination directory.
pub struct SubsetWriter {
    wav_scp: BufWriter<File>,
    utt2spk: BufWriter<File>,
    label: BufWriter<File>,
    text: BufWriter<File>,
    score: ScoreWriter,
    emitted: usize,
}

impl SubsetWriter {
    pub fn create(dest: &Path, score_dump: &Path) -> Result<Self, PrepError> {
        if dest.exists() {
            fs::remove_dir_all(dest).map_err(|err| {
                PrepError::io(format!("removing stale subset '{}'", dest.display()), err)
            })?;
        }
        fs::create_dir_all(dest).map_err(|err| {
            PrepError::io(
                format!("creating subset directory '{}'", dest.display()),
                err,
            )
        })?;
        Ok(Self {
            wav_scp: manifest_file(dest, "wav.scp")?,
            utt2spk: manifest_file(dest, "utt2spk")?,
            label: manifest_file(dest, "label")?,
            text: manifest_file(dest, "text")?,
            score: ScoreWriter::create(score_dump, &dest.join("score.scp"))?,
            emitted: 0,
        })
    }

    pub fn emit(
        &mut self,
        entry: &UtteranceEntry,
        dumped_wav: &Path,
        processed: &ProcessedUtterance,
    ) -> Result<(), PrepError> {
        write_line(
            &mut self.wav_scp,
            "wav.scp",
            &entry.utt_id,
            &dumped_wav.display().to_string(),
        )?;
        write_line(&mut self.utt2spk, "utt2spk", &entry.utt_id, &entry.speaker)?;
        write_line(&mut self.label, "label", &entry.utt_id, &processed.label_line)?;
        write_line(&mut self.text, "text", &entry.utt_id, &processed.text_line)?;
        self.score.write(&entry.utt_id, &processed.record)?;
        self.emitted += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize, PrepError> {
        for (writer, name) in [
            (&mut self.wav_scp, "wav.scp"),
            (&mut self.utt2spk, "utt2spk"),
            (&mut self.label, "label"),
            (&mut self.text, "text"),
        ] {
            writer
                .flush()
                .map_err(|err| PrepError::io(format!("flushing {name}"), err))?;
        }
        self.score.finish()?;
        Ok(self.emitted)
    }
}

/// Runs the whole pipeline for one subset: wipe the destination, enumerate
/// takes, resample each, reconcile each, and emit the manifests. Utterances
/// with inconsistent labels are dropped or fatal per the mismatch policy.
pub fn build_subset(
    src_data: &Path,
    dest: &Path,
    subset: Subset,
    config: &PrepConfig,
    resampler: &dyn Resampler,
    observer: &mut dyn SubsetObserver,
) -> Result<SubsetSummary, PrepError> {
    fs::create_dir_all(&config.wav_dump).map_err(|err| {
        PrepError::io(
            format!("creating wav dump '{}'", config.wav_dump.display()),
            err,
        )
    })?;
    let mut writer = SubsetWriter::create(dest, &config.score_dump)?;

    let entries = enumerate_utterances(src_data, subset, &config.partition)?;
    info!(
        subset = subset.as_str(),
        takes = entries.len(),
        "enumerated corpus"
    );

    observer.begin_resample(entries.len());
    let mut dumped = Vec::with_capacity(entries.len());
    for entry in &entries {
        dumped.push(resample_utterance(entry, config, resampler)?);
        observer.resampled(&entry.utt_id);
    }

    observer.begin_reconcile(entries.len());
    let mut skipped = 0usize;
    for (entry, wav) in entries.iter().zip(&dumped) {
        match prepare_utterance(entry, config) {
            Ok(processed) => writer.emit(entry, wav, &processed)?,
            Err(err)
                if err.is_label_mismatch() && config.mismatch_policy == MismatchPolicy::Skip =>
            {
                warn!(utterance = %entry.utt_id, %err, "dropping utterance with inconsistent labels");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
        observer.reconciled(&entry.utt_id);
    }

    let emitted = writer.finish()?;
    info!(
        subset = subset.as_str(),
        emitted, skipped, "subset manifests written"
    );
    Ok(SubsetSummary { emitted, skipped })
}

fn manifest_file(dest: &Path, name: &str) -> Result<BufWriter<File>, PrepError> {
    let path = dest.join(name);
    let file = File::create(&path)
        .map_err(|err| PrepError::io(format!("creating '{}'", path.display()), err))?;
    Ok(BufWriter::new(file))
}

fn write_line(
    writer: &mut BufWriter<File>,
    name: &str,
    utt_id: &str,
    value: &str,
) -> Result<(), PrepError> {
    writeln!(writer, "{utt_id} {value}")
        .map_err(|err| PrepError::io(format!("appending to {name}"), err))
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>, PrepError> {
    let entries = fs::read_dir(dir)
        .map_err(|err| PrepError::io(format!("reading directory '{}'", dir.display()), err))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|err| PrepError::io(format!("reading entry in '{}'", dir.display()), err))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        } else {
            debug!(path = %path.display(), "ignoring stray file in corpus");
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> Result<String, PrepError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToString::to_string)
        .ok_or_else(|| PrepError::CorpusLayout {
            message: format!("directory '{}' has no UTF-8 name", path.display()),
        })
}

/// `ZH-Alto-1` becomes speaker `Alto1`.
fn speaker_id(singer: &str, singer_dir: &Path) -> Result<String, PrepError> {
    let parts: Vec<&str> = singer.split('-').collect();
    if parts.len() < 3 {
        return Err(PrepError::CorpusLayout {
            message: format!(
                "singer directory '{}' is not of the form LANG-VOICE-INDEX",
                singer_dir.display()
            ),
        });
    }
    Ok(format!("{}{}", parts[1], parts[2]))
}

/// The last six path components of the extension-less take path, the key
/// format of the cached-label and override tables.
fn source_id(base_path: &Path) -> String {
    let components: Vec<&str> = base_path
        .components()
        .filter_map(|component| match component {
            std::path::Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect();
    let start = components.len().saturating_sub(6);
    components[start..].join("/")
}
