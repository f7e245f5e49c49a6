use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PrepError;
use crate::labels::UtteranceLabels;

pub const UTT_PREFIX: &str = "GTSINGER_CHINESE";

const DEV_SONGS: [&str; 5] = ["不再见", "曹操", "爱情转移", "大鱼", "安河桥"];
const TEST_SONGS: [&str; 5] = ["匆匆那年", "可惜没如果", "菊花台", "默", "画心"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subset {
    Train,
    Dev,
    Test,
}

impl Subset {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Dev => "dev",
            Self::Test => "test",
        }
    }
}

/// Fixed song-title partition. Dev and test are closed title lists; every
/// other title is train, so the three subsets are disjoint and exhaustive.
#[derive(Debug, Clone)]
pub struct SongPartition {
    dev: Vec<String>,
    test: Vec<String>,
}

impl Default for SongPartition {
    fn default() -> Self {
        Self {
            dev: DEV_SONGS.iter().map(ToString::to_string).collect(),
            test: TEST_SONGS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl SongPartition {
    pub fn subset_of(&self, song: &str) -> Subset {
        if self.dev.iter().any(|title| title == song) {
            Subset::Dev
        } else if self.test.iter().any(|title| title == song) {
            Subset::Test
        } else {
            Subset::Train
        }
    }

    pub fn accepts(&self, subset: Subset, song: &str) -> bool {
        self.subset_of(song) == subset
    }
}

/// Per-(song, character) pronunciation overrides for lyrics whose alignment
/// is known ambiguous. The yue-songs file installs `乐 → [ve]` for each
/// listed song source id.
#[derive(Debug, Clone, Default)]
pub struct PronunciationOverrides {
    by_song: HashMap<String, HashMap<char, Vec<String>>>,
}

impl PronunciationOverrides {
    pub fn from_yue_songs_file(path: &Path) -> Result<Self, PrepError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| PrepError::io(format!("reading song list '{}'", path.display()), err))?;
        let mut overrides = Self::default();
        for line in contents.lines() {
            let song = line.trim();
            if song.is_empty() {
                continue;
            }
            overrides.insert(song, '乐', vec!["ve".to_string()]);
        }
        Ok(overrides)
    }

    pub fn insert(&mut self, song: &str, character: char, phonemes: Vec<String>) {
        self.by_song
            .entry(song.to_string())
            .or_default()
            .insert(character, phonemes);
    }

    pub fn lookup(&self, song: &str, character: char) -> Option<&[String]> {
        self.by_song
            .get(song)
            .and_then(|chars| chars.get(&character))
            .map(Vec::as_slice)
    }
}

/// Pre-validated alignment labels for takes whose TextGrid is known bad.
/// The file holds repeating 3-line records: source id, bracketed phoneme
/// list, bracketed `start end label` triple list. A blank line ends the
/// file.
#[derive(Debug, Clone, Default)]
pub struct CachedLabels {
    by_source: HashMap<String, UtteranceLabels>,
}

impl CachedLabels {
    pub fn from_file(path: &Path) -> Result<Self, PrepError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            PrepError::io(format!("reading cached labels '{}'", path.display()), err)
        })?;
        let mut by_source = HashMap::new();
        let mut lines = contents.lines().enumerate();
        while let Some((line_no, raw_key)) = lines.next() {
            if raw_key.trim().is_empty() {
                break;
            }
            let key = raw_key.trim().to_string();
            let phones = next_record_line(path, &mut lines, &key)?;
            let intervals = next_record_line(path, &mut lines, &key)?;
            let labels = UtteranceLabels {
                phones: parse_quoted_list(path, line_no + 2, &phones)?,
                intervals: parse_quoted_list(path, line_no + 3, &intervals)?,
            };
            by_source.insert(key, labels);
        }
        Ok(Self { by_source })
    }

    pub fn get(&self, source_id: &str) -> Option<&UtteranceLabels> {
        self.by_source.get(source_id)
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }
}

fn next_record_line<'a>(
    path: &Path,
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
    key: &str,
) -> Result<String, PrepError> {
    match lines.next() {
        Some((_, line)) => Ok(line.to_string()),
        None => Err(PrepError::CachedLabelFile {
            path: path.to_path_buf(),
            line: 0,
            message: format!("truncated record for '{key}'"),
        }),
    }
}

/// Parses a bracketed, quoted list literal such as `['a', 'b c', "d"]`.
fn parse_quoted_list(path: &Path, line_no: usize, line: &str) -> Result<Vec<String>, PrepError> {
    let trimmed = line.trim();
    let malformed = |message: String| PrepError::CachedLabelFile {
        path: path.to_path_buf(),
        line: line_no,
        message,
    };
    let body = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| malformed("expected a bracketed list".to_string()))?;

    let mut items = Vec::new();
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' => {
                let mut item = String::new();
                loop {
                    match chars.next() {
                        Some(end) if end == ch => break,
                        Some(inner) => item.push(inner),
                        None => return Err(malformed("unterminated quoted item".to_string())),
                    }
                }
                items.push(item);
            }
            ',' | ' ' => {}
            other => {
                return Err(malformed(format!("unexpected character '{other}'")));
            }
        }
    }
    Ok(items)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchPolicy {
    /// Propagate the first reconciliation error, aborting the run.
    Abort,
    /// Warn and drop the utterance from every manifest.
    Skip,
}

/// Everything the subset builder needs beyond the source and destination
/// directories. The lookup tables are loaded once and read-only.
#[derive(Debug)]
pub struct PrepConfig {
    pub sample_rate_hz: u32,
    pub wav_dump: PathBuf,
    pub score_dump: PathBuf,
    pub partition: SongPartition,
    pub overrides: PronunciationOverrides,
    pub cached_labels: CachedLabels,
    pub mismatch_policy: MismatchPolicy,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partition_routes_fixed_titles() {
        let partition = SongPartition::default();
        assert_eq!(partition.subset_of("大鱼"), Subset::Dev);
        assert_eq!(partition.subset_of("默"), Subset::Test);
        assert_eq!(partition.subset_of("十年"), Subset::Train);
    }

    #[test]
    fn partition_subsets_are_disjoint() {
        let partition = SongPartition::default();
        for song in ["大鱼", "默", "十年", "菊花台", "安河桥"] {
            let matches = [Subset::Train, Subset::Dev, Subset::Test]
                .iter()
                .filter(|subset| partition.accepts(**subset, song))
                .count();
            assert_eq!(matches, 1, "song '{song}' must land in exactly one subset");
        }
    }

    #[test]
    fn yue_songs_install_le_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Chinese/ZH-Alto-1/Breathy/十年/Control_Group/0000").unwrap();
        writeln!(file).unwrap();
        let overrides = PronunciationOverrides::from_yue_songs_file(file.path()).unwrap();
        assert_eq!(
            overrides.lookup("Chinese/ZH-Alto-1/Breathy/十年/Control_Group/0000", '乐'),
            Some(&["ve".to_string()][..])
        );
        assert_eq!(overrides.lookup("elsewhere", '乐'), None);
    }

    #[test]
    fn cached_labels_parse_three_line_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Chinese/ZH-Tenor-1/Vibrato/默/Control_Group/0003").unwrap();
        writeln!(file, "['AP', 'm', 'o']").unwrap();
        writeln!(file, "['0.0 0.41 AP', '0.41 0.6 m', '0.6 1.02 o']").unwrap();
        writeln!(file).unwrap();
        let cache = CachedLabels::from_file(file.path()).unwrap();
        assert_eq!(cache.len(), 1);
        let entry = cache
            .get("Chinese/ZH-Tenor-1/Vibrato/默/Control_Group/0003")
            .unwrap();
        assert_eq!(entry.phones, ["AP", "m", "o"]);
        assert_eq!(entry.intervals[1], "0.41 0.6 m");
    }

    #[test]
    fn cached_labels_reject_truncated_record() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Chinese/ZH-Tenor-1/Vibrato/默/Control_Group/0003").unwrap();
        writeln!(file, "['m']").unwrap();
        let err = CachedLabels::from_file(file.path()).unwrap_err();
        assert!(matches!(err, PrepError::CachedLabelFile { .. }));
    }

    #[test]
    fn quoted_list_handles_spaces_and_double_quotes() {
        let items =
            parse_quoted_list(Path::new("x"), 1, r#"['0.0 0.5 sh', "0.5 1.0 ir"]"#).unwrap();
        assert_eq!(items, ["0.0 0.5 sh", "0.5 1.0 ir"]);
    }
}
