use std::path::Path;

use textgrid::{TextGrid, TierType};

use crate::config::CachedLabels;
use crate::error::PrepError;
use crate::types::AlignmentInterval;

const PHONE_TIER: &str = "phone";

/// The alignment labels of one take: the `start end label` triples written
/// to the `label` manifest and the bare phone sequence written to `text`,
/// both in phonetic order.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceLabels {
    pub intervals: Vec<String>,
    pub phones: Vec<String>,
}

impl UtteranceLabels {
    pub fn from_intervals(intervals: &[AlignmentInterval]) -> Self {
        Self {
            intervals: intervals
                .iter()
                .map(AlignmentInterval::manifest_entry)
                .collect(),
            phones: intervals
                .iter()
                .map(|interval| interval.label.clone())
                .collect(),
        }
    }

    pub fn from_textgrid(path: &Path) -> Result<Self, PrepError> {
        Ok(Self::from_intervals(&load_phone_tier(path)?))
    }
}

/// Loads a take's labels, preferring the pre-validated cache over its
/// TextGrid. `base` is the extension-less take path.
pub fn utterance_labels(
    base: &Path,
    source_id: &str,
    cache: &CachedLabels,
) -> Result<UtteranceLabels, PrepError> {
    if let Some(cached) = cache.get(source_id) {
        return Ok(cached.clone());
    }
    UtteranceLabels::from_textgrid(&base.with_extension("TextGrid"))
}

/// Reads the interval tier named `phone`, stripping the angle-bracket
/// markers that wrap silence and breath labels.
pub fn load_phone_tier(path: &Path) -> Result<Vec<AlignmentInterval>, PrepError> {
    let grid = TextGrid::from_file(path).map_err(|err| PrepError::TextGrid {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    let tier = grid
        .tiers
        .iter()
        .find(|tier| tier.tier_type == TierType::IntervalTier && tier.name == PHONE_TIER)
        .ok_or_else(|| PrepError::MissingPhoneTier {
            path: path.to_path_buf(),
        })?;

    Ok(tier
        .intervals
        .iter()
        .map(|interval| AlignmentInterval {
            start_s: interval.xmin,
            end_s: interval.xmax,
            label: strip_marker(interval.text.trim()).to_string(),
        })
        .collect())
}

fn strip_marker(label: &str) -> &str {
    if label.contains('<') || label.contains('>') {
        let mut chars = label.chars();
        chars.next();
        chars.next_back();
        chars.as_str()
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use textgrid::{Interval, Tier, TierType};

    use super::*;

    fn write_grid(dir: &Path, tier_name: &str) -> std::path::PathBuf {
        let mut grid = TextGrid::new(0.0, 1.2).unwrap();
        grid.add_tier(Tier {
            name: tier_name.to_string(),
            tier_type: TierType::IntervalTier,
            xmin: 0.0,
            xmax: 1.2,
            intervals: vec![
                Interval {
                    xmin: 0.0,
                    xmax: 0.4,
                    text: "<AP>".to_string(),
                },
                Interval {
                    xmin: 0.4,
                    xmax: 0.8,
                    text: " n ".to_string(),
                },
                Interval {
                    xmin: 0.8,
                    xmax: 1.2,
                    text: "i".to_string(),
                },
            ],
            points: Vec::new(),
        })
        .unwrap();
        let path = dir.join("take.TextGrid");
        grid.to_file(&path, false).unwrap();
        path
    }

    #[test]
    fn phone_tier_intervals_are_trimmed_and_unbracketed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path(), "phone");
        let intervals = load_phone_tier(&path).unwrap();
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[0].label, "AP");
        assert_eq!(intervals[1].label, "n");
        assert_eq!(intervals[2].start_s, 0.8);
    }

    #[test]
    fn missing_phone_tier_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path(), "words");
        let err = load_phone_tier(&path).unwrap_err();
        assert!(matches!(err, PrepError::MissingPhoneTier { .. }));
    }

    #[test]
    fn labels_split_into_triples_and_phones() {
        let intervals = [
            AlignmentInterval {
                start_s: 0.0,
                end_s: 0.5,
                label: "sh".to_string(),
            },
            AlignmentInterval {
                start_s: 0.5,
                end_s: 1.0,
                label: "ir".to_string(),
            },
        ];
        let labels = UtteranceLabels::from_intervals(&intervals);
        assert_eq!(labels.intervals, ["0 0.5 sh", "0.5 1 ir"]);
        assert_eq!(labels.phones, ["sh", "ir"]);
    }

    #[test]
    fn cache_wins_over_textgrid() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("0000");
        let mut cache = CachedLabels::default();
        let cached = UtteranceLabels {
            intervals: vec!["0.0 1.0 m".to_string()],
            phones: vec!["m".to_string()],
        };
        cache_insert(&mut cache, "Chinese/s/t/song/Control_Group/0000", &cached);
        let labels = utterance_labels(&base, "Chinese/s/t/song/Control_Group/0000", &cache).unwrap();
        assert_eq!(labels, cached);
    }

    fn cache_insert(cache: &mut CachedLabels, key: &str, labels: &UtteranceLabels) {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let quote = |items: &[String]| {
            let quoted: Vec<String> = items.iter().map(|item| format!("'{item}'")).collect();
            format!("[{}]", quoted.join(", "))
        };
        writeln!(file, "{key}").unwrap();
        writeln!(file, "{}", quote(&labels.phones)).unwrap();
        writeln!(file, "{}", quote(&labels.intervals)).unwrap();
        *cache = CachedLabels::from_file(file.path()).unwrap();
    }
}
