use crate::config::PronunciationOverrides;
use crate::error::PrepError;
use crate::labels::UtteranceLabels;
use crate::romanize::syllable_phones;
use crate::types::{LabeledNote, ScoreNote};

const CONTINUATION_LYRIC: &str = "—";
const PAUSE_LYRIC: &str = "P";
const BREATH_LYRIC: &str = "AP";

/// The reconciled view of one take: notes whose phonemes are the consumed
/// alignment labels, plus the flat consumed sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledUtterance {
    pub notes: Vec<LabeledNote>,
    pub phones: Vec<String>,
}

/// Merges the score's note stream with the alignment phone sequence.
///
/// Notes are visited in order against a single running index into the
/// labels. A continuation lyric extends the previous note and consumes
/// nothing; a pause placeholder is renamed to the breath marker; every
/// other lyric consumes as many labels as its romanized cluster has
/// phonemes. The labels are authoritative: romanization only decides the
/// count, and each consumed phoneme is the alignment label itself.
pub fn reconcile(
    source_id: &str,
    notes: &[ScoreNote],
    labels: &UtteranceLabels,
    overrides: &PronunciationOverrides,
) -> Result<ReconciledUtterance, PrepError> {
    let mut out: Vec<LabeledNote> = Vec::with_capacity(notes.len());
    let mut consumed_flat = Vec::with_capacity(labels.phones.len());
    let mut label_idx = 0usize;

    for note in notes {
        if note.lyric == CONTINUATION_LYRIC {
            if let Some(last) = out.last_mut() {
                last.end_s = note.end_s;
            }
            continue;
        }
        let lyric = if note.lyric == PAUSE_LYRIC {
            BREATH_LYRIC
        } else {
            note.lyric.as_str()
        };

        let cluster = cluster_for(source_id, lyric, overrides);
        let mut consumed = Vec::with_capacity(cluster.len());
        for _ in &cluster {
            let Some(label) = labels.phones.get(label_idx) else {
                return Err(PrepError::LabelOverrun {
                    utterance: source_id.to_string(),
                    consumed: label_idx,
                });
            };
            consumed.push(label.clone());
            label_idx += 1;
        }
        consumed_flat.extend(consumed.iter().cloned());
        out.push(LabeledNote {
            start_s: note.start_s,
            end_s: note.end_s,
            lyric: lyric.to_string(),
            midi: note.midi,
            phonemes: consumed.join("_"),
        });
    }

    check_consumed(source_id, &labels.phones, &consumed_flat)?;
    Ok(ReconciledUtterance {
        notes: out,
        phones: consumed_flat,
    })
}

/// The phoneme cluster of one lyric: the override table wins, otherwise
/// the first syllable of the romanization, split at the separator.
fn cluster_for(source_id: &str, lyric: &str, overrides: &PronunciationOverrides) -> Vec<String> {
    if let Some(first_char) = lyric.chars().next() {
        if let Some(forced) = overrides.lookup(source_id, first_char) {
            return forced.to_vec();
        }
    }
    match syllable_phones(lyric).first() {
        Some(cluster) => cluster.split('_').map(ToString::to_string).collect(),
        None => Vec::new(),
    }
}

/// The consumed sequence must reproduce the alignment sequence exactly.
fn check_consumed(
    source_id: &str,
    expected: &[String],
    consumed: &[String],
) -> Result<(), PrepError> {
    for (index, (want, got)) in expected.iter().zip(consumed.iter()).enumerate() {
        if want != got {
            return Err(PrepError::LabelMismatch {
                utterance: source_id.to_string(),
                index,
                expected: want.clone(),
                found: got.clone(),
            });
        }
    }
    if expected.len() != consumed.len() {
        return Err(PrepError::LabelCountMismatch {
            utterance: source_id.to_string(),
            expected: expected.len(),
            found: consumed.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "Chinese/ZH-Alto-1/Breathy/十年/Control_Group/0000";

    fn note(start_s: f64, end_s: f64, lyric: &str, midi: u8) -> ScoreNote {
        ScoreNote {
            start_s,
            end_s,
            lyric: lyric.to_string(),
            midi,
        }
    }

    fn labels(phones: &[&str]) -> UtteranceLabels {
        UtteranceLabels {
            intervals: phones
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{}.0 {}.0 {p}", i, i + 1))
                .collect(),
            phones: phones.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn labels_replace_romanized_phonemes() {
        let notes = [note(0.0, 1.0, "你", 60), note(1.0, 2.0, "好", 62)];
        // The aligner heard different vowels than the orthography suggests.
        let labels = labels(&["n", "in", "h", "au"]);
        let result = reconcile(SOURCE, &notes, &labels, &PronunciationOverrides::default()).unwrap();
        assert_eq!(result.notes[0].phonemes, "n_in");
        assert_eq!(result.notes[1].phonemes, "h_au");
        assert_eq!(result.phones, ["n", "in", "h", "au"]);
    }

    #[test]
    fn continuation_extends_previous_note_and_consumes_nothing() {
        let notes = [note(0.0, 1.0, "你", 60), note(1.0, 2.5, "—", 64)];
        let labels = labels(&["n", "i"]);
        let result = reconcile(SOURCE, &notes, &labels, &PronunciationOverrides::default()).unwrap();
        assert_eq!(result.notes.len(), 1);
        assert_eq!(result.notes[0].end_s, 2.5);
        assert_eq!(result.phones.len(), 2);
    }

    #[test]
    fn pause_is_renamed_to_breath_and_consumes_one_label() {
        let notes = [note(0.0, 0.4, "P", 0), note(0.4, 1.0, "你", 60)];
        let labels = labels(&["AP", "n", "i"]);
        let result = reconcile(SOURCE, &notes, &labels, &PronunciationOverrides::default()).unwrap();
        assert_eq!(result.notes[0].lyric, "AP");
        assert_eq!(result.notes[0].phonemes, "AP");
        assert_eq!(result.notes[1].phonemes, "n_i");
    }

    #[test]
    fn override_forces_single_phoneme_cluster() {
        // 乐 romanizes as l_e (two labels) unless the song is flagged.
        let notes = [note(0.0, 1.0, "乐", 60)];
        let mut overrides = PronunciationOverrides::default();
        overrides.insert(SOURCE, '乐', vec!["ve".to_string()]);
        let result = reconcile(SOURCE, &notes, &labels(&["ve"]), &overrides).unwrap();
        assert_eq!(result.notes[0].phonemes, "ve");

        let plain = reconcile(
            "some/other/song",
            &notes,
            &labels(&["l", "e"]),
            &overrides,
        )
        .unwrap();
        assert_eq!(plain.notes[0].phonemes, "l_e");
    }

    #[test]
    fn overrun_reports_consumed_count() {
        let notes = [note(0.0, 1.0, "你", 60)];
        let err = reconcile(
            SOURCE,
            &notes,
            &labels(&["n"]),
            &PronunciationOverrides::default(),
        )
        .unwrap_err();
        match err {
            PrepError::LabelOverrun {
                utterance,
                consumed,
            } => {
                assert_eq!(utterance, SOURCE);
                assert_eq!(consumed, 1);
            }
            other => panic!("expected LabelOverrun, got {other:?}"),
        }
    }

    #[test]
    fn leftover_labels_are_a_count_mismatch() {
        let notes = [note(0.0, 1.0, "你", 60)];
        let err = reconcile(
            SOURCE,
            &notes,
            &labels(&["n", "i", "h", "ao"]),
            &PronunciationOverrides::default(),
        )
        .unwrap_err();
        match err {
            PrepError::LabelCountMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, 4);
                assert_eq!(found, 2);
            }
            other => panic!("expected LabelCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn positional_check_flags_first_divergence() {
        let err = check_consumed(
            SOURCE,
            &["n".to_string(), "i".to_string()],
            &["n".to_string(), "u".to_string()],
        )
        .unwrap_err();
        match err {
            PrepError::LabelMismatch {
                index,
                expected,
                found,
                ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(expected, "i");
                assert_eq!(found, "u");
            }
            other => panic!("expected LabelMismatch, got {other:?}"),
        }
    }
}
