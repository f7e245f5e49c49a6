use serde::Serialize;

/// One forced-alignment segment of the `phone` tier, in phonetic order.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentInterval {
    pub start_s: f64,
    pub end_s: f64,
    pub label: String,
}

impl AlignmentInterval {
    /// `start end label` triple as written to the `label` manifest.
    pub fn manifest_entry(&self) -> String {
        format!("{} {} {}", self.start_s, self.end_s, self.label)
    }
}

/// One musical note from the score, before reconciliation with the
/// alignment labels. Rests and breaths appear as `P` pause notes with
/// pitch 0; melisma continuations carry the `—` lyric.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreNote {
    pub start_s: f64,
    pub end_s: f64,
    pub lyric: String,
    pub midi: u8,
}

/// A note whose phonemes have been replaced by the authoritative
/// alignment labels, `_`-joined.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledNote {
    pub start_s: f64,
    pub end_s: f64,
    pub lyric: String,
    pub midi: u8,
    pub phonemes: String,
}

/// The per-utterance score-dump record. Note rows serialize as
/// `[st, et, lyric, midi, phn]` arrays matching `item_list`.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRecord {
    pub tempo: u32,
    pub item_list: Vec<String>,
    pub note: Vec<(f64, f64, String, u8, String)>,
}

impl ScoreRecord {
    pub fn new(tempo: u32, notes: &[LabeledNote]) -> Self {
        Self {
            tempo,
            item_list: ["st", "et", "lyric", "midi", "phn"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            note: notes
                .iter()
                .map(|note| {
                    (
                        note.start_s,
                        note.end_s,
                        note.lyric.clone(),
                        note.midi,
                        note.phonemes.clone(),
                    )
                })
                .collect(),
        }
    }
}
