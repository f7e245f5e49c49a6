use std::fs;
use std::path::Path;

use roxmltree::{Document, Node};

use crate::error::PrepError;
use crate::types::ScoreNote;

const DEFAULT_TEMPO: f64 = 120.0;
const CONTINUATION_LYRIC: &str = "—";
const PAUSE_LYRIC: &str = "P";
const BREATH_TAG: &str = "br";

/// A parsed score: one tempo and the ordered note stream of the first part.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub tempo: u32,
    pub notes: Vec<ScoreNote>,
}

pub fn read_musicxml(path: &Path) -> Result<Score, PrepError> {
    let xml = fs::read_to_string(path)
        .map_err(|err| PrepError::io(format!("reading score '{}'", path.display()), err))?;
    parse_score(&xml).map_err(|message| PrepError::Score {
        context: path.display().to_string(),
        message,
    })
}

/// Walks a `score-partwise` document. Durations are converted to seconds
/// using the measure-local `divisions` and the first `<sound tempo>` mark;
/// the note stream follows the corpus conventions: lyric-less notes at the
/// same pitch extend the previous note, pitch changes become `—`
/// continuation notes, and rests and `br` lyrics fold into `P` pauses.
fn parse_score(xml: &str) -> Result<Score, String> {
    let document = Document::parse(xml).map_err(|err| err.to_string())?;
    let root = document.root_element();
    if root.tag_name().name() != "score-partwise" {
        return Err(format!(
            "expected a score-partwise document, found '{}'",
            root.tag_name().name()
        ));
    }

    let tempo = first_sound_tempo(root).unwrap_or(DEFAULT_TEMPO);
    if tempo <= 0.0 {
        return Err(format!("non-positive tempo {tempo}"));
    }

    let part = element_children(root)
        .find(|node| node.tag_name().name() == "part")
        .ok_or_else(|| "document has no part".to_string())?;

    let mut notes: Vec<ScoreNote> = Vec::new();
    let mut divisions = 1.0f64;
    let mut prev_pitch: i32 = -1;
    let mut cursor_s = 0.0f64;

    for measure in element_children(part).filter(|node| node.tag_name().name() == "measure") {
        for element in element_children(measure) {
            match element.tag_name().name() {
                "attributes" => {
                    if let Some(value) = child_text(element, "divisions") {
                        divisions = value
                            .trim()
                            .parse::<f64>()
                            .map_err(|err| format!("bad divisions '{value}': {err}"))?;
                        if divisions <= 0.0 {
                            return Err(format!("non-positive divisions {divisions}"));
                        }
                    }
                }
                "note" => {
                    // Chord members share the first note's duration; grace
                    // notes have none. Neither advances the cursor.
                    if child(element, "chord").is_some() {
                        continue;
                    }
                    let Some(duration) = child_text(element, "duration") else {
                        continue;
                    };
                    let beats = duration
                        .trim()
                        .parse::<f64>()
                        .map_err(|err| format!("bad duration '{duration}': {err}"))?;
                    let duration_s = beats / divisions * 60.0 / tempo;

                    if child(element, "rest").is_some() {
                        push_pause(&mut notes, &mut prev_pitch, cursor_s, duration_s);
                    } else {
                        let midi = parse_pitch(element)?;
                        match lyric_text(element) {
                            Some(lyric) if lyric == BREATH_TAG => {
                                push_pause(&mut notes, &mut prev_pitch, cursor_s, duration_s);
                            }
                            Some(lyric) => {
                                notes.push(ScoreNote {
                                    start_s: cursor_s,
                                    end_s: cursor_s + duration_s,
                                    lyric,
                                    midi,
                                });
                                prev_pitch = i32::from(midi);
                            }
                            // Melisma: the syllable continues over a new note.
                            None => {
                                if i32::from(midi) == prev_pitch {
                                    if let Some(last) = notes.last_mut() {
                                        last.end_s = cursor_s + duration_s;
                                    }
                                } else {
                                    notes.push(ScoreNote {
                                        start_s: cursor_s,
                                        end_s: cursor_s + duration_s,
                                        lyric: CONTINUATION_LYRIC.to_string(),
                                        midi,
                                    });
                                }
                                prev_pitch = i32::from(midi);
                            }
                        }
                    }
                    cursor_s += duration_s;
                }
                _ => {}
            }
        }
    }

    Ok(Score {
        tempo: tempo.round() as u32,
        notes,
    })
}

fn push_pause(notes: &mut Vec<ScoreNote>, prev_pitch: &mut i32, start_s: f64, duration_s: f64) {
    match notes.last_mut() {
        Some(last) if *prev_pitch == 0 => last.end_s = start_s + duration_s,
        _ => notes.push(ScoreNote {
            start_s,
            end_s: start_s + duration_s,
            lyric: PAUSE_LYRIC.to_string(),
            midi: 0,
        }),
    }
    *prev_pitch = 0;
}

fn first_sound_tempo(root: Node) -> Option<f64> {
    root.descendants()
        .filter(|node| node.tag_name().name() == "sound")
        .find_map(|node| node.attribute("tempo"))
        .and_then(|value| value.trim().parse::<f64>().ok())
}

fn parse_pitch(note: Node) -> Result<u8, String> {
    let pitch = child(note, "pitch").ok_or_else(|| "pitched note without <pitch>".to_string())?;
    let step = child_text(pitch, "step").ok_or_else(|| "pitch without <step>".to_string())?;
    let semitone = match step.trim() {
        "C" => 0,
        "D" => 2,
        "E" => 4,
        "F" => 5,
        "G" => 7,
        "A" => 9,
        "B" => 11,
        other => return Err(format!("unknown pitch step '{other}'")),
    };
    let alter = match child_text(pitch, "alter") {
        Some(value) => value
            .trim()
            .parse::<i32>()
            .map_err(|err| format!("bad alter '{value}': {err}"))?,
        None => 0,
    };
    let octave = child_text(pitch, "octave")
        .ok_or_else(|| "pitch without <octave>".to_string())?
        .trim()
        .parse::<i32>()
        .map_err(|err| format!("bad octave: {err}"))?;

    let midi = (octave + 1) * 12 + semitone + alter;
    u8::try_from(midi).map_err(|_| format!("MIDI pitch {midi} out of range"))
}

fn lyric_text(note: Node) -> Option<String> {
    let text = child(note, "lyric").and_then(|lyric| child_text(lyric, "text"))?;
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn element_children<'a>(node: Node<'a, 'a>) -> impl Iterator<Item = Node<'a, 'a>> {
    node.children().filter(Node::is_element)
}

fn child<'a>(node: Node<'a, 'a>, name: &'static str) -> Option<Node<'a, 'a>> {
    element_children(node).find(|child| child.tag_name().name() == name)
}

fn child_text<'a>(node: Node<'a, 'a>, name: &'static str) -> Option<&'a str> {
    child(node, name).and_then(|child| child.text())
}
