use pinyin::ToPinyin;

/// Pinyin initial inventory, longest first so `zh/ch/sh` win over `z/c/s`.
/// `y` and `w` are treated as initials and rewritten below.
const INITIALS: [&str; 23] = [
    "zh", "ch", "sh", "b", "p", "m", "f", "d", "t", "n", "l", "g", "k", "h", "j", "q", "x", "r",
    "z", "c", "s", "y", "w",
];

/// Maps a lyric to one phoneme cluster per character, each cluster an
/// `initial_final` pair (or a bare final). Characters without a pinyin
/// reading pass through unchanged; there is no error path, only a
/// best-effort mapping.
pub fn syllable_phones(text: &str) -> Vec<String> {
    // 喔 reads "o" in isolation but is always sung "wo" in this corpus.
    if text == "喔" {
        return vec!["w_o".to_string()];
    }
    text.chars()
        .map(|ch| match ch.to_pinyin() {
            Some(reading) => correct_syllable(reading.plain()),
            None => ch.to_string(),
        })
        .collect()
}

/// Applies the orthography-to-phonology correction table to one plain
/// pinyin syllable.
fn correct_syllable(syllable: &str) -> String {
    let (initial, final_) = split_initial_final(syllable);
    match initial {
        "" => final_.to_string(),
        // Semivowel spellings drop the initial entirely.
        "y" => match final_ {
            "uan" => "van".to_string(),
            "ue" => "ve".to_string(),
            "u" => "v".to_string(),
            "in" | "i" | "ing" => final_.to_string(),
            other => format!("i{other}"),
        },
        "w" => match final_ {
            "o" => "uo".to_string(),
            "an" => "uan".to_string(),
            other => other.to_string(),
        },
        "c" => {
            let final_ = if final_ == "un" { "uen" } else { final_ };
            format!("{initial}_{final_}")
        }
        // ü is written u/ue/uan/un after these initials.
        "x" | "j" | "q" | "l" => {
            let final_ = match final_ {
                "un" => "vn",
                "uan" => "van",
                "u" => "v",
                "ue" => "ve",
                "iu" => "iou",
                other => other,
            };
            format!("{initial}_{final_}")
        }
        _ => {
            let final_ = if final_ == "ui" { "uei" } else { final_ };
            format!("{initial}_{final_}")
        }
    }
}

fn split_initial_final(syllable: &str) -> (&str, &str) {
    for initial in INITIALS {
        if let Some(final_) = syllable.strip_prefix(initial) {
            return (initial, final_);
        }
    }
    ("", syllable)
}
