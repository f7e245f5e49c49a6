use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::PrepError;
use crate::types::ScoreRecord;

/// Writes one pretty-printed JSON record per utterance under the score
/// dump directory and the `score.scp` manifest pointing at each record.
pub struct ScoreWriter {
    dump_dir: PathBuf,
    scp: BufWriter<File>,
}

impl ScoreWriter {
    pub fn create(dump_dir: &Path, scp_path: &Path) -> Result<Self, PrepError> {
        fs::create_dir_all(dump_dir).map_err(|err| {
            PrepError::io(
                format!("creating score dump directory '{}'", dump_dir.display()),
                err,
            )
        })?;
        let scp = File::create(scp_path)
            .map_err(|err| PrepError::io(format!("creating '{}'", scp_path.display()), err))?;
        Ok(Self {
            dump_dir: dump_dir.to_path_buf(),
            scp: BufWriter::new(scp),
        })
    }

    pub fn write(&mut self, utt_id: &str, record: &ScoreRecord) -> Result<PathBuf, PrepError> {
        let path = self.dump_dir.join(format!("{utt_id}.json"));
        let context = || format!("writing score record '{}'", path.display());
        let mut file = File::create(&path).map_err(|err| PrepError::io(context(), err))?;
        serde_json::to_writer_pretty(&mut file, record)
            .map_err(|err| PrepError::json(context(), err))?;
        file.write_all(b"\n")
            .map_err(|err| PrepError::io(context(), err))?;

        writeln!(self.scp, "{} {}", utt_id, path.display())
            .map_err(|err| PrepError::io("appending to score.scp".to_string(), err))?;
        Ok(path)
    }

    pub fn finish(mut self) -> Result<(), PrepError> {
        self.scp
            .flush()
            .map_err(|err| PrepError::io("flushing score.scp".to_string(), err))
    }
}

#[cfg(test)]
mod tests {
    use crate::types::LabeledNote;

    use super::*;

    #[test]
    fn record_and_scp_line_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("score_dump");
        let scp_path = dir.path().join("score.scp");
        let mut writer = ScoreWriter::create(&dump, &scp_path).unwrap();

        let notes = [LabeledNote {
            start_s: 0.0,
            end_s: 1.5,
            lyric: "你".to_string(),
            midi: 62,
            phonemes: "n_i".to_string(),
        }];
        let record = ScoreRecord::new(90, &notes);
        let json_path = writer.write("GTSINGER_CHINESE_Alto1_x_y_ControlGroup_0000", &record);
        let json_path = json_path.unwrap();
        writer.finish().unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["tempo"], 90);
        assert_eq!(value["item_list"][4], "phn");
        assert_eq!(value["note"][0][2], "你");
        assert_eq!(value["note"][0][4], "n_i");

        let scp = fs::read_to_string(&scp_path).unwrap();
        assert_eq!(
            scp,
            format!(
                "GTSINGER_CHINESE_Alto1_x_y_ControlGroup_0000 {}\n",
                json_path.display()
            )
        );
    }
}
