use std::path::Path;
use std::process::Command;

use crate::error::PrepError;

/// Seam for the per-utterance audio conversion step.
pub trait Resampler: Send + Sync {
    fn resample(&self, src: &Path, dest: &Path, sample_rate_hz: u32) -> Result<(), PrepError>;
}

/// Shells out to `sox`, writing a mono 16-bit PCM wav at the requested
/// rate. The invocation is synchronous and its exit status is checked.
pub struct SoxResampler;

impl Resampler for SoxResampler {
    fn resample(&self, src: &Path, dest: &Path, sample_rate_hz: u32) -> Result<(), PrepError> {
        let status = Command::new("sox")
            .arg(src)
            .args(["-c", "1", "-t", "wavpcm", "-b", "16", "-r"])
            .arg(sample_rate_hz.to_string())
            .arg(dest)
            .status()
            .map_err(|err| PrepError::Resample {
                path: src.to_path_buf(),
                message: format!("failed to launch sox: {err}"),
            })?;
        if !status.success() {
            return Err(PrepError::Resample {
                path: src.to_path_buf(),
                message: format!("sox exited with {status}"),
            });
        }
        Ok(())
    }
}
