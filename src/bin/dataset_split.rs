use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gtsinger_prep::{
    build_subset, CachedLabels, MismatchPolicy, PrepConfig, PrepError, PronunciationOverrides,
    SongPartition, SoxResampler, Subset, SubsetObserver, SubsetSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MismatchChoice {
    /// Stop the whole run on the first label/score inconsistency.
    Abort,
    /// Drop inconsistent utterances from the manifests and continue.
    Skip,
}

impl MismatchChoice {
    fn policy(self) -> MismatchPolicy {
        match self {
            Self::Abort => MismatchPolicy::Abort,
            Self::Skip => MismatchPolicy::Skip,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "dataset_split")]
#[command(about = "Split the GTSinger Chinese corpus into Kaldi-style train/dev/test manifests")]
struct Args {
    /// Corpus root holding singer/technique/song directories.
    src_data: PathBuf,
    /// Destination directory of the train subset.
    train: PathBuf,
    /// Destination directory of the dev subset.
    dev: PathBuf,
    /// Destination directory of the test subset.
    test: PathBuf,
    /// Target sample rate (Hz) of the resampled mono wavs.
    #[arg(long)]
    fs: u32,
    #[arg(long, default_value = "wav_dump")]
    wav_dump: PathBuf,
    #[arg(long, default_value = "score_dump")]
    score_dump: PathBuf,
    /// Songs where 乐 is sung "yue", one source id per line.
    #[arg(long, default_value = "local/yue_songs.txt")]
    yue_songs_file: PathBuf,
    /// Pre-validated alignment labels for takes with known-bad TextGrids.
    #[arg(long, default_value = "local/unique_label.txt")]
    unique_label_file: PathBuf,
    #[arg(long, value_enum, default_value_t = MismatchChoice::Abort)]
    on_mismatch: MismatchChoice,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    if let Err(err) = run() {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), PrepError> {
    let args = Args::parse();

    let config = PrepConfig {
        sample_rate_hz: args.fs,
        wav_dump: args.wav_dump,
        score_dump: args.score_dump,
        partition: SongPartition::default(),
        overrides: PronunciationOverrides::from_yue_songs_file(&args.yue_songs_file)?,
        cached_labels: CachedLabels::from_file(&args.unique_label_file)?,
        mismatch_policy: args.on_mismatch.policy(),
    };
    info!(
        cached_takes = config.cached_labels.len(),
        "loaded lookup tables"
    );

    let resampler = SoxResampler;
    let mut observer = CliObserver::default();
    let mut totals = SubsetSummary {
        emitted: 0,
        skipped: 0,
    };
    for (subset, dest) in [
        (Subset::Train, &args.train),
        (Subset::Dev, &args.dev),
        (Subset::Test, &args.test),
    ] {
        let summary = build_subset(
            &args.src_data,
            dest,
            subset,
            &config,
            &resampler,
            &mut observer,
        )?;
        totals.emitted += summary.emitted;
        totals.skipped += summary.skipped;
    }
    observer.finish();
    info!(
        emitted = totals.emitted,
        skipped = totals.skipped,
        "dataset preparation complete"
    );
    Ok(())
}

/// Drives one progress bar per pipeline phase.
#[derive(Default)]
struct CliObserver {
    bar: Option<ProgressBar>,
}

impl CliObserver {
    fn start_phase(&mut self, total: usize, phase: &str) {
        self.finish();
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
        );
        bar.set_message(phase.to_string());
        self.bar = Some(bar);
    }

    fn tick(&mut self, utt_id: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(utt_id.to_string());
            bar.inc(1);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl SubsetObserver for CliObserver {
    fn begin_resample(&mut self, total: usize) {
        self.start_phase(total, "resampling...");
    }

    fn resampled(&mut self, utt_id: &str) {
        self.tick(utt_id);
    }

    fn begin_reconcile(&mut self, total: usize) {
        self.start_phase(total, "reconciling scores and labels...");
    }

    fn reconciled(&mut self, utt_id: &str) {
        self.tick(utt_id);
    }
}
