//! Per-directory batch driver.
//!
//! Each directory moves through
//! `Pending → Discovering → Loading → Computing → Writing → Done`, or goes
//! straight from `Pending` to `Skipped` when a report already exists and the
//! overwrite is declined. Directories are handled one after another, each
//! with its own [`Catalog`].

use crate::catalog::Catalog;
use crate::config::QualityConfig;
use crate::loader::{load_and_filter, DecodeError, ImageDecoder, RasterDecoder};
use crate::metrics::{compute_metrics, MetricEngine};
use crate::progress::{default_style, spinner_style};
use crate::reporting::{report_path, write_report, ReportingError};
use crate::scanner::{discover, ScanError};
use indicatif::ProgressBar;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Discovering,
    Loading,
    Computing,
    Writing,
    Done,
    Skipped,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "Waiting",
            Self::Discovering => "Finding images",
            Self::Loading => "Loading images",
            Self::Computing => "Processing images",
            Self::Writing => "Saving report",
            Self::Done => "Saving complete",
            Self::Skipped => "Kept existing report",
        };
        f.write_str(label)
    }
}

/// Asked whether an existing report may be replaced.
pub trait ConfirmOverwrite {
    fn confirm_overwrite(&mut self, report: &Path) -> bool;
}

impl<F> ConfirmOverwrite for F
where
    F: FnMut(&Path) -> bool,
{
    fn confirm_overwrite(&mut self, report: &Path) -> bool {
        self(report)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectoryOutcome {
    Written {
        report: PathBuf,
        file_name: String,
        rows: usize,
        blank: usize,
    },
    Skipped {
        report: PathBuf,
    },
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<(PathBuf, DirectoryOutcome)>,
    /// Only populated when failures are isolated per directory.
    pub failures: Vec<PipelineError>,
}

impl BatchSummary {
    pub fn written(&self) -> impl Iterator<Item = &DirectoryOutcome> {
        self.outcomes
            .iter()
            .map(|(_, outcome)| outcome)
            .filter(|outcome| matches!(outcome, DirectoryOutcome::Written { .. }))
    }

    /// Reports that already existed and were kept as they were.
    pub fn skipped(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|(_, outcome)| match outcome {
            DirectoryOutcome::Skipped { report } => Some(report.as_path()),
            DirectoryOutcome::Written { .. } => None,
        })
    }
}

pub struct Pipeline {
    config: QualityConfig,
    decoder: Box<dyn ImageDecoder>,
    engine: MetricEngine,
    keep_going: bool,
}

impl Pipeline {
    pub fn new(config: QualityConfig) -> Self {
        let engine = config.metric_engine();
        Self {
            config,
            decoder: Box::new(RasterDecoder),
            engine,
            keep_going: false,
        }
    }

    pub fn with_decoder(mut self, decoder: impl ImageDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    /// Replaces the engine built from the configuration.
    pub fn with_engine(mut self, engine: MetricEngine) -> Self {
        self.engine = engine;
        self
    }

    /// When true, a failing directory is recorded and the batch moves on.
    pub fn with_keep_going(mut self, enabled: bool) -> Self {
        self.keep_going = enabled;
        self
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Runs the full pipeline for one directory.
    ///
    /// A missing directory fails before the overwrite question is asked.
    pub fn process_directory(
        &self,
        directory: &Path,
        confirm: &mut dyn ConfirmOverwrite,
        progress_bar: &ProgressBar,
    ) -> Result<DirectoryOutcome, PipelineError> {
        let label = directory_label(directory);
        let report = report_path(directory, self.config.report_dir.as_deref());
        progress_bar.set_style(spinner_style());
        enter(Stage::Pending, &label, progress_bar);

        if !directory.is_dir() {
            return Err(PipelineError::Scan {
                directory: directory.to_path_buf(),
                source: ScanError::MissingDirectory(directory.to_path_buf()),
            });
        }
        if report.exists() && !confirm.confirm_overwrite(&report) {
            enter(Stage::Skipped, &label, progress_bar);
            return Ok(DirectoryOutcome::Skipped { report });
        }

        enter(Stage::Discovering, &label, progress_bar);
        let mut catalog = Catalog::new();
        let candidates = discover(directory, &self.config.scan_config(), &mut catalog)
            .map_err(|source| PipelineError::Scan {
                directory: directory.to_path_buf(),
                source,
            })?;
        restart(progress_bar, candidates.len());

        enter(Stage::Loading, &label, progress_bar);
        let stats = load_and_filter(
            &mut catalog,
            self.decoder.as_ref(),
            self.config.blank_threshold,
            progress_bar,
        )
        .map_err(|source| PipelineError::Decode {
            directory: directory.to_path_buf(),
            source,
        })?;
        restart(progress_bar, stats.kept);

        enter(Stage::Computing, &label, progress_bar);
        compute_metrics(&mut catalog, &self.engine, progress_bar);

        enter(Stage::Writing, &label, progress_bar);
        let file_name = write_report(&report, &catalog).map_err(|source| PipelineError::Report {
            directory: directory.to_path_buf(),
            source,
        })?;

        enter(Stage::Done, &label, progress_bar);
        progress_bar.println(format!("{} for {}", Stage::Done, file_name));
        info!(
            report = %report.display(),
            rows = catalog.len(),
            blank = stats.blank,
            "report written"
        );

        Ok(DirectoryOutcome::Written {
            report,
            file_name,
            rows: catalog.len(),
            blank: stats.blank,
        })
    }

    /// Processes `directories` in order. Without `keep_going` the first error
    /// ends the batch.
    pub fn run(
        &self,
        directories: &[PathBuf],
        confirm: &mut dyn ConfirmOverwrite,
        progress_bar: &ProgressBar,
    ) -> Result<BatchSummary, PipelineError> {
        let mut summary = BatchSummary::default();
        for directory in directories {
            match self.process_directory(directory, confirm, progress_bar) {
                Ok(outcome) => summary.outcomes.push((directory.clone(), outcome)),
                Err(error) if self.keep_going => {
                    warn!(directory = %directory.display(), "{}", error);
                    summary.failures.push(error);
                }
                Err(error) => return Err(error),
            }
        }
        Ok(summary)
    }
}

fn enter(stage: Stage, label: &str, progress_bar: &ProgressBar) {
    progress_bar.set_message(format!("{} for: {}", stage, label));
    info!(directory = label, stage = ?stage, "stage");
}

fn restart(progress_bar: &ProgressBar, length: usize) {
    progress_bar.set_style(default_style());
    progress_bar.set_length(length as u64);
    progress_bar.set_position(0);
}

fn directory_label(directory: &Path) -> String {
    directory
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| directory.display().to_string())
}

/// A stage failure, tagged with the directory being processed.
#[derive(Debug)]
pub enum PipelineError {
    Scan {
        directory: PathBuf,
        source: ScanError,
    },
    Decode {
        directory: PathBuf,
        source: DecodeError,
    },
    Report {
        directory: PathBuf,
        source: ReportingError,
    },
}

impl PipelineError {
    pub fn directory(&self) -> &Path {
        match self {
            Self::Scan { directory, .. }
            | Self::Decode { directory, .. }
            | Self::Report { directory, .. } => directory,
        }
    }
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            // Already names the directory.
            Self::Scan {
                source: source @ ScanError::MissingDirectory(_),
                ..
            } => write!(f, "{}", source),
            Self::Scan { directory, source } => {
                write!(f, "failed to process {}: {}", directory.display(), source)
            }
            Self::Decode { directory, source } => {
                write!(f, "failed to process {}: {}", directory.display(), source)
            }
            Self::Report { directory, source } => {
                write!(f, "failed to process {}: {}", directory.display(), source)
            }
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Scan { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
            Self::Report { source, .. } => Some(source),
        }
    }
}
