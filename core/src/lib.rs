//! Image-batch quality pipeline for framecheck.
//!
//! A directory of TIFF frames is catalogued under collision-free names,
//! blank frames are dropped, every remaining frame is scored for
//! signal-noise ratio and blur, and the scores are written to a CSV report
//! next to the directory. The binary crate adds argument parsing and the
//! interactive prompts on top of [`Pipeline`].

pub mod blur;
pub mod catalog;
pub mod config;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod reporting;
pub mod scanner;

pub use blur::{BlurEffect, BlurMeasure, DEFAULT_BLUR_WINDOW};
pub use catalog::{Catalog, ImageMetrics, ImageRecord};
pub use config::{ConfigError, QualityConfig, DEFAULT_CONFIG_FILE};
pub use loader::{
    first_row_mean, is_blank, load_and_filter, DecodeError, FilterStats, ImageDecoder,
    RasterDecoder, BLANK_THRESHOLD,
};
pub use metrics::{compute_metrics, signal_noise_ratio, MetricEngine, ThreadingMode, ZeroVariance};
pub use pipeline::{
    BatchSummary, ConfirmOverwrite, DirectoryOutcome, Pipeline, PipelineError, Stage,
};
pub use reporting::{
    read_report, report_path, report_rows, write_report, ReportRow, ReportingError,
    REPORT_EXTENSION, REPORT_HEADER,
};
pub use scanner::{discover, has_format_marker, ScanConfig, ScanError, DEFAULT_MARKER};
