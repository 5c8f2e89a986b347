use clap::Parser;
use framecheck_core::{ConfigError, QualityConfig, ThreadingMode};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "framecheck")]
#[command(about = "Drop blank frames and report signal-noise ratio and blur for TIFF directories")]
#[command(version)]
pub struct Cli {
    /// Directories of images to process. Prompts for one when omitted.
    pub directories: Vec<PathBuf>,

    /// TOML configuration file (default: ./framecheck.toml, then the user config dir).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Substring a file name must contain to be processed.
    #[arg(long)]
    pub marker: Option<String>,

    /// Also process images in sub-directories.
    #[arg(long)]
    pub recursive: bool,

    /// Write reports into this directory instead of beside each input directory.
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Score images on all cores.
    #[arg(long)]
    pub parallel: bool,

    /// Continue with the next directory when one fails.
    #[arg(long)]
    pub keep_going: bool,

    /// Overwrite existing reports without asking.
    #[arg(short, long)]
    pub yes: bool,
}

impl Cli {
    /// Configuration file values with command-line overrides applied.
    pub fn quality_config(&self) -> Result<QualityConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => QualityConfig::load(path)?,
            None => QualityConfig::load_or_default(),
        };
        if let Some(marker) = &self.marker {
            config.marker = marker.clone();
        }
        if self.recursive {
            config.recursive = true;
        }
        if let Some(dir) = &self.report_dir {
            config.report_dir = Some(dir.clone());
        }
        if self.parallel {
            config.threading = ThreadingMode::Parallel;
        }
        Ok(config)
    }
}
