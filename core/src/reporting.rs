use crate::catalog::Catalog;
use csv::{ReaderBuilder, Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_EXTENSION: &str = "csv";
pub const REPORT_HEADER: [&str; 3] = ["Image Name", "Signal Noise Ratio", "Blurriness (0-1)"];

/// One line of a quality report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(rename = "Image Name")]
    pub name: String,
    #[serde(rename = "Signal Noise Ratio")]
    pub signal_noise_ratio: Option<f64>,
    #[serde(rename = "Blurriness (0-1)")]
    pub blur_score: Option<f64>,
}

#[derive(Debug)]
pub enum ReportingError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Csv {
        source: csv::Error,
        path: PathBuf,
    },
}

impl Display for ReportingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => write!(f, "io error for {}: {}", path.display(), source),
            Self::Csv { source, path } => write!(f, "csv error for {}: {}", path.display(), source),
        }
    }
}

impl Error for ReportingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
        }
    }
}

/// Where the report for `directory` lives: `<name>.csv` beside the directory,
/// or inside `report_dir` when one is given.
pub fn report_path(directory: &Path, report_dir: Option<&Path>) -> PathBuf {
    let name = directory
        .file_name()
        .map(|name| name.to_os_string())
        .or_else(|| {
            directory
                .canonicalize()
                .ok()
                .and_then(|resolved| resolved.file_name().map(|name| name.to_os_string()))
        })
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("report"));
    let file_name = format!("{}.{}", name, REPORT_EXTENSION);

    match report_dir {
        Some(dir) => dir.join(file_name),
        None => directory
            .parent()
            .map(|parent| parent.join(&file_name))
            .unwrap_or_else(|| directory.join(&file_name)),
    }
}

pub fn report_rows(catalog: &Catalog) -> Vec<ReportRow> {
    catalog
        .rows()
        .map(|(name, metrics)| ReportRow {
            name: name.to_string(),
            signal_noise_ratio: metrics.map(|metrics| metrics.signal_noise_ratio),
            blur_score: metrics.map(|metrics| metrics.blur_score),
        })
        .collect()
}

/// Writes the header and one row per catalog record, replacing whatever was
/// at `target`. Returns the file name that was written.
pub fn write_report(target: &Path, catalog: &Catalog) -> Result<String, ReportingError> {
    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ReportingError::Io {
            source,
            path: parent.to_path_buf(),
        })?;
    }

    let csv_error = |source| ReportingError::Csv {
        source,
        path: target.to_path_buf(),
    };
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::CRLF)
        .from_path(target)
        .map_err(csv_error)?;

    writer.write_record(REPORT_HEADER).map_err(csv_error)?;
    for row in report_rows(catalog) {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| ReportingError::Io {
        source,
        path: target.to_path_buf(),
    })?;

    Ok(target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| target.display().to_string()))
}

pub fn read_report(path: &Path) -> Result<Vec<ReportRow>, ReportingError> {
    let csv_error = |source| ReportingError::Csv {
        source,
        path: path.to_path_buf(),
    };
    let mut reader = ReaderBuilder::new().from_path(path).map_err(csv_error)?;
    reader
        .deserialize()
        .collect::<Result<Vec<ReportRow>, _>>()
        .map_err(csv_error)
}
