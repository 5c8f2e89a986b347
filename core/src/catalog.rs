//! Collision-free image catalog for a single directory run.
//!
//! Every stage of the pipeline reads and writes the same ordered list of
//! [`ImageRecord`]s, so a record's name, source path, decoded pixels and
//! metrics always travel together.

use ndarray::{ArrayD, ArrayViewD};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};

/// Quality scores computed for a non-blank image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageMetrics {
    pub signal_noise_ratio: f64,
    pub blur_score: f64,
}

/// A discovered image and everything the pipeline has learned about it.
#[derive(Clone, Debug)]
pub struct ImageRecord {
    pub name: String,
    pub path: PathBuf,
    /// Decoded pixels, 2-D for a single page and 3-D for a stack. Present
    /// between the load and metric stages only.
    pub image: Option<ArrayD<f64>>,
    pub metrics: Option<ImageMetrics>,
}

impl ImageRecord {
    fn new(name: String, path: PathBuf) -> Self {
        Self {
            name,
            path,
            image: None,
            metrics: None,
        }
    }
}

/// Ordered name → record mapping with unique names.
#[derive(Debug, Default)]
pub struct Catalog {
    records: Vec<ImageRecord>,
    names: FxHashSet<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path` under a unique display name and returns that name.
    ///
    /// The base name is the final path segment. On collision a counter
    /// starting at 2 is inserted before the extension (`a.tif` becomes
    /// `a(2).tif`, then `a(3).tif`) until the name is free.
    pub fn register(&mut self, path: &Path) -> String {
        let base = display_name(path);
        let mut name = base.clone();
        let mut counter = 1u64;
        while self.names.contains(&name) {
            counter += 1;
            name = disambiguated_name(&base, counter);
        }

        self.names.insert(name.clone());
        self.records
            .push(ImageRecord::new(name.clone(), path.to_path_buf()));
        name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&ImageRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [ImageRecord] {
        &mut self.records
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.name.as_str())
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.records.iter().map(|record| record.path.as_path())
    }

    /// Decoded images still attached to their records, in catalog order.
    pub fn images(&self) -> impl Iterator<Item = ArrayViewD<'_, f64>> {
        self.records
            .iter()
            .filter_map(|record| record.image.as_ref().map(|image| image.view()))
    }

    /// `(name, metrics)` pairs in catalog order, one per report row.
    pub fn rows(&self) -> impl Iterator<Item = (&str, Option<ImageMetrics>)> {
        self.records
            .iter()
            .map(|record| (record.name.as_str(), record.metrics))
    }

    /// Removes the record registered as `name`, keeping the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<ImageRecord> {
        let index = self.records.iter().position(|record| record.name == name)?;
        self.names.remove(name);
        Some(self.records.remove(index))
    }

    /// Walks the records in order, dropping those for which `keep` returns
    /// `Ok(false)`. Returns how many were dropped.
    ///
    /// On error the failing record and every record after it are kept, so
    /// the catalog stays consistent with its name index.
    pub fn try_retain<F, E>(&mut self, mut keep: F) -> Result<usize, E>
    where
        F: FnMut(&mut ImageRecord) -> Result<bool, E>,
    {
        let mut kept = Vec::with_capacity(self.records.len());
        let mut removed = 0;
        let mut pending = std::mem::take(&mut self.records).into_iter();

        while let Some(mut record) = pending.next() {
            match keep(&mut record) {
                Ok(true) => kept.push(record),
                Ok(false) => {
                    self.names.remove(&record.name);
                    removed += 1;
                }
                Err(error) => {
                    kept.push(record);
                    kept.extend(pending);
                    self.records = kept;
                    return Err(error);
                }
            }
        }

        self.records = kept;
        debug_assert_eq!(self.names.len(), self.records.len());
        Ok(removed)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn disambiguated_name(base: &str, counter: u64) -> String {
    match base.rfind('.') {
        Some(index) if index > 0 => {
            let (stem, extension) = base.split_at(index);
            format!("{}({}){}", stem, counter, extension)
        }
        _ => format!("{}({})", base, counter),
    }
}
