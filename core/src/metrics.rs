//! Per-image quality scores: signal-noise ratio and blur.

use crate::blur::{BlurEffect, BlurMeasure};
use crate::catalog::{Catalog, ImageMetrics, ImageRecord};
use indicatif::ProgressBar;
use ndarray::ArrayViewD;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Whether per-image metric work runs on the calling thread or on rayon's pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadingMode {
    Parallel,
    #[default]
    Sequential,
}

/// Value reported as the signal-noise ratio of an image with zero variance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroVariance {
    /// Report `f64::INFINITY`.
    #[default]
    Infinity,
    /// Report a fixed value instead.
    Cap(f64),
}

impl ZeroVariance {
    pub fn value(self) -> f64 {
        match self {
            Self::Infinity => f64::INFINITY,
            Self::Cap(value) => value,
        }
    }
}

/// `mean² / variance` using the population variance over every sample,
/// all pages of a stack included.
pub fn signal_noise_ratio(image: &ArrayViewD<f64>, zero_variance: ZeroVariance) -> f64 {
    let count = image.len();
    if count == 0 {
        return zero_variance.value();
    }

    let mean = image.sum() / count as f64;
    let variance = image.fold(0.0, |acc, value| acc + (value - mean).powi(2)) / count as f64;
    if variance == 0.0 {
        return zero_variance.value();
    }
    mean * mean / variance
}

pub struct MetricEngine {
    blur: Box<dyn BlurMeasure>,
    zero_variance: ZeroVariance,
    threading: ThreadingMode,
}

impl MetricEngine {
    pub fn new(blur: impl BlurMeasure + 'static) -> Self {
        Self {
            blur: Box::new(blur),
            zero_variance: ZeroVariance::default(),
            threading: ThreadingMode::default(),
        }
    }

    pub fn with_zero_variance(mut self, zero_variance: ZeroVariance) -> Self {
        self.zero_variance = zero_variance;
        self
    }

    pub fn with_threading(mut self, threading: ThreadingMode) -> Self {
        self.threading = threading;
        self
    }

    pub fn measure(&self, image: &ArrayViewD<f64>) -> ImageMetrics {
        ImageMetrics {
            signal_noise_ratio: signal_noise_ratio(image, self.zero_variance),
            blur_score: self.blur.blur(image),
        }
    }

    fn measure_record(&self, record: &mut ImageRecord) {
        // The pixels are only needed here; drop them as soon as they are scored.
        if let Some(image) = record.image.take() {
            let metrics = self.measure(&image.view());
            debug!(
                name = %record.name,
                snr = metrics.signal_noise_ratio,
                blur = metrics.blur_score,
                "measured image"
            );
            record.metrics = Some(metrics);
        }
    }
}

impl Default for MetricEngine {
    fn default() -> Self {
        Self::new(BlurEffect::default())
    }
}

/// Scores every record that still holds decoded pixels and returns how many
/// records carry metrics afterwards.
///
/// Metrics are written onto the record that owns the pixels, so a score can
/// never be attached to another image's name.
pub fn compute_metrics(
    catalog: &mut Catalog,
    engine: &MetricEngine,
    progress_bar: &ProgressBar,
) -> usize {
    let measure = |record: &mut ImageRecord| {
        engine.measure_record(record);
        progress_bar.inc(1);
    };

    match engine.threading {
        ThreadingMode::Parallel => catalog.records_mut().par_iter_mut().for_each(measure),
        ThreadingMode::Sequential => catalog.records_mut().iter_mut().for_each(measure),
    }

    let measured = catalog
        .records()
        .iter()
        .filter(|record| record.metrics.is_some() && catalog.contains(&record.name))
        .count();
    debug_assert_eq!(measured, catalog.len());
    measured
}
