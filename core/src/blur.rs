//! No-reference perceptual blur estimate.
//!
//! Implements the "blur effect" metric of Crété-Roffet et al. (2007): the
//! image is re-blurred with a 1-D box filter along each axis and the loss of
//! Sobel gradient energy is compared with the original. A sharp image loses
//! a lot of gradient energy when re-blurred; an already blurry one barely
//! changes. Scores lie in `[0, 1]`, higher meaning blurrier.

use ndarray::{ArrayD, ArrayViewD, Axis, Slice};

pub const DEFAULT_BLUR_WINDOW: usize = 11;

const SOBEL_EDGE: [f64; 3] = [1.0, 0.0, -1.0];
const SOBEL_SMOOTH: [f64; 3] = [0.25, 0.5, 0.25];

/// Perceptual blur estimate in `[0, 1]`.
pub trait BlurMeasure: Send + Sync {
    fn blur(&self, image: &ArrayViewD<f64>) -> f64;
}

#[derive(Clone, Copy, Debug)]
pub struct BlurEffect {
    window: usize,
}

impl BlurEffect {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for BlurEffect {
    fn default() -> Self {
        Self::new(DEFAULT_BLUR_WINDOW)
    }
}

impl BlurMeasure for BlurEffect {
    /// Takes the worst axis. Axes without any gradient energy carry no
    /// information and are skipped; an image flat along every axis scores 1.
    ///
    /// Stacks are scored as volumes, so the page axis counts like any other.
    fn blur(&self, image: &ArrayViewD<f64>) -> f64 {
        let box_kernel = vec![1.0 / self.window as f64; self.window];
        let mut score: Option<f64> = None;

        for axis in (0..image.ndim()).map(Axis) {
            let reblurred = correlate_axis(image, axis, &box_kernel);
            let sharp = sobel(image, axis);
            let blurred = sobel(&reblurred.view(), axis);

            let mut sharp_energy = 0.0;
            let mut lost_energy = 0.0;
            for (s, b) in interior(&sharp).iter().zip(interior(&blurred).iter()) {
                let (s, b) = (s.abs(), b.abs());
                sharp_energy += s;
                lost_energy += (s - b).max(0.0);
            }

            if sharp_energy > 0.0 {
                let axis_score = (sharp_energy - lost_energy).abs() / sharp_energy;
                score = Some(score.map_or(axis_score, |worst| worst.max(axis_score)));
            }
        }

        score.unwrap_or(1.0).clamp(0.0, 1.0)
    }
}

/// Drops two samples at the start and one at the end of every axis, where
/// the reflected border dominates the gradient.
fn interior(image: &ArrayD<f64>) -> ArrayViewD<'_, f64> {
    image.slice_each_axis(|axis| {
        let start = axis.len.min(2);
        let end = axis.len.saturating_sub(1).max(start);
        Slice::from(start..end)
    })
}

/// Derivative along `axis`, smoothed along every other axis.
fn sobel(image: &ArrayViewD<f64>, axis: Axis) -> ArrayD<f64> {
    let mut gradient = correlate_axis(image, axis, &SOBEL_EDGE);
    for across in (0..image.ndim()).map(Axis).filter(|other| *other != axis) {
        gradient = correlate_axis(&gradient.view(), across, &SOBEL_SMOOTH);
    }
    gradient
}

/// 1-D correlation along `axis`, centred on the kernel, with half-sample
/// symmetric boundary extension (`d c b a | a b c d | d c b a`).
fn correlate_axis(image: &ArrayViewD<f64>, axis: Axis, weights: &[f64]) -> ArrayD<f64> {
    let len = image.len_of(axis) as isize;
    let start = -((weights.len() / 2) as isize);
    let mut output = ArrayD::zeros(image.raw_dim());

    for (mut out_lane, in_lane) in output.lanes_mut(axis).into_iter().zip(image.lanes(axis)) {
        for (index, out) in out_lane.iter_mut().enumerate() {
            *out = weights
                .iter()
                .enumerate()
                .map(|(offset, weight)| {
                    let source = reflect(index as isize + start + offset as isize, len);
                    weight * in_lane[source]
                })
                .sum();
        }
    }
    output
}

fn reflect(index: isize, len: isize) -> usize {
    let period = 2 * len;
    let wrapped = index.rem_euclid(period);
    if wrapped >= len {
        (period - 1 - wrapped) as usize
    } else {
        wrapped as usize
    }
}
