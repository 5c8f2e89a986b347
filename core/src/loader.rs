//! Image decoding and blank-frame filtering.

use crate::catalog::Catalog;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use indicatif::ProgressBar;
use ndarray::{Array2, ArrayD, ArrayViewD, Axis, IxDyn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

/// Images whose first row averages below this value are blank.
pub const BLANK_THRESHOLD: f64 = 1.0;

// Rec. 709 weights, the same ones `image` uses for `to_luma*`.
const LUMA_WEIGHTS: [f64; 3] = [0.2126, 0.7152, 0.0722];

/// Turns an image file into a single-channel array in its native scale.
///
/// Single images come back as `(rows, columns)`; multi-page files as
/// `(pages, rows, columns)`.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<ArrayD<f64>, DecodeError>;
}

/// Default decoder. The format is sniffed from the file contents, so loosely
/// named candidates such as `scan.tif.bak` still decode.
///
/// TIFF files are read page by page with the `tiff` decoder and stacked into
/// a volume; every other format goes through the `image` crate as one page.
/// Colour images are reduced to luminance. Samples keep their stored scale:
/// 0..=255 for 8-bit, 0..=65535 for 16-bit, raw values for float images.
#[derive(Clone, Copy, Debug, Default)]
pub struct RasterDecoder;

impl ImageDecoder for RasterDecoder {
    fn decode(&self, path: &Path) -> Result<ArrayD<f64>, DecodeError> {
        let reader = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|source| DecodeError::Io {
                source,
                path: path.to_path_buf(),
            })?;
        if reader.format() == Some(ImageFormat::Tiff) {
            return decode_tiff_stack(path);
        }

        let image = reader.decode().map_err(|source| DecodeError::Image {
            source,
            path: path.to_path_buf(),
        })?;
        luminance_array(image)
            .map(Array2::into_dyn)
            .map_err(|source| DecodeError::Shape {
                source,
                path: path.to_path_buf(),
            })
    }
}

fn decode_tiff_stack(path: &Path) -> Result<ArrayD<f64>, DecodeError> {
    let tiff_error = |source| DecodeError::Tiff {
        source,
        path: path.to_path_buf(),
    };
    let file = File::open(path).map_err(|source| DecodeError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let mut decoder = Decoder::new(BufReader::new(file)).map_err(tiff_error)?;

    let mut first_page: Option<(usize, usize)> = None;
    let mut pages = 0;
    let mut samples = Vec::new();
    loop {
        let (width, height) = decoder.dimensions().map_err(tiff_error)?;
        let page = (height as usize, width as usize);
        let expected = *first_page.get_or_insert(page);
        if page != expected {
            return Err(DecodeError::MixedPages {
                path: path.to_path_buf(),
                page: pages,
                expected,
                found: page,
            });
        }

        let raw = decoder.read_image().map_err(tiff_error)?;
        let luma = widen_samples(raw)
            .and_then(|raw| interleaved_luminance(raw, page.0 * page.1))
            .ok_or_else(|| DecodeError::UnsupportedLayout {
                path: path.to_path_buf(),
                page: pages,
            })?;
        samples.extend(luma);
        pages += 1;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(tiff_error)?;
    }

    let (height, width) = first_page.unwrap_or((0, 0));
    let shape = if pages > 1 {
        vec![pages, height, width]
    } else {
        vec![height, width]
    };
    ArrayD::from_shape_vec(IxDyn(&shape), samples).map_err(|source| DecodeError::Shape {
        source,
        path: path.to_path_buf(),
    })
}

fn widen_samples(raw: DecodingResult) -> Option<Vec<f64>> {
    fn widen<T: Into<f64>>(values: Vec<T>) -> Vec<f64> {
        values.into_iter().map(Into::into).collect()
    }

    #[allow(unreachable_patterns)]
    let samples = match raw {
        DecodingResult::U8(values) => widen(values),
        DecodingResult::U16(values) => widen(values),
        DecodingResult::U32(values) => widen(values),
        DecodingResult::U64(values) => values.into_iter().map(|value| value as f64).collect(),
        DecodingResult::I8(values) => widen(values),
        DecodingResult::I16(values) => widen(values),
        DecodingResult::I32(values) => widen(values),
        DecodingResult::I64(values) => values.into_iter().map(|value| value as f64).collect(),
        DecodingResult::F32(values) => widen(values),
        DecodingResult::F64(values) => values,
        _ => return None,
    };
    Some(samples)
}

/// Collapses interleaved channels to one value per pixel. Gray+alpha keeps
/// the gray channel, colour uses the luma weights and ignores alpha.
fn interleaved_luminance(samples: Vec<f64>, pixels: usize) -> Option<Vec<f64>> {
    if pixels == 0 {
        return Some(Vec::new());
    }
    if samples.len() % pixels != 0 {
        return None;
    }
    match samples.len() / pixels {
        0 => None,
        1 => Some(samples),
        2 => Some(samples.chunks_exact(2).map(|pixel| pixel[0]).collect()),
        channels => Some(
            samples
                .chunks_exact(channels)
                .map(|pixel| {
                    pixel
                        .iter()
                        .zip(LUMA_WEIGHTS)
                        .map(|(value, weight)| value * weight)
                        .sum::<f64>()
                })
                .collect(),
        ),
    }
}

fn luminance_array(image: DynamicImage) -> Result<Array2<f64>, ndarray::ShapeError> {
    let shape = (image.height() as usize, image.width() as usize);
    let samples: Vec<f64> = match image.color() {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => image
            .to_luma8()
            .into_raw()
            .into_iter()
            .map(f64::from)
            .collect(),
        ColorType::L16 | ColorType::La16 | ColorType::Rgb16 | ColorType::Rgba16 => image
            .to_luma16()
            .into_raw()
            .into_iter()
            .map(f64::from)
            .collect(),
        _ => image
            .to_luma32f()
            .into_raw()
            .into_iter()
            .map(f64::from)
            .collect(),
    };
    Array2::from_shape_vec(shape, samples)
}

/// Outcome of the load stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub kept: usize,
    pub blank: usize,
}

/// Mean of the first index along the primary axis: the first row of a 2-D
/// image, the whole first page of a stack. `None` for an image without
/// pixels.
pub fn first_row_mean(image: &ArrayViewD<f64>) -> Option<f64> {
    if image.ndim() == 0 || image.len_of(Axis(0)) == 0 {
        return None;
    }
    image.index_axis(Axis(0), 0).mean()
}

/// Empty images count as blank.
pub fn is_blank(image: &ArrayViewD<f64>, threshold: f64) -> bool {
    first_row_mean(image).map_or(true, |mean| mean < threshold)
}

/// Decodes every catalogued image in order, dropping blank frames from the
/// catalog and attaching the decoded pixels to the records that remain.
///
/// A decode failure aborts the stage.
pub fn load_and_filter(
    catalog: &mut Catalog,
    decoder: &dyn ImageDecoder,
    threshold: f64,
    progress_bar: &ProgressBar,
) -> Result<FilterStats, DecodeError> {
    let blank = catalog.try_retain(|record| {
        let image = decoder.decode(&record.path)?;
        progress_bar.inc(1);
        if is_blank(&image.view(), threshold) {
            debug!(name = %record.name, "dropping blank frame");
            return Ok(false);
        }
        debug!(name = %record.name, shape = ?image.shape(), "loaded image");
        record.image = Some(image);
        Ok(true)
    })?;

    Ok(FilterStats {
        kept: catalog.len(),
        blank,
    })
}

#[derive(Debug)]
pub enum DecodeError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Image {
        source: image::ImageError,
        path: PathBuf,
    },
    Tiff {
        source: tiff::TiffError,
        path: PathBuf,
    },
    Shape {
        source: ndarray::ShapeError,
        path: PathBuf,
    },
    /// A later page of a stack has different dimensions from the first.
    MixedPages {
        path: PathBuf,
        page: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },
    UnsupportedLayout {
        path: PathBuf,
        page: usize,
    },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => write!(f, "io error for {}: {}", path.display(), source),
            Self::Image { source, path } => {
                write!(f, "unable to decode {}: {}", path.display(), source)
            }
            Self::Tiff { source, path } => {
                write!(f, "unable to decode {}: {}", path.display(), source)
            }
            Self::Shape { source, path } => {
                write!(f, "unexpected pixel layout in {}: {}", path.display(), source)
            }
            Self::MixedPages {
                path,
                page,
                expected,
                found,
            } => write!(
                f,
                "page {} of {} is {}x{}, expected {}x{}",
                page,
                path.display(),
                found.0,
                found.1,
                expected.0,
                expected.1
            ),
            Self::UnsupportedLayout { path, page } => write!(
                f,
                "unsupported sample layout on page {} of {}",
                page,
                path.display()
            ),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Image { source, .. } => Some(source),
            Self::Tiff { source, .. } => Some(source),
            Self::Shape { source, .. } => Some(source),
            Self::MixedPages { .. } | Self::UnsupportedLayout { .. } => None,
        }
    }
}
