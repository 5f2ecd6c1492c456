//! Brightness and contrast analysis: mean and standard deviation of 8-bit luma.

use crate::error::{AppError, ExtractionWarning, Stage};
use crate::metadata::round_to;
use image::{GrayImage, Luma, RgbImage};
use indicatif::ProgressBar;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrightnessRecord {
    pub filename: String,
    pub brightness: Option<f64>,
    pub contrast: Option<f64>,
}

impl BrightnessRecord {
    /// Row for a file that did not decode: the name only.
    pub fn empty(path: &Path) -> Self {
        BrightnessRecord {
            filename: file_name(path),
            brightness: None,
            contrast: None,
        }
    }
}

/// One row per path. A file that does not decode gets an empty row and a logged warning.
pub fn start_analysis(paths: &[PathBuf], progress: &ProgressBar) -> Vec<BrightnessRecord> {
    log::info!("Starting brightness analysis for {} files", paths.len());
    let records = paths
        .iter()
        .map(|path| {
            let record = analyze(path).unwrap_or_else(|warning| {
                progress.suspend(|| log::warn!("{}", warning));
                BrightnessRecord::empty(path)
            });
            progress.inc(1);
            record
        })
        .collect();
    log::info!("Brightness analysis finished");
    records
}

pub fn analyze(path: &Path) -> Result<BrightnessRecord, ExtractionWarning> {
    let (mean, stddev) =
        luma_stats(path).map_err(|e| ExtractionWarning::new(path, Stage::Decode, e))?;
    Ok(BrightnessRecord {
        filename: file_name(path),
        brightness: Some(round_to(mean, 2)),
        contrast: Some(round_to(stddev, 2)),
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn luma_stats(path: &Path) -> Result<(f64, f64), AppError> {
    let rgb = image::open(path)?.to_rgb8();
    Ok(mean_and_stddev(&to_luma(&rgb)))
}

/// ITU-R 601-2 luma, L = R*299/1000 + G*587/1000 + B*114/1000, in 16-bit fixed
/// point with rounding. Not `to_luma8`, which weighs channels per Rec. 709.
pub fn to_luma(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        Luma([l as u8])
    })
}

/// Population mean and standard deviation over all pixels; (0, 0) for an empty image.
pub fn mean_and_stddev(gray: &GrayImage) -> (f64, f64) {
    let count = gray.width() as u64 * gray.height() as u64;
    if count == 0 {
        return (0.0, 0.0);
    }

    let (sum, sum_sq) = gray.pixels().fold((0u64, 0u64), |(s, sq), p| {
        let v = p.0[0] as u64;
        (s + v, sq + v * v)
    });
    let n = count as f64;
    let mean = sum as f64 / n;
    let variance = (sum_sq as f64 / n - mean * mean).max(0.0);
    (mean, variance.sqrt())
}

/// Averages over the rows that decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub processed: usize,
    pub average_brightness: f64,
    pub average_contrast: f64,
}

impl MetricsSummary {
    pub fn from_records(records: &[BrightnessRecord]) -> Self {
        let decoded: Vec<(f64, f64)> = records
            .iter()
            .filter_map(|r| Some((r.brightness?, r.contrast?)))
            .collect();
        let (average_brightness, average_contrast) = if decoded.is_empty() {
            (0.0, 0.0)
        } else {
            let n = decoded.len() as f64;
            let (b, c) = decoded
                .iter()
                .fold((0.0, 0.0), |(b, c), (rb, rc)| (b + rb, c + rc));
            (round_to(b / n, 2), round_to(c / n, 2))
        };

        MetricsSummary {
            processed: records.len(),
            average_brightness,
            average_contrast,
        }
    }
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processed {} images", self.processed)?;
        writeln!(f, "Average brightness: {}", self.average_brightness)?;
        writeln!(f, "Average contrast: {}", self.average_contrast)
    }
}
