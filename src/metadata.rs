// src/metadata.rs

use crate::error::ExtractionWarning;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A single CSV cell. `Null` renders as an empty field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Null => Ok(()),
        }
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else if height > width {
            Orientation::Portrait
        } else {
            Orientation::Square
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
            Orientation::Square => "square",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties that only exist when the file decoded as an image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageProperties {
    pub width: u32,
    pub height: u32,
    pub format: String,
    /// `None` when only the header was readable and it does not name a color type.
    pub color_mode: Option<String>,
    pub color_depth: Option<u16>,
    pub n_frames: u32,
    pub megapixels: f64,
    pub aspect_ratio: Option<f64>,
    pub orientation: Orientation,
    pub quality_score: f64,
}

impl ImageProperties {
    /// Builds the property set and derives megapixels, aspect ratio, orientation
    /// and quality score from the dimensions.
    pub fn new(
        width: u32,
        height: u32,
        format: String,
        color_mode: Option<String>,
        color_depth: Option<u16>,
        n_frames: u32,
    ) -> Self {
        let pixels = width as f64 * height as f64;
        let aspect_ratio = if width > 0 && height > 0 {
            Some(round_to(width as f64 / height as f64, 3))
        } else {
            None
        };

        ImageProperties {
            width,
            height,
            format,
            color_mode,
            color_depth,
            n_frames: n_frames.max(1),
            megapixels: round_to(pixels / 1_000_000.0, 2),
            aspect_ratio,
            orientation: Orientation::from_dimensions(width, height),
            quality_score: quality_score(width, height, aspect_ratio),
        }
    }

    pub fn is_animated(&self) -> bool {
        self.n_frames > 1
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Resolution-based heuristic in [0, 100]: megapixels capped at 100, scaled by 0.7
/// for panoramas and strips wider than 3:1 either way.
pub fn quality_score(width: u32, height: u32, aspect_ratio: Option<f64>) -> f64 {
    let mut score = (width as f64 * height as f64 / 1_000_000.0).min(100.0);
    if let Some(ratio) = aspect_ratio {
        if ratio > 3.0 || ratio < 0.33 {
            score *= 0.7;
        }
    }
    round_to(score, 2)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Camera and exposure fields from the secondary EXIF pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraInfo {
    pub make: Option<String>,
    pub model: Option<String>,
    pub software: Option<String>,
    pub iso: Option<u32>,
    pub exposure_time: Option<f64>,
    pub f_number: Option<f64>,
    pub focal_length: Option<f64>,
}

impl CameraInfo {
    pub fn is_empty(&self) -> bool {
        *self == CameraInfo::default()
    }

    /// Keeps every field already set and fills the gaps from `fallback`.
    pub fn or(self, fallback: CameraInfo) -> CameraInfo {
        CameraInfo {
            make: self.make.or(fallback.make),
            model: self.model.or(fallback.model),
            software: self.software.or(fallback.software),
            iso: self.iso.or(fallback.iso),
            exposure_time: self.exposure_time.or(fallback.exposure_time),
            f_number: self.f_number.or(fallback.f_number),
            focal_length: self.focal_length.or(fallback.focal_length),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub filename: String,
    pub file_path: String,
    pub extension: String,
    pub file_size_bytes: u64,
    pub last_modified: Option<DateTime<Local>>,
    pub creation_time: Option<DateTime<Local>>,
    pub file_hash: Option<String>,
    pub detected_format: Option<String>,
    pub image: Option<ImageProperties>,
    /// `exif_<tag>` columns, keyed by the full column name.
    pub exif: BTreeMap<String, FieldValue>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub camera: CameraInfo,
    pub warnings: Vec<ExtractionWarning>,
}

impl ImageRecord {
    /// A record carrying only path-derived fields; the extractor fills in the rest.
    pub fn new(path: &Path, file_size_bytes: u64) -> Self {
        ImageRecord {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_path: path.to_string_lossy().into_owned(),
            extension: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                .unwrap_or_default(),
            file_size_bytes,
            last_modified: None,
            creation_time: None,
            file_hash: None,
            detected_format: None,
            image: None,
            exif: BTreeMap::new(),
            gps_latitude: None,
            gps_longitude: None,
            camera: CameraInfo::default(),
            warnings: Vec::new(),
        }
    }

    pub fn file_size_mb(&self) -> f64 {
        round_to(self.file_size_bytes as f64 / (1024.0 * 1024.0), 2)
    }

    /// The record as (column, value) pairs. Columns that only apply to decoded
    /// images or present EXIF fields are left out when absent.
    pub fn columns(&self) -> Vec<(String, FieldValue)> {
        let mut columns: Vec<(String, FieldValue)> = vec![
            ("filename".into(), self.filename.clone().into()),
            ("file_path".into(), self.file_path.clone().into()),
            ("extension".into(), self.extension.clone().into()),
            ("file_size_bytes".into(), self.file_size_bytes.into()),
            ("file_size_mb".into(), self.file_size_mb().into()),
            ("last_modified".into(), format_timestamp(self.last_modified).into()),
            ("creation_time".into(), format_timestamp(self.creation_time).into()),
            ("file_hash".into(), self.file_hash.clone().into()),
            ("detected_format".into(), self.detected_format.clone().into()),
        ];

        if let Some(image) = &self.image {
            columns.extend([
                ("width".to_string(), image.width.into()),
                ("height".to_string(), image.height.into()),
                ("resolution".to_string(), image.resolution().into()),
                ("megapixels".to_string(), image.megapixels.into()),
                ("format".to_string(), image.format.clone().into()),
                ("color_mode".to_string(), image.color_mode.clone().into()),
                (
                    "color_depth".to_string(),
                    image.color_depth.map(u32::from).into(),
                ),
                ("aspect_ratio".to_string(), image.aspect_ratio.into()),
                ("orientation".to_string(), image.orientation.as_str().to_string().into()),
                ("quality_score".to_string(), image.quality_score.into()),
                ("is_animated".to_string(), image.is_animated().into()),
                ("n_frames".to_string(), image.n_frames.into()),
            ]);
        }

        columns.extend(self.exif.iter().map(|(k, v)| (k.clone(), v.clone())));

        let optional: [(&str, FieldValue); 9] = [
            ("gps_latitude", self.gps_latitude.into()),
            ("gps_longitude", self.gps_longitude.into()),
            ("camera_make", self.camera.make.clone().into()),
            ("camera_model", self.camera.model.clone().into()),
            ("software", self.camera.software.clone().into()),
            ("iso", self.camera.iso.into()),
            ("exposure_time", self.camera.exposure_time.into()),
            ("f_number", self.camera.f_number.into()),
            ("focal_length", self.camera.focal_length.into()),
        ];
        columns.extend(
            optional
                .into_iter()
                .filter(|(_, v)| *v != FieldValue::Null)
                .map(|(k, v)| (k.to_string(), v)),
        );

        columns
    }
}

fn format_timestamp(ts: Option<DateTime<Local>>) -> Option<String> {
    ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
}
