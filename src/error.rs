use exif::Error as ExifError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("EXIF error: {0}")]
    Exif(#[from] ExifError),

    #[error("Camera EXIF error: {0}")]
    CameraExif(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Extraction stage a per-file warning originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Stat,
    Hash,
    Sniff,
    Decode,
    PixelData,
    Exif,
    CameraExif,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Stat => "stat",
            Stage::Hash => "hash",
            Stage::Sniff => "format sniff",
            Stage::Decode => "decode",
            Stage::PixelData => "pixel decode",
            Stage::Exif => "exif",
            Stage::CameraExif => "camera exif",
        };
        f.write_str(name)
    }
}

/// A recoverable failure while extracting one file. Never aborts the run.
#[derive(Error, Debug, Clone)]
#[error("{stage} failed for {}: {message}", .path.display())]
pub struct ExtractionWarning {
    pub path: PathBuf,
    pub stage: Stage,
    pub message: String,
}

impl ExtractionWarning {
    pub fn new(path: impl Into<PathBuf>, stage: Stage, err: impl fmt::Display) -> Self {
        ExtractionWarning {
            path: path.into(),
            stage,
            message: err.to_string(),
        }
    }
}
