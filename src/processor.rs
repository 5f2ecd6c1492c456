use crate::config::AppConfig;
use crate::error::{AppError, ExtractionWarning, Stage};
use crate::exif_reader;
use crate::metadata::{CameraInfo, ImageProperties, ImageRecord};
use chrono::{DateTime, Local};
use image::codecs::bmp::BmpDecoder;
use image::codecs::gif::GifDecoder;
use image::codecs::jpeg::JpegDecoder;
use image::codecs::png::PngDecoder;
use image::{AnimationDecoder, ColorType, ImageDecoder, ImageFormat};
use indicatif::ProgressBar;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Bytes read from the head of a file for magic-number detection.
const SNIFF_LEN: u64 = 64;

/// Everything the run loop gathered: one record per extracted file, in discovery
/// order, and the files that could not even be stat'ed.
#[derive(Debug, Default)]
pub struct ProcessingOutcome {
    pub records: Vec<ImageRecord>,
    pub skipped: Vec<ExtractionWarning>,
}

/// Extracts every path in order, one at a time. A failing file never stops the run.
pub fn start_processing(
    config: &AppConfig,
    paths: &[PathBuf],
    progress: &ProgressBar,
) -> ProcessingOutcome {
    log::info!("Starting image processing for {} files", paths.len());

    let mut outcome = ProcessingOutcome::default();
    for path in paths {
        log::debug!("Processing image started for: {:?}", path);
        match extract_metadata(config, path) {
            Ok(record) => {
                log::trace!("Extracted metadata for {:?}: {:?}", path, record);
                if !record.warnings.is_empty() {
                    progress.suspend(|| {
                        for warning in &record.warnings {
                            log::warn!("{}", warning);
                        }
                    });
                }
                outcome.records.push(record);
            }
            Err(warning) => {
                progress.suspend(|| log::warn!("Skipping file: {}", warning));
                outcome.skipped.push(warning);
            }
        }
        progress.inc(1);
    }

    log::info!(
        "All images processed: {} records, {} skipped",
        outcome.records.len(),
        outcome.skipped.len()
    );
    outcome
}

/// Builds the record for one file.
///
/// Only a failed stat drops the file. Every later stage degrades to a partial
/// record with the failure attached as a warning. A file whose pixel data fails
/// to decode keeps the dimensions and format read from its header.
pub fn extract_metadata(config: &AppConfig, path: &Path) -> Result<ImageRecord, ExtractionWarning> {
    let fs_meta =
        std::fs::metadata(path).map_err(|e| ExtractionWarning::new(path, Stage::Stat, e))?;

    let mut record = ImageRecord::new(path, fs_meta.len());
    record.last_modified = fs_meta.modified().ok().map(DateTime::<Local>::from);
    record.creation_time = fs_meta.created().ok().map(DateTime::<Local>::from);

    log::trace!("Calculating hash for image: {:?}", path);
    match hash_file(path, config.hash_chunk_size) {
        Ok(hash) => {
            log::debug!("Calculated hash for {:?}: {}", path, hash);
            record.file_hash = Some(hash);
        }
        Err(e) => warn(&mut record, path, Stage::Hash, e),
    }

    match sniff_format(path) {
        Ok(format) => record.detected_format = format.map(format_name),
        Err(e) => warn(&mut record, path, Stage::Sniff, e),
    }

    log::trace!("Reading image header: {:?}", path);
    let header = match read_header(path) {
        Ok(header) => Some(header),
        Err(e) => {
            warn(&mut record, path, Stage::Decode, e);
            None
        }
    };

    if let Some(header) = header {
        let format = header.format;
        let mut color = header.color;
        log::trace!("Decoding pixel data: {:?}", path);
        match decode_pixels(path) {
            Ok(decoded) => color = color.or(Some(decoded)),
            Err(e) => warn(&mut record, path, Stage::PixelData, e),
        }

        let properties = ImageProperties::new(
            header.width,
            header.height,
            format_name(format),
            color.map(color_mode),
            color.map(|c| c.bits_per_pixel()),
            count_frames(path, format),
        );
        log::debug!("Dimensions for {:?}: {}", path, properties.resolution());
        record.image = Some(properties);

        if carries_exif(format) {
            extract_exif(&mut record, path, format);
        }
    }

    Ok(record)
}

fn warn(record: &mut ImageRecord, path: &Path, stage: Stage, err: impl std::fmt::Display) {
    record.warnings.push(ExtractionWarning::new(path, stage, err));
}

/// SHA-256 of the file contents, streamed in `chunk_size` pieces, as lowercase hex.
pub fn hash_file(path: &Path, chunk_size: usize) -> Result<String, AppError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Format from magic bytes alone, ignoring the extension. `None` if unrecognized.
fn sniff_format(path: &Path) -> Result<Option<ImageFormat>, AppError> {
    let mut header = Vec::with_capacity(SNIFF_LEN as usize);
    File::open(path)?.take(SNIFF_LEN).read_to_end(&mut header)?;
    Ok(image::guess_format(&header).ok())
}

/// What the container header says, read without touching pixel data.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ImageHeader {
    format: ImageFormat,
    width: u32,
    height: u32,
    /// Only known for formats whose header names it.
    color: Option<ColorType>,
}

/// Dimensions, format and (where the header carries it) color type. A file whose
/// pixel data is truncated or corrupt still has a readable header.
fn read_header(path: &Path) -> Result<ImageHeader, AppError> {
    let format = image::io::Reader::open(path)?
        .with_guessed_format()?
        .format()
        .ok_or_else(|| AppError::Generic("unrecognized image format".to_string()))?;

    let reader = BufReader::new(File::open(path)?);
    let (width, height, color) = match format {
        ImageFormat::Jpeg => header_of(JpegDecoder::new(reader)?),
        ImageFormat::Png => header_of(PngDecoder::new(reader)?),
        ImageFormat::Gif => header_of(GifDecoder::new(reader)?),
        ImageFormat::Bmp => header_of(BmpDecoder::new(reader)?),
        other => {
            let (width, height) = image::io::Reader::with_format(reader, other).into_dimensions()?;
            (width, height, None)
        }
    };

    Ok(ImageHeader {
        format,
        width,
        height,
        color,
    })
}

fn header_of<'a>(decoder: impl ImageDecoder<'a>) -> (u32, u32, Option<ColorType>) {
    let (width, height) = decoder.dimensions();
    (width, height, Some(decoder.color_type()))
}

/// Decodes the full pixel buffer and reports its color type.
fn decode_pixels(path: &Path) -> Result<ColorType, AppError> {
    let image = image::io::Reader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image.color())
}

/// Frame count for animated GIFs; 1 for everything else or when counting fails.
fn count_frames(path: &Path, format: ImageFormat) -> u32 {
    if format != ImageFormat::Gif {
        return 1;
    }
    let frames = File::open(path)
        .map_err(AppError::from)
        .and_then(|file| GifDecoder::new(BufReader::new(file)).map_err(AppError::from))
        .map(|decoder| decoder.into_frames().take_while(|f| f.is_ok()).count());
    match frames {
        Ok(n) => n.max(1) as u32,
        Err(e) => {
            log::debug!("Could not count frames for {:?}: {}", path, e);
            1
        }
    }
}

fn extract_exif(record: &mut ImageRecord, path: &Path, format: ImageFormat) {
    log::trace!("Extracting EXIF data for image: {:?}", path);
    let primary_camera = match exif_reader::read_primary(path) {
        Ok(Some(primary)) => {
            record.exif = primary.tags;
            record.gps_latitude = primary.gps_latitude;
            record.gps_longitude = primary.gps_longitude;
            primary.camera
        }
        Ok(None) => return,
        Err(e) => {
            warn(record, path, Stage::Exif, e);
            CameraInfo::default()
        }
    };

    if !exif_reader::supports_camera_pass(format) {
        record.camera = primary_camera;
        return;
    }

    // The camera pass uses a different parser, so it still runs when the primary one choked.
    match exif_reader::read_camera_info(path) {
        Ok(camera) => record.camera = camera.or(primary_camera),
        Err(e) => {
            warn(record, path, Stage::CameraExif, e);
            record.camera = primary_camera;
        }
    }
}

fn carries_exif(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Tiff | ImageFormat::WebP
    )
}

pub fn format_name(format: ImageFormat) -> String {
    format!("{:?}", format).to_uppercase()
}

fn color_mode(color: ColorType) -> String {
    match color {
        ColorType::L8 => "L".to_string(),
        ColorType::La8 => "LA".to_string(),
        ColorType::Rgb8 => "RGB".to_string(),
        ColorType::Rgba8 => "RGBA".to_string(),
        ColorType::L16 => "I;16".to_string(),
        ColorType::La16 => "LA;16".to_string(),
        ColorType::Rgb16 => "RGB;16".to_string(),
        ColorType::Rgba16 => "RGBA;16".to_string(),
        ColorType::Rgb32F => "RGB;32F".to_string(),
        ColorType::Rgba32F => "RGBA;32F".to_string(),
        other => format!("{:?}", other),
    }
}
