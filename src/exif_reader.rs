//! EXIF extraction in two independent passes.
//!
//! The primary pass walks every primary-IFD field with `kamadak-exif` and keeps the
//! scalar ones as `exif_<tag>` columns, plus decimal GPS coordinates and the camera
//! fields it can see. The camera pass re-parses JPEG and TIFF files with `nom-exif`
//! for make, model, software and exposure settings; other containers rely on the
//! camera fields of the primary pass.

use crate::error::AppError;
use crate::metadata::{CameraInfo, FieldValue};
use exif::{Context, Exif, Field, In, Reader, Tag, Value};
use image::ImageFormat;
use nom_exif::{EntryValue, ExifIter, ExifTag, MediaParser, MediaSource};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Result of the primary pass over a file's EXIF block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryExif {
    pub tags: BTreeMap<String, FieldValue>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub camera: CameraInfo,
}

/// Reads the EXIF block with `kamadak-exif`.
///
/// Returns `Ok(None)` when the file carries no EXIF at all; any other parse failure
/// is an error so the caller can record it.
pub fn read_primary(path: &Path) -> Result<Option<PrimaryExif>, AppError> {
    let file = File::open(path)?;
    let mut buf_reader = BufReader::new(file);
    let exif = match Reader::new().read_from_container(&mut buf_reader) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => {
            log::debug!("No EXIF data found for {:?}", path);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    log::trace!("EXIF data found for {:?}", path);
    Ok(Some(primary_from_exif(&exif)))
}

fn primary_from_exif(exif: &Exif) -> PrimaryExif {
    let tags = exif
        .fields()
        .filter(|field| field.ifd_num == In::PRIMARY)
        .filter_map(tag_column)
        .collect();

    PrimaryExif {
        tags,
        gps_latitude: gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef),
        gps_longitude: gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef),
        camera: camera_from_exif(exif),
    }
}

fn camera_from_exif(exif: &Exif) -> CameraInfo {
    CameraInfo {
        make: ascii_field(exif, Tag::Make),
        model: ascii_field(exif, Tag::Model),
        software: ascii_field(exif, Tag::Software),
        iso: exif
            .get_field(Tag::PhotographicSensitivity, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0)),
        exposure_time: rational_field(exif, Tag::ExposureTime),
        f_number: rational_field(exif, Tag::FNumber),
        focal_length: rational_field(exif, Tag::FocalLength),
    }
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(strings) => {
            let text = String::from_utf8_lossy(strings.first()?);
            let text = text.trim_end_matches('\0').trim();
            if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            }
        }
        _ => None,
    }
}

fn rational_field(exif: &Exif, tag: Tag) -> Option<f64> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(v) => v.first().filter(|r| r.denom != 0).map(|r| r.to_f64()),
        _ => None,
    }
}

/// Maps one field to its `exif_<name>` column. GPS fields, tags without a known
/// name and non-scalar values yield nothing.
fn tag_column(field: &Field) -> Option<(String, FieldValue)> {
    if field.tag.context() == Context::Gps {
        return None;
    }
    field.tag.description()?;
    let value = scalar_value(&field.value)?;
    Some((format!("exif_{}", normalize_tag_name(&field.tag.to_string())), value))
}

/// Lowercases a tag name and turns spaces and hyphens into underscores.
pub fn normalize_tag_name(name: &str) -> String {
    name.to_lowercase().replace([' ', '-'], "_")
}

/// Single integers, floats and strings survive; arrays, binary blobs and
/// zero-denominator rationals are dropped.
fn scalar_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Ascii(strings) if strings.len() == 1 => {
            let text = String::from_utf8_lossy(&strings[0]);
            Some(FieldValue::Text(text.trim_end_matches('\0').trim().to_string()))
        }
        Value::Byte(v) if v.len() == 1 => Some(FieldValue::Int(v[0] as i64)),
        Value::Short(v) if v.len() == 1 => Some(FieldValue::Int(v[0] as i64)),
        Value::Long(v) if v.len() == 1 => Some(FieldValue::Int(v[0] as i64)),
        Value::SByte(v) if v.len() == 1 => Some(FieldValue::Int(v[0] as i64)),
        Value::SShort(v) if v.len() == 1 => Some(FieldValue::Int(v[0] as i64)),
        Value::SLong(v) if v.len() == 1 => Some(FieldValue::Int(v[0] as i64)),
        Value::Rational(v) if v.len() == 1 && v[0].denom != 0 => {
            Some(FieldValue::Float(v[0].to_f64()))
        }
        Value::SRational(v) if v.len() == 1 && v[0].denom != 0 => {
            Some(FieldValue::Float(v[0].to_f64()))
        }
        Value::Float(v) if v.len() == 1 => Some(FieldValue::Float(v[0] as f64)),
        Value::Double(v) if v.len() == 1 => Some(FieldValue::Float(v[0])),
        _ => None,
    }
}

/// Decimal degrees from a degrees/minutes/seconds triple, negative for S and W.
/// Any missing or malformed piece yields `None`.
fn gps_coordinate(exif: &Exif, coord_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let coord = exif.get_field(coord_tag, In::PRIMARY)?;
    let degrees = dms_to_decimal(&coord.value)?;

    let sign = match exif.get_field(ref_tag, In::PRIMARY) {
        Some(reference) => {
            let r = reference.display_value().to_string();
            if r.contains('S') || r.contains('W') {
                -1.0
            } else {
                1.0
            }
        }
        None => 1.0,
    };

    Some(sign * degrees)
}

fn dms_to_decimal(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(parts) if parts.len() >= 3 => {
            if parts.iter().take(3).any(|r| r.denom == 0) {
                return None;
            }
            let degrees = parts[0].to_f64();
            let minutes = parts[1].to_f64();
            let seconds = parts[2].to_f64();
            Some(degrees + minutes / 60.0 + seconds / 3600.0)
        }
        _ => None,
    }
}

/// Containers `nom-exif` can parse. PNG and WebP EXIF only reaches the primary pass.
pub fn supports_camera_pass(format: ImageFormat) -> bool {
    matches!(format, ImageFormat::Jpeg | ImageFormat::Tiff)
}

/// Reads camera and exposure fields with `nom-exif`, independent of the primary pass.
pub fn read_camera_info(path: &Path) -> Result<CameraInfo, AppError> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::file_path(path)
        .map_err(|e| AppError::CameraExif(format!("failed to open media source: {}", e)))?;
    let iter: ExifIter = parser
        .parse(ms)
        .map_err(|e| AppError::CameraExif(e.to_string()))?;
    let exif: nom_exif::Exif = iter.into();

    let info = CameraInfo {
        make: exif.get(ExifTag::Make).and_then(entry_to_string),
        model: exif.get(ExifTag::Model).and_then(entry_to_string),
        software: exif.get(ExifTag::Software).and_then(entry_to_string),
        iso: exif
            .get(ExifTag::ISOSpeedRatings)
            .and_then(entry_to_f64)
            .filter(|v| *v >= 0.0)
            .map(|v| v as u32),
        exposure_time: exif.get(ExifTag::ExposureTime).and_then(entry_to_f64),
        f_number: exif.get(ExifTag::FNumber).and_then(entry_to_f64),
        focal_length: exif.get(ExifTag::FocalLength).and_then(entry_to_f64),
    };
    if info.is_empty() {
        log::debug!("No camera fields found for {:?}", path);
    } else {
        log::trace!("Camera info for {:?}: {:?}", path, info);
    }
    Ok(info)
}

fn entry_to_string(val: &EntryValue) -> Option<String> {
    let s = val.to_string();
    let s = s.trim().trim_matches('"').trim_end_matches('\0').to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn entry_to_f64(val: &EntryValue) -> Option<f64> {
    match val {
        EntryValue::URational(r) => ratio(r.0 as f64, r.1 as f64),
        EntryValue::IRational(r) => ratio(r.0 as f64, r.1 as f64),
        EntryValue::URationalArray(v) => v.first().and_then(|r| ratio(r.0 as f64, r.1 as f64)),
        EntryValue::U8(v) => Some(*v as f64),
        EntryValue::U16(v) => Some(*v as f64),
        EntryValue::U32(v) => Some(*v as f64),
        EntryValue::U16Array(v) => v.first().map(|x| *x as f64),
        EntryValue::F32(v) => Some(*v as f64),
        EntryValue::F64(v) => Some(*v),
        _ => None,
    }
}

fn ratio(num: f64, denom: f64) -> Option<f64> {
    if denom == 0.0 {
        None
    } else {
        Some(num / denom)
    }
}
