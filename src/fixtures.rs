//! Test images carrying a small hand-built EXIF block.
//!
//! The block is little-endian TIFF with IFD0 holding Make "Canon", Orientation 6
//! and a GPS pointer, and a GPS IFD placing the image at 33°30'0" S.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgb, RgbImage};
use std::path::Path;

pub const MAKE: &str = "Canon";
pub const LATITUDE: f64 = -33.5;

const ASCII: u16 = 2;
const SHORT: u16 = 3;
const LONG: u16 = 4;
const RATIONAL: u16 = 5;

fn entry(out: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: [u8; 4]) {
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&value);
}

/// Raw TIFF-structured EXIF payload.
pub fn tiff_block() -> Vec<u8> {
    // header (8) + IFD0 (2 + 3 * 12 + 4) = 50
    const MAKE_OFFSET: u32 = 50;
    // "Canon\0"
    const GPS_IFD_OFFSET: u32 = MAKE_OFFSET + 6;
    // GPS IFD (2 + 2 * 12 + 4) = 30
    const LATITUDE_OFFSET: u32 = GPS_IFD_OFFSET + 30;

    let mut out = Vec::new();
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());

    out.extend_from_slice(&3u16.to_le_bytes());
    entry(&mut out, 0x010f, ASCII, 6, MAKE_OFFSET.to_le_bytes());
    entry(&mut out, 0x0112, SHORT, 1, [6, 0, 0, 0]);
    entry(&mut out, 0x8825, LONG, 1, GPS_IFD_OFFSET.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(out.len() as u32, MAKE_OFFSET);

    out.extend_from_slice(b"Canon\0");
    assert_eq!(out.len() as u32, GPS_IFD_OFFSET);

    out.extend_from_slice(&2u16.to_le_bytes());
    entry(&mut out, 0x0001, ASCII, 2, [b'S', 0, 0, 0]);
    entry(&mut out, 0x0002, RATIONAL, 3, LATITUDE_OFFSET.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(out.len() as u32, LATITUDE_OFFSET);

    for (num, denom) in [(33u32, 1u32), (30, 1), (0, 1)] {
        out.extend_from_slice(&num.to_le_bytes());
        out.extend_from_slice(&denom.to_le_bytes());
    }
    out
}

fn sample_image() -> RgbImage {
    RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, 90]))
}

/// Writes a 40x30 JPEG with the EXIF block in an APP1 segment right after SOI.
pub fn write_jpeg_with_exif(path: &Path) {
    let image = sample_image();
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, 90)
        .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .unwrap();

    let tiff = tiff_block();
    let segment_len = (2 + 6 + tiff.len()) as u16;
    let mut out = vec![0xff, 0xd8, 0xff, 0xe1];
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&encoded[2..]);
    std::fs::write(path, out).unwrap();
}

/// Writes a 40x30 PNG with the EXIF block in an `eXIf` chunk right after IHDR.
pub fn write_png_with_exif(path: &Path) {
    let image = sample_image();
    let mut encoded = Vec::new();
    PngEncoder::new(&mut encoded)
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .unwrap();

    let tiff = tiff_block();
    let mut chunk = Vec::new();
    chunk.extend_from_slice(&(tiff.len() as u32).to_be_bytes());
    chunk.extend_from_slice(b"eXIf");
    chunk.extend_from_slice(&tiff);
    chunk.extend_from_slice(&crc32(&chunk[4..]).to_be_bytes());

    // signature (8) + IHDR chunk (4 + 4 + 13 + 4)
    let after_ihdr = 33;
    let mut out = encoded[..after_ihdr].to_vec();
    out.extend_from_slice(&chunk);
    out.extend_from_slice(&encoded[after_ihdr..]);
    std::fs::write(path, out).unwrap();
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = 0xffff_ffffu32;
    for &byte in bytes {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xedb8_8320 & mask);
        }
    }
    !crc
}

#[test]
fn crc_matches_known_value() {
    assert_eq!(crc32(b"IEND"), 0xae42_6082);
}
