use image::{DynamicImage, ImageEncoder, codecs::jpeg::JpegEncoder};
use std::path::Path;
use tracing::debug;

use crate::batch::BatchError;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;
const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Find the APP1 `Exif` segment in a JPEG stream, marker and length bytes
/// included. Scanning stops at the first scan header.
pub fn find_exif_segment(buffer: &[u8]) -> Option<&[u8]> {
    if !buffer.starts_with(&SOI) {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= buffer.len() {
        if buffer[pos] != 0xFF {
            return None;
        }
        let marker = buffer[pos + 1];
        if marker == 0xFF {
            // Fill byte
            pos += 1;
            continue;
        }
        if marker == SOS || marker == EOI {
            return None;
        }
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }

        let segment_length = u16::from_be_bytes([buffer[pos + 2], buffer[pos + 3]]) as usize;
        let segment_end = pos + 2 + segment_length;
        if segment_length < 2 || segment_end > buffer.len() {
            return None;
        }

        if marker == APP1 && buffer[pos + 4..segment_end].starts_with(EXIF_HEADER) {
            debug!("Found EXIF segment in JPEG: {} bytes", segment_length);
            return Some(&buffer[pos..segment_end]);
        }
        pos = segment_end;
    }

    None
}

/// Read the EXIF segment of the JPEG at `path`, if any.
pub fn read_exif_segment(path: &Path) -> Option<Vec<u8>> {
    let buffer = std::fs::read(path).ok()?;
    find_exif_segment(&buffer).map(|segment| segment.to_vec())
}

/// Insert `segment` directly after the SOI marker of `jpeg`.
pub fn insert_after_soi(jpeg: &[u8], segment: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(jpeg.len() + segment.len());
    out.extend_from_slice(&jpeg[..2.min(jpeg.len())]);
    out.extend_from_slice(segment);
    if jpeg.len() > 2 {
        out.extend_from_slice(&jpeg[2..]);
    }
    out
}

/// Encode `image` as baseline JPEG in memory.
pub fn encode(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, BatchError> {
    // JPEG doesn't support alpha channel, so convert to RGB
    let rgb_image = image.to_rgb8();
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder.write_image(
        &rgb_image,
        rgb_image.width(),
        rgb_image.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(buffer)
}

/// Save image as JPEG, carrying over an EXIF segment when one is given.
pub fn save_with_exif(
    image: &DynamicImage,
    path: &Path,
    quality: u8,
    exif: Option<&[u8]>,
) -> Result<(), BatchError> {
    let encoded = encode(image, quality)?;

    let bytes = match exif {
        Some(segment) => {
            debug!("JPEG written with EXIF segment: {} bytes", segment.len());
            insert_after_soi(&encoded, segment)
        }
        None => encoded,
    };

    std::fs::write(path, bytes)?;
    Ok(())
}
