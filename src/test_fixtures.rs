//! Byte-level image fixtures shared by unit tests.

use image::{ImageEncoder, Rgb, RgbImage, codecs::jpeg::JpegEncoder};

pub const DATE_TIME: u16 = 0x0132;
pub const DATE_TIME_ORIGINAL: u16 = 0x9003;
pub const DATE_TIME_DIGITIZED: u16 = 0x9004;
const EXIF_IFD_POINTER: u16 = 0x8769;

/// Little-endian TIFF block with ASCII entries in IFD0 and the Exif sub-IFD.
/// Tags within each slice must be sorted.
pub fn exif_tiff(ifd0: &[(u16, &str)], exif: &[(u16, &str)]) -> Vec<u8> {
    let ifd0_count = ifd0.len() + usize::from(!exif.is_empty());
    let exif_start = 8 + 2 + 12 * ifd0_count + 4;
    let exif_size = if exif.is_empty() {
        0
    } else {
        2 + 12 * exif.len() + 4
    };

    let mut data_offset = exif_start + exif_size;
    let mut data = Vec::new();
    let mut ascii_entry = |out: &mut Vec<u8>, tag: u16, value: &str| {
        let count = value.len() + 1;
        out.extend(tag.to_le_bytes());
        out.extend(2u16.to_le_bytes());
        out.extend((count as u32).to_le_bytes());
        out.extend((data_offset as u32).to_le_bytes());
        data.extend(value.as_bytes());
        data.push(0);
        data_offset += count;
    };

    let mut out = b"II*\0".to_vec();
    out.extend(8u32.to_le_bytes());

    out.extend((ifd0_count as u16).to_le_bytes());
    for (tag, value) in ifd0 {
        ascii_entry(&mut out, *tag, value);
    }
    if !exif.is_empty() {
        out.extend(EXIF_IFD_POINTER.to_le_bytes());
        out.extend(4u16.to_le_bytes());
        out.extend(1u32.to_le_bytes());
        out.extend((exif_start as u32).to_le_bytes());
    }
    out.extend(0u32.to_le_bytes());

    if !exif.is_empty() {
        out.extend((exif.len() as u16).to_le_bytes());
        for (tag, value) in exif {
            ascii_entry(&mut out, *tag, value);
        }
        out.extend(0u32.to_le_bytes());
    }

    out.extend(data);
    out
}

/// APP1 `Exif` segment, marker included.
pub fn exif_app1(tiff: &[u8]) -> Vec<u8> {
    let mut segment = vec![0xFF, 0xE1];
    segment.extend(((2 + 6 + tiff.len()) as u16).to_be_bytes());
    segment.extend(b"Exif\0\0");
    segment.extend(tiff);
    segment
}

/// Small grey JPEG without metadata.
pub fn plain_jpeg() -> Vec<u8> {
    let image = RgbImage::from_pixel(16, 8, Rgb([128, 128, 128]));
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 90)
        .write_image(&image, 16, 8, image::ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}

/// Small JPEG carrying the given EXIF dates.
pub fn jpeg_with_exif(ifd0: &[(u16, &str)], exif: &[(u16, &str)]) -> Vec<u8> {
    let jpeg = plain_jpeg();
    let mut out = jpeg[..2].to_vec();
    out.extend(exif_app1(&exif_tiff(ifd0, exif)));
    out.extend(&jpeg[2..]);
    out
}
