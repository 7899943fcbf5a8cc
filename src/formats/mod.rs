pub mod jpeg;
pub mod png;

use image::{DynamicImage, ImageFormat};
use std::path::Path;

use crate::OutputFormatChoice;
use crate::batch::BatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
        }
    }

    /// Resolve the configured choice for one source file.
    pub fn for_source(choice: OutputFormatChoice, source: &Path) -> Self {
        match choice {
            OutputFormatChoice::Jpeg => OutputFormat::Jpeg,
            OutputFormatChoice::Png => OutputFormat::Png,
            // PNG sources stay PNG to keep transparency and lossless pixels
            OutputFormatChoice::Auto if is_png(source) => OutputFormat::Png,
            OutputFormatChoice::Auto => OutputFormat::Jpeg,
        }
    }
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

/// Whether `path` names a JPEG by extension.
pub fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
}

/// Encode `image` to `path`. `exif` is an APP1 segment to carry over and is
/// only honored for JPEG output.
pub fn save_image(
    image: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    jpeg_quality: u8,
    exif: Option<&[u8]>,
) -> Result<(), BatchError> {
    match format {
        OutputFormat::Jpeg => jpeg::save_with_exif(image, path, jpeg_quality, exif),
        OutputFormat::Png => png::save(image, path),
    }
}
