use image::{DynamicImage, codecs::png::PngEncoder};
use std::path::Path;

use crate::batch::BatchError;

/// Save image as PNG
pub fn save(image: &DynamicImage, path: &Path) -> Result<(), BatchError> {
    let output = std::io::BufWriter::new(std::fs::File::create(path)?);
    let encoder = PngEncoder::new(output);
    image.write_with_encoder(encoder)?;
    Ok(())
}
