use image::{DynamicImage, RgbaImage, imageops::FilterType};
use std::path::Path;
use tracing::debug;

use super::{MAX_LAYER_SIDE, WatermarkError};
use super::rotate::rotate_layer;

pub const MIN_SCALE_PERCENT: u32 = 1;
pub const MAX_SCALE_PERCENT: u32 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageWatermarkStyle {
    /// Watermark width as a percentage of the destination width, clamped to
    /// `[1, 1000]`
    pub scale_percent: u32,
    /// Multiplier for the watermark's own alpha, only applied below 1.0
    pub opacity: f32,
    /// Counter-clockwise rotation in degrees
    pub rotation: f32,
}

impl Default for ImageWatermarkStyle {
    fn default() -> Self {
        Self {
            scale_percent: 20,
            opacity: 1.0,
            rotation: 0.0,
        }
    }
}

/// Load a watermark asset from disk.
pub fn load_watermark_asset(path: &Path) -> Result<DynamicImage, WatermarkError> {
    let asset = image::open(path).map_err(|e| {
        WatermarkError::InvalidWatermarkAsset(format!("{}: {}", path.display(), e))
    })?;
    ensure_non_empty(&asset)?;
    Ok(asset)
}

/// Decode a watermark asset from an in-memory buffer.
pub fn decode_watermark_asset(bytes: &[u8]) -> Result<DynamicImage, WatermarkError> {
    let asset = image::load_from_memory(bytes)
        .map_err(|e| WatermarkError::InvalidWatermarkAsset(e.to_string()))?;
    ensure_non_empty(&asset)?;
    Ok(asset)
}

fn ensure_non_empty(asset: &DynamicImage) -> Result<(), WatermarkError> {
    if asset.width() == 0 || asset.height() == 0 {
        return Err(WatermarkError::InvalidWatermarkAsset(format!(
            "watermark has zero area ({}x{})",
            asset.width(),
            asset.height()
        )));
    }
    Ok(())
}

/// Target size for a watermark scaled relative to the destination width.
/// The watermark keeps its own aspect ratio and each side is at least 1px.
pub fn scaled_size(destination_width: u32, asset: (u32, u32), scale_percent: u32) -> (u32, u32) {
    let percent = scale_percent.clamp(MIN_SCALE_PERCENT, MAX_SCALE_PERCENT) as u64;
    let width = (destination_width as u64 * percent / 100).max(1);
    let height = (width * asset.1 as u64 / asset.0.max(1) as u64).max(1);
    (
        width.min(u32::MAX as u64) as u32,
        height.min(u32::MAX as u64) as u32,
    )
}

/// Build the transparent layer for an image watermark.
pub fn render_image_layer(
    asset: &DynamicImage,
    destination_width: u32,
    style: &ImageWatermarkStyle,
) -> Result<RgbaImage, WatermarkError> {
    ensure_non_empty(asset)?;

    let (width, height) = scaled_size(
        destination_width,
        (asset.width(), asset.height()),
        style.scale_percent,
    );
    debug!(
        "Scaling watermark {}x{} to {}x{}",
        asset.width(),
        asset.height(),
        width,
        height
    );
    if width > MAX_LAYER_SIDE || height > MAX_LAYER_SIDE {
        return Err(WatermarkError::RenderFailure(format!(
            "watermark layer of {}x{} exceeds the {} pixel limit",
            width, height, MAX_LAYER_SIDE
        )));
    }

    let mut layer = if (width, height) == (asset.width(), asset.height()) {
        asset.to_rgba8()
    } else {
        image::imageops::resize(&asset.to_rgba8(), width, height, FilterType::Lanczos3)
    };

    apply_opacity(&mut layer, style.opacity);

    Ok(rotate_layer(layer, style.rotation))
}

/// Scale every pixel's alpha by `opacity`. Opacity of 1.0 or more leaves the
/// asset's own alpha untouched.
pub fn apply_opacity(layer: &mut RgbaImage, opacity: f32) {
    if opacity >= 1.0 {
        return;
    }
    let factor = opacity.clamp(0.0, 1.0);
    for pixel in layer.pixels_mut() {
        pixel[3] = (pixel[3] as f32 * factor).round().clamp(0.0, 255.0) as u8;
    }
}
