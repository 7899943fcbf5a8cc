//! Text layer rendering.
//!
//! Text is rendered in two passes: the first traces glyph coverage only to
//! find the tight ink box, the second draws coverage masks into a layer sized
//! from that box plus the stroke halo and shadow offset. Masks are then
//! painted shadow first, stroke second and fill last.

use image::{GrayImage, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use std::path::PathBuf;
use tracing::trace;

use super::{MAX_LAYER_SIDE, WatermarkError};
use super::color::ColorSpec;
use super::compositor::paint_mask;
use super::font::Typeface;
use super::rotate::rotate_layer;

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Preferred font file; the resolver falls back when it cannot be used
    pub font_path: Option<PathBuf>,
    /// Font size in pixels
    pub font_size: f32,
    pub fill: ColorSpec,
    /// Halo width in pixels, 0 disables the stroke pass
    pub stroke_width: u32,
    pub stroke: ColorSpec,
    /// Shadow displacement in pixels, (0, 0) disables the shadow pass
    pub shadow_offset: (i32, i32),
    pub shadow: ColorSpec,
    /// Counter-clockwise rotation in degrees
    pub rotation: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_path: None,
            font_size: 32.0,
            fill: ColorSpec::new("#FFFFFF", 1.0),
            stroke_width: 0,
            stroke: ColorSpec::new("#000000", 1.0),
            shadow_offset: (0, 0),
            shadow: ColorSpec::new("#000000", 0.5),
            rotation: 0.0,
        }
    }
}

/// Tight box around inked pixels, in pen coordinates. `right` and `bottom`
/// are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InkBounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl InkBounds {
    pub fn width(&self) -> u32 {
        (self.right - self.left) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top) as u32
    }
}

fn quantize(coverage: f32) -> u8 {
    (coverage.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Measuring pass: trace the text and return the box around every pixel
/// that would receive ink, or `None` when nothing would.
pub fn measure(face: &Typeface, text: &str, font_size: f32) -> Option<InkBounds> {
    let mut bounds: Option<InkBounds> = None;

    face.trace(text, font_size, &mut |x, y, coverage| {
        if quantize(coverage) == 0 {
            return;
        }
        bounds = Some(match bounds {
            None => InkBounds {
                left: x,
                top: y,
                right: x + 1,
                bottom: y + 1,
            },
            Some(b) => InkBounds {
                left: b.left.min(x),
                top: b.top.min(y),
                right: b.right.max(x + 1),
                bottom: b.bottom.max(y + 1),
            },
        });
    });

    bounds
}

/// Drawing pass: rasterize coverage into a mask with the ink box's top-left
/// corner at `origin`.
fn rasterize(
    face: &Typeface,
    text: &str,
    font_size: f32,
    bounds: InkBounds,
    size: (u32, u32),
    origin: (i32, i32),
) -> GrayImage {
    let mut mask = GrayImage::new(size.0, size.1);
    let (width, height) = (size.0 as i32, size.1 as i32);

    face.trace(text, font_size, &mut |x, y, coverage| {
        let px = x - bounds.left + origin.0;
        let py = y - bounds.top + origin.1;
        if px < 0 || py < 0 || px >= width || py >= height {
            return;
        }
        let value = quantize(coverage);
        let pixel = mask.get_pixel_mut(px as u32, py as u32);
        if value > pixel[0] {
            pixel[0] = value;
        }
    });

    mask
}

/// Render `text` into a standalone transparent layer sized to its content.
///
/// Text with no ink (empty or whitespace only) yields a 1x1 transparent layer.
pub fn render_text_layer(
    text: &str,
    style: &TextStyle,
    face: &Typeface,
) -> Result<RgbaImage, WatermarkError> {
    let fill = style.fill.resolve()?;
    let stroke = style.stroke.resolve()?;
    let shadow = style.shadow.resolve()?;

    if !style.font_size.is_finite() || style.font_size <= 0.0 {
        return Err(WatermarkError::RenderFailure(format!(
            "font size must be positive, got {}",
            style.font_size
        )));
    }

    let bounds = if text.is_empty() {
        None
    } else {
        measure(face, text, style.font_size)
    };
    let Some(bounds) = bounds else {
        trace!("Text {:?} has no ink, using empty layer", text);
        return Ok(RgbaImage::new(1, 1));
    };

    let halo = style.stroke_width.min(u8::MAX as u32);
    let (dx, dy) = style.shadow_offset;

    let width = bounds.width() as u64 + dx.unsigned_abs() as u64 + 2 * halo as u64;
    let height = bounds.height() as u64 + dy.unsigned_abs() as u64 + 2 * halo as u64;
    if width > MAX_LAYER_SIDE as u64 || height > MAX_LAYER_SIDE as u64 {
        return Err(WatermarkError::RenderFailure(format!(
            "text layer of {}x{} exceeds the {} pixel limit",
            width, height, MAX_LAYER_SIDE
        )));
    }
    let size = (width as u32, height as u32);

    let base = (halo as i32 + (-dx).max(0), halo as i32 + (-dy).max(0));
    let mut layer = RgbaImage::new(size.0, size.1);

    if (dx, dy) != (0, 0) {
        let offset = (base.0 + dx, base.1 + dy);
        let mut shadow_mask = rasterize(face, text, style.font_size, bounds, size, offset);
        if halo > 0 {
            shadow_mask = dilate(&shadow_mask, Norm::LInf, halo as u8);
        }
        paint_mask(&mut layer, &shadow_mask, shadow);
    }

    let fill_mask = rasterize(face, text, style.font_size, bounds, size, base);
    if halo > 0 {
        let stroke_mask = dilate(&fill_mask, Norm::LInf, halo as u8);
        paint_mask(&mut layer, &stroke_mask, stroke);
    }
    paint_mask(&mut layer, &fill_mask, fill);

    Ok(rotate_layer(layer, style.rotation))
}
