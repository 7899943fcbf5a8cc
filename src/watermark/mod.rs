// Watermark compositing engine - builds a text or image layer, places it and
// alpha-composites it onto a copy of the destination image
pub mod anchor;
mod builtin_font;
pub mod color;
pub mod compositor;
mod error;
pub mod font;
pub mod image_layer;
pub mod resize;
pub mod rotate;
pub mod text;

pub use anchor::{Anchor, AnchorCode, HorizontalAlign, Placement, VerticalAlign};
pub use color::{ColorSpec, resolve_color};
pub use error::WatermarkError;
pub use font::{BuiltinFontResolver, FontResolver, SystemFontResolver, Typeface};
pub use image_layer::{ImageWatermarkStyle, decode_watermark_asset, load_watermark_asset};
pub use resize::{ResizeSpec, resize};
pub use text::TextStyle;

use image::{DynamicImage, RgbaImage};
use std::sync::Arc;
use tracing::debug;

/// Largest side, in pixels, of any layer or resized image the engine will
/// allocate.
pub const MAX_LAYER_SIDE: u32 = 1 << 15;

/// Stateless watermark renderer.
///
/// The only thing it holds is the font resolution strategy, which is shared
/// read-only between calls and threads.
#[derive(Clone)]
pub struct Watermarker {
    fonts: Arc<dyn FontResolver>,
}

impl Default for Watermarker {
    fn default() -> Self {
        Self::new(Arc::new(SystemFontResolver::default()))
    }
}

impl std::fmt::Debug for Watermarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watermarker").finish_non_exhaustive()
    }
}

impl Watermarker {
    pub fn new(fonts: Arc<dyn FontResolver>) -> Self {
        Self { fonts }
    }

    /// Resolve the face `style` asks for. Callers rendering many images can
    /// resolve once and reuse it with
    /// [`render_text_watermark_with`](Self::render_text_watermark_with).
    pub fn typeface(&self, style: &TextStyle) -> Typeface {
        self.fonts.resolve(style.font_path.as_deref())
    }

    /// Render the standalone text layer without compositing it.
    pub fn text_layer(&self, text: &str, style: &TextStyle) -> Result<RgbaImage, WatermarkError> {
        text::render_text_layer(text, style, &self.typeface(style))
    }

    /// Draw `text` onto a copy of `destination`.
    pub fn render_text_watermark(
        &self,
        destination: &DynamicImage,
        text: &str,
        style: &TextStyle,
        placement: &Placement,
    ) -> Result<DynamicImage, WatermarkError> {
        self.render_text_watermark_with(destination, text, &self.typeface(style), style, placement)
    }

    /// Like [`render_text_watermark`](Self::render_text_watermark) with an
    /// already resolved face.
    pub fn render_text_watermark_with(
        &self,
        destination: &DynamicImage,
        text: &str,
        face: &Typeface,
        style: &TextStyle,
        placement: &Placement,
    ) -> Result<DynamicImage, WatermarkError> {
        let layer = text::render_text_layer(text, style, face)?;
        Ok(place_and_composite(destination, &layer, placement))
    }

    /// Draw a scaled copy of `asset` onto a copy of `destination`.
    pub fn render_image_watermark(
        &self,
        destination: &DynamicImage,
        asset: &DynamicImage,
        style: &ImageWatermarkStyle,
        placement: &Placement,
    ) -> Result<DynamicImage, WatermarkError> {
        let layer = image_layer::render_image_layer(asset, destination.width(), style)?;
        Ok(place_and_composite(destination, &layer, placement))
    }
}

fn place_and_composite(
    destination: &DynamicImage,
    layer: &RgbaImage,
    placement: &Placement,
) -> DynamicImage {
    let (x, y) = placement.solve(
        (destination.width(), destination.height()),
        (layer.width(), layer.height()),
    );
    debug!(
        "Compositing {}x{} layer at ({}, {})",
        layer.width(),
        layer.height(),
        x,
        y
    );
    compositor::composite(destination, layer, x, y)
}
