use image::{DynamicImage, imageops::FilterType};
use std::fmt;
use tracing::debug;

use super::{MAX_LAYER_SIDE, WatermarkError};

/// Optional resize applied to the destination before watermarking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeSpec {
    #[default]
    None,
    /// Explicit width, height follows the aspect ratio
    Width(u32),
    /// Explicit height, width follows the aspect ratio
    Height(u32),
    /// Uniform scale
    Percent(u32),
}

impl ResizeSpec {
    /// Parse a resize mode name (`none`, `width`, `height`, `percent`)
    /// and a value. The value is ignored for `none`.
    pub fn from_mode(mode: &str, value: i64) -> Result<Self, WatermarkError> {
        let mode = mode.trim().to_ascii_lowercase();
        if mode == "none" {
            return Ok(ResizeSpec::None);
        }

        let value = u32::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| {
                WatermarkError::InvalidResizeSpec(format!(
                    "{} value must be a positive integer, got {}",
                    mode, value
                ))
            })?;

        match mode.as_str() {
            "width" => Ok(ResizeSpec::Width(value)),
            "height" => Ok(ResizeSpec::Height(value)),
            "percent" => Ok(ResizeSpec::Percent(value)),
            other => Err(WatermarkError::InvalidResizeSpec(format!(
                "unknown resize mode '{}'",
                other
            ))),
        }
    }

    /// Dimensions an image of `width` x `height` ends up with.
    ///
    /// Growing a side past [`MAX_LAYER_SIDE`] is refused. Inputs that are
    /// already that large may keep their size.
    pub fn target_size(&self, width: u32, height: u32) -> Result<(u32, u32), WatermarkError> {
        if width == 0 || height == 0 {
            return Err(WatermarkError::InvalidResizeSpec(format!(
                "cannot resize a {}x{} image",
                width, height
            )));
        }
        let (w, h) = (width as u64, height as u64);

        let (new_w, new_h) = match *self {
            ResizeSpec::None => (w, h),
            ResizeSpec::Width(target) => {
                let target = positive(target, "width")? as u64;
                (target, h * target / w)
            }
            ResizeSpec::Height(target) => {
                let target = positive(target, "height")? as u64;
                (w * target / h, target)
            }
            ResizeSpec::Percent(percent) => {
                let percent = positive(percent, "percent")? as u64;
                (w * percent / 100, h * percent / 100)
            }
        };

        if (new_w > w && new_w > MAX_LAYER_SIDE as u64) || (new_h > h && new_h > MAX_LAYER_SIDE as u64)
        {
            return Err(WatermarkError::InvalidResizeSpec(format!(
                "{} would make a {}x{} image {}x{}, over the {} pixel limit",
                self, width, height, new_w, new_h, MAX_LAYER_SIDE
            )));
        }

        Ok((clamp_side(new_w), clamp_side(new_h)))
    }
}

impl fmt::Display for ResizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResizeSpec::None => write!(f, "none"),
            ResizeSpec::Width(w) => write!(f, "width={}", w),
            ResizeSpec::Height(h) => write!(f, "height={}", h),
            ResizeSpec::Percent(p) => write!(f, "percent={}", p),
        }
    }
}

fn positive(value: u32, what: &str) -> Result<u32, WatermarkError> {
    if value == 0 {
        return Err(WatermarkError::InvalidResizeSpec(format!(
            "{} must be positive",
            what
        )));
    }
    Ok(value)
}

fn clamp_side(value: u64) -> u32 {
    value.clamp(1, u32::MAX as u64) as u32
}

/// Resize `image` according to `spec`, returning a new image.
pub fn resize(image: &DynamicImage, spec: &ResizeSpec) -> Result<DynamicImage, WatermarkError> {
    let (width, height) = (image.width(), image.height());
    let (new_w, new_h) = spec.target_size(width, height)?;

    if (new_w, new_h) == (width, height) {
        return Ok(image.clone());
    }

    debug!(
        "Resizing {}x{} to {}x{} ({})",
        width, height, new_w, new_h, spec
    );
    Ok(image.resize_exact(new_w, new_h, FilterType::Lanczos3))
}
