use image::{Rgba, RgbaImage, imageops};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

/// Rotate a layer counter-clockwise by `degrees` about its center.
///
/// The canvas grows to the rotated bounding box so no corner is clipped.
/// Angles that normalise to 0 (0, 360, -720, ...) return the layer unchanged.
pub fn rotate_layer(layer: RgbaImage, degrees: f32) -> RgbaImage {
    let normalized = degrees.rem_euclid(360.0);
    if normalized.abs() < f32::EPSILON || (360.0 - normalized).abs() < 1e-4 {
        return layer;
    }

    let (layer_w, layer_h) = layer.dimensions();
    let (width, height) = expanded_size(layer_w, layer_h, normalized);
    let work_w = width.max(layer_w);
    let work_h = height.max(layer_h);

    // Interpolating straight alpha bleeds the transparent black border into
    // glyph edges, so rotate premultiplied samples instead.
    let mut canvas = RgbaImage::new(work_w, work_h);
    imageops::replace(
        &mut canvas,
        &premultiply(layer),
        ((work_w - layer_w) / 2) as i64,
        ((work_h - layer_h) / 2) as i64,
    );

    let theta = -normalized.to_radians();
    let rotated = rotate_about_center(&canvas, theta, Interpolation::Bicubic, Rgba([0, 0, 0, 0]));
    let cropped = imageops::crop_imm(
        &rotated,
        (work_w - width) / 2,
        (work_h - height) / 2,
        width,
        height,
    )
    .to_image();

    unpremultiply(cropped)
}

/// Size of the axis-aligned box that holds a `width` x `height` rectangle
/// rotated by `degrees`.
pub fn expanded_size(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let radians = (degrees as f64).to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    let (w, h) = (width as f64, height as f64);

    // Trim float noise so 90 degrees does not round up a full pixel.
    let rotated_w = (w * cos + h * sin - 1e-6).ceil().max(1.0) as u32;
    let rotated_h = (w * sin + h * cos - 1e-6).ceil().max(1.0) as u32;

    (rotated_w, rotated_h)
}

fn premultiply(mut image: RgbaImage) -> RgbaImage {
    for pixel in image.pixels_mut() {
        let alpha = pixel[3] as u32;
        for channel in 0..3 {
            pixel[channel] = ((pixel[channel] as u32 * alpha + 127) / 255) as u8;
        }
    }
    image
}

fn unpremultiply(mut image: RgbaImage) -> RgbaImage {
    for pixel in image.pixels_mut() {
        let alpha = pixel[3] as u32;
        if alpha == 0 {
            *pixel = Rgba([0, 0, 0, 0]);
            continue;
        }
        for channel in 0..3 {
            pixel[channel] = ((pixel[channel] as u32 * 255 + alpha / 2) / alpha).min(255) as u8;
        }
    }
    image
}
