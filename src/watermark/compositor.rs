use image::{DynamicImage, GrayImage, Rgba, RgbaImage};

/// Porter-Duff "over" for straight (non-premultiplied) RGBA8.
///
/// A fully transparent source leaves the destination untouched.
pub fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    if src[3] == 0 {
        return;
    }
    if src[3] == 255 {
        *dst = src;
        return;
    }

    let src_alpha = src[3] as f32 / 255.0;
    let dst_alpha = dst[3] as f32 / 255.0;
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);

    let channel = |s: u8, d: u8| -> u8 {
        let value = (s as f32 * src_alpha + d as f32 * dst_alpha * (1.0 - src_alpha)) / out_alpha;
        value.round().clamp(0.0, 255.0) as u8
    };

    *dst = Rgba([
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ]);
}

/// Blend `layer` onto `target` with its top-left corner at `(x, y)`.
/// Parts of the layer outside the target are clipped.
pub fn blend_layer(target: &mut RgbaImage, layer: &RgbaImage, x: i32, y: i32) {
    let (target_w, target_h) = (target.width() as i64, target.height() as i64);
    let (x, y) = (x as i64, y as i64);

    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = (x + layer.width() as i64).min(target_w);
    let y_end = (y + layer.height() as i64).min(target_h);

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let src = *layer.get_pixel((tx - x) as u32, (ty - y) as u32);
            blend_over(target.get_pixel_mut(tx as u32, ty as u32), src);
        }
    }
}

/// Paint a coverage mask in a single color onto `target`.
pub fn paint_mask(target: &mut RgbaImage, mask: &GrayImage, color: Rgba<u8>) {
    for (x, y, coverage) in mask.enumerate_pixels() {
        let coverage = coverage[0];
        if coverage == 0 {
            continue;
        }
        let alpha = (color[3] as u32 * coverage as u32 + 127) / 255;
        let src = Rgba([color[0], color[1], color[2], alpha as u8]);
        blend_over(target.get_pixel_mut(x, y), src);
    }
}

/// Composite a rendered layer onto a copy of `destination`.
///
/// The result keeps the destination's transparency: images with an alpha
/// channel (including grey with alpha) come back as RGBA8, everything else
/// as RGB8.
pub fn composite(destination: &DynamicImage, layer: &RgbaImage, x: i32, y: i32) -> DynamicImage {
    let keep_alpha = destination.color().has_alpha();
    let mut working = destination.to_rgba8();

    blend_layer(&mut working, layer, x, y);

    if keep_alpha {
        DynamicImage::ImageRgba8(working)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(working).to_rgb8())
    }
}
