//! Drawing surfaces.
//!
//! [`Canvas`] is the contract hosts implement for their own surfaces.
//! [`RasterCanvas`] paints into an owned image; [`CaptureCanvas`] is the
//! raster-backed surface the snapshot pass hands to the source subtree, and
//! is the only surface that reports [`Canvas::is_capture`].

use anyhow::bail;
use image::{imageops, Pixel, RgbaImage};

use crate::geometry::{Rect, Transform};
use crate::processing::color::Argb;
use crate::processing::resize::{resize_nearest, SourceCrop};
use crate::render::backend::LayerHandle;

pub trait Canvas {
    /// Surface size in device pixels.
    fn size(&self) -> (u32, u32);

    /// True only for the snapshot capture surface.
    fn is_capture(&self) -> bool {
        false
    }

    /// Whether compositor layers can be drawn onto this surface right now.
    fn is_hardware_accelerated(&self) -> bool {
        false
    }

    /// Blend `color` over the whole surface.
    fn fill(&mut self, color: Argb);

    fn fill_rect(&mut self, rect: Rect, color: Argb);

    /// Stroke the inside edge of `rect` with a line `width` pixels wide.
    fn stroke_rect(&mut self, rect: Rect, color: Argb, width: f32);

    /// Draw `image` with its pixel grid mapped through `transform`.
    fn draw_image(&mut self, image: &RgbaImage, transform: Transform) -> anyhow::Result<()>;

    /// Draw a compositor-owned blur layer.
    fn draw_layer(&mut self, layer: LayerHandle, transform: Transform) -> anyhow::Result<()> {
        let _ = transform;
        bail!("surface cannot composite layer {layer:?}")
    }
}

/// Ordinary software surface backed by an owned image.
#[derive(Debug, Clone)]
pub struct RasterCanvas {
    image: RgbaImage,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl Canvas for RasterCanvas {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn fill(&mut self, color: Argb) {
        fill_all(&mut self.image, color);
    }

    fn fill_rect(&mut self, rect: Rect, color: Argb) {
        paint_rect(&mut self.image, Transform::IDENTITY, rect, color);
    }

    fn stroke_rect(&mut self, rect: Rect, color: Argb, width: f32) {
        paint_stroke(&mut self.image, Transform::IDENTITY, rect, color, width);
    }

    fn draw_image(&mut self, image: &RgbaImage, transform: Transform) -> anyhow::Result<()> {
        paint_image(&mut self.image, image, transform)
    }
}

/// Surface that renders a source subtree into a snapshot raster.
///
/// Every draw is mapped through the capture transform, which places the
/// subtree's coordinate space onto the downsampled raster.
pub struct CaptureCanvas<'a> {
    target: &'a mut RgbaImage,
    base: Transform,
}

impl<'a> CaptureCanvas<'a> {
    pub fn new(target: &'a mut RgbaImage, base: Transform) -> Self {
        Self { target, base }
    }

    pub fn transform(&self) -> Transform {
        self.base
    }
}

impl Canvas for CaptureCanvas<'_> {
    fn size(&self) -> (u32, u32) {
        self.target.dimensions()
    }

    fn is_capture(&self) -> bool {
        true
    }

    fn fill(&mut self, color: Argb) {
        fill_all(self.target, color);
    }

    fn fill_rect(&mut self, rect: Rect, color: Argb) {
        paint_rect(self.target, self.base, rect, color);
    }

    fn stroke_rect(&mut self, rect: Rect, color: Argb, width: f32) {
        paint_stroke(self.target, self.base, rect, color, width);
    }

    fn draw_image(&mut self, image: &RgbaImage, transform: Transform) -> anyhow::Result<()> {
        paint_image(self.target, image, transform.then(self.base))
    }
}

fn fill_all(target: &mut RgbaImage, color: Argb) {
    if color.is_transparent() {
        return;
    }
    let src = color.to_rgba();
    target.pixels_mut().for_each(|pixel| pixel.blend(&src));
}

/// Device-space pixel span covered by `[x0, x1)` after rounding, clamped to
/// `[0, limit)`.
fn span(a: f32, b: f32, limit: u32) -> (u32, u32) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let lo = lo.round().clamp(0.0, limit as f32) as u32;
    let hi = hi.round().clamp(0.0, limit as f32) as u32;
    (lo, hi)
}

fn paint_rect(target: &mut RgbaImage, base: Transform, rect: Rect, color: Argb) {
    if rect.is_empty() || color.is_transparent() {
        return;
    }
    let (x0, y0) = base.apply(rect.x as f32, rect.y as f32);
    let (x1, y1) = base.apply(
        rect.x as f32 + rect.width as f32,
        rect.y as f32 + rect.height as f32,
    );
    let (left, right) = span(x0, x1, target.width());
    let (top, bottom) = span(y0, y1, target.height());
    let src = color.to_rgba();
    for y in top..bottom {
        for x in left..right {
            target.get_pixel_mut(x, y).blend(&src);
        }
    }
}

fn paint_stroke(target: &mut RgbaImage, base: Transform, rect: Rect, color: Argb, width: f32) {
    if rect.is_empty() || width <= 0.0 {
        return;
    }
    let line = (width.round() as u32).clamp(1, rect.width.min(rect.height));
    let Rect {
        x,
        y,
        width: w,
        height: h,
    } = rect;
    let inner_h = h.saturating_sub(line * 2);
    let edges = [
        Rect::new(x, y, w, line),
        Rect::new(x, y + (h - line) as i32, w, line),
        Rect::new(x, y + line as i32, line, inner_h),
        Rect::new(x + (w - line) as i32, y + line as i32, line, inner_h),
    ];
    for edge in edges {
        paint_rect(target, base, edge, color);
    }
}

/// Nearest-neighbour draw of `image` mapped through `transform`.
///
/// Only the part of `image` that lands on `target` is resampled, then
/// blended in place at its rounded device offset.
fn paint_image(target: &mut RgbaImage, image: &RgbaImage, transform: Transform) -> anyhow::Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Ok(());
    }
    let Some(inverse) = transform.invert() else {
        return Ok(());
    };
    let (x0, y0) = transform.apply(0.0, 0.0);
    let (x1, y1) = transform.apply(image.width() as f32, image.height() as f32);
    let (left, right) = span(x0, x1, target.width());
    let (top, bottom) = span(y0, y1, target.height());
    if left >= right || top >= bottom {
        return Ok(());
    }
    let (u0, v0) = inverse.apply(left as f32, top as f32);
    let (u1, v1) = inverse.apply(right as f32, bottom as f32);
    let crop = SourceCrop {
        left: f64::from(u0.min(u1)),
        top: f64::from(v0.min(v1)),
        width: f64::from((u1 - u0).abs()),
        height: f64::from((v1 - v0).abs()),
    };
    let mut visible = resize_nearest(image, Some(crop), right - left, bottom - top)?;
    if x1 < x0 {
        imageops::flip_horizontal_in_place(&mut visible);
    }
    if y1 < y0 {
        imageops::flip_vertical_in_place(&mut visible);
    }
    imageops::overlay(target, &visible, i64::from(left), i64::from(top));
    Ok(())
}
