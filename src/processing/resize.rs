use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::RgbaImage;

/// Source-space rectangle to sample from, in (fractional) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceCrop {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SourceCrop {
    /// Clamp the crop to the bounds of a `width`×`height` image.
    fn clamped(self, width: u32, height: u32) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));
        let left = self.left.clamp(0.0, w);
        let top = self.top.clamp(0.0, h);
        Self {
            left,
            top,
            width: self.width.clamp(0.0, w - left),
            height: self.height.clamp(0.0, h - top),
        }
    }

    fn is_whole(&self, width: u32, height: u32) -> bool {
        self.left == 0.0
            && self.top == 0.0
            && self.width == f64::from(width)
            && self.height == f64::from(height)
    }
}

/// Nearest-neighbour resize of `source` (or the `crop` of it) to
/// `target_w`×`target_h`.
pub fn resize_nearest(
    source: &RgbaImage,
    crop: Option<SourceCrop>,
    target_w: u32,
    target_h: u32,
) -> Result<RgbaImage> {
    if target_w == 0 || target_h == 0 {
        anyhow::bail!("resize dimensions must be positive");
    }
    let crop = crop.map(|crop| crop.clamped(source.width(), source.height()));
    let whole = crop.is_none_or(|crop| crop.is_whole(source.width(), source.height()));
    if whole && source.dimensions() == (target_w, target_h) {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for nearest resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let mut options = fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Nearest);
    if let Some(crop) = crop.filter(|_| !whole) {
        options = options.crop(crop.left, crop.top, crop.width, crop.height);
    }
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("nearest resize failed")?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| anyhow::anyhow!("failed to construct resized RGBA image"))
}
