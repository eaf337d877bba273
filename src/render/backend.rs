use std::fmt;
use std::rc::Rc;

use image::RgbaImage;
use tracing::debug;

use crate::geometry::Transform;
use crate::processing::blur::{stack_blur, BlurScratch};
use crate::render::canvas::Canvas;

/// Opaque handle to a blur layer retained by the host compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerHandle(pub u64);

/// Host capability for hardware-composited blur.
///
/// `blur_available` is queried when a backend is selected and again on every
/// draw, since surface acceleration can change while the pipeline runs.
pub trait Compositor {
    fn blur_available(&self) -> bool;

    fn supports_radius(&self, radius: f32) -> bool {
        let _ = radius;
        true
    }

    /// Record `raster` into a layer that the compositor blurs at draw time.
    fn record_blur(&self, raster: &RgbaImage, radius: f32) -> anyhow::Result<LayerHandle>;

    fn release(&self, layer: LayerHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Software,
    Compositor,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Software => "software",
            Self::Compositor => "compositor",
        })
    }
}

/// Blur strategy for one pipeline.
///
/// Chosen once from the compositor capability; the compositor variant still
/// re-checks on every blur and draw and falls back to the software path.
pub enum BlurBackend {
    Software(SoftwareBlur),
    Compositor(CompositorBlur),
}

impl fmt::Debug for BlurBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BlurBackend").field(&self.kind()).finish()
    }
}

impl BlurBackend {
    pub fn select(compositor: Option<Rc<dyn Compositor>>) -> Self {
        match compositor {
            Some(compositor) if compositor.blur_available() => {
                debug!("selected compositor blur backend");
                Self::Compositor(CompositorBlur::new(compositor))
            }
            _ => {
                debug!("selected software blur backend");
                Self::Software(SoftwareBlur::default())
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Software(_) => BackendKind::Software,
            Self::Compositor(_) => BackendKind::Compositor,
        }
    }

    /// Blur `raster` or record it for compositor blurring.
    pub fn blur(&mut self, raster: &mut RgbaImage, radius: f32) -> anyhow::Result<()> {
        match self {
            Self::Software(software) => {
                software.blur(raster, radius);
                Ok(())
            }
            Self::Compositor(compositor) => compositor.blur(raster, radius),
        }
    }

    pub fn draw_blurred(
        &mut self,
        canvas: &mut dyn Canvas,
        raster: &mut RgbaImage,
        transform: Transform,
    ) -> anyhow::Result<()> {
        match self {
            Self::Software(software) => software.draw_blurred(canvas, raster, transform),
            Self::Compositor(compositor) => compositor.draw_blurred(canvas, raster, transform),
        }
    }

    /// Release retained compositor layers and scratch memory.
    pub fn destroy(&mut self) {
        match self {
            Self::Software(software) => software.destroy(),
            Self::Compositor(compositor) => compositor.destroy(),
        }
    }
}

/// CPU stack blur with scratch buffers reused across frames.
#[derive(Debug, Default)]
pub struct SoftwareBlur {
    scratch: BlurScratch,
}

impl SoftwareBlur {
    pub fn blur(&mut self, raster: &mut RgbaImage, radius: f32) {
        stack_blur(raster, radius.max(0.0) as u32, &mut self.scratch);
    }

    pub fn draw_blurred(
        &self,
        canvas: &mut dyn Canvas,
        raster: &RgbaImage,
        transform: Transform,
    ) -> anyhow::Result<()> {
        canvas.draw_image(raster, transform)
    }

    pub fn scratch(&self) -> &BlurScratch {
        &self.scratch
    }

    pub fn destroy(&mut self) {
        self.scratch = BlurScratch::default();
    }
}

pub struct CompositorBlur {
    compositor: Rc<dyn Compositor>,
    layer: Option<LayerHandle>,
    radius: f32,
    // Set once the raster itself holds blurred pixels.
    software_applied: bool,
    fallback: SoftwareBlur,
}

impl CompositorBlur {
    pub fn new(compositor: Rc<dyn Compositor>) -> Self {
        Self {
            compositor,
            layer: None,
            radius: 1.0,
            software_applied: false,
            fallback: SoftwareBlur::default(),
        }
    }

    pub fn layer(&self) -> Option<LayerHandle> {
        self.layer
    }

    fn blur(&mut self, raster: &mut RgbaImage, radius: f32) -> anyhow::Result<()> {
        self.radius = radius;
        if !self.compositor.blur_available() || !self.compositor.supports_radius(radius) {
            debug!(radius, "compositor blur unavailable, blurring in software");
            self.release_layer();
            self.fallback.blur(raster, radius);
            self.software_applied = true;
            return Ok(());
        }
        let layer = self.compositor.record_blur(raster, radius)?;
        if let Some(previous) = self.layer.replace(layer) {
            if previous != layer {
                self.compositor.release(previous);
            }
        }
        self.software_applied = false;
        Ok(())
    }

    fn draw_blurred(
        &mut self,
        canvas: &mut dyn Canvas,
        raster: &mut RgbaImage,
        transform: Transform,
    ) -> anyhow::Result<()> {
        if canvas.is_hardware_accelerated() && self.compositor.blur_available() {
            if let Some(layer) = self.layer {
                return canvas.draw_layer(layer, transform);
            }
        }
        if !self.software_applied {
            debug!("compositor path unavailable at draw time, falling back to software blur");
            self.fallback.blur(raster, self.radius);
            self.software_applied = true;
        }
        self.fallback.draw_blurred(canvas, raster, transform)
    }

    fn release_layer(&mut self) {
        if let Some(layer) = self.layer.take() {
            self.compositor.release(layer);
        }
    }

    fn destroy(&mut self) {
        self.release_layer();
        self.fallback.destroy();
    }
}
