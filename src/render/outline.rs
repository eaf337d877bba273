//! Outline clipping for the indicator widget.

use tracing::debug;

use crate::config::{BlurConfig, FALLBACK_BLUR_RADIUS, MIN_BLUR_RADIUS};
use crate::error::Error;
use crate::geometry::Rect;
use crate::processing::color::Argb;
use crate::render::canvas::Canvas;
use crate::render::controller::RenderController;

/// Width of the fallback outline stroke in pixels.
pub const OUTLINE_STROKE_WIDTH: f32 = 2.0;

/// Stroke-only outline used until a blur is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeOutline {
    color: Argb,
    clipping: bool,
}

impl Default for StrokeOutline {
    fn default() -> Self {
        Self {
            color: Argb::BLACK,
            clipping: true,
        }
    }
}

impl StrokeOutline {
    fn draw(&self, canvas: &mut dyn Canvas) -> bool {
        if !self.clipping {
            return false;
        }
        let (width, height) = canvas.size();
        canvas.stroke_rect(
            Rect::new(0, 0, width, height),
            self.color,
            OUTLINE_STROKE_WIDTH,
        );
        true
    }
}

#[derive(Debug)]
pub enum Outline {
    Stroke(StrokeOutline),
    Blur(RenderController),
}

/// Drives the indicator's outline: a plain stroke, or a blurred backdrop
/// once [`OutlineClipAdapter::configure`] has run.
#[derive(Debug)]
pub struct OutlineClipAdapter {
    outline: Outline,
    color: Argb,
}

impl Default for OutlineClipAdapter {
    fn default() -> Self {
        Self {
            outline: Outline::Stroke(StrokeOutline::default()),
            color: Argb::TRANSPARENT,
        }
    }
}

impl OutlineClipAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    pub fn controller(&self) -> Option<&RenderController> {
        match &self.outline {
            Outline::Blur(controller) => Some(controller),
            Outline::Stroke(_) => None,
        }
    }

    pub fn set_outline_color(&mut self, color: Argb) -> Result<(), Error> {
        self.color = color;
        match &mut self.outline {
            Outline::Stroke(stroke) => {
                stroke.color = color;
                Ok(())
            }
            Outline::Blur(controller) => controller.set_overlay_color(color),
        }
    }

    /// Toggle clipping. For the blurred outline this also toggles the blur
    /// and its auto-update.
    pub fn enable_clipping(&mut self, enabled: bool) -> Result<(), Error> {
        match &mut self.outline {
            Outline::Stroke(stroke) => {
                stroke.clipping = enabled;
                Ok(())
            }
            Outline::Blur(controller) => {
                controller.enable(enabled)?;
                controller.set_auto_update(enabled)
            }
        }
    }

    pub fn enable_auto_update(&mut self, enabled: bool) -> Result<(), Error> {
        match &mut self.outline {
            Outline::Stroke(_) => Ok(()),
            Outline::Blur(controller) => controller.set_auto_update(enabled),
        }
    }

    /// Re-measure after the indicator changed size.
    pub fn prepare(&mut self) -> Result<(), Error> {
        match &mut self.outline {
            Outline::Stroke(_) => Ok(()),
            Outline::Blur(controller) => controller.update(),
        }
    }

    /// Returns whether the indicator should draw its own content.
    pub fn draw(&self, canvas: &mut dyn Canvas) -> Result<bool, Error> {
        match &self.outline {
            Outline::Stroke(stroke) => Ok(stroke.draw(canvas)),
            Outline::Blur(controller) => controller.draw(canvas),
        }
    }

    pub fn destroy(&mut self) -> Result<(), Error> {
        match &mut self.outline {
            Outline::Stroke(_) => Ok(()),
            Outline::Blur(controller) => controller.destroy(),
        }
    }

    /// Replace the current outline with a blurred indicator.
    pub fn configure(&mut self, config: &BlurConfig) -> Result<(), Error> {
        self.configure_with_radius(config, Some(config.options.blur_radius))
    }

    /// As [`configure`](Self::configure), with `None` selecting the
    /// indicator's own default radius.
    pub fn configure_with_radius(
        &mut self,
        config: &BlurConfig,
        radius: Option<f32>,
    ) -> Result<(), Error> {
        // The outline being replaced never sees the new color.
        if let Some(color) = config.options.overlay_color {
            self.color = color;
        }
        let radius = radius.unwrap_or(FALLBACK_BLUR_RADIUS).max(MIN_BLUR_RADIUS);

        if let Outline::Blur(previous) = &mut self.outline {
            if !previous.is_destroyed() {
                previous.destroy()?;
            }
        }
        let mut indicator_config = config.clone();
        indicator_config.options.blur_radius = radius;
        indicator_config.options.overlay_color = Some(self.color);
        let controller = RenderController::indicator(&indicator_config);
        debug!(radius, clip = config.options.clip_to_boundary, "configured blur indicator");
        self.outline = Outline::Blur(controller);

        self.enable_clipping(config.options.clip_to_boundary)?;
        self.enable_auto_update(true)
    }

    /// Resume auto-update when attached to an accelerated surface.
    pub fn on_attached(&mut self, hardware_accelerated: bool) -> Result<(), Error> {
        if hardware_accelerated {
            self.enable_auto_update(true)?;
        }
        Ok(())
    }

    pub fn on_detached(&mut self) -> Result<(), Error> {
        self.enable_auto_update(false)
    }

    pub fn on_size_changed(&mut self) -> Result<(), Error> {
        self.prepare()
    }
}
