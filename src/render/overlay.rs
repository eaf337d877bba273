//! Renderer slot of the frosted overlay panel.

use tracing::{debug, info};

use crate::config::{clamp_radius, BlurConfig, FALLBACK_BLUR_RADIUS};
use crate::error::Error;
use crate::processing::color::Argb;
use crate::render::canvas::Canvas;
use crate::render::controller::RenderController;

#[derive(Debug, Default)]
pub enum OverlayRenderer {
    /// Draws nothing and lets the panel's content through.
    #[default]
    NoOp,
    Blur(RenderController),
}

/// Owns whichever renderer the overlay panel currently uses.
#[derive(Debug, Default)]
pub struct OverlayBlur {
    renderer: OverlayRenderer,
    overlay: Argb,
    clip_to_boundary: bool,
}

impl OverlayBlur {
    pub fn new(overlay: Argb) -> Self {
        Self {
            overlay,
            ..Self::default()
        }
    }

    pub fn renderer(&self) -> &OverlayRenderer {
        &self.renderer
    }

    pub fn controller(&self) -> Option<&RenderController> {
        match &self.renderer {
            OverlayRenderer::Blur(controller) => Some(controller),
            OverlayRenderer::NoOp => None,
        }
    }

    pub fn overlay_color(&self) -> Argb {
        self.overlay
    }

    /// Whether the last fallback setup asked for outline clipping.
    pub fn clips_to_boundary(&self) -> bool {
        self.clip_to_boundary
    }

    /// Apply `config` to the panel.
    ///
    /// An existing blur is recolored and re-measured. Without one, a
    /// software fallback is set up unless `fallback_enabled` is off, in
    /// which case the panel stays a pass-through.
    pub fn configure(&mut self, config: &BlurConfig) -> Result<(), Error> {
        if let Some(color) = config.options.overlay_color {
            self.overlay = color;
        }
        match &mut self.renderer {
            OverlayRenderer::Blur(controller) => {
                controller.set_overlay_color(self.overlay)?;
                controller.update()
            }
            OverlayRenderer::NoOp if !config.options.fallback_enabled => {
                info!("fallback blur disabled, overlay stays unblurred");
                Ok(())
            }
            OverlayRenderer::NoOp => {
                self.setup_with_fallback(config, Some(config.options.blur_radius))
            }
        }
    }

    /// Swap in an overlay controller with the radius clamped to the
    /// supported range. `None` picks the fallback default.
    pub fn setup_with_fallback(
        &mut self,
        config: &BlurConfig,
        requested_radius: Option<f32>,
    ) -> Result<(), Error> {
        let radius = clamp_radius(requested_radius.unwrap_or(FALLBACK_BLUR_RADIUS));
        self.release()?;
        let mut fallback = config.clone();
        fallback.options.blur_radius = radius;
        fallback.options.overlay_color = Some(self.overlay);
        self.renderer = OverlayRenderer::Blur(RenderController::overlay(&fallback));
        self.clip_to_boundary = config.options.clip_to_boundary;
        debug!(radius, clip = self.clip_to_boundary, "overlay fallback blur ready");
        Ok(())
    }

    /// Swap in an overlay controller that uses `config` as given.
    pub fn attach_to_root(&mut self, config: &BlurConfig) -> Result<(), Error> {
        self.release()?;
        let mut attached = config.clone();
        attached.options.overlay_color = Some(self.overlay);
        self.renderer = OverlayRenderer::Blur(RenderController::overlay(&attached));
        Ok(())
    }

    pub fn set_auto_update(&mut self, auto_update: bool) -> Result<(), Error> {
        match &mut self.renderer {
            OverlayRenderer::Blur(controller) => controller.set_auto_update(auto_update),
            OverlayRenderer::NoOp => Ok(()),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), Error> {
        match &mut self.renderer {
            OverlayRenderer::Blur(controller) => controller.enable(enabled),
            OverlayRenderer::NoOp => Ok(()),
        }
    }

    pub fn set_radius(&mut self, radius: f32) -> Result<(), Error> {
        match &mut self.renderer {
            OverlayRenderer::Blur(controller) => controller.set_radius(radius),
            OverlayRenderer::NoOp => Ok(()),
        }
    }

    pub fn set_overlay_color(&mut self, color: Argb) -> Result<(), Error> {
        self.overlay = color;
        match &mut self.renderer {
            OverlayRenderer::Blur(controller) => controller.set_overlay_color(color),
            OverlayRenderer::NoOp => Ok(()),
        }
    }

    /// Returns whether the panel should draw its own content.
    pub fn draw(&self, canvas: &mut dyn Canvas) -> Result<bool, Error> {
        match &self.renderer {
            OverlayRenderer::Blur(controller) => controller.draw(canvas),
            OverlayRenderer::NoOp => Ok(true),
        }
    }

    pub fn on_detached(&mut self) -> Result<(), Error> {
        self.set_auto_update(false)
    }

    pub fn on_size_changed(&mut self) -> Result<(), Error> {
        match &mut self.renderer {
            OverlayRenderer::Blur(controller) => controller.update(),
            OverlayRenderer::NoOp => Ok(()),
        }
    }

    fn release(&mut self) -> Result<(), Error> {
        if let OverlayRenderer::Blur(controller) = &mut self.renderer {
            if !controller.is_destroyed() {
                controller.destroy()?;
            }
        }
        self.renderer = OverlayRenderer::NoOp;
        Ok(())
    }
}
