//! Render controller: drives snapshot capture from the refresh trigger and
//! composites the blurred raster onto the target surface.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::config::{clamp_radius, BlurConfig};
use crate::error::Error;
use crate::events::Subscription;
use crate::geometry::Transform;
use crate::processing::blur::mark_render_thread;
use crate::processing::color::Argb;
use crate::processing::layout::snapshot_scale;
use crate::render::backend::{BackendKind, BlurBackend};
use crate::render::canvas::Canvas;
use crate::render::host::{SourceRegion, TargetRegion};
use crate::render::snapshot::{PipelineState, SnapshotPipeline, SnapshotSize};

/// Which widget a controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    /// Frosted panel with a flat overlay fill.
    Overlay,
    /// Outline-style indicator. Re-measuring always resumes auto-update.
    Indicator,
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Overlay => "overlay",
            Self::Indicator => "indicator",
        })
    }
}

/// Pipeline status republished after every core change, so it stays
/// readable while a refresh holds the core.
#[derive(Debug)]
struct PipelineStatus {
    state: Cell<PipelineState>,
    frames: Cell<u64>,
    raster_size: Cell<Option<(u32, u32)>>,
}

impl PipelineStatus {
    fn new() -> Self {
        Self {
            state: Cell::new(PipelineState::Uninitialized),
            frames: Cell::new(0),
            raster_size: Cell::new(None),
        }
    }
}

/// State touched by the refresh callback. Borrowed mutably for the whole of
/// a refresh, which is what makes nested draws detectable.
struct ControllerCore {
    kind: ControllerKind,
    status: Rc<PipelineStatus>,
    source: Rc<dyn SourceRegion>,
    target: Rc<dyn TargetRegion>,
    pipeline: SnapshotPipeline,
    backend: BlurBackend,
    radius: f32,
    overlay: Argb,
}

impl ControllerCore {
    fn remeasure(&mut self) {
        let bounds = self.target.bounds();
        match self.pipeline.resize(bounds.width, bounds.height) {
            SnapshotSize::WillNotDraw => {
                debug!(kind = %self.kind, width = bounds.width, height = bounds.height, "target will not draw");
                self.target.set_will_not_draw(true);
            }
            SnapshotSize::Allocated { .. } | SnapshotSize::Unchanged => {
                self.target.set_will_not_draw(false);
                self.refresh();
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.status.state.set(self.pipeline.state());
        self.status.frames.set(self.pipeline.frames_captured());
        self.status
            .raster_size
            .set(self.pipeline.raster().map(RgbaImage::dimensions));
    }

    fn refresh(&mut self) {
        if self.pipeline.state() != PipelineState::Ready {
            return;
        }
        let target = self.target.bounds();
        match self
            .pipeline
            .capture(self.source.as_ref(), target, &mut self.backend, self.radius)
        {
            Ok(()) => self.target.invalidate(),
            Err(err) => {
                warn!(kind = %self.kind, error = ?err, "blur refresh failed, keeping previous frame");
            }
        }
        self.publish();
    }

    fn composite(&mut self, canvas: &mut dyn Canvas) -> anyhow::Result<()> {
        let target = self.target.bounds();
        let Self {
            pipeline,
            backend,
            overlay,
            ..
        } = self;
        let Some(raster) = pipeline.raster_mut() else {
            return Ok(());
        };
        let (scale_x, scale_y) =
            snapshot_scale(target.width, target.height, raster.width(), raster.height());
        backend.draw_blurred(canvas, raster, Transform::scale(scale_x, scale_y))?;
        if !overlay.is_transparent() {
            canvas.fill(*overlay);
        }
        Ok(())
    }
}

/// Owns one snapshot pipeline, its blur backend and its refresh
/// subscription.
///
/// Controllers are tied to the thread that created them. Every operation
/// after [`RenderController::destroy`] fails with [`Error::Destroyed`].
pub struct RenderController {
    kind: ControllerKind,
    core: Rc<RefCell<ControllerCore>>,
    status: Rc<PipelineStatus>,
    backend_kind: BackendKind,
    radius: f32,
    overlay: Argb,
    subscription: Option<Subscription>,
    auto_update: bool,
    enabled: bool,
    destroyed: bool,
}

impl fmt::Debug for RenderController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderController")
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("auto_update", &self.auto_update)
            .field("subscribed", &self.subscription.is_some())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl RenderController {
    pub fn new(kind: ControllerKind, config: &BlurConfig) -> Self {
        mark_render_thread();
        let backend = BlurBackend::select(config.compositor.clone());
        let backend_kind = backend.kind();
        info!(kind = %kind, backend = %backend_kind, "creating blur controller");
        let status = Rc::new(PipelineStatus::new());
        let radius = clamp_radius(config.options.blur_radius);
        let overlay = config.options.overlay();
        let core = ControllerCore {
            kind,
            status: Rc::clone(&status),
            source: Rc::clone(&config.source_region),
            target: Rc::clone(&config.target_region),
            pipeline: SnapshotPipeline::new(config.options.downsample_factor),
            backend,
            radius,
            overlay,
        };
        let mut controller = Self {
            kind,
            core: Rc::new(RefCell::new(core)),
            status,
            backend_kind,
            radius,
            overlay,
            subscription: None,
            auto_update: false,
            enabled: true,
            destroyed: false,
        };
        controller.remeasure();
        controller
    }

    pub fn overlay(config: &BlurConfig) -> Self {
        Self::new(ControllerKind::Overlay, config)
    }

    pub fn indicator(config: &BlurConfig) -> Self {
        Self::new(ControllerKind::Indicator, config)
    }

    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    /// Store the radius for the next refresh, clamped to the supported range.
    pub fn set_radius(&mut self, radius: f32) -> Result<(), Error> {
        self.ensure_alive()?;
        self.radius = clamp_radius(radius);
        self.core.borrow_mut().radius = self.radius;
        Ok(())
    }

    pub fn set_overlay_color(&mut self, color: Argb) -> Result<(), Error> {
        self.ensure_alive()?;
        if self.overlay != color {
            self.overlay = color;
            let mut core = self.core.borrow_mut();
            core.overlay = color;
            core.target.invalidate();
        }
        Ok(())
    }

    /// Switch between compositing the blur and letting normal drawing
    /// through. Disabling also drops the refresh subscription.
    pub fn enable(&mut self, enabled: bool) -> Result<(), Error> {
        self.ensure_alive()?;
        self.enabled = enabled;
        {
            let mut core = self.core.borrow_mut();
            core.pipeline.set_enabled(enabled);
            core.publish();
            core.target.invalidate();
        }
        self.sync_subscription();
        Ok(())
    }

    /// Subscribe to or unsubscribe from the source's pre-draw trigger.
    pub fn set_auto_update(&mut self, auto_update: bool) -> Result<(), Error> {
        self.ensure_alive()?;
        self.auto_update = auto_update;
        self.sync_subscription();
        Ok(())
    }

    /// Recompute the snapshot size from the target's current bounds and
    /// capture a fresh frame.
    pub fn update(&mut self) -> Result<(), Error> {
        self.ensure_alive()?;
        self.remeasure();
        Ok(())
    }

    /// Capture and blur a frame now, outside the refresh trigger.
    pub fn refresh(&mut self) -> Result<(), Error> {
        self.ensure_alive()?;
        self.core.borrow_mut().refresh();
        Ok(())
    }

    /// Composite the blur onto `canvas`.
    ///
    /// Returns whether the caller should go on to draw its own content.
    /// Failures while compositing are logged and swallowed.
    pub fn draw(&self, canvas: &mut dyn Canvas) -> Result<bool, Error> {
        self.ensure_alive()?;
        // Already borrowed means a refresh is rendering the source right now.
        let Ok(mut core) = self.core.try_borrow_mut() else {
            return Ok(false);
        };
        if !self.enabled || core.pipeline.state() != PipelineState::Ready {
            return Ok(true);
        }
        if canvas.is_capture() {
            return Ok(false);
        }
        if let Err(err) = core.composite(canvas) {
            warn!(kind = %self.kind, error = ?err, "blur composite failed, skipping frame");
        }
        Ok(true)
    }

    /// Unsubscribe, release backend resources and drop the snapshot.
    pub fn destroy(&mut self) -> Result<(), Error> {
        self.ensure_alive()?;
        self.release();
        Ok(())
    }

    // Status getters never borrow the core, so a source subtree may query
    // its own controller from inside a capture.

    pub fn state(&self) -> PipelineState {
        self.status.state.get()
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn overlay_color(&self) -> Argb {
        self.overlay
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_auto_updating(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    /// Copy of the raster currently on screen. `None` while no raster is
    /// allocated, or while a capture is in progress.
    pub fn snapshot(&self) -> Option<RgbaImage> {
        let core = self.core.try_borrow().ok()?;
        core.pipeline.raster().cloned()
    }

    pub fn raster_size(&self) -> Option<(u32, u32)> {
        self.status.raster_size.get()
    }

    pub fn frames_captured(&self) -> u64 {
        self.status.frames.get()
    }

    fn ensure_alive(&self) -> Result<(), Error> {
        if self.destroyed {
            Err(Error::Destroyed)
        } else {
            Ok(())
        }
    }

    fn remeasure(&mut self) {
        if self.kind == ControllerKind::Indicator {
            self.auto_update = true;
            self.sync_subscription();
        }
        self.core.borrow_mut().remeasure();
    }

    fn sync_subscription(&mut self) {
        let wanted = self.auto_update && self.enabled && !self.destroyed;
        match (wanted, self.subscription.is_some()) {
            (true, false) => self.subscription = self.subscribe(),
            (false, true) => {
                self.subscription = None;
                debug!(kind = %self.kind, "unsubscribed from refresh trigger");
            }
            _ => {}
        }
    }

    fn subscribe(&self) -> Option<Subscription> {
        let observer = self.core.borrow().source.observer();
        let Some(observer) = observer else {
            debug!(kind = %self.kind, "source observer is gone, not subscribing");
            return None;
        };
        let core: Weak<RefCell<ControllerCore>> = Rc::downgrade(&self.core);
        let subscription = observer.subscribe(Box::new(move || {
            let Some(core) = core.upgrade() else {
                return;
            };
            if let Ok(mut core) = core.try_borrow_mut() {
                core.refresh();
            }
        }));
        debug!(kind = %self.kind, "subscribed to refresh trigger");
        Some(subscription)
    }

    fn release(&mut self) {
        self.destroyed = true;
        self.subscription = None;
        let mut core = self.core.borrow_mut();
        core.backend.destroy();
        core.pipeline.destroy();
        core.publish();
        debug!(kind = %self.kind, "blur controller destroyed");
    }
}

impl Drop for RenderController {
    fn drop(&mut self) {
        if !self.destroyed && self.core.try_borrow_mut().is_ok() {
            self.release();
        }
    }
}
