//! Host-side collaborators of the blur pipeline.

use std::cell::Cell;
use std::rc::Rc;

use image::RgbaImage;

use crate::events::{FrameObserver, RefreshTrigger};
use crate::geometry::{Point, Rect, Transform};
use crate::render::canvas::Canvas;

/// The subtree whose pixels are blurred.
pub trait SourceRegion {
    /// Screen-space bounds of the subtree root.
    fn bounds(&self) -> Rect;

    /// Render the subtree in its own coordinate space (origin at 0,0).
    fn draw(&self, canvas: &mut dyn Canvas) -> anyhow::Result<()>;

    /// Pre-draw observer of the subtree, or `None` once it has gone away.
    fn observer(&self) -> Option<Rc<dyn RefreshTrigger>>;
}

/// The rectangle the blurred snapshot is composited into.
pub trait TargetRegion {
    /// Screen-space bounds with the current measured size.
    fn bounds(&self) -> Rect;

    fn set_will_not_draw(&self, will_not_draw: bool);

    /// Request a redraw of the target.
    fn invalidate(&self);
}

/// Source backed by a single image placed at a movable screen origin.
#[derive(Debug)]
pub struct ImageRegion {
    origin: Cell<Point>,
    image: RgbaImage,
    observer: Option<FrameObserver>,
}

impl ImageRegion {
    pub fn new(origin: Point, image: RgbaImage) -> Self {
        Self {
            origin: Cell::new(origin),
            image,
            observer: None,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: FrameObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Move the source, e.g. after a scroll.
    pub fn set_origin(&self, origin: Point) {
        self.origin.set(origin);
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl SourceRegion for ImageRegion {
    fn bounds(&self) -> Rect {
        let origin = self.origin.get();
        Rect::new(origin.x, origin.y, self.image.width(), self.image.height())
    }

    fn draw(&self, canvas: &mut dyn Canvas) -> anyhow::Result<()> {
        canvas.draw_image(&self.image, Transform::IDENTITY)
    }

    fn observer(&self) -> Option<Rc<dyn RefreshTrigger>> {
        self.observer
            .clone()
            .map(|observer| Rc::new(observer) as Rc<dyn RefreshTrigger>)
    }
}

/// Target with host-controlled bounds that records draw requests.
#[derive(Debug, Default)]
pub struct FixedTarget {
    bounds: Cell<Rect>,
    will_not_draw: Cell<bool>,
    invalidations: Cell<u32>,
}

impl FixedTarget {
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds: Cell::new(bounds),
            ..Self::default()
        }
    }

    /// Simulate a layout pass that moved or resized the target.
    pub fn set_bounds(&self, bounds: Rect) {
        self.bounds.set(bounds);
    }

    #[must_use]
    pub fn will_not_draw(&self) -> bool {
        self.will_not_draw.get()
    }

    #[must_use]
    pub fn invalidation_count(&self) -> u32 {
        self.invalidations.get()
    }
}

impl TargetRegion for FixedTarget {
    fn bounds(&self) -> Rect {
        self.bounds.get()
    }

    fn set_will_not_draw(&self, will_not_draw: bool) {
        self.will_not_draw.set(will_not_draw);
    }

    fn invalidate(&self) {
        self.invalidations.set(self.invalidations.get() + 1);
    }
}
