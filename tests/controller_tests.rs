use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use backdrop_blur::config::BlurConfig;
use backdrop_blur::error::Error;
use backdrop_blur::events::{FrameObserver, RefreshTrigger};
use backdrop_blur::geometry::{Point, Rect, Transform};
use backdrop_blur::processing::color::Argb;
use backdrop_blur::processing::layout::snapshot_scale;
use backdrop_blur::render::backend::{BackendKind, Compositor, LayerHandle};
use backdrop_blur::render::canvas::{Canvas, CaptureCanvas, RasterCanvas};
use backdrop_blur::render::controller::RenderController;
use backdrop_blur::render::host::{FixedTarget, ImageRegion, SourceRegion};
use backdrop_blur::render::snapshot::PipelineState;
use image::{Rgba, RgbaImage};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Image { size: (u32, u32), transform: Transform },
    Layer(LayerHandle),
    Fill(Argb),
}

struct RecordingCanvas {
    size: (u32, u32),
    accelerated: bool,
    ops: Vec<Op>,
}

impl RecordingCanvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            accelerated: false,
            ops: Vec::new(),
        }
    }

    fn accelerated(width: u32, height: u32) -> Self {
        Self {
            accelerated: true,
            ..Self::new(width, height)
        }
    }
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn is_hardware_accelerated(&self) -> bool {
        self.accelerated
    }

    fn fill(&mut self, color: Argb) {
        self.ops.push(Op::Fill(color));
    }

    fn fill_rect(&mut self, _rect: Rect, _color: Argb) {}

    fn stroke_rect(&mut self, _rect: Rect, _color: Argb, _width: f32) {}

    fn draw_image(&mut self, image: &RgbaImage, transform: Transform) -> anyhow::Result<()> {
        self.ops.push(Op::Image {
            size: image.dimensions(),
            transform,
        });
        Ok(())
    }

    fn draw_layer(&mut self, layer: LayerHandle, _transform: Transform) -> anyhow::Result<()> {
        self.ops.push(Op::Layer(layer));
        Ok(())
    }
}

/// Solid-color source whose color and failure mode can change between frames.
struct SwatchSource {
    bounds: Rect,
    color: Cell<Argb>,
    failing: Cell<bool>,
    observer: FrameObserver,
    controller: RefCell<Weak<RefCell<RenderController>>>,
    nested: RefCell<Vec<Result<bool, Error>>>,
    seen: RefCell<Vec<Seen>>,
}

/// Controller status as read by the source while it was being captured.
#[derive(Debug, Clone, PartialEq)]
struct Seen {
    state: PipelineState,
    frames: u64,
    raster_size: Option<(u32, u32)>,
    radius: f32,
    overlay: Argb,
    backend: BackendKind,
    snapshot: bool,
}

impl SwatchSource {
    fn new(bounds: Rect, color: Argb, observer: &FrameObserver) -> Rc<Self> {
        Rc::new(Self {
            bounds,
            color: Cell::new(color),
            failing: Cell::new(false),
            observer: observer.clone(),
            controller: RefCell::new(Weak::new()),
            nested: RefCell::new(Vec::new()),
            seen: RefCell::new(Vec::new()),
        })
    }
}

impl SourceRegion for SwatchSource {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn draw(&self, canvas: &mut dyn Canvas) -> anyhow::Result<()> {
        if self.failing.get() {
            anyhow::bail!("source subtree is mid-layout");
        }
        canvas.fill_rect(
            Rect::new(0, 0, self.bounds.width, self.bounds.height),
            self.color.get(),
        );
        // The blurred target lives inside the captured subtree.
        if let Some(controller) = self.controller.borrow().upgrade() {
            let controller = controller.borrow();
            self.seen.borrow_mut().push(Seen {
                state: controller.state(),
                frames: controller.frames_captured(),
                raster_size: controller.raster_size(),
                radius: controller.radius(),
                overlay: controller.overlay_color(),
                backend: controller.backend_kind(),
                snapshot: controller.snapshot().is_some(),
            });
            let result = controller.draw(canvas);
            self.nested.borrow_mut().push(result);
        }
        Ok(())
    }

    fn observer(&self) -> Option<Rc<dyn RefreshTrigger>> {
        Some(Rc::new(self.observer.clone()))
    }
}

#[derive(Default)]
struct FakeCompositor {
    available: Cell<bool>,
    recorded: Cell<u64>,
    released: RefCell<Vec<LayerHandle>>,
}

impl Compositor for FakeCompositor {
    fn blur_available(&self) -> bool {
        self.available.get()
    }

    fn record_blur(&self, _raster: &RgbaImage, _radius: f32) -> anyhow::Result<LayerHandle> {
        self.recorded.set(self.recorded.get() + 1);
        Ok(LayerHandle(self.recorded.get()))
    }

    fn release(&self, layer: LayerHandle) {
        self.released.borrow_mut().push(layer);
    }
}

fn panel_bounds() -> Rect {
    Rect::new(0, 0, 600, 200)
}

fn swatch_config(
    source: &Rc<SwatchSource>,
    target: &Rc<FixedTarget>,
) -> backdrop_blur::config::BlurConfigBuilder {
    BlurConfig::builder()
        .source_region(source.clone())
        .target_region(target.clone())
}

/// Channel-wise comparison allowing for blend rounding.
fn assert_near(actual: &Rgba<u8>, expected: [u8; 4]) {
    for (a, e) in actual.0.iter().zip(expected) {
        assert!(a.abs_diff(e) <= 1, "{actual:?} != {expected:?}");
    }
}

fn green() -> Argb {
    Argb(0xFF00_FF00)
}

fn blue() -> Argb {
    Argb(0xFF00_00FF)
}

#[test]
fn frosted_panel_paints_raster_then_overlay() {
    let observer = FrameObserver::new();
    let image = RgbaImage::from_pixel(600, 200, RED);
    let source = Rc::new(ImageRegion::new(Point::new(0, 0), image).with_observer(observer.clone()));
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let config = BlurConfig::builder()
        .source_region(source)
        .target_region(target.clone())
        .blur_radius(18.0)
        .overlay_color(Argb(0x99FF_FFFF))
        .fallback_enabled(true)
        .build()
        .unwrap();

    let mut controller = RenderController::overlay(&config);
    assert_eq!(controller.backend_kind(), BackendKind::Software);
    assert_eq!(controller.radius(), 18.0);
    controller.set_auto_update(true).unwrap();
    assert_eq!(observer.dispatch_pre_draw(), 1);
    assert_eq!(controller.frames_captured(), 2);

    let mut canvas = RecordingCanvas::new(600, 200);
    assert!(controller.draw(&mut canvas).unwrap());
    let (sx, sy) = snapshot_scale(600, 200, 128, 43);
    assert_eq!(
        canvas.ops,
        vec![
            Op::Image {
                size: (128, 43),
                transform: Transform::scale(sx, sy),
            },
            Op::Fill(Argb(0x99FF_FFFF)),
        ]
    );

    let mut raster = RasterCanvas::new(600, 200);
    assert!(controller.draw(&mut raster).unwrap());
    assert_near(raster.image().get_pixel(300, 100), [255, 153, 153, 255]);
    assert_near(raster.image().get_pixel(599, 199), [255, 153, 153, 255]);
    assert!(!target.will_not_draw());
}

#[test]
fn collapsed_target_recovers_with_fresh_raster() {
    let observer = FrameObserver::new();
    let source = SwatchSource::new(panel_bounds(), green(), &observer);
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let mut controller = RenderController::overlay(&swatch_config(&source, &target).build().unwrap());
    assert_eq!(controller.state(), PipelineState::Ready);

    target.set_bounds(Rect::new(0, 0, 0, 0));
    controller.update().unwrap();
    assert!(target.will_not_draw());
    assert_eq!(controller.state(), PipelineState::Disabled);
    assert_eq!(controller.raster_size(), None);
    let mut canvas = RecordingCanvas::new(600, 200);
    assert!(controller.draw(&mut canvas).unwrap());
    assert!(canvas.ops.is_empty());

    source.color.set(blue());
    target.set_bounds(panel_bounds());
    controller.update().unwrap();
    assert!(!target.will_not_draw());
    assert_eq!(controller.state(), PipelineState::Ready);
    assert_eq!(controller.raster_size(), Some((128, 43)));
    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.get_pixel(64, 20), &Rgba([0, 0, 255, 255]));
}

#[test]
fn draw_inside_capture_pass_skips_compositing() {
    let observer = FrameObserver::new();
    let source = SwatchSource::new(panel_bounds(), green(), &observer);
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let controller = Rc::new(RefCell::new(RenderController::overlay(
        &swatch_config(&source, &target).build().unwrap(),
    )));
    controller.borrow_mut().set_auto_update(true).unwrap();
    *source.controller.borrow_mut() = Rc::downgrade(&controller);

    assert_eq!(observer.dispatch_pre_draw(), 1);
    let nested = source.nested.borrow();
    assert_eq!(nested.len(), 1);
    assert!(matches!(nested[0], Ok(false)));
    assert_eq!(controller.borrow().frames_captured(), 2);
}

#[test]
fn source_reads_controller_status_while_captured() {
    let observer = FrameObserver::new();
    let source = SwatchSource::new(panel_bounds(), green(), &observer);
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let config = swatch_config(&source, &target)
        .blur_radius(12.0)
        .overlay_color(blue())
        .build()
        .unwrap();
    let controller = Rc::new(RefCell::new(RenderController::overlay(&config)));
    controller.borrow_mut().set_auto_update(true).unwrap();
    *source.controller.borrow_mut() = Rc::downgrade(&controller);

    assert_eq!(observer.dispatch_pre_draw(), 1);
    assert_eq!(
        source.seen.borrow().as_slice(),
        &[Seen {
            state: PipelineState::Ready,
            frames: 1,
            raster_size: Some((128, 43)),
            radius: 12.0,
            overlay: blue(),
            backend: BackendKind::Software,
            snapshot: false,
        }]
    );
    assert_eq!(controller.borrow().frames_captured(), 2);
    assert!(controller.borrow().snapshot().is_some());
}

#[test]
fn capture_surface_is_never_composited_onto() {
    let observer = FrameObserver::new();
    let source = SwatchSource::new(panel_bounds(), green(), &observer);
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let controller = RenderController::overlay(&swatch_config(&source, &target).build().unwrap());

    let mut raster = RgbaImage::new(16, 16);
    let mut capture = CaptureCanvas::new(&mut raster, Transform::IDENTITY);
    assert!(!controller.draw(&mut capture).unwrap());
    assert!(raster.pixels().all(|p| p.0 == [0, 0, 0, 0]));
}

#[test]
fn paused_auto_update_leaves_raster_alone() {
    let observer = FrameObserver::new();
    let source = SwatchSource::new(panel_bounds(), green(), &observer);
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let mut controller = RenderController::overlay(&swatch_config(&source, &target).build().unwrap());
    controller.set_auto_update(true).unwrap();
    observer.dispatch_pre_draw();
    controller.set_auto_update(false).unwrap();
    assert!(!controller.is_auto_updating());

    source.color.set(blue());
    let frames = controller.frames_captured();
    assert_eq!(observer.dispatch_pre_draw(), 0);
    assert_eq!(controller.frames_captured(), frames);
    assert_eq!(
        controller.snapshot().unwrap().get_pixel(10, 10),
        &Rgba([0, 255, 0, 255])
    );

    controller.update().unwrap();
    assert_eq!(
        controller.snapshot().unwrap().get_pixel(10, 10),
        &Rgba([0, 0, 255, 255])
    );

    source.color.set(green());
    controller.set_auto_update(true).unwrap();
    assert_eq!(observer.dispatch_pre_draw(), 1);
    assert_eq!(
        controller.snapshot().unwrap().get_pixel(10, 10),
        &Rgba([0, 255, 0, 255])
    );
}

#[test]
fn subscription_is_idempotent_and_follows_enable() {
    let observer = FrameObserver::new();
    let source = SwatchSource::new(panel_bounds(), green(), &observer);
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let mut controller = RenderController::overlay(&swatch_config(&source, &target).build().unwrap());

    controller.set_auto_update(true).unwrap();
    controller.set_auto_update(true).unwrap();
    assert_eq!(observer.listener_count(), 1);

    controller.enable(false).unwrap();
    assert_eq!(observer.listener_count(), 0);
    assert_eq!(controller.state(), PipelineState::Disabled);
    let mut canvas = RecordingCanvas::new(600, 200);
    assert!(controller.draw(&mut canvas).unwrap());
    assert!(canvas.ops.is_empty());

    controller.enable(true).unwrap();
    assert_eq!(observer.listener_count(), 1);
    assert_eq!(controller.state(), PipelineState::Ready);

    drop(controller);
    assert_eq!(observer.listener_count(), 0);
}

#[test]
fn indicator_resumes_auto_update_on_remeasure() {
    let observer = FrameObserver::new();
    let source = SwatchSource::new(panel_bounds(), green(), &observer);
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let mut controller =
        RenderController::indicator(&swatch_config(&source, &target).build().unwrap());
    assert!(controller.is_auto_updating());

    controller.set_auto_update(false).unwrap();
    assert_eq!(observer.listener_count(), 0);
    controller.update().unwrap();
    assert_eq!(observer.listener_count(), 1);
}

#[test]
fn operations_after_destroy_fail() {
    let observer = FrameObserver::new();
    let source = SwatchSource::new(panel_bounds(), green(), &observer);
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let mut controller = RenderController::overlay(&swatch_config(&source, &target).build().unwrap());
    controller.set_auto_update(true).unwrap();

    controller.destroy().unwrap();
    assert_eq!(observer.listener_count(), 0);
    assert_eq!(controller.state(), PipelineState::Uninitialized);

    let mut canvas = RecordingCanvas::new(600, 200);
    assert!(matches!(controller.draw(&mut canvas), Err(Error::Destroyed)));
    assert!(matches!(controller.set_radius(10.0), Err(Error::Destroyed)));
    assert!(matches!(controller.set_overlay_color(blue()), Err(Error::Destroyed)));
    assert!(matches!(controller.enable(true), Err(Error::Destroyed)));
    assert!(matches!(controller.set_auto_update(true), Err(Error::Destroyed)));
    assert!(matches!(controller.update(), Err(Error::Destroyed)));
    assert!(matches!(controller.refresh(), Err(Error::Destroyed)));
    assert!(matches!(controller.destroy(), Err(Error::Destroyed)));
    assert_eq!(observer.listener_count(), 0);
}

#[test]
fn failed_refresh_keeps_previous_frame() {
    let observer = FrameObserver::new();
    let source = SwatchSource::new(panel_bounds(), green(), &observer);
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let mut controller = RenderController::overlay(&swatch_config(&source, &target).build().unwrap());
    controller.set_auto_update(true).unwrap();

    let frames = controller.frames_captured();
    let invalidations = target.invalidation_count();
    source.failing.set(true);
    source.color.set(blue());
    assert_eq!(observer.dispatch_pre_draw(), 1);
    assert_eq!(controller.frames_captured(), frames);
    assert_eq!(target.invalidation_count(), invalidations);
    assert_eq!(
        controller.snapshot().unwrap().get_pixel(0, 0),
        &Rgba([0, 255, 0, 255])
    );

    let mut canvas = RecordingCanvas::new(600, 200);
    assert!(controller.draw(&mut canvas).unwrap());
    assert_eq!(canvas.ops.len(), 1);

    source.failing.set(false);
    observer.dispatch_pre_draw();
    assert_eq!(controller.frames_captured(), frames + 1);
}

#[test]
fn radius_and_overlay_updates() {
    let observer = FrameObserver::new();
    let source = SwatchSource::new(panel_bounds(), green(), &observer);
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let mut controller = RenderController::overlay(
        &swatch_config(&source, &target)
            .blur_radius(40.0)
            .build()
            .unwrap(),
    );
    assert_eq!(controller.radius(), 25.0);
    controller.set_radius(1.0).unwrap();
    assert_eq!(controller.radius(), 2.0);

    let before = target.invalidation_count();
    controller.set_overlay_color(Argb::TRANSPARENT).unwrap();
    assert_eq!(target.invalidation_count(), before);
    controller.set_overlay_color(Argb(0x4000_0000)).unwrap();
    assert_eq!(target.invalidation_count(), before + 1);
    assert_eq!(controller.overlay_color(), Argb(0x4000_0000));
}

#[test]
fn compositor_falls_back_per_draw() {
    let observer = FrameObserver::new();
    let source = SwatchSource::new(panel_bounds(), green(), &observer);
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let compositor = Rc::new(FakeCompositor::default());
    compositor.available.set(true);
    let mut controller = RenderController::overlay(
        &swatch_config(&source, &target)
            .compositor(compositor.clone())
            .build()
            .unwrap(),
    );
    assert_eq!(controller.backend_kind(), BackendKind::Compositor);
    controller.set_auto_update(true).unwrap();
    observer.dispatch_pre_draw();
    assert_eq!(compositor.recorded.get(), 2);
    assert_eq!(*compositor.released.borrow(), vec![LayerHandle(1)]);

    let mut accelerated = RecordingCanvas::accelerated(600, 200);
    assert!(controller.draw(&mut accelerated).unwrap());
    assert_eq!(accelerated.ops, vec![Op::Layer(LayerHandle(2))]);

    let mut software = RecordingCanvas::new(600, 200);
    assert!(controller.draw(&mut software).unwrap());
    assert!(matches!(software.ops.as_slice(), [Op::Image { size: (128, 43), .. }]));

    compositor.available.set(false);
    let mut accelerated = RecordingCanvas::accelerated(600, 200);
    assert!(controller.draw(&mut accelerated).unwrap());
    assert!(matches!(accelerated.ops.as_slice(), [Op::Image { .. }]));

    controller.destroy().unwrap();
    assert_eq!(
        *compositor.released.borrow(),
        vec![LayerHandle(1), LayerHandle(2)]
    );
}

#[test]
fn compositor_unavailable_at_startup_selects_software() {
    let observer = FrameObserver::new();
    let source = SwatchSource::new(panel_bounds(), green(), &observer);
    let target = Rc::new(FixedTarget::new(panel_bounds()));
    let compositor = Rc::new(FakeCompositor::default());
    let controller = RenderController::overlay(
        &swatch_config(&source, &target)
            .compositor(compositor.clone())
            .build()
            .unwrap(),
    );
    assert_eq!(controller.backend_kind(), BackendKind::Software);
    assert_eq!(compositor.recorded.get(), 0);
}
