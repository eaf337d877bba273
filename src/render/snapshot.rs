//! Downsampled snapshot of the source subtree, aligned to the target.

use std::fmt;

use image::RgbaImage;
use tracing::debug;

use crate::geometry::{Rect, Transform};
use crate::processing::layout::{snapshot_scale, snapshot_size};
use crate::render::backend::BlurBackend;
use crate::render::canvas::CaptureCanvas;
use crate::render::host::SourceRegion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Ready,
    Disabled,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Disabled => "disabled",
        })
    }
}

/// Outcome of [`SnapshotPipeline::resize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSize {
    /// Fresh rasters of this size were allocated.
    Allocated { width: u32, height: u32 },
    /// The existing rasters already had the right size.
    Unchanged,
    /// The target collapsed to nothing; no raster is held.
    WillNotDraw,
}

/// Displayed raster plus the one the next capture renders into.
#[derive(Debug)]
struct Snapshot {
    front: RgbaImage,
    back: RgbaImage,
}

impl Snapshot {
    fn new(width: u32, height: u32) -> Self {
        Self {
            front: RgbaImage::new(width, height),
            back: RgbaImage::new(width, height),
        }
    }
}

#[derive(Debug)]
pub struct SnapshotPipeline {
    state: PipelineState,
    snapshot: Option<Snapshot>,
    enabled: bool,
    downsample: f32,
    frames: u64,
}

impl SnapshotPipeline {
    pub fn new(downsample: f32) -> Self {
        Self {
            state: PipelineState::Uninitialized,
            snapshot: None,
            enabled: true,
            downsample,
            frames: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Recompute the raster for a target of `width`×`height`.
    pub fn resize(&mut self, width: u32, height: u32) -> SnapshotSize {
        let Some((raster_w, raster_h)) = snapshot_size(width, height, self.downsample) else {
            if self.snapshot.take().is_some() {
                debug!(width, height, "target collapsed, released snapshot");
            }
            if self.state == PipelineState::Ready {
                self.state = PipelineState::Disabled;
            }
            return SnapshotSize::WillNotDraw;
        };

        let outcome = match &self.snapshot {
            Some(snapshot) if snapshot.front.dimensions() == (raster_w, raster_h) => {
                SnapshotSize::Unchanged
            }
            _ => {
                self.snapshot = Some(Snapshot::new(raster_w, raster_h));
                debug!(
                    target_w = width,
                    target_h = height,
                    raster_w,
                    raster_h,
                    "allocated snapshot raster"
                );
                SnapshotSize::Allocated {
                    width: raster_w,
                    height: raster_h,
                }
            }
        };
        self.state = if self.enabled {
            PipelineState::Ready
        } else {
            PipelineState::Disabled
        };
        outcome
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.state = match (self.state, enabled) {
            (PipelineState::Ready, false) => PipelineState::Disabled,
            (PipelineState::Disabled, true) if self.snapshot.is_some() => PipelineState::Ready,
            (state, _) => state,
        };
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Capture `source` into the back raster, blur it and make it current.
    ///
    /// On error the displayed raster is left as it was. Does nothing unless
    /// the pipeline is ready.
    pub fn capture(
        &mut self,
        source: &dyn SourceRegion,
        target: Rect,
        backend: &mut BlurBackend,
        radius: f32,
    ) -> anyhow::Result<()> {
        if self.state != PipelineState::Ready {
            return Ok(());
        }
        let Some(snapshot) = self.snapshot.as_mut() else {
            return Ok(());
        };

        let back = &mut snapshot.back;
        let raw: &mut [u8] = &mut **back;
        raw.fill(0);

        let origin = source.bounds();
        let dx = (target.x - origin.x) as f32;
        let dy = (target.y - origin.y) as f32;
        let (scale_x, scale_y) =
            snapshot_scale(target.width, target.height, back.width(), back.height());
        let transform =
            Transform::translate(-dx, -dy).then(Transform::scale(1.0 / scale_x, 1.0 / scale_y));

        source.draw(&mut CaptureCanvas::new(back, transform))?;
        backend.blur(back, radius)?;

        std::mem::swap(&mut snapshot.front, &mut snapshot.back);
        self.frames += 1;
        Ok(())
    }

    /// The raster currently on screen.
    pub fn raster(&self) -> Option<&RgbaImage> {
        self.snapshot.as_ref().map(|snapshot| &snapshot.front)
    }

    pub fn raster_mut(&mut self) -> Option<&mut RgbaImage> {
        self.snapshot.as_mut().map(|snapshot| &mut snapshot.front)
    }

    /// Number of captures that completed.
    pub fn frames_captured(&self) -> u64 {
        self.frames
    }

    pub fn destroy(&mut self) {
        self.snapshot = None;
        self.state = PipelineState::Uninitialized;
    }
}
