//! Stack blur over RGBA snapshots.
//!
//! Two sliding-window passes (rows, then columns) with a triangular weight
//! profile. Samples past an edge replicate the edge pixel. The alpha channel
//! of the result is always opaque.

use std::cell::{Cell, RefCell};

use image::RgbaImage;
use tracing::trace;

use crate::error::Error;
use crate::processing::resize::resize_nearest;

/// Largest radius the filter honors; larger requests are capped.
pub const MAX_BLUR_RADIUS: u32 = 25;

/// Downscale applied by [`blur_detached`] when callers have no preference.
pub const DEFAULT_DETACHED_SCALE: f32 = 0.5;

thread_local! {
    static DETACHED_SCRATCH: RefCell<BlurScratch> = RefCell::new(BlurScratch::default());
    static RENDER_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Reusable working memory for [`stack_blur`].
///
/// Buffers only ever grow. Repeated blurs of rasters no larger than the
/// biggest one seen so far allocate nothing.
#[derive(Debug, Default)]
pub struct BlurScratch {
    red: Vec<u8>,
    green: Vec<u8>,
    blue: Vec<u8>,
    stack: Vec<[u32; 3]>,
    div_table: Vec<u8>,
    div_table_radius: usize,
    next_index: Vec<u32>,
}

impl BlurScratch {
    /// Number of pixels the channel accumulators can hold.
    #[must_use]
    pub fn pixel_capacity(&self) -> usize {
        self.red.len()
    }

    /// Entries in the current division table.
    #[must_use]
    pub fn division_table_len(&self) -> usize {
        self.div_table.len()
    }

    fn ensure_capacity(&mut self, pixel_count: usize, max_dim: usize, radius: usize) {
        if self.red.len() < pixel_count {
            self.red.resize(pixel_count, 0);
            self.green.resize(pixel_count, 0);
            self.blue.resize(pixel_count, 0);
        }

        let div = radius * 2 + 1;
        if self.div_table_radius != radius || self.div_table.is_empty() {
            // Triangular weights sum to (radius + 1)^2.
            let divisor = (radius + 1) * (radius + 1);
            self.div_table.clear();
            self.div_table
                .extend((0..256 * div * div).map(|i| (i / divisor).min(255) as u8));
            self.div_table_radius = radius;
        }

        self.stack.clear();
        self.stack.resize(div, [0; 3]);

        if self.next_index.len() < max_dim {
            self.next_index.resize(max_dim, 0);
        }
    }
}

/// Blur `image` in place with the given radius.
///
/// A zero radius or an empty image leaves the input untouched. Radii above
/// [`MAX_BLUR_RADIUS`] are capped.
pub fn stack_blur(image: &mut RgbaImage, radius: u32, scratch: &mut BlurScratch) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || radius == 0 {
        return;
    }
    let radius = radius.min(MAX_BLUR_RADIUS) as usize;
    let w = width as usize;
    let h = height as usize;
    scratch.ensure_capacity(w * h, w.max(h), radius);

    let BlurScratch {
        red,
        green,
        blue,
        stack,
        div_table,
        next_index,
        ..
    } = scratch;
    let pixels: &mut [u8] = &mut **image;

    fill_next_index(&mut next_index[..w], radius);
    for y in 0..h {
        let row = y * w;
        blur_lane(
            w,
            radius,
            stack,
            div_table,
            &next_index[..w],
            |x| {
                let p = (row + x) * 4;
                [
                    u32::from(pixels[p]),
                    u32::from(pixels[p + 1]),
                    u32::from(pixels[p + 2]),
                ]
            },
            |x, [r, g, b]| {
                red[row + x] = r;
                green[row + x] = g;
                blue[row + x] = b;
            },
        );
    }

    fill_next_index(&mut next_index[..h], radius);
    for x in 0..w {
        blur_lane(
            h,
            radius,
            stack,
            div_table,
            &next_index[..h],
            |y| {
                let o = y * w + x;
                [u32::from(red[o]), u32::from(green[o]), u32::from(blue[o])]
            },
            |y, [r, g, b]| {
                let p = (y * w + x) * 4;
                pixels[p] = r;
                pixels[p + 1] = g;
                pixels[p + 2] = b;
                pixels[p + 3] = 0xFF;
            },
        );
    }
    trace!(width, height, radius, "stack blur pass complete");
}

/// `next[i]` is the clamped index of the sample entering the window after
/// position `i` is emitted.
fn fill_next_index(next: &mut [u32], radius: usize) {
    let last = next.len().saturating_sub(1);
    for (i, slot) in next.iter_mut().enumerate() {
        *slot = (i + radius + 1).min(last) as u32;
    }
}

/// Slide the triangular window along one row or column.
fn blur_lane(
    len: usize,
    radius: usize,
    stack: &mut [[u32; 3]],
    div_table: &[u8],
    next_index: &[u32],
    read: impl Fn(usize) -> [u32; 3],
    mut write: impl FnMut(usize, [u8; 3]),
) {
    let div = radius * 2 + 1;
    let last = len as isize - 1;
    let mut sum = [0u32; 3];
    let mut sum_in = [0u32; 3];
    let mut sum_out = [0u32; 3];

    for (i, slot) in stack.iter_mut().enumerate().take(div) {
        let pos = (i as isize - radius as isize).clamp(0, last) as usize;
        let sample = read(pos);
        *slot = sample;
        let weight = (radius + 1 - i.abs_diff(radius)) as u32;
        for c in 0..3 {
            sum[c] += sample[c] * weight;
            if i > radius {
                sum_in[c] += sample[c];
            } else {
                sum_out[c] += sample[c];
            }
        }
    }

    let mut stack_ptr = radius;
    for (pos, &next) in next_index.iter().enumerate().take(len) {
        write(
            pos,
            [
                div_table[sum[0] as usize],
                div_table[sum[1] as usize],
                div_table[sum[2] as usize],
            ],
        );

        let start = (stack_ptr + div - radius) % div;
        let outgoing = stack[start];
        let incoming = read(next as usize);
        stack[start] = incoming;
        for c in 0..3 {
            sum[c] -= sum_out[c];
            sum_out[c] -= outgoing[c];
            sum_in[c] += incoming[c];
            sum[c] += sum_in[c];
        }

        stack_ptr = (stack_ptr + 1) % div;
        let center = stack[stack_ptr];
        for c in 0..3 {
            sum_out[c] += center[c];
            sum_in[c] -= center[c];
        }
    }
}

/// Mark the calling thread as one that drives a render cycle.
///
/// [`blur_detached`] refuses to run on such threads.
pub fn mark_render_thread() {
    RENDER_THREAD.with(|flag| flag.set(true));
}

/// Whether the calling thread has been marked as a render thread.
#[must_use]
pub fn is_render_thread() -> bool {
    RENDER_THREAD.with(Cell::get)
}

/// Downscale a copy of `input` by `scale` and blur it with thread-local
/// scratch memory.
///
/// Meant for batch/offline work on worker threads; calling it from a render
/// thread fails with [`Error::RenderThread`] so frame delivery never waits on
/// it.
pub fn blur_detached(input: &RgbaImage, radius: u32, scale: f32) -> Result<RgbaImage, Error> {
    if radius < 1 {
        return Err(Error::InvalidRadius(radius));
    }
    if is_render_thread() {
        return Err(Error::RenderThread);
    }
    if !(scale.is_finite() && scale > 0.0) {
        return Err(Error::InvalidOption(format!(
            "detached blur scale must be positive, got {scale}"
        )));
    }
    if input.width() == 0 || input.height() == 0 {
        return Ok(input.clone());
    }

    let width = scaled_dimension(input.width(), scale)?;
    let height = scaled_dimension(input.height(), scale)?;
    let mut scaled = if (width, height) == input.dimensions() {
        input.clone()
    } else {
        resize_nearest(input, None, width, height).map_err(Error::Render)?
    };

    DETACHED_SCRATCH.with(|scratch| {
        stack_blur(&mut scaled, radius, &mut scratch.borrow_mut());
    });
    Ok(scaled)
}

/// `len` scaled and rounded, at least 1, rejecting results past `u32`.
fn scaled_dimension(len: u32, scale: f32) -> Result<u32, Error> {
    let scaled = (f64::from(len) * f64::from(scale)).round();
    if scaled > f64::from(u32::MAX) {
        return Err(Error::InvalidOption(format!(
            "detached blur scale {scale} overflows a {len}px dimension"
        )));
    }
    Ok((scaled as u32).max(1))
}
