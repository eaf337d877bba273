/// Default ratio between the target size and the captured snapshot.
pub const DEFAULT_DOWNSAMPLE_FACTOR: f32 = 6.0;

/// Snapshot rows are padded to a multiple of this many pixels.
pub const SNAPSHOT_WIDTH_ALIGNMENT: u32 = 64;

/// Round `value` up to the next multiple of `alignment`.
pub const fn align_up(value: u32, alignment: u32) -> u32 {
    value + (alignment - value % alignment) % alignment
}

/// Size of the downsampled snapshot raster for a target of `target_w`×`target_h`.
///
/// The width is shrunk by `downsample` and padded to
/// [`SNAPSHOT_WIDTH_ALIGNMENT`]; the height keeps the target's aspect ratio
/// against the padded width. Returns `None` when the target would collapse
/// to nothing, in which case nothing should be allocated or drawn.
pub fn snapshot_size(target_w: u32, target_h: u32, downsample: f32) -> Option<(u32, u32)> {
    if !(downsample.is_finite() && downsample > 0.0) {
        return None;
    }
    let scaled_w = (f64::from(target_w) / f64::from(downsample)).ceil() as u32;
    let scaled_h = (f64::from(target_h) / f64::from(downsample)).ceil() as u32;
    if scaled_w == 0 || scaled_h == 0 {
        return None;
    }
    let aligned_w = align_up(scaled_w, SNAPSHOT_WIDTH_ALIGNMENT);
    let height = (u64::from(target_h) * u64::from(aligned_w)).div_ceil(u64::from(target_w));
    Some((aligned_w, height.max(1) as u32))
}

/// Per-axis scale from snapshot pixels to target pixels.
pub fn snapshot_scale(target_w: u32, target_h: u32, raster_w: u32, raster_h: u32) -> (f32, f32) {
    (
        target_w as f32 / raster_w.max(1) as f32,
        target_h as f32 / raster_h.max(1) as f32,
    )
}
