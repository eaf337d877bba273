//! Screen-space geometry shared by the capture and composite passes.

use serde::Deserialize;

/// Integer point in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle: screen origin plus measured size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[must_use]
    pub const fn with_size(self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..self
        }
    }
}

/// Scale-then-translate mapping: `p' = p * scale + translate`.
///
/// Rotation and skew never occur in the blur pipeline, so the full affine
/// matrix is not carried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub sx: f32,
    pub sy: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        sx: 1.0,
        sy: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self {
            sx,
            sy,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub const fn translate(tx: f32, ty: f32) -> Self {
        Self {
            sx: 1.0,
            sy: 1.0,
            tx,
            ty,
        }
    }

    /// Compose so that `self` is applied first and `outer` second.
    #[must_use]
    pub fn then(self, outer: Self) -> Self {
        Self {
            sx: self.sx * outer.sx,
            sy: self.sy * outer.sy,
            tx: self.tx * outer.sx + outer.tx,
            ty: self.ty * outer.sy + outer.ty,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.sx + self.tx, y * self.sy + self.ty)
    }

    /// Inverse mapping, or `None` when either scale collapses an axis.
    pub fn invert(&self) -> Option<Self> {
        if self.sx.abs() <= f32::EPSILON || self.sy.abs() <= f32::EPSILON {
            return None;
        }
        let sx = 1.0 / self.sx;
        let sy = 1.0 / self.sy;
        Some(Self {
            sx,
            sy,
            tx: -self.tx * sx,
            ty: -self.ty * sy,
        })
    }
}
