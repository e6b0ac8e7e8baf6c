// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Coordinate reconciliation between request space (origin top-left, y
// down) and the document's native space.
//
// PDF puts the origin at the bottom-left of the page box with y growing
// upward. Text is drawn inside a "placement space" whose CTM maps request
// coordinates onto the page unchanged:
//
//     1 0 0 -1 llx ury cm
//
// That CTM mirrors everything drawn under it, so glyphs get a local vertical
// flip anchored at the insertion point through the text matrix:
//
//     1 0 0 -1 x y Tm
//
// Images are placed by explicit rectangle in native space and never need
// the glyph correction. When the native space already runs top-left/y-down
// the placement space is a plain translation and the flip disappears.
//
// A page with /Rotate is displayed turned clockwise, so "top-left" means the
// top-left of the turned page. The placement space folds the turn in:
//
//     Rotate   90:  0  1  1  0 llx lly cm
//     Rotate  180: -1  0  0  1 urx lly cm
//     Rotate  270:  0 -1 -1  0 urx ury cm

use inlay_core::{EngineConfig, NativeOrigin, Position, TextFlip};

/// Affine transform `[a b c d e f]` as used by the `cm` and `Tm` operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn translate(x: f32, y: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    /// Mirror the y axis around the point `(x, y)`.
    pub const fn flip_y_at(x: f32, y: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, -1.0, x, y)
    }

    pub fn to_array(self) -> [f32; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    /// Map a point through this transform.
    pub fn apply(self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// `self` followed by `next` (the order `cm` operators compose in).
    pub fn then(self, next: Matrix) -> Matrix {
        Matrix::new(
            self.a * next.a + self.b * next.c,
            self.a * next.b + self.b * next.d,
            self.c * next.a + self.d * next.c,
            self.c * next.b + self.d * next.d,
            self.e * next.a + self.f * next.c + next.e,
            self.e * next.b + self.f * next.d + next.f,
        )
    }

    /// True when the transform reverses orientation.
    pub fn is_mirrored(self) -> bool {
        self.a * self.d - self.b * self.c < 0.0
    }
}

/// Visible page box in native units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageBox {
    /// US Letter, used when a page carries no usable box.
    pub const LETTER: Self = Self {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    /// Build from two corners given in any order.
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            llx: x0.min(x1),
            lly: y0.min(y1),
            urx: x0.max(x1),
            ury: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }
}

/// Clockwise display rotation of a page, in quarter turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageRotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl PageRotation {
    /// From a /Rotate value. Only multiples of 90 are valid; anything else
    /// yields `None`.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(match degrees.rem_euclid(360) {
            90 => Self::Quarter,
            180 => Self::Half,
            270 => Self::ThreeQuarter,
            _ => Self::None,
        })
    }

    pub fn degrees(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarter => 270,
        }
    }
}

/// Maps request coordinates onto one page.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateReconciler {
    page: PageBox,
    rotation: PageRotation,
    origin: NativeOrigin,
    text_flip: TextFlip,
}

impl CoordinateReconciler {
    pub fn new(page: PageBox, config: &EngineConfig) -> Self {
        Self {
            page,
            rotation: PageRotation::None,
            origin: config.native_origin,
            text_flip: config.text_flip,
        }
    }

    /// Account for the page being displayed turned by `rotation`.
    pub fn with_rotation(mut self, rotation: PageRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn page(&self) -> PageBox {
        self.page
    }

    pub fn rotation(&self) -> PageRotation {
        self.rotation
    }

    /// CTM under which request coordinates can be used as-is.
    pub fn placement_space(&self) -> Matrix {
        let PageBox { llx, lly, urx, ury } = self.page;
        let bottom_left = match self.rotation {
            PageRotation::None => Matrix::new(1.0, 0.0, 0.0, -1.0, llx, ury),
            PageRotation::Quarter => Matrix::new(0.0, 1.0, 1.0, 0.0, llx, lly),
            PageRotation::Half => Matrix::new(-1.0, 0.0, 0.0, 1.0, urx, lly),
            PageRotation::ThreeQuarter => Matrix::new(0.0, -1.0, -1.0, 0.0, urx, ury),
        };
        match self.origin {
            NativeOrigin::BottomLeft => bottom_left,
            // Same page, measured down from the top edge instead of up.
            NativeOrigin::TopLeft => bottom_left.then(Matrix::flip_y_at(0.0, lly + ury)),
        }
    }

    /// Whether text drawn in the placement space gets the local flip.
    pub fn flips_text(&self) -> bool {
        self.text_flip == TextFlip::Auto && self.placement_space().is_mirrored()
    }

    /// Text matrix placing a baseline origin at `point` inside the
    /// placement space.
    pub fn text_matrix(&self, point: Position) -> Matrix {
        if self.flips_text() {
            Matrix::flip_y_at(point.x, point.y)
        } else {
            Matrix::translate(point.x, point.y)
        }
    }

    /// Native position of a request point.
    pub fn to_native(&self, point: Position) -> (f32, f32) {
        self.placement_space().apply(point.x, point.y)
    }

    /// Image transform mapping the unit square onto the rectangle whose
    /// top-left corner is `top_left` (request space), upright.
    pub fn image_matrix(&self, top_left: Position, width: f32, height: f32) -> Matrix {
        // Unit square in request space: row 0 of the image (unit y = 1) on top.
        let rect = Matrix::new(width, 0.0, 0.0, -height, top_left.x, top_left.y + height);
        rect.then(self.placement_space())
    }
}
