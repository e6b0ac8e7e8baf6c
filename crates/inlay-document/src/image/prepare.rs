// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image preparation — obtain, decode, orient, and size an image insertion so
// the PDF layer only has to embed samples and place a rectangle.

use std::time::Duration;

use inlay_core::error::{InlayError, Result};
use inlay_core::{EngineConfig, ImageInsertion};
use tracing::{debug, info, instrument};

use super::processor::{ImageProcessor, PdfSamples};
use crate::fetch;

/// An image ready for embedding.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub samples: PdfSamples,
    /// Destination rectangle width in points.
    pub width: u32,
    /// Destination rectangle height in points.
    pub height: u32,
}

impl PreparedImage {
    pub fn pixel_width(&self) -> u32 {
        self.samples.width
    }

    pub fn pixel_height(&self) -> u32 {
        self.samples.height
    }

    /// Where the image is drawn inside its destination rectangle, as
    /// `(dx, dy, width, height)` with `dx`/`dy` measured from the
    /// rectangle's top-left corner.
    ///
    /// With `keep_proportion` the image is scaled to fit and centred;
    /// otherwise it is stretched over the whole rectangle.
    pub fn fit(&self, keep_proportion: bool) -> (f32, f32, f32, f32) {
        let (rect_w, rect_h) = (self.width as f32, self.height as f32);
        if !keep_proportion {
            return (0.0, 0.0, rect_w, rect_h);
        }
        let scale = (rect_w / self.pixel_width() as f32).min(rect_h / self.pixel_height() as f32);
        let w = self.pixel_width() as f32 * scale;
        let h = self.pixel_height() as f32 * scale;
        ((rect_w - w) / 2.0, (rect_h - h) / 2.0, w, h)
    }
}

/// Destination size in points for an image of `src_w` x `src_h` pixels.
///
/// Explicit sizes win; a single explicit side keeps the aspect ratio; with
/// neither the image is shrunk so that no side exceeds `cap` (never
/// enlarged). Every result is at least 1.
pub fn resolve_dimensions(
    src_w: u32,
    src_h: u32,
    width: Option<u32>,
    height: Option<u32>,
    cap: f32,
) -> (u32, u32) {
    let (sw, sh) = (src_w.max(1) as f64, src_h.max(1) as f64);
    let (w, h) = match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, (sh * w as f64 / sw).floor() as u32),
        (None, Some(h)) => ((sw * h as f64 / sh).floor() as u32, h),
        (None, None) => {
            let longest = sw.max(sh);
            let cap = cap as f64;
            if longest <= cap {
                (sw as u32, sh as u32)
            } else {
                ((sw * cap / longest).floor() as u32, (sh * cap / longest).floor() as u32)
            }
        }
    };
    (w.max(1), h.max(1))
}

/// Load and transform the image for `insertion`.
///
/// Remote sources are downloaded fresh for every call and the temp file is
/// gone by the time this returns.
#[instrument(skip_all, fields(source = %insertion.source))]
pub fn prepare(insertion: &ImageInsertion, config: &EngineConfig) -> Result<PreparedImage> {
    // The download guard only lives as long as decoding needs it.
    let mut processor = {
        let resolved = fetch::fetch(
            &insertion.source,
            Duration::from_secs(config.fetch_timeout_secs),
        )?;
        let path = resolved.path();
        if !path.exists() {
            return Err(InlayError::NotFound(path.to_path_buf()));
        }
        ImageProcessor::open(path)?
    };

    if !insertion.correct_orientation {
        debug!(axis = ?insertion.flip_type, "Orientation correction");
        processor = processor.flip(insertion.flip_type);
    }
    if let Some(axis) = insertion.flip {
        processor = processor.flip(axis);
    }
    processor = processor.rotate(insertion.rotate);

    let (width, height) = resolve_dimensions(
        processor.width(),
        processor.height(),
        insertion.width,
        insertion.height,
        config.image_size_cap,
    );

    let samples = processor.into_pdf_samples();
    info!(
        pixel_width = samples.width,
        pixel_height = samples.height,
        width,
        height,
        alpha = samples.alpha.is_some(),
        "Image prepared"
    );

    Ok(PreparedImage {
        samples,
        width,
        height,
    })
}
