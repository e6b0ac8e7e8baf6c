// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode, flip, and rotate raster assets in memory before
// they are embedded, using the `image` and `imageproc` crates.

use image::{DynamicImage, ImageReader, RgbaImage};
use imageproc::geometric_transformations::{self, Interpolation};
use inlay_core::FlipAxis;
use inlay_core::error::{InlayError, Result};
use tracing::{debug, info, instrument};

/// Raw samples ready for a PDF image XObject: 8-bit RGB plus an optional
/// 8-bit alpha plane.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfSamples {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

/// Image processing pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new `ImageProcessor`,
/// enabling method chaining.
///
/// ```ignore
/// let samples = ImageProcessor::open("stamp.png")?
///     .flip(FlipAxis::Vertical)
///     .rotate(90.0)
///     .into_pdf_samples();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path. The format is sniffed from the
    /// content, so downloads with a missing or misleading extension decode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(InlayError::NotFound(path.to_path_buf()));
        }
        let decode_error = |err: &dyn std::fmt::Display| {
            InlayError::ImageDecodeError(format!("failed to open {}: {}", path.display(), err))
        };
        let img = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|err| decode_error(&err))?
            .decode()
            .map_err(|err| decode_error(&err))?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Mirror the image along `axis`.
    #[instrument(skip(self))]
    pub fn flip(self, axis: FlipAxis) -> Self {
        debug!(?axis, "Flipping image");
        let image = match axis {
            FlipAxis::Horizontal => self.image.fliph(),
            FlipAxis::Vertical => self.image.flipv(),
            FlipAxis::Both => self.image.fliph().flipv(),
        };
        Self { image }
    }

    /// Rotate the image by an arbitrary angle in degrees (clockwise).
    ///
    /// For 90/180/270 degree rotations, lossless rotation is used. For other
    /// angles, the image is rotated about its centre with bilinear
    /// interpolation on a transparent background; the canvas keeps its size.
    #[instrument(skip(self), fields(degrees))]
    pub fn rotate(self, degrees: f32) -> Self {
        let normalised = degrees.rem_euclid(360.0);
        if normalised.abs() < 0.01 || (normalised - 360.0).abs() < 0.01 {
            return self;
        }

        info!(degrees, "Rotating image");

        // Fast-path for exact multiples of 90.
        if (normalised - 90.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate90(),
            };
        }
        if (normalised - 180.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate180(),
            };
        }
        if (normalised - 270.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate270(),
            };
        }

        let rgba = self.image.to_rgba8();
        let radians = normalised.to_radians();
        let transparent = image::Rgba([255u8, 255, 255, 0]);

        let rotated: RgbaImage = geometric_transformations::rotate_about_center(
            &rgba,
            radians,
            Interpolation::Bilinear,
            transparent,
        );

        debug!("General rotation applied");
        Self {
            image: DynamicImage::ImageRgba8(rotated),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Split the image into RGB samples and, when the source carries an
    /// alpha channel, a separate alpha plane.
    pub fn into_pdf_samples(self) -> PdfSamples {
        let width = self.image.width();
        let height = self.image.height();

        if self.image.color().has_alpha() {
            let rgba = self.image.to_rgba8().into_raw();
            let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
            let mut alpha = Vec::with_capacity(rgba.len() / 4);
            for px in rgba.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                alpha.push(px[3]);
            }
            PdfSamples {
                width,
                height,
                rgb,
                alpha: Some(alpha),
            }
        } else {
            PdfSamples {
                width,
                height,
                rgb: self.image.to_rgb8().into_raw(),
                alpha: None,
            }
        }
    }
}
