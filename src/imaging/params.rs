//! Parameter types for image operations.
//!
//! These describe *what* to do, not *how*. They sit between the pipeline in
//! [`operations`](super::operations), which decides the sequence of engine
//! calls, and the [`RasterImage`](super::raster::RasterImage) engine, which
//! does the pixel work.
//!
//! ## Types
//!
//! - [`SizeRequest`]: Target columns/rows plus the best-fit and fill flags.
//! - [`Filter`]: Whitelisted resampling kernel. Unknown names become [`Filter::Triangle`].
//! - [`Sharpening`]: Unsharp-mask parameters (radius, sigma, amount, threshold).
//! - [`Quality`]: Lossy encoding quality (1–100). Clamped on construction.
//! - [`Interlace`] / [`Colorspace`]: Encoder state the normalizer pins down.

use super::operations::ResizeError;
use std::fmt;
use std::str::FromStr;

/// Requested output size.
///
/// A zero in `columns` or `rows` means "derive from the aspect ratio". With
/// `best_fit`, the two values describe a bounding box instead of an exact
/// size; `fill` then pads the result out to that box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeRequest {
    pub columns: u32,
    pub rows: u32,
    pub best_fit: bool,
    pub fill: bool,
}

impl SizeRequest {
    /// Validate raw dimensions, rejecting negatives and the `0x0` request.
    pub fn new(columns: i64, rows: i64) -> Result<Self, ResizeError> {
        let invalid = || ResizeError::InvalidSizeRequest { columns, rows };
        if columns == 0 && rows == 0 {
            return Err(invalid());
        }
        let columns = u32::try_from(columns).map_err(|_| invalid())?;
        let rows = u32::try_from(rows).map_err(|_| invalid())?;
        Ok(Self {
            columns,
            rows,
            best_fit: false,
            fill: false,
        })
    }

    /// Shorthand for an aspect-preserving request on width alone.
    pub fn width(columns: u32) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn with_best_fit(mut self, best_fit: bool) -> Self {
        self.best_fit = best_fit;
        self
    }

    pub fn with_fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }
}

/// Resampling kernels accepted by the filtered resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    Point,
    Box,
    #[default]
    Triangle,
    Hermite,
    Hanning,
    Hamming,
    Blackman,
    Gaussian,
    Quadratic,
    Cubic,
    CatmullRom,
    Mitchell,
    Lanczos,
    Bessel,
    Sinc,
}

impl Filter {
    /// Every kernel in the whitelist.
    pub const ALL: [Filter; 15] = [
        Filter::Point,
        Filter::Box,
        Filter::Triangle,
        Filter::Hermite,
        Filter::Hanning,
        Filter::Hamming,
        Filter::Blackman,
        Filter::Gaussian,
        Filter::Quadratic,
        Filter::Cubic,
        Filter::CatmullRom,
        Filter::Mitchell,
        Filter::Lanczos,
        Filter::Bessel,
        Filter::Sinc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Filter::Point => "point",
            Filter::Box => "box",
            Filter::Triangle => "triangle",
            Filter::Hermite => "hermite",
            Filter::Hanning => "hanning",
            Filter::Hamming => "hamming",
            Filter::Blackman => "blackman",
            Filter::Gaussian => "gaussian",
            Filter::Quadratic => "quadratic",
            Filter::Cubic => "cubic",
            Filter::CatmullRom => "catrom",
            Filter::Mitchell => "mitchell",
            Filter::Lanczos => "lanczos",
            Filter::Bessel => "bessel",
            Filter::Sinc => "sinc",
        }
    }

    /// Look up a kernel by name (case-insensitive, `-`/`_` ignored).
    ///
    /// Anything outside the whitelist silently becomes [`Filter::Triangle`].
    pub fn from_name(name: &str) -> Self {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        let normalized = match normalized.as_str() {
            "catmullrom" => "catrom",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|f| f.name() == normalized)
            .unwrap_or_default()
    }
}

impl FromStr for Filter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unsharp-mask parameters.
///
/// - `radius`: kernel radius in pixels
/// - `sigma`: standard deviation of the gaussian blur
/// - `amount`: gain applied to the difference between original and blur
/// - `threshold`: minimum difference to sharpen, as a fraction of full scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub radius: f32,
    pub sigma: f32,
    pub amount: f32,
    pub threshold: f32,
}

impl Sharpening {
    /// Tighter set used when the output is headed for further optimization.
    pub const OPTIMIZED: Sharpening = Sharpening {
        radius: 0.25,
        sigma: 0.08,
        amount: 8.3,
        threshold: 0.045,
    };

    pub const STANDARD: Sharpening = Sharpening {
        radius: 0.25,
        sigma: 0.25,
        amount: 8.0,
        threshold: 0.065,
    };

    pub fn for_optim(optim: bool) -> Self {
        if optim {
            Self::OPTIMIZED
        } else {
            Self::STANDARD
        }
    }
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    /// Quality every normalized image is encoded at.
    pub const WEB: Quality = Quality(82);

    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::WEB
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interlace {
    #[default]
    None,
    Line,
    Plane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colorspace {
    #[default]
    Srgb,
    Gray,
}
