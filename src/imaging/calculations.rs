//! Pure calculation functions for the resize pipeline.
//!
//! All functions here are pure and testable without any I/O or images:
//! size planning, resample strategy choice and bounding-box margins.

use super::operations::ResizeError;
use super::params::SizeRequest;
use super::raster::Dimensions;

/// Area ratio above which a single filtered resize is used.
pub const DIRECT_RESIZE_AREA: f64 = 0.1;

/// Multiple of the final size the point pre-sample targets.
pub const SAMPLE_FACTOR: u32 = 5;

/// Smallest pre-sample dimension worth taking the two-stage path for.
pub const MIN_SAMPLE_DIMENSION: u32 = 128;

/// Per-axis ratio between a target size and the natural size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactors {
    pub fn between(natural: Dimensions, target: Dimensions) -> Self {
        Self {
            x: target.width as f64 / natural.width as f64,
            y: target.height as f64 / natural.height as f64,
        }
    }

    /// Factors of the request itself, before any best-fit clamping.
    ///
    /// An axis left at zero takes its factor from the aspect-derived
    /// `resolved` size instead.
    pub fn requested(natural: Dimensions, request: &SizeRequest, resolved: Dimensions) -> Self {
        let factor = |requested: u32, derived: u32, length: u32| {
            let target = if requested > 0 { requested } else { derived };
            target as f64 / length as f64
        };
        Self {
            x: factor(request.columns, resolved.width, natural.width),
            y: factor(request.rows, resolved.height, natural.height),
        }
    }

    /// Fraction of the source area the target covers.
    pub fn area(self) -> f64 {
        self.x * self.y
    }
}

fn scaled(factor: f64, length: u32) -> f64 {
    (factor * length as f64).round()
}

fn at_least_one(value: f64) -> u32 {
    if value < 1.0 { 1 } else { value as u32 }
}

/// Turn a size request into concrete target dimensions.
///
/// A zero on one axis is derived from the other through the natural aspect
/// ratio. With `best_fit` (and both axes given), the axis with the larger
/// scale factor is clamped to the smaller one so the result fits the box.
/// Each dimension is at least 1.
///
/// # Examples
/// ```
/// # use respimg::imaging::{plan_size, Dimensions, SizeRequest};
/// let natural = Dimensions { width: 1000, height: 500 };
/// let request = SizeRequest::new(200, 200).unwrap().with_best_fit(true);
/// assert_eq!(plan_size(natural, &request).unwrap(), Dimensions { width: 200, height: 100 });
/// ```
pub fn plan_size(natural: Dimensions, request: &SizeRequest) -> Result<Dimensions, ResizeError> {
    let (columns, rows) = (request.columns, request.rows);
    if columns == 0 && rows == 0 {
        return Err(ResizeError::InvalidSizeRequest {
            columns: 0,
            rows: 0,
        });
    }

    let x_factor = columns as f64 / natural.width as f64;
    let y_factor = rows as f64 / natural.height as f64;

    let (width, height) = match (columns, rows) {
        (c, 0) => (c as f64, scaled(x_factor, natural.height)),
        (0, r) => (scaled(y_factor, natural.width), r as f64),
        (_, r) if request.best_fit && x_factor > y_factor => {
            // Width would overflow the box: shrink it to the height's factor
            (scaled(y_factor, natural.width), r as f64)
        }
        (c, _) if request.best_fit && y_factor > x_factor => {
            (c as f64, scaled(x_factor, natural.height))
        }
        (c, r) => (c as f64, r as f64),
    };

    Ok(Dimensions {
        width: at_least_one(width),
        height: at_least_one(height),
    })
}

/// How the filtered resize reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeStrategy {
    /// One filtered resize straight to the target.
    Direct,
    /// Point-sample to `sample` first, then filter down to the target.
    TwoStage { sample: Dimensions },
}

/// Choose between a direct filtered resize and a sample-then-resize.
///
/// `factors` are the requested ones (see [`ScaleFactors::requested`]), the
/// same ratios `plan_size` compares for best fit. Mild reductions (and
/// enlargements) resize directly. Large reductions pre-sample to
/// [`SAMPLE_FACTOR`] times the resolved target, unless that intermediate
/// would fall under [`MIN_SAMPLE_DIMENSION`] on either axis.
pub fn select_strategy(factors: ScaleFactors, resolved: Dimensions) -> ResizeStrategy {
    if factors.area() > DIRECT_RESIZE_AREA {
        return ResizeStrategy::Direct;
    }

    let sample_width = resolved.width.saturating_mul(SAMPLE_FACTOR);
    let sample_height = resolved.height.saturating_mul(SAMPLE_FACTOR);
    if sample_width < MIN_SAMPLE_DIMENSION || sample_height < MIN_SAMPLE_DIMENSION {
        return ResizeStrategy::Direct;
    }

    ResizeStrategy::TwoStage {
        sample: Dimensions {
            width: sample_width,
            height: sample_height,
        },
    }
}

/// Whether a best-fit result should be padded out to the requested box.
pub fn needs_fill(request: &SizeRequest, resolved: Dimensions) -> bool {
    request.best_fit
        && request.fill
        && request.columns > 0
        && request.rows > 0
        && (resolved.width, resolved.height) != (request.columns, request.rows)
}

/// Horizontal and vertical margins that center `resolved` in the requested box.
///
/// Odd leftovers go to the right/bottom edge. Never negative: an axis that
/// already meets or exceeds the box gets no margin.
pub fn fill_margins(request: &SizeRequest, resolved: Dimensions) -> (u32, u32) {
    let margin = |requested: u32, actual: u32| {
        if requested > actual {
            (requested - actual) / 2
        } else {
            0
        }
    };
    (
        margin(request.columns, resolved.width),
        margin(request.rows, resolved.height),
    )
}
