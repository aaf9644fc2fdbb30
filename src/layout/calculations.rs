//! Pure placement math.
//!
//! All functions here are pure and testable without a surface or a PDF.

use super::surface::PageSize;
use crate::template::{Alignment, Orientation};

/// Points per millimetre.
pub const PT_PER_MM: f32 = 72.0 / 25.4;

/// A4 short edge in points.
pub const A4_SHORT_PT: f32 = 595.2756;
/// A4 long edge in points.
pub const A4_LONG_PT: f32 = 841.8898;

pub fn mm_to_pt(mm: f32) -> f32 {
    mm * PT_PER_MM
}

pub fn pt_to_mm(pt: f32) -> f32 {
    pt / PT_PER_MM
}

/// A4 page dimensions for an orientation.
pub fn page_size(orientation: Orientation) -> PageSize {
    match orientation {
        Orientation::Landscape => PageSize {
            width: A4_LONG_PT,
            height: A4_SHORT_PT,
        },
        Orientation::Portrait => PageSize {
            width: A4_SHORT_PT,
            height: A4_LONG_PT,
        },
    }
}

/// Left edge (pt) of a run of `width` points anchored at `x_mm`.
///
/// - `Left`: the run starts at `x_mm`
/// - `Right`: the run ends at `x_mm`
/// - `Center`: the run is centered on `x_mm`, or on the page center when
///   `x_mm` is exactly `0`
///
/// ```
/// # use diploma_gen::layout::anchor_left_edge;
/// # use diploma_gen::template::Alignment;
/// assert_eq!(anchor_left_edge(Alignment::Center, 0.0, 100.0, 500.0), 200.0);
/// ```
pub fn anchor_left_edge(alignment: Alignment, x_mm: f32, width: f32, page_width: f32) -> f32 {
    match alignment {
        Alignment::Left => mm_to_pt(x_mm),
        Alignment::Right => mm_to_pt(x_mm) - width,
        Alignment::Center => {
            let center = if x_mm == 0.0 {
                page_width / 2.0
            } else {
                mm_to_pt(x_mm)
            };
            center - width / 2.0
        }
    }
}

/// Baseline (mm) of line `index` in a stacked block.
pub fn stacked_line_y(y_mm: f32, index: usize, spacing_mm: f32) -> f32 {
    y_mm - index as f32 * spacing_mm
}

/// Outcome of fitting a run into a maximum width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoFit {
    pub size: f32,
    /// `1.0` unless even the floor size overflowed.
    pub horizontal_scale: f32,
}

/// Largest size `start - k·step` (k = 0, 1, …, not below `floor`) at which
/// `width_at(size)` is at most `max_width`. `width_at` must grow with size.
///
/// When nothing fits the floor size is used and the run is compressed
/// horizontally so it still ends within `max_width`. A start size below the
/// floor is tried as-is. A non-positive or NaN `step` only tries `start`, and
/// a non-finite `start` goes straight to the compressed floor size.
///
/// The candidates are searched by bisection, so the number of `width_at`
/// calls stays logarithmic in `(start - floor) / step` however large the
/// start size is.
pub fn fit_font_size(
    width_at: impl Fn(f32) -> f32,
    start: f32,
    step: f32,
    floor: f32,
    max_width: f32,
) -> AutoFit {
    if !start.is_finite() {
        return compressed_at(&width_at, floor, max_width);
    }
    let floor = floor.min(start);
    let fits = |size: f32| width_at(size) <= max_width;
    if fits(start) {
        return AutoFit {
            size: start,
            horizontal_scale: 1.0,
        };
    }
    if !(step > 0.0) || !step.is_finite() {
        return compressed_at(&width_at, floor, max_width);
    }

    let size_at = |k: u64| ((f64::from(start) - k as f64 * f64::from(step)) as f32).max(floor);
    let last = ((f64::from(start) - f64::from(floor)) / f64::from(step) + 1e-4).floor() as u64;
    if last == 0 || !fits(size_at(last)) {
        return compressed_at(&width_at, floor, max_width);
    }

    // Smallest k in 1..=last whose size fits; `last` is known to fit.
    let (mut lo, mut hi) = (1u64, last);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if fits(size_at(mid)) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    AutoFit {
        size: size_at(lo),
        horizontal_scale: 1.0,
    }
}

fn compressed_at(width_at: &impl Fn(f32) -> f32, floor: f32, max_width: f32) -> AutoFit {
    let width = width_at(floor);
    let horizontal_scale = if width > 0.0 && width.is_finite() {
        (max_width / width).clamp(0.0, 1.0)
    } else {
        1.0
    };
    AutoFit {
        size: floor,
        horizontal_scale,
    }
}
