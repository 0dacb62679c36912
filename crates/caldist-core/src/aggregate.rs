//! Final distance aggregation.

use crate::breakdown::DistanceBreakdown;

/// Breakdown label for the factor contribution.
pub const LABEL_FACTOR: &str = "Faktor Anteil";
/// Breakdown label for the fixed offset.
pub const LABEL_OFFSET: &str = "Offset";
/// Breakdown label for the minimum clamp.
pub const LABEL_MINIMUM: &str = "Minimum";

/// Adjustments applied to the summed round-trip distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustments {
    /// Multiplier applied to the routed total (`1.0` = unchanged).
    pub factor: f64,
    /// Kilometers added after the factor.
    pub offset: f64,
    /// Lower bound of the published distance.
    pub minimum: f64,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            factor: 1.0,
            offset: 0.0,
            minimum: 10.0,
        }
    }
}

/// Rounds to one decimal place, ties to even.
#[must_use]
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// Applies factor, offset, rounding and minimum to the routed total.
///
/// `routed` is `None` when no destination was routed. Synthetic entries are
/// appended to `breakdown` only for non-trivial adjustments.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn aggregate(
    routed: Option<f64>,
    mut breakdown: DistanceBreakdown,
    adjustments: &Adjustments,
) -> (f64, DistanceBreakdown) {
    let mut total = routed.unwrap_or(0.0);

    let factor_part = total * (adjustments.factor - 1.0);
    if adjustments.factor != 1.0 {
        breakdown.insert(LABEL_FACTOR, factor_part);
    }
    if adjustments.offset != 0.0 {
        breakdown.insert(LABEL_OFFSET, adjustments.offset);
    }
    total = total + factor_part + adjustments.offset;
    total = round_to_tenth(total);

    if total < adjustments.minimum {
        breakdown.insert(LABEL_MINIMUM, adjustments.minimum);
        total = adjustments.minimum;
    }

    (total, breakdown)
}
