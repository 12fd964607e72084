//! Area percentages per sample and the percentage threshold filter

use crate::{GeneScanError, GeneScanResult, Peak, ResolvedPeak};

/// Round to `precision` decimal places, ties to even
pub fn round_half_even(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round_ties_even() / scale
}

/// Annotate each remaining peak of one sample with its share of the
/// sample's total area. A sample whose peaks sum to zero area is an error,
/// since its percentages are undefined.
pub fn add_percentages(
    sample_name: &str,
    peaks: Vec<Peak>,
    precision: Option<u32>,
) -> GeneScanResult<Vec<ResolvedPeak>> {
    let total_area: f64 = peaks.iter().map(|p| p.area).sum();
    if total_area <= 0.0 {
        return Err(GeneScanError::ZeroArea {
            samples: vec![sample_name.to_string()],
        });
    }

    Ok(peaks
        .into_iter()
        .map(|peak| {
            let share = peak.area / total_area * 100.0;
            let percentage = match precision {
                Some(places) => round_half_even(share, places),
                None => share,
            };
            ResolvedPeak { peak, percentage }
        })
        .collect())
}

pub fn passes_threshold(peak: &ResolvedPeak, filter_threshold: f64) -> bool {
    peak.percentage >= filter_threshold
}

/// Split peaks into those at or above the threshold and those below it
pub fn filter_by_threshold(
    peaks: Vec<ResolvedPeak>,
    filter_threshold: f64,
) -> (Vec<ResolvedPeak>, Vec<ResolvedPeak>) {
    peaks
        .into_iter()
        .partition(|peak| passes_threshold(peak, filter_threshold))
}
