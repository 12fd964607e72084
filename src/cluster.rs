//! Mountain range detection: grouping neighbouring peaks of one sample

use crate::Peak;
use std::ops::Range;

/// Split a sample's size-sorted peaks into maximal runs in which every pair
/// of neighbours is at most `peak_gap` apart.
///
/// The returned ranges index into `peaks`, are ordered, disjoint and cover
/// every peak exactly once. Isolated peaks come back as runs of length one.
pub fn find_mountain_ranges(peaks: &[Peak], peak_gap: f64) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    if peaks.is_empty() {
        return ranges;
    }

    let mut start = 0;
    for (i, pair) in peaks.windows(2).enumerate() {
        if pair[1].size - pair[0].size > peak_gap {
            ranges.push(start..i + 1);
            start = i + 1;
        }
    }
    ranges.push(start..peaks.len());

    ranges
}
