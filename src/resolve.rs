//! Deciding which peaks of a mountain range are artefacts

use crate::{Peak, PeakStatus};
use std::ops::Range;

/// How a mountain range is treated, based on its length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterKind {
    /// A lone peak, always kept
    Isolated,
    /// Two peaks: the smaller area is dropped, both kept on a tie
    Pair,
    /// 3..=cluster_size peaks collapsed onto the largest area
    Collapsed,
    /// Longer than cluster_size; left for the user to judge
    Unresolved,
}

impl ClusterKind {
    pub fn classify(len: usize, cluster_size: usize) -> Self {
        match len {
            0 | 1 => ClusterKind::Isolated,
            2 => ClusterKind::Pair,
            n if n <= cluster_size => ClusterKind::Collapsed,
            _ => ClusterKind::Unresolved,
        }
    }
}

/// Indices (into `peaks`) of the artefacts within one mountain range
pub fn resolve_cluster(peaks: &[Peak], cluster: Range<usize>, cluster_size: usize) -> Vec<usize> {
    match ClusterKind::classify(cluster.len(), cluster_size) {
        ClusterKind::Isolated | ClusterKind::Unresolved => Vec::new(),
        ClusterKind::Pair => {
            let (a, b) = (cluster.start, cluster.start + 1);
            if peaks[a].area > peaks[b].area {
                vec![b]
            } else if peaks[b].area > peaks[a].area {
                vec![a]
            } else {
                Vec::new()
            }
        }
        ClusterKind::Collapsed => {
            let mut largest = cluster.start;
            for i in cluster.clone() {
                if peaks[i].area > peaks[largest].area {
                    largest = i;
                }
            }
            cluster.filter(|&i| i != largest).collect()
        }
    }
}

/// Flat list of artefact indices across all mountain ranges of a sample
pub fn find_artefacts(peaks: &[Peak], ranges: &[Range<usize>], cluster_size: usize) -> Vec<usize> {
    let mut remove = Vec::new();
    for range in ranges {
        let artefacts = resolve_cluster(peaks, range.clone(), cluster_size);
        if !artefacts.is_empty() {
            log::debug!(
                "{}: cluster {:.2}-{:.2} ({} peaks) drops {} peaks",
                peaks[range.start].sample_name,
                peaks[range.start].size,
                peaks[range.end - 1].size,
                range.len(),
                artefacts.len()
            );
        }
        remove.extend(artefacts);
    }
    remove
}

/// Status of every peak given the artefact indices
pub fn label_artefacts(len: usize, remove: &[usize]) -> Vec<PeakStatus> {
    let mut statuses = vec![PeakStatus::Kept; len];
    for &i in remove {
        statuses[i] = PeakStatus::Removed;
    }
    statuses
}
