//! Run summary: how many clusters were resolved and where every peak ended up

use crate::resolve::ClusterKind;
use crate::{LabelledPeak, PeakFate};

/// Number of mountain ranges of each kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterTally {
    pub isolated: usize,
    pub pairs: usize,
    pub collapsed: usize,
    pub unresolved: usize,
}

impl ClusterTally {
    pub fn record(&mut self, kind: ClusterKind) {
        match kind {
            ClusterKind::Isolated => self.isolated += 1,
            ClusterKind::Pair => self.pairs += 1,
            ClusterKind::Collapsed => self.collapsed += 1,
            ClusterKind::Unresolved => self.unresolved += 1,
        }
    }

    pub fn merge(&mut self, other: &ClusterTally) {
        self.isolated += other.isolated;
        self.pairs += other.pairs;
        self.collapsed += other.collapsed;
        self.unresolved += other.unresolved;
    }

    pub fn total(&self) -> usize {
        self.isolated + self.pairs + self.collapsed + self.unresolved
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub samples: usize,
    pub input_peaks: usize,
    pub retained: usize,
    pub filtered: usize,
    pub removed: usize,
    pub clusters: ClusterTally,
}

impl RunSummary {
    pub fn from_labelled(samples: usize, labelled: &[LabelledPeak], clusters: ClusterTally) -> Self {
        let count = |fate: PeakFate| labelled.iter().filter(|p| p.fate == fate).count();
        Self {
            samples,
            input_peaks: labelled.len(),
            retained: count(PeakFate::Retained),
            filtered: count(PeakFate::Filtered),
            removed: count(PeakFate::Removed),
            clusters,
        }
    }

    pub fn log(&self) {
        log::info!("Peak cleaning summary:");
        log::info!("  Samples: {}", self.samples);
        log::info!("  Input peaks: {}", self.input_peaks);
        for (fate, n) in [
            (PeakFate::Retained, self.retained),
            (PeakFate::Filtered, self.filtered),
            (PeakFate::Removed, self.removed),
        ] {
            log::info!("  {}: {} ({:.1}%)", fate.as_str(), n, share(n, self.input_peaks));
        }
        log::info!(
            "  Mountain ranges: {} ({} isolated, {} pairs, {} collapsed, {} unresolved)",
            self.clusters.total(),
            self.clusters.isolated,
            self.clusters.pairs,
            self.clusters.collapsed,
            self.clusters.unresolved
        );
        if self.clusters.unresolved > 0 {
            log::warn!(
                "{} mountain ranges exceed the cluster size and were left for manual review",
                self.clusters.unresolved
            );
        }
    }
}

fn share(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
