//! Peak cleaning pipeline: mountain ranges, artefact removal, area
//! percentages and the percentage filter, applied sample by sample

use crate::{
    cluster::find_mountain_ranges,
    percentage::{add_percentages, filter_by_threshold, passes_threshold},
    report::{ClusterTally, RunSummary},
    resolve::{find_artefacts, label_artefacts, ClusterKind},
    table::{read_peak_table, PeakTable},
    GeneScanError, GeneScanResult, LabelledPeak, Peak, PeakFate, PeakStatus, ResolvedPeak,
    ScanConfig,
};
use rayon::prelude::*;
use std::path::Path;

const MAX_PRECISION: u32 = 10;

/// Result of cleaning a single sample
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub labelled: Vec<LabelledPeak>,
    pub retained: Vec<ResolvedPeak>,
    pub clusters: ClusterTally,
}

/// Result of cleaning a whole peak table
#[derive(Debug, Clone)]
pub struct CleanedPeaks {
    /// Peaks that made it into the output, by sample name then size
    pub retained: Vec<ResolvedPeak>,
    /// Every input peak with its terminal state, same order
    pub labelled: Vec<LabelledPeak>,
    pub summary: RunSummary,
}

/// Validate configuration parameters before any peaks are touched
pub fn validate_scan_config(config: &ScanConfig) -> GeneScanResult<()> {
    if !config.peak_gap.is_finite() || config.peak_gap < 0.0 {
        return Err(GeneScanError::InvalidConfig(format!(
            "peak_gap must be a non-negative number, got {}",
            config.peak_gap
        )));
    }

    if config.cluster_size < 1 {
        return Err(GeneScanError::InvalidConfig(
            "cluster_size must be at least 1".to_string(),
        ));
    }

    if !config.filter_threshold.is_finite()
        || config.filter_threshold < 0.0
        || config.filter_threshold > 100.0
    {
        return Err(GeneScanError::InvalidConfig(format!(
            "filter threshold must be between 0 and 100, got {}",
            config.filter_threshold
        )));
    }

    if let Some(places) = config.precision {
        if places > MAX_PRECISION {
            return Err(GeneScanError::InvalidConfig(format!(
                "precision must be at most {} decimal places, got {}",
                MAX_PRECISION, places
            )));
        }
    }

    if config.num_processes < 1 {
        return Err(GeneScanError::InvalidConfig(
            "num_processes must be at least 1".to_string(),
        ));
    }

    Ok(())
}

/// Clean the size-sorted peaks of one sample
pub fn clean_sample(
    sample_name: &str,
    peaks: &[Peak],
    config: &ScanConfig,
) -> GeneScanResult<SampleOutcome> {
    let ranges = find_mountain_ranges(peaks, config.peak_gap);
    let mut clusters = ClusterTally::default();
    for range in &ranges {
        clusters.record(ClusterKind::classify(range.len(), config.cluster_size));
    }

    let remove = find_artefacts(peaks, &ranges, config.cluster_size);
    let statuses = label_artefacts(peaks.len(), &remove);

    let mut labelled: Vec<LabelledPeak> = peaks
        .iter()
        .map(|peak| LabelledPeak {
            peak: peak.clone(),
            fate: PeakFate::Removed,
            percentage: None,
        })
        .collect();

    let kept_indices: Vec<usize> = statuses
        .iter()
        .enumerate()
        .filter(|(_, status)| **status == PeakStatus::Kept)
        .map(|(i, _)| i)
        .collect();
    let kept: Vec<Peak> = kept_indices.iter().map(|&i| peaks[i].clone()).collect();

    let resolved = add_percentages(sample_name, kept, config.precision)?;
    for (&i, peak) in kept_indices.iter().zip(&resolved) {
        labelled[i].percentage = Some(peak.percentage);
        labelled[i].fate = if passes_threshold(peak, config.filter_threshold) {
            PeakFate::Retained
        } else {
            PeakFate::Filtered
        };
    }

    let (retained, filtered) = filter_by_threshold(resolved, config.filter_threshold);
    log::debug!(
        "{}: {} peaks in {} mountain ranges, {} removed, {} filtered, {} retained",
        sample_name,
        peaks.len(),
        ranges.len(),
        remove.len(),
        filtered.len(),
        retained.len()
    );

    Ok(SampleOutcome {
        labelled,
        retained,
        clusters,
    })
}

/// Clean every sample of a peak table.
///
/// Samples are independent; with `num_processes > 1` they are cleaned on a
/// dedicated thread pool. Output order does not depend on the thread count.
/// Every sample whose retained area is zero is reported in a single
/// `ZeroArea` error.
pub fn clean_peak_table(table: &PeakTable, config: &ScanConfig) -> GeneScanResult<CleanedPeaks> {
    validate_scan_config(config)?;

    if table.is_empty() {
        log::warn!("Peak table contains no peaks");
    }

    let samples: Vec<(&str, &[Peak])> = table.samples().collect();
    let outcomes: Vec<GeneScanResult<SampleOutcome>> = if config.num_processes > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_processes)
            .build()
            .map_err(|e| {
                GeneScanError::InvalidConfig(format!(
                    "cannot start {} worker threads: {}",
                    config.num_processes, e
                ))
            })?;
        pool.install(|| {
            samples
                .par_iter()
                .map(|(name, peaks)| clean_sample(name, peaks, config))
                .collect::<Vec<_>>()
        })
    } else {
        samples
            .iter()
            .map(|(name, peaks)| clean_sample(name, peaks, config))
            .collect()
    };

    let mut retained = Vec::new();
    let mut labelled = Vec::with_capacity(table.num_peaks());
    let mut clusters = ClusterTally::default();
    let mut degenerate = Vec::new();

    for outcome in outcomes {
        match outcome {
            Ok(sample) => {
                retained.extend(sample.retained);
                labelled.extend(sample.labelled);
                clusters.merge(&sample.clusters);
            }
            Err(GeneScanError::ZeroArea { samples }) => degenerate.extend(samples),
            Err(e) => return Err(e),
        }
    }

    if !degenerate.is_empty() {
        return Err(GeneScanError::ZeroArea {
            samples: degenerate,
        });
    }

    let summary = RunSummary::from_labelled(table.num_samples(), &labelled, clusters);
    Ok(CleanedPeaks {
        retained,
        labelled,
        summary,
    })
}

/// Read a GeneScan CSV export and clean it
pub fn clean_peak_file<P: AsRef<Path>>(path: P, config: &ScanConfig) -> GeneScanResult<CleanedPeaks> {
    validate_scan_config(config)?;
    let table = read_peak_table(path)?;
    clean_peak_table(&table, config)
}
