//! GeneScan peak table loading, grouping by sample, and CSV output

use crate::utils::{create_output, open_input};
use crate::{GeneScanError, GeneScanResult, LabelledPeak, Peak, PeakFate, ResolvedPeak};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

pub const SAMPLE_COLUMN: &str = "Sample File Name";
pub const SIZE_COLUMN: &str = "Size";
pub const HEIGHT_COLUMN: &str = "Height";
pub const AREA_COLUMN: &str = "Area";

pub const REQUIRED_COLUMNS: [&str; 4] = [SAMPLE_COLUMN, SIZE_COLUMN, HEIGHT_COLUMN, AREA_COLUMN];

/// Positions of the required columns in the input header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndices {
    pub sample: usize,
    pub size: usize,
    pub height: usize,
    pub area: usize,
}

impl ColumnIndices {
    pub fn from_headers(headers: &csv::StringRecord) -> GeneScanResult<Self> {
        let found: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let position = |name: &str| found.iter().position(|col| col == name);

        match (
            position(SAMPLE_COLUMN),
            position(SIZE_COLUMN),
            position(HEIGHT_COLUMN),
            position(AREA_COLUMN),
        ) {
            (Some(sample), Some(size), Some(height), Some(area)) => Ok(ColumnIndices {
                sample,
                size,
                height,
                area,
            }),
            _ => {
                let missing = REQUIRED_COLUMNS
                    .iter()
                    .filter(|col| position(**col).is_none())
                    .map(|col| col.to_string())
                    .collect();
                Err(GeneScanError::MissingColumns {
                    missing,
                    expected: REQUIRED_COLUMNS.iter().map(|col| col.to_string()).collect(),
                    found,
                })
            }
        }
    }
}

/// Peaks grouped by sample name; each sample is sorted by size
#[derive(Debug, Clone, Default)]
pub struct PeakTable {
    samples: BTreeMap<String, Vec<Peak>>,
}

impl PeakTable {
    /// Group peaks by sample and stable-sort each sample by size, so equal
    /// sizes keep their input order.
    pub fn from_peaks(peaks: Vec<Peak>) -> Self {
        let mut samples: BTreeMap<String, Vec<Peak>> = BTreeMap::new();
        for peak in peaks {
            samples.entry(peak.sample_name.clone()).or_default().push(peak);
        }
        for peaks in samples.values_mut() {
            peaks.sort_by(|a, b| a.size.total_cmp(&b.size));
        }
        Self { samples }
    }

    /// Samples in ascending name order
    pub fn samples(&self) -> impl Iterator<Item = (&str, &[Peak])> {
        self.samples
            .iter()
            .map(|(name, peaks)| (name.as_str(), peaks.as_slice()))
    }

    pub fn sample(&self, name: &str) -> Option<&[Peak]> {
        self.samples.get(name).map(|peaks| peaks.as_slice())
    }

    pub fn sample_names(&self) -> Vec<&str> {
        self.samples.keys().map(|name| name.as_str()).collect()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn num_peaks(&self) -> usize {
        self.samples.values().map(|peaks| peaks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Read a GeneScan CSV export (plain or gzipped) into a peak table
pub fn read_peak_table<P: AsRef<Path>>(path: P) -> GeneScanResult<PeakTable> {
    let reader = open_input(&path)?;
    let peaks = read_peaks(reader)?;
    log::info!(
        "Read {} peaks from {:?}",
        peaks.len(),
        path.as_ref()
    );
    Ok(PeakTable::from_peaks(peaks))
}

/// Parse peak records from CSV data. Columns other than the required ones
/// are ignored; fields are trimmed of surrounding whitespace.
pub fn read_peaks<R: Read>(reader: R) -> GeneScanResult<Vec<Peak>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let indices = ColumnIndices::from_headers(csv_reader.headers()?)?;
    log::debug!("Column layout: {:?}", indices);

    let mut peaks = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let sample_name = record.get(indices.sample).unwrap_or("");
        if sample_name.is_empty() {
            return Err(GeneScanError::InvalidPeak(format!(
                "line {}: empty '{}'",
                line, SAMPLE_COLUMN
            )));
        }

        let size = parse_number(&record, indices.size, SIZE_COLUMN, line)?;
        let height = parse_number(&record, indices.height, HEIGHT_COLUMN, line)?;
        let area = parse_number(&record, indices.area, AREA_COLUMN, line)?;
        if area < 0.0 {
            return Err(GeneScanError::InvalidPeak(format!(
                "line {}: negative '{}' {}",
                line, AREA_COLUMN, area
            )));
        }

        peaks.push(Peak::new(sample_name.to_string(), size, height, area));
    }

    Ok(peaks)
}

fn parse_number(
    record: &csv::StringRecord,
    index: usize,
    column: &str,
    line: u64,
) -> GeneScanResult<f64> {
    let raw = record.get(index).unwrap_or("");
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(GeneScanError::InvalidPeak(format!(
            "line {}: invalid '{}' value '{}'",
            line, column, raw
        ))),
    }
}

#[derive(Debug, Serialize)]
struct CleanPeakRow<'a> {
    #[serde(rename = "Sample File Name")]
    sample_name: &'a str,
    #[serde(rename = "Size")]
    size: f64,
    #[serde(rename = "Height")]
    height: f64,
    #[serde(rename = "Area")]
    area: f64,
    #[serde(rename = "Percentage")]
    percentage: f64,
}

#[derive(Debug, Serialize)]
struct PeakStatusRow<'a> {
    #[serde(rename = "Sample File Name")]
    sample_name: &'a str,
    #[serde(rename = "Size")]
    size: f64,
    #[serde(rename = "Height")]
    height: f64,
    #[serde(rename = "Area")]
    area: f64,
    #[serde(rename = "Status")]
    status: PeakFate,
    #[serde(rename = "Percentage")]
    percentage: Option<f64>,
}

/// Write cleaned peaks as `Sample File Name,Size,Height,Area,Percentage`
pub fn write_clean_peaks<W: Write>(peaks: &[ResolvedPeak], writer: W) -> GeneScanResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if peaks.is_empty() {
        csv_writer.write_record([SAMPLE_COLUMN, SIZE_COLUMN, HEIGHT_COLUMN, AREA_COLUMN, "Percentage"])?;
    }
    for resolved in peaks {
        csv_writer.serialize(CleanPeakRow {
            sample_name: &resolved.peak.sample_name,
            size: resolved.peak.size,
            height: resolved.peak.height,
            area: resolved.peak.area,
            percentage: resolved.percentage,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write every input peak with its terminal status, for before/after plots
pub fn write_peak_status<W: Write>(peaks: &[LabelledPeak], writer: W) -> GeneScanResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if peaks.is_empty() {
        csv_writer.write_record([
            SAMPLE_COLUMN,
            SIZE_COLUMN,
            HEIGHT_COLUMN,
            AREA_COLUMN,
            "Status",
            "Percentage",
        ])?;
    }
    for labelled in peaks {
        csv_writer.serialize(PeakStatusRow {
            sample_name: &labelled.peak.sample_name,
            size: labelled.peak.size,
            height: labelled.peak.height,
            area: labelled.peak.area,
            status: labelled.fate,
            percentage: labelled.percentage,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_clean_peaks_file<P: AsRef<Path>>(
    peaks: &[ResolvedPeak],
    output_path: P,
) -> GeneScanResult<()> {
    let mut output = create_output(&output_path)?;
    write_clean_peaks(peaks, &mut output)?;
    output.finish()?;
    log::info!("Wrote {} peaks to {:?}", peaks.len(), output_path.as_ref());
    Ok(())
}

pub fn write_peak_status_file<P: AsRef<Path>>(
    peaks: &[LabelledPeak],
    output_path: P,
) -> GeneScanResult<()> {
    let mut output = create_output(&output_path)?;
    write_peak_status(peaks, &mut output)?;
    output.finish()?;
    log::info!("Wrote status of {} peaks to {:?}", peaks.len(), output_path.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const GENESCAN_EXPORT: &str = "\
Dye/Sample Peak,Sample File Name,Marker,Allele,Size,Height,Area,Data Point
\"B,1\", S2 ,,,210.4,800,4000,3120
\"B,2\",S1,,,150.2,1200,9000,2500
\"B,3\",S1 ,,,100.0,300,1500,1800
\"B,4\",S1,,,100.0,350,1600,1801
";

    #[test]
    fn test_read_peaks_tolerates_extra_columns() {
        let peaks = read_peaks(GENESCAN_EXPORT.as_bytes()).unwrap();

        assert_eq!(peaks.len(), 4);
        assert_eq!(peaks[0], Peak::new("S2".to_string(), 210.4, 800.0, 4000.0));
        assert_eq!(peaks[2].sample_name, "S1");
    }

    #[test]
    fn test_peak_table_groups_and_sorts() {
        let table = PeakTable::from_peaks(read_peaks(GENESCAN_EXPORT.as_bytes()).unwrap());

        assert_eq!(table.sample_names(), vec!["S1", "S2"]);
        assert_eq!(table.num_samples(), 2);
        assert_eq!(table.num_peaks(), 4);

        let s1 = table.sample("S1").unwrap();
        let sizes: Vec<f64> = s1.iter().map(|p| p.size).collect();
        assert_eq!(sizes, vec![100.0, 100.0, 150.2]);
        // equal sizes keep input order
        assert_eq!(s1[0].area, 1500.0);
        assert_eq!(s1[1].area, 1600.0);
    }

    #[test]
    fn test_missing_area_column() {
        let data = "Sample File Name,Size,Height\nS1,100.0,300\n";
        match read_peaks(data.as_bytes()) {
            Err(GeneScanError::MissingColumns { missing, expected, found }) => {
                assert_eq!(missing, vec!["Area".to_string()]);
                assert_eq!(expected.len(), 4);
                assert_eq!(found, vec!["Sample File Name", "Size", "Height"]);
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let non_numeric = "Sample File Name,Size,Height,Area\nS1,abc,300,10\n";
        assert!(matches!(
            read_peaks(non_numeric.as_bytes()),
            Err(GeneScanError::InvalidPeak(_))
        ));

        let negative_area = "Sample File Name,Size,Height,Area\nS1,100,300,-10\n";
        assert!(matches!(
            read_peaks(negative_area.as_bytes()),
            Err(GeneScanError::InvalidPeak(_))
        ));

        let missing_name = "Sample File Name,Size,Height,Area\n ,100,300,10\n";
        assert!(matches!(
            read_peaks(missing_name.as_bytes()),
            Err(GeneScanError::InvalidPeak(_))
        ));

        let not_finite = "Sample File Name,Size,Height,Area\nS1,NaN,300,10\n";
        assert!(matches!(
            read_peaks(not_finite.as_bytes()),
            Err(GeneScanError::InvalidPeak(_))
        ));
    }

    #[test]
    fn test_read_peak_table_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", GENESCAN_EXPORT).unwrap();

        let table = read_peak_table(temp_file.path()).unwrap();
        assert_eq!(table.num_peaks(), 4);
    }

    #[test]
    fn test_write_clean_peaks() {
        let peaks = vec![
            ResolvedPeak {
                peak: Peak::new("S1".to_string(), 100.5, 20.0, 50.0),
                percentage: 62.5,
            },
            ResolvedPeak {
                peak: Peak::new("S1".to_string(), 200.0, 10.0, 30.0),
                percentage: 37.5,
            },
        ];

        let mut buffer = Vec::new();
        write_clean_peaks(&peaks, &mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "Sample File Name,Size,Height,Area,Percentage");
        assert_eq!(lines[1], "S1,100.5,20.0,50.0,62.5");
        assert_eq!(lines[2], "S1,200.0,10.0,30.0,37.5");
    }

    #[test]
    fn test_write_empty_tables_keep_header() {
        let mut buffer = Vec::new();
        write_clean_peaks(&[], &mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "Sample File Name,Size,Height,Area,Percentage\n"
        );

        let mut buffer = Vec::new();
        write_peak_status(&[], &mut buffer).unwrap();
        assert!(String::from_utf8(buffer).unwrap().starts_with("Sample File Name,Size,Height,Area,Status"));
    }

    #[test]
    fn test_gzipped_clean_peaks_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run1_cleanPeaks.csv.gz");
        let peaks = vec![ResolvedPeak {
            peak: Peak::new("S1".to_string(), 100.5, 20.0, 50.0),
            percentage: 100.0,
        }];

        write_clean_peaks_file(&peaks, &path).unwrap();

        let mut content = String::new();
        open_input(&path).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(
            content,
            "Sample File Name,Size,Height,Area,Percentage\nS1,100.5,20.0,50.0,100.0\n"
        );
    }

    #[test]
    fn test_write_peak_status() {
        let peaks = vec![
            LabelledPeak {
                peak: Peak::new("S1".to_string(), 100.0, 5.0, 10.0),
                fate: PeakFate::Removed,
                percentage: None,
            },
            LabelledPeak {
                peak: Peak::new("S1".to_string(), 100.5, 20.0, 50.0),
                fate: PeakFate::Retained,
                percentage: Some(62.5),
            },
        ];

        let mut buffer = Vec::new();
        write_peak_status(&peaks, &mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "Sample File Name,Size,Height,Area,Status,Percentage");
        assert_eq!(lines[1], "S1,100.0,5.0,10.0,Removed,");
        assert_eq!(lines[2], "S1,100.5,20.0,50.0,Retained,62.5");
    }
}
