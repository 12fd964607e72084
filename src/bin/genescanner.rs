//! CLI binary for cleaning GeneScan peak tables

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use genescanner_rs::{
    pipeline::{clean_peak_table, validate_scan_config},
    table::{read_peak_table, write_clean_peaks_file, write_peak_status_file},
    utils::{ensure_parent_dirs, get_num_cpus, validate_file_readable, Timer},
    GeneScanError, GeneScanResult, ScanConfig,
};
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "genescanner", version)]
#[command(about = "Remove artefact peaks from GeneScan data and report area percentages")]
#[command(long_about = "
genescanner reads the peak table exported by GeneScan (CSV, one row per peak)
and cleans it sample by sample:

1. Peaks whose sizes are within --peak-gap of their neighbour form a mountain range
2. In a range of two peaks the smaller area is removed (both kept when equal);
   in a range of 3 to --cluster-size peaks only the largest area is kept;
   longer ranges are left untouched for manual review
3. Each remaining peak gets its area as a percentage of the sample's total area
4. Peaks below the --filter percentage are dropped

The input needs the columns 'Sample File Name', 'Size', 'Height' and 'Area';
other columns are ignored. The output <prefix>_cleanPeaks.csv has the columns
'Sample File Name, Size, Height, Area, Percentage'.
")]
#[command(after_help = "Example: genescanner --outdir results --prefix run1 run1_peaks.csv")]
struct Args {
    /// GeneScan peak table in CSV format, optionally gzipped
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Directory for output files
    #[arg(long, value_name = "DIR", default_value = ".")]
    outdir: PathBuf,

    /// Prefix of output file names
    #[arg(long, default_value = "out")]
    prefix: String,

    /// Neighbouring peaks at most this far apart (bp) belong to one mountain range
    #[arg(long, alias = "peak_gap", default_value_t = 1.7)]
    peak_gap: f64,

    /// Largest mountain range collapsed onto its largest peak
    #[arg(long, alias = "cluster_size", default_value_t = 3)]
    cluster_size: usize,

    /// Drop peaks whose area percentage is below this value
    #[arg(long = "filter", value_name = "PERCENT", default_value_t = 0.0)]
    filter: f64,

    /// Round percentages to this many decimal places (ties to even)
    #[arg(long, value_name = "PLACES")]
    precision: Option<u32>,

    /// Number of threads used to process samples
    #[arg(long, default_value_t = 1)]
    num_processes: usize,

    /// Also write every input peak with its status (Retained, Filtered, Removed)
    #[arg(long)]
    status_table: bool,

    /// Gzip-compress output files
    #[arg(long)]
    gzip: bool,

    /// Write log messages to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Force overwrite of output files if they exist
    #[arg(short, long)]
    force: bool,
}

impl Args {
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            peak_gap: self.peak_gap,
            cluster_size: self.cluster_size,
            filter_threshold: self.filter,
            precision: self.precision,
            num_processes: self.num_processes,
        }
    }

    fn output_path(&self, suffix: &str) -> PathBuf {
        let extension = if self.gzip { "csv.gz" } else { "csv" };
        self.outdir
            .join(format!("{}_{}.{}", self.prefix, suffix, extension))
    }

    fn clean_peaks_path(&self) -> PathBuf {
        self.output_path("cleanPeaks")
    }

    fn status_table_path(&self) -> Option<PathBuf> {
        self.status_table.then(|| self.output_path("peakStatus"))
    }
}

/// Create the `--log-file` target, honouring `--force` like the output tables
fn open_log_file(path: &Path, force: bool) -> anyhow::Result<File> {
    if path.exists() && !force {
        anyhow::bail!(
            "Log file {:?} already exists. Use --force to overwrite.",
            path
        );
    }
    ensure_parent_dirs(path)
        .with_context(|| format!("creating directory for log file {:?}", path))?;
    File::create(path).with_context(|| format!("creating log file {:?}", path))
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(log_level));
    builder.format_timestamp_secs();

    if let Some(path) = &args.log_file {
        let file = open_log_file(path, args.force)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("initialising logger")?;

    log::info!(
        "Command line: {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    );
    Ok(())
}

fn run(args: &Args) -> GeneScanResult<()> {
    log::info!("Starting genescanner");
    log::info!("Input: {:?}", args.input);
    log::info!("Output directory: {:?}", args.outdir);

    validate_file_readable(&args.input)?;

    let config = args.scan_config();
    validate_scan_config(&config)?;
    log::info!(
        "Configuration: peak_gap={}, cluster_size={}, filter={}, precision={:?}",
        config.peak_gap,
        config.cluster_size,
        config.filter_threshold,
        config.precision
    );
    if config.num_processes > get_num_cpus() {
        log::warn!(
            "{} threads requested but only {} CPUs available",
            config.num_processes,
            get_num_cpus()
        );
    }

    let clean_path = args.clean_peaks_path();
    let status_path = args.status_table_path();

    // Refuse to clobber earlier results
    for path in std::iter::once(&clean_path).chain(status_path.as_ref()) {
        if path.exists() && !args.force {
            return Err(GeneScanError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("Output file {:?} already exists. Use --force to overwrite.", path),
            )));
        }
    }

    let table = {
        let _timer = Timer::new("Reading peak table");
        read_peak_table(&args.input)?
    };
    log::info!(
        "Read {} peaks across {} samples",
        table.num_peaks(),
        table.num_samples()
    );

    let cleaned = {
        let _timer = Timer::new("Cleaning peaks");
        clean_peak_table(&table, &config)?
    };
    cleaned.summary.log();

    std::fs::create_dir_all(&args.outdir)?;
    write_clean_peaks_file(&cleaned.retained, &clean_path)?;
    if let Some(path) = &status_path {
        write_peak_status_file(&cleaned.labelled, path)?;
    }

    log::info!("Cleaned peaks written to: {:?}", clean_path);
    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: GeneScanError) -> ! {
    match error {
        GeneScanError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the file exists and is readable.");
        }
        GeneScanError::MissingColumns {
            missing,
            expected,
            found,
        } => {
            eprintln!("Error: Input is missing the columns {:?}", missing);
            eprintln!("Expected columns: {:?}", expected);
            eprintln!("Found columns: {:?}", found);
            eprintln!("Rename the columns of the GeneScan export and retry.");
        }
        GeneScanError::InvalidPeak(msg) => {
            eprintln!("Error: Invalid peak data: {}", msg);
            eprintln!("Sizes, heights and areas must be numbers; areas must not be negative.");
        }
        GeneScanError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
            eprintln!("Please check --peak-gap, --cluster-size, --filter and --precision.");
        }
        GeneScanError::ZeroArea { samples } => {
            eprintln!("Error: Total peak area is zero for samples: {}", samples.join(", "));
            eprintln!("Percentages cannot be computed for these samples. Remove them or check their areas.");
        }
        GeneScanError::Csv(ref e) => {
            eprintln!("Error: CSV processing error: {}", e);
            eprintln!("Please check that the input is a comma-separated GeneScan export.");
        }
        GeneScanError::Io(ref e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
    }
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(&args) {
        // stderr already gets the message below
        if args.log_file.is_some() {
            log::error!("{}", e);
        }
        handle_error(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PEAKS: &str = "\
Dye/Sample Peak,Sample File Name,Marker,Allele,Size,Height,Area,Data Point
\"B,1\",S1,,,100.0,20,10,1800
\"B,2\",S1,,,100.5,120,50,1805
\"B,3\",S1,,,200.0,60,30,2900
\"B,4\",S2,,,50.0,10,5,900
\"B,5\",S2,,,50.5,10,5,905
\"B,6\",S2,,,51.0,10,5,910
";

    fn input_file() -> NamedTempFile {
        let mut input = NamedTempFile::new().unwrap();
        write!(input, "{}", PEAKS).unwrap();
        input
    }

    fn args(input: &Path, outdir: &Path, extra: &[&str]) -> Args {
        let mut argv = vec![
            "genescanner".to_string(),
            "--outdir".to_string(),
            outdir.to_string_lossy().to_string(),
            "--peak-gap".to_string(),
            "1.0".to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        argv.push(input.to_string_lossy().to_string());
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_default_config() {
        let args = Args::try_parse_from(["genescanner", "peaks.csv"]).unwrap();
        let config = args.scan_config();
        assert_eq!(config.peak_gap, 1.7);
        assert_eq!(config.cluster_size, 3);
        assert_eq!(config.filter_threshold, 0.0);
        assert_eq!(config.precision, None);
        assert_eq!(config.num_processes, 1);
        assert_eq!(args.clean_peaks_path(), PathBuf::from("./out_cleanPeaks.csv"));
        assert_eq!(args.status_table_path(), None);
    }

    #[test]
    fn test_underscore_aliases() {
        let args = Args::try_parse_from([
            "genescanner",
            "--peak_gap",
            "1.2",
            "--cluster_size",
            "5",
            "--filter",
            "1.0",
            "peaks.csv",
        ])
        .unwrap();
        let config = args.scan_config();
        assert_eq!(config.peak_gap, 1.2);
        assert_eq!(config.cluster_size, 5);
        assert_eq!(config.filter_threshold, 1.0);
    }

    #[test]
    fn test_output_paths() {
        let args = Args::try_parse_from([
            "genescanner",
            "--outdir",
            "results",
            "--prefix",
            "run1",
            "--gzip",
            "--status-table",
            "peaks.csv",
        ])
        .unwrap();
        assert_eq!(
            args.clean_peaks_path(),
            Path::new("results").join("run1_cleanPeaks.csv.gz")
        );
        assert_eq!(
            args.status_table_path(),
            Some(Path::new("results").join("run1_peakStatus.csv.gz"))
        );
    }

    #[test]
    fn test_run_writes_clean_peaks() {
        let input = input_file();
        let dir = tempfile::tempdir().unwrap();
        let outdir = dir.path().join("out");
        let args = args(input.path(), &outdir, &["--status-table"]);

        run(&args).unwrap();

        let output = std::fs::read_to_string(args.clean_peaks_path()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Sample File Name,Size,Height,Area,Percentage",
                "S1,100.5,120.0,50.0,62.5",
                "S1,200.0,60.0,30.0,37.5",
                "S2,50.0,10.0,5.0,100.0",
            ]
        );

        let status = std::fs::read_to_string(args.status_table_path().unwrap()).unwrap();
        assert_eq!(status.lines().count(), 7);
        assert_eq!(status.matches(",Removed,").count(), 3);
    }

    #[test]
    fn test_run_applies_filter() {
        let input = input_file();
        let dir = tempfile::tempdir().unwrap();
        let args = args(input.path(), dir.path(), &["--filter", "40"]);

        run(&args).unwrap();

        let output = std::fs::read_to_string(args.clean_peaks_path()).unwrap();
        assert!(output.contains("S1,100.5,120.0,50.0,62.5"));
        assert!(!output.contains("S1,200.0"));
        assert!(output.contains("S2,50.0"));
    }

    #[test]
    fn test_run_refuses_to_overwrite() {
        let input = input_file();
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("out_cleanPeaks.csv");
        std::fs::write(&existing, "keep me").unwrap();

        let result = run(&args(input.path(), dir.path(), &[]));
        assert!(matches!(result, Err(GeneScanError::Io(_))));
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "keep me");

        run(&args(input.path(), dir.path(), &["--force"])).unwrap();
        assert!(std::fs::read_to_string(&existing).unwrap().starts_with("Sample File Name"));
    }

    #[test]
    fn test_run_missing_column_writes_nothing() {
        let mut input = NamedTempFile::new().unwrap();
        writeln!(input, "Sample File Name,Size,Height").unwrap();
        writeln!(input, "S1,100.0,20").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let args = args(input.path(), dir.path(), &[]);

        let result = run(&args);
        assert!(matches!(result, Err(GeneScanError::MissingColumns { .. })));
        assert!(!args.clean_peaks_path().exists());
    }

    #[test]
    fn test_run_rejects_invalid_config() {
        let input = input_file();
        let dir = tempfile::tempdir().unwrap();
        let args = args(input.path(), dir.path(), &["--cluster-size", "0"]);

        assert!(matches!(run(&args), Err(GeneScanError::InvalidConfig(_))));
        assert!(!args.clean_peaks_path().exists());
    }

    #[test]
    fn test_log_file_created_in_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("nested").join("run_log.txt");
        let args = Args::try_parse_from([
            "genescanner".to_string(),
            "--log-file".to_string(),
            log_path.to_string_lossy().to_string(),
            "peaks.csv".to_string(),
        ])
        .unwrap();

        let mut file = open_log_file(args.log_file.as_deref().unwrap(), args.force).unwrap();
        writeln!(file, "program started").unwrap();

        assert!(dir.path().join("nested").is_dir());
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "program started\n");
    }

    #[test]
    fn test_existing_log_file_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("run_log.txt");
        std::fs::write(&log_path, "previous run").unwrap();

        let err = open_log_file(&log_path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "previous run");

        open_log_file(&log_path, true).unwrap();
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "");
    }
}
