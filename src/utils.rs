//! File handling helpers shared by the library and the CLI

use crate::{GeneScanError, GeneScanResult};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// True when the peak table starts with the gzip magic bytes `1f 8b`;
/// an empty file counts as plain text
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> GeneScanResult<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0; 2];

    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1f, 0x8b]),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(GeneScanError::Io(e)),
    }
}

/// Open a file for reading, decompressing it on the fly if it is gzipped
pub fn open_input<P: AsRef<Path>>(path: P) -> GeneScanResult<Box<dyn Read>> {
    let file = File::open(&path)
        .map_err(|_| GeneScanError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    if is_gzipped(&path)? {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Output file handle. Gzip output must be closed with [`OutputFile::finish`]
/// so that the trailer is written and its errors are reported.
pub enum OutputFile {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<File>),
}

impl OutputFile {
    pub fn finish(self) -> GeneScanResult<()> {
        match self {
            OutputFile::Plain(mut writer) => writer.flush()?,
            OutputFile::Gzip(encoder) => {
                encoder.finish()?.sync_all()?;
            }
        }
        Ok(())
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            OutputFile::Plain(writer) => writer.write(buf),
            OutputFile::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            OutputFile::Plain(writer) => writer.flush(),
            OutputFile::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Create an output table; a `.gz` path gets a gzip stream
pub fn create_output<P: AsRef<Path>>(path: P) -> GeneScanResult<OutputFile> {
    let file = File::create(&path)?;
    if has_extension(&path, "gz") {
        Ok(OutputFile::Gzip(GzEncoder::new(file, Compression::default())))
    } else {
        Ok(OutputFile::Plain(BufWriter::new(file)))
    }
}

/// Upper bound used to warn about oversubscribed `--num-processes`
pub fn get_num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// The input must be a regular file, not a directory
pub fn validate_file_exists<P: AsRef<Path>>(path: P) -> GeneScanResult<()> {
    if !path.as_ref().is_file() {
        return Err(GeneScanError::FileNotFound(
            path.as_ref().to_string_lossy().to_string(),
        ));
    }
    Ok(())
}

/// Fail early with `FileNotFound` when the peak table cannot be opened
pub fn validate_file_readable<P: AsRef<Path>>(path: P) -> GeneScanResult<()> {
    validate_file_exists(&path)?;

    File::open(&path)
        .map_err(|_| GeneScanError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    Ok(())
}

/// Extension test used to pick gzip output, ignoring case
pub fn has_extension<P: AsRef<Path>>(path: P, extension: &str) -> bool {
    path.as_ref()
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Create parent directories if they don't exist
pub fn ensure_parent_dirs<P: AsRef<Path>>(path: P) -> GeneScanResult<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Logs the elapsed time of a pipeline stage when dropped
pub struct Timer {
    start: std::time::Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::info!("Starting: {}", name);
        Timer {
            start: std::time::Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::info!("Finished '{}' in {:.2?}", self.name, self.elapsed());
    }
}
