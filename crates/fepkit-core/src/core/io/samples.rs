use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SampleReadError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid energy value '{value}' in '{path}' on line {line}")]
    Parse {
        path: PathBuf,
        line: usize,
        value: String,
    },
    #[error("Line {line} of '{path}' has no column {column}")]
    MissingColumn {
        path: PathBuf,
        line: usize,
        column: usize,
    },
    #[error("Energy column index must be 1 or greater")]
    InvalidColumn,
}

/// Layout of the per-frame report files holding energy differences.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleReaderOptions {
    /// 1-based, whitespace-separated column holding ΔE.
    pub column: usize,
    /// Lines skipped at the top of every file.
    pub header_lines: usize,
    /// Drop the first data row (the unperturbed starting frame).
    pub discard_first: bool,
    /// Only files with this extension are read.
    pub extension: String,
}

impl Default for SampleReaderOptions {
    fn default() -> Self {
        Self {
            column: 5,
            header_lines: 1,
            discard_first: true,
            extension: "out".to_string(),
        }
    }
}

/// Energy differences read from a single report file.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGroup {
    pub source: PathBuf,
    pub energies: Vec<f64>,
}

/// Reads the configured energy column from a report.
///
/// `source` is only used to label errors.
pub fn read_energies(
    reader: &mut impl BufRead,
    options: &SampleReaderOptions,
    source: &Path,
) -> Result<Vec<f64>, SampleReadError> {
    let column = options
        .column
        .checked_sub(1)
        .ok_or(SampleReadError::InvalidColumn)?;

    let mut energies = Vec::new();
    for (idx, line_res) in reader.lines().enumerate() {
        let line = line_res.map_err(|source_err| SampleReadError::Io {
            path: source.to_path_buf(),
            source: source_err,
        })?;
        let line_num = idx + 1;
        if idx < options.header_lines || line.trim().is_empty() {
            continue;
        }

        let field = line
            .split_whitespace()
            .nth(column)
            .ok_or_else(|| SampleReadError::MissingColumn {
                path: source.to_path_buf(),
                line: line_num,
                column: options.column,
            })?;
        let value = field.parse().map_err(|_| SampleReadError::Parse {
            path: source.to_path_buf(),
            line: line_num,
            value: field.to_string(),
        })?;
        energies.push(value);
    }

    if options.discard_first && !energies.is_empty() {
        energies.remove(0);
    }
    Ok(energies)
}

pub fn read_sample_file(
    path: &Path,
    options: &SampleReaderOptions,
) -> Result<Vec<f64>, SampleReadError> {
    let file = File::open(path).map_err(|source| SampleReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_energies(&mut BufReader::new(file), options, path)
}

/// Lists files in `dir` with the given extension, sorted by path.
pub fn list_sample_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, SampleReadError> {
    let io_err = |source| SampleReadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Reads every report of a window folder, one group per file.
///
/// Files that yield no energies are kept as empty groups with a warning, so
/// a file's position does not depend on whether earlier files had data.
pub fn read_window_samples(
    dir: &Path,
    options: &SampleReaderOptions,
) -> Result<Vec<SampleGroup>, SampleReadError> {
    let mut groups = Vec::new();
    for path in list_sample_files(dir, &options.extension)? {
        let energies = read_sample_file(&path, options)?;
        if energies.is_empty() {
            warn!("Report file '{}' contains no energies", path.display());
        } else {
            debug!("Read {} energies from '{}'", energies.len(), path.display());
        }
        groups.push(SampleGroup {
            source: path,
            energies,
        });
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const REPORT: &str = "\
#Task Step Accepted Energy DeltaE
1 0 0 -100.0 0.00
1 1 1 -101.5 0.25
1 2 2 -102.0 -0.50
";

    fn read(text: &str, options: &SampleReaderOptions) -> Result<Vec<f64>, SampleReadError> {
        read_energies(&mut Cursor::new(text), options, Path::new("report_1.out"))
    }

    #[test]
    fn reads_fifth_column_and_discards_first_row() {
        let energies = read(REPORT, &SampleReaderOptions::default()).unwrap();
        assert_eq!(energies, vec![0.25, -0.50]);
    }

    #[test]
    fn keeps_first_row_when_asked() {
        let options = SampleReaderOptions {
            discard_first: false,
            ..Default::default()
        };
        assert_eq!(read(REPORT, &options).unwrap(), vec![0.0, 0.25, -0.50]);
    }

    #[test]
    fn reads_alternative_column() {
        let options = SampleReaderOptions {
            column: 4,
            discard_first: false,
            ..Default::default()
        };
        assert_eq!(read(REPORT, &options).unwrap(), vec![-100.0, -101.5, -102.0]);
    }

    #[test]
    fn missing_column_is_reported_with_line() {
        let options = SampleReaderOptions {
            column: 9,
            ..Default::default()
        };
        assert!(matches!(
            read(REPORT, &options),
            Err(SampleReadError::MissingColumn { line: 2, column: 9, .. })
        ));
    }

    #[test]
    fn non_numeric_value_is_a_parse_error() {
        let text = "header\n1 0 0 -100.0 abc\n";
        assert!(matches!(
            read(text, &SampleReaderOptions::default()),
            Err(SampleReadError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn column_zero_is_rejected() {
        let options = SampleReaderOptions {
            column: 0,
            ..Default::default()
        };
        assert!(matches!(
            read(REPORT, &options),
            Err(SampleReadError::InvalidColumn)
        ));
    }

    #[test]
    fn window_samples_are_sorted_and_keep_empty_files_in_place() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report_2.out"), REPORT).unwrap();
        fs::write(dir.path().join("report_1.out"), REPORT).unwrap();
        fs::write(dir.path().join("report_3.out"), "#header only\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let groups = read_window_samples(dir.path(), &SampleReaderOptions::default()).unwrap();

        assert_eq!(groups.len(), 3);
        assert!(groups[0].source.ends_with("report_1.out"));
        assert!(groups[1].source.ends_with("report_2.out"));
        assert_eq!(groups[1].energies, vec![0.25, -0.50]);
        assert!(groups[2].energies.is_empty());
    }
}
