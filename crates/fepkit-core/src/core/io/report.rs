use crate::core::lambda::{Channel, Direction};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("I/O error for '{path}': {source}")]
    Io { path: String, source: io::Error },
}

/// One row of the per-window results table.
///
/// `delta_g` and `standard_error` are empty for windows without samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub channel: Channel,
    pub source_lambda: f64,
    pub shifted_lambda: f64,
    pub direction: Direction,
    pub delta_g: Option<f64>,
    pub standard_error: Option<f64>,
    pub samples: usize,
    pub divisions: usize,
}

pub fn write_records(
    writer: impl Write,
    records: &[WindowRecord],
    label: &str,
) -> Result<(), ReportError> {
    let csv_err = |source| ReportError::Csv {
        path: label.to_string(),
        source,
    };

    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record).map_err(csv_err)?;
    }
    wtr.flush().map_err(|source| ReportError::Io {
        path: label.to_string(),
        source,
    })?;
    Ok(())
}

pub fn write_records_to_path(path: &Path, records: &[WindowRecord]) -> Result<(), ReportError> {
    let label = path.to_string_lossy();
    let file = std::fs::File::create(path).map_err(|source| ReportError::Io {
        path: label.to_string(),
        source,
    })?;
    write_records(file, records, &label)
}

pub fn read_records(reader: impl Read, label: &str) -> Result<Vec<WindowRecord>, ReportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize::<WindowRecord>()
        .map(|result| {
            result.map_err(|source| ReportError::Csv {
                path: label.to_string(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: f64, shifted: f64, delta_g: Option<f64>) -> WindowRecord {
        WindowRecord {
            channel: Channel::Dual,
            source_lambda: source,
            shifted_lambda: shifted,
            direction: if shifted > source {
                Direction::Forward
            } else {
                Direction::Backward
            },
            delta_g,
            standard_error: delta_g.map(|_| 0.0),
            samples: if delta_g.is_some() { 3 } else { 0 },
            divisions: 1,
        }
    }

    #[test]
    fn written_report_has_header_and_kebab_case_enums() {
        let mut buffer = Vec::new();
        write_records(&mut buffer, &[record(0.0, 0.2, Some(1.0))], "memory").unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "channel,source_lambda,shifted_lambda,direction,delta_g,standard_error,samples,divisions"
        );
        assert_eq!(lines.next().unwrap(), "dual,0.0,0.2,forward,1.0,0.0,3,1");
    }

    #[test]
    fn report_file_can_be_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("windows.csv");
        let records = vec![record(0.0, 0.2, Some(1.0)), record(0.4, 0.2, None)];

        write_records_to_path(&path, &records).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let reread = read_records(file, "windows.csv").unwrap();

        assert_eq!(reread, records);
    }

    #[test]
    fn malformed_report_is_a_csv_error() {
        let text = "channel,source_lambda\ndual,notanumber\n";
        assert!(matches!(
            read_records(text.as_bytes(), "bad.csv"),
            Err(ReportError::Csv { .. })
        ));
    }
}
