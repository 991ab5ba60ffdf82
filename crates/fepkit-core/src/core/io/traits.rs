use crate::core::models::template::Template;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing force-field template formats.
///
/// Implementors handle format-specific parsing and serialization; the
/// path-based helpers are provided on top of the reader/writer methods.
pub trait TemplateFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a template from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Template, Self::Error>;

    /// Writes a template to a writer, reproducing the full section layout.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(template: &Template, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads a template from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Template, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes a template to a file path, overwriting any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(template: &Template, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(template, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Serializes a template to an in-memory string.
    fn to_text(template: &Template) -> Result<String, Self::Error> {
        let mut buffer = Vec::new();
        Self::write_to(template, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
