//! Error types for the hyperlink-maker library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for hyperlink-maker operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or saving a workbook.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while reading a workbook.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format could not be determined.
    #[error("Unknown file format")]
    UnknownFormat,

    /// The file format is recognized but is not a spreadsheet.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Error reading or writing the ZIP archive.
    #[error("ZIP archive error: {0}")]
    ZipArchive(String),

    /// Error parsing or writing XML content.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Invalid or malformed data in the workbook.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A required package part is missing.
    #[error("Missing component: {0}")]
    MissingComponent(String),

    /// The legacy workbook reader rejected the file.
    #[error("Legacy workbook error: {0}")]
    Legacy(String),

    /// No sheet with the requested name exists.
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// The workbook could not be written to its destination.
    #[error("Failed to save {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Whether this error came from reading a workbook.
    pub fn is_load_error(&self) -> bool {
        !matches!(self, Error::Save { .. } | Error::SheetNotFound(_))
    }

    /// Whether this error came from writing a workbook to disk.
    pub fn is_save_error(&self) -> bool {
        matches!(self, Error::Save { .. })
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipArchive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlParse(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}

#[cfg(feature = "xls")]
impl From<calamine::XlsError> for Error {
    fn from(err: calamine::XlsError) -> Self {
        Error::Legacy(err.to_string())
    }
}
