//! Module for the error management
use thiserror::Error;

/// Specific line from a CSV file that could not be read
#[derive(Debug)]
pub struct LineError {
    /// Headers of the CSV file
    pub headers: Vec<String>,
    /// Values of the line that could not be parsed
    pub values: Vec<String>,
}

/// An error that can occur when reading or normalizing a feed.
///
/// Validation errors (`InvalidTime`, `MissingCoordinates`) and referential
/// errors (`ReferenceError`) are fatal in strict mode only; in lenient mode
/// the offending record is defaulted or skipped with a logged error.
/// Geometric anomalies during normalization are never surfaced as errors,
/// they are logged and resolved with a deterministic fallback.
#[derive(Error, Debug)]
pub enum Error {
    /// A mandatory file is not present in the archive
    #[error("Could not find file {0}")]
    MissingFile(String),
    /// A record references an id that is not present
    #[error("The {object} id {id} is not known")]
    ReferenceError {
        /// Kind of object the unresolved id points to (stop, trip, ...)
        object: &'static str,
        /// The id that did not resolve
        id: String,
    },
    /// The given path to the feed is neither a file nor a directory
    #[error("Could not read feed: {0} is neither a file nor a directory")]
    NotFileNorDirectory(String),
    /// The time is not given in the HH:MM:SS format
    #[error("'{0}' is not a valid time; HH:MM:SS format is expected.")]
    InvalidTime(String),
    /// A stop is missing its mandatory latitude or longitude
    #[error("missing mandatory coordinates for stop '{0}'")]
    MissingCoordinates(String),
    /// A piecewise linear function was interpolated before any sample was added
    #[error("empty piecewise linear function")]
    EmptyPiecewiseFunction,
    /// Generic Input/Output error while reading a file
    #[error("impossible to read file")]
    IO(#[from] std::io::Error),
    /// Impossible to read a file
    #[error("impossible to read '{file_name}'")]
    NamedFileIO {
        /// The file name that could not be read
        file_name: String,
        /// The initial error that caused the unability to read the file
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Impossible to read a CSV file
    #[error("impossible to read csv file '{file_name}'")]
    CSVError {
        /// File name that could not be parsed as CSV
        file_name: String,
        /// The initial error by the csv library
        #[source]
        source: csv::Error,
        /// The line that could not be parsed by the csv library
        line_in_error: Option<LineError>,
    },
    /// Error when trying to unzip the feed archive
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}
