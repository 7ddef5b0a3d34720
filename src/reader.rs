//! Reading of the raw CSV records from a feed directory or zip archive.

use serde::Deserialize;

use crate::objects::{
    RawCalendar, RawCalendarDate, RawFrequency, RawRoute, RawShapePoint, RawStop, RawStopTime,
    RawTrip,
};
use crate::Error;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// The records of a feed, read but not yet validated or linked.
///
/// Optional files are `None` when absent, `Some(Err)` when present but
/// unreadable. [crate::feed::TransitFeed::from_raw] consumes this.
#[derive(Debug)]
pub struct RawFeed {
    /// All stop records from `stops.txt`
    pub stops: Result<Vec<RawStop>, Error>,
    /// All route records from `routes.txt`
    pub routes: Result<Vec<RawRoute>, Error>,
    /// All trip records from `trips.txt`
    pub trips: Result<Vec<RawTrip>, Error>,
    /// All stop time records from `stop_times.txt`
    pub stop_times: Result<Vec<RawStopTime>, Error>,
    /// All shape points from `shapes.txt`, if provided
    pub shapes: Option<Result<Vec<RawShapePoint>, Error>>,
    /// All frequency records from `frequencies.txt`, if provided
    pub frequencies: Option<Result<Vec<RawFrequency>, Error>>,
    /// All calendar records from `calendar.txt`, if provided
    pub calendar: Option<Result<Vec<RawCalendar>, Error>>,
    /// All calendar date records from `calendar_dates.txt`, if provided
    pub calendar_dates: Option<Result<Vec<RawCalendarDate>, Error>>,
}

impl RawFeed {
    /// Reads from a local path, either a directory of `.txt` files or a
    /// zipped archive
    pub fn from_path<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path> + std::fmt::Display,
    {
        FeedReader::default().read_from_path(path)
    }
}

/// Parameterizes the CSV parsing
pub struct FeedReader {
    /// Avoid trimming the fields
    ///
    /// It is quite time consumming
    /// If performance is an issue, and if your data is high quality, you can switch it off
    pub trim_fields: bool,
}

impl Default for FeedReader {
    fn default() -> Self {
        FeedReader { trim_fields: true }
    }
}

impl FeedReader {
    /// Reads the raw feed from a local zip archive or local directory
    pub fn read_from_path<P>(&self, path: P) -> Result<RawFeed, Error>
    where
        P: AsRef<Path> + std::fmt::Display,
    {
        let p = path.as_ref();
        if p.is_file() {
            let reader = File::open(p)?;
            self.read_from_reader(reader)
        } else if p.is_dir() {
            self.read_from_directory(p)
        } else {
            Err(Error::NotFileNorDirectory(format!("{}", p.display())))
        }
    }

    fn read_from_directory(&self, p: &Path) -> Result<RawFeed, Error> {
        // Optional files yield None if they don’t exist, not an Error
        Ok(RawFeed {
            stops: self.read_objs_from_path(p.join("stops.txt")),
            routes: self.read_objs_from_path(p.join("routes.txt")),
            trips: self.read_objs_from_path(p.join("trips.txt")),
            stop_times: self.read_objs_from_path(p.join("stop_times.txt")),
            shapes: self.read_objs_from_optional_path(p, "shapes.txt"),
            frequencies: self.read_objs_from_optional_path(p, "frequencies.txt"),
            calendar: self.read_objs_from_optional_path(p, "calendar.txt"),
            calendar_dates: self.read_objs_from_optional_path(p, "calendar_dates.txt"),
        })
    }

    /// Reads the raw feed from a reader over a zip archive
    pub fn read_from_reader<T: std::io::Read + std::io::Seek>(
        &self,
        reader: T,
    ) -> Result<RawFeed, Error> {
        let mut archive = zip::ZipArchive::new(std::io::BufReader::new(reader))?;
        let mut file_mapping = HashMap::new();

        for i in 0..archive.len() {
            let archive_file = archive.by_index(i)?;

            for feed_file in &[
                "stops.txt",
                "routes.txt",
                "trips.txt",
                "stop_times.txt",
                "shapes.txt",
                "frequencies.txt",
                "calendar.txt",
                "calendar_dates.txt",
            ] {
                let path = Path::new(archive_file.name());
                if path.file_name() == Some(std::ffi::OsStr::new(feed_file)) {
                    file_mapping.insert(*feed_file, i);
                    break;
                }
            }
        }

        Ok(RawFeed {
            stops: self.read_file(&file_mapping, &mut archive, "stops.txt"),
            routes: self.read_file(&file_mapping, &mut archive, "routes.txt"),
            trips: self.read_file(&file_mapping, &mut archive, "trips.txt"),
            stop_times: self.read_file(&file_mapping, &mut archive, "stop_times.txt"),
            shapes: self.read_optional_file(&file_mapping, &mut archive, "shapes.txt"),
            frequencies: self.read_optional_file(&file_mapping, &mut archive, "frequencies.txt"),
            calendar: self.read_optional_file(&file_mapping, &mut archive, "calendar.txt"),
            calendar_dates: self.read_optional_file(
                &file_mapping,
                &mut archive,
                "calendar_dates.txt",
            ),
        })
    }

    fn read_objs<T, O>(&self, mut reader: T, file_name: &str) -> Result<Vec<O>, Error>
    where
        for<'de> O: Deserialize<'de>,
        T: std::io::Read,
    {
        let mut bom = [0; 3];
        reader.read_exact(&mut bom).map_err(|e| Error::NamedFileIO {
            file_name: file_name.to_owned(),
            source: Box::new(e),
        })?;

        let chained = if bom != [0xefu8, 0xbbu8, 0xbfu8] {
            bom.chain(reader)
        } else {
            [].chain(reader)
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(if self.trim_fields {
                csv::Trim::Fields
            } else {
                csv::Trim::None
            })
            .from_reader(chained);
        // We store the headers to be able to return them in case of errors
        let headers = reader
            .headers()
            .map_err(|e| Error::CSVError {
                file_name: file_name.to_owned(),
                source: e,
                line_in_error: None,
            })?
            .clone();

        // Pre-allocate a StringRecord for performance reasons
        let mut rec = csv::StringRecord::new();
        let mut objs = Vec::new();

        // Read each record into the pre-allocated StringRecord one at a time
        while reader.read_record(&mut rec).map_err(|e| Error::CSVError {
            file_name: file_name.to_owned(),
            source: e,
            line_in_error: None,
        })? {
            let obj = rec
                .deserialize(Some(&headers))
                .map_err(|e| Error::CSVError {
                    file_name: file_name.to_owned(),
                    source: e,
                    line_in_error: Some(crate::error::LineError {
                        headers: headers.into_iter().map(String::from).collect(),
                        values: rec.into_iter().map(String::from).collect(),
                    }),
                })?;
            objs.push(obj);
        }
        Ok(objs)
    }

    fn read_objs_from_path<O>(&self, path: std::path::PathBuf) -> Result<Vec<O>, Error>
    where
        for<'de> O: Deserialize<'de>,
    {
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("invalid_file_name")
            .to_string();
        if path.exists() {
            File::open(path)
                .map_err(|e| Error::NamedFileIO {
                    file_name: file_name.to_owned(),
                    source: Box::new(e),
                })
                .and_then(|r| self.read_objs(r, &file_name))
        } else {
            Err(Error::MissingFile(file_name))
        }
    }

    fn read_objs_from_optional_path<O>(
        &self,
        dir_path: &Path,
        file_name: &str,
    ) -> Option<Result<Vec<O>, Error>>
    where
        for<'de> O: Deserialize<'de>,
    {
        File::open(dir_path.join(file_name))
            .ok()
            .map(|r| self.read_objs(r, file_name))
    }

    fn read_file<O, T>(
        &self,
        file_mapping: &HashMap<&str, usize>,
        archive: &mut zip::ZipArchive<T>,
        file_name: &str,
    ) -> Result<Vec<O>, Error>
    where
        for<'de> O: Deserialize<'de>,
        T: std::io::Read + std::io::Seek,
    {
        self.read_optional_file(file_mapping, archive, file_name)
            .unwrap_or_else(|| Err(Error::MissingFile(file_name.to_owned())))
    }

    fn read_optional_file<O, T>(
        &self,
        file_mapping: &HashMap<&str, usize>,
        archive: &mut zip::ZipArchive<T>,
        file_name: &str,
    ) -> Option<Result<Vec<O>, Error>>
    where
        for<'de> O: Deserialize<'de>,
        T: std::io::Read + std::io::Seek,
    {
        file_mapping.get(file_name).map(|i| {
            self.read_objs(
                archive.by_index(*i).map_err(|e| Error::NamedFileIO {
                    file_name: file_name.to_owned(),
                    source: Box::new(e),
                })?,
                file_name,
            )
        })
    }
}
