//! Bar sources.
//!
//! The engine never touches the filesystem: it receives bars from a
//! [`BarSource`]. In-memory collections are sources, and with the `csv`
//! feature [`CsvFile`] reads `Gmt time,Open,High,Low,Close,Volume` exports.

use crate::engine::Bar;
use crate::errors::Result;

/// Capability producing an ordered sequence of bars.
pub trait BarSource {
    /// Returns every bar in time order.
    fn bars(&self) -> Result<Vec<Bar>>;
}

impl BarSource for [Bar] {
    fn bars(&self) -> Result<Vec<Bar>> {
        Ok(self.to_vec())
    }
}

impl BarSource for Vec<Bar> {
    fn bars(&self) -> Result<Vec<Bar>> {
        Ok(self.clone())
    }
}

#[cfg(feature = "csv")]
pub use self::csv_file::*;

#[cfg(feature = "csv")]
mod csv_file {
    use std::{
        fs::File,
        io::{BufReader, Read},
        path::PathBuf,
    };

    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::Deserialize;

    use super::BarSource;
    use crate::engine::Bar;
    use crate::errors::{Error, Result};

    /// Timestamp layout of the CSV exports, e.g. `16.02.2017 22:00:00.000`.
    const TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S%.f";

    // "Gmt time": "16.02.2017 22:00:00.000",
    // "Open": 234.55,
    // "High": 234.86,
    // "Low": 234.27,
    // "Close": 234.76,
    // "Volume": 51320.3
    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(rename = "Gmt time")]
        time: String,
        #[serde(rename = "Open")]
        open: f64,
        #[serde(rename = "High")]
        high: f64,
        #[serde(rename = "Low")]
        low: f64,
        #[serde(rename = "Close")]
        close: f64,
    }

    /// Parses a `dd.mm.yyyy HH:MM:SS[.fff]` timestamp as UTC.
    pub fn parse_time(value: &str) -> Result<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(value.trim(), TIME_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|_| Error::DateParse {
                value: value.to_string(),
            })
    }

    /// Reads bars from any CSV reader with a header row.
    pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        reader
            .deserialize::<Row>()
            .map(|row| -> Result<Bar> {
                let row = row?;
                Ok(Bar::from((parse_time(&row.time)?, row.open, row.high, row.low, row.close)))
            })
            .collect()
    }

    /// CSV file on disk.
    #[derive(Debug, Clone)]
    pub struct CsvFile {
        path: PathBuf,
    }

    impl CsvFile {
        /// Points at `path`; nothing is read until [`BarSource::bars`].
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }
    }

    impl BarSource for CsvFile {
        fn bars(&self) -> Result<Vec<Bar>> {
            let file = File::open(&self.path)?;
            read_bars(BufReader::new(file))
        }
    }

    #[cfg(test)]
    const SAMPLE: &str = "\
Gmt time,Open,High,Low,Close,Volume
16.02.2017 00:00:00.000,234.55,234.86,234.27,234.76,51320.3
17.02.2017 00:00:00.000,234.76,235.10,234.10,235.02,48211.0
";

    #[cfg(test)]
    #[test]
    fn reads_exported_layout() {
        let bars = read_bars(SAMPLE.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close(), 234.76);
        assert_eq!(bars[1].time(), parse_time("17.02.2017 00:00:00").unwrap());
        assert_eq!(bars[1].time().to_rfc3339(), "2017-02-17T00:00:00+00:00");
    }

    #[cfg(test)]
    #[test]
    fn rejects_bad_timestamps() {
        let data = "Gmt time,Open,High,Low,Close,Volume\n2017-02-16,1,2,0.5,1.5,10\n";
        assert!(matches!(read_bars(data.as_bytes()), Err(Error::DateParse { .. })));
    }

    #[cfg(test)]
    #[test]
    fn missing_file_is_io_error() {
        let source = CsvFile::new("does/not/exist.csv");
        assert!(matches!(source.bars(), Err(Error::IoError(_))));
    }
}

#[cfg(test)]
#[test]
fn vectors_are_sources() {
    let bars = vec![Bar::from((chrono::DateTime::<chrono::Utc>::default(), 1.0, 2.0, 0.5, 1.5))];
    assert_eq!(bars.bars().unwrap(), bars);
    assert_eq!(bars.as_slice().bars().unwrap(), bars);
}
