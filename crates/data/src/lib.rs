pub mod csv_loader;

use chrono::{DateTime, Utc};

pub use csv_loader::{load_bars_from_csv, load_ticks_from_csv};

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Data not found: {0}")]
    NotFound(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Anything stamped with a time that a replay can be windowed on.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for barflow_core::Bar {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for barflow_core::Tick {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Keeps the records inside `[start, end]`; open ends are unbounded.
pub fn filter_range<T: Timestamped>(
    records: Vec<T>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Vec<T> {
    records
        .into_iter()
        .filter(|r| start.map_or(true, |s| r.timestamp() >= s))
        .filter(|r| end.map_or(true, |e| r.timestamp() <= e))
        .collect()
}
