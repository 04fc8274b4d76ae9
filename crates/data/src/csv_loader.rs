use crate::DataError;
use barflow_core::{Bar, Tick};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Load OHLCV bars from a CSV file.
///
/// Expected columns (case-insensitive, flexible ordering):
/// `timestamp` (or `date`, `datetime`), `open`, `high`, `low`, `close`, `volume`
///
/// Volume is optional and defaults to zero. Rows come back sorted by time.
pub fn load_bars_from_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    let mut reader = open(path)?;
    let headers = read_headers(&mut reader)?;
    let col_map = resolve_bar_columns(&headers)?;

    let mut bars = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| DataError::ParseError(format!("CSV record error: {}", e)))?;
        let line = row + 2;

        let timestamp = parse_timestamp(field(&record, col_map.timestamp, line)?)?;
        let open = parse_decimal(field(&record, col_map.open, line)?, "open")?;
        let high = parse_decimal(field(&record, col_map.high, line)?, "high")?;
        let low = parse_decimal(field(&record, col_map.low, line)?, "low")?;
        let close = parse_decimal(field(&record, col_map.close, line)?, "close")?;
        let volume = match col_map.volume {
            Some(idx) => parse_decimal(field(&record, idx, line)?, "volume")?,
            None => Decimal::ZERO,
        };

        if high < low {
            return Err(DataError::ParseError(format!(
                "line {}: high {} is below low {}",
                line, high, low
            )));
        }

        bars.push(Bar::new(timestamp, open, high, low, close, volume));
    }

    bars.sort_by_key(|b| b.timestamp);
    debug!(path = %path.display(), bars = bars.len(), "loaded bars");
    Ok(bars)
}

/// Load tick data from a CSV file.
///
/// Expected columns: `timestamp`, `bid`, `ask`, `last`, `volume`.
/// A missing `last` falls back to the bid/ask midpoint.
pub fn load_ticks_from_csv(path: &Path) -> Result<Vec<Tick>, DataError> {
    let mut reader = open(path)?;
    let headers = read_headers(&mut reader)?;

    let ts_col = require_column(&headers, &["timestamp", "date", "datetime", "time"], "timestamp")?;
    let bid_col = require_column(&headers, &["bid"], "bid")?;
    let ask_col = require_column(&headers, &["ask"], "ask")?;
    let last_col = find_column(&headers, &["last", "price"]);
    let vol_col = find_column(&headers, &["volume", "vol", "size"]);

    let mut ticks = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| DataError::ParseError(format!("CSV record error: {}", e)))?;
        let line = row + 2;

        let timestamp = parse_timestamp(field(&record, ts_col, line)?)?;
        let bid = parse_decimal(field(&record, bid_col, line)?, "bid")?;
        let ask = parse_decimal(field(&record, ask_col, line)?, "ask")?;
        let last = match last_col {
            Some(idx) => parse_decimal(field(&record, idx, line)?, "last")?,
            None => (bid + ask) / Decimal::TWO,
        };
        let volume = match vol_col {
            Some(idx) => parse_decimal(field(&record, idx, line)?, "volume")?,
            None => Decimal::ZERO,
        };

        ticks.push(Tick {
            timestamp,
            bid,
            ask,
            last,
            volume,
        });
    }

    ticks.sort_by_key(|t| t.timestamp);
    debug!(path = %path.display(), ticks = ticks.len(), "loaded ticks");
    Ok(ticks)
}

/// Parses the timestamp formats accepted in CSV files.
///
/// RFC 3339, common naive date-time layouts (taken as UTC), a bare date
/// (midnight UTC) or Unix seconds.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DataError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%Y%m%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
    ];
    for fmt in &formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }

    if let Ok(ts) = s.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp(ts, 0) {
            return Ok(dt);
        }
    }

    Err(DataError::ParseError(format!(
        "Unable to parse timestamp: '{}'",
        s
    )))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

struct BarColumnMap {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>, DataError> {
    if !path.exists() {
        return Err(DataError::NotFound(format!(
            "CSV file not found: {}",
            path.display()
        )));
    }
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::ParseError(format!("Failed to open CSV: {}", e)))
}

fn read_headers(reader: &mut csv::Reader<std::fs::File>) -> Result<csv::StringRecord, DataError> {
    reader
        .headers()
        .cloned()
        .map_err(|e| DataError::ParseError(format!("Failed to read headers: {}", e)))
}

fn resolve_bar_columns(headers: &csv::StringRecord) -> Result<BarColumnMap, DataError> {
    Ok(BarColumnMap {
        timestamp: require_column(headers, &["timestamp", "date", "datetime", "time"], "timestamp")?,
        open: require_column(headers, &["open", "o"], "open")?,
        high: require_column(headers, &["high", "h"], "high")?,
        low: require_column(headers, &["low", "l"], "low")?,
        close: require_column(headers, &["close", "c"], "close")?,
        volume: find_column(headers, &["volume", "vol", "v"]),
    })
}

fn require_column(
    headers: &csv::StringRecord,
    names: &[&str],
    label: &str,
) -> Result<usize, DataError> {
    find_column(headers, names)
        .ok_or_else(|| DataError::ParseError(format!("No {} column found", label)))
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let h = header.trim().to_lowercase();
        names.iter().any(|name| h == *name)
    })
}

fn field(record: &csv::StringRecord, idx: usize, line: usize) -> Result<&str, DataError> {
    record
        .get(idx)
        .ok_or_else(|| DataError::ParseError(format!("line {}: missing column {}", line, idx + 1)))
}

fn parse_decimal(s: &str, field: &str) -> Result<Decimal, DataError> {
    Decimal::from_str(s.trim())
        .map_err(|e| DataError::ParseError(format!("Failed to parse {} '{}': {}", field, s, e)))
}
