//! Delimited raw-file parser for gravity and trajectory data.
//!
//! # Responsibility
//! - Map raw fields onto named columns using explicit or default names.
//! - Build and validate the time index from whichever time columns exist.
//! - Convert numeric cells to floats, with missing values as NaN.
//!
//! # Invariants
//! - Every configured column is kept; `mdy` and `hms` stay text, all other
//!   columns are floats. Resampling keeps only the float columns.
//! - Rows with the wrong field count or whose timestamp cannot be built are
//!   dropped and counted, never guessed.

use crate::import::{ImportError, ImportResult};
use crate::model::{DataKind, Scalar};
use crate::store::{ColumnValues, StoreAttrs, TimeSeriesTable};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashSet;
use std::path::Path;

/// Default column layout of DGS AT1A/AT1M gravity exports.
pub const GRAVITY_COLUMNS: [&str; 10] = [
    "gravity",
    "long_accel",
    "cross_accel",
    "beam",
    "temp",
    "status",
    "pressure",
    "Etemp",
    "gps_week",
    "gps_sow",
];

/// Default column layout of GPS trajectory exports.
pub const TRAJECTORY_COLUMNS: [&str; 8] = [
    "mdy", "hms", "lat", "long", "ortho_ht", "ell_ht", "num_sats", "pdop",
];

const TRAJECTORY_REQUIRED: [&str; 3] = ["lat", "long", "ell_ht"];
const TEXT_COLUMNS: [&str; 2] = ["mdy", "hms"];
const TIME_COLUMNS: [&str; 8] = [
    "time", "gps_week", "gps_sow", "week", "sow", "mdy", "hms", "datenum",
];
const DATETIME_FORMAT: &str = "%m/%d/%Y %H:%M:%S%.f";

const GPS_EPOCH_UNIX_SECONDS: f64 = 315_964_800.0;
const SECONDS_PER_WEEK: f64 = 604_800.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
/// MATLAB serial day number of 1970-01-01.
const DATENUM_UNIX_EPOCH: f64 = 719_529.0;
const MAX_RESAMPLED_ROWS: i64 = 10_000_000;

/// Dates at which a GPS-UTC leap second took effect.
const LEAP_SECOND_DATES: [(i32, u32, u32); 18] = [
    (1981, 7, 1),
    (1982, 7, 1),
    (1983, 7, 1),
    (1985, 7, 1),
    (1988, 1, 1),
    (1990, 1, 1),
    (1991, 1, 1),
    (1992, 7, 1),
    (1993, 7, 1),
    (1994, 7, 1),
    (1996, 1, 1),
    (1997, 7, 1),
    (1999, 1, 1),
    (2006, 1, 1),
    (2009, 1, 1),
    (2012, 7, 1),
    (2015, 7, 1),
    (2017, 1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Comma,
    Whitespace,
}

impl Delimiter {
    fn split<'a>(self, line: &'a str) -> Vec<&'a str> {
        match self {
            Self::Comma => line.split(',').map(str::trim).collect(),
            Self::Whitespace => line.split_whitespace().collect(),
        }
    }
}

/// Options for one import call.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    pub kind: DataKind,
    /// Column names in file order; `None` uses the kind's default layout.
    pub columns: Option<Vec<String>>,
    /// Leading lines to skip, e.g. header rows.
    pub skip_rows: usize,
    pub delimiter: Delimiter,
    /// Stated sample rate. Also synthesizes timestamps for files without
    /// time columns, starting at `start_time`.
    pub data_rate_hz: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
    /// Timestamps are UTC; the GPS-UTC leap offset is removed.
    pub is_utc: bool,
    /// Average rows into fixed bins of this width, aligned to the Unix
    /// epoch. Empty bins are NaN until interpolation fills them.
    pub resample_interval: Option<Duration>,
    /// Fill NaN gaps in float columns by linear interpolation.
    pub interpolate: bool,
}

impl ImportConfig {
    pub fn new(kind: DataKind) -> Self {
        Self {
            kind,
            columns: None,
            skip_rows: 0,
            delimiter: Delimiter::default(),
            data_rate_hz: None,
            start_time: None,
            is_utc: false,
            resample_interval: None,
            interpolate: false,
        }
    }

    pub fn gravity() -> Self {
        Self::new(DataKind::Gravity)
    }

    pub fn trajectory() -> Self {
        Self::new(DataKind::Trajectory)
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_skip_rows(mut self, skip_rows: usize) -> Self {
        self.skip_rows = skip_rows;
        self
    }

    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_data_rate(mut self, hz: f64) -> Self {
        self.data_rate_hz = Some(hz);
        self
    }

    pub fn with_start_time(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn utc(mut self) -> Self {
        self.is_utc = true;
        self
    }

    pub fn resampled(mut self, interval: Duration) -> Self {
        self.resample_interval = Some(interval);
        self
    }

    pub fn interpolated(mut self) -> Self {
        self.interpolate = true;
        self
    }

    /// Column names the file is read with.
    pub fn column_names(&self) -> Vec<String> {
        match &self.columns {
            Some(columns) => columns.iter().map(|name| name.trim().to_string()).collect(),
            None => {
                let defaults: &[&str] = match self.kind {
                    DataKind::Gravity => &GRAVITY_COLUMNS,
                    DataKind::Trajectory => &TRAJECTORY_COLUMNS,
                };
                defaults.iter().map(|name| name.to_string()).collect()
            }
        }
    }

    fn validate(&self, columns: &[String]) -> ImportResult<()> {
        if let Some(rate) = self.data_rate_hz {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(ImportError::InvalidConfig(format!(
                    "data rate must be a positive number of hertz, got {rate}"
                )));
            }
        }
        if let Some(interval) = self.resample_interval {
            if interval.num_microseconds().map_or(true, |micros| micros <= 0) {
                return Err(ImportError::InvalidConfig(format!(
                    "resample interval must be positive, got {interval}"
                )));
            }
        }
        if columns.is_empty() {
            return Err(ImportError::InvalidConfig("no columns configured".to_string()));
        }
        let mut seen = HashSet::new();
        for name in columns {
            if name.is_empty() {
                return Err(ImportError::InvalidConfig(
                    "column names must not be blank".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(ImportError::InvalidConfig(format!(
                    "column `{name}` is configured twice"
                )));
            }
        }
        Ok(())
    }
}

/// Parse result: the table plus the attributes stored next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub table: TimeSeriesTable,
    pub attrs: StoreAttrs,
    /// Column names as configured for the file.
    pub columns: Vec<String>,
    pub dropped_rows: usize,
}

enum TimeSource {
    UnixSeconds(usize),
    GpsWeek { week: usize, sow: usize },
    DateTimeText { mdy: usize, hms: usize },
    Datenum(usize),
    Synthesized { start: DateTime<Utc>, rate_hz: f64 },
}

/// Reads and parses one raw file.
pub fn parse_file(path: &Path, config: &ImportConfig) -> ImportResult<ParsedTable> {
    parse_file_with(path, config, &mut || Ok(()))
}

/// Parses raw file content already held in memory.
pub fn parse_text(text: &str, config: &ImportConfig) -> ImportResult<ParsedTable> {
    parse_text_with(text, config, &mut || Ok(()))
}

/// `checkpoint` runs between parsing stages; an error from it aborts the
/// parse.
pub(crate) fn parse_file_with(
    path: &Path,
    config: &ImportConfig,
    checkpoint: &mut dyn FnMut() -> ImportResult<()>,
) -> ImportResult<ParsedTable> {
    let text = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    checkpoint()?;
    let mut parsed = parse_text_with(&text, config, checkpoint)?;
    parsed.attrs.insert(
        "source_path".to_string(),
        Scalar::Text(path.to_string_lossy().into_owned()),
    );
    Ok(parsed)
}

pub(crate) fn parse_text_with(
    text: &str,
    config: &ImportConfig,
    checkpoint: &mut dyn FnMut() -> ImportResult<()>,
) -> ImportResult<ParsedTable> {
    let columns = config.column_names();
    config.validate(&columns)?;
    check_required_columns(config.kind, &columns)?;
    let time_source = resolve_time_source(config, &columns)?;

    let (rows, malformed_rows) = split_rows(text, config, columns.len())?;
    checkpoint()?;

    let mut kept = Vec::with_capacity(rows.len());
    let mut index = Vec::with_capacity(rows.len());
    for (position, row) in rows.iter().enumerate() {
        if let Some(at) = row_timestamp(&time_source, row, position) {
            kept.push(position);
            index.push(at);
        }
    }
    if index.is_empty() {
        return Err(ImportError::Empty);
    }
    let dropped_rows = malformed_rows + rows.len() - kept.len();
    let mut leap_shift = 0;
    if config.is_utc {
        leap_shift = leap_seconds_at(index[0]);
        for at in &mut index {
            *at -= Duration::seconds(leap_shift);
        }
    }

    let parsed_columns: Vec<(String, ColumnValues)> = columns
        .iter()
        .enumerate()
        .map(|(position, name)| {
            let values = if TEXT_COLUMNS.contains(&name.as_str()) {
                ColumnValues::Text(
                    kept.iter()
                        .map(|row| rows[*row][position].to_string())
                        .collect(),
                )
            } else {
                ColumnValues::Float(
                    kept.iter()
                        .map(|row| parse_cell(rows[*row][position]))
                        .collect(),
                )
            };
            (name.clone(), values)
        })
        .collect();
    checkpoint()?;

    let (index, parsed_columns) = match config.resample_interval {
        Some(interval) => resample_mean(&index, parsed_columns, interval)?,
        None => (index, parsed_columns),
    };
    let mut table = TimeSeriesTable::new(index)?;
    for (name, values) in parsed_columns {
        let values = match values {
            ColumnValues::Float(mut values) if config.interpolate => {
                fill_nan_gaps(&mut values);
                ColumnValues::Float(values)
            }
            other => other,
        };
        table.push_column(name, values)?;
    }
    checkpoint()?;

    let mut attrs = StoreAttrs::new();
    attrs.insert("kind".to_string(), Scalar::from(config.kind.as_str()));
    attrs.insert("row_count".to_string(), Scalar::Int(table.len() as i64));
    attrs.insert("dropped_rows".to_string(), Scalar::Int(dropped_rows as i64));
    attrs.insert("skip_rows".to_string(), Scalar::Int(config.skip_rows as i64));
    attrs.insert("original_columns".to_string(), Scalar::Text(columns.join(",")));
    attrs.insert("is_utc".to_string(), Scalar::Bool(config.is_utc));
    if config.is_utc {
        attrs.insert("leap_seconds".to_string(), Scalar::Int(leap_shift));
    }
    if let Some(rate) = config.data_rate_hz {
        attrs.insert("data_rate_hz".to_string(), Scalar::Float(rate));
    }
    if let Some(interval) = config.resample_interval.and_then(|step| step.num_microseconds()) {
        attrs.insert("resample_interval_us".to_string(), Scalar::Int(interval));
    }

    Ok(ParsedTable {
        table,
        attrs,
        columns,
        dropped_rows,
    })
}

fn check_required_columns(kind: DataKind, columns: &[String]) -> ImportResult<()> {
    let has = |name: &str| columns.iter().any(|column| column == name);
    let missing: Vec<String> = match kind {
        DataKind::Gravity => {
            let mut missing = Vec::new();
            if !has("gravity") {
                missing.push("gravity".to_string());
            }
            let has_auxiliary = columns
                .iter()
                .any(|name| name != "gravity" && !TIME_COLUMNS.contains(&name.as_str()));
            if !has_auxiliary {
                missing.push("auxiliary channel".to_string());
            }
            missing
        }
        DataKind::Trajectory => TRAJECTORY_REQUIRED
            .iter()
            .filter(|name| !has(name))
            .map(|name| name.to_string())
            .collect(),
    };
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ImportError::MissingColumns { kind, missing })
    }
}

fn resolve_time_source(config: &ImportConfig, columns: &[String]) -> ImportResult<TimeSource> {
    let find = |name: &str| columns.iter().position(|column| column == name);

    if let Some(time) = find("time") {
        return Ok(TimeSource::UnixSeconds(time));
    }
    for (week, sow) in [("gps_week", "gps_sow"), ("week", "sow")] {
        if let (Some(week), Some(sow)) = (find(week), find(sow)) {
            return Ok(TimeSource::GpsWeek { week, sow });
        }
    }
    if let (Some(mdy), Some(hms)) = (find("mdy"), find("hms")) {
        return Ok(TimeSource::DateTimeText { mdy, hms });
    }
    if let Some(datenum) = find("datenum") {
        return Ok(TimeSource::Datenum(datenum));
    }
    if let Some(rate_hz) = config.data_rate_hz {
        let start = config.start_time.ok_or_else(|| {
            ImportError::InvalidConfig(
                "a start time is required to synthesize timestamps from the data rate"
                    .to_string(),
            )
        })?;
        return Ok(TimeSource::Synthesized { start, rate_hz });
    }

    let missing = match config.kind {
        DataKind::Gravity => vec!["time".to_string()],
        DataKind::Trajectory => vec!["mdy".to_string(), "hms".to_string()],
    };
    Err(ImportError::MissingColumns {
        kind: config.kind,
        missing,
    })
}

/// Splits data lines into fields, skipping blank lines.
///
/// Rows with the wrong field count are counted and left out. A file where
/// no row matches the configured columns is a schema mismatch.
fn split_rows<'a>(
    text: &'a str,
    config: &ImportConfig,
    expected: usize,
) -> ImportResult<(Vec<Vec<&'a str>>, usize)> {
    let mut rows = Vec::new();
    let mut first_mismatch = None;
    let mut malformed = 0;
    for (number, line) in text.lines().enumerate().skip(config.skip_rows) {
        if line.trim().is_empty() {
            continue;
        }
        let fields = config.delimiter.split(line);
        if fields.len() == expected {
            rows.push(fields);
            continue;
        }
        malformed += 1;
        first_mismatch.get_or_insert(ImportError::SchemaMismatch {
            line: number + 1,
            expected,
            actual: fields.len(),
        });
    }
    match first_mismatch {
        Some(mismatch) if rows.is_empty() => Err(mismatch),
        _ => Ok((rows, malformed)),
    }
}

/// Averages float columns into epoch-aligned bins of `interval`.
///
/// NaN cells do not count toward a bin's mean. Text columns are dropped.
fn resample_mean(
    index: &[DateTime<Utc>],
    columns: Vec<(String, ColumnValues)>,
    interval: Duration,
) -> ImportResult<(Vec<DateTime<Utc>>, Vec<(String, ColumnValues)>)> {
    let step = interval
        .num_microseconds()
        .filter(|micros| *micros > 0)
        .ok_or_else(|| {
            ImportError::InvalidConfig(format!("resample interval must be positive, got {interval}"))
        })?;
    let bins: Vec<i64> = index
        .iter()
        .map(|at| at.timestamp_micros().div_euclid(step))
        .collect();
    let (Some(&first), Some(&last)) = (bins.iter().min(), bins.iter().max()) else {
        return Err(ImportError::Empty);
    };
    let count = last - first + 1;
    if count > MAX_RESAMPLED_ROWS {
        return Err(ImportError::InvalidConfig(format!(
            "resampling would produce {count} rows; at most {MAX_RESAMPLED_ROWS} are allowed"
        )));
    }
    let count = count as usize;
    let slots: Vec<usize> = bins.iter().map(|bin| (bin - first) as usize).collect();

    let resampled_index = (0..count)
        .map(|slot| DateTime::from_timestamp_micros((first + slot as i64) * step))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| {
            ImportError::InvalidConfig("resampled timestamps are out of range".to_string())
        })?;

    let resampled_columns = columns
        .into_iter()
        .filter_map(|(name, values)| match values {
            ColumnValues::Float(values) => {
                let mut sums = vec![0.0; count];
                let mut counts = vec![0_usize; count];
                for (slot, value) in slots.iter().zip(values) {
                    if !value.is_nan() {
                        sums[*slot] += value;
                        counts[*slot] += 1;
                    }
                }
                let means = sums
                    .into_iter()
                    .zip(counts)
                    .map(|(sum, n)| if n == 0 { f64::NAN } else { sum / n as f64 })
                    .collect();
                Some((name, ColumnValues::Float(means)))
            }
            ColumnValues::Text(_) => None,
        })
        .collect();
    Ok((resampled_index, resampled_columns))
}

fn row_timestamp(source: &TimeSource, row: &[&str], position: usize) -> Option<DateTime<Utc>> {
    match source {
        TimeSource::UnixSeconds(column) => timestamp_from_unix(parse_cell(row[*column])),
        TimeSource::GpsWeek { week, sow } => timestamp_from_unix(gps_to_unix_seconds(
            parse_cell(row[*week]),
            parse_cell(row[*sow]),
        )),
        TimeSource::DateTimeText { mdy, hms } => {
            let text = format!("{} {}", row[*mdy], row[*hms]);
            NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
        }
        TimeSource::Datenum(column) => {
            let days = parse_cell(row[*column]);
            timestamp_from_unix((days - DATENUM_UNIX_EPOCH) * SECONDS_PER_DAY)
        }
        TimeSource::Synthesized { start, rate_hz } => {
            let offset = (position as f64 / rate_hz * 1e6).round() as i64;
            Some(*start + Duration::microseconds(offset))
        }
    }
}

/// Converts GPS week and seconds-of-week to Unix seconds.
///
/// No leap-second correction is applied.
pub fn gps_to_unix_seconds(week: f64, seconds_of_week: f64) -> f64 {
    GPS_EPOCH_UNIX_SECONDS + week * SECONDS_PER_WEEK + seconds_of_week
}

/// Accumulated GPS-UTC leap seconds in effect at `at`.
pub fn leap_seconds_at(at: DateTime<Utc>) -> i64 {
    let date = at.date_naive();
    LEAP_SECOND_DATES
        .iter()
        .filter_map(|(year, month, day)| NaiveDate::from_ymd_opt(*year, *month, *day))
        .filter(|boundary| *boundary <= date)
        .count() as i64
}

fn timestamp_from_unix(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let micros = (seconds * 1e6).round();
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64)
}

fn parse_cell(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Linear interpolation over row position; leading and trailing gaps take
/// the nearest valid value.
fn fill_nan_gaps(values: &mut [f64]) {
    let valid: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, value)| !value.is_nan())
        .map(|(position, _)| position)
        .collect();
    let (Some(&first), Some(&last)) = (valid.first(), valid.last()) else {
        return;
    };

    let mut next_valid = 0;
    for position in 0..values.len() {
        if !values[position].is_nan() {
            continue;
        }
        if position < first {
            values[position] = values[first];
            continue;
        }
        if position > last {
            values[position] = values[last];
            continue;
        }
        while valid[next_valid] < position {
            next_valid += 1;
        }
        let right = valid[next_valid];
        let left = valid[next_valid - 1];
        let fraction = (position - left) as f64 / (right - left) as f64;
        values[position] = values[left] + (values[right] - values[left]) * fraction;
    }
}

#[cfg(test)]
mod tests {
    use super::{
        fill_nan_gaps, gps_to_unix_seconds, leap_seconds_at, parse_text, parse_text_with,
        Delimiter, ImportConfig,
    };
    use crate::import::ImportError;
    use crate::model::{DataKind, Scalar};
    use chrono::{TimeZone, Timelike, Utc};

    #[test]
    fn gravity_defaults_use_gps_week_time() {
        let text = "\
1000.5,1.0,2.0,3.0,40.1,0,1013.2,39.9,1990,381600.0
1000.6,1.1,2.1,3.1,40.1,0,1013.2,39.9,1990,381600.1
";
        let parsed = parse_text(text, &ImportConfig::gravity()).unwrap();
        assert_eq!(parsed.table.len(), 2);
        assert_eq!(parsed.table.columns().len(), 10);
        let expected = Utc.timestamp_opt(1_519_898_400, 0).unwrap();
        assert_eq!(parsed.table.index()[0], expected);
        assert_eq!(parsed.table.float_column("gravity").unwrap()[1], 1000.6);
        assert_eq!(parsed.attrs["kind"], Scalar::from("gravity"));
    }

    #[test]
    fn unparsable_cells_become_nan_and_bad_times_drop_rows() {
        let text = "time,gravity,long\n1.0,10.0,x\nnope,11.0,1.0\n3.0,,2.0\n";
        let config = ImportConfig::gravity()
            .with_columns(["time", "gravity", "long"])
            .with_skip_rows(1);
        let parsed = parse_text(text, &config).unwrap();
        assert_eq!(parsed.table.len(), 2);
        assert_eq!(parsed.dropped_rows, 1);
        assert!(parsed.table.float_column("long").unwrap()[0].is_nan());
        assert!(parsed.table.float_column("gravity").unwrap()[1].is_nan());
        assert_eq!(parsed.attrs["dropped_rows"], Scalar::Int(1));
    }

    #[test]
    fn gravity_without_auxiliary_channel_is_rejected() {
        let config = ImportConfig::gravity().with_columns(["time", "gravity"]);
        let err = parse_text("1.0,2.0\n", &config).unwrap_err();
        assert!(matches!(
            err,
            ImportError::MissingColumns {
                kind: DataKind::Gravity,
                ..
            }
        ));
    }

    #[test]
    fn truncated_rows_are_dropped_and_counted() {
        let config = ImportConfig::gravity().with_columns(["time", "gravity", "long"]);
        let parsed = parse_text("1.0,2.0,3.0\n   \n2.0,2.0\n3.0,2.5,3.5\n4.0,2", &config).unwrap();
        assert_eq!(parsed.table.len(), 2);
        assert_eq!(parsed.dropped_rows, 2);
        assert_eq!(parsed.attrs["dropped_rows"], Scalar::Int(2));
        assert_eq!(parsed.table.float_column("gravity").unwrap(), &[2.0, 2.5]);
    }

    #[test]
    fn file_without_any_matching_row_reports_first_line() {
        let config = ImportConfig::gravity()
            .with_columns(["time", "gravity", "long"])
            .with_skip_rows(1);
        let err = parse_text("time,gravity\n1.0,2.0\n2.0,2.0,3.0,4.0\n", &config).unwrap_err();
        assert!(matches!(
            err,
            ImportError::SchemaMismatch {
                line: 2,
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn resampling_averages_fixed_bins_before_interpolation() {
        let text = "\
0.00,10.0,1.0
0.04,20.0,NaN
0.13,30.0,3.0
0.35,50.0,5.0
0.36,70.0,5.0
";
        let config = ImportConfig::gravity()
            .with_columns(["time", "gravity", "long"])
            .resampled(chrono::Duration::milliseconds(100));
        let parsed = parse_text(text, &config).unwrap();
        let gravity = parsed.table.float_column("gravity").unwrap();
        assert_eq!(parsed.table.len(), 4);
        assert_eq!(gravity[0], 15.0);
        assert_eq!(gravity[1], 30.0);
        assert!(gravity[2].is_nan());
        assert_eq!(gravity[3], 60.0);
        assert_eq!(parsed.table.float_column("long").unwrap()[0], 1.0);
        assert_eq!(
            parsed.table.index()[1],
            Utc.timestamp_micros(100_000).unwrap()
        );
        assert_eq!(parsed.attrs["resample_interval_us"], Scalar::Int(100_000));

        let filled = parse_text(text, &config.clone().interpolated()).unwrap();
        assert_eq!(filled.table.float_column("gravity").unwrap()[2], 45.0);
    }

    #[test]
    fn resampling_accepts_repeated_timestamps_and_drops_text_columns() {
        let text = "\
03/09/2018 14:00:00.00 45.0 -93.0 290.0
03/09/2018 14:00:00.00 45.2 -93.2 292.0
03/09/2018 14:00:00.10 45.4 -93.4 294.0
";
        let config = ImportConfig::trajectory()
            .with_columns(["mdy", "hms", "lat", "long", "ell_ht"])
            .with_delimiter(Delimiter::Whitespace)
            .resampled(chrono::Duration::milliseconds(100));
        let parsed = parse_text(text, &config).unwrap();
        assert_eq!(parsed.table.len(), 2);
        assert_eq!(parsed.table.column_names(), vec!["lat", "long", "ell_ht"]);
        assert_eq!(parsed.table.float_column("ell_ht").unwrap(), &[291.0, 294.0]);
        assert_eq!(parsed.columns, ["mdy", "hms", "lat", "long", "ell_ht"]);

        let zero = config.resampled(chrono::Duration::zero());
        assert!(matches!(
            parse_text(text, &zero),
            Err(ImportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn cancellation_between_stages_stops_the_parse() {
        let text = "1.0,2.0,3.0\n2.0,2.5,3.5\n";
        let config = ImportConfig::gravity().with_columns(["time", "gravity", "long"]);
        let mut stages = 0;
        let mut cancel_requested = false;
        let result = parse_text_with(text, &config, &mut || {
            stages += 1;
            if stages == 2 {
                cancel_requested = true;
            }
            if cancel_requested {
                Err(ImportError::Cancelled)
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(ImportError::Cancelled)));
        assert_eq!(stages, 2);
    }

    #[test]
    fn trajectory_datetime_text_and_leap_second_removal() {
        let text = "\
03/09/2018 14:00:00.0  45.1 -93.2 260.0 290.1 12 1.1
03/09/2018 14:00:00.1  45.2 -93.3 261.0 291.1 12 1.1
";
        let config = ImportConfig::trajectory()
            .with_delimiter(Delimiter::Whitespace)
            .utc();
        let parsed = parse_text(text, &config).unwrap();
        let first = parsed.table.index()[0];
        assert_eq!(first, Utc.with_ymd_and_hms(2018, 3, 9, 13, 59, 42).unwrap());
        assert_eq!(parsed.attrs["leap_seconds"], Scalar::Int(18));
        assert_eq!(
            parsed.table.text_column("mdy").unwrap()[0],
            "03/09/2018".to_string()
        );
        assert_eq!(parsed.table.index()[1].nanosecond(), 100_000_000);
    }

    #[test]
    fn trajectory_requires_position_columns() {
        let config = ImportConfig::trajectory().with_columns(["datenum", "lat", "long"]);
        let err = parse_text("737128.5,45.0,-93.0\n", &config).unwrap_err();
        match err {
            ImportError::MissingColumns { missing, .. } => {
                assert_eq!(missing, vec!["ell_ht".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn datenum_converts_from_matlab_serial_days() {
        let config =
            ImportConfig::trajectory().with_columns(["datenum", "lat", "long", "ell_ht"]);
        let parsed = parse_text("737128.5,45.0,-93.0,300.0\n", &config).unwrap();
        assert_eq!(
            parsed.table.index()[0],
            Utc.with_ymd_and_hms(2018, 3, 9, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn data_rate_synthesizes_index_from_start_time() {
        let start = Utc.with_ymd_and_hms(2018, 3, 9, 14, 0, 0).unwrap();
        let config = ImportConfig::gravity()
            .with_columns(["gravity", "beam"])
            .with_data_rate(10.0)
            .with_start_time(start);
        let parsed = parse_text("1.0,2.0\n1.1,2.1\n1.2,2.2\n", &config).unwrap();
        assert_eq!(parsed.table.index()[2], start + chrono::Duration::milliseconds(200));
        assert_eq!(parsed.attrs["data_rate_hz"], Scalar::Float(10.0));

        let no_start = ImportConfig::gravity()
            .with_columns(["gravity", "beam"])
            .with_data_rate(10.0);
        assert!(matches!(
            parse_text("1.0,2.0\n", &no_start),
            Err(ImportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn repeated_timestamps_are_rejected() {
        let config = ImportConfig::gravity().with_columns(["time", "gravity", "long"]);
        let err = parse_text("1.0,1.0,1.0\n1.0,2.0,2.0\n", &config).unwrap_err();
        assert!(matches!(err, ImportError::InvalidTable(_)));
    }

    #[test]
    fn interpolation_fills_interior_and_edge_gaps() {
        let mut values = vec![f64::NAN, 1.0, f64::NAN, f64::NAN, 4.0, f64::NAN];
        fill_nan_gaps(&mut values);
        assert_eq!(values, vec![1.0, 1.0, 2.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn gps_time_and_leap_table() {
        assert_eq!(gps_to_unix_seconds(0.0, 0.0), 315_964_800.0);
        let before = Utc.with_ymd_and_hms(1981, 6, 30, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(1981, 7, 1, 0, 0, 0).unwrap();
        assert_eq!(leap_seconds_at(before), 0);
        assert_eq!(leap_seconds_at(after), 1);
        let recent = Utc.with_ymd_and_hms(2016, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(leap_seconds_at(recent), 17);
    }
}
