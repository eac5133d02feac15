use crate::{recorder::TIMESTAMP_HEADER, sample::parse_timestamp};
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, TimeDelta};
use csv::{ReaderBuilder, StringRecord};
use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
    time::Duration,
};
use tracing::{debug, info, warn};

const READ_CHUNK: u64 = 64 * 1024;

/// Latency values reloaded from the persisted log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    /// Values in chronological order, oldest first
    pub values: Vec<f64>,
    /// Records within the lookback that could not be parsed
    pub skipped: usize,
}

/// Reload at most `limit` latency values recorded within `lookback` of `now`.
///
/// The log is read backwards from its end and the scan stops at the first
/// record older than the lookback, or once `limit` values are collected, so
/// the cost follows the lookback rather than the size of the file. Header
/// rows, timeouts and unparsable records are skipped. A missing log yields an
/// empty history.
pub fn load_history(
    path: &Path,
    now: NaiveDateTime,
    lookback: Duration,
    limit: usize,
) -> Result<History> {
    if !path.exists() {
        info!("No existing log found at {}, starting with an empty window", path.display());
        return Ok(History::default());
    }

    // A lookback reaching past the representable range means no cutoff
    let cutoff = TimeDelta::from_std(lookback)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta));
    if cutoff.is_none() {
        warn!(?lookback, "lookback exceeds the representable time range; reading the whole log");
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    let mut lines = ReverseLines::new(file, READ_CHUNK)
        .with_context(|| format!("Failed to read log file: {}", path.display()))?;

    let mut history = History::default();

    while history.values.len() < limit {
        let Some(line) = lines
            .next_line()
            .with_context(|| format!("Failed to read log file: {}", path.display()))?
        else {
            break;
        };

        let record = match parse_record(&line) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(err) => {
                warn!(%err, "skipping malformed log record");
                history.skipped += 1;
                continue;
            }
        };

        let Some(raw_timestamp) = record.get(0) else {
            continue;
        };
        if raw_timestamp == TIMESTAMP_HEADER {
            continue;
        }

        let timestamp = match parse_timestamp(raw_timestamp) {
            Ok(ts) => ts,
            Err(err) => {
                warn!(timestamp = raw_timestamp, %err, "skipping record with invalid timestamp");
                history.skipped += 1;
                continue;
            }
        };

        if cutoff.is_some_and(|cutoff| timestamp < cutoff) {
            debug!(%timestamp, "reached records older than lookback");
            break;
        }

        let raw_latency = record.get(1).unwrap_or_default().trim();
        if raw_latency.is_empty() {
            // timeout
            continue;
        }

        match raw_latency.parse::<f64>() {
            Ok(latency_ms) if latency_ms.is_finite() => history.values.push(latency_ms),
            _ => {
                warn!(latency = raw_latency, "skipping record with invalid latency");
                history.skipped += 1;
            }
        }
    }

    history.values.reverse();

    info!(
        loaded = history.values.len(),
        skipped = history.skipped,
        path = %path.display(),
        "Loaded latency history"
    );

    Ok(history)
}

fn parse_record(line: &[u8]) -> csv::Result<Option<StringRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line);
    let mut record = StringRecord::new();
    if reader.read_record(&mut record)? {
        Ok(Some(record))
    } else {
        Ok(None)
    }
}

/// Yields the lines of a file last to first, reading fixed-size chunks
/// backwards from the end. Empty lines are skipped and `\r` is trimmed.
struct ReverseLines {
    file: File,
    pos: u64,
    chunk: u64,
    pending: Vec<u8>,
}

impl ReverseLines {
    fn new(mut file: File, chunk: u64) -> io::Result<Self> {
        let pos = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            file,
            pos,
            chunk: chunk.max(1),
            pending: Vec::new(),
        })
    }

    fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(idx) = self.pending.iter().rposition(|&b| b == b'\n') {
                let mut line = self.pending.split_off(idx + 1);
                self.pending.truncate(idx);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(line));
            }

            if self.pos == 0 {
                let mut line = std::mem::take(&mut self.pending);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok((!line.is_empty()).then_some(line));
            }

            let read = self.chunk.min(self.pos);
            self.pos -= read;
            self.file.seek(SeekFrom::Start(self.pos))?;
            let mut buf = vec![0; read as usize];
            self.file.read_exact(&mut buf)?;
            buf.extend_from_slice(&self.pending);
            self.pending = buf;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::TIMESTAMP_FORMAT;
    use std::{fs, io::Write};
    use tempfile::TempDir;

    const LOOKBACK: Duration = Duration::from_secs(12 * 3600);
    const LIMIT: usize = 600;

    fn now() -> NaiveDateTime {
        parse_timestamp("2024-06-01 12:00:00").unwrap()
    }

    fn ago(hours: i64, secs: i64) -> String {
        (now() - TimeDelta::hours(hours) - TimeDelta::seconds(secs))
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    fn write_log(dir: &TempDir, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("ping_log.csv");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    fn read_all_reversed(contents: &[u8], chunk: u64) -> Vec<String> {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, contents);
        let mut lines = ReverseLines::new(File::open(path).unwrap(), chunk).unwrap();
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().unwrap() {
            out.push(String::from_utf8(line).unwrap());
        }
        out
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let history = load_history(&dir.path().join("nope.csv"), now(), LOOKBACK, LIMIT).unwrap();
        assert_eq!(history, History::default());
    }

    #[test]
    fn test_only_records_within_lookback() {
        let dir = TempDir::new().unwrap();
        let contents = format!(
            "Timestamp,Response Time (ms),1m Avg,Status\n{},11.0,11.000,ok\n{},22.0,16.500,ok\n",
            ago(13, 0),
            ago(1, 0),
        );
        let path = write_log(&dir, contents.as_bytes());

        let history = load_history(&path, now(), LOOKBACK, LIMIT).unwrap();
        assert_eq!(history.values, vec![22.0]);
    }

    #[test]
    fn test_chronological_order_and_skips() {
        let dir = TempDir::new().unwrap();
        let contents = format!(
            "Timestamp,Response Time (ms),Status\n\
             {},1.0,ok\n\
             {},,timeout\n\
             not-a-date,99.0,ok\n\
             {},abc,ok\n\
             Timestamp,Response Time (ms),Status\n\
             {},2.0,ok\n\
             {},3.0\n",
            ago(2, 4),
            ago(2, 3),
            ago(2, 2),
            ago(2, 1),
            ago(2, 0),
        );
        let path = write_log(&dir, contents.as_bytes());

        let history = load_history(&path, now(), LOOKBACK, LIMIT).unwrap();
        assert_eq!(history.values, vec![1.0, 2.0, 3.0]);
        assert_eq!(history.skipped, 2);
    }

    #[test]
    fn test_stops_at_first_old_record() {
        let dir = TempDir::new().unwrap();
        // An out-of-order recent record before an old one is not reached
        let contents = format!(
            "{},5.0,ok\n{},6.0,ok\n{},7.0,ok\n",
            ago(0, 30),
            ago(20, 0),
            ago(0, 10),
        );
        let path = write_log(&dir, contents.as_bytes());

        let history = load_history(&path, now(), LOOKBACK, LIMIT).unwrap();
        assert_eq!(history.values, vec![7.0]);
    }

    #[test]
    fn test_rows_before_lookback_are_never_parsed() {
        let dir = TempDir::new().unwrap();
        let mut contents = Vec::new();
        // Old garbage: invalid UTF-8, an unterminated quote and a bad timestamp
        contents.extend_from_slice(b"\xff\xfe\xfd,1.0,ok\n");
        contents.extend_from_slice(b"\"unterminated,2.0\n");
        contents.extend_from_slice(b"not-a-date,3.0,ok\n");
        contents.extend_from_slice(format!("{},4.0,ok\n", ago(13, 0)).as_bytes());
        contents.extend_from_slice(format!("{},5.0,ok\n", ago(1, 0)).as_bytes());
        contents.extend_from_slice(format!("{},6.0,ok\n", ago(0, 0)).as_bytes());
        let path = write_log(&dir, &contents);

        let history = load_history(&path, now(), LOOKBACK, LIMIT).unwrap();
        assert_eq!(history.values, vec![5.0, 6.0]);
        assert_eq!(history.skipped, 0);
    }

    #[test]
    fn test_malformed_recent_row_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut contents = Vec::new();
        contents.extend_from_slice(format!("{},1.0,ok\n", ago(1, 0)).as_bytes());
        contents.extend_from_slice(b"\xff\xfe,9.0,ok\n");
        contents.extend_from_slice(format!("{},2.0,ok\n", ago(0, 0)).as_bytes());
        let path = write_log(&dir, &contents);

        let history = load_history(&path, now(), LOOKBACK, LIMIT).unwrap();
        assert_eq!(history.values, vec![1.0, 2.0]);
        assert_eq!(history.skipped, 1);
    }

    #[test]
    fn test_values_capped_at_limit() {
        let dir = TempDir::new().unwrap();
        let contents: String = (0..10)
            .map(|i| format!("{},{}.0,ok\n", ago(0, 10 - i), i))
            .collect();
        let path = write_log(&dir, contents.as_bytes());

        let history = load_history(&path, now(), LOOKBACK, 3).unwrap();
        assert_eq!(history.values, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_huge_lookback_reads_everything() {
        let dir = TempDir::new().unwrap();
        let contents = format!("{},1.0,ok\n{},2.0,ok\n", ago(20_000, 0), ago(0, 1));
        let path = write_log(&dir, contents.as_bytes());

        let lookback = Duration::from_secs(10_000_000_000_000);
        let history = load_history(&path, now(), lookback, LIMIT).unwrap();
        assert_eq!(history.values, vec![1.0, 2.0]);

        let history = load_history(&path, now(), Duration::MAX, LIMIT).unwrap();
        assert_eq!(history.values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, b"");
        let history = load_history(&path, now(), LOOKBACK, LIMIT).unwrap();
        assert!(history.values.is_empty());
    }

    #[test]
    fn test_reverse_lines_across_chunks() {
        let contents = b"first\r\nsecond line\n\nthird,with,commas\nlast-no-newline";
        let expected = vec!["last-no-newline", "third,with,commas", "second line", "first"];
        for chunk in [1, 3, 7, 64, 1024] {
            assert_eq!(read_all_reversed(contents, chunk), expected, "chunk {chunk}");
        }
    }

    #[test]
    fn test_reverse_lines_empty_and_trailing_newline() {
        assert!(read_all_reversed(b"", 8).is_empty());
        assert!(read_all_reversed(b"\n\n", 8).is_empty());
        assert_eq!(read_all_reversed(b"only\n", 2), vec!["only"]);
    }
}
