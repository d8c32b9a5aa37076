//! Profiling log line parser.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use proftrace_config::LogFormat;
use proftrace_core::{Activity, Event, Message, QueryId, TraceError, WorkerId};
use regex::{Captures, Regex};
use thiserror::Error;
use tracing::debug;

const LEGACY_GRAMMAR: &str = r"\[query_id#(?P<query>\d+)\]\[(?P<op>[\w(),]+)@(?P<fragment>-?\d+)\]\[(?P<time>\d+)\]:(?P<message>.*)$";
const POOLED_GRAMMAR: &str = r"\[query_id#(?P<query>\d+)\]\[(?P<op>[\w(),]+)@(?P<fragment>-?\d+)\]\[(?P<time>\d+)\]\[(?P<slot>-?\d+)\]:(?P<message>.*)$";

const START_TIME_MS: &str = "startTimeInMS";
const START_TIME_NS: &str = "startTimeInNS";

/// Why a line was not turned into an event. Never fatal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("line does not match the {0} log grammar")]
    NoMatch(LogFormat),

    #[error("field {0} is out of range")]
    BadNumber(&'static str),

    #[error("unknown message {0:?}")]
    UnknownMessage(String),
}

/// Path of a worker's profiling log inside a log directory.
pub fn worker_log_path(log_dir: &Path, worker_id: WorkerId) -> PathBuf {
    log_dir.join(format!("worker_{}_profile", worker_id))
}

pub struct LogParser {
    format: LogFormat,
    legacy: Regex,
    pooled: Regex,
}

impl LogParser {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            legacy: Regex::new(LEGACY_GRAMMAR).expect("legacy grammar is a valid regex"),
            pooled: Regex::new(POOLED_GRAMMAR).expect("pooled grammar is a valid regex"),
        }
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn parse_line(&self, line: &str) -> Result<Event, ParseError> {
        let caps = match self.format {
            LogFormat::Legacy => self.legacy.captures(line),
            LogFormat::Pooled => self.pooled.captures(line),
            LogFormat::Auto => self
                .pooled
                .captures(line)
                .or_else(|| self.legacy.captures(line)),
        }
        .ok_or(ParseError::NoMatch(self.format))?;

        let operator = caps["op"].to_string();
        let message = parse_message(&operator, caps["message"].trim())?;
        let slot = match caps.name("slot") {
            Some(m) => Some(m.as_str().parse().map_err(|_| ParseError::BadNumber("slot"))?),
            None => None,
        };

        Ok(Event {
            query_id: number(&caps, "query")?,
            fragment_id: number(&caps, "fragment")?,
            timestamp: number(&caps, "time")?,
            operator,
            slot,
            message,
        })
    }

    /// Parses a whole log, keeping only events of `query_id`.
    ///
    /// Lines that do not parse are dropped; invalid UTF-8 is replaced rather
    /// than treated as an I/O failure.
    pub fn parse_query<R: BufRead>(
        &self,
        reader: R,
        query_id: QueryId,
        worker_id: WorkerId,
    ) -> Result<Vec<Event>, TraceError> {
        let mut events = Vec::new();
        let mut dropped = 0usize;

        for line in reader.split(b'\n') {
            let line = line?;
            match self.parse_line(&String::from_utf8_lossy(&line)) {
                Ok(event) if event.query_id == query_id => events.push(event),
                Ok(_) => {}
                Err(_) => dropped += 1,
            }
        }

        debug!(
            worker_id,
            query_id,
            events = events.len(),
            dropped,
            "Parsed profiling log"
        );

        if events.is_empty() {
            return Err(TraceError::NoEvents {
                query_id,
                worker_id,
            });
        }
        Ok(events)
    }

    /// Reads `worker_<id>_profile` from `log_dir` and parses it.
    pub fn read_worker_log(
        &self,
        log_dir: &Path,
        query_id: QueryId,
        worker_id: WorkerId,
    ) -> Result<Vec<Event>, TraceError> {
        let file = File::open(worker_log_path(log_dir, worker_id))?;
        self.parse_query(BufReader::new(file), query_id, worker_id)
    }
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new(LogFormat::default())
    }
}

fn number(caps: &Captures<'_>, field: &'static str) -> Result<i64, ParseError> {
    caps[field].parse().map_err(|_| ParseError::BadNumber(field))
}

fn parse_message(operator: &str, text: &str) -> Result<Message, ParseError> {
    match operator {
        START_TIME_MS => return Ok(Message::StartTimeInMs),
        START_TIME_NS => return Ok(Message::StartTimeInNs),
        _ => {}
    }
    match text {
        "live" => Ok(Message::Activity(Activity::Live)),
        "hang" => Ok(Message::Activity(Activity::Hang)),
        "wait" => Ok(Message::Activity(Activity::Wait)),
        "wake" => Ok(Message::Activity(Activity::Wake)),
        "set time" | "set_time" => Ok(Message::SetTime),
        other => Err(ParseError::UnknownMessage(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_pooled_line() {
        let parser = LogParser::default();
        let event = parser
            .parse_line("12:00:01.123 INFO  ProfilingLogger - [query_id#7][ScanR@0][1500][3]:hang")
            .unwrap();

        assert_eq!(event.query_id, 7);
        assert_eq!(event.operator, "ScanR");
        assert_eq!(event.fragment_id, 0);
        assert_eq!(event.timestamp, 1500);
        assert_eq!(event.slot, Some(3));
        assert_eq!(event.message, Message::Activity(Activity::Hang));
    }

    #[test]
    fn test_parse_legacy_line() {
        let parser = LogParser::default();
        let event = parser
            .parse_line("[query_id#7][Shuffle(R)@-1][1500]:live")
            .unwrap();

        assert_eq!(event.operator, "Shuffle(R)");
        assert_eq!(event.fragment_id, -1);
        assert_eq!(event.slot, None);
        assert_eq!(event.message, Message::Activity(Activity::Live));
    }

    #[test]
    fn test_explicit_format_rejects_other_grammar() {
        let legacy = LogParser::new(LogFormat::Legacy);
        let pooled = LogParser::new(LogFormat::Pooled);

        let v1 = "[query_id#7][ScanR@0][1500]:live";
        let v2 = "[query_id#7][ScanR@0][1500][2]:live";

        assert!(legacy.parse_line(v1).is_ok());
        assert_eq!(legacy.parse_line(v2), Err(ParseError::NoMatch(LogFormat::Legacy)));
        assert!(pooled.parse_line(v2).is_ok());
        assert_eq!(pooled.parse_line(v1), Err(ParseError::NoMatch(LogFormat::Pooled)));
    }

    #[test]
    fn test_timing_markers() {
        let parser = LogParser::default();
        let ms = parser
            .parse_line("[query_id#7][startTimeInMS@0][1400000000000][0]:set time")
            .unwrap();
        assert_eq!(ms.message, Message::StartTimeInMs);
        assert_eq!(ms.timestamp, 1_400_000_000_000);

        let ns = parser
            .parse_line("[query_id#7][startTimeInNS@0][90][0]:set time")
            .unwrap();
        assert_eq!(ns.message, Message::StartTimeInNs);

        let set = parser.parse_line("[query_id#7][ScanR@0][90]:set time").unwrap();
        assert_eq!(set.message, Message::SetTime);
    }

    #[test]
    fn test_unknown_message_and_overflow_are_parse_errors() {
        let parser = LogParser::default();
        assert_eq!(
            parser.parse_line("[query_id#7][ScanR@0][90]:explode"),
            Err(ParseError::UnknownMessage("explode".to_string()))
        );
        assert_eq!(
            parser.parse_line("[query_id#7][ScanR@0][99999999999999999999]:live"),
            Err(ParseError::BadNumber("time"))
        );
    }

    #[test]
    fn test_parse_query_drops_noise_and_other_queries() {
        let log = b"starting worker\n\
            [query_id#7][ScanR@0][100][1]:live\n\
            garbage \xff\xfe line\n\
            [query_id#8][ScanR@0][110][1]:live\n\
            [query_id#7][ScanR@0][150][3]:hang\n";

        let events = LogParser::default()
            .parse_query(Cursor::new(&log[..]), 7, 1)
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.query_id == 7));
    }

    #[test]
    fn test_parse_query_without_matching_events() {
        let log = "[query_id#8][ScanR@0][110][1]:live\n";
        let err = LogParser::default()
            .parse_query(Cursor::new(log), 7, 2)
            .unwrap_err();
        assert!(matches!(err, TraceError::NoEvents { query_id: 7, worker_id: 2 }));
    }

    #[test]
    fn test_worker_log_path() {
        assert_eq!(
            worker_log_path(Path::new("/logs"), 3),
            PathBuf::from("/logs/worker_3_profile")
        );
    }
}
