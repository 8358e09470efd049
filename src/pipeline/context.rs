use crate::clock::parse_instant;
use crate::error::ProcessingError;
use crate::record::Record;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

/// One decoded input line.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub tag: String,
    /// `None` means "stamp with the current time".
    pub time: Option<DateTime<Utc>>,
    pub record: Record,
}

impl Event {
    /// Decode an envelope `{"tag", "time", "record"}`, or a bare record when
    /// `default_tag` is set.
    pub fn parse(line: &str, line_number: usize, default_tag: Option<&str>) -> Result<Self, ProcessingError> {
        let invalid = |message: String| ProcessingError::InvalidEvent {
            line: line_number,
            message,
        };

        let value: Value = serde_json::from_str(line).map_err(|e| invalid(e.to_string()))?;
        let Value::Object(mut object) = value else {
            return Err(invalid("expected a JSON object".to_string()));
        };

        if let Some(tag) = default_tag {
            return Ok(Event {
                tag: tag.to_string(),
                time: None,
                record: object,
            });
        }

        let tag = match object.remove("tag") {
            Some(Value::String(tag)) => tag,
            _ => return Err(invalid("missing string field \"tag\"".to_string())),
        };
        let record = match object.remove("record") {
            Some(Value::Object(record)) => record,
            _ => return Err(invalid("missing object field \"record\"".to_string())),
        };
        let time = match object.remove("time") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                parse_instant(&value)
                    .map(|t| t.with_timezone(&Utc))
                    .ok_or_else(|| invalid(format!("unparseable time {}", value)))?,
            ),
        };

        Ok(Event { tag, time, record })
    }
}

/// Position of the pipeline in the current stream.
#[derive(Debug, Default)]
pub struct PipelineContext {
    pub line_number: usize,
    pub file_name: Option<String>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runtime statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub records_processed: usize,
    pub records_output: usize,
    pub errors: usize,
    /// Records that came out of the processor with no fields left.
    pub empty_records: usize,
    pub processing_time: Duration,
}

impl ProcessingStats {
    pub fn merge(&mut self, other: &ProcessingStats) {
        self.records_processed += other.records_processed;
        self.records_output += other.records_output;
        self.errors += other.errors;
        self.empty_records += other.empty_records;
        self.processing_time += other.processing_time;
    }

    pub fn rate(&self) -> Option<f64> {
        let secs = self.processing_time.as_secs_f64();
        (self.records_processed > 0 && secs > 0.0).then(|| self.records_processed as f64 / secs)
    }
}
