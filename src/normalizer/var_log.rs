// src/normalizer/var_log.rs
use super::{resolve_localhost, FieldNormalizer};
use crate::clock::{parse_instant, rfc3339_micros, Clock};
use crate::record::{has_field, Record};
use crate::rules::FormatterKind;
use chrono::{DateTime, Datelike, Duration, FixedOffset, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

/// Syslog-style records read from `/var/log/messages`.
pub struct VarLogNormalizer {
    dest_time_name: String,
    docker_hostname: Option<String>,
    clock: Arc<dyn Clock>,
}

impl VarLogNormalizer {
    pub fn new(dest_time_name: &str, docker_hostname: Option<String>, clock: Arc<dyn Clock>) -> Self {
        VarLogNormalizer {
            dest_time_name: dest_time_name.to_string(),
            docker_hostname,
            clock,
        }
    }

    fn record_time(&self, record: &Record, time: DateTime<Utc>) -> String {
        let rectime = record
            .get("time")
            .and_then(parse_instant)
            .unwrap_or_else(|| time.fixed_offset());
        let rectime = if rectime.with_timezone(&Utc) > self.clock.now() {
            previous_year(rectime)
        } else {
            rectime
        };
        rfc3339_micros(&rectime)
    }
}

/// Syslog timestamps carry no year, so a stamp in the future was written
/// last year.
fn previous_year(instant: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    instant
        .with_year(instant.year() - 1)
        .unwrap_or_else(|| instant - Duration::days(365))
}

impl FieldNormalizer for VarLogNormalizer {
    fn normalize(&self, _tag: &str, time: DateTime<Utc>, record: &mut Record, _kind: FormatterKind) {
        let pid = record.get("pid").cloned().unwrap_or(Value::Null);
        let ident = record.get("ident").cloned().unwrap_or(Value::Null);
        record.insert(
            "systemd".to_string(),
            json!({"t": {"PID": pid}, "u": {"SYSLOG_IDENTIFIER": ident}}),
        );

        if !has_field(record, &self.dest_time_name) {
            let stamped = self.record_time(record, time);
            record.insert("time".to_string(), Value::String(stamped));
        }

        let host = record.get("host").cloned().unwrap_or(Value::Null);
        record.insert(
            "hostname".to_string(),
            resolve_localhost(&host, self.docker_hostname.as_deref()),
        );
    }
}
