// src/processor.rs
use crate::cache::DispatchCache;
use crate::clock::{rfc3339_micros, Clock, SystemClock};
use crate::config::{Settings, ViaqConfig};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::ConfigError;
use crate::index::RouteOutcome;
use crate::metadata::{Identity, MetadataStamper};
use crate::normalizer::{FieldNormalizer, Normalizers};
use crate::record::{bucket_undefined, has_field, prune_record, rename_time, Record};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Turns raw tagged records into ViaQ records.
///
/// Shareable across threads: all state is read-only except the formatter
/// dispatch cache, which synchronizes itself.
pub struct ViaqProcessor {
    settings: Settings,
    cache: DispatchCache,
    normalizers: Normalizers,
    stamper: MetadataStamper,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn DiagnosticSink>,
}

impl ViaqProcessor {
    /// Validate `config` and build a processor on the system clock that
    /// reports through `tracing`.
    pub fn new(config: &ViaqConfig, identity: Identity) -> Result<Self, ConfigError> {
        let settings = config.validate()?;
        Ok(Self::with_parts(
            settings,
            identity,
            Arc::new(SystemClock),
            Arc::new(TracingSink),
        ))
    }

    pub fn with_parts(
        settings: Settings,
        identity: Identity,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let normalizers = Normalizers::standard(
            settings.dest_time_name(),
            identity.docker_hostname.clone(),
            Arc::clone(&clock),
        );
        ViaqProcessor {
            stamper: MetadataStamper::new(settings.stage, identity),
            settings,
            cache: DispatchCache::new(),
            normalizers,
            clock,
            sink,
        }
    }

    /// Replace the journal normalizer used by `sys_journal` and `k8s_journal`.
    pub fn with_journal_normalizer(mut self, normalizer: Arc<dyn FieldNormalizer>) -> Self {
        self.normalizers.journal = normalizer;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn process(&self, tag: &str, time: DateTime<Utc>, mut record: Record) -> Record {
        self.process_in_place(tag, time, &mut record);
        record
    }

    pub fn process_in_place(&self, tag: &str, time: DateTime<Utc>, record: &mut Record) {
        let trace = self.traces(tag);
        if trace {
            self.sink.debug(&format!(
                "input {} {} {}",
                rfc3339_micros(&time),
                tag,
                Value::Object(record.clone())
            ));
        }

        self.format(tag, time, record);
        self.stamper.stamp(record, self.clock.now());

        if self.settings.use_undefined {
            bucket_undefined(record, &self.settings.keep, &self.settings.undefined_name);
        }
        prune_record(record, &self.settings.keep);
        // Metadata is stamped before pruning, so this does not fire while
        // the stamp stage stays ahead of it.
        if record.is_empty() {
            self.sink.warn(&format!(
                "Empty record! tag [{}] time [{}]",
                tag,
                rfc3339_micros(&time)
            ));
        }

        rename_time(record, &self.settings.rename);

        if self.settings.router.is_empty() {
            if trace {
                self.sink.debug("not adding elasticsearch index name or prefix");
            }
        } else {
            let outcome = self.settings.router.route(tag, record, self.sink.as_ref());
            if trace {
                match outcome {
                    RouteOutcome::NoMatch => self.sink.debug(&format!("no match for tag {}", tag)),
                    RouteOutcome::Written { field, value } => {
                        self.sink.debug(&format!("record[{}] = {}", field, value))
                    }
                    RouteOutcome::Disabled | RouteOutcome::Rejected(_) => {}
                }
            }
        }

        if trace {
            self.sink.debug(&format!(
                "output {} {} {}",
                rfc3339_micros(&time),
                tag,
                Value::Object(record.clone())
            ));
        }
    }

    fn traces(&self, tag: &str) -> bool {
        self.settings.debug_records && self.settings.debug_ignore_tag.as_deref() != Some(tag)
    }

    /// Run the matched normalizer, fill in `time` if nothing set one, then
    /// drop the rule's `remove_keys`.
    fn format(&self, tag: &str, time: DateTime<Utc>, record: &mut Record) {
        if self.settings.formatters.is_empty() {
            return;
        }
        let Some(rule) = self.cache.lookup(tag, &self.settings.formatters) else {
            return;
        };

        self.normalizers
            .for_kind(rule.kind)
            .normalize(tag, time, record, rule.kind);

        if !has_field(record, self.settings.dest_time_name()) && !has_field(record, "time") {
            record.insert("time".to_string(), Value::String(rfc3339_micros(&time)));
        }

        if let Some(keys) = &rule.remove_keys {
            for key in keys {
                record.shift_remove(key);
            }
        }
    }
}

impl std::fmt::Debug for ViaqProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViaqProcessor")
            .field("settings", &self.settings)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::diagnostics::MemorySink;
    use chrono::TimeZone;
    use serde_json::json;

    fn processor(yaml: &str, sink: Arc<MemorySink>) -> ViaqProcessor {
        let settings = ViaqConfig::from_yaml_str(yaml).unwrap().validate().unwrap();
        let now = Utc.with_ymd_and_hms(2017, 7, 27, 17, 30, 0).unwrap();
        ViaqProcessor::with_parts(settings, Identity::default(), Arc::new(FixedClock(now)), sink)
    }

    fn event_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 7, 27, 17, 27, 46).unwrap()
    }

    #[test]
    fn test_debug_records_traces_input_and_output() {
        let sink = Arc::new(MemorySink::new());
        let p = processor("debug_records: true\ndebug_ignore_tag: quiet\n", Arc::clone(&sink));
        let rec = json!({"a": "b"}).as_object().cloned().unwrap();

        p.process("loud", event_time(), rec.clone());
        let lines = sink.messages(crate::diagnostics::Severity::Debug);
        assert!(lines.iter().any(|l| l.starts_with("input ")));
        assert!(lines.iter().any(|l| l == "not adding elasticsearch index name or prefix"));
        assert!(lines.iter().any(|l| l.starts_with("output ")));

        let before = sink.lines().len();
        p.process("quiet", event_time(), rec);
        assert_eq!(sink.lines().len(), before);
    }

    #[test]
    fn test_empty_input_still_carries_metadata() {
        let sink = Arc::new(MemorySink::new());
        let p = processor("", Arc::clone(&sink));
        let out = p.process("t", event_time(), Record::new());
        assert_eq!(out.len(), 1);
        assert!(out["pipeline_metadata"]["collector"].is_object());
        assert!(sink.warnings().is_empty());
    }

    #[test]
    fn test_time_fallback_only_after_a_formatter_ran() {
        let sink = Arc::new(MemorySink::new());
        let p = processor(
            "rename_time: false\nformatters:\n  - tag: \"k8s.**\"\n    type: k8s_json_file\n",
            Arc::clone(&sink),
        );
        let rec = json!({"log": "x"}).as_object().cloned().unwrap();
        let out = p.process("k8s.pod", event_time(), rec.clone());
        assert_eq!(out["time"], json!("2017-07-27T17:27:46.000000+00:00"));

        let out = p.process("other", event_time(), rec);
        assert!(!out.contains_key("time"));
    }
}
