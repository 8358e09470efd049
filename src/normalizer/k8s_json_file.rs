// src/normalizer/k8s_json_file.rs
use super::FieldNormalizer;
use crate::clock::{parse_instant, rfc3339_micros};
use crate::record::{has_field, truthy, Record};
use crate::rules::FormatterKind;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Container logs written by the docker json-file driver.
pub struct K8sJsonFileNormalizer {
    dest_time_name: String,
    docker_hostname: Option<String>,
}

impl K8sJsonFileNormalizer {
    pub fn new(dest_time_name: &str, docker_hostname: Option<String>) -> Self {
        K8sJsonFileNormalizer {
            dest_time_name: dest_time_name.to_string(),
            docker_hostname,
        }
    }
}

impl FieldNormalizer for K8sJsonFileNormalizer {
    fn normalize(&self, _tag: &str, _time: DateTime<Utc>, record: &mut Record, _kind: FormatterKind) {
        let message = if truthy(record.get("message")) {
            record.get("message").cloned()
        } else {
            record.get("log").cloned()
        };
        record.insert("message".to_string(), message.unwrap_or(Value::Null));

        let level = match record.get("stream").and_then(Value::as_str) {
            Some("stdout") => "info",
            _ => "err",
        };
        record.insert("level".to_string(), Value::String(level.to_string()));

        let k8s_host = record
            .get("kubernetes")
            .and_then(|k| k.get("host"))
            .filter(|h| truthy(Some(*h)))
            .cloned();
        if let Some(host) = k8s_host {
            record.insert("hostname".to_string(), host);
        } else if let Some(docker) = &self.docker_hostname {
            record.insert("hostname".to_string(), Value::String(docker.clone()));
        }

        if !has_field(record, &self.dest_time_name) {
            if let Some(parsed) = record.get("time").and_then(parse_instant) {
                record.insert("time".to_string(), Value::String(rfc3339_micros(&parsed)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(docker: Option<&str>, value: Value) -> Record {
        let n = K8sJsonFileNormalizer::new("@timestamp", docker.map(str::to_string));
        let mut record = value.as_object().cloned().unwrap();
        n.normalize("kubernetes.var.log.containers.x", Utc::now(), &mut record, FormatterKind::K8sJsonFile);
        record
    }

    #[test]
    fn test_log_becomes_message_and_stream_sets_level() {
        let rec = run(None, json!({"log": "hello", "stream": "stdout"}));
        assert_eq!(rec["message"], json!("hello"));
        assert_eq!(rec["level"], json!("info"));

        let rec = run(None, json!({"message": "kept", "log": "ignored", "stream": "stderr"}));
        assert_eq!(rec["message"], json!("kept"));
        assert_eq!(rec["level"], json!("err"));
    }

    #[test]
    fn test_hostname_preference() {
        let rec = run(Some("docker"), json!({"kubernetes": {"host": "node-a"}}));
        assert_eq!(rec["hostname"], json!("node-a"));

        let rec = run(Some("docker"), json!({"kubernetes": {}}));
        assert_eq!(rec["hostname"], json!("docker"));

        let rec = run(None, json!({}));
        assert!(!rec.contains_key("hostname"));
    }

    #[test]
    fn test_time_reformatted_unless_destination_present() {
        let rec = run(None, json!({"time": "2017-07-27T17:27:46.216527123Z"}));
        assert_eq!(rec["time"], json!("2017-07-27T17:27:46.216527+00:00"));

        let rec = run(None, json!({"time": "garbage"}));
        assert_eq!(rec["time"], json!("garbage"));

        let rec = run(None, json!({"@timestamp": "x", "time": "2017-07-27T17:27:46Z"}));
        assert_eq!(rec["time"], json!("2017-07-27T17:27:46Z"));
    }
}
