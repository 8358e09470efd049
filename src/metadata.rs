// src/metadata.rs
use crate::clock::rfc3339_micros;
use crate::record::Record;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::Path;

pub const INPUT_NAME: &str = "fluent-plugin-systemd";
pub const PIPELINE_NAME: &str = "fluentd";
pub const DOCKER_HOSTNAME_PATH: &str = "/etc/docker-hostname";

/// Which pipeline stage stamped a `pipeline_metadata` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    #[default]
    Collector,
    Normalizer,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Collector => "collector",
            PipelineStage::Normalizer => "normalizer",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime identity of this process, discovered once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub ipaddr4: String,
    pub ipaddr6: String,
    pub version: String,
    pub docker_hostname: Option<String>,
}

impl Identity {
    pub fn new(ipaddr4: &str, ipaddr6: &str, version: &str, docker_hostname: Option<&str>) -> Self {
        Identity {
            ipaddr4: ipaddr4.to_string(),
            ipaddr6: ipaddr6.to_string(),
            version: version.to_string(),
            docker_hostname: docker_hostname.map(str::to_string),
        }
    }

    /// Read identity from `IPADDR4`, `IPADDR6`, `FLUENTD_VERSION`,
    /// `DATA_VERSION` and the docker hostname file.
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());
        let version = format!(
            "{} {}",
            var("FLUENTD_VERSION", "unknown fluentd version"),
            var("DATA_VERSION", "unknown data version")
        );
        Identity {
            ipaddr4: var("IPADDR4", "127.0.0.1"),
            ipaddr6: var("IPADDR6", "::1"),
            version,
            docker_hostname: read_docker_hostname(Path::new(DOCKER_HOSTNAME_PATH)),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Identity::new("127.0.0.1", "::1", "unknown fluentd version unknown data version", None)
    }
}

/// First line of `path`, right-trimmed. `None` on any failure.
pub fn read_docker_hostname(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let first = contents.lines().next()?.trim_end();
            Some(first.to_string())
        }
        Err(e) => {
            tracing::debug!(target: "viaq", "no docker hostname at {}: {}", path.display(), e);
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetadataStamper {
    stage: PipelineStage,
    identity: Identity,
}

impl MetadataStamper {
    pub fn new(stage: PipelineStage, identity: Identity) -> Self {
        MetadataStamper { stage, identity }
    }

    /// Write `pipeline_metadata.<stage>`, leaving other stages' entries alone.
    pub fn stamp(&self, record: &mut Record, now: DateTime<Utc>) {
        let entry = json!({
            "ipaddr4": self.identity.ipaddr4,
            "ipaddr6": self.identity.ipaddr6,
            "inputname": INPUT_NAME,
            "name": PIPELINE_NAME,
            "received_at": rfc3339_micros(&now),
            "version": self.identity.version,
        });

        let slot = record
            .entry("pipeline_metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(stages) = slot {
            stages.insert(self.stage.as_str().to_string(), entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 7, 27, 17, 27, 46).unwrap()
    }

    #[test]
    fn test_stamp_writes_stage_entry() {
        let stamper = MetadataStamper::new(
            PipelineStage::Collector,
            Identity::new("10.0.0.1", "fe80::1", "1.0 2.0", None),
        );
        let mut record = Record::new();
        stamper.stamp(&mut record, now());
        assert_eq!(
            record["pipeline_metadata"],
            json!({"collector": {
                "ipaddr4": "10.0.0.1",
                "ipaddr6": "fe80::1",
                "inputname": "fluent-plugin-systemd",
                "name": "fluentd",
                "received_at": "2017-07-27T17:27:46.000000+00:00",
                "version": "1.0 2.0"
            }})
        );
    }

    #[test]
    fn test_stamp_keeps_sibling_stages() {
        let mut record = Record::new();
        MetadataStamper::new(PipelineStage::Collector, Identity::default()).stamp(&mut record, now());
        MetadataStamper::new(PipelineStage::Normalizer, Identity::default()).stamp(&mut record, now());
        let stages = record["pipeline_metadata"].as_object().unwrap();
        assert!(stages.contains_key("collector"));
        assert!(stages.contains_key("normalizer"));
    }

    #[test]
    fn test_stamp_replaces_non_object_metadata() {
        let mut record = Record::new();
        record.insert("pipeline_metadata".to_string(), json!("junk"));
        MetadataStamper::new(PipelineStage::Normalizer, Identity::default()).stamp(&mut record, now());
        assert!(record["pipeline_metadata"]["normalizer"].is_object());
    }

    #[test]
    fn test_read_docker_hostname() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "docker-host  ").unwrap();
        writeln!(file, "ignored").unwrap();
        assert_eq!(read_docker_hostname(file.path()).as_deref(), Some("docker-host"));
        assert_eq!(read_docker_hostname(Path::new("/nonexistent/docker-hostname")), None);
    }
}
