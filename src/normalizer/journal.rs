// src/normalizer/journal.rs
use super::{resolve_localhost, FieldNormalizer};
use crate::clock::rfc3339_micros;
use crate::record::{has_field, truthy, Record};
use crate::rules::FormatterKind;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

const TRUSTED_FIELDS: &[&str] = &[
    "_AUDIT_LOGINUID",
    "_AUDIT_SESSION",
    "_BOOT_ID",
    "_CAP_EFFECTIVE",
    "_CMDLINE",
    "_COMM",
    "_EXE",
    "_GID",
    "_MACHINE_ID",
    "_PID",
    "_SELINUX_CONTEXT",
    "_SYSTEMD_CGROUP",
    "_SYSTEMD_OWNER_UID",
    "_SYSTEMD_SESSION",
    "_SYSTEMD_SLICE",
    "_SYSTEMD_UNIT",
    "_SYSTEMD_USER_UNIT",
    "_TRANSPORT",
    "_UID",
];

const USER_FIELDS: &[&str] = &[
    "CODE_FILE",
    "CODE_FUNCTION",
    "CODE_LINE",
    "ERRNO",
    "MESSAGE_ID",
    "RESULT",
    "UNIT",
    "SYSLOG_FACILITY",
    "SYSLOG_IDENTIFIER",
    "SYSLOG_PID",
];

const KERNEL_FIELDS: &[&str] = &[
    "_KERNEL_DEVICE",
    "_KERNEL_SUBSYSTEM",
    "_UDEV_SYSNAME",
    "_UDEV_DEVNODE",
    "_UDEV_DEVLINK",
];

const LEVELS: [&str; 8] = [
    "emerg", "alert", "crit", "err", "warning", "notice", "info", "debug",
];

/// Records read from the systemd journal, host units or container logs.
pub struct JournalNormalizer {
    dest_time_name: String,
    docker_hostname: Option<String>,
}

impl JournalNormalizer {
    pub fn new(dest_time_name: &str, docker_hostname: Option<String>) -> Self {
        JournalNormalizer {
            dest_time_name: dest_time_name.to_string(),
            docker_hostname,
        }
    }

    fn hostname(&self, record: &Record, kind: FormatterKind) -> Option<Value> {
        if kind == FormatterKind::K8sJournal {
            let k8s_host = record.get("kubernetes").and_then(|k| k.get("host"));
            if truthy(k8s_host) {
                return k8s_host.cloned();
            }
        }
        record
            .get("_HOSTNAME")
            .map(|host| resolve_localhost(host, self.docker_hostname.as_deref()))
    }
}

/// Copy the listed fields into a namespace, optionally dropping the leading `_`.
fn collect_namespace(record: &Record, fields: &[&str], strip_underscore: bool) -> Map<String, Value> {
    let mut ns = Map::new();
    for &field in fields {
        if let Some(value) = record.get(field) {
            let name = if strip_underscore {
                field.strip_prefix('_').unwrap_or(field)
            } else {
                field
            };
            ns.insert(name.to_string(), value.clone());
        }
    }
    ns
}

/// `PRIORITY` as a syslog severity name, `unknown` when it is not 0..=7.
pub fn priority_level(priority: Option<&Value>) -> &'static str {
    let parsed = match priority {
        Some(Value::String(s)) => s.trim().parse::<usize>().ok(),
        Some(Value::Number(n)) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        _ => None,
    };
    parsed
        .and_then(|idx| LEVELS.get(idx).copied())
        .unwrap_or("unknown")
}

/// Journal realtime stamps are microseconds since the epoch.
fn journal_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let micros = match value {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    DateTime::from_timestamp_micros(micros)
}

impl FieldNormalizer for JournalNormalizer {
    fn normalize(&self, _tag: &str, _time: DateTime<Utc>, record: &mut Record, kind: FormatterKind) {
        let mut systemd = Map::new();
        for (ns, fields, strip) in [
            ("t", TRUSTED_FIELDS, true),
            ("u", USER_FIELDS, false),
            ("k", KERNEL_FIELDS, true),
        ] {
            let collected = collect_namespace(record, fields, strip);
            if !collected.is_empty() {
                systemd.insert(ns.to_string(), Value::Object(collected));
            }
        }
        if !systemd.is_empty() {
            record.insert("systemd".to_string(), Value::Object(systemd));
        }

        let level = priority_level(record.get("PRIORITY"));
        record.insert("level".to_string(), Value::String(level.to_string()));

        let keep_message = kind == FormatterKind::K8sJournal && truthy(record.get("message"));
        if !keep_message {
            if let Some(message) = record.get("MESSAGE").cloned() {
                record.insert("message".to_string(), message);
            }
        }

        if let Some(hostname) = self.hostname(record, kind) {
            record.insert("hostname".to_string(), hostname);
        }

        if !has_field(record, &self.dest_time_name) {
            let stamp = ["_SOURCE_REALTIME_TIMESTAMP", "__REALTIME_TIMESTAMP"]
                .iter()
                .find_map(|field| record.get(*field).and_then(journal_timestamp));
            if let Some(stamp) = stamp {
                record.insert("time".to_string(), Value::String(rfc3339_micros(&stamp)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(kind: FormatterKind, docker: Option<&str>, value: Value) -> Record {
        let n = JournalNormalizer::new("@timestamp", docker.map(str::to_string));
        let mut record = value.as_object().cloned().unwrap();
        n.normalize("journal.system", Utc::now(), &mut record, kind);
        record
    }

    #[test]
    fn test_namespaces_are_split_by_origin() {
        let rec = run(
            FormatterKind::SysJournal,
            None,
            json!({
                "_PID": "42",
                "_COMM": "sshd",
                "SYSLOG_IDENTIFIER": "sshd",
                "_KERNEL_DEVICE": "c1:3",
                "MESSAGE": "hi"
            }),
        );
        assert_eq!(
            rec["systemd"],
            json!({
                "t": {"PID": "42", "COMM": "sshd"},
                "u": {"SYSLOG_IDENTIFIER": "sshd"},
                "k": {"KERNEL_DEVICE": "c1:3"}
            })
        );
        assert_eq!(rec["message"], json!("hi"));
    }

    #[test]
    fn test_empty_namespaces_are_not_created() {
        let rec = run(FormatterKind::SysJournal, None, json!({"_PID": "1"}));
        assert_eq!(rec["systemd"], json!({"t": {"PID": "1"}}));

        let rec = run(FormatterKind::SysJournal, None, json!({"MESSAGE": "x"}));
        assert!(!rec.contains_key("systemd"));
    }

    #[test]
    fn test_priority_levels() {
        assert_eq!(priority_level(Some(&json!("0"))), "emerg");
        assert_eq!(priority_level(Some(&json!(3))), "err");
        assert_eq!(priority_level(Some(&json!("7"))), "debug");
        assert_eq!(priority_level(Some(&json!("8"))), "unknown");
        assert_eq!(priority_level(Some(&json!(-1))), "unknown");
        assert_eq!(priority_level(Some(&json!(2.5))), "unknown");
        assert_eq!(priority_level(Some(&json!("two"))), "unknown");
        assert_eq!(priority_level(None), "unknown");
    }

    #[test]
    fn test_k8s_journal_keeps_existing_message_and_prefers_k8s_host() {
        let rec = run(
            FormatterKind::K8sJournal,
            Some("docker"),
            json!({
                "message": "from container",
                "MESSAGE": "raw",
                "_HOSTNAME": "localhost",
                "kubernetes": {"host": "node-b"}
            }),
        );
        assert_eq!(rec["message"], json!("from container"));
        assert_eq!(rec["hostname"], json!("node-b"));
    }

    #[test]
    fn test_localhost_replaced_for_system_journal() {
        let rec = run(FormatterKind::SysJournal, Some("docker"), json!({"_HOSTNAME": "localhost"}));
        assert_eq!(rec["hostname"], json!("docker"));
    }

    #[test]
    fn test_time_from_realtime_timestamps() {
        let rec = run(
            FormatterKind::SysJournal,
            None,
            json!({"__REALTIME_TIMESTAMP": "1501176466216527"}),
        );
        assert_eq!(rec["time"], json!("2017-07-27T17:27:46.216527+00:00"));

        let rec = run(
            FormatterKind::SysJournal,
            None,
            json!({"_SOURCE_REALTIME_TIMESTAMP": 1501176466000000u64, "__REALTIME_TIMESTAMP": "1"}),
        );
        assert_eq!(rec["time"], json!("2017-07-27T17:27:46.000000+00:00"));

        let rec = run(
            FormatterKind::SysJournal,
            None,
            json!({"@timestamp": "set", "__REALTIME_TIMESTAMP": "1501176466216527"}),
        );
        assert!(!rec.contains_key("time"));
    }
}
