// src/index.rs
use crate::clock::parse_instant;
use crate::diagnostics::DiagnosticSink;
use crate::record::Record;
use crate::rules::{IndexRule, RuleTable};
use serde_json::Value;

pub const OPERATIONS_PREFIX: &str = ".operations";

/// What the router did with one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// No rule pattern matched the tag.
    NoMatch,
    /// The first matching rule is disabled.
    Disabled,
    Written { field: String, value: String },
    /// The matching rule could not be applied; the message went to the sink.
    Rejected(String),
}

/// Derives the index name or prefix field from the index rule table.
#[derive(Debug, Clone)]
pub struct IndexRouter {
    rules: RuleTable<IndexRule>,
    name_field: String,
    prefix_field: String,
    dest_time_name: String,
}

impl IndexRouter {
    pub fn new(
        rules: RuleTable<IndexRule>,
        name_field: &str,
        prefix_field: &str,
        dest_time_name: &str,
    ) -> Self {
        IndexRouter {
            rules,
            name_field: name_field.to_string(),
            prefix_field: prefix_field.to_string(),
            dest_time_name: dest_time_name.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn route(&self, tag: &str, record: &mut Record, sink: &dyn DiagnosticSink) -> RouteOutcome {
        let Some(rule) = self.rules.lookup(tag) else {
            return RouteOutcome::NoMatch;
        };
        if !rule.enabled {
            return RouteOutcome::Disabled;
        }

        let prefix = if rule.name_type.is_project() {
            match project_prefix(record) {
                Ok(prefix) => prefix,
                Err(missing) => {
                    return reject(
                        sink,
                        format!(
                            "record cannot use elasticsearch index name type {}: record is missing {} field: {}",
                            rule.name_type,
                            missing,
                            Value::Object(record.clone())
                        ),
                    );
                }
            }
        } else {
            OPERATIONS_PREFIX.to_string()
        };

        let (field, value) = if rule.name_type.is_full() {
            let Some(date) = self.record_date(record) else {
                return reject(
                    sink,
                    format!(
                        "record cannot use elasticsearch index name type {}: record has no parseable {} field",
                        rule.name_type, self.dest_time_name
                    ),
                );
            };
            (self.name_field.clone(), format!("{}.{}", prefix, date))
        } else {
            (self.prefix_field.clone(), prefix)
        };

        record.insert(field.clone(), Value::String(value.clone()));
        RouteOutcome::Written { field, value }
    }

    fn record_date(&self, record: &Record) -> Option<String> {
        record
            .get(&self.dest_time_name)
            .and_then(parse_instant)
            .map(|ts| ts.format("%Y.%m.%d").to_string())
    }
}

fn reject(sink: &dyn DiagnosticSink, message: String) -> RouteOutcome {
    sink.error(&message);
    RouteOutcome::Rejected(message)
}

/// `project.<namespace_name>.<namespace_id>`, or the path of the first
/// missing field.
fn project_prefix(record: &Record) -> Result<String, &'static str> {
    let k8s = match record.get("kubernetes") {
        None | Some(Value::Null) => return Err("kubernetes"),
        Some(value) => value,
    };
    let name = k8s
        .get("namespace_name")
        .and_then(Value::as_str)
        .ok_or("kubernetes.namespace_name")?;
    let uuid = k8s
        .get("namespace_id")
        .and_then(Value::as_str)
        .ok_or("kubernetes.namespace_id")?;
    Ok(format!("project.{}.{}", name, uuid))
}
