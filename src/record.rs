//! Record shaping stages that do not depend on the tag: undefined-field
//! bucketing, recursive empty-value pruning and time renaming.

use indexmap::IndexSet;
use serde_json::{Map, Value};

/// A log record. Key order follows insertion order.
pub type Record = Map<String, Value>;

/// Field names that survive bucketing, and the subset that also survives
/// pruning at the top level.
#[derive(Debug, Clone, Default)]
pub struct KeepFieldSet {
    keep: IndexSet<String>,
    keep_empty: IndexSet<String>,
}

impl KeepFieldSet {
    pub fn new<I, J, K>(default_keep: I, extra_keep: J, keep_empty: K) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
        K: IntoIterator<Item = String>,
    {
        let keep_empty: IndexSet<String> = keep_empty.into_iter().collect();
        let keep = default_keep
            .into_iter()
            .chain(extra_keep)
            .chain(keep_empty.iter().cloned())
            .collect();
        KeepFieldSet { keep, keep_empty }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.keep.contains(name)
    }

    pub fn keeps_empty(&self, name: &str) -> bool {
        self.keep_empty.contains(name)
    }
}

/// Null, `""`, `[]` and `{}` are empty. Zero and `false` are not.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Prune `value` bottom-up and report whether what is left is empty.
pub fn prune_value(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            map.retain(|_, child| !prune_value(child));
        }
        Value::Array(items) => {
            items.retain_mut(|child| !prune_value(child));
        }
        _ => {}
    }
    is_empty_value(value)
}

/// Remove every empty top-level field not listed as keep-empty.
///
/// Values under a keep-empty key are still pruned; only the key itself
/// survives.
pub fn prune_record(record: &mut Record, keep: &KeepFieldSet) {
    record.retain(|key, value| !prune_value(value) || keep.keeps_empty(key));
}

/// Move every top-level field not in `keep` under `bucket_name`.
///
/// Returns the number of fields moved. Nothing is written when every field
/// is kept.
pub fn bucket_undefined(record: &mut Record, keep: &KeepFieldSet, bucket_name: &str) -> usize {
    if record.keys().all(|key| keep.contains(key)) {
        return 0;
    }

    let mut kept = Record::new();
    let mut undefined = Record::new();
    for (key, value) in std::mem::take(record) {
        if keep.contains(&key) {
            kept.insert(key, value);
        } else {
            undefined.insert(key, value);
        }
    }

    let moved = undefined.len();
    *record = kept;
    record.insert(bucket_name.to_string(), Value::Object(undefined));
    moved
}

/// Time rename options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRename {
    pub rename_time: bool,
    pub rename_time_if_missing: bool,
    pub src_time_name: String,
    pub dest_time_name: String,
}

impl TimeRename {
    pub fn is_active(&self) -> bool {
        self.rename_time || self.rename_time_if_missing
    }
}

/// Move the source time field to the destination field.
///
/// With `rename_time_if_missing`, an existing destination wins and the
/// source value is dropped. The source key is removed either way.
pub fn rename_time(record: &mut Record, opts: &TimeRename) {
    if !opts.is_active() || opts.src_time_name == opts.dest_time_name {
        return;
    }
    let Some(value) = record.shift_remove(&opts.src_time_name) else {
        return;
    };
    if opts.rename_time_if_missing && record.contains_key(&opts.dest_time_name) {
        return;
    }
    record.insert(opts.dest_time_name.clone(), value);
}

/// Field is present and not null.
pub fn has_field(record: &Record, name: &str) -> bool {
    record.get(name).is_some_and(|v| !v.is_null())
}

/// Present and neither null nor `false`.
pub fn truthy(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null) | Some(Value::Bool(false)))
}
