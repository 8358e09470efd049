//! Processor configuration.
//!
//! Loaded from YAML (JSON is valid YAML), then validated once into
//! [`Settings`], the immutable form the processor runs on.
//!
//! ```yaml
//! pipeline_type: normalizer
//! use_undefined: true
//! default_keep_fields: [time, message, level, hostname, systemd, kubernetes]
//! formatters:
//!   - tag: "journal.system**"
//!     type: sys_journal
//!     remove_keys: MESSAGE,PRIORITY,_HOSTNAME
//! index_names:
//!   - tag: "journal.system** mux.ops"
//!     name_type: operations_full
//!   - tag: "**"
//!     name_type: project_full
//! ```

use crate::error::ConfigError;
use crate::index::IndexRouter;
use crate::metadata::PipelineStage;
use crate::pattern::TagPattern;
use crate::record::{KeepFieldSet, TimeRename};
use crate::rules::{FormatterKind, FormatterRule, IndexNameType, IndexRule, RuleTable};
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// A field list written either as a sequence or a comma-separated string.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrString {
    List(Vec<String>),
    Csv(String),
}

fn split_fields<'a, I: IntoIterator<Item = &'a str>>(items: I) -> Vec<String> {
    items
        .into_iter()
        .flat_map(|item| item.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn field_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match ListOrString::deserialize(deserializer)? {
        ListOrString::List(items) => split_fields(items.iter().map(String::as_str)),
        ListOrString::Csv(text) => split_fields([text.as_str()]),
    })
}

fn optional_field_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    Option::<ListOrString>::deserialize(deserializer).map(|value| {
        value.map(|v| match v {
            ListOrString::List(items) => split_fields(items.iter().map(String::as_str)),
            ListOrString::Csv(text) => split_fields([text.as_str()]),
        })
    })
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: FormatterKind,
    #[serde(default, deserialize_with = "optional_field_list")]
    pub remove_keys: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexNameConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub tag: String,
    pub name_type: IndexNameType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViaqConfig {
    #[serde(deserialize_with = "field_list")]
    pub default_keep_fields: Vec<String>,
    #[serde(deserialize_with = "field_list")]
    pub extra_keep_fields: Vec<String>,
    #[serde(deserialize_with = "field_list")]
    pub keep_empty_fields: Vec<String>,
    pub use_undefined: bool,
    pub undefined_name: String,
    pub rename_time: bool,
    pub rename_time_if_missing: bool,
    pub src_time_name: String,
    pub dest_time_name: String,
    pub formatters: Vec<FormatterConfig>,
    #[serde(alias = "elasticsearch_index_names")]
    pub index_names: Vec<IndexNameConfig>,
    #[serde(alias = "elasticsearch_index_name_field")]
    pub index_name_field: String,
    #[serde(alias = "elasticsearch_index_prefix_field")]
    pub index_prefix_field: String,
    pub pipeline_type: PipelineStage,
    /// Trace every record in and out at debug level.
    pub debug_records: bool,
    /// Records with this tag are never traced.
    pub debug_ignore_tag: Option<String>,
}

impl Default for ViaqConfig {
    fn default() -> Self {
        ViaqConfig {
            default_keep_fields: Vec::new(),
            extra_keep_fields: Vec::new(),
            keep_empty_fields: vec!["message".to_string()],
            use_undefined: false,
            undefined_name: "undefined".to_string(),
            rename_time: true,
            rename_time_if_missing: false,
            src_time_name: "time".to_string(),
            dest_time_name: "@timestamp".to_string(),
            formatters: Vec::new(),
            index_names: Vec::new(),
            index_name_field: "viaq_index_name".to_string(),
            index_prefix_field: "viaq_index_prefix".to_string(),
            pipeline_type: PipelineStage::Collector,
            debug_records: false,
            debug_ignore_tag: None,
        }
    }
}

/// Validated, immutable configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub keep: KeepFieldSet,
    pub use_undefined: bool,
    pub undefined_name: String,
    pub rename: TimeRename,
    pub formatters: RuleTable<FormatterRule>,
    pub router: IndexRouter,
    pub stage: PipelineStage,
    pub debug_records: bool,
    pub debug_ignore_tag: Option<String>,
}

impl Settings {
    pub fn dest_time_name(&self) -> &str {
        &self.rename.dest_time_name
    }
}

impl ViaqConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(ViaqConfig::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Check the fatal invariants and compile every tag pattern.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let keep = KeepFieldSet::new(
            self.default_keep_fields.iter().cloned(),
            self.extra_keep_fields.iter().cloned(),
            self.keep_empty_fields.iter().cloned(),
        );

        if self.use_undefined && keep.contains(&self.undefined_name) {
            return Err(ConfigError::UndefinedNameInKeepFields(
                self.undefined_name.clone(),
            ));
        }

        let rename = TimeRename {
            rename_time: self.rename_time,
            rename_time_if_missing: self.rename_time_if_missing,
            src_time_name: self.src_time_name.clone(),
            dest_time_name: self.dest_time_name.clone(),
        };
        if rename.is_active() && self.use_undefined && !keep.contains(&self.src_time_name) {
            return Err(ConfigError::SourceTimeNotKept(self.src_time_name.clone()));
        }

        let formatters = self
            .formatters
            .iter()
            .map(|f| -> Result<FormatterRule, ConfigError> {
                Ok(FormatterRule {
                    enabled: f.enabled,
                    pattern: TagPattern::compile(&f.tag)?,
                    kind: f.kind,
                    remove_keys: f.remove_keys.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let index_rules = self
            .index_names
            .iter()
            .map(|i| -> Result<IndexRule, ConfigError> {
                Ok(IndexRule {
                    enabled: i.enabled,
                    pattern: TagPattern::compile(&i.tag)?,
                    name_type: i.name_type,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Settings {
            keep,
            use_undefined: self.use_undefined,
            undefined_name: self.undefined_name.clone(),
            rename,
            formatters: RuleTable::new(formatters),
            router: IndexRouter::new(
                RuleTable::new(index_rules),
                &self.index_name_field,
                &self.index_prefix_field,
                &self.dest_time_name,
            ),
            stage: self.pipeline_type,
            debug_records: self.debug_records,
            debug_ignore_tag: self.debug_ignore_tag.clone(),
        })
    }
}
