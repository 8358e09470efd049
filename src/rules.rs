// src/rules.rs
use crate::pattern::TagPattern;
use serde::Deserialize;
use std::fmt;

/// Record shape a formatter rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatterKind {
    #[serde(alias = "journal")]
    SysJournal,
    K8sJournal,
    #[serde(alias = "var_log")]
    SysVarLog,
    K8sJsonFile,
}

impl FormatterKind {
    pub fn is_journal(self) -> bool {
        matches!(self, FormatterKind::SysJournal | FormatterKind::K8sJournal)
    }
}

impl fmt::Display for FormatterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatterKind::SysJournal => "sys_journal",
            FormatterKind::K8sJournal => "k8s_journal",
            FormatterKind::SysVarLog => "sys_var_log",
            FormatterKind::K8sJsonFile => "k8s_json_file",
        };
        f.write_str(name)
    }
}

/// How an index rule derives the index field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexNameType {
    OperationsFull,
    OperationsPrefix,
    ProjectFull,
    ProjectPrefix,
}

impl IndexNameType {
    /// `*_full` types append the record date and write the index name field.
    pub fn is_full(self) -> bool {
        matches!(self, IndexNameType::OperationsFull | IndexNameType::ProjectFull)
    }

    pub fn is_project(self) -> bool {
        matches!(self, IndexNameType::ProjectFull | IndexNameType::ProjectPrefix)
    }
}

impl fmt::Display for IndexNameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexNameType::OperationsFull => "operations_full",
            IndexNameType::OperationsPrefix => "operations_prefix",
            IndexNameType::ProjectFull => "project_full",
            IndexNameType::ProjectPrefix => "project_prefix",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct FormatterRule {
    pub enabled: bool,
    pub pattern: TagPattern,
    pub kind: FormatterKind,
    pub remove_keys: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct IndexRule {
    pub enabled: bool,
    pub pattern: TagPattern,
    pub name_type: IndexNameType,
}

/// Anything that can sit in a [`RuleTable`].
pub trait TaggedRule {
    fn pattern(&self) -> &TagPattern;
    fn enabled(&self) -> bool;
}

impl TaggedRule for FormatterRule {
    fn pattern(&self) -> &TagPattern {
        &self.pattern
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

impl TaggedRule for IndexRule {
    fn pattern(&self) -> &TagPattern {
        &self.pattern
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

/// Ordered rule list with first-match-wins lookup.
///
/// A disabled rule that matches still takes the slot: lookup never skips it
/// to reach a later enabled rule. Callers check [`TaggedRule::enabled`] on
/// the result themselves.
#[derive(Debug, Clone)]
pub struct RuleTable<R> {
    rules: Vec<R>,
}

impl<R> Default for RuleTable<R> {
    fn default() -> Self {
        RuleTable { rules: Vec::new() }
    }
}

impl<R: TaggedRule> RuleTable<R> {
    pub fn new(rules: Vec<R>) -> Self {
        RuleTable { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn get(&self, index: usize) -> Option<&R> {
        self.rules.get(index)
    }

    /// Position of the first rule whose pattern matches `tag`, enabled or not.
    pub fn position(&self, tag: &str) -> Option<usize> {
        self.rules.iter().position(|rule| rule.pattern().matches(tag))
    }

    pub fn lookup(&self, tag: &str) -> Option<&R> {
        self.position(tag).map(|idx| &self.rules[idx])
    }
}
