//! Per-tag memo of the formatter lookup.
//!
//! The rule table never changes after startup, so entries are append-only and
//! never invalidated. Two workers racing on a new tag both compute the same
//! answer; the second insert is a no-op.

use crate::rules::{FormatterRule, RuleTable};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct Entries {
    resolved: HashMap<String, usize>,
    unresolved: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct DispatchCache {
    entries: RwLock<Entries>,
}

impl DispatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formatter rule for `tag`, or `None` when no enabled rule applies.
    ///
    /// A tag whose first match is disabled, or that matches nothing, is
    /// remembered as unresolved for the rest of the process.
    pub fn lookup<'t>(
        &self,
        tag: &str,
        table: &'t RuleTable<FormatterRule>,
    ) -> Option<&'t FormatterRule> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if entries.unresolved.contains(tag) {
                return None;
            }
            if let Some(&idx) = entries.resolved.get(tag) {
                return table.get(idx);
            }
        }

        let found = table
            .position(tag)
            .filter(|&idx| table.get(idx).is_some_and(|rule| rule.enabled));

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match found {
            Some(idx) => {
                entries.resolved.entry(tag.to_string()).or_insert(idx);
                table.get(idx)
            }
            None => {
                entries.unresolved.insert(tag.to_string());
                None
            }
        }
    }

    pub fn resolved_len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolved
            .len()
    }

    pub fn unresolved_len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .unresolved
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::TagPattern;
    use crate::rules::FormatterKind;

    fn rule(tag: &str, kind: FormatterKind, enabled: bool) -> FormatterRule {
        FormatterRule {
            enabled,
            pattern: TagPattern::compile(tag).unwrap(),
            kind,
            remove_keys: None,
        }
    }

    #[test]
    fn test_resolved_tags_are_memoized() {
        let table = RuleTable::new(vec![
            rule("journal.system**", FormatterKind::SysJournal, true),
            rule("**", FormatterKind::SysVarLog, true),
        ]);
        let cache = DispatchCache::new();

        let first = cache.lookup("journal.system", &table).unwrap();
        assert_eq!(first.kind, FormatterKind::SysJournal);
        assert_eq!(cache.resolved_len(), 1);

        let second = cache.lookup("journal.system", &table).unwrap();
        assert_eq!(second.kind, FormatterKind::SysJournal);
        assert_eq!(cache.resolved_len(), 1);
        assert_eq!(cache.unresolved_len(), 0);
    }

    #[test]
    fn test_disabled_first_match_is_unresolved() {
        let table = RuleTable::new(vec![
            rule("journal.system**", FormatterKind::SysJournal, false),
            rule("**", FormatterKind::SysVarLog, true),
        ]);
        let cache = DispatchCache::new();

        assert!(cache.lookup("journal.system", &table).is_none());
        assert!(cache.lookup("journal.system", &table).is_none());
        assert_eq!(cache.unresolved_len(), 1);
        assert_eq!(cache.resolved_len(), 0);

        assert_eq!(
            cache.lookup("other", &table).map(|r| r.kind),
            Some(FormatterKind::SysVarLog)
        );
    }

    #[test]
    fn test_unmatched_tag_is_unresolved() {
        let table = RuleTable::new(vec![rule("a.b", FormatterKind::K8sJsonFile, true)]);
        let cache = DispatchCache::new();
        assert!(cache.lookup("c.d", &table).is_none());
        assert_eq!(cache.unresolved_len(), 1);
    }

    #[test]
    fn test_decision_is_identical_with_and_without_cache() {
        let table = RuleTable::new(vec![
            rule("a.**", FormatterKind::SysJournal, false),
            rule("b.*", FormatterKind::K8sJsonFile, true),
            rule("**", FormatterKind::SysVarLog, true),
        ]);
        let cache = DispatchCache::new();
        for tag in ["a.x", "b.y", "c", "b.y.z", "a.x", "b.y"] {
            let uncached = table
                .lookup(tag)
                .filter(|r| r.enabled)
                .map(|r| r.kind);
            let cold = cache.lookup(tag, &table).map(|r| r.kind);
            let warm = cache.lookup(tag, &table).map(|r| r.kind);
            assert_eq!(uncached, cold, "tag {}", tag);
            assert_eq!(cold, warm, "tag {}", tag);
        }
    }

    #[test]
    fn test_shared_across_threads() {
        let table = RuleTable::new(vec![rule("**", FormatterKind::SysVarLog, true)]);
        let cache = DispatchCache::new();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for n in 0..50 {
                        let tag = format!("tag.{}", n % 10);
                        assert!(cache.lookup(&tag, &table).is_some());
                    }
                });
            }
        });
        assert_eq!(cache.resolved_len(), 10);
    }
}
