//! Merge and retention rules for the memory store.

use std::collections::HashSet;

use crate::config::RetentionLimits;
use crate::model::{CompactNote, ErrorNote, MemoryBatch, MemoryCategory, MemoryEntry, Note};
use crate::storage::normalize::normalize_error;

/// Store contents bucketed by category, in the order they were read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preserved {
    /// `tech_stack`, `architecture`, `scripts`: at most one of each.
    pub tech: Vec<MemoryEntry>,
    pub compacts: Vec<CompactNote>,
    pub goals: Vec<Note>,
    pub decisions: Vec<Note>,
    pub completed: Vec<Note>,
    pub errors: Vec<ErrorNote>,
    /// Unrecognized entries, written back untouched.
    pub others: Vec<MemoryEntry>,
}

/// What a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub duplicates: usize,
    pub evicted: usize,
}

impl Preserved {
    pub fn from_entries(entries: Vec<MemoryEntry>) -> Self {
        let mut p = Preserved::default();
        for entry in entries {
            match entry {
                MemoryEntry::Tech { category, .. } => {
                    // A later instance supersedes an earlier one.
                    p.tech.retain(|t| t.category() != category);
                    p.tech.push(entry);
                }
                MemoryEntry::Compact(n) => p.compacts.push(n),
                MemoryEntry::Goal(n) => p.goals.push(n),
                MemoryEntry::Decision(n) => p.decisions.push(n),
                MemoryEntry::Completed(n) => p.completed.push(n),
                MemoryEntry::Error(n) => p.errors.push(n),
                other @ MemoryEntry::Other { .. } => p.others.push(other),
            }
        }
        p
    }

    /// Flatten back into store order: tech, compacts, goals, decisions,
    /// completed, errors, others.
    pub fn into_entries(self) -> Vec<MemoryEntry> {
        let mut out = self.tech;
        out.extend(self.compacts.into_iter().map(MemoryEntry::Compact));
        out.extend(self.goals.into_iter().map(MemoryEntry::Goal));
        out.extend(self.decisions.into_iter().map(MemoryEntry::Decision));
        out.extend(self.completed.into_iter().map(MemoryEntry::Completed));
        out.extend(self.errors.into_iter().map(MemoryEntry::Error));
        out.extend(self.others);
        out
    }

    pub fn tech_value(&self, category: MemoryCategory) -> Option<&serde_json::Value> {
        self.tech.iter().find_map(|t| match t {
            MemoryEntry::Tech { category: c, value } if *c == category => Some(value),
            _ => None,
        })
    }

    pub fn latest_compact(&self) -> Option<&CompactNote> {
        self.compacts.last()
    }

    pub fn is_empty(&self) -> bool {
        self.tech.is_empty()
            && self.compacts.is_empty()
            && self.goals.is_empty()
            && self.decisions.is_empty()
            && self.completed.is_empty()
            && self.errors.is_empty()
            && self.others.is_empty()
    }

    /// Fold a batch of new facts in, deduplicating and applying caps.
    pub fn merge(&mut self, batch: &MemoryBatch, limits: &RetentionLimits) -> MergeStats {
        let mut stats = MergeStats::default();

        for (category, value) in &batch.tech {
            self.tech.retain(|t| t.category() != *category);
            self.tech.push(MemoryEntry::Tech {
                category: *category,
                value: value.clone(),
            });
            stats.added += 1;
        }

        for note in &batch.compacts {
            push_unique(&mut self.compacts, note.clone(), |n| &n.content, &mut stats);
        }
        stats.evicted += cap(&mut self.compacts, limits.compacts);

        for note in &batch.goals {
            push_unique(&mut self.goals, note.clone(), |n| &n.content, &mut stats);
        }
        if !batch.completed.is_empty() {
            let done: HashSet<&str> = batch.completed.iter().map(|n| n.content.trim()).collect();
            self.goals.retain(|g| !done.contains(g.content.trim()));
        }
        stats.evicted += cap(&mut self.goals, limits.goals);

        for note in &batch.decisions {
            push_unique(&mut self.decisions, note.clone(), |n| &n.content, &mut stats);
        }
        stats.evicted += cap(&mut self.decisions, limits.decisions);

        for note in &batch.completed {
            push_unique(&mut self.completed, note.clone(), |n| &n.content, &mut stats);
        }
        stats.evicted += cap(&mut self.completed, limits.completed);

        for note in &batch.errors {
            let content = normalize_error(&note.content);
            if content.is_empty() {
                continue;
            }
            let normalized = ErrorNote {
                content,
                ..note.clone()
            };
            push_unique(&mut self.errors, normalized, |n| &n.content, &mut stats);
        }
        stats.evicted += cap(&mut self.errors, limits.errors);

        stats
    }
}

fn push_unique<T>(list: &mut Vec<T>, item: T, key: impl Fn(&T) -> &String, stats: &mut MergeStats) {
    let needle = key(&item).trim();
    if needle.is_empty() || list.iter().any(|existing| key(existing).trim() == needle) {
        stats.duplicates += 1;
        return;
    }
    list.push(item);
    stats.added += 1;
}

/// Keep only the newest `max` items. Returns how many were dropped.
fn cap<T>(list: &mut Vec<T>, max: usize) -> usize {
    if list.len() <= max {
        return 0;
    }
    let excess = list.len() - max;
    list.drain(..excess);
    excess
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> RetentionLimits {
        RetentionLimits::default()
    }

    #[test]
    fn test_decisions_deduplicated() {
        let mut p = Preserved::default();
        let mut batch = MemoryBatch::default();
        batch.decisions.push(Note::auto("Use Postgres for persistence"));
        batch.decisions.push(Note::auto("  Use Postgres for persistence "));

        let stats = p.merge(&batch, &limits());
        assert_eq!(p.decisions.len(), 1);
        assert_eq!(stats.added, 1);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut batch = MemoryBatch::default();
        batch.compacts.push(CompactNote::new("summary of work", None));
        batch.goals.push(Note::auto("Add login page"));
        batch.decisions.push(Note::auto("Use JWT for sessions"));
        batch.completed.push(Note::auto("Set up CI"));
        batch.errors.push(ErrorNote::new("error: linker failed", Some("Bash".into())));

        let mut once = Preserved::default();
        once.merge(&batch, &limits());
        let mut twice = once.clone();
        let stats = twice.merge(&batch, &limits());

        assert_eq!(stats.added, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_retention_keeps_newest_decisions() {
        let mut p = Preserved::default();
        let limits = RetentionLimits {
            decisions: 10,
            ..RetentionLimits::default()
        };
        for i in 0..15 {
            let mut batch = MemoryBatch::default();
            batch.decisions.push(Note::auto(format!("decision {i}")));
            p.merge(&batch, &limits);
            assert!(p.decisions.len() <= 10);
        }
        assert_eq!(p.decisions.first().unwrap().content, "decision 5");
        assert_eq!(p.decisions.last().unwrap().content, "decision 14");
    }

    #[test]
    fn test_default_decision_cap_never_exceeded() {
        let mut p = Preserved::default();
        for i in 0..15 {
            let mut batch = MemoryBatch::default();
            batch.decisions.push(Note::auto(format!("decision {i}")));
            p.merge(&batch, &limits());
        }
        assert_eq!(p.decisions.len(), 15);
        assert!(p.decisions.len() <= 30);
        assert_eq!(p.decisions.last().unwrap().content, "decision 14");
    }

    #[test]
    fn test_compacts_capped_at_ten() {
        let mut p = Preserved::default();
        let mut batch = MemoryBatch::default();
        for i in 0..12 {
            batch.compacts.push(CompactNote::new(format!("summary {i}"), None));
        }
        let stats = p.merge(&batch, &limits());
        assert_eq!(p.compacts.len(), 10);
        assert_eq!(stats.evicted, 2);
        assert_eq!(p.latest_compact().unwrap().content, "summary 11");
    }

    #[test]
    fn test_errors_normalized_before_dedup() {
        let mut p = Preserved::default();
        let mut batch = MemoryBatch::default();
        batch.errors.push(ErrorNote::new(
            "Compiling a v0.1\nerror[E0425]: cannot find value `x`\n --> src/lib.rs:1:1",
            Some("Bash".into()),
        ));
        batch.errors.push(ErrorNote::new(
            "Compiling a v0.1 (again)\nerror[E0425]: cannot find value `x`\n --> src/lib.rs:9:9",
            Some("Bash".into()),
        ));
        p.merge(&batch, &limits());
        assert_eq!(p.errors.len(), 1);
        assert_eq!(p.errors[0].content, "error[E0425]: cannot find value `x`");
    }

    #[test]
    fn test_completed_goal_leaves_goals() {
        let mut p = Preserved::default();
        let mut batch = MemoryBatch::default();
        batch.goals.push(Note::auto("Write README"));
        batch.goals.push(Note::auto("Add tests"));
        p.merge(&batch, &limits());

        let mut batch = MemoryBatch::default();
        batch.completed.push(Note::auto("Write README"));
        p.merge(&batch, &limits());

        assert_eq!(p.goals.len(), 1);
        assert_eq!(p.goals[0].content, "Add tests");
        assert_eq!(p.completed.len(), 1);
    }

    #[test]
    fn test_tech_superseded_wholesale() {
        let mut p = Preserved::from_entries(vec![
            MemoryEntry::parse_line(r#"{"type":"tech_stack","framework":"react"}"#),
            MemoryEntry::parse_line(r#"{"type":"tech_stack","framework":"vue"}"#),
            MemoryEntry::parse_line(r#"{"type":"scripts","dev":"npm run dev"}"#),
        ]);
        assert_eq!(p.tech.len(), 2);
        assert_eq!(
            p.tech_value(MemoryCategory::TechStack).unwrap()["framework"],
            "vue"
        );

        let mut batch = MemoryBatch::default();
        batch.tech.push((
            MemoryCategory::TechStack,
            serde_json::json!({"framework": "svelte"}),
        ));
        p.merge(&batch, &limits());
        assert_eq!(p.tech.len(), 2);
        assert_eq!(
            p.tech_value(MemoryCategory::TechStack).unwrap()["framework"],
            "svelte"
        );
    }

    #[test]
    fn test_into_entries_order() {
        let p = Preserved::from_entries(vec![
            MemoryEntry::parse_line(r#"{"type":"custom","x":1}"#),
            MemoryEntry::Error(ErrorNote::new("boom", None)),
            MemoryEntry::Decision(Note::auto("d")),
            MemoryEntry::parse_line(r#"{"type":"architecture","layers":3}"#),
            MemoryEntry::Compact(CompactNote::new("c", None)),
        ]);
        let order: Vec<MemoryCategory> = p.into_entries().iter().map(|e| e.category()).collect();
        assert_eq!(
            order,
            vec![
                MemoryCategory::Architecture,
                MemoryCategory::Compact,
                MemoryCategory::Decision,
                MemoryCategory::Error,
                MemoryCategory::Other,
            ]
        );
    }
}
