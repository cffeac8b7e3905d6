//! The replicated log: append/truncate with Raft's log-matching semantics.

use serde::{Deserialize, Serialize};

/// A single entry in the replicated log.
///
/// `command` is treated as opaque bytes by the log and controller; only the
/// applier (`crate::applier`) interprets its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: u64,
    pub command: Vec<u8>,
}

impl LogEntry {
    pub fn new(term: u64, command: impl Into<Vec<u8>>) -> Self {
        Self {
            term,
            command: command.into(),
        }
    }

    fn sentinel() -> Self {
        Self {
            term: 0,
            command: Vec::new(),
        }
    }
}

/// An ordered, 0-indexed sequence of log entries, anchored by a permanent
/// sentinel at index 0 (`term=0`, empty command). The sentinel is never
/// removed or modified; every index-arithmetic operation elsewhere in the
/// crate relies on it existing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    entries: Vec<LogEntry>,
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

impl Log {
    pub fn new() -> Self {
        Self {
            entries: vec![LogEntry::sentinel()],
        }
    }

    pub fn last_index(&self) -> u64 {
        self.entries.len() as u64 - 1
    }

    pub fn last_term(&self) -> u64 {
        self.entries[self.last_index() as usize].term
    }

    pub fn get(&self, index: u64) -> Option<&LogEntry> {
        self.entries.get(index as usize)
    }

    pub fn term_at(&self, index: u64) -> Option<u64> {
        self.get(index).map(|e| e.term)
    }

    /// Entries strictly after `index`, to the end of the log.
    pub fn entries_after(&self, index: u64) -> &[LogEntry] {
        let start = (index as usize + 1).min(self.entries.len());
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        false // the sentinel makes this always non-empty
    }

    /// Append a leader's `entries` onto this log, anchored at `(prev_idx,
    /// prev_term)`. Implements Raft's AppendEntries consistency check and
    /// conflict resolution (§4.1).
    ///
    /// Returns `false` if the anchor is missing or mismatched, or if
    /// resolving the incoming entries would require overwriting an existing
    /// entry whose term is *higher* than the incoming one (a stale leader
    /// attempting to rewrite newer history). Returns `true` otherwise,
    /// including for an empty `entries` heartbeat against a valid anchor.
    pub fn append(&mut self, prev_idx: u64, prev_term: u64, entries: &[LogEntry]) -> bool {
        if prev_idx >= self.entries.len() as u64 {
            return false;
        }
        if self.entries[prev_idx as usize].term != prev_term {
            return false;
        }

        for (offset, incoming) in entries.iter().enumerate() {
            let pos = prev_idx as usize + 1 + offset;
            match self.entries.get(pos) {
                None => self.entries.push(incoming.clone()),
                Some(existing) if existing.term == incoming.term && existing.command == incoming.command => {
                    // Already present and matching: idempotent no-op.
                }
                Some(existing) if existing.term > incoming.term => {
                    return false;
                }
                Some(_) => {
                    self.entries.truncate(pos);
                    self.entries.push(incoming.clone());
                }
            }
        }

        true
    }

    /// Append a single entry produced locally by a leader (`NewCommand`
    /// handling), always anchored at the current tail.
    pub fn append_local(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(term: u64, command: &str) -> LogEntry {
        LogEntry::new(term, command.as_bytes().to_vec())
    }

    #[test]
    fn fresh_log_is_just_the_sentinel() {
        let log = Log::new();
        assert_eq!(log.last_index(), 0);
        assert_eq!(log.last_term(), 0);
        assert_eq!(log.get(0), Some(&LogEntry::sentinel()));
    }

    #[test]
    fn empty_entries_against_missing_anchor_fails() {
        let mut log = Log::new();
        assert!(!log.append(1, 1, &[]));
    }

    #[test]
    fn conflicting_tail_is_truncated_and_replaced() {
        let mut log = Log::new();
        log.entries.push(entry(1, ""));
        log.entries.push(entry(2, ""));
        log.entries.push(entry(3, ""));

        assert!(log.append(1, 1, &[entry(3, "noconflict")]));
        assert_eq!(
            log.entries,
            vec![entry(0, ""), entry(1, ""), entry(3, "noconflict")]
        );

        // idempotent replay
        assert!(log.append(1, 1, &[entry(3, "noconflict")]));
        assert_eq!(
            log.entries,
            vec![entry(0, ""), entry(1, ""), entry(3, "noconflict")]
        );

        // heartbeat against the same anchor is a no-op success
        assert!(log.append(1, 1, &[]));
        assert_eq!(
            log.entries,
            vec![entry(0, ""), entry(1, ""), entry(3, "noconflict")]
        );

        assert!(log.append(2, 3, &[entry(3, "another message")]));
        assert_eq!(
            log.entries,
            vec![
                entry(0, ""),
                entry(1, ""),
                entry(3, "noconflict"),
                entry(3, "another message"),
            ]
        );

        assert!(log.append(3, 3, &[entry(4, "multi1"), entry(4, "multi2")]));
        assert_eq!(
            log.entries,
            vec![
                entry(0, ""),
                entry(1, ""),
                entry(3, "noconflict"),
                entry(3, "another message"),
                entry(4, "multi1"),
                entry(4, "multi2"),
            ]
        );
    }

    #[test]
    fn stale_leader_cannot_overwrite_higher_term_entry() {
        let mut log = Log::new();
        log.entries = vec![
            entry(0, ""),
            entry(1, ""),
            entry(2, ""),
            entry(2, "noconflict"),
            entry(3, "another message"),
            entry(4, "multi1"),
            entry(4, "multi2"),
        ];

        // existing term (2) at position 2 is lower than incoming term 5: truncates.
        assert!(log.append(1, 1, &[entry(5, "ahem")]));
        assert_eq!(log.entries, vec![entry(0, ""), entry(1, ""), entry(5, "ahem")]);

        // now existing term (5) at position 2 is higher than incoming term 3: rejected.
        assert!(!log.append(1, 1, &[entry(3, "woah")]));
        assert_eq!(log.entries, vec![entry(0, ""), entry(1, ""), entry(5, "ahem")]);
    }

    #[test]
    fn append_is_idempotent_for_matching_entries() {
        let mut log = Log::new();
        let entries = [entry(0, "set x 1")];
        let first = log.append(0, 0, &entries);
        let snapshot = log.entries.clone();
        let second = log.append(0, 0, &entries);
        assert_eq!(first, second);
        assert_eq!(log.entries, snapshot);
    }
}
