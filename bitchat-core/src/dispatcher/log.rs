//! Bounded in-memory error log and the statistics derived from it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

use crate::config::defaults::STATS_RECENT_ERRORS;
use crate::error::{BitChatError, ErrorCategory, ErrorSeverity};

/// One failure observed by the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub error: BitChatError,
    pub timestamp: DateTime<Utc>,
    /// Set once every handler and listener has run
    pub handled: bool,
}

impl LogEntry {
    pub(crate) fn new(error: BitChatError) -> Self {
        Self {
            id: format!("err_{}", Uuid::new_v4().simple()),
            error,
            timestamp: Utc::now(),
            handled: false,
        }
    }
}

/// Snapshot of the log grouped by category and severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub total_errors: usize,
    /// Every category is present, zero when unseen
    pub by_category: BTreeMap<ErrorCategory, usize>,
    /// Every severity is present, zero when unseen
    pub by_severity: BTreeMap<ErrorSeverity, usize>,
    pub last_error: Option<LogEntry>,
    /// Most recent first
    pub recent_errors: Vec<LogEntry>,
}

impl ErrorStats {
    pub fn category_count(&self, category: ErrorCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }

    pub fn severity_count(&self, severity: ErrorSeverity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }
}

/// Ring of log entries that drops the oldest entry when full
#[derive(Debug)]
pub(crate) struct ErrorLog {
    entries: VecDeque<LogEntry>,
    max_size: usize,
}

impl ErrorLog {
    pub(crate) fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size.min(1024)),
            max_size: max_size.max(1),
        }
    }

    pub(crate) fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        self.trim();
    }

    pub(crate) fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
        self.trim();
    }

    fn trim(&mut self) {
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
    }

    pub(crate) fn mark_handled(&mut self, id: &str) {
        // The entry is almost always the newest one
        if let Some(entry) = self.entries.iter_mut().rev().find(|e| e.id == id) {
            entry.handled = true;
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub(crate) fn recent(&self, count: usize) -> Vec<LogEntry> {
        self.entries.iter().rev().take(count).cloned().collect()
    }

    pub(crate) fn find(&self, id: &str) -> Option<LogEntry> {
        self.entries.iter().find(|e| e.id == id).cloned()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn stats(&self) -> ErrorStats {
        let mut by_category: BTreeMap<ErrorCategory, usize> =
            ErrorCategory::ALL.iter().map(|c| (*c, 0)).collect();
        let mut by_severity: BTreeMap<ErrorSeverity, usize> =
            ErrorSeverity::ALL.iter().map(|s| (*s, 0)).collect();

        for entry in &self.entries {
            *by_category.entry(entry.error.category()).or_insert(0) += 1;
            *by_severity.entry(entry.error.severity()).or_insert(0) += 1;
        }

        ErrorStats {
            total_errors: self.entries.len(),
            by_category,
            by_severity,
            last_error: self.entries.back().cloned(),
            recent_errors: self.recent(STATS_RECENT_ERRORS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn entry(message: &str) -> LogEntry {
        LogEntry::new(BitChatError::new(ErrorCode::Unknown, message))
    }

    #[test]
    fn test_push_drops_oldest() {
        let mut log = ErrorLog::new(3);
        for i in 0..5 {
            log.push(entry(&format!("e{}", i)));
        }
        let messages: Vec<_> = log
            .snapshot()
            .iter()
            .map(|e| e.error.message().to_string())
            .collect();
        assert_eq!(messages, vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn test_recent_is_most_recent_first() {
        let mut log = ErrorLog::new(10);
        for i in 0..4 {
            log.push(entry(&format!("e{}", i)));
        }
        let recent: Vec<_> = log
            .recent(2)
            .iter()
            .map(|e| e.error.message().to_string())
            .collect();
        assert_eq!(recent, vec!["e3", "e2"]);
    }

    #[test]
    fn test_shrinking_trims_immediately() {
        let mut log = ErrorLog::new(10);
        for i in 0..6 {
            log.push(entry(&format!("e{}", i)));
        }
        log.set_max_size(2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.snapshot()[0].error.message(), "e4");
    }

    #[test]
    fn test_ids_are_unique() {
        let a = entry("a");
        let b = entry("b");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("err_"));
    }

    #[test]
    fn test_stats_have_every_key() {
        let log = ErrorLog::new(10);
        let stats = log.stats();
        assert_eq!(stats.total_errors, 0);
        assert_eq!(stats.by_category.len(), ErrorCategory::ALL.len());
        assert_eq!(stats.by_severity.len(), ErrorSeverity::ALL.len());
        assert!(stats.last_error.is_none());
        assert!(stats.recent_errors.is_empty());
    }
}
