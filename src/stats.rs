//! Outcome taxonomy and execution statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One-character classification of an executed statement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Symbol {
    /// `.` statement executed without error.
    Ok,
    /// `S` SQL parser rejected the statement.
    Syntax,
    /// `t` statement was cancelled by the statement timeout.
    Timeout,
    /// `C` connection-level failure; the worker reconnects.
    Crash,
    /// `e` any other driver or runtime error.
    Error,
}

impl Symbol {
    /// The progress-stream character.
    pub fn as_char(self) -> char {
        match self {
            Symbol::Ok => '.',
            Symbol::Syntax => 'S',
            Symbol::Timeout => 't',
            Symbol::Crash => 'C',
            Symbol::Error => 'e',
        }
    }

    /// Human-readable label used in summaries.
    pub fn describe(self) -> &'static str {
        match self {
            Symbol::Ok => "OK",
            Symbol::Syntax => "Syntax",
            Symbol::Timeout => "Timeout",
            Symbol::Crash => "Crash",
            Symbol::Error => "Error",
        }
    }

    /// All symbols in summary order.
    pub const ALL: &'static [Symbol] =
        &[Symbol::Ok, Symbol::Syntax, Symbol::Timeout, Symbol::Crash, Symbol::Error];
}

/// Classification of one completed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// The outcome symbol.
    pub symbol: Symbol,
    /// The error-kind tag; `None` for successes.
    pub tag: Option<String>,
}

impl Outcome {
    /// A successful execution.
    pub fn ok() -> Self {
        Self { symbol: Symbol::Ok, tag: None }
    }

    /// A failure with a symbol and tag.
    pub fn failure(symbol: Symbol, tag: impl Into<String>) -> Self {
        Self { symbol, tag: Some(tag.into()) }
    }
}

/// Aggregated counters for one executor run. A plain value record, safe to
/// print or serialize; shapes are kept sorted so serialized output is
/// stable.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStats {
    /// Statements consumed from the stream.
    pub total: u64,
    /// Statements that completed without error.
    pub success: u64,
    /// Statements that failed.
    pub failed: u64,
    /// Completions per outcome symbol character.
    pub symbols: BTreeMap<char, u64>,
    /// Failure counts per error tag.
    pub errors: BTreeMap<String, u64>,
    /// Distinct canonicalized query shapes seen.
    pub shapes: BTreeSet<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// High-water mark of outstanding submissions, bounded by the
    /// executor's backpressure limit.
    pub max_in_flight: usize,
}

impl Default for ExecutionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionStats {
    /// Creates empty statistics stamped with the current time.
    pub fn new() -> Self {
        Self {
            total: 0,
            success: 0,
            failed: 0,
            symbols: BTreeMap::new(),
            errors: BTreeMap::new(),
            shapes: BTreeSet::new(),
            started_at: Utc::now(),
            max_in_flight: 0,
        }
    }

    /// Notes a statement entering the pipeline: bumps the total and records
    /// its shape. Happens before dispatch, on the producer thread.
    pub fn note_statement(&mut self, shape: String) {
        self.total += 1;
        self.shapes.insert(shape);
    }

    /// Records a completion.
    pub fn record(&mut self, outcome: &Outcome) {
        *self.symbols.entry(outcome.symbol.as_char()).or_insert(0) += 1;
        if outcome.symbol == Symbol::Ok {
            self.success += 1;
        } else {
            self.failed += 1;
            if let Some(tag) = &outcome.tag {
                *self.errors.entry(tag.clone()).or_insert(0) += 1;
            }
        }
    }

    /// Updates the in-flight high-water mark.
    pub fn note_in_flight(&mut self, in_flight: usize) {
        self.max_in_flight = self.max_in_flight.max(in_flight);
    }

    /// Completions recorded for one symbol.
    pub fn symbol_count(&self, symbol: Symbol) -> u64 {
        self.symbols.get(&symbol.as_char()).copied().unwrap_or(0)
    }

    /// Number of distinct query shapes.
    pub fn unique_shapes(&self) -> usize {
        self.shapes.len()
    }

    /// The most frequent error tags, descending, ties broken by name.
    pub fn top_errors(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> =
            self.errors.iter().map(|(tag, count)| (tag.as_str(), *count)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.truncate(limit);
        entries
    }

    /// Seconds elapsed since the run started.
    pub fn elapsed_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounting() {
        let mut stats = ExecutionStats::new();
        stats.note_statement("SELECT ?".to_owned());
        stats.note_statement("SELECT ?".to_owned());
        stats.note_statement("DELETE FROM t".to_owned());
        stats.record(&Outcome::ok());
        stats.record(&Outcome::failure(Symbol::Syntax, "SyntaxError"));
        stats.record(&Outcome::failure(Symbol::Error, "42P01"));

        assert_eq!(stats.total, 3);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.total, stats.success + stats.failed);
        let symbol_sum: u64 = stats.symbols.values().sum();
        assert_eq!(symbol_sum, 3);
        assert_eq!(stats.unique_shapes(), 2);
        assert_eq!(stats.symbol_count(Symbol::Syntax), 1);
    }

    #[test]
    fn test_top_errors_ordering() {
        let mut stats = ExecutionStats::new();
        for _ in 0..3 {
            stats.record(&Outcome::failure(Symbol::Error, "b_common"));
        }
        stats.record(&Outcome::failure(Symbol::Error, "a_rare"));
        stats.record(&Outcome::failure(Symbol::Error, "c_rare"));
        let top = stats.top_errors(2);
        assert_eq!(top, vec![("b_common", 3), ("a_rare", 1)]);
    }

    #[test]
    fn test_serializable() {
        let mut stats = ExecutionStats::new();
        stats.note_statement("SELECT ?".to_owned());
        stats.record(&Outcome::ok());
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["symbols"]["."], 1);
        assert_eq!(json["shapes"][0], "SELECT ?");
    }
}
