use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::cost::CostEstimate;
use crate::error::{DocstringerError, FailureKind};
use crate::extract::FunctionCandidate;

/// One skipped unit of work: a whole file, or a single function in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub path: String,
    pub function: Option<String>,
    pub message: String,
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(function) => write!(f, "{}::{}: {}", self.path, function, self.message),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

/// Result of processing a single file
#[derive(Debug, Default)]
pub struct FileOutcome {
    pub relative_path: String,
    pub candidates_found: usize,
    pub docstrings_added: usize,
    pub tokens_used: u64,
    pub written: bool,
    /// Candidates collected for the estimate in dry-run mode
    pub pending: Vec<FunctionCandidate>,
    pub failures: Vec<(FailureKind, FailureRecord)>,
}

impl FileOutcome {
    pub fn new(relative_path: &str) -> Self {
        Self {
            relative_path: relative_path.to_string(),
            ..Default::default()
        }
    }

    /// One-line status for progress output; `None` for files with nothing to do
    pub fn status_line(&self) -> Option<String> {
        if let Some((_, record)) = self.failures.iter().find(|(_, r)| r.function.is_none()) {
            return Some(format!("✗ {}", record));
        }
        if self.candidates_found == 0 && self.failures.is_empty() {
            return None;
        }
        if !self.pending.is_empty() {
            return Some(format!(
                "  {}: {} function(s) without docstring",
                self.relative_path,
                self.pending.len()
            ));
        }

        let mark = if self.failures.is_empty() { "✓" } else { "✗" };
        Some(format!(
            "{} {}: {}/{} docstring(s) added",
            mark, self.relative_path, self.docstrings_added, self.candidates_found
        ))
    }

    pub fn fail(&mut self, function: Option<&str>, error: &DocstringerError) {
        self.failures.push((
            error.kind(),
            FailureRecord {
                path: self.relative_path.clone(),
                function: function.map(str::to_string),
                message: error.to_string(),
            },
        ));
    }
}

/// Aggregate over all files of a run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub dry_run: bool,
    pub files_scanned: usize,
    pub files_patched: usize,
    pub candidates_found: usize,
    pub docstrings_added: usize,
    pub tokens_used: u64,
    pub actual_cost: f64,
    pub estimate: Option<CostEstimate>,
    pub cancelled: bool,
    pub elapsed: Duration,
    pub failures: BTreeMap<FailureKind, Vec<FailureRecord>>,
}

impl RunSummary {
    /// Fold a file outcome into the totals. Candidates pending an estimate
    /// are handed back to the caller.
    pub fn record(&mut self, outcome: FileOutcome) -> Vec<FunctionCandidate> {
        self.files_scanned += 1;
        self.candidates_found += outcome.candidates_found;
        self.docstrings_added += outcome.docstrings_added;
        self.tokens_used += outcome.tokens_used;
        if outcome.written {
            self.files_patched += 1;
        }

        for (kind, record) in outcome.failures {
            self.failures.entry(kind).or_default().push(record);
        }

        outcome.pending
    }

    /// Files finish in any order; sort for a stable report
    pub fn finish(&mut self) {
        for records in self.failures.values_mut() {
            records.sort_by(|a, b| (&a.path, &a.function).cmp(&(&b.path, &b.function)));
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failures.values().map(Vec::len).sum()
    }

    pub fn failures_of(&self, kind: FailureKind) -> &[FailureRecord] {
        self.failures.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "=== Dry Run Complete ===")?;
        } else {
            writeln!(f, "=== Docstringer Complete ===")?;
        }
        writeln!(f, "Files scanned: {}", self.files_scanned)?;
        writeln!(f, "Functions without docstring: {}", self.candidates_found)?;

        if let Some(estimate) = &self.estimate {
            writeln!(f, "{}", estimate)?;
        } else {
            writeln!(
                f,
                "Docstrings added: {} (in {} file(s))",
                self.docstrings_added, self.files_patched
            )?;
            writeln!(
                f,
                "Tokens used: {} (cost: ${:.4})",
                self.tokens_used, self.actual_cost
            )?;
        }
        writeln!(f, "Time: {:?}", self.elapsed)?;

        if self.failures.is_empty() {
            writeln!(f, "Failures: none")?;
        } else {
            writeln!(f, "Failures: {}", self.failure_count())?;
            for (kind, records) in &self.failures {
                writeln!(f, "  {} ({}):", kind, records.len())?;
                for record in records {
                    writeln!(f, "    {}", record)?;
                }
            }
        }

        if self.cancelled {
            writeln!(f, "Interrupted: remaining files were not processed.")?;
        }
        Ok(())
    }
}
