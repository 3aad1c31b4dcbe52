//! Run orchestration: scan, extract, generate, patch, summarize.
//!
//! Files are independent units of work and are processed by a bounded pool.
//! Candidates within one file are generated sequentially and patched in a
//! single write, so a file is either fully rewritten or left untouched.

pub mod summary;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future;
use futures_util::stream::{self, StreamExt};

use crate::config::Config;
use crate::cost::CostEstimator;
use crate::extract::extract_candidates;
use crate::generate::{generate_docstring, DocstringGenerator};
use crate::patch::{apply_edits, sort_tail_to_head, Edit, SourceFile};
use crate::prompt::PromptBuilder;
use crate::scan::{SourceEntry, SourceScanner};

pub use summary::{FailureRecord, FileOutcome, RunSummary};

/// What a run does with the candidates it finds
#[derive(Clone)]
pub enum Mode {
    /// Estimate cost only; no requests, no writes
    DryRun,
    Generate(Arc<dyn DocstringGenerator>),
}

pub struct Driver {
    scanner: SourceScanner,
    prompts: PromptBuilder,
    estimator: CostEstimator,
    mode: Mode,
    concurrency: usize,
    cancel: Arc<AtomicBool>,
}

impl Driver {
    pub fn new(
        config: &Config,
        scanner: SourceScanner,
        prompts: PromptBuilder,
        mode: Mode,
    ) -> Self {
        Self {
            scanner,
            prompts,
            estimator: CostEstimator::new(&config.pricing),
            mode,
            concurrency: config.concurrency(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an interrupt flag; once set, no new requests or files are started
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self.mode, Mode::DryRun)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Process every source file under the root and report the totals.
    ///
    /// Per-file and per-function failures are collected in the summary;
    /// nothing here aborts the run.
    pub async fn run(&self) -> RunSummary {
        self.run_with_progress(|_| {}).await
    }

    /// Like [`Driver::run`], calling `on_file` as each file finishes
    pub async fn run_with_progress<F>(&self, mut on_file: F) -> RunSummary
    where
        F: FnMut(&FileOutcome),
    {
        let start = Instant::now();
        let mut summary = RunSummary {
            dry_run: self.is_dry_run(),
            ..Default::default()
        };
        let mut pending = Vec::new();

        log::info!(
            "Scanning {} ({} worker(s){})",
            self.scanner.root().display(),
            self.concurrency,
            if self.is_dry_run() { ", dry run" } else { "" }
        );

        let outcomes = stream::iter(self.scanner.files())
            .take_while(|_| future::ready(!self.is_cancelled()))
            .map(|entry| self.process_file(entry))
            .buffer_unordered(self.concurrency);
        tokio::pin!(outcomes);

        while let Some(outcome) = outcomes.next().await {
            on_file(&outcome);
            pending.extend(summary.record(outcome));
        }

        if self.is_dry_run() {
            summary.estimate = Some(self.estimator.estimate(&pending));
        }
        summary.actual_cost = self.estimator.usage_cost(summary.tokens_used);
        summary.cancelled = self.is_cancelled();
        summary.elapsed = start.elapsed();
        summary.finish();
        summary
    }

    async fn process_file(&self, entry: SourceEntry) -> FileOutcome {
        let path = entry.relative_path.as_str();
        let mut outcome = FileOutcome::new(path);
        log::debug!("Reading {} ({} bytes)", path, entry.file_size);

        let file = match SourceFile::read(&entry.absolute_path) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("✗ {}: {}", path, e);
                outcome.fail(None, &e);
                return outcome;
            }
        };

        let candidates = match extract_candidates(&file.text) {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!("✗ {}: skipped, {}", path, e);
                outcome.fail(None, &e);
                return outcome;
            }
        };

        outcome.candidates_found = candidates.len();
        if candidates.is_empty() {
            log::debug!("{}: nothing to document", path);
            return outcome;
        }

        let names: Vec<_> = candidates.iter().map(|c| c.qualified_name.as_str()).collect();
        log::info!(
            "{}: {} function(s) without docstring: {}",
            path,
            names.len(),
            names.join(", ")
        );

        let generator = match &self.mode {
            Mode::DryRun => {
                outcome.pending = candidates;
                return outcome;
            }
            Mode::Generate(generator) => generator.as_ref(),
        };

        let mut edits = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            if self.is_cancelled() {
                log::warn!(
                    "{}: interrupted, writing {} of {} docstring(s)",
                    path,
                    edits.len(),
                    candidates.len()
                );
                break;
            }

            let request = self.prompts.build(candidate);
            match generate_docstring(generator, &request, candidate).await {
                Ok(result) => {
                    outcome.tokens_used += result.total_tokens;
                    edits.push(Edit::new(candidate.insert_offset, result.docstring));
                    log::info!("✓ {}::{}", path, candidate.qualified_name);
                }
                Err(e) if e.is_candidate_local() => {
                    log::warn!("✗ {}::{}: {}", path, candidate.qualified_name, e);
                    outcome.fail(Some(&candidate.qualified_name), &e);
                }
                Err(e) => {
                    log::error!(
                        "✗ {}::{}: {}, file left unchanged",
                        path,
                        candidate.qualified_name,
                        e
                    );
                    outcome.fail(Some(&candidate.qualified_name), &e);
                    return outcome;
                }
            }
        }

        if edits.is_empty() {
            return outcome;
        }

        sort_tail_to_head(&mut edits);
        match apply_edits(&file.text, &edits).and_then(|patched| file.write_back(&patched)) {
            Ok(()) => {
                outcome.docstrings_added = edits.len();
                outcome.written = true;
            }
            Err(e) => {
                log::error!("✗ {}: write aborted, file left unchanged: {}", path, e);
                outcome.fail(None, &e);
            }
        }

        outcome
    }
}
