//! Parallel filesystem scanner.
//!
//! Topology: a single walker producer streams eligible files into a bounded
//! job channel; `W` workers pull jobs, scan line by line against the shared
//! matcher, and push findings into a result channel drained by a collector
//! thread. Backpressure is explicit (both channels are bounded) and
//! per-file failures are absorbed: logged, counted skipped, never fatal to
//! the rest of the tree.
//!
//! ```text
//! walker ──jobs(1024)──► worker×W ──results──► collector ──► Vec<ScanResult>
//! ```
//!
//! Matching is line-at-a-time by design; patterns cannot cross line
//! boundaries. Within one file, findings preserve line order per matcher
//! call; across files, ordering is unspecified.
//!
//! Cancellation is cooperative at file granularity: the walker and the
//! workers check the token between files, and in-flight file scans run to
//! completion.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use ignore::WalkBuilder;
use log::warn;
use serde::Serialize;

use crate::binary::is_binary_file;
use crate::matcher::{filter_overlapping_generic, MatchResult, Matcher, DEFAULT_GENERIC_RULE_PREFIX};
use crate::metrics::ScanMetrics;

/// Initial capacity of the per-file line reader.
const LINE_BUFFER_CAPACITY: usize = 128 * 1024;

/// Maximum accepted line length; longer lines fail the file.
const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Default maximum file size (100 MiB); larger files are skipped.
const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Default job channel capacity.
const DEFAULT_JOB_QUEUE_CAPACITY: usize = 1024;

/// A match enriched with its file location.
#[derive(Clone, Debug, Serialize)]
pub struct ScanResult {
    pub path: PathBuf,
    /// 1-based line number within the file.
    pub line_number: u64,
    #[serde(flatten)]
    pub finding: MatchResult,
}

/// Cooperative cancellation signal checked at file boundaries.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. The walker stops producing and workers stop
    /// scanning new files; in-flight files run to completion.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Scanner tuning knobs.
#[derive(Clone, Debug)]
pub struct ScannerConfig {
    /// Worker thread count. Workers mix blocking reads with CPU-bound
    /// matching, so the default oversubscribes to `2 × hardware
    /// concurrency`, floor one.
    pub workers: usize,

    /// Files larger than this are skipped (tracked under *skipped*).
    pub max_file_size: u64,

    /// Capacity of the bounded job and result channels.
    pub job_queue_capacity: usize,

    /// Rule-id namespace treated as generic for overlap filtering.
    pub generic_rule_prefix: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            workers: (num_cpus::get() * 2).max(1),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            job_queue_capacity: DEFAULT_JOB_QUEUE_CAPACITY,
            generic_rule_prefix: DEFAULT_GENERIC_RULE_PREFIX.to_string(),
        }
    }
}

struct FileJob {
    path: PathBuf,
    size: u64,
}

/// Parallel secret scanner over a compiled matcher.
///
/// The matcher is compiled (and therefore read-only) before the scanner
/// sees it, so all workers share it without locks. Metrics accumulate
/// across scans for the lifetime of the scanner.
pub struct Scanner {
    matcher: Arc<dyn Matcher>,
    config: ScannerConfig,
    metrics: Arc<ScanMetrics>,
    cancel: CancellationToken,
}

impl Scanner {
    /// Creates a scanner with default configuration.
    pub fn new(matcher: Arc<dyn Matcher>) -> Self {
        Self::with_config(matcher, ScannerConfig::default())
    }

    pub fn with_config(matcher: Arc<dyn Matcher>, config: ScannerConfig) -> Self {
        Self {
            matcher,
            config,
            metrics: Arc::new(ScanMetrics::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Shared metrics, updated live during scans.
    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// A clonable handle for cancelling in-progress scans.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Scans a directory tree (or single file) and returns all findings.
    ///
    /// Findings are unordered across files. Per-file and per-entry errors
    /// are logged and absorbed; only a nonexistent root is an error.
    pub fn scan_directory(&self, root: impl AsRef<Path>) -> io::Result<Vec<ScanResult>> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("scan root does not exist: {}", root.display()),
            ));
        }

        let (job_tx, job_rx) = crossbeam_channel::bounded::<FileJob>(self.config.job_queue_capacity);
        let (result_tx, result_rx) =
            crossbeam_channel::bounded::<ScanResult>(self.config.job_queue_capacity);

        let results = std::thread::scope(|scope| {
            let collector = scope.spawn(move || {
                let mut all = Vec::new();
                while let Ok(result) = result_rx.recv() {
                    all.push(result);
                }
                all
            });

            for _ in 0..self.config.workers.max(1) {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                scope.spawn(move || self.worker(jobs, results));
            }
            // Workers hold the only remaining clones; when they exit, the
            // result channel closes and the collector drains out.
            drop(job_rx);
            drop(result_tx);

            self.walk(root, &job_tx);
            drop(job_tx);

            collector.join().expect("result collector panicked")
        });

        Ok(results)
    }

    /// Scans a single file line by line, without the binary heuristic or
    /// size cap applied by directory scans.
    pub fn scan_file(&self, path: impl AsRef<Path>) -> io::Result<Vec<ScanResult>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(LINE_BUFFER_CAPACITY, file);

        let mut results = Vec::new();
        let mut line: Vec<u8> = Vec::new();
        let mut line_number: u64 = 0;

        loop {
            line.clear();
            let read = (&mut reader)
                .take(MAX_LINE_BYTES as u64 + 2)
                .read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }
            line_number += 1;

            let mut end = line.len();
            if end > 0 && line[end - 1] == b'\n' {
                end -= 1;
            }
            if end > 0 && line[end - 1] == b'\r' {
                end -= 1;
            }
            if end > MAX_LINE_BYTES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line {line_number} exceeds maximum line length"),
                ));
            }

            // Invalid encodings are scanned lossily rather than failing the file.
            let text = String::from_utf8_lossy(&line[..end]);
            let mut matches = self.matcher.find_in_line(&text);
            if matches.len() > 1 {
                matches = filter_overlapping_generic(matches, &self.config.generic_rule_prefix);
            }
            for finding in matches {
                results.push(ScanResult {
                    path: path.to_path_buf(),
                    line_number,
                    finding,
                });
            }
        }

        Ok(results)
    }

    /// Walker producer: streams eligible regular files into the job channel.
    fn walk(&self, root: &Path, jobs: &Sender<FileJob>) {
        let mut builder = WalkBuilder::new(root);
        // The walker is a traversal engine here, not a filter: hidden files
        // and gitignored files are scanned like everything else.
        builder.standard_filters(false).follow_links(false);

        for entry in builder.build() {
            if self.cancel.is_cancelled() {
                break;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("walk error: {err}");
                    continue;
                }
            };
            let Some(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(err) => {
                    warn!("failed to stat {}: {err}", entry.path().display());
                    continue;
                }
            };

            let size = meta.len();
            if size == 0 || size > self.config.max_file_size {
                self.metrics.record_skipped();
                continue;
            }

            let job = FileJob {
                path: entry.into_path(),
                size,
            };
            if jobs.send(job).is_err() {
                break;
            }
        }
    }

    /// Worker consumer: applies the binary heuristic, scans, and forwards
    /// findings to the collector.
    fn worker(&self, jobs: Receiver<FileJob>, results: Sender<ScanResult>) {
        for job in jobs.iter() {
            // Keep draining after cancellation so the walker never blocks on
            // a full channel; the files are simply not scanned.
            if self.cancel.is_cancelled() {
                continue;
            }

            if is_binary_file(&job.path) {
                self.metrics.record_skipped();
                continue;
            }

            match self.scan_file(&job.path) {
                Ok(file_results) => {
                    self.metrics.record_scanned(job.size);
                    self.metrics.record_matches(file_results.len() as u64);
                    for result in file_results {
                        if results.send(result).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    warn!("error scanning {}: {err}", job.path.display());
                    self.metrics.record_skipped();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{select_matcher, EngineChoice};
    use crate::rule::{Rule, RuleTests};
    use std::fs;

    fn rule(id: &str, pattern: &str) -> Rule {
        Rule {
            name: id.to_string(),
            id: id.to_string(),
            pattern: pattern.to_string(),
            redact: Some((4, 4)),
            entropy: 0.0,
            description: String::new(),
            tags: Vec::new(),
            tests: RuleTests::default(),
            history: Vec::new(),
            refs: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn portable_scanner(rules: &[Rule]) -> Scanner {
        let matcher = select_matcher(rules, EngineChoice::Portable).unwrap();
        let mut config = ScannerConfig::default();
        config.workers = 2;
        Scanner::with_config(Arc::from(matcher), config)
    }

    #[test]
    fn scans_tree_and_reports_line_numbers() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.env"),
            "first line\nTOKEN=tok_deadbeef\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(
            dir.path().join("nested").join("notes.txt"),
            "nothing here\nstill nothing\ntok_cafef00d at last\n",
        )
        .unwrap();

        let scanner = portable_scanner(&[rule("tok.rule", r"tok_[0-9a-f]{8}")]);
        let mut results = scanner.scan_directory(dir.path()).unwrap();
        results.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].line_number, 2);
        assert_eq!(results[0].finding.matched, "tok_deadbeef");
        assert_eq!(results[1].line_number, 3);
        assert_eq!(results[1].finding.matched, "tok_cafef00d");

        let snap = scanner.metrics().snapshot();
        assert_eq!(snap.files_scanned, 2);
        assert_eq!(snap.files_skipped, 0);
        assert_eq!(snap.matches_found, 2);
        assert!(snap.bytes_scanned > 0);
    }

    #[test]
    fn skips_empty_oversized_and_binary_files() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("empty.txt"), "").unwrap();
        fs::write(dir.path().join("image.png"), "tok_deadbeef").unwrap();
        fs::write(dir.path().join("huge.txt"), vec![b'x'; 4096]).unwrap();
        fs::write(dir.path().join("real.txt"), "tok_deadbeef\n").unwrap();

        let mut config = ScannerConfig::default();
        config.workers = 2;
        config.max_file_size = 1024;
        let matcher = select_matcher(&[rule("tok.rule", r"tok_[0-9a-f]{8}")], EngineChoice::Portable)
            .unwrap();
        let scanner = Scanner::with_config(Arc::from(matcher), config);

        let results = scanner.scan_directory(dir.path()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path.file_name().unwrap(), "real.txt");

        let snap = scanner.metrics().snapshot();
        assert_eq!(snap.files_scanned, 1);
        assert_eq!(snap.files_skipped, 3);
    }

    #[test]
    fn generic_matches_are_filtered_per_line() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("creds.txt"),
            "api_key=sk-live-0123456789abcdef\nplain generic hit 0123456789abcdef\n",
        )
        .unwrap();

        let rules = [
            rule("acme.token", r"sk-live-[0-9a-f]{16}"),
            rule("generic.hex", r"[0-9a-f]{16}"),
        ];
        let scanner = portable_scanner(&rules);
        let mut results = scanner.scan_directory(dir.path()).unwrap();
        results.sort_by_key(|r| r.line_number);

        // Line 1: the generic hit overlaps the specific one and is dropped.
        // Line 2: the generic hit stands alone and survives.
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].line_number, 1);
        assert_eq!(results[0].finding.rule_id, "acme.token");
        assert_eq!(results[1].line_number, 2);
        assert_eq!(results[1].finding.rule_id, "generic.hex");
    }

    #[test]
    fn nonexistent_root_is_an_error() {
        let scanner = portable_scanner(&[rule("any.rule", "x")]);
        let err = scanner
            .scan_directory("/nonexistent/wraith/test/path")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn scan_single_file_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lone.txt");
        fs::write(&path, "tok_deadbeef\n").unwrap();

        let scanner = portable_scanner(&[rule("tok.rule", r"tok_[0-9a-f]{8}")]);
        let results = scanner.scan_directory(&path).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, path);
    }

    #[test]
    fn cancelled_scan_produces_no_new_work() {
        let dir = tempfile::TempDir::new().unwrap();
        for i in 0..32 {
            fs::write(dir.path().join(format!("f{i}.txt")), "tok_deadbeef\n").unwrap();
        }

        let scanner = portable_scanner(&[rule("tok.rule", r"tok_[0-9a-f]{8}")]);
        scanner.cancellation_token().cancel();
        let results = scanner.scan_directory(dir.path()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn crlf_lines_are_trimmed_before_matching() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dos.txt");
        fs::write(&path, "tok_deadbeef\r\n").unwrap();

        let scanner = portable_scanner(&[rule("tok.rule", r"tok_[0-9a-f]{8}$")]);
        let results = scanner.scan_file(&path).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].finding.matched, "tok_deadbeef");
    }
}
