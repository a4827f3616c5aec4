// Batch orchestrator — every TSV file in a directory, failures isolated.
//
// Files are processed on a rayon pool of `jobs` workers. Finished files
// stream back over a channel to the calling thread, which persists them one
// at a time; a file whose persistence fails counts as failed. A panic inside
// one file's stages fails that file only. The combined lexicon is only
// assembled once every file has finished.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};

use super::run::{process_file, FileReport};
use crate::config::PipelineParams;
use crate::error::{PipelineError, PipelineResult, PipelineWarning};
use crate::topics::LexiconEntry;

/// What a successful file leaves behind once its documents are persisted.
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub source: PathBuf,
    pub dataset: String,
    pub documents: usize,
    pub clusters: usize,
    pub lexicon: Vec<LexiconEntry>,
    pub warnings: Vec<PipelineWarning>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum FileOutcome {
    Succeeded(FileSummary),
    Failed {
        source: PathBuf,
        error: PipelineError,
        elapsed: Duration,
    },
}

impl FileOutcome {
    pub fn source(&self) -> &Path {
        match self {
            FileOutcome::Succeeded(s) => &s.source,
            FileOutcome::Failed { source, .. } => source,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Succeeded(_))
    }
}

#[derive(Debug)]
pub struct BatchSummary {
    /// Sorted by source path.
    pub outcomes: Vec<FileOutcome>,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn succeeded(&self) -> impl Iterator<Item = &FileSummary> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Succeeded(s) => Some(s),
            FileOutcome::Failed { .. } => None,
        })
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn any_succeeded(&self) -> bool {
        self.outcomes.iter().any(FileOutcome::is_success)
    }

    /// Lexicon rows of every successful file, in file order.
    pub fn combined(&self) -> Vec<LexiconEntry> {
        self.succeeded()
            .flat_map(|s| s.lexicon.iter().cloned())
            .collect()
    }
}

/// Every `*.tsv` file directly inside `dir`, sorted by path.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read data directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_tsv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"));
        if path.is_file() && is_tsv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Process `files` on `jobs` workers, handing each finished report to
/// `persist` on the calling thread.
pub fn run_batch<F>(
    files: &[PathBuf],
    params: &PipelineParams,
    budget: Option<Duration>,
    jobs: usize,
    persist: F,
) -> Result<BatchSummary>
where
    F: FnMut(&FileReport) -> PipelineResult<()>,
{
    run_files(
        files,
        jobs,
        params.progress,
        |path| process_file(path, params, budget),
        persist,
    )
}

/// Text of a caught panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn run_files<W, F>(
    files: &[PathBuf],
    jobs: usize,
    progress: bool,
    worker: W,
    mut persist: F,
) -> Result<BatchSummary>
where
    W: Fn(&Path) -> PipelineResult<FileReport> + Sync,
    F: FnMut(&FileReport) -> PipelineResult<()>,
{
    let started = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to build worker pool")?;

    let pb = if progress {
        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("  Files [{bar:30}] {pos}/{len} ({eta})") {
            pb.set_style(style);
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    let (tx, rx) = mpsc::channel::<(PathBuf, Instant, PipelineResult<FileReport>)>();
    let mut outcomes = Vec::with_capacity(files.len());
    let worker = &worker;

    std::thread::scope(|scope| {
        scope.spawn(move || {
            pool.install(|| {
                files.par_iter().for_each_with(tx, |tx, path| {
                    let file_started = Instant::now();
                    info!(file = %path.display(), "Processing file");
                    let result = catch_unwind(AssertUnwindSafe(|| worker(path)))
                        .unwrap_or_else(|payload| {
                            Err(PipelineError::Panicked(panic_message(payload.as_ref())))
                        });
                    // The receiver outlives every worker.
                    let _ = tx.send((path.clone(), file_started, result));
                });
            });
        });

        for (source, file_started, result) in rx {
            let result = result.and_then(|report| persist(&report).map(|()| report));
            let elapsed = file_started.elapsed();
            let outcome = match result {
                Ok(report) => {
                    info!(
                        file = %source.display(),
                        dataset = %report.dataset,
                        documents = report.analysis.documents.len(),
                        clusters = report.analysis.cluster_count(),
                        elapsed_secs = elapsed.as_secs_f64(),
                        "File complete"
                    );
                    FileOutcome::Succeeded(FileSummary {
                        source,
                        dataset: report.dataset,
                        documents: report.analysis.documents.len(),
                        clusters: report.analysis.cluster_count(),
                        lexicon: report.analysis.lexicon,
                        warnings: report.analysis.warnings,
                        elapsed,
                    })
                }
                Err(error) => {
                    warn!(
                        file = %source.display(),
                        error = %error,
                        elapsed_secs = elapsed.as_secs_f64(),
                        "File failed, continuing with the rest"
                    );
                    FileOutcome::Failed {
                        source,
                        error,
                        elapsed,
                    }
                }
            };
            outcomes.push(outcome);
            pb.inc(1);
        }
    });
    pb.finish_and_clear();

    outcomes.sort_by(|a, b| a.source().cmp(b.source()));
    let summary = BatchSummary {
        outcomes,
        elapsed: started.elapsed(),
    };
    info!(
        files = files.len(),
        succeeded = summary.outcomes.len() - summary.failed_count(),
        failed = summary.failed_count(),
        elapsed_secs = summary.elapsed.as_secs_f64(),
        "Batch complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::run::Analysis;

    #[test]
    fn test_discover_files_sorted_tsv_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.tsv", "a.TSV", "notes.txt"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.tsv")).unwrap();
        let files = discover_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.TSV", "b.tsv"]);
    }

    #[test]
    fn test_missing_file_fails_without_stopping_batch() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![dir.path().join("missing.tsv")];
        let summary = run_batch(&files, &PipelineParams::default(), None, 1, |_| Ok(())).unwrap();
        assert_eq!(summary.outcomes.len(), 1);
        assert!(!summary.any_succeeded());
        assert!(summary.combined().is_empty());
    }

    #[test]
    fn test_panicking_file_fails_alone() {
        let files = vec![PathBuf::from("a.tsv"), PathBuf::from("b.tsv")];
        let mut persisted = Vec::new();
        let summary = run_files(
            &files,
            2,
            false,
            |path| {
                if path == Path::new("a.tsv") {
                    panic!("segmenter gave up");
                }
                Ok(FileReport {
                    source: path.to_path_buf(),
                    dataset: "Books".to_string(),
                    skipped_rows: 0,
                    analysis: Analysis {
                        documents: Vec::new(),
                        lexicon: Vec::new(),
                        samples: Vec::new(),
                        warnings: Vec::new(),
                    },
                    elapsed: Duration::ZERO,
                })
            },
            |report| {
                persisted.push(report.source.clone());
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(summary.outcomes.len(), 2);
        match &summary.outcomes[0] {
            FileOutcome::Failed {
                error: PipelineError::Panicked(msg),
                ..
            } => assert!(msg.contains("segmenter gave up")),
            other => panic!("expected a caught panic, got {other:?}"),
        }
        assert!(summary.outcomes[1].is_success());
        assert_eq!(persisted, vec![PathBuf::from("b.tsv")]);
    }
}
