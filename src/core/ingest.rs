//! Concurrent, order-preserving reads of a resolved file batch.

use super::{CoreError, CoreResult, IngestProgress};
use crate::utils::file_detection::decode_text;
use chrono::{DateTime, Local};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Files above this size are reported instead of read.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024; // 20MB

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestErrorKind {
    NotFound,
    PermissionDenied,
    /// Binary or non-UTF-8 content.
    Encoding,
    TooLarge,
    Io,
}

/// Why a single file of a batch could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct IngestError {
    pub kind: IngestErrorKind,
    pub message: String,
}

impl IngestError {
    fn new(kind: IngestErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn from_io(e: &io::Error) -> Self {
        let kind = match e.kind() {
            io::ErrorKind::NotFound => IngestErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => IngestErrorKind::PermissionDenied,
            io::ErrorKind::InvalidData => IngestErrorKind::Encoding,
            _ => IngestErrorKind::Io,
        };
        Self::new(kind, e.to_string())
    }
}

/// The outcome of reading one file. Never changes after it is produced.
#[derive(Debug, Clone)]
pub struct IngestResult {
    path: PathBuf,
    outcome: Result<String, IngestError>,
    size_bytes: Option<u64>,
    modified: Option<DateTime<Local>>,
}

impl IngestResult {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&IngestError> {
        self.outcome.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size_bytes
    }

    pub fn modified(&self) -> Option<DateTime<Local>> {
        self.modified
    }

    /// Builds a result from already known parts (e.g. for rendering previews).
    pub fn from_parts(
        path: PathBuf,
        outcome: Result<String, IngestError>,
        size_bytes: Option<u64>,
        modified: Option<DateTime<Local>>,
    ) -> Self {
        Self {
            path,
            outcome,
            size_bytes,
            modified,
        }
    }
}

/// Clamps a requested worker count to `[1, available]`.
pub fn clamp_workers(requested: usize, available: usize) -> usize {
    requested.clamp(1, available.max(1))
}

/// Reads a batch of files on a bounded worker pool.
///
/// Results come back in input order regardless of which read finishes
/// first, and a failing file never aborts its siblings.
#[derive(Debug, Clone, Copy)]
pub struct ParallelIngestor {
    max_workers: usize,
    max_file_size: u64,
}

impl ParallelIngestor {
    pub fn new(max_workers: usize) -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            max_workers: clamp_workers(max_workers, available),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn ingest(&self, paths: &[PathBuf]) -> CoreResult<Vec<IngestResult>> {
        let never_cancelled = AtomicBool::new(false);
        self.ingest_with_progress(paths, &never_cancelled, |_| {})
    }

    /// Reads `paths`, reporting each finished file to `progress`.
    ///
    /// Setting `cancel_flag` stops dispatching new reads. If any file was
    /// skipped the batch returns [`CoreError::Cancelled`] and the finished
    /// results are dropped.
    pub fn ingest_with_progress<F>(
        &self,
        paths: &[PathBuf],
        cancel_flag: &AtomicBool,
        progress: F,
    ) -> CoreResult<Vec<IngestResult>>
    where
        F: Fn(IngestProgress) + Send + Sync,
    {
        let total = paths.len();
        tracing::info!(
            "Reading {} files with {} workers",
            total,
            self.max_workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .thread_name(|i| format!("ingest-{i}"))
            .build()?;

        let processed = AtomicUsize::new(0);

        // The indexed collect places every result in the slot of its input,
        // whatever order the workers finish in.
        let slots: Vec<Option<IngestResult>> = pool.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    if cancel_flag.load(Ordering::Relaxed) {
                        return None;
                    }
                    let result = self.read_one(path);
                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    progress(IngestProgress {
                        current_file: path.clone(),
                        processed: done,
                        total,
                    });
                    Some(result)
                })
                .collect()
        });

        // A cancel that lands after the last read has no skipped slot and
        // leaves the batch complete.
        if slots.iter().any(Option::is_none) {
            tracing::info!(
                "Ingestion cancelled after {} of {} files",
                processed.load(Ordering::Relaxed),
                total
            );
            return Err(CoreError::Cancelled);
        }

        let results: Vec<IngestResult> = slots.into_iter().flatten().collect();
        let failed = results.iter().filter(|r| !r.is_ok()).count();
        tracing::info!("Read {} files ({} failed)", results.len(), failed);
        Ok(results)
    }

    /// Runs [`ingest_with_progress`](Self::ingest_with_progress) on tokio's
    /// blocking pool.
    pub async fn ingest_async<F>(
        &self,
        paths: Vec<PathBuf>,
        cancel_flag: Arc<AtomicBool>,
        progress: F,
    ) -> CoreResult<Vec<IngestResult>>
    where
        F: Fn(IngestProgress) + Send + Sync + 'static,
    {
        let ingestor = *self;
        tokio::task::spawn_blocking(move || {
            ingestor.ingest_with_progress(&paths, &cancel_flag, progress)
        })
        .await?
    }

    /// Reads one file to completion. Partial buffers never leave this function.
    fn read_one(&self, path: &Path) -> IngestResult {
        let result = match fs::metadata(path) {
            Err(e) => IngestResult::from_parts(path.to_path_buf(), Err(IngestError::from_io(&e)), None, None),
            Ok(metadata) => {
                let size = metadata.len();
                let modified = metadata.modified().ok().map(DateTime::<Local>::from);
                let outcome = if !metadata.is_file() {
                    Err(IngestError::new(IngestErrorKind::Io, "not a regular file"))
                } else if size > self.max_file_size {
                    Err(IngestError::new(
                        IngestErrorKind::TooLarge,
                        format!("file too large: {} bytes (limit {})", size, self.max_file_size),
                    ))
                } else {
                    match fs::read(path) {
                        Ok(bytes) => decode_text(bytes)
                            .map_err(|msg| IngestError::new(IngestErrorKind::Encoding, msg)),
                        Err(e) => Err(IngestError::from_io(&e)),
                    }
                };
                IngestResult::from_parts(path.to_path_buf(), outcome, Some(size), modified)
            }
        };

        if let Some(e) = result.error() {
            tracing::warn!("Failed to read file {}: {}", path.display(), e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::{Condvar, Mutex};
    use std::time::Duration;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    #[test]
    fn clamps_worker_count() {
        assert_eq!(clamp_workers(0, 8), 1);
        assert_eq!(clamp_workers(3, 8), 3);
        assert_eq!(clamp_workers(64, 8), 8);
        assert_eq!(clamp_workers(4, 0), 1);
        assert!(ParallelIngestor::new(usize::MAX).max_workers() >= 1);
    }

    #[test]
    fn keeps_input_order_when_a_later_file_finishes_first() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let c = dir.path().join("c.txt");
        for (path, content) in [(&a, "alpha"), (&b, "b"), (&c, "gamma")] {
            fs::write(path, content).unwrap();
        }

        let ingestor = ParallelIngestor::new(3);
        if ingestor.max_workers() < 2 {
            return;
        }

        // a and c may only report once b has finished.
        let finished = Mutex::new(Vec::<PathBuf>::new());
        let b_done = Condvar::new();
        let results = ingestor
            .ingest_with_progress(
                &[a.clone(), b.clone(), c.clone()],
                &AtomicBool::new(false),
                |p| {
                    let mut done = finished.lock().unwrap();
                    if p.current_file != b {
                        done = b_done
                            .wait_timeout_while(done, Duration::from_secs(10), |d| !d.contains(&b))
                            .unwrap()
                            .0;
                    }
                    done.push(p.current_file);
                    b_done.notify_all();
                },
            )
            .unwrap();

        assert_eq!(finished.into_inner().unwrap()[0], b);
        let order: Vec<&Path> = results.iter().map(|r| r.path()).collect();
        assert_eq!(order, vec![a.as_path(), b.as_path(), c.as_path()]);
        assert_eq!(results[1].content(), Some("b"));
        assert_eq!(results[0].size_bytes(), Some(5));
        assert!(results[0].modified().is_some());
    }

    #[test]
    fn failures_stay_local_to_their_file() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.rs");
        let missing = dir.path().join("missing.rs");
        let binary = dir.path().join("blob.bin");
        let latin1 = dir.path().join("latin1.txt");
        fs::write(&good, "fn main() {}").unwrap();
        fs::write(&binary, [0u8, 159, 146, 150]).unwrap();
        fs::write(&latin1, [0x63, 0x61, 0x66, 0xe9]).unwrap();

        let results = ParallelIngestor::new(2)
            .ingest(&[missing.clone(), good.clone(), binary, latin1])
            .unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].error().unwrap().kind, IngestErrorKind::NotFound);
        assert_eq!(results[0].size_bytes(), None);
        assert_eq!(results[1].content(), Some("fn main() {}"));
        assert_eq!(results[2].error().unwrap().kind, IngestErrorKind::Encoding);
        assert_eq!(results[3].error().unwrap().kind, IngestErrorKind::Encoding);
    }

    #[test]
    fn oversized_files_are_reported_not_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("large.log");
        fs::write(&path, "0123456789").unwrap();

        let results = ParallelIngestor::new(1)
            .with_max_file_size(4)
            .ingest(&[path])
            .unwrap();

        assert_eq!(results[0].error().unwrap().kind, IngestErrorKind::TooLarge);
        assert_eq!(results[0].size_bytes(), Some(10));
    }

    #[test]
    fn cancelled_batch_returns_cancelled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "a").unwrap();
        let cancel = AtomicBool::new(true);

        let result = ParallelIngestor::new(2).ingest_with_progress(&[path], &cancel, |_| {});

        assert!(matches!(result, Err(CoreError::Cancelled)));
    }

    #[test]
    #[traced_test]
    fn cancel_after_the_last_read_keeps_the_batch() {
        let dir = tempdir().unwrap();
        let paths: Vec<PathBuf> = ["a.txt", "b.txt"]
            .iter()
            .map(|name| {
                let p = dir.path().join(name);
                fs::write(&p, *name).unwrap();
                p
            })
            .collect();
        let cancel = AtomicBool::new(false);

        let results = ParallelIngestor::new(1)
            .ingest_with_progress(&paths, &cancel, |p| {
                if p.processed == p.total {
                    cancel.store(true, Ordering::SeqCst);
                }
            })
            .unwrap();

        assert!(cancel.load(Ordering::SeqCst));
        assert_eq!(results.len(), 2);
        assert!(logs_contain("Read 2 files (0 failed)"));
        assert!(!logs_contain("cancelled"));
    }

    #[test]
    fn reports_progress_for_every_file() {
        let dir = tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..5)
            .map(|i| {
                let p = dir.path().join(format!("{i}.txt"));
                fs::write(&p, i.to_string()).unwrap();
                p
            })
            .collect();
        let seen = Mutex::new(Vec::new());

        ParallelIngestor::new(2)
            .ingest_with_progress(&paths, &AtomicBool::new(false), |p| {
                seen.lock().unwrap().push(p.processed);
            })
            .unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[cfg(unix)]
    #[test]
    fn permission_denied_is_reported() {
        use std::os::unix::fs::PermissionsExt;
        if crate::utils::test_helpers::running_as_root() {
            return;
        }
        let dir = tempdir().unwrap();
        let path = dir.path().join("secret.txt");
        fs::write(&path, "secret").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        let results = ParallelIngestor::new(1).ingest(&[path.clone()]).unwrap();

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        assert_eq!(
            results[0].error().unwrap().kind,
            IngestErrorKind::PermissionDenied
        );
    }

    #[tokio::test]
    async fn async_ingest_runs_on_the_blocking_pool() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "# a").unwrap();

        let results = ParallelIngestor::new(2)
            .ingest_async(vec![path], Arc::new(AtomicBool::new(false)), |_| {})
            .await
            .unwrap();

        assert_eq!(results[0].content(), Some("# a"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn output_order_matches_input_order(
            sizes in prop::collection::vec(0usize..4096, 1..24),
            workers in 1usize..6,
        ) {
            let dir = tempdir().unwrap();
            let paths: Vec<PathBuf> = sizes
                .iter()
                .enumerate()
                .map(|(i, size)| {
                    let p = dir.path().join(format!("f{i}.txt"));
                    fs::write(&p, "y".repeat(*size)).unwrap();
                    p
                })
                .collect();

            let results = ParallelIngestor::new(workers).ingest(&paths).unwrap();

            prop_assert_eq!(results.len(), paths.len());
            for ((result, path), size) in results.iter().zip(&paths).zip(&sizes) {
                prop_assert_eq!(result.path(), path.as_path());
                prop_assert_eq!(result.content().map(str::len), Some(*size));
            }
        }
    }
}
