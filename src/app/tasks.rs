//! The background combine task: read the snapshot, render, write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use tempfile::NamedTempFile;

use super::events::{CombineReport, SessionEvent};
use super::helpers::{lock_state, notify};
use super::proxy::EventProxy;
use super::state::AppState;
use crate::core::{
    CoreError, CoreResult, Formatter, IngestProgress, OutputFormat, ParallelIngestor,
};

/// Everything a combine needs, captured under the lock when it starts.
///
/// Later edits to the tree or the extension registry do not reach a batch
/// that is already running.
#[derive(Debug, Clone)]
pub struct CombineJob {
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub include_tree: bool,
    pub create_backup: bool,
    pub ingestor: ParallelIngestor,
}

impl CombineJob {
    /// Reads, renders and writes the batch.
    pub async fn run<F>(self, cancel_flag: Arc<AtomicBool>, progress: F) -> CoreResult<CombineReport>
    where
        F: Fn(IngestProgress) + Send + Sync + 'static,
    {
        let results = self
            .ingestor
            .ingest_async(self.files, cancel_flag, progress)
            .await?;

        let document = Formatter::new(self.format, &self.root)
            .with_tree(self.include_tree)
            .render(&results);

        let output = self.output;
        let bytes = document.len();
        let written = output.clone();
        let create_backup = self.create_backup;
        tokio::task::spawn_blocking(move || write_output(&written, &document, create_backup))
            .await??;

        Ok(CombineReport {
            output,
            files: results.len(),
            failed: results.iter().filter(|r| !r.is_ok()).count(),
            bytes,
        })
    }
}

/// `combined.txt` becomes `combined.txt.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

/// Writes `contents` to `path` through a temporary file in the same
/// directory, so readers never observe a half-written document.
///
/// With `create_backup`, an existing file at `path` is first copied to
/// [`backup_path`].
pub fn write_output(path: &Path, contents: &str, create_backup: bool) -> CoreResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if create_backup && path.is_file() {
        let backup = backup_path(path);
        fs::copy(path, &backup).map_err(|e| CoreError::Io(e, backup.clone()))?;
        tracing::info!("Backed up previous output to {}", backup.display());
    }

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CoreError::Io(e, path.to_path_buf()))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|_| tmp.flush())
        .map_err(|e| CoreError::Io(e, path.to_path_buf()))?;
    tmp.persist(path)
        .map_err(|e| CoreError::Io(e.error, path.to_path_buf()))?;

    tracing::info!("Wrote combined output to {}", path.display());
    Ok(())
}

/// Runs a combine and reports its outcome.
///
/// The state is only touched if this batch is still the current one; a
/// batch that was replaced by a newer one finishes silently.
pub async fn combine_task<P: EventProxy>(
    proxy: P,
    state: Arc<Mutex<AppState>>,
    job: CombineJob,
    cancel_flag: Arc<AtomicBool>,
) {
    tracing::info!("TASK:: combine started with {} files", job.files.len());

    let progress_proxy = proxy.clone();
    let outcome = job
        .run(cancel_flag.clone(), move |progress| {
            progress_proxy.send_event(SessionEvent::Progress(progress));
        })
        .await;

    let mut state_guard = lock_state(&state);
    if !Arc::ptr_eq(&state_guard.generation_cancellation_flag, &cancel_flag) {
        tracing::info!("TASK:: combine was superseded, discarding its outcome");
        return;
    }

    state_guard.is_generating = false;
    state_guard.generation_task = None;

    match outcome {
        Ok(report) => {
            tracing::info!(
                "Combined {} files ({} failed) into {}",
                report.files,
                report.failed,
                report.output.display()
            );
            proxy.send_event(SessionEvent::CombineComplete(report));
        }
        Err(CoreError::Cancelled) => proxy.send_event(SessionEvent::CombineCancelled),
        Err(e) => {
            tracing::error!("TASK:: combine failed: {}", e);
            proxy.send_event(SessionEvent::Error(e.to_string()));
        }
    }

    notify(&mut state_guard, &proxy);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    fn job(root: &Path, files: Vec<PathBuf>, output: PathBuf) -> CombineJob {
        CombineJob {
            root: root.to_path_buf(),
            files,
            output,
            format: OutputFormat::Simple,
            include_tree: false,
            create_backup: false,
            ingestor: ParallelIngestor::new(2),
        }
    }

    #[test]
    fn write_output_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.txt");
        fs::write(&out, "old").unwrap();

        write_output(&out, "new", false).unwrap();

        assert_eq!(fs::read_to_string(&out).unwrap(), "new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn write_output_keeps_a_backup_of_the_previous_file() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.txt");

        write_output(&out, "first", true).unwrap();
        assert!(!backup_path(&out).exists());

        write_output(&out, "second", true).unwrap();

        assert_eq!(backup_path(&out), dir.path().join("out.txt.bak"));
        assert_eq!(fs::read_to_string(backup_path(&out)).unwrap(), "first");
        assert_eq!(fs::read_to_string(&out).unwrap(), "second");
    }

    #[test]
    fn write_output_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("missing/out.txt");

        let err = write_output(&out, "x", true).unwrap_err();

        assert!(matches!(err, CoreError::Io(_, p) if p == out));
    }

    #[tokio::test]
    async fn job_reads_renders_and_writes() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        fs::write(&a, "alpha").unwrap();
        let out = dir.path().join("combined.txt");

        let report = job(dir.path(), vec![a, dir.path().join("gone.txt")], out.clone())
            .run(Arc::new(AtomicBool::new(false)), |_| {})
            .await
            .unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(report.failed, 1);
        let written = fs::read_to_string(&out).unwrap();
        assert_eq!(written.len(), report.bytes);
        assert!(written.contains("FILE: a.txt\n"));
        assert!(written.contains("alpha"));
        assert!(written.contains("[Error reading file:"));
    }

    #[tokio::test]
    async fn cancelled_job_writes_nothing() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        fs::write(&a, "alpha").unwrap();
        let out = dir.path().join("combined.txt");
        let flag = Arc::new(AtomicBool::new(false));
        flag.store(true, Ordering::SeqCst);

        let err = job(dir.path(), vec![a], out.clone())
            .run(flag, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Cancelled));
        assert!(!out.exists());
    }
}
