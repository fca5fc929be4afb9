use crate::error::{AppError, Result};
use log;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const DEFAULT_OUTPUT_FILENAME: &str = "woven_context.txt";

const BANNER: &str = "--- Context woven by ContextWeaver ---";

/// One export job: files are woven in the order given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaveRequest {
    pub project_root: PathBuf,
    pub files: Vec<PathBuf>,
    pub destination: PathBuf,
}

impl WeaveRequest {
    pub fn new(project_root: PathBuf, files: Vec<PathBuf>, destination: PathBuf) -> Self {
        Self {
            project_root,
            files,
            destination,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_root.as_os_str().is_empty() {
            return Err(AppError::Validation(
                "No project directory selected.".to_string(),
            ));
        }
        if self.files.is_empty() {
            return Err(AppError::Validation("No files are selected.".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaveStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeaveResult {
    pub status: WeaveStatus,
    pub requested: usize,
    pub processed: usize,
    pub read_ok: usize,
    pub read_errors: usize,
    pub bytes_written: usize,
    pub destination: PathBuf,
}

/// Cooperative cancellation flag shared between the caller and a weave job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Weaves the requested files and writes the artifact in one write.
///
/// Unreadable files are recorded inline and counted. Cancellation is checked
/// before each file; what was woven so far is still written. `on_progress`
/// receives `(processed, total)` after every file.
pub fn weave<F>(
    request: &WeaveRequest,
    cancel: &CancelToken,
    mut on_progress: F,
) -> Result<WeaveResult>
where
    F: FnMut(usize, usize),
{
    request.validate()?;
    let total = request.files.len();
    log::info!(
        "Weaving {} files from {} into {}",
        total,
        request.project_root.display(),
        request.destination.display()
    );

    let mut output = preamble(&request.project_root, total);
    let mut status = WeaveStatus::Completed;
    let mut processed = 0;
    let mut read_errors = 0;

    for path in &request.files {
        if cancel.is_cancelled() {
            log::info!("Weave cancelled after {} of {} files.", processed, total);
            status = WeaveStatus::Cancelled;
            break;
        }
        let relative = relative_display_path(path, &request.project_root);
        match fs::read_to_string(path) {
            Ok(content) => push_section(&mut output, &relative, &content),
            Err(e) => {
                log::warn!("Could not read {}: {}", path.display(), e);
                read_errors += 1;
                push_section(
                    &mut output,
                    &relative,
                    &format!("!!! ERROR READING FILE: {} !!!", e),
                );
            }
        }
        processed += 1;
        on_progress(processed, total);
    }

    fs::write(&request.destination, &output).map_err(|e| AppError::FileWrite {
        path: request.destination.clone(),
        source: e,
    })?;
    log::info!(
        "Wrote {} bytes to {} ({} read errors).",
        output.len(),
        request.destination.display(),
        read_errors
    );

    Ok(WeaveResult {
        status,
        requested: total,
        processed,
        read_ok: processed - read_errors,
        read_errors,
        bytes_written: output.len(),
        destination: request.destination.clone(),
    })
}

fn preamble(project_root: &Path, file_count: usize) -> String {
    let project_name = project_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| project_root.display().to_string());
    format!(
        "/*\n{}\n\nProject: {}\nFiles included: {}\n*/\n\n\n",
        BANNER, project_name, file_count
    )
}

fn push_section(output: &mut String, relative: &str, body: &str) {
    let _ = write!(
        output,
        "--- START OF FILE: {relative} ---\n\n{body}\n\n--- END OF FILE: {relative} ---\n\n\n"
    );
}

/// Path relative to the project root with forward slashes.
pub fn relative_display_path(path: &Path, project_root: &Path) -> String {
    pathdiff::diff_paths(path, project_root)
        .unwrap_or_else(|| path.to_path_buf())
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rejects_empty_selection() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.txt");
        let request = WeaveRequest::new(dir.path().to_path_buf(), Vec::new(), dest.clone());
        let err = weave(&request, &CancelToken::new(), |_, _| {}).unwrap_err();
        assert!(err.is_validation());
        assert!(!dest.exists());
    }

    #[test]
    fn validation_rejects_missing_root() {
        let request = WeaveRequest::new(PathBuf::new(), vec![PathBuf::from("a")], "out".into());
        assert!(request.validate().unwrap_err().is_validation());
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = Path::new("/work/proj");
        assert_eq!(
            relative_display_path(&root.join("src").join("b.py"), root),
            "src/b.py"
        );
    }

    #[test]
    fn result_serializes_with_snake_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        let request = WeaveRequest::new(
            dir.path().to_path_buf(),
            vec![dir.path().join("a.txt")],
            dir.path().join("out.txt"),
        );
        let result = weave(&request, &CancelToken::new(), |_, _| {}).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["read_ok"], 1);
        assert_eq!(json["read_errors"], 0);
        assert!(json.get("bytes_written").is_some());
    }

    #[test]
    fn reports_progress_per_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        let request = WeaveRequest::new(
            dir.path().to_path_buf(),
            vec![dir.path().join("a.txt"), dir.path().join("b.txt")],
            dir.path().join("out.txt"),
        );
        let mut seen = Vec::new();
        weave(&request, &CancelToken::new(), |done, total| seen.push((done, total))).unwrap();
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn cancelled_job_writes_what_it_has() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("b.txt"), "beta").unwrap();
        let request = WeaveRequest::new(
            dir.path().to_path_buf(),
            vec![dir.path().join("a.txt"), dir.path().join("b.txt")],
            dir.path().join("out.txt"),
        );
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let result = weave(&request, &cancel, move |_, _| token.cancel()).unwrap();

        assert_eq!(result.status, WeaveStatus::Cancelled);
        assert_eq!(result.processed, 1);
        let written = fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert!(written.contains("--- START OF FILE: a.txt ---"));
        assert!(!written.contains("b.txt"));
    }

    #[test]
    fn unwritable_destination_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        let request = WeaveRequest::new(
            dir.path().to_path_buf(),
            vec![dir.path().join("a.txt")],
            dir.path().join("missing-dir").join("out.txt"),
        );
        let err = weave(&request, &CancelToken::new(), |_, _| {}).unwrap_err();
        assert!(matches!(err, AppError::FileWrite { .. }));
    }
}
