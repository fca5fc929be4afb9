//! Engine facade for an interactive shell.
//!
//! A [`Session`] owns the master tree and the remembered selection. Directory
//! scans and weaves run on one-shot worker threads; each worker reports a
//! single outcome back to the session, and the outcome is applied only when
//! the owning thread calls [`Session::process_pending`] or
//! [`Session::wait_for_job`]. That call is the publish point: a finished scan
//! installs the new tree and its restored selection in one step.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::gather::{self, TreeNode};
use crate::rules::presets::Preset;
use crate::rules::{ExclusionRules, FilterMode};
use crate::selection::{SelectionSnapshot, SelectionSummary};
use crate::view;
use crate::weave::{self, CancelToken, WeaveRequest, WeaveResult};
use log;
use std::any::Any;
use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

/// Notifications for the shell, delivered in order on the event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Loading { root: PathBuf },
    TreeReady { root: PathBuf, files: usize },
    LoadFailed { message: String },
    SelectionChanged(SelectionSummary),
    WeaveProgress { processed: usize, total: usize },
    WeaveFinished(WeaveResult),
    WeaveFailed { message: String },
}

enum JobOutcome {
    Loaded {
        generation: u64,
        result: Result<TreeNode>,
    },
    Woven {
        result: Result<WeaveResult>,
    },
}

pub struct Session {
    rules: Arc<ExclusionRules>,
    mode: FilterMode,
    flatten: bool,
    root: Option<PathBuf>,
    master: Option<TreeNode>,
    remembered: SelectionSnapshot,
    generation: u64,
    loading: bool,
    weave_cancel: Option<CancelToken>,
    in_flight: usize,
    jobs_tx: Sender<JobOutcome>,
    jobs_rx: Receiver<JobOutcome>,
    events_tx: Sender<SessionEvent>,
}

impl Session {
    pub fn new(rules: ExclusionRules, mode: FilterMode) -> (Self, Receiver<SessionEvent>) {
        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (events_tx, events_rx) = mpsc::channel();
        let session = Self {
            rules: Arc::new(rules),
            mode,
            flatten: false,
            root: None,
            master: None,
            remembered: SelectionSnapshot::default(),
            generation: 0,
            loading: false,
            weave_cancel: None,
            in_flight: 0,
            jobs_tx,
            jobs_rx,
            events_tx,
        };
        (session, events_rx)
    }

    pub fn from_config(config: &Config) -> (Self, Receiver<SessionEvent>) {
        let (mut session, events) = Self::new(config.exclusion_rules(), config.general.filter_mode);
        session.flatten = config.general.flat_view;
        (session, events)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.mode
    }

    pub fn is_flat_view(&self) -> bool {
        self.flatten
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_weaving(&self) -> bool {
        self.weave_cancel.is_some()
    }

    pub fn master(&self) -> Option<&TreeNode> {
        self.master.as_ref()
    }

    /// The node to render under the current display mode.
    pub fn view(&self) -> Option<Cow<'_, TreeNode>> {
        self.master
            .as_ref()
            .map(|master| view::project(master, self.flatten))
    }

    /// Starts scanning `path`. A different root forgets the old selection;
    /// the same root keeps it and restores it on the new tree.
    pub fn select_root(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        let root = path.canonicalize().unwrap_or(path);
        if self.root.as_deref() != Some(root.as_path()) {
            log::debug!("Switching project root to {}", root.display());
            self.remembered.clear();
            self.master = None;
            self.root = Some(root);
        } else if let Some(master) = &self.master {
            self.remembered = master.snapshot();
        }
        self.reload();
    }

    /// Changes the filter mode and rebuilds the current root, if any.
    pub fn set_filter_mode(&mut self, mode: FilterMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        if let Some(root) = self.root.clone() {
            self.select_root(root);
        }
    }

    pub fn set_flat_view(&mut self, flatten: bool) {
        self.flatten = flatten;
    }

    /// Returns false when the path is not a file of the current tree.
    pub fn set_file_selected(&mut self, path: &Path, selected: bool) -> bool {
        let Some(master) = &self.master else {
            return false;
        };
        let changed = master.set_file_selected(path, selected);
        if changed {
            self.selection_changed();
        }
        changed
    }

    pub fn apply_preset(&mut self, preset: &Preset) -> usize {
        let Some(master) = &self.master else {
            return 0;
        };
        let count = master.select_by_preset(preset);
        self.selection_changed();
        count
    }

    pub fn clear_selection(&mut self) {
        if let Some(master) = &self.master {
            master.clear_selection();
            self.selection_changed();
        }
    }

    pub fn selection_summary(&self) -> SelectionSummary {
        self.master
            .as_ref()
            .map(TreeNode::selection_summary)
            .unwrap_or_default()
    }

    /// Validates and starts a weave of the current selection.
    ///
    /// Fails without spawning anything when no root or tree is available,
    /// nothing is selected, or another weave is still running.
    pub fn start_weave(&mut self, destination: impl Into<PathBuf>) -> Result<()> {
        if self.is_weaving() {
            return Err(AppError::Validation(
                "A weave is already in progress.".to_string(),
            ));
        }
        if self.root.is_none() {
            return Err(AppError::Validation(
                "Select a project directory first.".to_string(),
            ));
        }
        let destination = destination.into();
        self.exclude_destination(&destination);
        let Some(master) = &self.master else {
            return Err(AppError::Validation(
                "The project tree has not finished loading.".to_string(),
            ));
        };

        let request = WeaveRequest::new(
            master.path().to_path_buf(),
            master.selected_paths(),
            destination,
        );
        request.validate()?;

        let cancel = CancelToken::new();
        self.weave_cancel = Some(cancel.clone());
        self.in_flight += 1;

        let jobs_tx = self.jobs_tx.clone();
        let events_tx = self.events_tx.clone();
        thread::spawn(move || {
            let result = run_guarded(|| {
                weave::weave(&request, &cancel, |processed, total| {
                    let _ = events_tx.send(SessionEvent::WeaveProgress { processed, total });
                })
            });
            let _ = jobs_tx.send(JobOutcome::Woven { result });
        });
        Ok(())
    }

    pub fn cancel_weave(&self) {
        if let Some(cancel) = &self.weave_cancel {
            log::debug!("Cancellation requested for running weave.");
            cancel.cancel();
        }
    }

    /// Applies every outcome that has already arrived. Never blocks.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.jobs_rx.try_recv() {
            self.apply(outcome);
            applied += 1;
        }
        applied
    }

    /// Blocks until one background job reports back. Returns false when no
    /// job is running.
    pub fn wait_for_job(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.jobs_rx.recv() {
            Ok(outcome) => {
                self.apply(outcome);
                true
            }
            Err(_) => false,
        }
    }

    /// Blocks until the current scan and weave, if any, have finished.
    pub fn wait_idle(&mut self) {
        while (self.loading || self.is_weaving()) && self.wait_for_job() {}
    }

    fn reload(&mut self) {
        let Some(root) = self.root.clone() else {
            return;
        };
        self.generation += 1;
        self.loading = true;
        self.in_flight += 1;
        let generation = self.generation;
        let mode = self.mode;
        let rules = Arc::clone(&self.rules);
        let jobs_tx = self.jobs_tx.clone();
        log::info!("Loading {} (generation {})", root.display(), generation);
        self.emit(SessionEvent::Loading { root: root.clone() });

        thread::spawn(move || {
            let result = run_guarded(|| gather::build_tree(&root, mode, &rules));
            let _ = jobs_tx.send(JobOutcome::Loaded { generation, result });
        });
    }

    fn apply(&mut self, outcome: JobOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match outcome {
            JobOutcome::Loaded { generation, .. } if generation != self.generation => {
                log::debug!(
                    "Discarding superseded scan (generation {}, current {})",
                    generation,
                    self.generation
                );
            }
            JobOutcome::Loaded { result, .. } => {
                self.loading = false;
                match result {
                    Ok(tree) => {
                        let restored = tree.restore(&self.remembered);
                        log::debug!("Restored {} selections on new tree.", restored);
                        let root = tree.path().to_path_buf();
                        let files = tree.files().count();
                        self.master = Some(tree);
                        self.emit(SessionEvent::TreeReady { root, files });
                        self.selection_changed();
                    }
                    Err(e) => {
                        log::error!("Scan failed: {}", e);
                        self.emit(SessionEvent::LoadFailed {
                            message: format!("Could not read the directory: {}", e),
                        });
                    }
                }
            }
            JobOutcome::Woven { result } => {
                self.weave_cancel = None;
                match result {
                    Ok(result) => self.emit(SessionEvent::WeaveFinished(result)),
                    Err(e) => {
                        log::error!("Weave failed: {}", e);
                        self.emit(SessionEvent::WeaveFailed {
                            message: format!("Could not generate file: {}", e),
                        });
                    }
                }
            }
        }
    }

    /// A previous artifact inside the project must never be woven into the next one.
    fn exclude_destination(&mut self, destination: &Path) {
        let Some(master) = &self.master else {
            return;
        };
        let key = destination
            .canonicalize()
            .unwrap_or_else(|_| destination.to_path_buf());
        if master.find(&key).is_some_and(|node| node.is_selected()) {
            master.set_file_selected(&key, false);
            log::info!("Deselected the weave destination {}", key.display());
            self.selection_changed();
        }
    }

    fn selection_changed(&mut self) {
        if let Some(master) = &self.master {
            self.remembered = master.snapshot();
            let summary = master.selection_summary();
            self.emit(SessionEvent::SelectionChanged(summary));
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.events_tx.send(event).is_err() {
            log::trace!("Event receiver dropped; event discarded.");
        }
    }
}

fn run_guarded<T>(job: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        Err(AppError::Worker(panic_message(payload.as_ref())))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker thread panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weave_without_root_is_rejected() {
        let (mut session, _events) = Session::new(ExclusionRules::default(), FilterMode::Smart);
        let err = session.start_weave("out.txt").unwrap_err();
        assert!(err.is_validation());
        assert!(!session.is_weaving());
    }

    #[test]
    fn selection_calls_before_load_are_harmless() {
        let (mut session, _events) = Session::new(ExclusionRules::default(), FilterMode::Smart);
        assert!(!session.set_file_selected(Path::new("/nowhere/a.rs"), true));
        session.clear_selection();
        assert_eq!(session.selection_summary(), SelectionSummary::default());
        assert!(!session.wait_for_job());
    }

    #[test]
    fn panics_in_jobs_become_errors() {
        let result: Result<()> = run_guarded(|| panic!("boom"));
        assert!(matches!(result, Err(AppError::Worker(msg)) if msg == "boom"));
    }
}
