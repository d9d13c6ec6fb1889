//! Operator actions on the fetched-file selection and the request text.

use rx_core::prompt::build_request_text;
use tracing::debug;

use crate::notice::Notifier;
use crate::state::SharedState;

#[derive(Clone)]
pub struct FileSelection {
    state: SharedState,
    notifier: Notifier,
    important_files: Vec<String>,
}

impl FileSelection {
    pub fn new(state: SharedState, notifier: Notifier, important_files: Vec<String>) -> Self {
        Self {
            state,
            notifier,
            important_files,
        }
    }

    /// Flip one fetched file in or out of the selection. Returns whether it
    /// is selected afterwards.
    pub fn toggle_file(&self, path: &str) -> bool {
        let outcome = self.state.update(|s| {
            if s.file(path).is_none() {
                return None;
            }
            if s.selected_fetcher_files.remove(path) {
                Some(false)
            } else {
                s.selected_fetcher_files.insert(path.to_string());
                Some(true)
            }
        });
        match outcome {
            Some(selected) => selected,
            None => {
                self.notifier
                    .warning(format!("{path} is not among the fetched files."));
                false
            }
        }
    }

    /// Add the primary and every secondary highlight. Returns how many paths
    /// were newly selected.
    pub fn select_highlighted(&self) -> usize {
        let added = self.state.update(|s| {
            let highlighted: Vec<String> = s
                .highlights
                .primary
                .iter()
                .chain(s.highlights.all_secondary())
                .cloned()
                .collect();
            if highlighted.is_empty() {
                return None;
            }
            Some(
                highlighted
                    .into_iter()
                    .filter(|p| s.selected_fetcher_files.insert(p.clone()))
                    .count(),
            )
        });
        self.report(added, "There are no highlighted files to select.", "highlighted")
    }

    /// Add the configured important files present in the tree.
    pub fn add_important_files(&self) -> usize {
        let added = self.state.update(|s| {
            let present: Vec<String> = self
                .important_files
                .iter()
                .filter(|p| s.file(p).is_some())
                .cloned()
                .collect();
            if present.is_empty() {
                return None;
            }
            Some(
                present
                    .into_iter()
                    .filter(|p| s.selected_fetcher_files.insert(p.clone()))
                    .count(),
            )
        });
        self.report(added, "None of the important files are in this repository.", "important")
    }

    pub fn select_all(&self) -> usize {
        let added = self.state.update(|s| {
            if s.files.is_empty() {
                return None;
            }
            let before = s.selected_fetcher_files.len();
            let paths: Vec<String> = s.files.iter().map(|f| f.path.clone()).collect();
            s.selected_fetcher_files.extend(paths);
            Some(s.selected_fetcher_files.len() - before)
        });
        self.report(added, "No files have been fetched yet.", "more")
    }

    /// Returns how many paths were deselected.
    pub fn deselect_all(&self) -> usize {
        let removed = self.state.update(|s| {
            let n = s.selected_fetcher_files.len();
            s.selected_fetcher_files.clear();
            n
        });
        if removed == 0 {
            self.notifier.warning("No files are selected.");
        }
        removed
    }

    /// Rebuild the request text from the task text and the selected files.
    /// Returns the number of files embedded.
    pub fn add_selected_to_request(&self) -> usize {
        let embedded = self.state.update(|s| {
            let files: Vec<_> = s
                .files
                .iter()
                .filter(|f| s.selected_fetcher_files.contains(&f.path))
                .collect();
            if files.is_empty() {
                return 0;
            }
            let n = files.len();
            let text = build_request_text(&s.request_text, files);
            s.set_request_text(text);
            n
        });
        if embedded == 0 {
            self.notifier.warning("Select at least one file first.");
        } else {
            debug!(files = embedded, "request text rebuilt");
            self.notifier
                .success(format!("Added {embedded} files to the request."));
        }
        embedded
    }

    fn report(&self, added: Option<usize>, empty_message: &str, what: &str) -> usize {
        match added {
            None => {
                self.notifier.warning(empty_message);
                0
            }
            Some(0) => {
                self.notifier
                    .info(format!("All {what} files were already selected."));
                0
            }
            Some(n) => {
                self.notifier.info(format!("Selected {n} {what} files."));
                n
            }
        }
    }
}
