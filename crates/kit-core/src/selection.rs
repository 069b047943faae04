//! Choosing which push candidates to consider.
//!
//! The core never talks to a terminal. A [`SelectionProvider`] turns the
//! candidate list into a [`SelectionSet`]; the CLI supplies an interactive
//! implementation, the core supplies pattern-driven ones.

use std::collections::BTreeSet;
use std::path::Path;

use git2::{Repository, Status, StatusOptions};
use kit_fs::relative_key;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::patterns::PathPatterns;
use crate::planner::PushCandidate;
use crate::Result;

/// Which paths a push should consider.
///
/// With no `paths` and no `include`, every candidate is selected. Otherwise a
/// path must match one of them. `exclude` always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    pub paths: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Further narrow to files git reports as changed in the destination
    pub use_git_detection: bool,
}

impl SelectionSet {
    pub fn all() -> Self {
        Self::default()
    }
}

/// Turns push candidates into a selection.
pub trait SelectionProvider {
    fn select(&self, candidates: &[PushCandidate]) -> Result<SelectionSet>;
}

/// Selects every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllSelection;

impl SelectionProvider for AllSelection {
    fn select(&self, _candidates: &[PushCandidate]) -> Result<SelectionSet> {
        Ok(SelectionSet::all())
    }
}

/// A fixed selection, typically built from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct PatternSelection {
    set: SelectionSet,
}

impl PatternSelection {
    pub fn new(set: SelectionSet) -> Self {
        Self { set }
    }
}

impl SelectionProvider for PatternSelection {
    fn select(&self, _candidates: &[PushCandidate]) -> Result<SelectionSet> {
        Ok(self.set.clone())
    }
}

/// A compiled [`SelectionSet`], ready for the planner.
#[derive(Debug, Clone, Default)]
pub struct SelectionFilter {
    wanted: PathPatterns,
    exclude: PathPatterns,
    changed: Option<BTreeSet<String>>,
    warnings: Vec<String>,
}

impl SelectionFilter {
    /// Accept everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Compile a selection. `changed` is the git-detected change set, if any.
    pub fn compile(set: &SelectionSet, changed: Option<BTreeSet<String>>) -> Result<Self> {
        Ok(Self {
            wanted: PathPatterns::new(set.paths.iter().chain(set.include.iter()))?,
            exclude: PathPatterns::new(&set.exclude)?,
            changed,
            warnings: Vec::new(),
        })
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn accepts(&self, key: &str) -> bool {
        if self.exclude.matches(key) {
            return false;
        }
        if !self.wanted.is_empty() && !self.wanted.matches(key) {
            return false;
        }
        match &self.changed {
            Some(changed) => changed.contains(key),
            None => true,
        }
    }
}

/// Files git reports as new, modified, deleted or renamed below `root`.
///
/// Returns `None` when `root` is not inside a git work tree.
pub fn git_changed_paths(root: &Path) -> Result<Option<BTreeSet<String>>> {
    let repo = match Repository::discover(root) {
        Ok(repo) => repo,
        Err(e) if e.code() == git2::ErrorCode::NotFound => {
            debug!(root = %root.display(), "Not inside a git repository");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let Some(workdir) = repo.workdir() else {
        return Ok(None);
    };
    let workdir = dunce::canonicalize(workdir)?;
    let root = dunce::canonicalize(root)?;

    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo.statuses(Some(&mut options))?;

    let interesting = Status::WT_NEW
        | Status::WT_MODIFIED
        | Status::WT_DELETED
        | Status::WT_RENAMED
        | Status::WT_TYPECHANGE
        | Status::INDEX_NEW
        | Status::INDEX_MODIFIED
        | Status::INDEX_DELETED
        | Status::INDEX_RENAMED
        | Status::INDEX_TYPECHANGE;

    let mut changed = BTreeSet::new();
    for entry in statuses.iter() {
        if !entry.status().intersects(interesting) {
            continue;
        }
        let Some(path) = entry.path() else {
            warn!("Skipping git status entry with non-UTF-8 path");
            continue;
        };
        if let Some(key) = relative_key(&root, &workdir.join(path)) {
            changed.insert(key);
        }
    }
    debug!(count = changed.len(), "Git change detection");
    Ok(Some(changed))
}

/// Compile `set`, resolving git detection against `root` when requested.
///
/// Outside a git repository git detection adds a warning and does not narrow.
pub fn resolve_selection(set: &SelectionSet, root: &Path) -> Result<SelectionFilter> {
    if !set.use_git_detection {
        return SelectionFilter::compile(set, None);
    }
    match git_changed_paths(root)? {
        Some(changed) => SelectionFilter::compile(set, Some(changed)),
        None => Ok(SelectionFilter::compile(set, None)?.with_warning(format!(
            "Git detection requested but {} is not in a git repository; selecting without it",
            root.display()
        ))),
    }
}
