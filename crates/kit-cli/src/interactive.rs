//! Interactive file picking for push

use colored::Colorize;
use dialoguer::MultiSelect;
use kit_core::{CandidateStatus, PushCandidate, Safety, SelectionProvider, SelectionSet};

/// Lets the user tick the candidates to push.
///
/// Dangerous paths and conflicts start unticked.
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractiveSelection {
    pub use_git_detection: bool,
}

impl InteractiveSelection {
    pub fn new(use_git_detection: bool) -> Self {
        Self { use_git_detection }
    }
}

fn label(candidate: &PushCandidate) -> String {
    let status = match candidate.status {
        CandidateStatus::New => format!("{:<8}", "new").green(),
        CandidateStatus::Modified => format!("{:<8}", "modified").yellow(),
        CandidateStatus::Deleted => format!("{:<8}", "deleted").red(),
    };
    let mut label = format!("{} {}", status, candidate.path);
    if candidate.safety == Safety::Dangerous {
        label.push_str(&format!(" {}", "[dangerous]".red().bold()));
    }
    if let Some(conflict) = candidate.conflict {
        label.push_str(&format!(" {}", format!("[{}]", conflict).yellow()));
    }
    label
}

/// Pre-ticked state for each candidate.
fn defaults(candidates: &[PushCandidate]) -> Vec<bool> {
    candidates
        .iter()
        .map(|c| c.safety != Safety::Dangerous && c.conflict.is_none())
        .collect()
}

/// Turn the chosen indices into a selection.
fn selection_for(
    candidates: &[PushCandidate],
    chosen: &[usize],
    use_git_detection: bool,
) -> SelectionSet {
    if chosen.is_empty() {
        // Empty paths would mean "everything"; exclude every file instead
        return SelectionSet {
            exclude: vec!["*".to_string()],
            ..SelectionSet::all()
        };
    }
    SelectionSet {
        paths: chosen
            .iter()
            .filter_map(|&i| candidates.get(i))
            .map(|c| c.path.clone())
            .collect(),
        use_git_detection,
        ..SelectionSet::all()
    }
}

impl SelectionProvider for InteractiveSelection {
    fn select(&self, candidates: &[PushCandidate]) -> kit_core::Result<SelectionSet> {
        let items: Vec<String> = candidates.iter().map(label).collect();
        let chosen = MultiSelect::new()
            .with_prompt("Select files to push (space to toggle, enter to confirm)")
            .items(&items)
            .defaults(&defaults(candidates))
            .interact()
            .map_err(|e| kit_core::Error::Io(std::io::Error::other(e.to_string())))?;
        Ok(selection_for(candidates, &chosen, self.use_git_detection))
    }
}
