//! Release note extraction from issue text.
//!
//! Issue release note fields are written in wiki markup: `hN.` lines start a
//! named group and every other non-blank line is a bullet of the current
//! group.

use crate::types::{Group, Issue, Notes};
use regex::Regex;
use std::sync::LazyLock;

/// Group used for lines that appear before any heading.
pub const DEFAULT_GROUP: &str = "Changes";

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^h[1-9]\. (.+)$").expect("valid heading pattern"));

/// Returns the heading title if `line` is a wiki heading such as
/// `h4. Breaking Changes`.
pub fn find_heading(line: &str) -> Option<&str> {
    HEADING
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Splits one issue's release notes into groups, in input order.
pub fn extract_groups(text: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(heading) = find_heading(line) {
            groups.push(Group::new(heading));
            continue;
        }

        match groups.last_mut() {
            Some(group) => group.bullet_points.push(line.to_string()),
            None => groups.push(Group {
                name: DEFAULT_GROUP.to_string(),
                bullet_points: vec![line.to_string()],
            }),
        }
    }

    groups
}

/// Merges `new_groups` into `target`, appending bullets to groups that
/// already exist.
pub fn merge_groups(target: &mut Notes, new_groups: Vec<Group>) {
    for group in new_groups {
        target
            .groups
            .entry(group.name)
            .or_default()
            .extend(group.bullet_points);
    }
}

/// Extracts and merges the release notes of `issues`, in issue order.
pub fn extract_release_notes(issues: &[Issue]) -> Notes {
    let mut notes = Notes::new();

    for issue in issues {
        tracing::info!(key = %issue.key, issue_type = %issue.issue_type, "extracting release notes");

        if issue.release_notes.is_empty() {
            tracing::info!(key = %issue.key, "no release notes found");
            continue;
        }

        merge_groups(&mut notes, extract_groups(&issue.release_notes));
    }

    notes
}
