use crate::types::IssueKey;
use regex::Regex;
use std::sync::LazyLock;

// A key must start the line; anything after the numeric part is ignored.
static ISSUE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[A-Za-z0-9_]+-[0-9]+").expect("valid issue key pattern"));

/// Finds the issue keys that start lines of `text`, in line order.
pub fn find_issue_keys(text: &str) -> Vec<IssueKey> {
    ISSUE_KEY
        .find_iter(text)
        .map(|m| IssueKey::new(m.as_str()))
        .collect()
}
