//! Package Manager Capability
//!
//! The narrow interface the provisioner uses to pick and install an
//! interpreter version, plus the version ordering used to resolve a prefix.

use std::cmp::Ordering;

use super::ProvisionContext;
use crate::error::Result;

/// What an install request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// The version was already present; nothing was run
    AlreadyPresent,
}

/// A tool that can list, resolve and install versions.
pub trait PackageManager {
    /// Name used in log messages.
    fn name(&self) -> &str;

    /// Resolves a version or prefix to one installable version.
    fn resolve_version(&self, ctx: &ProvisionContext, spec: &str) -> Result<String>;

    /// Installs `version` unless it is already present.
    fn install(&self, ctx: &ProvisionContext, version: &str) -> Result<InstallOutcome>;

    /// Lists installed versions.
    fn list_installed(&self, ctx: &ProvisionContext) -> Result<Vec<String>>;
}

/// Picks the greatest candidate whose name starts with `prefix`.
///
/// Candidates are sorted with [`compare_versions`]; the sort is stable, so
/// entries that compare equal keep the manager's order and the last one wins.
pub fn resolve_prefix<S: AsRef<str>>(candidates: &[S], prefix: &str) -> Option<String> {
    let mut matching: Vec<&str> = candidates
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty() && c.starts_with(prefix))
        .collect();

    matching.sort_by(|a, b| compare_versions(a, b));
    matching.last().map(|v| v.to_string())
}

/// Orders version strings with numeric runs compared by value.
///
/// `3.8.12` sorts after `3.8.9`; non-numeric runs compare as text.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ord = if is_digits(l) && is_digits(r) {
            compare_digit_runs(l, r)
        } else {
            l.cmp(r)
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    left.len().cmp(&right.len())
}

fn is_digits(run: &str) -> bool {
    run.starts_with(|c: char| c.is_ascii_digit())
}

/// Compares two runs of ASCII digits by value, without any width limit.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Splits into alternating runs of ASCII digits and everything else.
fn chunks(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev_digit: Option<bool> = None;

    for (i, ch) in s.char_indices() {
        let digit = ch.is_ascii_digit();
        if prev_digit.is_some_and(|p| p != digit) {
            out.push(&s[start..i]);
            start = i;
        }
        prev_digit = Some(digit);
    }

    if start < s.len() {
        out.push(&s[start..]);
    }
    out
}
