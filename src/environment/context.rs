//! Provisioning Context
//!
//! An explicit copy of the environment-variable table that each provisioning
//! operation receives and returns. Child processes are launched with exactly
//! these variables, so `PATH` edits here decide which interpreter runs next.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

/// Name of the executable search path variable.
pub const PATH_VAR: &str = "PATH";

/// A single difference between two contexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvChange {
    Set(String, String),
    Unset(String),
}

impl EnvChange {
    /// Renders the change as a POSIX shell statement.
    pub fn to_shell(&self) -> String {
        match self {
            EnvChange::Set(key, value) => format!("export {}={}", key, shell_quote(value)),
            EnvChange::Unset(key) => format!("unset {}", key),
        }
    }
}

/// Environment variables threaded through the provisioning steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionContext {
    vars: BTreeMap<String, String>,
}

impl ProvisionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the current process environment.
    pub fn from_process() -> Self {
        Self::from_vars(env::vars())
    }

    /// Builds a context from key/value pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns a variable's value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Returns all variables.
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Returns a copy with `key` set to `value`.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Returns a copy with `key` removed.
    pub fn without_var(mut self, key: &str) -> Self {
        self.vars.remove(key);
        self
    }

    /// Returns the entries of `PATH` in search order.
    pub fn path_entries(&self) -> Vec<PathBuf> {
        self.get(PATH_VAR)
            .map(|path| {
                env::split_paths(path)
                    .filter(|entry| !entry.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns a copy with `dir` placed first on `PATH`.
    ///
    /// An existing entry for the same directory is moved rather than duplicated.
    pub fn prepend_path(self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let mut entries = self.path_entries();
        entries.retain(|entry| entry != &dir);
        entries.insert(0, dir);
        self.with_path(entries)
    }

    /// Returns a copy with every `PATH` entry equal to `dir` removed.
    pub fn remove_path_entry(self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut entries = self.path_entries();
        entries.retain(|entry| entry != dir);
        self.with_path(entries)
    }

    fn with_path(self, entries: Vec<PathBuf>) -> Self {
        // An entry containing the separator cannot be represented; drop it.
        let valid: Vec<&PathBuf> = entries
            .iter()
            .filter(|entry| env::join_paths([entry]).is_ok())
            .collect();
        let joined = env::join_paths(valid)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.with_var(PATH_VAR, joined)
    }

    /// Finds an executable on this context's `PATH`.
    pub fn find_executable(&self, name: &str) -> Option<PathBuf> {
        self.path_entries()
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Lists the changes that turn `before` into `self`.
    pub fn diff(&self, before: &ProvisionContext) -> Vec<EnvChange> {
        let mut changes: Vec<EnvChange> = self
            .vars
            .iter()
            .filter(|(key, value)| before.vars.get(*key) != Some(*value))
            .map(|(key, value)| EnvChange::Set(key.clone(), value.clone()))
            .collect();

        changes.extend(
            before
                .vars
                .keys()
                .filter(|key| !self.vars.contains_key(*key))
                .map(|key| EnvChange::Unset(key.clone())),
        );

        changes
    }
}

/// Single-quotes a value for POSIX shells.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
