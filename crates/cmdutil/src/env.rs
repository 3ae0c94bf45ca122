//! In-memory environment variable table.
//!
//! [`EnvTable`] holds an ordered list of `KEY=VALUE` strings (bare `KEY`
//! entries are kept as-is) and edits it without touching the real process
//! environment. Values are treated as lists joined by the platform separator
//! (`:` on Unix, `;` on Windows). After every mutation each value is
//! normalized: list items are trimmed, blank items are dropped and repeated
//! items keep only their first occurrence.
//!
//! ```
//! use cmdutil::env::{EnvPlatform, EnvTable};
//!
//! let mut env = EnvTable::with_environ(["PATH=/usr/bin:/bin"]).with_platform(EnvPlatform::unix());
//! env.insert("PATH", "/opt/go/bin").unwrap();
//! env.append("PATH", "/usr/bin").unwrap();
//! assert_eq!(env.get("PATH"), "/opt/go/bin:/usr/bin:/bin");
//! ```

use crate::error::EnvError;
use std::collections::HashSet;
use std::process::Command;

/// Key comparison and list separator of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvPlatform {
    /// Whether `Path` and `PATH` name the same variable
    pub case_insensitive: bool,

    /// Separator between the items of a list value
    pub separator: char,
}

impl EnvPlatform {
    /// Conventions of the platform this binary was built for.
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::windows()
        } else {
            Self::unix()
        }
    }

    /// Case-sensitive keys, `:` separated lists.
    pub fn unix() -> Self {
        Self {
            case_insensitive: false,
            separator: ':',
        }
    }

    /// Case-insensitive keys, `;` separated lists.
    pub fn windows() -> Self {
        Self {
            case_insensitive: true,
            separator: ';',
        }
    }

    fn same_key(&self, a: &str, b: &str) -> bool {
        if self.case_insensitive {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }
}

impl Default for EnvPlatform {
    fn default() -> Self {
        Self::host()
    }
}

/// Ordered list of environment entries.
///
/// Not synchronized; wrap it in a lock to share it between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvTable {
    platform: EnvPlatform,
    values: Vec<String>,
}

impl Default for EnvTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvTable {
    /// Creates a table seeded from the current process environment.
    pub fn new() -> Self {
        let values = std::env::vars_os()
            .map(|(k, v)| format!("{}={}", k.to_string_lossy(), v.to_string_lossy()))
            .collect();
        Self {
            platform: EnvPlatform::host(),
            values,
        }
    }

    /// Creates a table from explicit `KEY=VALUE` strings.
    pub fn with_environ<I, S>(environ: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            platform: EnvPlatform::host(),
            values: environ.into_iter().map(Into::into).collect(),
        }
    }

    /// Overrides the platform conventions.
    pub fn with_platform(mut self, platform: EnvPlatform) -> Self {
        self.platform = platform;
        self
    }

    /// Platform conventions in use.
    pub fn platform(&self) -> EnvPlatform {
        self.platform
    }

    /// All entries, in order.
    pub fn environ(&self) -> &[String] {
        &self.values
    }

    /// `(key, value)` pairs of all entries that have a value.
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().filter_map(|kv| kv.split_once('='))
    }

    /// Replaces the environment of `cmd` with this table.
    pub fn apply<'a>(&self, cmd: &'a mut Command) -> &'a mut Command {
        cmd.env_clear().envs(self.vars())
    }

    /// Value of the first entry named `key`, or an empty string.
    ///
    /// ```text
    /// PATH=/home/work/bin:/opt/bin
    /// get("PATH") -> "/home/work/bin:/opt/bin"
    /// ```
    pub fn get(&self, key: &str) -> &str {
        if key.is_empty() {
            return "";
        }
        self.vars()
            .find(|(k, _)| self.platform.same_key(k, key))
            .map(|(_, v)| v)
            .unwrap_or("")
    }

    /// Value of `key` split on the list separator; empty when unset.
    pub fn get_values(&self, key: &str) -> Vec<String> {
        let value = self.get(key);
        if value.is_empty() {
            return Vec::new();
        }
        value.split(self.platform.separator).map(str::to_string).collect()
    }

    /// Sets `key` to `value`, replacing the whole previous value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), EnvError> {
        check_key(key)?;
        match self.position(key) {
            Some(i) => {
                let name = entry_key(&self.values[i]).to_string();
                self.values[i] = format!("{name}={value}");
            }
            None => self.values.push(format!("{key}={value}")),
        }
        self.normalize();
        Ok(())
    }

    /// Adds `value` as the last list item of `key`, or sets it when absent.
    pub fn append(&mut self, key: &str, value: &str) -> Result<(), EnvError> {
        check_key(key)?;
        let sep = self.platform.separator;
        match self.position(key) {
            Some(i) => {
                let entry = &self.values[i];
                let updated = match entry.split_once('=') {
                    Some(_) => format!("{entry}{sep}{value}"),
                    None => format!("{entry}={value}"),
                };
                self.values[i] = updated;
            }
            None => self.values.push(format!("{key}={value}")),
        }
        self.normalize();
        Ok(())
    }

    /// Adds `value` as the first list item of `key`, or sets it when absent.
    pub fn insert(&mut self, key: &str, value: &str) -> Result<(), EnvError> {
        check_key(key)?;
        let sep = self.platform.separator;
        match self.position(key) {
            Some(i) => {
                let entry = &self.values[i];
                let updated = match entry.split_once('=') {
                    Some((k, v)) => format!("{k}={value}{sep}{v}"),
                    None => format!("{entry}={value}"),
                };
                self.values[i] = updated;
            }
            None => self.values.push(format!("{key}={value}")),
        }
        self.normalize();
        Ok(())
    }

    /// Removes the first entry named `key`.
    pub fn delete(&mut self, key: &str) -> Result<(), EnvError> {
        check_key(key)?;
        if let Some(i) = self.position(key) {
            self.values.remove(i);
        }
        self.normalize();
        Ok(())
    }

    /// Removes one list item from `key`.
    ///
    /// The entry disappears entirely if `value` was its only item.
    pub fn delete_value(&mut self, key: &str, value: &str) -> Result<(), EnvError> {
        check_key(key)?;
        let sep = self.platform.separator;
        let found = self
            .values
            .iter()
            .position(|kv| kv.split_once('=').is_some_and(|(k, _)| self.platform.same_key(k, key)));

        if let Some(i) = found {
            let (k, v) = self.values[i].split_once('=').unwrap_or_default();
            let kept: Vec<&str> = v.split(sep).filter(|item| *item != value).collect();
            let replacement = (!kept.is_empty()).then(|| format!("{k}={}", kept.join(sep.to_string().as_str())));
            match replacement {
                Some(kv) => self.values[i] = kv,
                None => {
                    self.values.remove(i);
                }
            }
        }
        self.normalize();
        Ok(())
    }

    /// [`set`](Self::set), panicking on error.
    pub fn must_set(&mut self, key: &str, value: &str) {
        if let Err(e) = self.set(key, value) {
            panic!("env.set({key:?}, {value:?}): {e}");
        }
    }

    /// [`append`](Self::append), panicking on error.
    pub fn must_append(&mut self, key: &str, value: &str) {
        if let Err(e) = self.append(key, value) {
            panic!("env.append({key:?}, {value:?}): {e}");
        }
    }

    /// [`insert`](Self::insert), panicking on error.
    pub fn must_insert(&mut self, key: &str, value: &str) {
        if let Err(e) = self.insert(key, value) {
            panic!("env.insert({key:?}, {value:?}): {e}");
        }
    }

    /// [`delete`](Self::delete), panicking on error.
    pub fn must_delete(&mut self, key: &str) {
        if let Err(e) = self.delete(key) {
            panic!("env.delete({key:?}): {e}");
        }
    }

    /// [`delete_value`](Self::delete_value), panicking on error.
    pub fn must_delete_value(&mut self, key: &str, value: &str) {
        if let Err(e) = self.delete_value(key, value) {
            panic!("env.delete_value({key:?}, {value:?}): {e}");
        }
    }

    /// Index of the first entry named `key`, with or without a value.
    fn position(&self, key: &str) -> Option<usize> {
        self.values
            .iter()
            .position(|kv| self.platform.same_key(entry_key(kv), key))
    }

    fn normalize(&mut self) {
        let sep = self.platform.separator;
        for kv in &mut self.values {
            if let Some((k, v)) = kv.split_once('=') {
                let unique = unique_items(v, sep);
                if unique != v {
                    *kv = format!("{k}={unique}");
                }
            }
        }
    }
}

fn check_key(key: &str) -> Result<(), EnvError> {
    if key.is_empty() {
        return Err(EnvError::EmptyKey);
    }
    Ok(())
}

fn entry_key(kv: &str) -> &str {
    kv.split_once('=').map_or(kv, |(k, _)| k)
}

/// Trims list items and drops blanks and repeats, keeping first occurrences.
fn unique_items(value: &str, sep: char) -> String {
    let mut seen = HashSet::new();
    value
        .split(sep)
        .map(str::trim)
        .filter(|item| !item.is_empty() && seen.insert(*item))
        .collect::<Vec<_>>()
        .join(sep.to_string().as_str())
}
