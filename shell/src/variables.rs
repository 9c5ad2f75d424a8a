use crate::command::Pipeline;
use std::collections::HashMap;
use std::collections::TryReserveError;
use std::io::{self, Write};

/// Shell variables set with `NAME=value` statements.
///
/// Unlike the process environment these are never exported to children; they
/// only feed `$NAME` / `${NAME}` expansion and the `set` builtin.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    vars: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `name`.
    ///
    /// Fails only when the table cannot grow to hold a new name.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), TryReserveError> {
        let name = name.into();
        if !self.vars.contains_key(&name) {
            self.vars.try_reserve(1)?;
        }
        self.vars.insert(name, value.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Drop every variable; used by `exit`.
    pub fn clear(&mut self) {
        self.vars.clear();
    }

    /// Every `(name, value)` pair, each name once, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Write `NAME=VALUE` lines sorted by name, or a notice when nothing is set.
    pub fn print(&self, out: &mut dyn Write) -> io::Result<()> {
        if self.vars.is_empty() {
            return writeln!(out, "No variables set.");
        }
        let mut entries: Vec<(&str, &str)> = self.iter().collect();
        entries.sort_unstable();
        for (name, value) in entries {
            writeln!(out, "{name}={value}")?;
        }
        Ok(())
    }

    /// Expand a single word.
    ///
    /// Only words that *start* with `$` are touched, and the whole word is
    /// replaced: `$NAME` uses the rest of the word as the name, `${NAME}` the
    /// text between the braces. An unterminated `${` leaves the word as is.
    /// Unset names expand to the empty string.
    pub fn expand_word(&self, word: &str) -> String {
        let Some(rest) = word.strip_prefix('$') else {
            return word.to_string();
        };
        let name = match rest.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => &braced[..end],
                None => return word.to_string(),
            },
            None => rest,
        };
        self.get(name).unwrap_or_default().to_string()
    }

    /// Expand every argument of every stage in place.
    ///
    /// Redirection targets are left untouched.
    pub fn expand_pipeline(&self, pipeline: &mut Pipeline) {
        for stage in &mut pipeline.stages {
            for arg in &mut stage.argv {
                if arg.starts_with('$') {
                    *arg = self.expand_word(arg);
                }
            }
        }
    }
}
