use std::io::{self, Write};
use thiserror::Error;

/// Append-only log of raw input lines, numbered from 1.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No such command in history.")]
pub struct NoSuchEntry;

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
    }

    /// Entry `n`, counting from 1.
    pub fn get(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(String::as_str)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn print(&self, out: &mut dyn Write) -> io::Result<()> {
        for (i, line) in self.entries.iter().enumerate() {
            writeln!(out, "{} {}", i + 1, line)?;
        }
        Ok(())
    }

    /// Resolve `!N` recall.
    ///
    /// Returns `Ok(None)` when `line` is not a recall, the recalled entry when it
    /// is, and an error when `N` is not a valid entry number. Like `atoi`, only
    /// the leading digits after `!` are significant.
    pub fn recall(&self, line: &str) -> Result<Option<String>, NoSuchEntry> {
        let Some(rest) = line.trim().strip_prefix('!') else {
            return Ok(None);
        };
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        let n: usize = digits.parse().map_err(|_| NoSuchEntry)?;
        self.get(n).map(|entry| Some(entry.to_string())).ok_or(NoSuchEntry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(lines: &[&str]) -> History {
        let mut h = History::new();
        for line in lines {
            h.record(*line);
        }
        h
    }

    #[test]
    fn test_entries_are_one_indexed() {
        let h = history(&["ls", "pwd"]);
        assert_eq!(h.count(), 2);
        assert_eq!(h.get(0), None);
        assert_eq!(h.get(1), Some("ls"));
        assert_eq!(h.get(2), Some("pwd"));
        assert_eq!(h.get(3), None);
    }

    #[test]
    fn test_recall_returns_entry() {
        let h = history(&["echo one", "echo two", "!1"]);
        assert_eq!(h.recall("!2"), Ok(Some("echo two".to_string())));
        assert_eq!(h.recall("  !1  "), Ok(Some("echo one".to_string())));
    }

    #[test]
    fn test_recall_ignores_plain_lines() {
        let h = history(&["ls"]);
        assert_eq!(h.recall("ls -l"), Ok(None));
    }

    #[test]
    fn test_recall_out_of_range() {
        let h = history(&["ls"]);
        assert_eq!(h.recall("!0"), Err(NoSuchEntry));
        assert_eq!(h.recall("!5"), Err(NoSuchEntry));
        assert_eq!(h.recall("!"), Err(NoSuchEntry));
        assert_eq!(h.recall("!abc"), Err(NoSuchEntry));
    }

    #[test]
    fn test_recall_uses_leading_digits() {
        let h = history(&["ls", "pwd"]);
        assert_eq!(h.recall("!2x"), Ok(Some("pwd".to_string())));
    }

    #[test]
    fn test_print_numbers_entries() {
        let h = history(&["ls", "cd /tmp"]);
        let mut out = Vec::new();
        h.print(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1 ls\n2 cd /tmp\n");
    }
}
