use anyhow::{Context as _, Result};
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::collections::VecDeque;

/// Source of raw input lines for the read loop and for `if` block collection.
pub trait LineReader {
    /// Show `prompt` and read one line without its terminator.
    ///
    /// `Ok(None)` means end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Offer a recorded line to the reader's own recall mechanism, if it has one.
    fn add_history(&mut self, _line: &str) {}
}

/// Completes builtin names in the first word of the line.
pub struct BuiltinCompleter {
    names: Vec<&'static str>,
}

impl BuiltinCompleter {
    pub fn new(names: Vec<&'static str>) -> Self {
        Self { names }
    }

    fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let before = &line[..pos];
        let start = before
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);
        if start != 0 {
            return (pos, Vec::new());
        }
        let matches = self
            .names
            .iter()
            .filter(|name| name.starts_with(before))
            .map(|name| name.to_string())
            .collect();
        (start, matches)
    }
}

impl Completer for BuiltinCompleter {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        Ok(self.candidates(line, pos))
    }
}

impl Hinter for BuiltinCompleter {
    type Hint = String;
}

impl Highlighter for BuiltinCompleter {}

impl Validator for BuiltinCompleter {}

impl Helper for BuiltinCompleter {}

/// Interactive terminal input backed by `rustyline`.
pub struct EditorInput {
    editor: Editor<BuiltinCompleter, DefaultHistory>,
}

impl EditorInput {
    pub fn new(builtin_names: Vec<&'static str>) -> Result<Self> {
        let mut editor = Editor::new().context("can't initialise line editor")?;
        editor.set_helper(Some(BuiltinCompleter::new(builtin_names)));
        Ok(Self { editor })
    }
}

impl LineReader for EditorInput {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            // Ctrl-C drops the line being typed.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err).context("can't read input line"),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(e) = self.editor.add_history_entry(line) {
            log::warn!("can't add history entry: {e}");
        }
    }
}

/// Pre-recorded input, used by tests and non-interactive drivers.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
    prompts: Vec<String>,
    recorded: Vec<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
            recorded: Vec::new(),
        }
    }

    /// Every prompt shown so far, in order.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Every line passed to [`LineReader::add_history`].
    pub fn recorded(&self) -> &[String] {
        &self.recorded
    }
}

impl LineReader for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.lines.pop_front())
    }

    fn add_history(&mut self, line: &str) {
        self.recorded.push(line.to_string());
    }
}
