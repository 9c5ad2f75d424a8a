use crate::builtin::Builtins;
use crate::command::{ExitCode, STATUS_ERROR};
use crate::config::{FAREWELL, PROMPT, ShellConfig};
use crate::control::{self, IfBlock};
use crate::env::Environment;
use crate::executor::{ExecResult, Executor};
use crate::io_adapters::LineReader;
use crate::parser;

/// A `NAME=value` statement split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment<'a> {
    pub name: &'a str,
    pub value: String,
}

/// Recognise `NAME=value`.
///
/// Only the first whitespace-separated word is inspected: it must contain `=`
/// with something on both sides. The value is everything after that first `=`
/// up to the end of the statement, trimmed, with one pair of matching single
/// or double quotes removed. `env KEY=VAL cmd` is therefore not an assignment,
/// but `KEY=VAL cmd` is one (with value `VAL cmd`).
pub fn parse_assignment(statement: &str) -> Option<Assignment<'_>> {
    let statement = statement.trim();
    let first_word = statement.split_whitespace().next()?;
    let (name, rest_of_word) = first_word.split_once('=')?;
    if name.is_empty() || rest_of_word.is_empty() {
        return None;
    }
    let value = statement[name.len() + 1..].trim();
    Some(Assignment {
        name,
        value: unquote(value).to_string(),
    })
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Strip a trailing `&`, reporting whether one was present.
pub fn split_background(statement: &str) -> (&str, bool) {
    let trimmed = statement.trim_end();
    match trimmed.strip_suffix('&') {
        Some(rest) => (rest.trim_end(), true),
        None => (trimmed, false),
    }
}

/// The interactive shell: statement driver, if-blocks and the read loop.
///
/// The interpreter owns the session [`Environment`] and the builtin table and
/// lends both to the executor for each statement.
///
/// Example
/// ```
/// use minishell::Interpreter;
/// let mut sh = Interpreter::default();
/// assert_eq!(sh.run_line("GREETING=hello; NAME='big world'"), 0);
/// assert_eq!(sh.env().variables.get("NAME"), Some("big world"));
/// ```
pub struct Interpreter {
    env: Environment,
    builtins: Builtins,
    config: ShellConfig,
}

impl Interpreter {
    pub fn new(config: ShellConfig) -> Self {
        Self {
            env: Environment::new(&config.limits),
            builtins: Builtins::default(),
            config,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Run one `;`-free statement and return its status.
    ///
    /// Returns 0 for blank statements and assignments, the pipeline's status
    /// for foreground commands, 0 once a background pipeline is launched, and
    /// -1 when the statement could not be parsed or spawned.
    pub fn run_statement(&mut self, statement: &str) -> ExitCode {
        let statement = statement.trim();
        if statement.is_empty() {
            return 0;
        }

        if let Some(Assignment { name, value }) = parse_assignment(statement) {
            log::debug!("assign {name}={value}");
            return match self.env.variables.set(name, value) {
                Ok(()) => 0,
                Err(e) => {
                    log::warn!("variable store allocation failed: {e}");
                    eprintln!("Failed to set variable");
                    STATUS_ERROR
                }
            };
        }

        let (text, background) = split_background(statement);
        let pipeline = match parser::parse_pipeline(text, &self.config.limits) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                eprintln!("Parse error in statement '{text}': {e}");
                return STATUS_ERROR;
            }
        };

        match Executor::new(&mut self.env, &self.builtins).execute(pipeline, background, text) {
            Ok(ExecResult::Status(code)) => ExitCode::from(code),
            Ok(ExecResult::Backgrounded(_)) => 0,
            Err(e) => {
                eprintln!("{e}");
                STATUS_ERROR
            }
        }
    }

    /// Run every `;`-separated statement of `line` in order.
    ///
    /// A failing statement does not stop the ones after it; only `exit` does.
    /// Returns the status of the last statement run, or 0 if there was none.
    pub fn run_line(&mut self, line: &str) -> ExitCode {
        let mut status = 0;
        for statement in line.split(';').map(str::trim) {
            if statement.is_empty() {
                continue;
            }
            status = self.run_statement(statement);
            if self.env.should_exit {
                break;
            }
        }
        status
    }

    /// Collect an `if` construct starting at `first_line` and run the selected branch.
    ///
    /// The condition runs as a single statement; status 0 selects the
    /// then-block, anything else the else-block. The selected block's
    /// newline-joined text goes through [`Interpreter::run_line`] once, so only
    /// `;` separates its statements: a newline is plain whitespace. Running out
    /// of input while collecting abandons the whole construct without running
    /// any of it.
    pub fn run_if_block(&mut self, first_line: &str, input: &mut dyn LineReader) -> ExitCode {
        let IfBlock {
            condition,
            then_block,
            else_block,
        } = match control::collect_if_block(first_line, input) {
            Ok(block) => block,
            Err(e) => {
                eprintln!("{e}");
                return STATUS_ERROR;
            }
        };

        let condition_status = self.run_statement(&condition);
        if self.env.should_exit {
            return condition_status;
        }
        let selected = if condition_status == 0 {
            log::debug!("condition `{condition}` succeeded; running then-block");
            Some(then_block)
        } else {
            log::debug!("condition `{condition}` returned {condition_status}; running else-block");
            else_block
        };

        match selected {
            Some(block) => self.run_line(&block.text()),
            None => 0,
        }
    }

    /// Handle one line read at the top-level prompt.
    ///
    /// The line is recorded in history, `!N` is resolved, and the result is
    /// run either as an `if` construct or as `;`-separated statements.
    /// Returns `None` when there was nothing to run.
    pub fn process_input(&mut self, line: &str, input: &mut dyn LineReader) -> Option<ExitCode> {
        if line.trim().is_empty() {
            return None;
        }
        self.env.history.record(line);
        input.add_history(line);

        let line = match self.env.history.recall(line) {
            Ok(Some(recalled)) => {
                println!("{recalled}");
                recalled
            }
            Ok(None) => line.to_string(),
            Err(e) => {
                println!("{e}");
                return None;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if control::starts_if_block(line) {
            Some(self.run_if_block(line, input))
        } else {
            Some(self.run_line(line))
        }
    }

    /// Read-eval loop: reap finished jobs, prompt, run, repeat.
    ///
    /// Stops on end of input (printing a farewell) or after `exit`.
    pub fn repl(&mut self, input: &mut dyn LineReader) -> anyhow::Result<()> {
        while !self.env.should_exit {
            self.env.jobs.reap();
            let Some(line) = input.read_line(PROMPT)? else {
                println!("\n{FAREWELL}");
                break;
            };
            if let Some(status) = self.process_input(&line, input) {
                log::debug!("line `{}` finished with status {status}", line.trim());
            }
        }
        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::ScriptedInput;
    use crate::test_support::{lock_processes, temp_path};
    use std::fs;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_parse_assignment() {
        let a = parse_assignment("NAME=value").unwrap();
        assert_eq!((a.name, a.value.as_str()), ("NAME", "value"));

        let a = parse_assignment("MSG=\"quoted value\"").unwrap();
        assert_eq!((a.name, a.value.as_str()), ("MSG", "quoted value"));

        let a = parse_assignment("MSG='single'").unwrap();
        assert_eq!(a.value, "single");

        let a = parse_assignment("X=a=b").unwrap();
        assert_eq!((a.name, a.value.as_str()), ("X", "a=b"));

        let a = parse_assignment("KEY=VAL cmd").unwrap();
        assert_eq!(a.value, "VAL cmd");
    }

    #[test]
    fn test_not_assignments() {
        assert_eq!(parse_assignment("=value"), None);
        assert_eq!(parse_assignment("NAME="), None);
        assert_eq!(parse_assignment("echo a=b"), None);
        assert_eq!(parse_assignment("env KEY=VAL cmd"), None);
        assert_eq!(parse_assignment(""), None);
    }

    #[test]
    fn test_mismatched_quotes_are_kept() {
        let a = parse_assignment("A=\"half").unwrap();
        assert_eq!(a.value, "\"half");
        let a = parse_assignment("A=\"mixed'").unwrap();
        assert_eq!(a.value, "\"mixed'");
    }

    #[test]
    fn test_split_background() {
        assert_eq!(split_background("sleep 1 &"), ("sleep 1", true));
        assert_eq!(split_background("sleep 1&  "), ("sleep 1", true));
        assert_eq!(split_background("sleep 1"), ("sleep 1", false));
        assert_eq!(split_background("&"), ("", true));
    }

    #[test]
    fn test_assignment_then_expansion() {
        let _lock = lock_processes();
        let out = temp_path("assign_out");
        let mut sh = Interpreter::default();
        let line = format!("NAME=value; echo $NAME > {}", out.display());
        assert_eq!(sh.run_line(&line), 0);
        assert_eq!(fs::read_to_string(&out).unwrap(), "value\n");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_blank_statements_are_skipped() {
        let mut sh = Interpreter::default();
        assert_eq!(sh.run_statement("   "), 0);
        assert_eq!(sh.run_line(" ; ;; "), 0);
    }

    #[test]
    fn test_parse_error_yields_minus_one_and_continues() {
        let mut sh = Interpreter::default();
        assert_eq!(sh.run_statement("cat <"), STATUS_ERROR);
        assert_eq!(sh.run_line("ls | ; A=1"), 0);
        assert_eq!(sh.env().variables.get("A"), Some("1"));
    }

    #[test]
    fn test_exit_stops_the_line() {
        let mut sh = Interpreter::default();
        sh.run_line("A=1; exit; B=2");
        assert!(sh.should_exit());
        assert_eq!(sh.env().variables.get("B"), None);
    }

    #[test]
    fn test_failing_statement_does_not_abort_line() {
        let _lock = lock_processes();
        let mut sh = Interpreter::default();
        assert_eq!(sh.run_line("false; A=after"), 0);
        assert_eq!(sh.env().variables.get("A"), Some("after"));
        assert_eq!(sh.run_line("true; false"), 1);
    }

    #[test]
    fn test_if_false_runs_else_block() {
        let _lock = lock_processes();
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(["then", "BRANCH=then", "else", "BRANCH=else", "fi"]);
        assert_eq!(sh.run_if_block("if false", &mut input), 0);
        assert_eq!(sh.env().variables.get("BRANCH"), Some("else"));
    }

    #[test]
    fn test_if_true_runs_then_block() {
        let _lock = lock_processes();
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(["true", "then", "A=1; B=2", "else", "C=3", "fi"]);
        assert_eq!(sh.run_if_block("if", &mut input), 0);
        assert_eq!(sh.env().variables.get("A"), Some("1"));
        assert_eq!(sh.env().variables.get("B"), Some("2"));
        assert_eq!(sh.env().variables.get("C"), None);
    }

    #[test]
    fn test_if_status_comes_from_selected_block() {
        let _lock = lock_processes();
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(["then", "true", "else", "true; false", "fi"]);
        assert_eq!(sh.run_if_block("if false", &mut input), 1);
    }

    #[test]
    fn test_exit_as_condition_skips_blocks() {
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(["then", "A=1", "else", "A=2", "fi"]);
        assert_eq!(sh.run_if_block("if exit", &mut input), 0);
        assert!(sh.should_exit());
        assert_eq!(sh.env().variables.get("A"), None);
    }

    #[test]
    fn test_block_lines_join_into_one_statement() {
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(["then", "A=1", "B=2", "fi"]);
        assert_eq!(sh.run_if_block("if A=cond", &mut input), 0);
        assert_eq!(sh.env().variables.get("A"), Some("1\nB=2"));
        assert_eq!(sh.env().variables.get("B"), None);
    }

    #[test]
    fn test_block_lines_become_arguments() {
        let _lock = lock_processes();
        let out = temp_path("block_args_out");
        let mut sh = Interpreter::default();
        let last = format!("two > {}", out.display());
        let mut input = ScriptedInput::new(vec!["then".to_string(), "echo one".to_string(), last, "fi".to_string()]);
        assert_eq!(sh.run_if_block("if true", &mut input), 0);
        assert_eq!(fs::read_to_string(&out).unwrap(), "one two\n");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_if_without_else_is_noop_on_failure() {
        let _lock = lock_processes();
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(["then", "A=1", "fi"]);
        assert_eq!(sh.run_if_block("if false", &mut input), 0);
        assert!(sh.env().variables.is_empty());
    }

    #[test]
    fn test_if_condition_parse_error_selects_else() {
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(["then", "A=then", "else", "A=else", "fi"]);
        sh.run_if_block("if cat <", &mut input);
        assert_eq!(sh.env().variables.get("A"), Some("else"));
    }

    #[test]
    fn test_if_eof_runs_nothing() {
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(["then", "A=1"]);
        assert_eq!(sh.run_if_block("if A=cond", &mut input), STATUS_ERROR);
        assert_eq!(sh.env().variables.get("A"), None);
    }

    #[test]
    fn test_history_recall() {
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(Vec::<String>::new());
        sh.process_input("A=first", &mut input);
        sh.process_input("A=second", &mut input);
        sh.process_input("!1", &mut input);
        assert_eq!(sh.env().variables.get("A"), Some("first"));
        assert_eq!(sh.env().history.count(), 3);
        assert_eq!(sh.env().history.get(3), Some("!1"));
        assert_eq!(input.recorded(), ["A=first", "A=second", "!1"]);
    }

    #[test]
    fn test_history_recall_out_of_range() {
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(Vec::<String>::new());
        assert_eq!(sh.process_input("!9", &mut input), None);
    }

    #[test]
    fn test_process_input_dispatches_if_block() {
        let _lock = lock_processes();
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(["then", "R=yes", "fi"]);
        assert_eq!(sh.process_input("if true", &mut input), Some(0));
        assert_eq!(sh.env().variables.get("R"), Some("yes"));
    }

    #[test]
    fn test_repl_runs_until_eof() {
        let _lock = lock_processes();
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(["A=1", "", "if false", "then", "B=then", "else", "B=else", "fi"]);
        sh.repl(&mut input).unwrap();
        assert_eq!(sh.env().variables.get("A"), Some("1"));
        assert_eq!(sh.env().variables.get("B"), Some("else"));
        assert_eq!(sh.env().history.count(), 2);
        assert_eq!(input.prompts().first().map(String::as_str), Some(PROMPT));
    }

    #[test]
    fn test_repl_stops_after_exit() {
        let _lock = lock_processes();
        let mut sh = Interpreter::default();
        let mut input = ScriptedInput::new(["A=1", "exit", "B=2"]);
        sh.repl(&mut input).unwrap();
        assert!(sh.should_exit());
        assert_eq!(sh.env().variables.get("B"), None);
        assert_eq!(input.prompts().len(), 2);
    }

    #[test]
    fn test_repl_reaps_background_jobs() {
        let _lock = lock_processes();
        let mut sh = Interpreter::default();
        assert_eq!(sh.run_statement("sleep 0.1 &"), 0);
        assert_eq!(sh.env().jobs.len(), 1);
        assert_eq!(sh.env().jobs.jobs()[0].cmdline, "sleep 0.1");
        sleep(Duration::from_millis(400));

        let mut input = ScriptedInput::new(Vec::<String>::new());
        sh.repl(&mut input).unwrap();
        assert!(sh.env().jobs.is_empty());
    }
}
