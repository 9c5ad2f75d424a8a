use crate::command::ExitCode;
use crate::env::Environment;
use anyhow::{Context, Result, bail};
use argh::{EarlyExit, FromArgs};
use std::io::Write;
use std::marker::PhantomData;

const HELP_TEXT: &str = "Built-in commands:
 exit - exit shell
 cd <dir> - change directory
 help - display this message
 jobs - list background jobs
 history - show command history
 set - list variables
";

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "jobs" or "cd".
    fn name() -> &'static str;

    /// Executes the command against the session state.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

/// Object-safe entry in the builtin table.
pub(crate) trait BuiltinFactory {
    fn name(&self) -> &'static str;

    /// Parse `args` (everything after the command name) and run the builtin.
    fn run(&self, args: &[&str], stdout: &mut dyn Write, env: &mut Environment) -> ExitCode;
}

/// Zero-sized handle that lets a [`BuiltinCommand`] type sit in the builtin table.
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinCommand> BuiltinFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn run(&self, args: &[&str], stdout: &mut dyn Write, env: &mut Environment) -> ExitCode {
        let cmd = match T::from_args(&[T::name()], args) {
            Ok(cmd) => cmd,
            Err(EarlyExit { output, status }) => {
                return match status {
                    Ok(()) => {
                        let _ = write!(stdout, "{output}");
                        0
                    }
                    Err(()) => {
                        eprint!("{output}");
                        1
                    }
                };
            }
        };
        let code = match cmd.execute(stdout, env) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("{e:#}");
                1
            }
        };
        let _ = stdout.flush();
        code
    }
}

/// The table consulted for single-stage foreground statements.
pub struct Builtins {
    commands: Vec<Box<dyn BuiltinFactory>>,
}

impl Builtins {
    /// Run `argv` as a builtin if its first word names one.
    ///
    /// Returns `None` when the command is not a builtin and must be spawned.
    pub fn dispatch(
        &self,
        argv: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Option<ExitCode> {
        let (name, rest) = argv.split_first()?;
        let builtin = self.commands.iter().find(|b| b.name() == name)?;
        let args: Vec<&str> = rest.iter().map(String::as_str).collect();
        log::debug!("running builtin {name}");
        Some(builtin.run(&args, stdout, env))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.commands.iter().map(|b| b.name()).collect()
    }
}

impl Default for Builtins {
    /// The full builtin set: `exit`, `cd`, `help`, `jobs`, `history`, `set`.
    fn default() -> Self {
        Self {
            commands: vec![
                Box::new(Factory::<Exit>::default()),
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<Help>::default()),
                Box::new(Factory::<Jobs>::default()),
                Box::new(Factory::<History>::default()),
                Box::new(Factory::<Set>::default()),
            ],
        }
    }
}

#[derive(FromArgs)]
/// Exit shell process
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; the shell always exits with status 0
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.teardown();
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let Some(target) = self.target else {
            bail!("cd: missing argument");
        };
        std::env::set_current_dir(&target).with_context(|| format!("cd: {target}"))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show the builtin command summary.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        stdout.write_all(HELP_TEXT.as_bytes())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List background jobs.
pub struct Jobs {}

impl BuiltinCommand for Jobs {
    fn name() -> &'static str {
        "jobs"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.jobs.list(stdout)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show command history, numbered from 1.
pub struct History {}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.history.print(stdout)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List shell variables as NAME=VALUE.
pub struct Set {}

impl BuiltinCommand for Set {
    fn name() -> &'static str {
        "set"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.variables.print(stdout)?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::test_support::lock_processes;
    use nix::unistd::Pid;
    use std::env as stdenv;
    use std::fs;
    use std::path::PathBuf;

    fn new_env() -> Environment {
        Environment::new(&Limits::default())
    }

    fn run(argv: &[&str], env: &mut Environment) -> (Option<ExitCode>, String) {
        let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        let code = Builtins::default().dispatch(&argv, &mut out, env);
        (code, String::from_utf8(out).unwrap())
    }

    fn make_unique_temp_dir(tag: &str) -> PathBuf {
        let dir = stdenv::temp_dir().join(format!("builtin_tests_{}_{}", std::process::id(), tag));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn test_unknown_name_is_not_handled() {
        let mut env = new_env();
        assert_eq!(run(&["ls", "-l"], &mut env).0, None);
        assert_eq!(run(&[], &mut env).0, None);
    }

    #[test]
    fn test_help_prints_summary() {
        let mut env = new_env();
        let (code, out) = run(&["help"], &mut env);
        assert_eq!(code, Some(0));
        assert!(out.starts_with("Built-in commands:"));
        for name in Builtins::default().names() {
            assert!(out.contains(name), "help should mention {name}");
        }
    }

    #[test]
    fn test_cd_changes_directory() {
        let _lock = lock_processes();
        let before = stdenv::current_dir().unwrap();
        let target = make_unique_temp_dir("cd");

        let mut env = new_env();
        let (code, _) = run(&["cd", target.to_str().unwrap()], &mut env);
        let after = stdenv::current_dir().unwrap();
        stdenv::set_current_dir(&before).unwrap();

        assert_eq!(code, Some(0));
        assert_eq!(
            fs::canonicalize(after).unwrap(),
            fs::canonicalize(&target).unwrap()
        );
        let _ = fs::remove_dir_all(target);
    }

    #[test]
    fn test_cd_without_argument_fails() {
        let mut env = new_env();
        assert_eq!(run(&["cd"], &mut env).0, Some(1));
    }

    #[test]
    fn test_cd_nonexistent_path_fails() {
        let _lock = lock_processes();
        let before = stdenv::current_dir().unwrap();
        let mut env = new_env();
        assert_eq!(run(&["cd", "/definitely/not/here"], &mut env).0, Some(1));
        assert_eq!(stdenv::current_dir().unwrap(), before);
    }

    #[test]
    fn test_set_lists_variables() {
        let mut env = new_env();
        assert_eq!(run(&["set"], &mut env).1, "No variables set.\n");

        env.variables.set("GREETING", "hi").unwrap();
        let (code, out) = run(&["set"], &mut env);
        assert_eq!(code, Some(0));
        assert_eq!(out, "GREETING=hi\n");
    }

    #[test]
    fn test_jobs_lists_table() {
        let mut env = new_env();
        assert_eq!(run(&["jobs"], &mut env).1, "No background jobs.\n");

        env.jobs.add(Pid::from_raw(4242), "sleep 30").unwrap();
        assert_eq!(run(&["jobs"], &mut env).1, "[1] PID=4242  sleep 30\n");
    }

    #[test]
    fn test_history_lists_entries() {
        let mut env = new_env();
        env.history.record("ls");
        env.history.record("history");
        let (code, out) = run(&["history"], &mut env);
        assert_eq!(code, Some(0));
        assert_eq!(out, "1 ls\n2 history\n");
    }

    #[test]
    fn test_exit_releases_variables() {
        let mut env = new_env();
        env.variables.set("A", "1").unwrap();
        assert_eq!(run(&["exit", "3"], &mut env).0, Some(0));
        assert!(env.should_exit);
        assert!(env.variables.is_empty());
    }

    #[test]
    fn test_help_flag_prints_usage() {
        let mut env = new_env();
        let (code, out) = run(&["cd", "--help"], &mut env);
        assert_eq!(code, Some(0));
        assert!(out.contains("Usage: cd"));
    }

    #[test]
    fn test_unexpected_argument_is_usage_error() {
        let mut env = new_env();
        assert_eq!(run(&["jobs", "extra"], &mut env).0, Some(1));
    }
}
