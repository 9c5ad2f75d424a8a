use std::fmt;

/// Conventional status type used by the statement driver.
///
/// `0..=255` mirrors a process exit status; `-1` marks a statement that failed
/// before anything could run (parse error, pipe or fork failure).
pub type ExitCode = i32;

/// Status reported for statements that failed inside the shell itself.
pub const STATUS_ERROR: ExitCode = -1;

/// One pipeline stage: a program with its arguments and optional redirections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// `argv[0]` is the program; never empty once produced by the parser.
    pub argv: Vec<String>,
    /// Path opened read-only in place of stdin (`< path`).
    pub input: Option<String>,
    /// Path created/truncated in place of stdout (`> path`).
    pub output: Option<String>,
}

impl Command {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            input: None,
            output: None,
        }
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv.join(" "))?;
        if let Some(input) = &self.input {
            write!(f, " < {input}")?;
        }
        if let Some(output) = &self.output {
            write!(f, " > {output}")?;
        }
        Ok(())
    }
}

/// Stages connected left to right: stage `i` writes into stage `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Command>,
}

impl Pipeline {
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{stage}")?;
        }
        Ok(())
    }
}
