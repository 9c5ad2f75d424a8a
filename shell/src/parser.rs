use crate::command::{Command, Pipeline};
use crate::config::Limits;
use thiserror::Error;

const PIPE: char = '|';
const REDIRECT_IN: &str = "<";
const REDIRECT_OUT: &str = ">";

/// Errors that can occur while turning a statement into a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The pipeline has more stages than the configured maximum.
    #[error("too many commands in pipeline (max {max})")]
    TooManyStages { max: usize },
    /// A single stage has more words than the configured maximum.
    #[error("too many arguments (max {max})")]
    TooManyArguments { max: usize },
    /// A stage is blank (`a || b`, `| a`, `a |`) or consists only of redirections.
    #[error("empty command in pipeline")]
    EmptyCommand,
    /// A `<` or `>` is the last word of its stage.
    #[error("expected filename after '{operator}'")]
    MissingRedirectTarget { operator: &'static str },
}

/// Accumulates words of one stage while enforcing the argument limit.
struct StageBuilder {
    command: Command,
    max_args: usize,
}

impl StageBuilder {
    fn new(max_args: usize) -> Self {
        Self {
            command: Command::new(Vec::new()),
            max_args,
        }
    }

    fn push_arg(&mut self, word: &str) -> Result<(), ParseError> {
        if self.command.argv.len() >= self.max_args {
            return Err(ParseError::TooManyArguments { max: self.max_args });
        }
        self.command.argv.push(word.to_string());
        Ok(())
    }

    fn build(self) -> Result<Command, ParseError> {
        if self.command.argv.is_empty() {
            return Err(ParseError::EmptyCommand);
        }
        Ok(self.command)
    }
}

/// Parse one stage: whitespace-separated words with `<`/`>` redirections.
///
/// There is no quoting: whitespace is the only word delimiter.
fn parse_stage(text: &str, limits: &Limits) -> Result<Command, ParseError> {
    let mut builder = StageBuilder::new(limits.max_args);
    let mut words = text.split_whitespace();

    while let Some(word) = words.next() {
        match word {
            REDIRECT_IN => {
                let target = words.next().ok_or(ParseError::MissingRedirectTarget {
                    operator: REDIRECT_IN,
                })?;
                builder.command.input = Some(target.to_string());
            }
            REDIRECT_OUT => {
                let target = words.next().ok_or(ParseError::MissingRedirectTarget {
                    operator: REDIRECT_OUT,
                })?;
                builder.command.output = Some(target.to_string());
            }
            _ => builder.push_arg(word)?,
        }
    }

    builder.build()
}

/// Parses a pipeline segment into its ordered stages.
///
/// The segment must already be free of `;`, a trailing `&` and assignment
/// syntax; those are handled by the statement driver.
///
/// # Arguments
///
/// * `segment` - the statement text, e.g. `sort < in.txt | uniq -c > out.txt`.
/// * `limits` - the stage and argument bounds to enforce.
///
/// # Returns
///
/// * `Result<Pipeline, ParseError>` - the stages in execution order, or the
///   first syntax problem encountered.
pub fn parse_pipeline(segment: &str, limits: &Limits) -> Result<Pipeline, ParseError> {
    let mut stages = Vec::new();

    for stage_text in segment.split(PIPE) {
        if stages.len() >= limits.max_stages {
            return Err(ParseError::TooManyStages {
                max: limits.max_stages,
            });
        }
        if stage_text.trim().is_empty() {
            return Err(ParseError::EmptyCommand);
        }
        stages.push(parse_stage(stage_text, limits)?);
    }

    log::debug!("parsed pipeline: {:?}", stages);
    Ok(Pipeline { stages })
}
