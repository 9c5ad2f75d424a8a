//! Collection of `if / then / else / fi` blocks from interactive input.
//!
//! Collection only gathers text; evaluating the condition and running the
//! chosen block is up to the caller (see `Interpreter::run_if_block`).

use crate::config::CONTINUATION_PROMPT;
use crate::io_adapters::LineReader;
use std::fmt;
use thiserror::Error;

const KEYWORD_IF: &str = "if";
const KEYWORD_THEN: &str = "then";
const KEYWORD_ELSE: &str = "else";
const KEYWORD_FI: &str = "fi";

/// Where collection was when input ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CollectCondition,
    AwaitThen,
    CollectThenBlock,
    CollectElseBlock,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::CollectCondition => "while reading condition",
            Phase::AwaitThen => "waiting for 'then'",
            Phase::CollectThenBlock => "in then-block",
            Phase::CollectElseBlock => "in else-block",
        })
    }
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Unexpected EOF {0}")]
    UnexpectedEof(Phase),
    #[error("input error: {0:#}")]
    Input(anyhow::Error),
}

/// Lines of one branch, in the order they were typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    lines: Vec<String>,
}

impl Block {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// The block as newline-joined text, the form in which it is run.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// A fully collected conditional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfBlock {
    pub condition: String,
    pub then_block: Block,
    pub else_block: Option<Block>,
}

/// True when the first whitespace-separated word of `line` is exactly `if`.
pub fn starts_if_block(line: &str) -> bool {
    line.split_whitespace().next() == Some(KEYWORD_IF)
}

fn is_keyword(line: &str, keyword: &str) -> bool {
    line.trim().eq_ignore_ascii_case(keyword)
}

fn next_line(input: &mut dyn LineReader, phase: Phase) -> Result<String, ControlError> {
    input
        .read_line(CONTINUATION_PROMPT)
        .map_err(ControlError::Input)?
        .ok_or(ControlError::UnexpectedEof(phase))
}

/// Collect the rest of an `if` construct whose first line is `first_line`.
///
/// The condition is the text after `if` on the same line, or else the next
/// non-empty line. Lines before `then` are ignored; keywords match
/// case-insensitively on trimmed lines.
pub fn collect_if_block(first_line: &str, input: &mut dyn LineReader) -> Result<IfBlock, ControlError> {
    let after_if = first_line
        .trim_start()
        .strip_prefix(KEYWORD_IF)
        .unwrap_or_default()
        .trim();

    let condition = if after_if.is_empty() {
        loop {
            let line = next_line(input, Phase::CollectCondition)?;
            if !line.trim().is_empty() {
                break line.trim().to_string();
            }
        }
    } else {
        after_if.to_string()
    };

    while !is_keyword(&next_line(input, Phase::AwaitThen)?, KEYWORD_THEN) {}

    let mut then_block = Block::default();
    let mut saw_else = false;
    loop {
        let line = next_line(input, Phase::CollectThenBlock)?;
        if is_keyword(&line, KEYWORD_ELSE) {
            saw_else = true;
            break;
        }
        if is_keyword(&line, KEYWORD_FI) {
            break;
        }
        then_block.push(line);
    }

    let else_block = if saw_else {
        let mut block = Block::default();
        loop {
            let line = next_line(input, Phase::CollectElseBlock)?;
            if is_keyword(&line, KEYWORD_FI) {
                break;
            }
            block.push(line);
        }
        Some(block)
    } else {
        None
    };

    Ok(IfBlock {
        condition,
        then_block,
        else_block,
    })
}
