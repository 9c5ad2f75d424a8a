//! A small interactive command shell.
//!
//! The crate reads a line, interprets a deliberately small shell syntax and
//! drives child processes to realise it:
//!
//! - `;` sequencing, a trailing `&` for background execution, `NAME=value`
//!   assignments and `$NAME` / `${NAME}` expansion;
//! - pipelines joined with `|`, with `<` / `>` redirection per stage;
//! - `if` / `then` / `else` / `fi` blocks collected across several lines;
//! - `!N` history recall and the builtins `cd`, `exit`, `help`, `jobs`,
//!   `history` and `set`.
//!
//! The main entry point is [`Interpreter`], which owns the session state
//! ([`env::Environment`]) and runs lines read from any [`io_adapters::LineReader`].
//! Pipelines are spawned with `fork`/`exec`; see [`executor`].

mod builtin;
pub mod command;
pub mod config;
pub mod control;
pub mod env;
pub mod executor;
pub mod history;
pub mod io_adapters;
mod interpreter;
pub mod job;
pub mod parser;
pub mod variables;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Assignment, Interpreter, parse_assignment, split_background};
pub use builtin::Builtins;
