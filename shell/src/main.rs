use anyhow::Result;
use minishell::Interpreter;
use minishell::config::{Args, ShellConfig};
use minishell::io_adapters::EditorInput;

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let config = ShellConfig::from_args(args)?;
    config.init_logging()?;

    let mut shell = Interpreter::new(config);
    let mut input = EditorInput::new(shell.builtins().names())?;
    shell.repl(&mut input)
}
