mod bindings;
mod cli;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match &cli.command {
        Some(Command::Still(args)) => run::still(&cli, args),
        Some(Command::Outputs) => run::outputs(),
        None => run::run(&cli, &cli.run),
    }
}
