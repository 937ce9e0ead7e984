//! featgroup - load and evaluate feature tables from the command line.

use anyhow::Result;
use clap::Parser;
use featgroup::cli;
use featgroup::core::user_friendly_error;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute() {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
