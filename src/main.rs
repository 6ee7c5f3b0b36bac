// LinkTerm - Operator console for remote radio link devices
mod cli;
mod core;
mod domain;
mod infrastructure;

use clap::Parser;
use cli::args::Args;
use cli::commands::execute_command;
use domain::error::LinkTermError;

#[tokio::main]
async fn main() -> Result<(), LinkTermError> {
    let args = Args::parse();

    match execute_command(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
