use clap::Parser;
use std::process::ExitCode;

use cli_interface::{exit_code, Cli};
use scli::Scli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match Scli::new(&cli.global) {
        Ok(app) => app.run(cli.command).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => ExitCode::from(outcome.exit_code() as u8),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e) as u8)
        }
    }
}
