use std::process::ExitCode;

use clap::Parser;

use webrag_cli::cli::Cli;
use webrag_cli::{describe, logging, run, settings};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = settings(&cli).and_then(|settings| {
        logging::init(&settings.logging.level);
        run(&cli, &settings)
    });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", describe(&e));
            ExitCode::FAILURE
        }
    }
}
