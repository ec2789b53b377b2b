mod cli;

use colored::Colorize;
use std::process::ExitCode;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            if let Some(help) = err.help() {
                eprintln!("{}", help);
            }
            ExitCode::FAILURE
        }
    }
}
