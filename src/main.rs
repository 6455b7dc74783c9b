use clap::Parser;
use sb3toc_core::cli::{exit_code, exit_code_table, Args};
use std::process::ExitCode;
use tracing::Level;

fn main() -> ExitCode {
    let args = Args::parse();
    if args.exit_codes {
        print!("{}", exit_code_table());
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    match sb3toc_core::run_cli(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}
