use clap::Parser;
use mpyfs::cli::Cli;
use mpyfs::commands;
use mpyfs::init_logging;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match commands::run(&cli, &mut out) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if std::env::var("MPY_WORKBENCH_DEBUG").is_ok_and(|v| v == "1") => Err(e),
        Err(e) => {
            eprintln!("{}", commands::guidance(&e));
            Ok(ExitCode::from(commands::exit_code(&e) as u8))
        }
    }
}
