//! Command execution
//!
//! Results go to the given writer: listings and reports as JSON, plain
//! tokens for the existence and stat queries, program output verbatim.
//! Diagnostics go to the log.

use crate::cli::{Cli, Command};
use anyhow::{bail, Context};
use mpyfs_communication::{list_ports, BoardFs, ConnectionParams, DeviceClient, SerialPortInfo};
use mpyfs_core::StatOutcome;
use mpyfs_settings::Config;
use std::io::Write;

/// Resolve settings: flags and environment over the config file over defaults
pub fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = Config::load(cli.config.as_deref())
        .context("Could not load configuration")?
        .with_overrides(cli.port.clone(), cli.baud);
    config.validate()?;
    Ok(config)
}

/// Connection descriptor for the configured port
pub fn connection_params(config: &Config) -> anyhow::Result<ConnectionParams> {
    let Some(port) = config.connection.port.clone() else {
        bail!("No serial port given. Use --port, MPY_WORKBENCH_PORT or the config file.");
    };
    Ok(ConnectionParams::new(port)
        .with_baud_rate(config.connection.baud_rate)
        .with_read_timeout(config.read_timeout()))
}

/// Run the parsed command line against real hardware
pub fn run(cli: &Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    if let Command::Devs { boards, json } = &cli.command {
        return write_ports(&list_ports(!boards)?, *json, out);
    }

    let config = resolve_config(cli)?;
    let params = connection_params(&config)?;
    tracing::debug!(
        "Using {} at {} baud",
        params.port,
        params.baud_rate
    );

    let fs = BoardFs::new(DeviceClient::system(params, config.timing()));
    execute(&cli.command, &fs, out)
}

/// Print enumerated ports: names one per line, or every detail as JSON
pub fn write_ports(ports: &[SerialPortInfo], json: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    if json {
        return write_json(out, &ports);
    }
    let names: Vec<&str> = ports.iter().map(|p| p.port_name.as_str()).collect();
    write!(out, "{}", names.join("\n"))?;
    Ok(())
}

fn write_json<T: serde::Serialize>(out: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Run one device command on `fs`
pub fn execute(command: &Command, fs: &BoardFs, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        Command::Devs { .. } => bail!("devs does not use a board connection"),
        Command::Ls { path } => {
            let names = fs.list_names(path)?;
            write!(out, "{}", names.join("\n"))?;
        }
        Command::LsTyped { path } => write_json(out, &fs.list_entries(path)?)?,
        Command::Mkdir { path } => fs.mkdir(path)?,
        Command::Rm { path } => fs.remove(path)?,
        Command::Rmrf { path } => fs.clear_tree(path)?,
        Command::DeleteFile { path } => fs.delete_file(path)?,
        Command::DeleteFolderRecursive { path } => {
            let outcome = fs.delete_folder_recursive(path)?;
            if !outcome.is_clean() {
                tracing::warn!(
                    "Errors deleting folder {}: {}",
                    path,
                    outcome.errors.join("; ")
                );
            }
        }
        Command::FileExists { path } => {
            let token = if fs.exists(path)? { "exists" } else { "not_exists" };
            write!(out, "{}", token)?;
        }
        Command::FileInfo { path } => match fs.stat(path)? {
            StatOutcome::Found(info) => write!(out, "{}", info)?,
            StatOutcome::Missing(message) => write!(out, "error:{}", message)?,
        },
        Command::CpFrom { src, dst } => {
            fs.download_to(src, dst)
                .with_context(|| format!("Could not copy {} from the board", src))?;
        }
        Command::CpTo { src, dst } => {
            fs.upload_file(src, dst)
                .with_context(|| format!("Could not copy {} to the board", src.display()))?;
        }
        Command::UploadReplacing { src, dst } => {
            let data = std::fs::read(src)
                .with_context(|| format!("Could not read {}", src.display()))?;
            fs.upload_replacing(&data, dst)?;
        }
        Command::RunFile { src } => {
            let code = std::fs::read_to_string(src)
                .with_context(|| format!("Could not read {}", src.display()))?;
            let output = fs.run_program(&code)?;
            out.write_all(String::from_utf8_lossy(&output).as_bytes())?;
        }
        Command::Reset => fs.soft_reset()?,
        Command::TreeStats { path } => write_json(out, &fs.tree(path)?)?,
        Command::DeleteAllInPath { path } => write_json(out, &fs.delete_all_in_path(path)?)?,
        Command::DeleteAny { path } => write_json(out, &fs.delete_any(path)?)?,
        Command::WipePath { path } => write_json(out, &fs.wipe_path(path)?)?,
        Command::Mv { src, dst } => fs.rename(src, dst)?,
    }

    out.flush()?;
    Ok(())
}

/// Exit status for a failed command
///
/// Connection and serial I/O failures exit with 2, everything else with 1.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<mpyfs_core::Error>() {
        Some(e) if e.is_connection_error() || e.is_transient() => 2,
        _ => 1,
    }
}

/// One-line message for a failed command
pub fn guidance(err: &anyhow::Error) -> String {
    match err.downcast_ref::<mpyfs_core::Error>() {
        Some(e) => e.guidance(),
        None => format!("{:#}", err),
    }
}
