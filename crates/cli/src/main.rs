// groupsync CLI - create, update and delete static groups from a CSV file

mod config_file;
mod connection;
mod exit_codes;
mod export;
mod logging;
mod login;
mod sync;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use groupsync_recon::{DirectoryError, SyncError};

use exit_codes::{directory_exit_code, sync_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "groupsync")]
#[command(about = "Create, update and delete static groups from a CSV file")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile directory groups with the groups derived from a CSV file
    #[command(after_help = "\
Examples:
  groupsync sync hosts.csv --dry-run
  groupsync sync hosts.csv --group-columns Site,Tier --group-prefix APP
  groupsync sync hosts.csv --no-remove --case-insensitive
  groupsync sync retired.csv --delete --json --output report.json
  groupsync sync hosts.csv --config sync.json -t turbo.example.com -u admin

Exit codes:
  0   completed (per-group errors are reported, not fatal)
  3   input CSV unreadable or missing a column
  4   config file invalid
  5   --strict and at least one error was recorded
  40  not authenticated
  41  directory unreachable")]
    Sync(sync::SyncArgs),

    /// Write existing directory groups and their members to a CSV file
    #[command(after_help = "\
Examples:
  groupsync export groups.csv
  groupsync export all-groups.csv --all-groups --include-group-type

To sync an exported file back, group on the group name column only:
  groupsync sync groups.csv --group-columns \"Group Name\"")]
    Export(export::ExportArgs),

    /// Check a CSV file and preview the groups it derives (no directory calls)
    #[command(after_help = "\
Examples:
  groupsync validate hosts.csv
  groupsync validate hosts.csv --group-columns Site --json")]
    Validate(sync::ValidateArgs),

    /// Verify directory credentials and save them for later runs
    #[command(after_help = "\
Examples:
  GROUPSYNC_PASSWORD=... groupsync login -t turbo.example.com -u admin
  groupsync login -t https://10.0.0.5 --encoded-creds YWRtaW46cHc= --insecure")]
    Login(login::LoginArgs),

    /// Remove saved directory credentials
    Logout,
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  groupsync-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  groupsync-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sync(args) => sync::cmd_sync(args),
        Commands::Export(args) => export::cmd_export(args),
        Commands::Validate(args) => sync::cmd_validate(args),
        Commands::Login(args) => login::cmd_login(args),
        Commands::Logout => login::cmd_logout(),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Directory failure with the matching 40-range exit code.
    pub fn directory(err: DirectoryError) -> Self {
        let hint = connection::directory_hint(&err).map(str::to_string);
        Self { code: directory_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn sync(err: SyncError) -> Self {
        match err {
            SyncError::Directory(e) => Self::directory(e),
            SyncError::MissingColumn { ref column } => {
                let hint = format!("add a '{column}' column, or name the right one with a --*-column flag");
                Self { code: sync_exit_code(&err), message: err.to_string(), hint: Some(hint) }
            }
            other => Self { code: sync_exit_code(&other), message: other.to_string(), hint: None },
        }
    }
}
