// sync and validate commands

use std::path::{Path, PathBuf};

use clap::Args;

use groupsync_recon::config::{DEFAULT_ENTITY_NAME_COLUMN, DEFAULT_ENTITY_TYPE_COLUMN};
use groupsync_recon::grouper::DEFAULT_DELIMITER;
use groupsync_recon::tracker::ChangeEvent;
use groupsync_recon::{
    load_csv_rows, ChangeCategory, ChangeTracker, ReportOptions, RowSet, SyncConfig, SyncReport,
};

use crate::config_file::FileOverrides;
use crate::connection::ConnectionArgs;
use crate::exit_codes::EXIT_SYNC_ERRORS;
use crate::{logging, CliError};

/// Categories left out of the summary's total.
const SUMMARY_IGNORE: &[ChangeCategory] = &[ChangeCategory::MissingEntity];

/// Column roles and group naming, shared by `sync` and `validate`.
#[derive(Args, Debug, Clone)]
pub struct GroupingArgs {
    /// Column holding each row's entity type
    #[arg(long, default_value = DEFAULT_ENTITY_TYPE_COLUMN)]
    pub entity_type_column: String,

    /// Column holding each row's entity name
    #[arg(long, default_value = DEFAULT_ENTITY_NAME_COLUMN)]
    pub entity_name_column: String,

    /// Grouping column, in key order (repeatable, or comma-separated).
    /// Default: every other column, left to right
    #[arg(long = "group-columns", alias = "group-headers", value_delimiter = ',')]
    pub group_columns: Vec<String>,

    /// String placed between grouping values in a group name
    #[arg(long, default_value = DEFAULT_DELIMITER)]
    pub group_delimiter: String,

    /// Fixed first segment of every group name
    #[arg(long)]
    pub group_prefix: Option<String>,

    /// Match entity names without case sensitivity
    #[arg(long)]
    pub case_insensitive: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Input CSV file
    pub input: PathBuf,

    #[command(flatten)]
    pub grouping: GroupingArgs,

    /// Never add members to existing groups (remove only)
    #[arg(long)]
    pub no_add: bool,

    /// Never remove members from existing groups (add only)
    #[arg(long)]
    pub no_remove: bool,

    /// Delete every group named by the input instead of syncing it
    #[arg(long)]
    pub delete: bool,

    /// Prefer the single ACTIVE entity when a name matches several
    #[arg(long)]
    pub active_only: bool,

    /// Fill each group with the entities of its type NOT listed for it
    #[arg(long)]
    pub complement: bool,

    /// Report what would change without writing to the directory
    #[arg(long, alias = "dryrun")]
    pub dry_run: bool,

    /// Only print errors
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Do not print missing-entity warnings
    #[arg(long)]
    pub no_warn: bool,

    /// Append diagnostic logs to this file
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Write the JSON run report to this file
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Exit 5 if any group recorded an error
    #[arg(long)]
    pub strict: bool,

    /// JSON or TOML file whose values override these flags
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Input CSV file
    pub input: PathBuf,

    #[command(flatten)]
    pub grouping: GroupingArgs,

    /// Print the derived groups as JSON
    #[arg(long)]
    pub json: bool,

    /// JSON or TOML file whose grouping values override these flags
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl GroupingArgs {
    fn apply_to(&self, config: &mut SyncConfig) {
        config.entity_type_column = self.entity_type_column.clone();
        config.entity_name_column = self.entity_name_column.clone();
        config.group_columns = self.group_columns.clone();
        config.group_delimiter = self.group_delimiter.clone();
        config.group_prefix = self.group_prefix.clone().filter(|p| !p.is_empty());
        config.case_sensitive = !self.case_insensitive;
    }
}

impl SyncArgs {
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig {
            allow_add: !self.no_add,
            allow_remove: !self.no_remove,
            delete: self.delete,
            dry_run: self.dry_run,
            active_only: self.active_only,
            complement: self.complement,
            ..SyncConfig::default()
        };
        self.grouping.apply_to(&mut config);
        config
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions { quiet: self.quiet, warnings: !self.no_warn }
    }

    /// JSON report goes to stdout, so human output moves to stderr.
    fn json_on_stdout(&self) -> bool {
        self.json && self.output.is_none()
    }
}

fn read_rows(path: &Path) -> Result<RowSet, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::args(format!("cannot read {}: {e}", path.display())))?;
    let rows = load_csv_rows(&text).map_err(CliError::sync)?;
    log::info!("read {} row(s) from {}", rows.len(), path.display());
    Ok(rows)
}

/// One console line per forwarded change event.
fn format_event(event: &ChangeEvent) -> String {
    match event.category {
        ChangeCategory::MissingEntity => format!("Warning: {}", event.message),
        _ => event.message.clone(),
    }
}

// ============================================================================
// sync
// ============================================================================

pub fn cmd_sync(mut args: SyncArgs) -> Result<(), CliError> {
    if let Some(path) = args.config.clone() {
        FileOverrides::load(&path)?.apply(&mut args);
    }
    logging::init(args.log.as_deref()).map_err(CliError::args)?;

    let rows = read_rows(&args.input)?;
    let config = args.sync_config();

    // Schema problems surface before any login attempt.
    groupsync_recon::preview(&rows, &config).map_err(CliError::sync)?;

    let client = args.connection.connect()?;

    let to_stderr = args.json_on_stdout();
    let mut tracker = ChangeTracker::new(args.report_options()).with_observer(move |event| {
        let line = format_event(event);
        if to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    });

    let report = groupsync_recon::run(&client, &rows, &config, &mut tracker).map_err(CliError::sync)?;
    log::info!(
        "sync finished: {} group(s), {} change(s)",
        report.meta.groups,
        report.changes.total_changes(SUMMARY_IGNORE)
    );

    emit_report(&args, &report)?;

    if args.strict && report.changes.has_errors() {
        let errors = report.changes.total(ChangeCategory::Error);
        return Err(CliError {
            code: EXIT_SYNC_ERRORS,
            message: format!("{errors} error(s) recorded"),
            hint: Some("see the Errors lines above, or the JSON report".to_string()),
        });
    }
    Ok(())
}

fn emit_report(args: &SyncArgs, report: &SyncReport) -> Result<(), CliError> {
    let summary = report.changes.summary_text(report.meta.dry_run, SUMMARY_IGNORE);
    if !args.quiet {
        if args.json_on_stdout() {
            eprintln!("{summary}");
        } else {
            println!("{summary}");
        }
    }

    if !args.json && args.output.is_none() {
        return Ok(());
    }
    let json = serde_json::to_string_pretty(report).map_err(|e| CliError::error(e.to_string()))?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .map_err(|e| CliError::args(format!("cannot write {}: {e}", path.display())))?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(mut args: ValidateArgs) -> Result<(), CliError> {
    if let Some(path) = args.config.clone() {
        FileOverrides::load(&path)?.apply_grouping(&mut args.grouping);
    }
    logging::init(None).map_err(CliError::args)?;

    let rows = read_rows(&args.input)?;
    let mut config = SyncConfig::default();
    args.grouping.apply_to(&mut config);
    let groups = groupsync_recon::preview(&rows, &config).map_err(CliError::sync)?;

    if args.json {
        let json = serde_json::to_string_pretty(&groups).map_err(|e| CliError::error(e.to_string()))?;
        println!("{json}");
        return Ok(());
    }

    for group in &groups {
        println!(
            "{} ({}): {} member(s)",
            group.name,
            group.entity_type,
            group.members.len()
        );
    }
    println!("{} group(s) from {} row(s)", groups.len(), rows.len());
    Ok(())
}
