// export command: directory groups -> CSV

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Args;

use groupsync_recon::export::{collect_export_rows, write_export_csv, ExportOptions};

use crate::connection::ConnectionArgs;
use crate::{logging, CliError};

const REIMPORT_NOTE: &str =
    "note: pass --group-columns \"Group Name\" when syncing this file, or the Group Type column becomes part of every group name";

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Output CSV file
    pub out: PathBuf,

    /// Include built-in groups, not only user-created ones
    #[arg(long)]
    pub all_groups: bool,

    /// Add a "Group Type" column (Static / Dynamic)
    #[arg(long)]
    pub include_group_type: bool,

    /// Append diagnostic logs to this file
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

pub fn cmd_export(args: ExportArgs) -> Result<(), CliError> {
    logging::init(args.log.as_deref()).map_err(CliError::args)?;

    let client = args.connection.connect()?;
    let options = ExportOptions {
        all_groups: args.all_groups,
        include_group_type: args.include_group_type,
    };
    let rows = collect_export_rows(&client, options).map_err(CliError::directory)?;

    let file = File::create(&args.out)
        .map_err(|e| CliError::args(format!("cannot create {}: {e}", args.out.display())))?;
    write_export_csv(BufWriter::new(file), &rows, options.include_group_type)
        .map_err(CliError::sync)?;

    eprintln!("wrote {} row(s) to {}", rows.len(), args.out.display());
    if options.include_group_type {
        eprintln!("{}", REIMPORT_NOTE);
    }
    Ok(())
}
