//! `--config` file support.
//!
//! A JSON (or, by `.toml` extension, TOML) document whose keys override the
//! matching command-line flags. Both the flag spelling (`dry_run`) and the
//! older underscore names (`dryrun`, `group_headers`, ...) are accepted. The
//! input path and the config path itself are never taken from the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::exit_codes::EXIT_CONFIG;
use crate::sync::{GroupingArgs, SyncArgs};
use crate::CliError;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileOverrides {
    #[serde(alias = "entity_type_header")]
    pub entity_type_column: Option<String>,
    #[serde(alias = "entity_name_header")]
    pub entity_name_column: Option<String>,
    #[serde(alias = "group_headers")]
    pub group_columns: Option<Vec<String>>,
    pub group_delimiter: Option<String>,
    pub group_prefix: Option<String>,
    pub case_insensitive: Option<bool>,

    pub no_add: Option<bool>,
    pub no_remove: Option<bool>,
    pub delete: Option<bool>,
    pub active_only: Option<bool>,
    pub complement: Option<bool>,
    #[serde(alias = "dryrun")]
    pub dry_run: Option<bool>,

    pub quiet: Option<bool>,
    pub no_warn: Option<bool>,
    pub log: Option<PathBuf>,
    pub json: Option<bool>,
    pub output: Option<PathBuf>,
    pub strict: Option<bool>,

    pub target: Option<String>,
    pub username: Option<String>,
    pub encoded_creds: Option<String>,
    #[serde(alias = "ignore_insecure_warning")]
    pub insecure: Option<bool>,

    // Accepted so older files keep loading; never applied.
    #[serde(rename = "input", alias = "input_csv")]
    _input: Option<serde::de::IgnoredAny>,
    #[serde(rename = "config")]
    _config: Option<serde::de::IgnoredAny>,
}

impl FileOverrides {
    pub fn parse(text: &str, toml_syntax: bool) -> Result<Self, String> {
        if toml_syntax {
            toml::from_str(text).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(text).map_err(|e| e.to_string())
        }
    }

    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|e| CliError {
            code: EXIT_CONFIG,
            message: format!("cannot read config {}: {e}", path.display()),
            hint: None,
        })?;
        let toml_syntax = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let overrides = Self::parse(&text, toml_syntax).map_err(|e| CliError {
            code: EXIT_CONFIG,
            message: format!("invalid config {}: {e}", path.display()),
            hint: None,
        })?;
        log::debug!("loaded overrides from {}", path.display());
        Ok(overrides)
    }

    pub fn apply_grouping(&self, args: &mut GroupingArgs) {
        set(&mut args.entity_type_column, &self.entity_type_column);
        set(&mut args.entity_name_column, &self.entity_name_column);
        set(&mut args.group_columns, &self.group_columns);
        set(&mut args.group_delimiter, &self.group_delimiter);
        set_opt(&mut args.group_prefix, &self.group_prefix);
        set(&mut args.case_insensitive, &self.case_insensitive);
    }

    pub fn apply(&self, args: &mut SyncArgs) {
        self.apply_grouping(&mut args.grouping);

        set(&mut args.no_add, &self.no_add);
        set(&mut args.no_remove, &self.no_remove);
        set(&mut args.delete, &self.delete);
        set(&mut args.active_only, &self.active_only);
        set(&mut args.complement, &self.complement);
        set(&mut args.dry_run, &self.dry_run);

        set(&mut args.quiet, &self.quiet);
        set(&mut args.no_warn, &self.no_warn);
        set_opt(&mut args.log, &self.log);
        set(&mut args.json, &self.json);
        set_opt(&mut args.output, &self.output);
        set(&mut args.strict, &self.strict);

        let conn = &mut args.connection;
        set_opt(&mut conn.target, &self.target);
        set_opt(&mut conn.username, &self.username);
        set_opt(&mut conn.encoded_creds, &self.encoded_creds);
        set(&mut conn.insecure, &self.insecure);
    }
}

fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

fn set_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}
