use serde::{Deserialize, Serialize};

use crate::diff::MembershipPolicy;
use crate::error::SyncError;
use crate::grouper::{GroupingSpec, DEFAULT_DELIMITER};
use crate::reconcile::ReconcileOptions;

pub const DEFAULT_ENTITY_TYPE_COLUMN: &str = "Entity Type";
pub const DEFAULT_ENTITY_NAME_COLUMN: &str = "Entity Name";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything one sync run needs besides the input rows and the directory.
///
/// Every field has a default, so an empty document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub entity_type_column: String,
    pub entity_name_column: String,
    /// Ordered grouping columns. Empty means every column except the entity
    /// type and name columns, left to right.
    #[serde(alias = "group_headers")]
    pub group_columns: Vec<String>,
    pub group_delimiter: String,
    pub group_prefix: Option<String>,

    pub allow_add: bool,
    pub allow_remove: bool,
    /// Delete every listed group instead of creating / updating.
    pub delete: bool,
    #[serde(alias = "dryrun")]
    pub dry_run: bool,
    pub case_sensitive: bool,
    pub active_only: bool,
    /// Replace each group's members with every other entity of its type.
    pub complement: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            entity_type_column: DEFAULT_ENTITY_TYPE_COLUMN.to_string(),
            entity_name_column: DEFAULT_ENTITY_NAME_COLUMN.to_string(),
            group_columns: Vec::new(),
            group_delimiter: DEFAULT_DELIMITER.to_string(),
            group_prefix: None,
            allow_add: true,
            allow_remove: true,
            delete: false,
            dry_run: false,
            case_sensitive: true,
            active_only: false,
            complement: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl SyncConfig {
    pub fn from_toml(input: &str) -> Result<Self, SyncError> {
        let config: SyncConfig =
            toml::from_str(input).map_err(|e| SyncError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(input: &str) -> Result<Self, SyncError> {
        let config: SyncConfig =
            serde_json::from_str(input).map_err(|e| SyncError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.entity_type_column.trim().is_empty() {
            return Err(SyncError::ConfigValidation(
                "entity_type_column must not be empty".into(),
            ));
        }
        if self.entity_name_column.trim().is_empty() {
            return Err(SyncError::ConfigValidation(
                "entity_name_column must not be empty".into(),
            ));
        }
        if self.entity_type_column == self.entity_name_column {
            return Err(SyncError::ConfigValidation(format!(
                "entity type and entity name both use column '{}'",
                self.entity_type_column
            )));
        }

        for (i, column) in self.group_columns.iter().enumerate() {
            if column.is_empty() {
                return Err(SyncError::ConfigValidation(
                    "group_columns contains an empty column name".into(),
                ));
            }
            if self.group_columns[..i].contains(column) {
                return Err(SyncError::ConfigValidation(format!(
                    "group column '{column}' listed more than once"
                )));
            }
        }

        if self.delete && self.complement {
            return Err(SyncError::ConfigValidation(
                "complement cannot be combined with delete".into(),
            ));
        }

        Ok(())
    }

    pub fn grouping_spec(&self) -> GroupingSpec {
        GroupingSpec::new(&self.entity_type_column, &self.entity_name_column)
            .with_grouping_columns(self.group_columns.iter().cloned())
            .with_delimiter(&self.group_delimiter)
            .with_prefix(self.group_prefix.clone().unwrap_or_default())
    }

    pub fn policy(&self) -> MembershipPolicy {
        MembershipPolicy {
            allow_add: self.allow_add,
            allow_remove: self.allow_remove,
        }
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            policy: self.policy(),
            delete_mode: self.delete,
            dry_run: self.dry_run,
            active_only: self.active_only,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_documents_use_defaults() {
        assert_eq!(SyncConfig::from_toml("").unwrap(), SyncConfig::default());
        assert_eq!(SyncConfig::from_json("{}").unwrap(), SyncConfig::default());
    }

    #[test]
    fn parse_toml() {
        let config = SyncConfig::from_toml(
            r#"
group_columns = ["Site", "Tier"]
group_delimiter = "-"
group_prefix = "APP"
allow_remove = false
dry_run = true
case_sensitive = false
"#,
        )
        .unwrap();
        assert_eq!(config.group_columns, vec!["Site", "Tier"]);
        assert_eq!(config.group_delimiter, "-");
        assert!(config.dry_run);
        assert_eq!(
            config.policy(),
            MembershipPolicy { allow_add: true, allow_remove: false }
        );
        assert!(!config.reconcile_options().delete_mode);
    }

    #[test]
    fn parse_json_with_legacy_keys() {
        let config =
            SyncConfig::from_json(r#"{"group_headers": ["Site"], "dryrun": true}"#).unwrap();
        assert_eq!(config.group_columns, vec!["Site"]);
        assert!(config.dry_run);
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = SyncConfig::from_json(r#"{"groop_columns": []}"#).unwrap_err();
        assert!(matches!(err, SyncError::ConfigParse(_)));
    }

    #[test]
    fn validation_errors() {
        let err = SyncConfig::from_toml(r#"entity_name_column = "Entity Type""#).unwrap_err();
        assert!(matches!(err, SyncError::ConfigValidation(_)));

        let err = SyncConfig::from_toml(r#"group_columns = ["Site", "Site"]"#).unwrap_err();
        assert!(err.to_string().contains("more than once"));

        let err = SyncConfig::from_toml("delete = true\ncomplement = true").unwrap_err();
        assert!(matches!(err, SyncError::ConfigValidation(_)));
    }

    #[test]
    fn grouping_spec_carries_naming_rules() {
        let config = SyncConfig {
            group_prefix: Some("APP".into()),
            group_delimiter: "-".into(),
            ..Default::default()
        };
        let spec = config.grouping_spec();
        assert_eq!(spec.prefix, "APP");
        assert_eq!(spec.delimiter, "-");
        assert_eq!(spec.entity_type_column, DEFAULT_ENTITY_TYPE_COLUMN);
    }
}
