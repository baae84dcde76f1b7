//! CLI Exit Code Registry
//!
//! Single source of truth for every `groupsync` exit code. Scripts and
//! schedulers branch on these, so treat them as part of the shell contract.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | sync             | Input, config and run outcome codes      |
//! | 40-49   | directory        | Directory auth / transport codes         |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use groupsync_recon::{DirectoryError, SyncError};

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed. Per-group errors do not change this unless
/// `--strict` is given.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable input or output file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Sync (3-9)
// =============================================================================

/// Input CSV could not be parsed, or a required column is missing.
pub const EXIT_INPUT: u8 = 3;

/// Config file could not be parsed or failed validation.
pub const EXIT_CONFIG: u8 = 4;

/// Run completed but recorded Error events (only with `--strict`).
pub const EXIT_SYNC_ERRORS: u8 = 5;

// =============================================================================
// Directory (40-49)
// =============================================================================

/// No credentials available, or the directory rejected them.
pub const EXIT_DIR_NOT_AUTH: u8 = 40;

/// Could not reach the directory (connect, TLS, timeout).
pub const EXIT_DIR_NETWORK: u8 = 41;

/// Directory answered with an unexpected status or an undecodable body.
pub const EXIT_DIR_UPSTREAM: u8 = 42;

/// Directory rejected a request as invalid (400/422) or a lookup missed.
pub const EXIT_DIR_VALIDATION: u8 = 43;

// =============================================================================
// Error mapping
// =============================================================================

pub fn directory_exit_code(err: &DirectoryError) -> u8 {
    match err {
        DirectoryError::NotAuthenticated(_) => EXIT_DIR_NOT_AUTH,
        DirectoryError::Network(_) => EXIT_DIR_NETWORK,
        DirectoryError::Http(..) | DirectoryError::Parse(_) => EXIT_DIR_UPSTREAM,
        DirectoryError::Validation(_) | DirectoryError::NotFound(_) => EXIT_DIR_VALIDATION,
    }
}

pub fn sync_exit_code(err: &SyncError) -> u8 {
    match err {
        SyncError::MissingColumn { .. } | SyncError::Csv(_) => EXIT_INPUT,
        SyncError::ConfigParse(_) | SyncError::ConfigValidation(_) => EXIT_CONFIG,
        SyncError::Directory(e) => directory_exit_code(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_INPUT,
            EXIT_CONFIG,
            EXIT_SYNC_ERRORS,
            EXIT_DIR_NOT_AUTH,
            EXIT_DIR_NETWORK,
            EXIT_DIR_UPSTREAM,
            EXIT_DIR_VALIDATION,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn sync_errors_map_by_kind() {
        let missing = SyncError::MissingColumn { column: "Entity Name".into() };
        assert_eq!(sync_exit_code(&missing), EXIT_INPUT);
        assert_eq!(sync_exit_code(&SyncError::ConfigParse("x".into())), EXIT_CONFIG);
        let offline = SyncError::Directory(DirectoryError::Network("refused".into()));
        assert_eq!(sync_exit_code(&offline), EXIT_DIR_NETWORK);
        let denied = SyncError::Directory(DirectoryError::Http(401, "no".into()));
        assert_eq!(sync_exit_code(&denied), EXIT_DIR_UPSTREAM);
    }
}
