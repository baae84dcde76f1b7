//! Credential handling.
//!
//! Saved credentials live in `~/.config/groupsync/credentials.json` (0600 on
//! Unix). The password is never stored in clear; the file carries the same
//! base64 `user:password` form accepted by `--encoded-creds`.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use groupsync_recon::DirectoryError;

/// Username + password for the directory's form login.
#[derive(Clone, PartialEq, Eq)]
pub struct Login {
    pub username: String,
    pub password: String,
}

impl Login {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    /// Decode base64 `user:password`.
    pub fn from_encoded(encoded: &str) -> Result<Self, DirectoryError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| DirectoryError::NotAuthenticated(format!("invalid encoded credentials: {e}")))?;
        let text = String::from_utf8(bytes).map_err(|_| {
            DirectoryError::NotAuthenticated("encoded credentials are not valid UTF-8".into())
        })?;
        let (username, password) = text.split_once(':').ok_or_else(|| {
            DirectoryError::NotAuthenticated("encoded credentials must be user:password".into())
        })?;
        if username.is_empty() {
            return Err(DirectoryError::NotAuthenticated("encoded credentials have no username".into()));
        }
        Ok(Self::new(username, password))
    }

    pub fn encode(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.username, self.password))
    }
}

impl std::fmt::Debug for Login {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credentials stored locally by `groupsync login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCredentials {
    /// Directory host or base URL (e.g. "turbo.example.com")
    pub target: String,
    /// base64 `user:password`
    pub encoded_creds: String,
    /// Skip TLS certificate verification for this target
    #[serde(default)]
    pub insecure: bool,
}

impl SavedCredentials {
    pub fn login(&self) -> Result<Login, DirectoryError> {
        Login::from_encoded(&self.encoded_creds)
    }
}

/// Returns the path to the saved credentials file.
pub fn credentials_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("groupsync/credentials.json"))
}

/// Load saved credentials. `None` if nothing is saved or the file is invalid.
pub fn load_credentials() -> Option<SavedCredentials> {
    load_credentials_from(&credentials_file_path()?)
}

pub fn load_credentials_from(path: &Path) -> Option<SavedCredentials> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(creds) => Some(creds),
        Err(e) => {
            log::warn!("ignoring unreadable credentials file {}: {e}", path.display());
            None
        }
    }
}

/// Save credentials to the default location.
pub fn save_credentials(creds: &SavedCredentials) -> Result<PathBuf, String> {
    let path = credentials_file_path().ok_or("Could not determine config directory")?;
    save_credentials_to(&path, creds)?;
    Ok(path)
}

/// Creates the parent directory if needed. Sets 0600 permissions on Unix.
pub fn save_credentials_to(path: &Path, creds: &SavedCredentials) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {e}"))?;
    }

    let contents = serde_json::to_string_pretty(creds)
        .map_err(|e| format!("Failed to serialize credentials: {e}"))?;
    std::fs::write(path, &contents)
        .map_err(|e| format!("Failed to write credentials file: {e}"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| format!("Failed to set file permissions: {e}"))?;
    }

    Ok(())
}

/// Delete saved credentials. Returns whether a file was removed.
pub fn delete_credentials() -> Result<bool, String> {
    let Some(path) = credentials_file_path() else {
        return Ok(false);
    };
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(&path).map_err(|e| format!("Failed to delete credentials file: {e}"))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_login_roundtrip() {
        let login = Login::new("administrator", "p:ss");
        let encoded = login.encode();
        assert_eq!(Login::from_encoded(&encoded).unwrap(), login);
    }

    #[test]
    fn encoded_login_rejects_garbage() {
        assert!(Login::from_encoded("***").is_err());
        // "nocolon"
        assert!(Login::from_encoded("bm9jb2xvbg==").is_err());
    }

    #[test]
    fn debug_hides_password() {
        let shown = format!("{:?}", Login::new("admin", "hunter2"));
        assert!(shown.contains("admin"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn credentials_file_path_is_app_scoped() {
        let path = credentials_file_path().unwrap();
        assert!(path.to_string_lossy().contains("groupsync"));
        assert!(path.to_string_lossy().ends_with("credentials.json"));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/credentials.json");
        let creds = SavedCredentials {
            target: "turbo.example.com".into(),
            encoded_creds: Login::new("admin", "secret").encode(),
            insecure: true,
        };

        save_credentials_to(&path, &creds).unwrap();
        assert_eq!(load_credentials_from(&path), Some(creds.clone()));
        assert_eq!(creds.login().unwrap().password, "secret");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn missing_optional_fields_and_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"target":"t","encoded_creds":"YTpi"}"#).unwrap();
        assert!(!load_credentials_from(&path).unwrap().insecure);

        std::fs::write(&path, "not json").unwrap();
        assert!(load_credentials_from(&path).is_none());
        assert!(load_credentials_from(&dir.path().join("absent.json")).is_none());
    }
}
