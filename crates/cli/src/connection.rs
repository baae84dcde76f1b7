// Directory connection flags and credential resolution

use clap::Args;

use groupsync_directory_client::{load_credentials, DirectoryClient, Login, SavedCredentials};
use groupsync_recon::DirectoryError;

use crate::exit_codes::EXIT_DIR_NOT_AUTH;
use crate::CliError;

pub const DEFAULT_TARGET: &str = "localhost";

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Directory host or base URL [default: saved target, else localhost]
    #[arg(long, short = 't', env = "GROUPSYNC_TARGET")]
    pub target: Option<String>,

    /// Username (password is read from GROUPSYNC_PASSWORD)
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    #[arg(long, env = "GROUPSYNC_PASSWORD", hide = true)]
    pub password: Option<String>,

    /// Base64 encoded `user:password`
    #[arg(long, env = "GROUPSYNC_ENCODED_CREDS", hide_env_values = true)]
    pub encoded_creds: Option<String>,

    /// Accept invalid TLS certificates (self-signed appliances)
    #[arg(long, alias = "ignore-insecure-warning")]
    pub insecure: bool,
}

/// Where to connect and as whom.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub target: String,
    pub login: Login,
    pub insecure: bool,
}

impl ConnectionArgs {
    /// Credentials given on the command line or environment, if any.
    pub fn explicit_login(&self) -> Result<Option<Login>, CliError> {
        if let Some(encoded) = &self.encoded_creds {
            return Login::from_encoded(encoded).map(Some).map_err(CliError::directory);
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(Some(Login::new(username, password))),
            (Some(username), None) => Err(CliError {
                code: EXIT_DIR_NOT_AUTH,
                message: format!("no password for user '{username}'"),
                hint: Some("set GROUPSYNC_PASSWORD, or use --encoded-creds".to_string()),
            }),
            (None, _) => Ok(None),
        }
    }

    /// Flags and environment first, then saved credentials.
    pub fn resolve(&self) -> Result<Resolved, CliError> {
        self.resolve_with(load_credentials())
    }

    pub fn resolve_with(&self, saved: Option<SavedCredentials>) -> Result<Resolved, CliError> {
        let target = self
            .target
            .clone()
            .or_else(|| saved.as_ref().map(|s| s.target.clone()))
            .unwrap_or_else(|| DEFAULT_TARGET.to_string());

        if let Some(login) = self.explicit_login()? {
            return Ok(Resolved { target, login, insecure: self.insecure });
        }

        let Some(saved) = saved else {
            return Err(CliError {
                code: EXIT_DIR_NOT_AUTH,
                message: "no directory credentials".to_string(),
                hint: Some(
                    "run `groupsync login`, or pass --username / --encoded-creds".to_string(),
                ),
            });
        };
        // Saved credentials are only ever sent to the target they were saved for.
        if saved.target != target {
            return Err(CliError {
                code: EXIT_DIR_NOT_AUTH,
                message: format!("no credentials for {target} (saved credentials are for {})", saved.target),
                hint: Some(format!("run `groupsync login -t {target}`, or pass --username / --encoded-creds")),
            });
        }
        let insecure = self.insecure || saved.insecure;
        let login = saved.login().map_err(CliError::directory)?;
        Ok(Resolved { target, login, insecure })
    }

    /// Resolve credentials and open a logged-in session.
    pub fn connect(&self) -> Result<DirectoryClient, CliError> {
        let resolved = self.resolve()?;
        log::info!("connecting to {} as {}", resolved.target, resolved.login.username);
        DirectoryClient::connect(&resolved.target, &resolved.login, resolved.insecure)
            .map_err(CliError::directory)
    }
}

pub fn directory_hint(err: &DirectoryError) -> Option<&'static str> {
    match err {
        DirectoryError::NotAuthenticated(_) => {
            Some("check the username and password, or run `groupsync login` again")
        }
        DirectoryError::Network(_) => {
            Some("is the target reachable? use --insecure for self-signed certificates")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(target: &str, insecure: bool) -> SavedCredentials {
        SavedCredentials {
            target: target.to_string(),
            encoded_creds: Login::new("admin", "pw").encode(),
            insecure,
        }
    }

    #[test]
    fn flags_beat_saved_credentials() {
        let args = ConnectionArgs {
            target: Some("turbo.local".into()),
            encoded_creds: Some(Login::new("ops", "secret").encode()),
            ..Default::default()
        };
        let resolved = args.resolve_with(Some(saved("other.local", true))).unwrap();
        assert_eq!(resolved.target, "turbo.local");
        assert_eq!(resolved.login.username, "ops");
        assert!(!resolved.insecure);
    }

    #[test]
    fn saved_credentials_fill_the_gaps() {
        let resolved = ConnectionArgs::default()
            .resolve_with(Some(saved("turbo.local", true)))
            .unwrap();
        assert_eq!(resolved.target, "turbo.local");
        assert_eq!(resolved.login, Login::new("admin", "pw"));
        assert!(resolved.insecure);
    }

    #[test]
    fn saved_credentials_refused_for_other_target() {
        let args = ConnectionArgs { target: Some("elsewhere.example".into()), ..Default::default() };
        let err = args.resolve_with(Some(saved("turbo.local", true))).unwrap_err();
        assert_eq!(err.code, EXIT_DIR_NOT_AUTH);
        assert!(err.message.contains("turbo.local"), "{}", err.message);
        assert!(err.hint.unwrap().contains("groupsync login -t elsewhere.example"));
    }

    #[test]
    fn saved_credentials_match_their_own_target() {
        let args = ConnectionArgs { target: Some("turbo.local".into()), ..Default::default() };
        let resolved = args.resolve_with(Some(saved("turbo.local", false))).unwrap();
        assert_eq!(resolved.login.username, "admin");
        assert!(!resolved.insecure);
    }

    #[test]
    fn username_without_password_is_not_auth() {
        let args = ConnectionArgs { username: Some("ops".into()), ..Default::default() };
        let err = args.resolve_with(None).unwrap_err();
        assert_eq!(err.code, EXIT_DIR_NOT_AUTH);
        assert!(err.hint.unwrap().contains("GROUPSYNC_PASSWORD"));
    }

    #[test]
    fn nothing_available_is_not_auth() {
        let err = ConnectionArgs::default().resolve_with(None).unwrap_err();
        assert_eq!(err.code, EXIT_DIR_NOT_AUTH);
    }

    #[test]
    fn default_target_is_localhost() {
        let args = ConnectionArgs {
            username: Some("ops".into()),
            password: Some("pw".into()),
            ..Default::default()
        };
        assert_eq!(args.resolve_with(None).unwrap().target, DEFAULT_TARGET);
    }
}
