// login / logout: manage saved directory credentials

use clap::Args;

use groupsync_directory_client::{delete_credentials, save_credentials, DirectoryClient, SavedCredentials};

use crate::connection::{ConnectionArgs, DEFAULT_TARGET};
use crate::exit_codes::EXIT_DIR_NOT_AUTH;
use crate::CliError;

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Verify the credentials against the directory, then save them.
pub fn cmd_login(args: LoginArgs) -> Result<(), CliError> {
    let conn = &args.connection;
    let Some(login) = conn.explicit_login()? else {
        return Err(CliError {
            code: EXIT_DIR_NOT_AUTH,
            message: "no credentials given".to_string(),
            hint: Some(
                "pass --username with GROUPSYNC_PASSWORD set, or --encoded-creds".to_string(),
            ),
        });
    };
    let target = conn.target.clone().unwrap_or_else(|| DEFAULT_TARGET.to_string());

    eprintln!("Verifying credentials against {target}...");
    DirectoryClient::connect(&target, &login, conn.insecure).map_err(CliError::directory)?;

    let saved = SavedCredentials {
        target: target.clone(),
        encoded_creds: login.encode(),
        insecure: conn.insecure,
    };
    let path = save_credentials(&saved).map_err(CliError::error)?;

    eprintln!("Authenticated as {} on {target}", login.username);
    eprintln!("Credentials saved to {}", path.display());
    Ok(())
}

pub fn cmd_logout() -> Result<(), CliError> {
    match delete_credentials() {
        Ok(true) => eprintln!("Logged out. Credentials removed."),
        Ok(false) => eprintln!("Not logged in."),
        Err(e) => return Err(CliError::error(e)),
    }
    Ok(())
}
