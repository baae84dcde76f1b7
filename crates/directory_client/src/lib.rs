//! Inventory directory client.
//!
//! Implements [`groupsync_recon::Directory`] over the directory's v3 REST
//! API: session login, group listing and mutation, entity search.
//!
//! No reconciliation logic. GET requests retry with backoff; mutations are
//! sent once.

mod auth;
mod client;

pub use auth::{
    credentials_file_path, delete_credentials, load_credentials, load_credentials_from,
    save_credentials, save_credentials_to, Login, SavedCredentials,
};
pub use client::{api_base_url, DirectoryClient, MAX_RETRIES};
