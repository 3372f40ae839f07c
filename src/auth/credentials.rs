use keyring::{Entry, Error as KeyringError};
use log::debug;

use crate::error::{Error, Result};

const SERVICE: &str = "rs_mail_fetch";
pub const PASSWORD_ENV: &str = "IMAP_PASS";

fn entry(user: &str) -> Result<Entry> {
    Entry::new(SERVICE, user).map_err(|e| Error::Credentials(e.to_string()))
}

/// Save the IMAP password into the OS keyring for the given user
pub fn save_password(user: &str, password: &str) -> Result<()> {
    entry(user)?
        .set_password(password)
        .map_err(|e| Error::Credentials(e.to_string()))
}

/// Load the IMAP password from the keyring for the given user
pub fn load_password(user: &str) -> Result<Option<String>> {
    match entry(user)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(Error::Credentials(e.to_string())),
    }
}

/// Keyring first, then `env`. A keyring that cannot be reached at all is
/// treated like an empty one so headless hosts can still use the env var.
pub fn resolve_password_with(
    user: &str,
    keyring: impl FnOnce(&str) -> Result<Option<String>>,
    env: impl FnOnce(&str) -> Option<String>,
) -> Result<String> {
    match keyring(user) {
        Ok(Some(password)) => return Ok(password),
        Ok(None) => debug!("no keyring entry for {user}"),
        Err(e) => debug!("keyring unavailable: {e}"),
    }
    env(PASSWORD_ENV)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            Error::Credentials(format!(
                "no password for {user}: run `set-password --user {user}` or set {PASSWORD_ENV}"
            ))
        })
}

pub fn resolve_password(user: &str) -> Result<String> {
    resolve_password_with(user, load_password, |key| std::env::var(key).ok())
}
