//! Credential persister: one local JSON file under the install directory
//! holding the application credentials and the user's tokens.
//!
//! The file never leaves the machine; its contents are only ever sent to
//! the provider's token endpoint during an exchange.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::core::constants::TOKENS_FILE_NAME;
use crate::core::credentials::AppCredentials;
use crate::core::error::SetupError;
use crate::core::oauth::UserTokens;

/// Everything the token file holds for one installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

impl StoredCredentials {
    pub fn new(app: &AppCredentials, tokens: &UserTokens) -> Self {
        Self {
            client_id: app.client_id.clone(),
            client_secret: app.client_secret.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at,
        }
    }

    pub fn app_credentials(&self) -> AppCredentials {
        AppCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }
}

pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(install_dir: &Path) -> Self {
        Self {
            path: install_dir.join(TOKENS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored credentials from a prior run. An unreadable or
    /// unparseable file counts as absent; re-authorizing replaces it.
    pub fn load(&self) -> Option<StoredCredentials> {
        if !self.path.exists() {
            return None;
        }
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "token file unreadable");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(stored) => Some(stored),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "token file unparseable");
                None
            }
        }
    }

    /// Replace the token file whole, via temp-file-then-rename, with
    /// owner-only permissions where the platform supports them.
    pub fn save(&self, credentials: &StoredCredentials) -> Result<(), SetupError> {
        let persist = |path: &Path| -> Result<(), Box<dyn std::error::Error>> {
            let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
            if let Some(dir) = parent {
                fs::create_dir_all(dir)?;
            }

            let contents = serde_json::to_string_pretty(credentials)?;
            let mut temp_file = match parent {
                Some(dir) => NamedTempFile::new_in(dir)?,
                None => NamedTempFile::new()?,
            };
            temp_file.write_all(contents.as_bytes())?;
            temp_file.as_file_mut().sync_all()?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = temp_file.as_file().metadata()?.permissions();
                perms.set_mode(0o600);
                temp_file.as_file().set_permissions(perms)?;
            }

            temp_file.persist(path)?;
            Ok(())
        };

        persist(&self.path).map_err(|err| SetupError::PersistenceFailure {
            path: self.path.clone(),
            detail: err.to_string(),
        })?;
        debug!(path = %self.path.display(), "token file written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StoredCredentials {
        StoredCredentials {
            client_id: "26565".to_string(),
            client_secret: "top-secret".to_string(),
            access_token: "access-abc".to_string(),
            refresh_token: "refresh-def".to_string(),
            expires_at: 1_924_992_000,
        }
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        store.save(&sample()).unwrap();
        assert_eq!(store.load(), Some(sample()));
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(TokenStore::new(dir.path()).load(), None);
    }

    #[test]
    fn test_load_corrupt_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_save_overwrites_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        store.save(&sample()).unwrap();

        let mut updated = sample();
        updated.access_token = "access-new".to_string();
        store.save(&updated).unwrap();
        assert_eq!(store.load(), Some(updated));
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        store.save(&sample()).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
