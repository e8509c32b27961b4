//! Installation state, computed once at the start of a run and threaded
//! through the steps instead of re-probing the filesystem ad hoc.

use std::path::Path;

use tracing::debug;

use crate::core::repo::{classify_install_dir, RepoDisposition};
use crate::core::tokens::{StoredCredentials, TokenStore};
use crate::core::venv;

#[derive(Debug)]
pub struct InstallationState {
    /// What the fetch step would have to do for the install directory.
    pub repo: RepoDisposition,
    /// Whether the venv already has an interpreter.
    pub venv_ready: bool,
    /// Credentials persisted by a prior successful run, if any.
    pub stored: Option<StoredCredentials>,
}

impl InstallationState {
    pub fn detect(install_dir: &Path) -> Self {
        let repo = classify_install_dir(install_dir).unwrap_or(RepoDisposition::Conflict);
        let venv_ready = venv::venv_ready(install_dir);
        let stored = TokenStore::new(install_dir).load();

        let state = Self {
            repo,
            venv_ready,
            stored,
        };
        debug!(
            dir = %install_dir.display(),
            repo = ?state.repo,
            venv_ready = state.venv_ready,
            has_tokens = state.stored.is_some(),
            "installation state"
        );
        state
    }

    /// True when clone, venv, and tokens are all in place.
    pub fn fully_installed(&self) -> bool {
        self.repo == RepoDisposition::Update && self.venv_ready && self.stored.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokens::TokenStore;
    use std::fs;

    #[test]
    fn test_fresh_directory_has_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = InstallationState::detect(dir.path());
        assert_eq!(state.repo, RepoDisposition::Clone);
        assert!(!state.venv_ready);
        assert!(state.stored.is_none());
        assert!(!state.fully_installed());
    }

    #[cfg(unix)]
    #[test]
    fn test_completed_install_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let bin = dir.path().join("venv").join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("python"), "").unwrap();
        TokenStore::new(dir.path())
            .save(&StoredCredentials {
                client_id: "26565".to_string(),
                client_secret: "s".to_string(),
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                expires_at: 0,
            })
            .unwrap();

        let state = InstallationState::detect(dir.path());
        assert_eq!(state.repo, RepoDisposition::Update);
        assert!(state.venv_ready);
        assert!(state.stored.is_some());
        assert!(state.fully_installed());
    }
}
