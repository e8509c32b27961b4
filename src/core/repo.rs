//! Repository fetcher: clones the companion server on first run and
//! fast-forwards an existing matching checkout on re-runs.

use std::fs;
use std::path::Path;

use tokio::process::Command;
use tracing::debug;

use crate::core::error::SetupError;

/// What the fetch step has to do for the current install directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoDisposition {
    /// Directory absent or empty: full clone.
    Clone,
    /// Existing checkout; origin URL still has to be verified.
    Update,
    /// Directory exists with unrelated contents.
    Conflict,
}

/// Classify the install directory without touching it.
pub fn classify_install_dir(dir: &Path) -> Result<RepoDisposition, SetupError> {
    if !dir.exists() {
        return Ok(RepoDisposition::Clone);
    }

    let mut entries = fs::read_dir(dir).map_err(|err| SetupError::RepositoryFetchFailure {
        detail: format!("cannot read {}: {err}", dir.display()),
    })?;

    if entries.next().is_none() {
        return Ok(RepoDisposition::Clone);
    }

    if dir.join(".git").is_dir() {
        Ok(RepoDisposition::Update)
    } else {
        Ok(RepoDisposition::Conflict)
    }
}

/// Compare remote URLs ignoring a trailing `.git` or slash.
pub fn remote_matches(expected: &str, actual: &str) -> bool {
    normalize_remote(expected) == normalize_remote(actual)
}

fn normalize_remote(url: &str) -> &str {
    url.trim().trim_end_matches('/').trim_end_matches(".git")
}

/// Clone or update the companion repository at `install_dir`.
///
/// A directory holding anything other than a checkout of `repo_url` is
/// surfaced as [`SetupError::RepositoryStateConflict`] and never touched.
pub async fn ensure_repo(install_dir: &Path, repo_url: &str) -> Result<RepoDisposition, SetupError> {
    let disposition = classify_install_dir(install_dir)?;
    debug!(dir = %install_dir.display(), ?disposition, "repository fetch");

    match disposition {
        RepoDisposition::Clone => {
            if let Some(parent) = install_dir.parent() {
                fs::create_dir_all(parent).map_err(|err| SetupError::RepositoryFetchFailure {
                    detail: format!("cannot create {}: {err}", parent.display()),
                })?;
            }
            run_git(&["clone", repo_url, &install_dir.to_string_lossy()], None).await?;
        }
        RepoDisposition::Update => {
            let origin = git_remote_url(install_dir).await?;
            if !remote_matches(repo_url, &origin) {
                return Err(SetupError::RepositoryStateConflict {
                    dir: install_dir.to_path_buf(),
                    detail: format!(
                        "checkout tracks {origin}, expected {repo_url}"
                    ),
                });
            }
            run_git(&["pull", "--ff-only"], Some(install_dir)).await?;
        }
        RepoDisposition::Conflict => {
            return Err(SetupError::RepositoryStateConflict {
                dir: install_dir.to_path_buf(),
                detail: "directory exists and is not a git checkout".to_string(),
            });
        }
    }

    Ok(disposition)
}

async fn git_remote_url(checkout: &Path) -> Result<String, SetupError> {
    let output = Command::new("git")
        .args(["remote", "get-url", "origin"])
        .current_dir(checkout)
        .output()
        .await
        .map_err(|err| SetupError::RepositoryFetchFailure {
            detail: format!("failed to run git: {err}"),
        })?;

    if !output.status.success() {
        return Err(SetupError::RepositoryStateConflict {
            dir: checkout.to_path_buf(),
            detail: format!(
                "checkout has no usable origin remote: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run git with inherited stdio so the user sees clone/pull progress.
async fn run_git(args: &[&str], cwd: Option<&Path>) -> Result<(), SetupError> {
    let mut command = Command::new("git");
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let status = command
        .status()
        .await
        .map_err(|err| SetupError::RepositoryFetchFailure {
            detail: format!("failed to run git: {err}"),
        })?;

    if !status.success() {
        return Err(SetupError::RepositoryFetchFailure {
            detail: format!("git {} exited with {status}", args.join(" ")),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dir_means_clone() {
        let base = tempfile::tempdir().unwrap();
        let target = base.path().join("does-not-exist");
        assert_eq!(
            classify_install_dir(&target).unwrap(),
            RepoDisposition::Clone
        );
    }

    #[test]
    fn test_empty_dir_means_clone() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            classify_install_dir(dir.path()).unwrap(),
            RepoDisposition::Clone
        );
    }

    #[test]
    fn test_checkout_means_update() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        assert_eq!(
            classify_install_dir(dir.path()).unwrap(),
            RepoDisposition::Update
        );
    }

    #[test]
    fn test_unrelated_contents_mean_conflict() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        assert_eq!(
            classify_install_dir(dir.path()).unwrap(),
            RepoDisposition::Conflict
        );
    }

    #[test]
    fn test_remote_matching_ignores_suffixes() {
        let canonical = "https://github.com/theagilepadawan/strava-mcp.git";
        assert!(remote_matches(
            canonical,
            "https://github.com/theagilepadawan/strava-mcp"
        ));
        assert!(remote_matches(
            canonical,
            "https://github.com/theagilepadawan/strava-mcp.git\n"
        ));
        assert!(!remote_matches(
            canonical,
            "https://github.com/someone-else/strava-mcp.git"
        ));
    }

    #[tokio::test]
    async fn test_conflicting_dir_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("precious.txt");
        fs::write(&marker, "do not delete").unwrap();

        let result = ensure_repo(dir.path(), "https://example.com/repo.git").await;
        assert!(matches!(
            result,
            Err(SetupError::RepositoryStateConflict { .. })
        ));
        assert_eq!(fs::read_to_string(&marker).unwrap(), "do not delete");
    }
}
