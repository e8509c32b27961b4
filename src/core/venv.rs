//! Environment provisioner: a virtual environment inside the install
//! directory holding the companion server's Python dependencies.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::core::error::SetupError;
use crate::core::probe::find_python;

pub fn venv_dir(install_dir: &Path) -> PathBuf {
    install_dir.join("venv")
}

/// Interpreter inside an existing venv.
pub fn venv_python(install_dir: &Path) -> PathBuf {
    let venv = venv_dir(install_dir);
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}

pub fn venv_ready(install_dir: &Path) -> bool {
    venv_python(install_dir).exists()
}

/// Create the venv if absent and (re-)install the manifest's dependencies.
///
/// Idempotent: an existing venv is reused and its dependencies re-synced.
/// Returns the path of the venv's interpreter.
pub async fn ensure_venv(install_dir: &Path) -> Result<PathBuf, SetupError> {
    let python = venv_python(install_dir);

    if !python.exists() {
        let bootstrap = find_python()?;
        let venv = venv_dir(install_dir);
        debug!(venv = %venv.display(), "creating virtual environment");

        let status = Command::new(&bootstrap)
            .args(["-m", "venv"])
            .arg(&venv)
            .current_dir(install_dir)
            .status()
            .await
            .map_err(|err| SetupError::DependencyInstallFailure {
                detail: format!("failed to run {}: {err}", bootstrap.display()),
            })?;

        if !status.success() {
            return Err(SetupError::DependencyInstallFailure {
                detail: format!("python -m venv exited with {status}"),
            });
        }
    }

    // Best effort; an old pip still installs the requirements.
    let upgrade = Command::new(&python)
        .args(["-m", "pip", "install", "--upgrade", "pip"])
        .current_dir(install_dir)
        .output()
        .await;
    if !matches!(&upgrade, Ok(output) if output.status.success()) {
        println!("⚠️  Could not upgrade pip, continuing anyway");
    }

    let requirements = install_dir.join("requirements.txt");
    if !requirements.exists() {
        return Err(SetupError::DependencyInstallFailure {
            detail: format!("{} not found in the checkout", requirements.display()),
        });
    }

    let output = Command::new(&python)
        .args(["-m", "pip", "install", "-r", "requirements.txt"])
        .current_dir(install_dir)
        .output()
        .await
        .map_err(|err| SetupError::DependencyInstallFailure {
            detail: format!("failed to run pip: {err}"),
        })?;

    if !output.status.success() {
        return Err(SetupError::DependencyInstallFailure {
            detail: format!(
                "pip install exited with {}\n{}{}",
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            ),
        });
    }

    Ok(python)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venv_python_layout_per_platform() {
        let install = Path::new("/opt/strava-mcp");
        let python = venv_python(install);
        if cfg!(windows) {
            assert!(python.ends_with("Scripts/python.exe"));
        } else {
            assert!(python.ends_with("venv/bin/python"));
        }
        assert!(python.starts_with(install));
    }

    #[test]
    fn test_venv_not_ready_for_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!venv_ready(dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_venv_ready_once_interpreter_exists() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("venv").join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("python"), "").unwrap();
        assert!(venv_ready(dir.path()));
    }
}
