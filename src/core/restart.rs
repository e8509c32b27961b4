//! Optional restart trigger for Claude Desktop. Best-effort: every
//! failure here degrades to a warning, the installation itself is done.

use std::time::Duration;

use tokio::process::Command;

use crate::core::error::SetupError;

/// Terminate and relaunch Claude Desktop for the current platform.
pub async fn restart_claude_desktop() -> Result<(), SetupError> {
    #[cfg(target_os = "macos")]
    {
        let _ = Command::new("pkill").args(["-f", "Claude"]).status().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        let status = Command::new("open")
            .arg("/Applications/Claude.app")
            .status()
            .await
            .map_err(|err| SetupError::RestartFailure {
                detail: err.to_string(),
            })?;
        if !status.success() {
            return Err(SetupError::RestartFailure {
                detail: format!("open /Applications/Claude.app exited with {status}"),
            });
        }
        Ok(())
    }

    #[cfg(target_os = "windows")]
    {
        let _ = Command::new("taskkill")
            .args(["/F", "/IM", "Claude.exe"])
            .status()
            .await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let candidates = [
            directories::BaseDirs::new()
                .map(|base| base.data_local_dir().join("Claude").join("Claude.exe")),
            Some(std::path::PathBuf::from("C:/Program Files/Claude/Claude.exe")),
        ];
        for candidate in candidates.into_iter().flatten() {
            if candidate.exists() {
                Command::new(&candidate)
                    .spawn()
                    .map_err(|err| SetupError::RestartFailure {
                        detail: err.to_string(),
                    })?;
                return Ok(());
            }
        }
        Err(SetupError::RestartFailure {
            detail: "Claude.exe not found in the usual install locations".to_string(),
        })
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        let _ = Command::new("pkill").args(["-f", "claude"]).status().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        Command::new("claude")
            .spawn()
            .map_err(|err| SetupError::RestartFailure {
                detail: err.to_string(),
            })?;
        Ok(())
    }
}
