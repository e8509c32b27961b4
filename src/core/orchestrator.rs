//! The guided setup run: ordered steps, early exit on the first fatal
//! error, idempotent on re-runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::claude_config::{build_server_entry, claude_config_path, merge_server_entry};
use crate::core::constants::{
    DATABASE_FILE, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_DB_PATH, ENV_REFRESH_TOKEN,
    SERVER_NAME, SYNC_SCRIPT,
};
use crate::core::credentials::collect_app_credentials;
use crate::core::error::SetupError;
use crate::core::oauth::{OauthConfig, OauthFlow, UserTokens};
use crate::core::probe::{probe_tools, REQUIRED_TOOLS};
use crate::core::repo::{ensure_repo, RepoDisposition};
use crate::core::restart::restart_claude_desktop;
use crate::core::state::InstallationState;
use crate::core::tokens::{StoredCredentials, TokenStore};
use crate::core::venv::ensure_venv;
use crate::utils::input::confirm;

pub struct SetupOptions {
    pub install_dir: PathBuf,
    pub repo_url: String,
    pub skip_install: bool,
    pub skip_sync: bool,
    pub no_restart: bool,
    pub reauth: bool,
}

/// Run every setup step top to bottom. Only the restart step may fail
/// without aborting the run.
pub async fn run(options: &SetupOptions) -> Result<(), SetupError> {
    let mut input = io::stdin().lock();
    let mut output = io::stdout();

    println!("🏃 Strava MCP Setup");
    println!("This tool wires the Strava MCP server into Claude Desktop.\n");

    // Step 1: probe before anything on disk is touched.
    probe_tools(REQUIRED_TOOLS)?;

    // Step 2: one state computation, threaded through the rest.
    let state = InstallationState::detect(&options.install_dir);
    println!("📦 Install directory: {}", options.install_dir.display());

    // Steps 3-4: fetch and provision.
    if options.skip_install && state.repo == RepoDisposition::Update && state.venv_ready {
        println!("⏭️  Skipping clone and environment setup (already installed)");
    } else {
        println!("⬇️  Fetching the Strava MCP server...");
        ensure_repo(&options.install_dir, &options.repo_url).await?;

        println!("🐍 Provisioning the Python environment...");
        ensure_venv(&options.install_dir).await?;
    }
    let venv_python = crate::core::venv::venv_python(&options.install_dir);

    // Step 5: application credentials.
    println!("\n🔐 Strava Authentication");
    let stored_app = state.stored.as_ref().map(|stored| stored.app_credentials());
    let app_credentials = collect_app_credentials(stored_app.as_ref(), &mut input, &mut output)
        .map_err(|err| SetupError::InputAborted {
            detail: err.to_string(),
        })?;

    // Step 6: reuse stored tokens when they belong to the same
    // application, otherwise run the browser flow.
    let tokens = match &state.stored {
        Some(stored) if !options.reauth && stored.client_id == app_credentials.client_id => {
            println!("✅ Reusing tokens from the previous authorization");
            UserTokens {
                access_token: stored.access_token.clone(),
                refresh_token: stored.refresh_token.clone(),
                expires_at: stored.expires_at,
            }
        }
        _ => {
            println!("Opening your browser for Strava authorization...");
            let mut flow = OauthFlow::new(OauthConfig::default());
            let tokens = flow.authorize(&app_credentials).await?;
            println!("✅ Authorization complete");
            tokens
        }
    };

    // Step 7: persist before anything depends on the tokens.
    let credentials = StoredCredentials::new(&app_credentials, &tokens);
    let token_store = TokenStore::new(&options.install_dir);
    token_store.save(&credentials)?;
    println!("💾 Tokens stored in {}", token_store.path().display());

    // Step 8: companion server environment + optional first sync.
    write_env_file(&options.install_dir, &credentials)?;
    if !options.skip_sync
        && confirm(
            "\nRun the initial data sync now? (y/n): ",
            &mut input,
            &mut output,
        )
        .unwrap_or(false)
    {
        run_initial_sync(&options.install_dir, &venv_python).await;
    }

    // Step 9: merge the launch descriptor into the host config.
    println!("\n🔧 Updating the Claude Desktop configuration...");
    let config_path = claude_config_path().ok_or_else(|| SetupError::PersistenceFailure {
        path: PathBuf::from("claude_desktop_config.json"),
        detail: "could not determine the user's home directory".to_string(),
    })?;
    let entry = build_server_entry(&options.install_dir, &venv_python, &credentials);
    merge_server_entry(&config_path, SERVER_NAME, &entry)?;
    println!("✅ Config updated at {}", config_path.display());

    // Step 10: best-effort restart.
    if !options.no_restart
        && confirm(
            "\nRestart Claude Desktop now? (y/n): ",
            &mut input,
            &mut output,
        )
        .unwrap_or(false)
    {
        println!("🔄 Restarting Claude Desktop...");
        if let Err(err) = restart_claude_desktop().await {
            println!("⚠️  {err}");
            println!("Please restart Claude Desktop manually.");
        } else {
            println!("✅ Claude Desktop restarted");
        }
    } else {
        println!("\n📝 Restart Claude Desktop when you want to start using the server.");
    }

    print_summary(&options.install_dir, &config_path);
    Ok(())
}

/// `.env` consumed by the sync script when run by hand from the checkout.
fn write_env_file(
    install_dir: &Path,
    credentials: &StoredCredentials,
) -> Result<(), SetupError> {
    let env_path = install_dir.join(".env");
    let contents = format!(
        "{ENV_CLIENT_ID}={}\n{ENV_CLIENT_SECRET}={}\n{ENV_REFRESH_TOKEN}={}\n{ENV_DB_PATH}={}\n",
        credentials.client_id,
        credentials.client_secret,
        credentials.refresh_token,
        install_dir.join(DATABASE_FILE).display(),
    );
    fs::write(&env_path, contents).map_err(|err| SetupError::PersistenceFailure {
        path: env_path,
        detail: err.to_string(),
    })
}

/// Limited first sync so a fresh install has data to answer from. Any
/// failure is a warning with a retry hint.
async fn run_initial_sync(install_dir: &Path, venv_python: &Path) {
    println!("📊 Downloading your Strava data...");
    let status = tokio::process::Command::new(venv_python)
        .args([SYNC_SCRIPT, "--pages", "5"])
        .current_dir(install_dir)
        .status()
        .await;

    match status {
        Ok(status) if status.success() => println!("✅ Initial data sync completed"),
        _ => {
            println!("⚠️  Data sync had issues, but you can retry later:");
            println!(
                "    cd \"{}\" && venv/bin/python {SYNC_SCRIPT}",
                install_dir.display()
            );
        }
    }
}

fn print_summary(install_dir: &Path, config_path: &Path) {
    println!("\n🎉 Setup complete!");
    println!("  Installed to:   {}", install_dir.display());
    println!("  Config updated: {}", config_path.display());
    println!("\n💡 Try asking Claude:");
    println!("  \"Show me my recent Strava activities\"");
    println!("  \"What's my average running pace this month?\"");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_file_lists_every_launch_variable() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = StoredCredentials {
            client_id: "26565".to_string(),
            client_secret: "top-secret".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 0,
        };

        write_env_file(dir.path(), &credentials).unwrap();

        let contents = fs::read_to_string(dir.path().join(".env")).unwrap();
        assert!(contents.contains("STRAVA_CLIENT_ID=26565"));
        assert!(contents.contains("STRAVA_CLIENT_SECRET=top-secret"));
        assert!(contents.contains("STRAVA_REFRESH_TOKEN=refresh"));
        assert!(contents.contains(DATABASE_FILE));
        // The access token is not needed by the launched server.
        assert!(!contents.contains("access"));
    }
}
