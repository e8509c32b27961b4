//! Config merger: inserts the companion server's launch descriptor into
//! Claude Desktop's `claude_desktop_config.json` without disturbing
//! anything else in the document.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::constants::{
    DATABASE_FILE, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_DB_PATH, ENV_REFRESH_TOKEN,
    SERVER_SCRIPT,
};
use crate::core::error::SetupError;
use crate::core::tokens::StoredCredentials;

const MCP_SERVERS_KEY: &str = "mcpServers";

/// One named server-launch descriptor under `mcpServers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerEntry {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// Where Claude Desktop keeps its configuration on this platform.
pub fn claude_config_path() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    let app_dir = if cfg!(any(target_os = "macos", target_os = "windows")) {
        "Claude"
    } else {
        "claude"
    };
    Some(
        base.config_dir()
            .join(app_dir)
            .join("claude_desktop_config.json"),
    )
}

/// Launch descriptor for the companion server: the venv interpreter
/// running the server script, configured through environment variables.
pub fn build_server_entry(
    install_dir: &Path,
    venv_python: &Path,
    credentials: &StoredCredentials,
) -> McpServerEntry {
    let mut env = BTreeMap::new();
    env.insert(ENV_CLIENT_ID.to_string(), credentials.client_id.clone());
    env.insert(
        ENV_CLIENT_SECRET.to_string(),
        credentials.client_secret.clone(),
    );
    env.insert(
        ENV_REFRESH_TOKEN.to_string(),
        credentials.refresh_token.clone(),
    );
    env.insert(
        ENV_DB_PATH.to_string(),
        install_dir.join(DATABASE_FILE).to_string_lossy().into_owned(),
    );

    McpServerEntry {
        command: venv_python.to_string_lossy().into_owned(),
        args: vec![install_dir.join(SERVER_SCRIPT).to_string_lossy().into_owned()],
        env,
    }
}

/// Insert or replace `mcpServers[server_name]`, preserving every other
/// key. A missing file starts from an empty document; an unparseable one
/// is a fatal error and is left byte-for-byte untouched.
pub fn merge_server_entry(
    config_path: &Path,
    server_name: &str,
    entry: &McpServerEntry,
) -> Result<(), SetupError> {
    let mut document = if config_path.exists() {
        let contents =
            fs::read_to_string(config_path).map_err(|err| SetupError::ConfigParseFailure {
                path: config_path.to_path_buf(),
                detail: err.to_string(),
            })?;
        serde_json::from_str::<Value>(&contents).map_err(|err| SetupError::ConfigParseFailure {
            path: config_path.to_path_buf(),
            detail: err.to_string(),
        })?
    } else {
        Value::Object(serde_json::Map::new())
    };

    let root = document
        .as_object_mut()
        .ok_or_else(|| SetupError::ConfigParseFailure {
            path: config_path.to_path_buf(),
            detail: "top level is not a JSON object".to_string(),
        })?;

    let servers = root
        .entry(MCP_SERVERS_KEY)
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    let servers = servers
        .as_object_mut()
        .ok_or_else(|| SetupError::ConfigParseFailure {
            path: config_path.to_path_buf(),
            detail: format!("`{MCP_SERVERS_KEY}` is not a JSON object"),
        })?;

    let entry_value =
        serde_json::to_value(entry).map_err(|err| SetupError::PersistenceFailure {
            path: config_path.to_path_buf(),
            detail: err.to_string(),
        })?;
    servers.insert(server_name.to_string(), entry_value);

    write_document(config_path, &document)?;
    debug!(path = %config_path.display(), server = server_name, "config merged");
    Ok(())
}

fn write_document(config_path: &Path, document: &Value) -> Result<(), SetupError> {
    let persist = |path: &Path| -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let mut contents = serde_json::to_string_pretty(document)?;
        contents.push('\n');

        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };
        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file.persist(path)?;
        Ok(())
    };

    persist(config_path).map_err(|err| SetupError::PersistenceFailure {
        path: config_path.to_path_buf(),
        detail: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::SERVER_NAME;

    fn sample_entry() -> McpServerEntry {
        let credentials = StoredCredentials {
            client_id: "26565".to_string(),
            client_secret: "top-secret".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 1_924_992_000,
        };
        build_server_entry(
            Path::new("/home/u/.claude-mcps/strava-mcp"),
            Path::new("/home/u/.claude-mcps/strava-mcp/venv/bin/python"),
            &credentials,
        )
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_merge_creates_missing_file_with_only_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claude_desktop_config.json");

        merge_server_entry(&path, SERVER_NAME, &sample_entry()).unwrap();

        let document = read_json(&path);
        let root = document.as_object().unwrap();
        assert_eq!(root.len(), 1);
        let servers = root[MCP_SERVERS_KEY].as_object().unwrap();
        assert_eq!(servers.len(), 1);
        assert!(servers.contains_key(SERVER_NAME));
    }

    #[test]
    fn test_merge_preserves_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claude_desktop_config.json");
        fs::write(
            &path,
            r#"{"other": {"nested": [1, 2, 3]}, "mcpServers": {"existing": {"command": "node"}}}"#,
        )
        .unwrap();

        merge_server_entry(&path, SERVER_NAME, &sample_entry()).unwrap();

        let document = read_json(&path);
        assert_eq!(document["other"]["nested"], serde_json::json!([1, 2, 3]));
        assert_eq!(document[MCP_SERVERS_KEY]["existing"]["command"], "node");
        assert_eq!(
            document[MCP_SERVERS_KEY][SERVER_NAME]["env"][ENV_CLIENT_ID],
            "26565"
        );
    }

    #[test]
    fn test_merge_overwrites_only_its_own_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claude_desktop_config.json");
        fs::write(
            &path,
            r#"{"mcpServers": {"strava-mcp": {"command": "stale"}}}"#,
        )
        .unwrap();

        merge_server_entry(&path, SERVER_NAME, &sample_entry()).unwrap();

        let document = read_json(&path);
        let command = document[MCP_SERVERS_KEY][SERVER_NAME]["command"]
            .as_str()
            .unwrap();
        assert!(command.ends_with("python"));
    }

    #[test]
    fn test_malformed_file_is_fatal_and_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claude_desktop_config.json");
        let original = b"{this is not json".to_vec();
        fs::write(&path, &original).unwrap();

        let result = merge_server_entry(&path, SERVER_NAME, &sample_entry());
        assert!(matches!(result, Err(SetupError::ConfigParseFailure { .. })));
        assert_eq!(fs::read(&path).unwrap(), original);
    }

    #[test]
    fn test_non_object_mcp_servers_is_fatal_and_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claude_desktop_config.json");
        let original = br#"{"mcpServers": "oops"}"#.to_vec();
        fs::write(&path, &original).unwrap();

        let result = merge_server_entry(&path, SERVER_NAME, &sample_entry());
        assert!(matches!(result, Err(SetupError::ConfigParseFailure { .. })));
        assert_eq!(fs::read(&path).unwrap(), original);
    }

    #[test]
    fn test_entry_carries_launch_environment() {
        let entry = sample_entry();
        assert!(entry.command.ends_with("python"));
        assert_eq!(entry.args.len(), 1);
        assert!(entry.args[0].ends_with(SERVER_SCRIPT));
        assert_eq!(entry.env[ENV_REFRESH_TOKEN], "refresh");
        assert!(entry.env[ENV_DB_PATH].ends_with(DATABASE_FILE));
    }
}
