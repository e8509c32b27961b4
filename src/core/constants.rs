//! Fixed endpoints, paths, and names shared across the setup flow.

/// Companion server repository cloned into the install directory.
pub const REPO_URL: &str = "https://github.com/theagilepadawan/strava-mcp.git";

pub const AUTHORIZE_ENDPOINT: &str = "https://www.strava.com/oauth/authorize";
pub const TOKEN_ENDPOINT: &str = "https://www.strava.com/oauth/token";

/// Scopes the companion server needs to read activities and profile data.
pub const OAUTH_SCOPES: &str = "activity:read_all,profile:read_all";

/// Fixed local redirect target registered with the Strava API application.
pub const CALLBACK_PORT: u16 = 8723;
pub const CALLBACK_PATH: &str = "/callback";

/// How long the local listener waits for the browser redirect.
pub const AUTHORIZATION_TIMEOUT_S: u64 = 300;

/// Key inserted under `mcpServers` in the Claude Desktop config.
pub const SERVER_NAME: &str = "strava-mcp";

/// Token file written into the install directory.
pub const TOKENS_FILE_NAME: &str = "tokens.json";

/// Script and database names inside the companion checkout.
pub const SERVER_SCRIPT: &str = "strava-mcp.py";
pub const SYNC_SCRIPT: &str = "strava-sync.py";
pub const DATABASE_FILE: &str = "strava_data.db";

/// Environment variables consumed by the launched companion server.
pub const ENV_CLIENT_ID: &str = "STRAVA_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "STRAVA_CLIENT_SECRET";
pub const ENV_REFRESH_TOKEN: &str = "STRAVA_REFRESH_TOKEN";
pub const ENV_DB_PATH: &str = "STRAVA_DB_PATH";

/// Default install location, relative to the user's home directory.
pub const DEFAULT_INSTALL_DIR: &str = ".claude-mcps/strava-mcp";
