//! OAuth orchestrator: one authorization-code exchange per install.
//!
//! The flow walks `Idle → AwaitingRedirect → CodeReceived →
//! TokenExchanged → Done`, with `Failed` reachable from any non-terminal
//! phase. The local callback listener is the only concurrent piece: it is
//! bound before the browser opens, accepts connections until exactly one
//! request carries this run's state token, and is dropped on every exit
//! path so the port is always released.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, warn};

use crate::core::constants::{
    AUTHORIZATION_TIMEOUT_S, AUTHORIZE_ENDPOINT, CALLBACK_PATH, CALLBACK_PORT, OAUTH_SCOPES,
    TOKEN_ENDPOINT,
};
use crate::core::credentials::AppCredentials;
use crate::core::error::SetupError;
use crate::core::oauth_page::{render_callback_page, CallbackPageVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Idle,
    AwaitingRedirect,
    CodeReceived,
    TokenExchanged,
    Done,
    Failed,
}

/// Endpoints and limits for one flow. Injectable so tests can point the
/// exchange at a local fake and shrink the wait window.
#[derive(Debug, Clone)]
pub struct OauthConfig {
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub callback_port: u16,
    pub scopes: String,
    pub timeout: Duration,
}

impl Default for OauthConfig {
    fn default() -> Self {
        Self {
            authorize_endpoint: AUTHORIZE_ENDPOINT.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            callback_port: CALLBACK_PORT,
            scopes: OAUTH_SCOPES.to_string(),
            timeout: Duration::from_secs(AUTHORIZATION_TIMEOUT_S),
        }
    }
}

/// Tokens for one end user, as handed to the credential persister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

#[derive(Debug, serde::Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

pub fn current_unix_epoch_s() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0)
}

/// Unguessable per-run token, URL-safe base64.
pub fn random_urlsafe(bytes_len: usize) -> String {
    let mut bytes = vec![0_u8; bytes_len];
    if getrandom::fill(&mut bytes).is_err() {
        // Only reached when the OS RNG is unavailable.
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let mut x = nanos ^ ((std::process::id() as u64) << 32) ^ (bytes_len as u64);
        for byte in &mut bytes {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            *byte = (x & 0xFF) as u8;
        }
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn build_authorization_url(
    authorize_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    state: &str,
) -> Result<reqwest::Url, SetupError> {
    let mut url = reqwest::Url::parse(authorize_endpoint).map_err(|err| {
        SetupError::CallbackListenerFailure {
            detail: format!("invalid authorization endpoint: {err}"),
        }
    })?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", client_id);
        query.append_pair("response_type", "code");
        query.append_pair("redirect_uri", redirect_uri);
        query.append_pair("approval_prompt", "auto");
        query.append_pair("scope", scope);
        query.append_pair("state", state);
    }
    Ok(url)
}

pub fn open_in_browser(url: &str) -> Result<(), SetupError> {
    let launch_failed = |launcher: &str| SetupError::CallbackListenerFailure {
        detail: format!("failed to launch browser with {launcher}"),
    };

    #[cfg(target_os = "macos")]
    {
        let status = std::process::Command::new("open")
            .arg(url)
            .status()
            .map_err(|_| launch_failed("open"))?;
        if status.success() {
            return Ok(());
        }
        return Err(launch_failed("open"));
    }
    #[cfg(target_os = "windows")]
    {
        let status = std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .status()
            .map_err(|_| launch_failed("start"))?;
        if status.success() {
            return Ok(());
        }
        return Err(launch_failed("start"));
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        let status = std::process::Command::new("xdg-open")
            .arg(url)
            .status()
            .map_err(|_| launch_failed("xdg-open"))?;
        if status.success() {
            return Ok(());
        }
        return Err(launch_failed("xdg-open"));
    }

    #[allow(unreachable_code)]
    Err(SetupError::CallbackListenerFailure {
        detail: format!("no browser launcher configured for URL: {url}"),
    })
}

pub struct OauthFlow {
    config: OauthConfig,
    phase: AuthPhase,
}

impl OauthFlow {
    pub fn new(config: OauthConfig) -> Self {
        Self {
            config,
            phase: AuthPhase::Idle,
        }
    }

    pub fn phase(&self) -> AuthPhase {
        self.phase
    }

    /// Run the whole flow: bind the listener, open the browser, wait for
    /// the one valid redirect, exchange the code for tokens.
    pub async fn authorize(&mut self, credentials: &AppCredentials) -> Result<UserTokens, SetupError> {
        let listener = TcpListener::bind(("127.0.0.1", self.config.callback_port))
            .await
            .map_err(|err| {
                self.phase = AuthPhase::Failed;
                SetupError::CallbackListenerFailure {
                    detail: format!(
                        "cannot bind 127.0.0.1:{}: {err}",
                        self.config.callback_port
                    ),
                }
            })?;
        let redirect_uri = format!("http://localhost:{}{}", self.config.callback_port, CALLBACK_PATH);

        self.authorize_with(credentials, listener, &redirect_uri, |url| {
            if open_in_browser(url).is_err() {
                println!("⚠️  Could not open a browser automatically.");
            }
            println!("If no browser opened, visit:\n  {url}");
        })
        .await
    }

    /// Flow body with the listener and browser opener injected, so tests
    /// can drive it with a fake redirect and a fake token endpoint.
    pub async fn authorize_with<F>(
        &mut self,
        credentials: &AppCredentials,
        listener: TcpListener,
        redirect_uri: &str,
        open_browser: F,
    ) -> Result<UserTokens, SetupError>
    where
        F: FnOnce(&str),
    {
        let state = random_urlsafe(32);
        let url = build_authorization_url(
            &self.config.authorize_endpoint,
            &credentials.client_id,
            redirect_uri,
            &self.config.scopes,
            &state,
        )
        .inspect_err(|_| self.phase = AuthPhase::Failed)?;

        self.phase = AuthPhase::AwaitingRedirect;
        open_browser(url.as_str());

        let code = wait_for_callback(listener, &state, self.config.timeout)
            .await
            .inspect_err(|_| self.phase = AuthPhase::Failed)?;
        self.phase = AuthPhase::CodeReceived;
        debug!("authorization code received");

        let response = exchange_code(&self.config.token_endpoint, credentials, &code)
            .await
            .inspect_err(|_| self.phase = AuthPhase::Failed)?;
        self.phase = AuthPhase::TokenExchanged;

        let tokens = resolve_user_tokens(response, current_unix_epoch_s())
            .inspect_err(|_| self.phase = AuthPhase::Failed)?;
        self.phase = AuthPhase::Done;
        Ok(tokens)
    }
}

/// Block on the listener until one request carries the expected state.
///
/// A mismatched state is answered with 400 and the wait continues; the
/// flow stays in `AwaitingRedirect` until the deadline. The listener is
/// consumed, so the port is released on every return path, and no further
/// connections are accepted once a valid callback has been processed.
pub async fn wait_for_callback(
    listener: TcpListener,
    expected_state: &str,
    timeout: Duration,
) -> Result<String, SetupError> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Err(SetupError::AuthorizationTimeout {
                waited_s: timeout.as_secs(),
            });
        }

        let accepted = tokio::time::timeout(remaining, listener.accept()).await;
        let (mut stream, _) = match accepted {
            Err(_) => {
                return Err(SetupError::AuthorizationTimeout {
                    waited_s: timeout.as_secs(),
                })
            }
            Ok(result) => result.map_err(|err| SetupError::CallbackListenerFailure {
                detail: format!("accept failed: {err}"),
            })?,
        };

        let mut buffer = vec![0_u8; 16 * 1024];
        let bytes_read =
            stream
                .read(&mut buffer)
                .await
                .map_err(|err| SetupError::CallbackListenerFailure {
                    detail: format!("read failed: {err}"),
                })?;
        if bytes_read == 0 {
            continue;
        }

        let request = String::from_utf8_lossy(&buffer[..bytes_read]).into_owned();
        let callback_url = match parse_request_target(&request) {
            Some(url) => url,
            None => {
                let _ = write_callback_response(
                    &mut stream,
                    "400 Bad Request",
                    "Malformed callback request",
                    "The setup tool could not read this request. Retry the authorization.",
                    CallbackPageVariant::Error,
                )
                .await;
                continue;
            }
        };

        // Browsers also fetch /favicon.ico against the listener.
        if callback_url.path() != CALLBACK_PATH {
            let _ = stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
            continue;
        }

        match parse_callback_query(&callback_url, expected_state) {
            Ok(code) => {
                write_callback_response(
                    &mut stream,
                    "200 OK",
                    "Strava authorization complete",
                    "Return to the setup tool to finish the installation.",
                    CallbackPageVariant::Success,
                )
                .await?;
                return Ok(code);
            }
            Err(SetupError::AuthorizationStateMismatch) => {
                warn!("rejected callback with mismatched state token");
                let _ = write_callback_response(
                    &mut stream,
                    "400 Bad Request",
                    "State validation failed",
                    "This callback did not belong to the running setup session. \
                     Retry from the setup tool.",
                    CallbackPageVariant::Error,
                )
                .await;
                continue;
            }
            Err(err) => {
                let _ = write_callback_response(
                    &mut stream,
                    "400 Bad Request",
                    "Strava authorization failed",
                    "The authorization did not complete. Close this tab and retry \
                     from the setup tool.",
                    CallbackPageVariant::Error,
                )
                .await;
                return Err(err);
            }
        }
    }
}

fn parse_request_target(request: &str) -> Option<reqwest::Url> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let _method = parts.next()?;
    let target = parts.next()?;
    reqwest::Url::parse(&format!("http://localhost{target}")).ok()
}

/// Extract the authorization code from a callback URL, enforcing the
/// state token check.
pub fn parse_callback_query(
    callback_url: &reqwest::Url,
    expected_state: &str,
) -> Result<String, SetupError> {
    let mut state = None::<String>;
    let mut code = None::<String>;
    let mut error = None::<String>;
    let mut error_description = None::<String>;
    for (key, value) in callback_url.query_pairs() {
        match key.as_ref() {
            "state" => state = Some(value.to_string()),
            "code" => code = Some(value.to_string()),
            "error" => error = Some(value.to_string()),
            "error_description" => error_description = Some(value.to_string()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(SetupError::AuthorizationDenied {
            error,
            description: error_description.unwrap_or_default(),
        });
    }

    if state.as_deref() != Some(expected_state) {
        return Err(SetupError::AuthorizationStateMismatch);
    }

    code.ok_or_else(|| SetupError::CallbackListenerFailure {
        detail: "callback carried no authorization code".to_string(),
    })
}

async fn write_callback_response(
    stream: &mut tokio::net::TcpStream,
    status: &str,
    heading: &str,
    detail: &str,
    variant: CallbackPageVariant,
) -> Result<(), SetupError> {
    let body = render_callback_page("Strava MCP Setup", heading, detail, variant);
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|err| SetupError::CallbackListenerFailure {
            detail: format!("write failed: {err}"),
        })?;
    stream
        .flush()
        .await
        .map_err(|err| SetupError::CallbackListenerFailure {
            detail: format!("flush failed: {err}"),
        })
}

/// Server-to-server exchange of the authorization code for tokens.
pub async fn exchange_code(
    token_endpoint: &str,
    credentials: &AppCredentials,
    code: &str,
) -> Result<TokenResponse, SetupError> {
    let form_fields = [
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("code", code),
        ("grant_type", "authorization_code"),
    ];

    let response = reqwest::Client::new()
        .post(token_endpoint)
        .form(&form_fields)
        .send()
        .await
        .map_err(|err| SetupError::TokenExchangeFailure {
            detail: err.to_string(),
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(SetupError::TokenExchangeFailure {
            detail: format!("provider returned {status}: {text}"),
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|err| SetupError::TokenExchangeFailure {
            detail: format!("malformed token response: {err}"),
        })
}

/// Normalize the provider's token response into [`UserTokens`].
///
/// Strava returns both `expires_at` and `expires_in`; either is accepted,
/// `expires_at` preferred.
pub fn resolve_user_tokens(
    response: TokenResponse,
    now_epoch_s: i64,
) -> Result<UserTokens, SetupError> {
    let refresh_token = response
        .refresh_token
        .ok_or_else(|| SetupError::TokenExchangeFailure {
            detail: "token response carried no refresh token".to_string(),
        })?;

    let expires_at = response
        .expires_at
        .or_else(|| {
            response
                .expires_in
                .and_then(|seconds| now_epoch_s.checked_add(seconds))
        })
        .unwrap_or(now_epoch_s);

    Ok(UserTokens {
        access_token: response.access_token,
        refresh_token,
        expires_at,
    })
}
