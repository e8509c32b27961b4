use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

/// A required external tool that could not be found on the PATH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingToolReport {
    pub name: String,
    pub hint: String,
}

/// Everything that can stop a setup run.
///
/// Every variant except [`SetupError::RestartFailure`] is fatal: the run
/// halts at the failing step and the user re-invokes the tool after fixing
/// the cause. Re-running is always safe; persisted files are only ever
/// replaced whole via temp-file-then-rename.
#[derive(Debug)]
pub enum SetupError {
    /// One or more required external tools are absent from the PATH.
    MissingTool { tools: Vec<MissingToolReport> },

    /// Cloning or updating the companion repository failed (network,
    /// authentication against the remote, or git itself).
    RepositoryFetchFailure { detail: String },

    /// The install directory exists but is not a checkout of the expected
    /// repository. Never overwritten; the user has to resolve it.
    RepositoryStateConflict { dir: PathBuf, detail: String },

    /// Creating the virtual environment or installing the companion's
    /// dependencies failed. Carries the tool's diagnostic output verbatim.
    DependencyInstallFailure { detail: String },

    /// Interactive input ended before a required answer was given.
    InputAborted { detail: String },

    /// The local callback listener could not be set up or serviced.
    CallbackListenerFailure { detail: String },

    /// The browser redirect never arrived within the wait window.
    AuthorizationTimeout { waited_s: u64 },

    /// A callback arrived carrying a state token from a different session.
    AuthorizationStateMismatch,

    /// The identity provider reported an error on the redirect, e.g. the
    /// user declined the authorization.
    AuthorizationDenied { error: String, description: String },

    /// The code-for-tokens exchange returned a non-2xx status or a body
    /// that did not parse.
    TokenExchangeFailure { detail: String },

    /// The host application's configuration file exists but is not valid
    /// JSON. The original file is left untouched.
    ConfigParseFailure { path: PathBuf, detail: String },

    /// Writing the token file, the host config, or the `.env` file failed.
    PersistenceFailure { path: PathBuf, detail: String },

    /// Restarting the host application failed. Non-fatal; the caller
    /// degrades this to a warning.
    RestartFailure { detail: String },
}

impl SetupError {
    /// Name of the setup step a failure belongs to, for diagnosis.
    pub fn step(&self) -> &'static str {
        match self {
            SetupError::MissingTool { .. } => "environment probe",
            SetupError::RepositoryFetchFailure { .. }
            | SetupError::RepositoryStateConflict { .. } => "repository fetch",
            SetupError::DependencyInstallFailure { .. } => "environment provisioning",
            SetupError::InputAborted { .. } => "credential collection",
            SetupError::CallbackListenerFailure { .. }
            | SetupError::AuthorizationTimeout { .. }
            | SetupError::AuthorizationStateMismatch
            | SetupError::AuthorizationDenied { .. } => "authorization",
            SetupError::TokenExchangeFailure { .. } => "token exchange",
            SetupError::ConfigParseFailure { .. } => "config merge",
            SetupError::PersistenceFailure { .. } => "persistence",
            SetupError::RestartFailure { .. } => "restart",
        }
    }

    /// Whether the run must halt on this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SetupError::RestartFailure { .. })
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::MissingTool { tools } => {
                writeln!(f, "required tools are missing from your PATH:")?;
                for tool in tools {
                    writeln!(f, "  - {} ({})", tool.name, tool.hint)?;
                }
                write!(f, "Install them and run the setup again.")
            }
            SetupError::RepositoryFetchFailure { detail } => {
                write!(f, "failed to fetch the companion repository: {detail}")
            }
            SetupError::RepositoryStateConflict { dir, detail } => {
                write!(
                    f,
                    "install directory {} is in an ambiguous state: {detail}\n\
                     Move it aside or pick a different --dir; it will not be overwritten.",
                    dir.display()
                )
            }
            SetupError::DependencyInstallFailure { detail } => {
                write!(f, "dependency installation failed:\n{detail}")
            }
            SetupError::InputAborted { detail } => {
                write!(f, "interactive input ended unexpectedly: {detail}")
            }
            SetupError::CallbackListenerFailure { detail } => {
                write!(f, "local OAuth callback listener failed: {detail}")
            }
            SetupError::AuthorizationTimeout { waited_s } => {
                write!(
                    f,
                    "no authorization arrived within {waited_s} seconds; \
                     the browser flow was not completed"
                )
            }
            SetupError::AuthorizationStateMismatch => {
                write!(f, "callback state token did not match this session")
            }
            SetupError::AuthorizationDenied { error, description } => {
                if description.is_empty() {
                    write!(f, "authorization was rejected by Strava: {error}")
                } else {
                    write!(f, "authorization was rejected by Strava: {error} ({description})")
                }
            }
            SetupError::TokenExchangeFailure { detail } => {
                write!(f, "token exchange failed: {detail}")
            }
            SetupError::ConfigParseFailure { path, detail } => {
                write!(
                    f,
                    "existing config at {} could not be parsed: {detail}\n\
                     The file was left untouched; fix or remove it and re-run.",
                    path.display()
                )
            }
            SetupError::PersistenceFailure { path, detail } => {
                write!(f, "failed to write {}: {detail}", path.display())
            }
            SetupError::RestartFailure { detail } => {
                write!(f, "could not restart Claude Desktop: {detail}")
            }
        }
    }
}

impl StdError for SetupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_lists_every_tool_with_hint() {
        let err = SetupError::MissingTool {
            tools: vec![
                MissingToolReport {
                    name: "git".to_string(),
                    hint: "https://git-scm.com/downloads".to_string(),
                },
                MissingToolReport {
                    name: "python3".to_string(),
                    hint: "https://www.python.org/downloads/".to_string(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("git"));
        assert!(msg.contains("python3"));
        assert!(msg.contains("git-scm.com"));
    }

    #[test]
    fn test_only_restart_failure_is_non_fatal() {
        assert!(!SetupError::RestartFailure {
            detail: "not running".to_string()
        }
        .is_fatal());
        assert!(SetupError::AuthorizationStateMismatch.is_fatal());
        assert!(SetupError::AuthorizationTimeout { waited_s: 300 }.is_fatal());
    }

    #[test]
    fn test_step_names_cover_the_flow() {
        assert_eq!(
            SetupError::AuthorizationTimeout { waited_s: 1 }.step(),
            "authorization"
        );
        assert_eq!(
            SetupError::TokenExchangeFailure {
                detail: String::new()
            }
            .step(),
            "token exchange"
        );
        assert_eq!(
            SetupError::ConfigParseFailure {
                path: PathBuf::from("/tmp/c.json"),
                detail: String::new()
            }
            .step(),
            "config merge"
        );
    }

    #[test]
    fn test_conflict_message_refuses_overwrite() {
        let err = SetupError::RepositoryStateConflict {
            dir: PathBuf::from("/home/u/.claude-mcps/strava-mcp"),
            detail: "directory is not a git checkout".to_string(),
        };
        assert!(err.to_string().contains("will not be overwritten"));
    }
}
