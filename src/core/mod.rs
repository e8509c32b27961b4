pub mod claude_config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod oauth;
pub mod oauth_page;
pub mod orchestrator;
pub mod probe;
pub mod repo;
pub mod restart;
pub mod state;
pub mod tokens;
pub mod venv;
