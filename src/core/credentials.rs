//! Credential collector: the Strava API application's client id and
//! secret, entered once by the operator or reused from a prior run.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::utils::input::{confirm, prompt_required};

/// Application-level credentials, shared across all end users of one
/// Strava API application. Opaque strings; only non-emptiness is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Prompt for credentials, offering to reuse a stored pair when present.
pub fn collect_app_credentials<R: BufRead, W: Write>(
    stored: Option<&AppCredentials>,
    input: &mut R,
    output: &mut W,
) -> io::Result<AppCredentials> {
    if let Some(existing) = stored {
        let question = format!(
            "Reuse the stored Strava API application (client id {})? (y/n): ",
            existing.client_id
        );
        if confirm(&question, input, output)? {
            return Ok(existing.clone());
        }
    }

    writeln!(
        output,
        "Enter your Strava API application credentials \
         (https://www.strava.com/settings/api):"
    )?;
    let client_id = prompt_required("Client ID: ", input, output)?;
    let client_secret = prompt_required("Client secret: ", input, output)?;

    Ok(AppCredentials {
        client_id,
        client_secret,
    })
}
