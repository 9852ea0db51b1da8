//! OAuth redirect callback handling.
//!
//! Takes the URL the hosted UI redirected to, extracts the authorization
//! code (or the provider's error), exchanges the code for tokens, and
//! persists the resulting session.

use tracing::debug;

use super::client::AuthClient;
use super::error::CallbackError;
use super::jwt;
use super::session::{CredentialSet, SessionStore};

/// Parameters extracted from a callback URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: Option<String>,
}

/// Parses a callback URL (or a bare query string) into its parameters.
///
/// A provider `error` parameter takes precedence over any code, so a denied
/// authorization never reaches the token exchange.
pub fn parse_callback_url(input: &str) -> Result<CallbackParams, CallbackError> {
    let query = extract_query(input);

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    // Either error parameter means the provider denied the authorization,
    // even when a code is also present.
    if error.is_some() || error_description.is_some() {
        return Err(CallbackError::Provider {
            error: error.unwrap_or_else(|| "unknown".to_string()),
            description: error_description,
        });
    }

    match code {
        Some(code) if !code.is_empty() => Ok(CallbackParams { code, state }),
        _ => Err(CallbackError::MissingCode),
    }
}

/// Pulls the query component out of a full URL, accepting a bare query
/// string (with or without a leading `?`) as well.
fn extract_query(input: &str) -> String {
    if let Ok(url) = url::Url::parse(input) {
        return url.query().unwrap_or("").to_string();
    }
    input.trim_start_matches('?').to_string()
}

/// Completes the authorization-code flow for a callback URL.
///
/// On success the credential set has been persisted and is returned. Any
/// failure leaves the store untouched.
pub async fn complete_oauth_callback(
    client: &AuthClient,
    store: &SessionStore,
    callback_url: &str,
) -> Result<CredentialSet, CallbackError> {
    let params = parse_callback_url(callback_url)?;
    debug!("callback carries authorization code, exchanging");

    let tokens = client.exchange_code(&params.code).await?;

    let username = jwt::username_claim(&tokens.id_token).ok_or(CallbackError::InvalidToken)?;

    let creds = CredentialSet {
        username,
        id_token: tokens.id_token,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    };
    store.persist(&creds)?;
    Ok(creds)
}
