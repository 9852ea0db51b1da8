//! Identity-provider client.
//!
//! Talks to a Cognito-style user pool over two surfaces: the identity API
//! (JSON RPC with `X-Amz-Target` headers) for password login, signup, and
//! confirmation, and the hosted UI domain's `/oauth2/token` endpoint for the
//! authorization-code exchange.

use serde::Deserialize;
use tracing::debug;

use super::error::{AuthError, CallbackError, ConfirmError, SignupError};
use super::jwt;
use super::session::CredentialSet;

const TARGET_INITIATE_AUTH: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const TARGET_SIGN_UP: &str = "AWSCognitoIdentityProviderService.SignUp";
const TARGET_CONFIRM_SIGN_UP: &str = "AWSCognitoIdentityProviderService.ConfirmSignUp";

const RPC_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Tokens issued by the provider for one authentication.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Outcome of a signup request.
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    /// Provider-assigned user identifier.
    pub user_sub: String,
    /// Whether the account is already usable without email confirmation.
    pub confirmed: bool,
}

/// Structured fault body returned by the identity API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ProviderFault {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

impl ProviderFault {
    /// Fault type without any service namespace prefix.
    fn short_kind(&self) -> &str {
        self.kind.rsplit('#').next().unwrap_or(&self.kind)
    }
}

/// Client for one registered app client of the identity provider.
pub struct AuthClient {
    http: reqwest::Client,
    client_id: String,
    endpoint: String,
    domain: String,
    redirect_uri: String,
}

impl AuthClient {
    pub fn new(client_id: &str, endpoint: &str, domain: &str, redirect_uri: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.to_string(),
            endpoint: endpoint.to_string(),
            domain: domain.to_string(),
            redirect_uri: redirect_uri.to_string(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Hosted UI domain with a scheme, suitable for joining paths onto.
    fn domain_base(&self) -> String {
        let trimmed = self.domain.trim_end_matches('/');
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        }
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.domain_base())
    }

    /// Builds the hosted UI authorization URL for the code flow.
    pub fn authorize_url(&self, state: &str) -> String {
        let mut url = format!("{}/oauth2/authorize", self.domain_base());
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("scope", "openid email profile")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", state)
            .finish();
        url.push('?');
        url.push_str(&query);
        url
    }

    /// Sends one identity API call and returns the raw response.
    async fn provider_call(
        &self,
        target: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, reqwest::Error> {
        debug!(target, "calling identity API");
        self.http
            .post(&self.endpoint)
            .header("Content-Type", RPC_CONTENT_TYPE)
            .header("X-Amz-Target", target)
            .json(body)
            .send()
            .await
    }

    /// Reads a non-2xx identity API response into a fault.
    async fn read_fault(response: reqwest::Response) -> ProviderFault {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str(&body).unwrap_or(ProviderFault {
            kind: String::new(),
            message: format!("identity API returned {status}"),
        })
    }

    /// Authenticates with username and password, returning the issued
    /// credential set.
    ///
    /// The canonical username is recovered from the identity token claims
    /// rather than echoed from the input, so email aliases resolve to the
    /// pool's stored username.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<CredentialSet, AuthError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct AuthResult {
            id_token: String,
            access_token: String,
            refresh_token: String,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct AuthResponse {
            authentication_result: AuthResult,
        }

        let body = serde_json::json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {
                "USERNAME": username,
                "PASSWORD": password,
            },
        });

        let response = self
            .provider_call(TARGET_INITIATE_AUTH, &body)
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let fault = Self::read_fault(response).await;
            return Err(match fault.short_kind() {
                "NotAuthorizedException" | "UserNotFoundException" => AuthError::InvalidCredentials,
                _ => AuthError::Provider(fault.message),
            });
        }

        let parsed: AuthResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("unexpected response: {e}")))?;
        let result = parsed.authentication_result;

        let canonical = jwt::username_claim(&result.id_token)
            .ok_or_else(|| AuthError::Provider("identity token has no username".to_string()))?;

        Ok(CredentialSet {
            username: canonical,
            id_token: result.id_token,
            access_token: result.access_token,
            refresh_token: result.refresh_token,
        })
    }

    /// Registers a new account with the given user attributes. The provider
    /// sends a verification code to the given email address.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &[(&str, &str)],
    ) -> Result<SignupOutcome, SignupError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct SignupResponse {
            user_sub: String,
            #[serde(default)]
            user_confirmed: bool,
        }

        let user_attributes: Vec<serde_json::Value> = attributes
            .iter()
            .map(|(name, value)| serde_json::json!({"Name": name, "Value": value}))
            .collect();
        let body = serde_json::json!({
            "ClientId": self.client_id,
            "Username": email,
            "Password": password,
            "UserAttributes": user_attributes,
        });

        let response = self
            .provider_call(TARGET_SIGN_UP, &body)
            .await
            .map_err(|e| SignupError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let fault = Self::read_fault(response).await;
            return Err(match fault.short_kind() {
                "UsernameExistsException" => SignupError::UsernameExists,
                "InvalidPasswordException" | "InvalidParameterException" => {
                    SignupError::PasswordPolicy(fault.message)
                }
                _ => SignupError::Provider(fault.message),
            });
        }

        let parsed: SignupResponse = response
            .json()
            .await
            .map_err(|e| SignupError::Provider(format!("unexpected response: {e}")))?;

        Ok(SignupOutcome {
            user_sub: parsed.user_sub,
            confirmed: parsed.user_confirmed,
        })
    }

    /// Confirms a new account with the emailed verification code.
    pub async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), ConfirmError> {
        let body = serde_json::json!({
            "ClientId": self.client_id,
            "Username": email,
            "ConfirmationCode": code,
        });

        let response = self
            .provider_call(TARGET_CONFIRM_SIGN_UP, &body)
            .await
            .map_err(|e| ConfirmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let fault = Self::read_fault(response).await;
            return Err(match fault.short_kind() {
                "CodeMismatchException" => ConfirmError::CodeMismatch,
                "ExpiredCodeException" => ConfirmError::CodeExpired,
                _ => ConfirmError::Provider(fault.message),
            });
        }

        Ok(())
    }

    /// Exchanges an authorization code for tokens at the hosted UI token
    /// endpoint.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, CallbackError> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "authorization_code")
            .append_pair("client_id", &self.client_id)
            .append_pair("code", code)
            .append_pair("redirect_uri", &self.redirect_uri)
            .finish();

        debug!("exchanging authorization code for tokens");
        let response = self
            .http
            .post(self.token_url())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(form)
            .send()
            .await
            .map_err(|e| CallbackError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CallbackError::Exchange(format!("{status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| CallbackError::Exchange(format!("unexpected response: {e}")))
    }
}
