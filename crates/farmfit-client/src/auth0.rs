// Auth0 identity provider
// Decision: Manual OAuth2 implementation over reqwest, same as the API's OAuth services
// Decision: Device authorization grant for terminal login; PKCE code flow offered for apps with a browser redirect
// Decision: Roles come from a namespaced custom claim on /userinfo

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use farmfit_core::{Credential, IdentityProvider, Principal, Result, SyncError};
use rand::RngCore;
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Auth0Config;
use crate::error::ClientError;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// What the user must do to approve a device login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePrompt {
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub expires_in: Duration,
}

type PromptHandler = Arc<dyn Fn(&DevicePrompt) + Send + Sync>;

/// PKCE verifier/challenge pair (S256)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let digest = Sha256::digest(verifier.as_bytes());
        Self {
            challenge: URL_SAFE_NO_PAD.encode(digest),
            verifier,
        }
    }
}

/// Authorization URL with the state and verifier needed to finish the flow
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub pkce: PkceChallenge,
}

/// Auth0 implementation of the identity provider contract
pub struct Auth0Provider {
    config: Auth0Config,
    http: reqwest::Client,
    on_prompt: PromptHandler,
}

impl Auth0Provider {
    pub fn new(config: Auth0Config) -> Self {
        // Logout answers with a redirect to an app URI that must not be followed
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            http,
            on_prompt: Arc::new(|prompt: &DevicePrompt| {
                info!(
                    user_code = %prompt.user_code,
                    verification_uri = %prompt.verification_uri,
                    "Approve this device to finish login"
                );
            }),
        }
    }

    /// Show the device prompt to the user some other way
    pub fn with_prompt<F>(mut self, handler: F) -> Self
    where
        F: Fn(&DevicePrompt) + Send + Sync + 'static,
    {
        self.on_prompt = Arc::new(handler);
        self
    }

    pub fn config(&self) -> &Auth0Config {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.issuer(), path)
    }

    /// Build the authorization URL for the code + PKCE flow
    pub fn authorization_url(&self, state: &str) -> std::result::Result<AuthorizationRequest, ClientError> {
        let pkce = PkceChallenge::generate();
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", self.config.scope.as_str()),
            ("state", state),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", "S256"),
        ];
        if let Some(audience) = &self.config.audience {
            params.push(("audience", audience.as_str()));
        }

        let url = url::Url::parse_with_params(&self.endpoint("/authorize"), &params)?;
        Ok(AuthorizationRequest {
            url: url.to_string(),
            state: state.to_string(),
            pkce,
        })
    }

    /// Exchange an authorization code (from the redirect) for tokens
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<Credential> {
        let response = self
            .http
            .post(self.endpoint("/oauth/token"))
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("code", code),
                ("code_verifier", verifier),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(ClientError::from)?;

        let status = response.status();
        if !status.is_success() {
            let error: TokenErrorResponse = response.json().await.unwrap_or_default();
            return Err(SyncError::auth(format!(
                "code exchange failed ({}): {}",
                status,
                error.describe()
            )));
        }

        let tokens: TokenResponse = response.json().await.map_err(ClientError::from)?;
        Ok(tokens.into())
    }

    async fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        let mut form = vec![
            ("client_id", self.config.client_id.as_str()),
            ("scope", self.config.scope.as_str()),
        ];
        if let Some(audience) = &self.config.audience {
            form.push(("audience", audience.as_str()));
        }

        let response = self
            .http
            .post(self.endpoint("/oauth/device/code"))
            .form(&form)
            .send()
            .await
            .map_err(ClientError::from)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::auth(format!(
                "device authorization failed ({}): {}",
                status, message
            )));
        }

        Ok(response.json().await.map_err(ClientError::from)?)
    }

    async fn poll_for_token(&self, device: &DeviceCodeResponse) -> Result<Option<Credential>> {
        let mut interval = Duration::from_secs(device.interval);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(device.expires_in);

        loop {
            if tokio::time::Instant::now() >= deadline {
                info!("Device code expired before approval");
                return Ok(None);
            }

            let response = self
                .http
                .post(self.endpoint("/oauth/token"))
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("device_code", device.device_code.as_str()),
                    ("client_id", self.config.client_id.as_str()),
                ])
                .send()
                .await
                .map_err(ClientError::from)?;

            if response.status().is_success() {
                let tokens: TokenResponse = response.json().await.map_err(ClientError::from)?;
                return Ok(Some(tokens.into()));
            }

            let status = response.status();
            let error: TokenErrorResponse = response.json().await.unwrap_or_default();
            match error.error.as_str() {
                "authorization_pending" => {}
                "slow_down" => interval += SLOW_DOWN_STEP,
                "access_denied" | "expired_token" => {
                    info!(reason = %error.error, "Device login not approved");
                    return Ok(None);
                }
                _ => {
                    return Err(SyncError::auth(format!(
                        "token polling failed ({}): {}",
                        status,
                        error.describe()
                    )));
                }
            }

            debug!(interval_secs = interval.as_secs(), "Waiting for device approval");
            tokio::time::sleep(interval).await;
        }
    }

    fn principal_from(&self, info: UserInfo) -> Principal {
        let roles = info
            .extra
            .get(&self.config.roles_claim)
            .and_then(|v| v.as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Principal {
            subject: info.sub.into(),
            email: info.email,
            name: info.name.or(info.nickname),
            picture: info.picture,
            email_verified: info.email_verified.unwrap_or(false),
            roles,
        }
    }
}

#[async_trait]
impl IdentityProvider for Auth0Provider {
    async fn login(&self) -> Result<Option<Credential>> {
        let device = self.request_device_code().await?;
        (self.on_prompt)(&DevicePrompt {
            user_code: device.user_code.clone(),
            verification_uri: device.verification_uri.clone(),
            verification_uri_complete: device.verification_uri_complete.clone(),
            expires_in: Duration::from_secs(device.expires_in),
        });
        self.poll_for_token(&device).await
    }

    async fn get_user_info(&self, access_token: &str) -> Result<Option<Principal>> {
        let response = self
            .http
            .get(self.endpoint("/userinfo"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(ClientError::from)?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("Access token rejected by /userinfo");
                Ok(None)
            }
            status if status.is_success() => {
                let info: UserInfo = response.json().await.map_err(ClientError::from)?;
                Ok(Some(self.principal_from(info)))
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(ClientError::from_status(status, message).into())
            }
        }
    }

    async fn logout(&self) -> Result<()> {
        let url = url::Url::parse_with_params(
            &self.endpoint("/v2/logout"),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("returnTo", self.config.redirect_uri.as_str()),
            ],
        )
        .map_err(ClientError::from)?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ClientError::from)?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            warn!(%status, "Auth0 logout returned an error");
            Err(SyncError::auth(format!("logout failed ({})", status)))
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default)]
    verification_uri_complete: Option<String>,
    expires_in: u64,
    #[serde(default = "default_interval")]
    interval: u64,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl From<TokenResponse> for Credential {
    fn from(tokens: TokenResponse) -> Self {
        Credential {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in: tokens.expires_in,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenErrorResponse {
    fn describe(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{}: {}", self.error, description),
            None => self.error.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    nickname: Option<String>,
    picture: Option<String>,
    email_verified: Option<bool>,
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_challenge_matches_rfc7636_example() {
        let pkce = PkceChallenge::from_verifier("dBjftJeZ4CVP-mJ92K9qDxWPHCiuXS7JbXj5JjfdFNY");
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_generated_verifier_is_url_safe() {
        let pkce = PkceChallenge::generate();
        assert_eq!(pkce.verifier.len(), 43);
        assert!(pkce
            .verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_authorization_url() {
        let provider = Auth0Provider::new(
            Auth0Config::new("farmfit.eu.auth0.com", "client-123")
                .with_audience("https://api.farmfit.app"),
        );

        let request = provider.authorization_url("xyz").unwrap();
        let url = url::Url::parse(&request.url).unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("farmfit.eu.auth0.com"));
        assert_eq!(url.path(), "/authorize");
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["code_challenge"], request.pkce.challenge);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["audience"], "https://api.farmfit.app");
    }

    #[test]
    fn test_principal_roles_from_custom_claim() {
        let provider = Auth0Provider::new(Auth0Config::new("tenant", "cid"));
        let info: UserInfo = serde_json::from_value(serde_json::json!({
            "sub": "auth0|u1",
            "nickname": "ada",
            "https://farmfit.app/roles": ["pet_owner", "practitioner"]
        }))
        .unwrap();

        let principal = provider.principal_from(info);
        assert_eq!(principal.subject.as_str(), "auth0|u1");
        assert_eq!(principal.name.as_deref(), Some("ada"));
        assert_eq!(principal.roles, vec!["pet_owner", "practitioner"]);
    }
}
