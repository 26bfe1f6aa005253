// Client configuration loaded from environment variables.
// Decision: FARMFIT_ prefix for backend settings, AUTH0_ prefix for identity settings
// Decision: Auth0 is optional; without it only stored tokens can be used

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;

const DEFAULT_API_URL: &str = "http://localhost:54321";
const DEFAULT_SCOPE: &str = "openid profile email offline_access";
const DEFAULT_ROLES_CLAIM: &str = "https://farmfit.app/roles";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Auth0 tenant configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth0Config {
    /// Tenant domain (`farmfit.eu.auth0.com`) or a full base URL
    pub domain: String,
    pub client_id: String,
    /// API audience requested for access tokens
    pub audience: Option<String>,
    /// Redirect target for the authorization code flow and logout
    pub redirect_uri: String,
    pub scope: String,
    /// Namespaced custom claim carrying role names
    pub roles_claim: String,
}

impl Auth0Config {
    pub fn new(domain: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            client_id: client_id.into(),
            audience: None,
            redirect_uri: "farmfit://callback".to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            roles_claim: DEFAULT_ROLES_CLAIM.to_string(),
        }
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    /// Base URL of the tenant, without trailing slash
    pub fn issuer(&self) -> String {
        let domain = self.domain.trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        }
    }
}

/// Complete client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the hosted datastore
    pub api_url: String,
    /// Project key sent as the `apikey` header
    pub api_key: String,
    pub auth0: Option<Auth0Config>,
    /// Directory holding persisted tokens
    pub token_dir: PathBuf,
    pub http_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            auth0: None,
            token_dir: default_token_dir(),
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_auth0(mut self, auth0: Auth0Config) -> Self {
        self.auth0 = Some(auth0);
        self
    }

    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = dir.into();
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("FARMFIT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_key = std::env::var("FARMFIT_API_KEY").unwrap_or_default();

        let auth0 = match (
            std::env::var("AUTH0_DOMAIN"),
            std::env::var("AUTH0_CLIENT_ID"),
        ) {
            (Ok(domain), Ok(client_id)) if !domain.is_empty() && !client_id.is_empty() => {
                let mut config = Auth0Config::new(domain, client_id);
                config.audience = std::env::var("AUTH0_AUDIENCE")
                    .ok()
                    .filter(|s| !s.is_empty());
                if let Ok(redirect_uri) = std::env::var("AUTH0_REDIRECT_URI") {
                    config.redirect_uri = redirect_uri;
                }
                if let Ok(claim) = std::env::var("AUTH0_ROLES_CLAIM") {
                    config.roles_claim = claim;
                }
                Some(config)
            }
            _ => None,
        };

        let token_dir = std::env::var("FARMFIT_TOKEN_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_token_dir());

        let http_timeout = std::env::var("FARMFIT_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        Self {
            api_url,
            api_key,
            auth0,
            token_dir,
            http_timeout,
        }
    }

    /// Check that the settings can reach a backend
    pub fn validate(&self) -> Result<(), ClientError> {
        url::Url::parse(&self.api_url)?;
        Ok(())
    }

    pub fn auth0_enabled(&self) -> bool {
        self.auth0.is_some()
    }
}

fn default_token_dir() -> PathBuf {
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".farmfit"))
        .unwrap_or_else(|_| PathBuf::from(".farmfit"))
}
