// Auth session
//
// AuthSession ties the identity provider, the token store and the identity
// session together:
// - login: provider login -> persist token -> resolve principal -> open
// - restore: stored token -> resolve principal -> open
// - logout: provider logout -> forget token -> close
//
// Logout always clears local state, even when the provider call fails.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::session::{IdentitySession, Principal};
use crate::traits::{IdentityProvider, TokenStore};

/// Token store key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Token store key for the refresh token, when the provider issues one
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Login/logout orchestration around an [`IdentitySession`]
#[derive(Clone)]
pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    tokens: Arc<dyn TokenStore>,
    session: IdentitySession,
}

impl AuthSession {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        tokens: Arc<dyn TokenStore>,
        session: IdentitySession,
    ) -> Self {
        Self {
            provider,
            tokens,
            session,
        }
    }

    /// The identity session this orchestrator opens and closes
    pub fn session(&self) -> &IdentitySession {
        &self.session
    }

    pub fn current(&self) -> Option<Principal> {
        self.session.current()
    }

    /// Stored access token, if any
    pub async fn access_token(&self) -> Result<Option<String>> {
        self.tokens.get(ACCESS_TOKEN_KEY).await
    }

    /// Run the interactive login.
    ///
    /// Returns `None` when the user cancels. A token the provider will not
    /// resolve to a principal is discarded and reported as an auth error.
    pub async fn login(&self) -> Result<Option<Principal>> {
        let Some(credential) = self.provider.login().await? else {
            info!("Login cancelled");
            return Ok(None);
        };

        self.tokens
            .set(ACCESS_TOKEN_KEY, &credential.access_token)
            .await?;
        if let Some(refresh) = &credential.refresh_token {
            self.tokens.set(REFRESH_TOKEN_KEY, refresh).await?;
        }

        match self.provider.get_user_info(&credential.access_token).await? {
            Some(principal) => {
                info!(owner = %principal.subject, "Logged in");
                self.session.open(principal.clone());
                Ok(Some(principal))
            }
            None => {
                self.forget_tokens().await;
                Err(SyncError::auth("Identity provider rejected the new access token"))
            }
        }
    }

    /// Re-open the session from a stored token.
    ///
    /// Returns `None` when no token is stored or the stored token is no
    /// longer valid (it is removed in that case). Transport failures are
    /// returned and leave the token in place.
    pub async fn restore(&self) -> Result<Option<Principal>> {
        let Some(token) = self.tokens.get(ACCESS_TOKEN_KEY).await? else {
            debug!("No stored access token");
            return Ok(None);
        };

        match self.provider.get_user_info(&token).await? {
            Some(principal) => {
                info!(owner = %principal.subject, "Session restored");
                self.session.open(principal.clone());
                Ok(Some(principal))
            }
            None => {
                info!("Stored access token rejected, discarding");
                self.forget_tokens().await;
                Ok(None)
            }
        }
    }

    /// Sign out.
    ///
    /// Tokens are removed and the session is closed regardless of the
    /// provider outcome; a provider failure is still returned.
    pub async fn logout(&self) -> Result<()> {
        let result = self.provider.logout().await;
        if let Err(e) = &result {
            warn!(error = %e, "Provider logout failed, clearing local session anyway");
        }

        self.forget_tokens().await;
        self.session.close();
        info!("Logged out");
        result
    }

    async fn forget_tokens(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.tokens.remove(key).await {
                warn!(key, error = %e, "Failed to remove stored token");
            }
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("session", &self.session)
            .finish()
    }
}
