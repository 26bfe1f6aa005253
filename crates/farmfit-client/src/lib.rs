// FarmFit HTTP adapters
//
// Concrete collaborators for farmfit-core:
// - HttpGateway: REST fetch/writes plus the server-sent change feed
// - Auth0Provider: device login, /userinfo, logout, PKCE code flow
// - FileTokenStore: per-scope JSON file with owner-only permissions
//
// FarmFitClient wires them together from a ClientConfig.

pub mod auth0;
pub mod config;
pub mod error;
pub mod gateway;
pub mod rest;
pub mod token_store;

pub use auth0::{Auth0Provider, AuthorizationRequest, DevicePrompt, PkceChallenge};
pub use config::{Auth0Config, ClientConfig};
pub use error::ClientError;
pub use gateway::HttpGateway;
pub use rest::RestClient;
pub use token_store::FileTokenStore;

use farmfit_core::{
    AuthSession, Entity, EntitySync, IdentityProvider, IdentitySession, Result, SyncError,
};
use std::sync::Arc;

/// Entry point bundling the configured HTTP collaborators
#[derive(Debug, Clone)]
pub struct FarmFitClient {
    config: ClientConfig,
    rest: RestClient,
}

impl FarmFitClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let rest = RestClient::new(&config)?;
        Ok(Self { config, rest })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Authenticate subsequent datastore requests as the signed-in user
    pub fn set_access_token(&self, token: Option<String>) {
        self.rest.set_access_token(token);
    }

    pub fn gateway<E: Entity>(&self) -> Arc<HttpGateway<E>> {
        Arc::new(HttpGateway::new(self.rest.clone()))
    }

    /// Sync hook for `E` with the entity's own ordering and paging
    pub fn sync<E: Entity>(&self) -> EntitySync<E> {
        EntitySync::for_entity(self.gateway::<E>())
    }

    /// Fetch-only hook for `E`: pages like `sync` but never opens the change feed
    pub fn listing<E: Entity>(&self) -> EntitySync<E> {
        EntitySync::new(self.gateway::<E>(), E::sync_options().without_live_updates())
    }

    pub fn identity_provider(&self) -> Result<Auth0Provider> {
        let auth0 = self
            .config
            .auth0
            .clone()
            .ok_or_else(|| SyncError::config("AUTH0_DOMAIN and AUTH0_CLIENT_ID must be set"))?;
        Ok(Auth0Provider::new(auth0))
    }

    pub fn token_store(&self) -> Result<FileTokenStore> {
        FileTokenStore::in_dir(&self.config.token_dir)
    }

    /// Auth session over the given provider and the file token store
    pub fn auth_session(
        &self,
        provider: Arc<dyn IdentityProvider>,
        session: IdentitySession,
    ) -> Result<AuthSession> {
        Ok(AuthSession::new(
            provider,
            Arc::new(self.token_store()?),
            session,
        ))
    }
}
