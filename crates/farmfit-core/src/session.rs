// Identity session
//
// IdentitySession is the explicitly owned replacement for ambient auth
// state. It holds the signed-in principal and broadcasts identity changes
// to every sync hook bound to it. Lifecycle: open(principal) / close().

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::entity::OwnerId;

/// Tokens returned by the identity provider after login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds, as reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credential {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            id_token: None,
            refresh_token: None,
            token_type: default_token_type(),
            expires_in: None,
        }
    }
}

/// The signed-in user as described by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable subject identifier; keys all per-user data
    pub subject: OwnerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    /// Role names granted to the principal
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(subject: impl Into<OwnerId>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
            name: None,
            picture: None,
            email_verified: false,
            roles: Vec::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Best human-readable label for the principal
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or_else(|| self.subject.as_str())
    }
}

/// Shared handle to the current identity.
///
/// Cloning is cheap; all clones observe the same session.
#[derive(Clone)]
pub struct IdentitySession {
    tx: Arc<watch::Sender<Option<Principal>>>,
}

impl IdentitySession {
    /// Create a closed session
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Sign a principal in.
    ///
    /// Watchers are notified only when the subject changes; re-opening with
    /// the same subject refreshes the stored profile silently.
    pub fn open(&self, principal: Principal) {
        let subject = principal.subject.clone();
        let changed = self.tx.send_if_modified(|current| {
            let changed = current.as_ref().map(|p| &p.subject) != Some(&principal.subject);
            *current = Some(principal);
            changed
        });
        if changed {
            info!(owner = %subject, "Identity session opened");
        }
    }

    /// Sign out; watchers see `None`
    pub fn close(&self) {
        let closed = self.tx.send_if_modified(|current| current.take().is_some());
        if closed {
            info!("Identity session closed");
        }
    }

    pub fn current(&self) -> Option<Principal> {
        self.tx.borrow().clone()
    }

    /// Owner identity of the current principal, if any
    pub fn owner(&self) -> Option<OwnerId> {
        self.tx.borrow().as_ref().map(|p| p.subject.clone())
    }

    pub fn is_open(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Receiver that wakes on every identity change
    pub fn watch(&self) -> watch::Receiver<Option<Principal>> {
        self.tx.subscribe()
    }
}

impl Default for IdentitySession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdentitySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySession")
            .field("owner", &self.owner())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_and_close_notify_watchers() {
        let session = IdentitySession::new();
        let mut rx = session.watch();
        assert!(!session.is_open());

        session.open(Principal::new("U1"));
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|p| p.subject.clone()),
            Some(OwnerId::from("U1"))
        );

        session.close();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
        assert_eq!(session.owner(), None);
    }

    #[tokio::test]
    async fn test_reopen_with_same_subject_is_silent() {
        let session = IdentitySession::new();
        session.open(Principal::new("U1"));
        let mut rx = session.watch();

        session.open(Principal::new("U1").with_name("Ada"));

        assert!(!rx.has_changed().unwrap());
        assert_eq!(session.current().unwrap().display_name(), "Ada");
    }

    #[test]
    fn test_close_when_closed_is_noop() {
        let session = IdentitySession::new();
        let rx = session.watch();
        session.close();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_credential_defaults_to_bearer() {
        let credential: Credential =
            serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(credential.token_type, "Bearer");
        assert_eq!(credential, Credential::bearer("abc"));
    }
}
