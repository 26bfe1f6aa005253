pub mod auth;
pub mod journals;
pub mod pets;
pub mod posts;
pub mod profile;

use anyhow::{Context, Result};
use farmfit_client::{DevicePrompt, FarmFitClient};
use farmfit_core::{AuthSession, Entity, EntitySync, IdentitySession, Principal, SyncPhase};
use serde::Serialize;
use std::sync::Arc;

use crate::output::OutputFormat;

/// Auth session over Auth0 and the on-disk token store
pub fn auth_session(client: &FarmFitClient) -> Result<AuthSession> {
    let provider = client
        .identity_provider()
        .context("Auth0 is not configured")?
        .with_prompt(print_device_prompt);
    Ok(client.auth_session(Arc::new(provider), IdentitySession::new())?)
}

fn print_device_prompt(prompt: &DevicePrompt) {
    eprintln!("To sign in, open:");
    eprintln!(
        "  {}",
        prompt
            .verification_uri_complete
            .as_deref()
            .unwrap_or(&prompt.verification_uri)
    );
    eprintln!("and enter the code: {}", prompt.user_code);
    eprintln!(
        "(the code expires in {} minutes)",
        prompt.expires_in.as_secs() / 60
    );
}

/// Restore the stored session and authenticate the client with it
pub async fn require_signed_in(client: &FarmFitClient) -> Result<(AuthSession, Principal)> {
    let auth = auth_session(client)?;
    let principal = auth
        .restore()
        .await
        .context("Failed to restore session")?
        .context("Not signed in. Run `farmfit auth login` first.")?;
    client.set_access_token(auth.access_token().await?);
    Ok((auth, principal))
}

/// Print the list every time it settles until Ctrl-C
pub async fn watch_until_interrupted<E, F>(
    sync: &EntitySync<E>,
    output: OutputFormat,
    quiet: bool,
    render: F,
) -> Result<()>
where
    E: Entity + Serialize,
    F: Fn(&[E]),
{
    let mut rx = sync.watch();
    if !quiet && output.is_text() {
        eprintln!("Watching {} (Ctrl-C to stop)", E::COLLECTION);
    }

    loop {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.phase == SyncPhase::Ready {
            if let Some(error) = &snapshot.error {
                eprintln!("warning: {}", error);
            }
            if output.is_text() {
                render(&snapshot.entities);
                println!();
            } else {
                output.print_value(&snapshot.entities)?;
            }
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                sync.deactivate();
                return Ok(());
            }
        }
    }
}

/// Date part of an RFC 3339 timestamp for table cells
pub fn short_date(at: &chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}
