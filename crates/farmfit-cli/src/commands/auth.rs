use anyhow::{Context, Result};
use clap::Subcommand;
use farmfit_client::FarmFitClient;
use farmfit_core::Principal;

use super::auth_session;
use crate::output::{print_field, print_opt_field, OutputFormat};

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Sign in with a device code
    Login,

    /// Sign out and forget stored tokens
    Logout,

    /// Show the signed-in user
    Whoami,
}

pub async fn run(
    command: AuthCommand,
    client: &FarmFitClient,
    output: OutputFormat,
    quiet: bool,
) -> Result<()> {
    match command {
        AuthCommand::Login => login(client, output, quiet).await,
        AuthCommand::Logout => logout(client, quiet).await,
        AuthCommand::Whoami => whoami(client, output).await,
    }
}

async fn login(client: &FarmFitClient, output: OutputFormat, quiet: bool) -> Result<()> {
    let auth = auth_session(client)?;
    let Some(principal) = auth.login().await.context("Login failed")? else {
        anyhow::bail!("Login was cancelled or the device code expired");
    };

    if output.is_text() {
        if quiet {
            println!("{}", principal.subject);
        } else {
            println!("Signed in as {}", principal.display_name());
        }
    } else {
        output.print_value(&principal)?;
    }
    Ok(())
}

async fn logout(client: &FarmFitClient, quiet: bool) -> Result<()> {
    let auth = auth_session(client)?;
    let result = auth.logout().await;
    if !quiet {
        println!("Signed out");
    }
    result.context("Local session cleared, but the identity provider reported an error")
}

async fn whoami(client: &FarmFitClient, output: OutputFormat) -> Result<()> {
    let auth = auth_session(client)?;
    let Some(principal) = auth.restore().await.context("Failed to restore session")? else {
        anyhow::bail!("Not signed in");
    };

    if output.is_text() {
        print_principal(&principal);
    } else {
        output.print_value(&principal)?;
    }
    Ok(())
}

fn print_principal(principal: &Principal) {
    print_field("Subject", principal.subject.as_str());
    print_opt_field("Name", principal.name.as_deref());
    print_opt_field("Email", principal.email.as_deref());
    print_field(
        "Roles",
        &if principal.roles.is_empty() {
            "-".to_string()
        } else {
            principal.roles.join(", ")
        },
    );
}
