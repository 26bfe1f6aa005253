use anyhow::{Context, Result};
use clap::Subcommand;
use farmfit_client::FarmFitClient;
use farmfit_core::{EntityWriter, Journal, JournalDraft, JournalFilters};
use uuid::Uuid;

use super::{require_signed_in, short_date};
use crate::output::{print_field, OutputFormat, Table};

#[derive(Subcommand)]
pub enum JournalsCommand {
    /// List journal entries, newest first
    List {
        /// Only entries about this pet
        #[arg(long)]
        pet: Option<Uuid>,

        /// Maximum number of entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Write a journal entry
    Add {
        /// Entry title
        #[arg(long)]
        title: String,

        /// Entry text
        #[arg(long, default_value = "")]
        body: String,

        /// Pet the entry is about
        #[arg(long)]
        pet: Option<Uuid>,

        /// Mood tag
        #[arg(long)]
        mood: Option<String>,
    },
}

pub async fn run(
    command: JournalsCommand,
    client: &FarmFitClient,
    output: OutputFormat,
    quiet: bool,
) -> Result<()> {
    match command {
        JournalsCommand::List { pet, limit } => {
            let mut filters = JournalFilters {
                pet_id: pet,
                ..Default::default()
            };
            if let Some(limit) = limit {
                filters.limit = limit;
            }
            list(client, output, filters).await
        }
        JournalsCommand::Add {
            title,
            body,
            pet,
            mood,
        } => {
            let draft = JournalDraft {
                pet_id: pet,
                title,
                body,
                mood,
            };
            add(client, output, quiet, draft).await
        }
    }
}

async fn list(client: &FarmFitClient, output: OutputFormat, filters: JournalFilters) -> Result<()> {
    let (_auth, principal) = require_signed_in(client).await?;
    let sync = client.listing::<Journal>();
    sync.activate(principal.subject, filters.into())
        .await
        .context("Failed to load journal")?;

    let entries = sync.entities();
    if output.is_text() {
        if entries.is_empty() {
            println!("No journal entries found");
            return Ok(());
        }
        let table = Table::new(&[("ID", 36), ("DATE", 10), ("MOOD", 10), ("TITLE", 30)]);
        for entry in &entries {
            table.row([
                entry.id.to_string().as_str(),
                short_date(&entry.created_at).as_str(),
                entry.mood.as_deref().unwrap_or("-"),
                entry.title.as_str(),
            ]);
        }
    } else {
        output.print_value(&entries)?;
    }
    Ok(())
}

async fn add(
    client: &FarmFitClient,
    output: OutputFormat,
    quiet: bool,
    draft: JournalDraft,
) -> Result<()> {
    if draft.title.trim().is_empty() {
        anyhow::bail!("--title must not be blank");
    }

    let (_auth, principal) = require_signed_in(client).await?;
    let entry = client
        .gateway::<Journal>()
        .insert(&draft.into_journal(principal.subject))
        .await
        .context("Failed to save journal entry")?;

    if output.is_text() {
        if quiet {
            println!("{}", entry.id);
        } else {
            println!("Added journal entry: {}", entry.id);
            print_field("Title", &entry.title);
        }
    } else {
        output.print_value(&entry)?;
    }
    Ok(())
}
