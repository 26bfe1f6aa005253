use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use farmfit_client::FarmFitClient;
use farmfit_core::{validate_pet, EntityWriter, Pet, PetDraft, PetFilters, Species};

use super::{require_signed_in, short_date, watch_until_interrupted};
use crate::output::{print_field, print_opt_field, OutputFormat, Table};

#[derive(Subcommand)]
pub enum PetsCommand {
    /// List your pets
    List {
        /// Only pets of this species (dog, cat, horse, ...)
        #[arg(long)]
        species: Option<String>,
    },

    /// Register a new pet
    Add {
        /// Pet name
        #[arg(long)]
        name: String,

        /// Species (dog, cat, horse, cow, goat, sheep, pig, chicken, other)
        #[arg(long)]
        species: String,

        /// Breed
        #[arg(long)]
        breed: Option<String>,

        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<NaiveDate>,

        /// Weight in kilograms
        #[arg(long)]
        weight: Option<f64>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Follow live changes to your pets
    Watch {
        /// Only pets of this species
        #[arg(long)]
        species: Option<String>,
    },
}

pub async fn run(
    command: PetsCommand,
    client: &FarmFitClient,
    output: OutputFormat,
    quiet: bool,
) -> Result<()> {
    match command {
        PetsCommand::List { species } => list(client, output, species).await,
        PetsCommand::Add {
            name,
            species,
            breed,
            birth_date,
            weight,
            notes,
        } => {
            let draft = PetDraft {
                name,
                species,
                breed,
                birth_date,
                weight_kg: weight,
                notes,
            };
            add(client, output, quiet, draft).await
        }
        PetsCommand::Watch { species } => watch(client, output, quiet, species).await,
    }
}

fn filters(species: Option<String>) -> PetFilters {
    PetFilters {
        species: species.map(|s| Species::from(s.as_str())),
    }
}

async fn list(client: &FarmFitClient, output: OutputFormat, species: Option<String>) -> Result<()> {
    let (_auth, principal) = require_signed_in(client).await?;
    let sync = client.listing::<Pet>();
    sync.activate(principal.subject, filters(species).into())
        .await
        .context("Failed to load pets")?;

    let pets = sync.entities();
    if output.is_text() {
        if pets.is_empty() {
            println!("No pets found");
            return Ok(());
        }
        print_table(&pets);
    } else {
        output.print_value(&pets)?;
    }
    Ok(())
}

fn print_table(pets: &[Pet]) {
    let table = Table::new(&[("ID", 36), ("NAME", 20), ("SPECIES", 8), ("BREED", 20), ("BORN", 10)]);
    for pet in pets {
        let born = pet
            .birth_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.row([
            pet.id.to_string().as_str(),
            pet.name.as_str(),
            pet.species.to_string().as_str(),
            pet.breed.as_deref().unwrap_or("-"),
            born.as_str(),
        ]);
    }
}

async fn add(client: &FarmFitClient, output: OutputFormat, quiet: bool, draft: PetDraft) -> Result<()> {
    let validation = validate_pet(&draft);
    if !validation.is_valid {
        for (field, message) in &validation.errors {
            eprintln!("{}: {}", field, message);
        }
        anyhow::bail!("Pet details are incomplete");
    }

    let (_auth, principal) = require_signed_in(client).await?;
    let pet = client
        .gateway::<Pet>()
        .insert(&draft.into_pet(principal.subject))
        .await
        .context("Failed to save pet")?;

    if output.is_text() {
        if quiet {
            println!("{}", pet.id);
        } else {
            println!("Added pet: {}", pet.id);
            print_field("Name", &pet.name);
            print_field("Species", &pet.species.to_string());
            print_opt_field("Breed", pet.breed.as_deref());
            print_field("Created", &short_date(&pet.created_at));
        }
    } else {
        output.print_value(&pet)?;
    }
    Ok(())
}

async fn watch(
    client: &FarmFitClient,
    output: OutputFormat,
    quiet: bool,
    species: Option<String>,
) -> Result<()> {
    let (auth, _principal) = require_signed_in(client).await?;
    let sync = client.sync::<Pet>();
    sync.bind(auth.session(), filters(species).into());

    watch_until_interrupted(&sync, output, quiet, |pets| {
        if pets.is_empty() {
            println!("No pets found");
        } else {
            print_table(pets);
        }
    })
    .await
}
