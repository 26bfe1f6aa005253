use anyhow::{Context, Result};
use clap::Subcommand;
use farmfit_client::FarmFitClient;
use farmfit_core::{
    validate_practitioner_profile, PractitionerProfileDraft, RoleRequirement, RoleSelection,
    UserProfile, UserProfileFilters,
};
use serde::Serialize;

use super::require_signed_in;
use crate::output::{print_field, print_opt_field, OutputFormat};

#[derive(Subcommand)]
pub enum ProfileCommand {
    /// Show your profile
    Show,

    /// Check practitioner details before submitting them
    ValidatePractitioner {
        #[arg(long)]
        full_name: Option<String>,

        #[arg(long)]
        license_number: Option<String>,

        #[arg(long)]
        specialization: Option<String>,

        #[arg(long)]
        clinic_address: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        years_of_experience: Option<u32>,
    },

    /// Check whether your active role may open a screen
    CanAccess {
        /// Roles allowed to access (pet_owner, practitioner, admin); none means open
        #[arg(long, num_args = 0..)]
        required: Vec<String>,
    },
}

#[derive(Serialize)]
struct AccessDecision {
    permitted: bool,
    active_role: Option<String>,
    required: Vec<String>,
}

pub async fn run(
    command: ProfileCommand,
    client: &FarmFitClient,
    output: OutputFormat,
    _quiet: bool,
) -> Result<()> {
    match command {
        ProfileCommand::Show => show(client, output).await,
        ProfileCommand::ValidatePractitioner {
            full_name,
            license_number,
            specialization,
            clinic_address,
            phone,
            years_of_experience,
        } => {
            let draft = PractitionerProfileDraft {
                full_name,
                license_number,
                specialization,
                clinic_address,
                phone,
                years_of_experience,
            };
            validate_practitioner(output, &draft)
        }
        ProfileCommand::CanAccess { required } => can_access(client, output, required).await,
    }
}

async fn load_profile(client: &FarmFitClient) -> Result<(RoleSelection, Option<UserProfile>)> {
    let (_auth, principal) = require_signed_in(client).await?;
    let sync = client.listing::<UserProfile>();
    sync.activate(principal.subject.clone(), UserProfileFilters::default().into())
        .await
        .context("Failed to load profile")?;

    let profile = sync.profile();
    let roles = match &profile {
        Some(profile) => profile.role_selection(),
        None => RoleSelection::from_names(&principal.roles),
    };
    Ok((roles, profile))
}

async fn show(client: &FarmFitClient, output: OutputFormat) -> Result<()> {
    let (roles, profile) = load_profile(client).await?;
    let Some(profile) = profile else {
        anyhow::bail!("No profile found for the signed-in user");
    };

    if !output.is_text() {
        return output.print_value(&profile);
    }

    print_field("ID", &profile.id.to_string());
    print_field("Display name", &profile.display_name);
    print_opt_field("Email", profile.email.as_deref());
    print_opt_field("Bio", profile.bio.as_deref());
    let granted: Vec<&str> = roles.granted().iter().map(|r| r.as_str()).collect();
    print_field("Roles", &granted.join(", "));
    print_opt_field("Active role", roles.active().map(|r| r.as_str()));
    if let Some(practitioner) = &profile.practitioner {
        print_field("License", &practitioner.license_number);
        print_field("Specialization", &practitioner.specialization);
        print_field("Clinic", &practitioner.clinic_address);
    }
    Ok(())
}

fn validate_practitioner(output: OutputFormat, draft: &PractitionerProfileDraft) -> Result<()> {
    let result = validate_practitioner_profile(draft);

    if output.is_text() {
        if result.is_valid {
            println!("Practitioner profile is complete");
        } else {
            for (field, message) in &result.errors {
                println!("{}: {}", field, message);
            }
        }
    } else {
        output.print_value(&result)?;
    }

    if !result.is_valid {
        anyhow::bail!("{} required field(s) missing", result.errors.len());
    }
    Ok(())
}

async fn can_access(client: &FarmFitClient, output: OutputFormat, required: Vec<String>) -> Result<()> {
    let (roles, _profile) = load_profile(client).await?;
    let requirement = RoleRequirement::from_names(&required);
    let decision = AccessDecision {
        permitted: roles.permits(&requirement),
        active_role: roles.active().map(|r| r.as_str().to_string()),
        required,
    };

    if output.is_text() {
        println!("{}", if decision.permitted { "allowed" } else { "denied" });
    } else {
        output.print_value(&decision)?;
    }

    if !decision.permitted {
        anyhow::bail!("Active role does not grant access");
    }
    Ok(())
}
