// User profile domain types
//
// A "list" of at most one profile per owner, plus the optional practitioner
// details a user fills in to offer veterinary services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SyncOptions;
use crate::entity::{Entity, OwnerId};
use crate::query::Query;
use crate::roles::{Role, RoleSelection};
use crate::sync::EntitySync;

/// Professional details of a veterinary practitioner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PractitionerProfile {
    pub full_name: String,
    pub license_number: String,
    pub specialization: String,
    pub clinic_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_of_experience: Option<u32>,
}

/// Practitioner details as entered in a form; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PractitionerProfileDraft {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub clinic_address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub years_of_experience: Option<u32>,
}

impl PractitionerProfileDraft {
    /// Convert into a profile when every required field is present
    pub fn complete(&self) -> Option<PractitionerProfile> {
        let field = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Some(PractitionerProfile {
            full_name: field(&self.full_name)?,
            license_number: field(&self.license_number)?,
            specialization: field(&self.specialization)?,
            clinic_address: field(&self.clinic_address)?,
            phone: field(&self.phone),
            years_of_experience: self.years_of_experience,
        })
    }
}

impl From<&PractitionerProfile> for PractitionerProfileDraft {
    fn from(profile: &PractitionerProfile) -> Self {
        Self {
            full_name: Some(profile.full_name.clone()),
            license_number: Some(profile.license_number.clone()),
            specialization: Some(profile.specialization.clone()),
            clinic_address: Some(profile.clinic_address.clone()),
            phone: profile.phone.clone(),
            years_of_experience: profile.years_of_experience,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub practitioner: Option<PractitionerProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(owner: OwnerId, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            owner_id: owner,
            display_name: display_name.into(),
            email: None,
            avatar_url: None,
            bio: None,
            roles: vec![Role::PetOwner],
            active_role: Some(Role::PetOwner),
            practitioner: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Granted roles with the stored active role selected.
    ///
    /// A stored active role that is not granted is ignored.
    pub fn role_selection(&self) -> RoleSelection {
        let mut selection = RoleSelection::new(self.roles.clone());
        if let Some(active) = self.active_role {
            let _ = selection.select(active);
        }
        selection
    }

    pub fn is_practitioner(&self) -> bool {
        self.roles.contains(&Role::Practitioner) && self.practitioner.is_some()
    }
}

impl Entity for UserProfile {
    type Id = Uuid;
    const COLLECTION: &'static str = "user_profiles";

    fn id(&self) -> &Uuid {
        &self.id
    }

    fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    fn sync_options() -> SyncOptions {
        SyncOptions::new()
    }
}

pub type UserProfileSync = EntitySync<UserProfile>;

/// Profile filters; the profile is keyed by owner alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfileFilters {}

impl From<UserProfileFilters> for Query {
    fn from(_: UserProfileFilters) -> Self {
        Query::new()
    }
}

impl EntitySync<UserProfile> {
    /// The signed-in user's profile, once loaded
    pub fn profile(&self) -> Option<UserProfile> {
        self.entities().into_iter().next()
    }
}
