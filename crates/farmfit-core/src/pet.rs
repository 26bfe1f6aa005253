// Pet domain types
//
// Pets are listed in fetch order (sorted by name at the gateway) and are not
// paginated: every refetch replaces the list.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SyncOptions;
use crate::entity::{Entity, OwnerId};
use crate::query::Query;
use crate::sync::EntitySync;

/// Pet species
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Dog,
    Cat,
    Horse,
    Cow,
    Goat,
    Sheep,
    Pig,
    Chicken,
    Other,
}

impl std::fmt::Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Species::Dog => write!(f, "dog"),
            Species::Cat => write!(f, "cat"),
            Species::Horse => write!(f, "horse"),
            Species::Cow => write!(f, "cow"),
            Species::Goat => write!(f, "goat"),
            Species::Sheep => write!(f, "sheep"),
            Species::Pig => write!(f, "pig"),
            Species::Chicken => write!(f, "chicken"),
            Species::Other => write!(f, "other"),
        }
    }
}

impl From<&str> for Species {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "dog" => Species::Dog,
            "cat" => Species::Cat,
            "horse" => Species::Horse,
            "cow" => Species::Cow,
            "goat" => Species::Goat,
            "sheep" => Species::Sheep,
            "pig" => Species::Pig,
            "chicken" => Species::Chicken,
            _ => Species::Other,
        }
    }
}

/// A pet owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub name: String,
    pub species: Species,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Pet {
    type Id = Uuid;
    const COLLECTION: &'static str = "pets";

    fn id(&self) -> &Uuid {
        &self.id
    }

    fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    fn sync_options() -> SyncOptions {
        SyncOptions::new().with_sort_field("name")
    }
}

/// Sync hook over the signed-in user's pets
pub type PetsSync = EntitySync<Pet>;

/// Pet list filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<Species>,
}

impl PetFilters {
    pub fn species(species: Species) -> Self {
        Self {
            species: Some(species),
        }
    }
}

impl From<PetFilters> for Query {
    fn from(filters: PetFilters) -> Self {
        Query::new().filter_opt("species", filters.species)
    }
}

/// Unsaved pet as entered by the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PetDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub species: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PetDraft {
    pub fn new(name: impl Into<String>, species: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            species: species.into(),
            ..Default::default()
        }
    }

    /// Materialize the draft as a new pet owned by `owner`
    pub fn into_pet(self, owner: OwnerId) -> Pet {
        let now = Utc::now();
        Pet {
            id: Uuid::now_v7(),
            owner_id: owner,
            name: self.name.trim().to_string(),
            species: Species::from(self.species.as_str()),
            breed: non_blank(self.breed),
            birth_date: self.birth_date,
            weight_kg: self.weight_kg,
            notes: non_blank(self.notes),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial pet update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl UpdatePet {
    pub fn apply_to(&self, pet: &mut Pet) {
        if let Some(name) = &self.name {
            pet.name = name.clone();
        }
        if let Some(breed) = &self.breed {
            pet.breed = Some(breed.clone());
        }
        if let Some(weight) = self.weight_kg {
            pet.weight_kg = Some(weight);
        }
        if let Some(notes) = &self.notes {
            pet.notes = Some(notes.clone());
        }
        pet.updated_at = Utc::now();
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
