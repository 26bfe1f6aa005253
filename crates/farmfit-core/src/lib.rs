// FarmFit Sync Core
//
// This crate provides a backend-agnostic client data layer for FarmFit:
// each domain (pets, posts, journals, user profile) is kept as a local list
// that is fetched once, then reconciled against a live change feed.
//
// Key design decisions:
// - Uses traits (DataGateway, IdentityProvider, TokenStore) for pluggable backends
// - EntitySync is generic over the Entity trait; domains only add types and presets
// - Identity is an explicitly owned IdentitySession, not ambient state
// - Every activation/refetch carries a generation; stale responses are dropped
// - Subscriptions are owned handles released on drop
// - Validation returns field-keyed results and never fails

pub mod change;
pub mod config;
pub mod entity;
pub mod entity_list;
pub mod error;
pub mod query;
pub mod subscription;
pub mod sync;
pub mod traits;

// Identity
pub mod auth;
pub mod roles;
pub mod session;

// Domain entity types
pub mod journal;
pub mod pet;
pub mod post;
pub mod user_profile;

pub mod validation;

// In-memory implementations for demos and testing
pub mod memory;

// Re-exports for convenience
pub use auth::AuthSession;
pub use change::{ChangeEvent, ChangeKind};
pub use config::{ListOrdering, SyncOptions, SyncOptionsBuilder};
pub use entity::{Entity, OwnerId};
pub use entity_list::{Applied, EntityList};
pub use error::{Result, SyncError};
pub use query::{Query, SortOrder};
pub use roles::{is_permitted, is_permitted_by_name, Role, RoleRequirement, RoleSelection};
pub use session::{Credential, IdentitySession, Principal};
pub use subscription::SubscriptionHandle;
pub use sync::{EntitySync, SyncPhase, SyncSnapshot};
pub use traits::{ChangeStream, DataGateway, EntityWriter, IdentityProvider, TokenStore};

pub use journal::{Journal, JournalDraft, JournalFilters, JournalsSync};
pub use pet::{Pet, PetDraft, PetFilters, PetsSync, Species, UpdatePet};
pub use post::{Post, PostDraft, PostFilters, PostType, PostsSync, Visibility};
pub use user_profile::{
    PractitionerProfile, PractitionerProfileDraft, UserProfile, UserProfileFilters,
    UserProfileSync,
};
pub use validation::{
    validate_pet, validate_post, validate_practitioner_profile, ValidationResult,
};
