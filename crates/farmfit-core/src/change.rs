// Change events delivered by a gateway subscription

use crate::entity::Entity;

/// Notification of a write against the authoritative copy of an entity.
///
/// Delivered out-of-band relative to fetches; no ordering is assumed
/// between a fetch result and the events touching the same ids.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<E: Entity> {
    Inserted(E),
    Updated(E),
    Deleted(E::Id),
}

/// Discriminant of a [`ChangeEvent`], handy for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Inserted => write!(f, "inserted"),
            ChangeKind::Updated => write!(f, "updated"),
            ChangeKind::Deleted => write!(f, "deleted"),
        }
    }
}

impl<E: Entity> ChangeEvent<E> {
    /// Id of the entity this event touches
    pub fn entity_id(&self) -> &E::Id {
        match self {
            ChangeEvent::Inserted(e) | ChangeEvent::Updated(e) => e.id(),
            ChangeEvent::Deleted(id) => id,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Inserted(_) => ChangeKind::Inserted,
            ChangeEvent::Updated(_) => ChangeKind::Updated,
            ChangeEvent::Deleted(_) => ChangeKind::Deleted,
        }
    }
}
