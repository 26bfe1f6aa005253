// Role/capability gate
//
// A pure predicate deciding whether role-protected content is shown for the
// currently selected active role. Anything malformed is "not permitted".

use serde::{Deserialize, Serialize};

/// Roles a principal can be granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    PetOwner,
    Practitioner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::PetOwner => "pet_owner",
            Role::Practitioner => "practitioner",
            Role::Admin => "admin",
        }
    }

    /// Parse a role name; unknown names yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pet_owner" | "owner" => Some(Role::PetOwner),
            "practitioner" | "vet" => Some(Role::Practitioner),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access requirement attached to a piece of content
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "roles")]
pub enum RoleRequirement {
    /// No role needed
    #[default]
    Open,
    /// Exactly this role
    Role(Role),
    /// Any of these roles; an empty list admits nobody
    AnyOf(Vec<Role>),
}

impl RoleRequirement {
    /// Build a requirement from role names.
    ///
    /// No names means open content. Any unknown name makes the whole
    /// requirement unsatisfiable.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        if names.is_empty() {
            return RoleRequirement::Open;
        }
        let parsed: Option<Vec<Role>> = names.iter().map(|n| Role::parse(n.as_ref())).collect();
        match parsed {
            Some(roles) if roles.len() == 1 => RoleRequirement::Role(roles[0]),
            Some(roles) => RoleRequirement::AnyOf(roles),
            None => RoleRequirement::AnyOf(Vec::new()),
        }
    }
}

/// Decide whether content with `required` renders for `active_role`
pub fn is_permitted(active_role: Option<Role>, required: &RoleRequirement) -> bool {
    match required {
        RoleRequirement::Open => true,
        RoleRequirement::Role(role) => active_role == Some(*role),
        RoleRequirement::AnyOf(roles) => active_role.is_some_and(|active| roles.contains(&active)),
    }
}

/// String-level variant of [`is_permitted`] for role names coming from
/// untrusted input. An unparseable active role is never permitted, except
/// for open content.
pub fn is_permitted_by_name<S: AsRef<str>>(active_role: Option<&str>, required: &[S]) -> bool {
    let requirement = RoleRequirement::from_names(required.iter().map(|s| s.as_ref()));
    if requirement == RoleRequirement::Open {
        return true;
    }
    is_permitted(active_role.and_then(Role::parse), &requirement)
}

/// Error returned when selecting a role the principal does not hold
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Role not granted: {0}")]
pub struct RoleNotGranted(pub Role);

/// A principal's granted roles plus the one currently acting
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleSelection {
    granted: Vec<Role>,
    active: Option<Role>,
}

impl RoleSelection {
    /// Start with the first granted role active
    pub fn new(granted: Vec<Role>) -> Self {
        let active = granted.first().copied();
        Self { granted, active }
    }

    /// Parse granted role names, skipping unknown ones
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut granted: Vec<Role> = Vec::new();
        for role in names.into_iter().filter_map(|n| Role::parse(n.as_ref())) {
            if !granted.contains(&role) {
                granted.push(role);
            }
        }
        Self::new(granted)
    }

    pub fn granted(&self) -> &[Role] {
        &self.granted
    }

    pub fn active(&self) -> Option<Role> {
        self.active
    }

    pub fn has(&self, role: Role) -> bool {
        self.granted.contains(&role)
    }

    /// Switch the active role
    pub fn select(&mut self, role: Role) -> Result<(), RoleNotGranted> {
        if !self.has(role) {
            return Err(RoleNotGranted(role));
        }
        self.active = Some(role);
        Ok(())
    }

    pub fn permits(&self, required: &RoleRequirement) -> bool {
        is_permitted(self.active, required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_permitted() {
        let practitioner_only = RoleRequirement::AnyOf(vec![Role::Practitioner]);

        assert!(!is_permitted(Some(Role::Admin), &practitioner_only));
        assert!(is_permitted(Some(Role::Practitioner), &practitioner_only));
        assert!(is_permitted(Some(Role::Admin), &RoleRequirement::Open));
        assert!(is_permitted(None, &RoleRequirement::Open));
        assert!(is_permitted(
            Some(Role::Admin),
            &RoleRequirement::Role(Role::Admin)
        ));
        assert!(!is_permitted(None, &RoleRequirement::Role(Role::Admin)));
        assert!(!is_permitted(
            Some(Role::Admin),
            &RoleRequirement::AnyOf(Vec::new())
        ));
    }

    #[test]
    fn test_is_permitted_by_name() {
        assert!(!is_permitted_by_name(Some("admin"), &["practitioner"]));
        assert!(is_permitted_by_name(Some("practitioner"), &["practitioner"]));
        assert!(is_permitted_by_name(Some("anything"), &[] as &[&str]));
        assert!(is_permitted_by_name(None, &[] as &[&str]));
        assert!(!is_permitted_by_name(Some("wizard"), &["admin"]));
        assert!(!is_permitted_by_name(Some("admin"), &["admin", "wizard"]));
    }

    #[test]
    fn test_requirement_from_names() {
        assert_eq!(
            RoleRequirement::from_names(Vec::<String>::new()),
            RoleRequirement::Open
        );
        assert_eq!(
            RoleRequirement::from_names(["vet"]),
            RoleRequirement::Role(Role::Practitioner)
        );
        assert_eq!(
            RoleRequirement::from_names(["admin", "practitioner"]),
            RoleRequirement::AnyOf(vec![Role::Admin, Role::Practitioner])
        );
    }

    #[test]
    fn test_role_selection() {
        let mut selection = RoleSelection::from_names(["pet_owner", "practitioner", "pet_owner", "ghost"]);
        assert_eq!(selection.granted(), &[Role::PetOwner, Role::Practitioner]);
        assert_eq!(selection.active(), Some(Role::PetOwner));

        assert_eq!(selection.select(Role::Admin), Err(RoleNotGranted(Role::Admin)));
        selection.select(Role::Practitioner).unwrap();
        assert!(selection.permits(&RoleRequirement::Role(Role::Practitioner)));
        assert!(!selection.permits(&RoleRequirement::Role(Role::Admin)));
    }

    #[test]
    fn test_empty_selection_has_no_active_role() {
        let selection = RoleSelection::new(Vec::new());
        assert_eq!(selection.active(), None);
        assert!(selection.permits(&RoleRequirement::Open));
    }
}
