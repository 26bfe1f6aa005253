// Form validation
//
// Field-presence checks for user-entered drafts. Validation never fails:
// problems come back as a field-keyed map of messages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pet::PetDraft;
use crate::post::{PostDraft, MAX_POST_LENGTH};
use crate::user_profile::PractitionerProfileDraft;

/// Outcome of validating a draft
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Field name -> message
    pub errors: BTreeMap<String, String>,
}

impl ValidationResult {
    fn from_errors(errors: BTreeMap<String, String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn require(errors: &mut BTreeMap<String, String>, field: &str, label: &str, value: Option<&str>) {
    if is_blank(value) {
        errors.insert(field.to_string(), format!("{label} is required"));
    }
}

/// Check the four required practitioner fields
pub fn validate_practitioner_profile(draft: &PractitionerProfileDraft) -> ValidationResult {
    let mut errors = BTreeMap::new();
    require(&mut errors, "full_name", "Full name", draft.full_name.as_deref());
    require(
        &mut errors,
        "license_number",
        "License number",
        draft.license_number.as_deref(),
    );
    require(
        &mut errors,
        "specialization",
        "Specialization",
        draft.specialization.as_deref(),
    );
    require(
        &mut errors,
        "clinic_address",
        "Clinic address",
        draft.clinic_address.as_deref(),
    );
    ValidationResult::from_errors(errors)
}

pub fn validate_pet(draft: &PetDraft) -> ValidationResult {
    let mut errors = BTreeMap::new();
    require(&mut errors, "name", "Name", Some(&draft.name));
    require(&mut errors, "species", "Species", Some(&draft.species));
    if let Some(weight) = draft.weight_kg {
        if weight.is_nan() || weight <= 0.0 {
            errors.insert(
                "weight_kg".to_string(),
                "Weight must be greater than zero".to_string(),
            );
        }
    }
    ValidationResult::from_errors(errors)
}

pub fn validate_post(draft: &PostDraft) -> ValidationResult {
    let mut errors = BTreeMap::new();
    require(&mut errors, "content", "Content", Some(&draft.content));
    if draft.content.chars().count() > MAX_POST_LENGTH {
        errors.insert(
            "content".to_string(),
            format!("Content must be at most {MAX_POST_LENGTH} characters"),
        );
    }
    ValidationResult::from_errors(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_practitioner_profile() {
        let result = validate_practitioner_profile(&PractitionerProfileDraft::default());

        assert!(!result.is_valid);
        let keys: Vec<&str> = result.errors.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["clinic_address", "full_name", "license_number", "specialization"]
        );
    }

    #[test]
    fn test_blank_fields_count_as_missing() {
        let draft = PractitionerProfileDraft {
            full_name: Some("Dr. Moss".to_string()),
            license_number: Some("   ".to_string()),
            specialization: Some("Equine".to_string()),
            clinic_address: Some("1 Barn Lane".to_string()),
            ..Default::default()
        };
        let result = validate_practitioner_profile(&draft);

        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.error("license_number"), Some("License number is required"));
    }

    #[test]
    fn test_complete_practitioner_profile() {
        let draft = PractitionerProfileDraft {
            full_name: Some("Dr. Moss".to_string()),
            license_number: Some("VET-1".to_string()),
            specialization: Some("Equine".to_string()),
            clinic_address: Some("1 Barn Lane".to_string()),
            ..Default::default()
        };
        let result = validate_practitioner_profile(&draft);
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_validate_pet() {
        assert!(validate_pet(&PetDraft::new("Rex", "dog")).is_valid);

        let result = validate_pet(&PetDraft::default());
        assert!(result.error("name").is_some());
        assert!(result.error("species").is_some());

        let mut draft = PetDraft::new("Rex", "dog");
        draft.weight_kg = Some(0.0);
        assert!(validate_pet(&draft).error("weight_kg").is_some());
    }

    #[test]
    fn test_validate_post() {
        assert!(validate_post(&PostDraft::new("Hello farm")).is_valid);
        assert!(!validate_post(&PostDraft::new("  ")).is_valid);

        let long = "a".repeat(MAX_POST_LENGTH + 1);
        let result = validate_post(&PostDraft::new(long));
        assert!(result.error("content").unwrap().contains("at most"));
    }
}
