use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domains::registration::types::TranslationMap;
use crate::errors::{DomainError, ValidationError};
use crate::validation::ValidationBuilder;

pub const REFERRAL_CLINIC_CONCEPT_NAME: &str = "Referral Clinic";
pub const REFERRAL_ADDITIONAL_INFO_CONCEPT_NAME: &str = "Referral Additional Info";

pub const FIELD_CLINIC: &str = "clinic";
pub const FIELD_REASON: &str = "reason";

/// Referral of a participant's current visit to another clinic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReferral {
    pub visit_uuid: String,
    pub clinic: String,
    pub reason: String,
}

impl NewReferral {
    pub fn new(visit_uuid: &str, clinic: &str, reason: &str) -> Self {
        Self {
            visit_uuid: visit_uuid.to_string(),
            clinic: clinic.trim().to_string(),
            reason: reason.trim().to_string(),
        }
    }

    /// Every failing field, not just the first
    pub fn field_errors(&self) -> Vec<ValidationError> {
        let checks = [
            ValidationBuilder::new(FIELD_CLINIC, Some(self.clinic.clone())).required(),
            ValidationBuilder::new(FIELD_REASON, Some(self.reason.clone())).required(),
        ];
        checks
            .into_iter()
            .filter_map(|check| check.validate().err())
            .filter_map(|err| match err {
                DomainError::Validation(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Encounter observations recorded on the visit
    pub fn observations(&self) -> BTreeMap<String, String> {
        let mut observations = BTreeMap::new();
        if !self.clinic.is_empty() {
            observations.insert(REFERRAL_CLINIC_CONCEPT_NAME.to_string(), self.clinic.clone());
        }
        if !self.reason.is_empty() {
            observations.insert(REFERRAL_ADDITIONAL_INFO_CONCEPT_NAME.to_string(), self.reason.clone());
        }
        observations
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferralOutcome {
    /// Carries the text shown to the operator
    Referred(String),
    InvalidInput,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferralMessages {
    pub clinic_required: String,
    pub reason_required: String,
    pub success_prefix: String,
    pub failed: String,
}

impl Default for ReferralMessages {
    fn default() -> Self {
        Self {
            clinic_required: "Referral clinic cannot be empty".to_string(),
            reason_required: "Referral reason cannot be empty".to_string(),
            success_prefix: "Participant referred to".to_string(),
            failed: "Referral failed, please try again".to_string(),
        }
    }
}

impl ReferralMessages {
    pub fn localized(&self, loc: &TranslationMap) -> Self {
        let pick = |key: &str, fallback: &String| loc.get(key).cloned().unwrap_or_else(|| fallback.clone());
        Self {
            clinic_required: pick("referral_page_referral_clinic_cannot_be_empty", &self.clinic_required),
            reason_required: pick("referral_page_referral_reason_cannot_be_empty", &self.reason_required),
            success_prefix: pick("referral_page_success_referral_text", &self.success_prefix),
            failed: pick("referral_page_failed_referral_text", &self.failed),
        }
    }

    pub fn success_text(&self, clinic: &str) -> String {
        format!("{} {}", self.success_prefix, clinic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_are_reported_together() {
        let referral = NewReferral::new("visit-1", "  ", "");
        let errors = referral.field_errors();
        let fields: Vec<_> = errors.iter().filter_map(|e| e.field()).collect();
        assert_eq!(fields, vec![FIELD_CLINIC, FIELD_REASON]);
        assert!(referral.observations().is_empty());
    }

    #[test]
    fn test_observations_use_concept_names() {
        let referral = NewReferral::new("visit-1", "Mulago Hospital", " fever ");
        assert!(referral.field_errors().is_empty());
        let observations = referral.observations();
        assert_eq!(observations[REFERRAL_CLINIC_CONCEPT_NAME], "Mulago Hospital");
        assert_eq!(observations[REFERRAL_ADDITIONAL_INFO_CONCEPT_NAME], "fever");
    }

    #[test]
    fn test_localized_success_text() {
        let mut loc = TranslationMap::new();
        loc.insert("referral_page_success_referral_text".to_string(), "Imetumwa kwa".to_string());
        let messages = ReferralMessages::default().localized(&loc);
        assert_eq!(messages.success_text("Mulago"), "Imetumwa kwa Mulago");
        assert_eq!(messages.failed, ReferralMessages::default().failed);
    }
}
