use crate::domains::registration::types::TranslationMap;
use crate::errors::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registration workflow settings. Every field has a default so partial JSON is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationSettings {
    /// Delay before a field is validated while the operator is still typing
    pub inline_validation_delay_ms: u64,

    /// Person language submitted when no language was picked
    pub default_language: String,

    /// Child category options, localized through the translation map
    pub child_categories: Vec<String>,

    /// Longest side of a compressed participant picture, in pixels
    pub picture_max_dimension: u32,

    /// JPEG quality used when re-encoding the participant picture (1-100)
    pub picture_jpeg_quality: u8,

    /// Whether birth weight blocks submission when left empty
    pub require_birth_weight: bool,

    pub messages: RegistrationMessages,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            inline_validation_delay_ms: 2000,
            default_language: "English".to_string(),
            child_categories: vec![
                "National".to_string(),
                "Foreigner".to_string(),
                "Refugee".to_string(),
            ],
            picture_max_dimension: 1024,
            picture_jpeg_quality: 70,
            require_birth_weight: true,
            messages: RegistrationMessages::default(),
        }
    }
}

impl RegistrationSettings {
    pub fn from_json_str(json: &str) -> ServiceResult<Self> {
        let settings: RegistrationSettings = serde_json::from_str(json)
            .map_err(|e| ServiceError::Configuration(format!("Invalid registration settings: {}", e)))?;
        if !(1..=100).contains(&settings.picture_jpeg_quality) {
            return Err(ServiceError::Configuration(format!(
                "picture_jpeg_quality must be between 1 and 100, got {}",
                settings.picture_jpeg_quality
            )));
        }
        if settings.picture_max_dimension == 0 {
            return Err(ServiceError::Configuration(
                "picture_max_dimension must be positive".to_string(),
            ));
        }
        Ok(settings)
    }

    pub fn inline_validation_delay(&self) -> Duration {
        Duration::from_millis(self.inline_validation_delay_ms)
    }
}

/// User-facing messages shown next to fields or in failure dialogs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationMessages {
    pub no_participant_id: String,
    pub invalid_participant_id: String,
    pub participant_already_exists: String,
    pub no_gender: String,
    pub no_birth_date: String,
    pub no_birth_weight: String,
    pub no_home_location: String,
    pub no_mother_name: String,
    pub letters_only: String,
    pub invalid_phone: String,
    pub nin_wrong_format: String,
    pub nin_already_exists: String,
    pub general_error: String,
}

impl Default for RegistrationMessages {
    fn default() -> Self {
        Self {
            no_participant_id: "Please enter a participant ID".to_string(),
            invalid_participant_id: "The participant ID is not valid".to_string(),
            participant_already_exists: "A participant with this ID already exists".to_string(),
            no_gender: "Please select a gender".to_string(),
            no_birth_date: "Please select a date of birth".to_string(),
            no_birth_weight: "Please enter birth weight as a number".to_string(),
            no_home_location: "Please set the home location".to_string(),
            no_mother_name: "Please enter the mother's name".to_string(),
            letters_only: "Only letters are allowed".to_string(),
            invalid_phone: "Please enter a valid phone number".to_string(),
            nin_wrong_format: "The national ID number has a wrong format".to_string(),
            nin_already_exists: "This national ID number is already registered".to_string(),
            general_error: "Something went wrong".to_string(),
        }
    }
}

impl RegistrationMessages {
    /// Returns a copy where every message with a translation in `loc` is replaced.
    pub fn localized(&self, loc: &TranslationMap) -> Self {
        let mut localized = self.clone();
        for (key, message) in localized.entries_mut() {
            if let Some(translated) = loc.get(key) {
                *message = translated.clone();
            }
        }
        localized
    }

    fn entries_mut(&mut self) -> [(&'static str, &mut String); 13] {
        [
            ("participant_registration_details_error_no_participant_id", &mut self.no_participant_id),
            ("participant_registration_details_error_invalid_participant_id", &mut self.invalid_participant_id),
            ("participant_registration_details_error_participant_already_exists", &mut self.participant_already_exists),
            ("participant_registration_details_error_no_gender", &mut self.no_gender),
            ("participant_registration_details_error_no_birthday", &mut self.no_birth_date),
            ("participant_registration_details_error_no_birth_weight", &mut self.no_birth_weight),
            ("participant_registration_details_error_no_home_location", &mut self.no_home_location),
            ("participant_registration_details_error_no_mother_name", &mut self.no_mother_name),
            ("participant_registration_details_error_no_letters_used", &mut self.letters_only),
            ("participant_registration_details_error_no_phone", &mut self.invalid_phone),
            ("participant_registration_details_error_nin_wrong_format", &mut self.nin_wrong_format),
            ("participant_registration_details_error_nin_already_exist", &mut self.nin_already_exists),
            ("general_label_error", &mut self.general_error),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = RegistrationSettings::from_json_str(r#"{"inline_validation_delay_ms": 500}"#).unwrap();
        assert_eq!(settings.inline_validation_delay(), Duration::from_millis(500));
        assert_eq!(settings.default_language, "English");
        assert_eq!(settings.child_categories.len(), 3);
        assert!(settings.require_birth_weight);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(RegistrationSettings::from_json_str(r#"{"picture_jpeg_quality": 0}"#).is_err());
        assert!(RegistrationSettings::from_json_str(r#"{"picture_max_dimension": 0}"#).is_err());
        assert!(RegistrationSettings::from_json_str("not json").is_err());
    }

    #[test]
    fn test_messages_localized_by_key() {
        let mut loc = TranslationMap::new();
        loc.insert(
            "participant_registration_details_error_no_gender".to_string(),
            "Chagua jinsia".to_string(),
        );
        let messages = RegistrationMessages::default().localized(&loc);
        assert_eq!(messages.no_gender, "Chagua jinsia");
        assert_eq!(messages.no_birth_date, RegistrationMessages::default().no_birth_date);
    }
}
