use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// Localization key -> localized string
pub type TranslationMap = HashMap<String, String>;

/// Display format for birth dates
pub const BIRTH_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

impl FromStr for Gender {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MALE" | "M" => Ok(Gender::Male),
            "FEMALE" | "F" => Ok(Gender::Female),
            _ => Err(ValidationError::invalid_value("gender", format!("unknown gender '{}'", s))),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured home address, keyed by address component (country, district, village, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address(pub BTreeMap<String, String>);

impl Address {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    /// An address without any non-blank component counts as empty
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| v.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub uuid: String,
    pub name: String,
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vaccine {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonLanguage {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub is_auto_generate_participant_id: bool,
    pub vaccines: Vec<Vaccine>,
    pub person_languages: Vec<PersonLanguage>,
}

/// A selectable option: the stored value and its localized label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayValue {
    pub value: String,
    pub display: String,
}

impl DisplayValue {
    /// Falls back to the raw value when no translation exists
    pub fn localized(value: &str, loc: &TranslationMap) -> Self {
        Self {
            value: value.to_string(),
            display: loc.get(value).cloned().unwrap_or_else(|| value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NinIdentifier {
    pub identifier_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IrisPosition {
    Left,
    Right,
}

/// Which eyes were scanned before entering the wizard
pub type IrisScans = BTreeMap<IrisPosition, bool>;

/// Raw or compressed picture bytes; serialized as base64
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBytes(pub Vec<u8>);

impl ImageBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ImageBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageBytes({} bytes)", self.0.len())
    }
}

impl Serialize for ImageBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for ImageBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(ImageBytes)
            .map_err(serde::de::Error::custom)
    }
}

/// Opaque biometrics template blob built from the temporary iris scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiometricsTemplateBytes(pub Vec<u8>);

/// Result shown to the operator after a successful registration or update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub participant_uuid: String,
    pub participant_id: String,
    pub gender: Gender,
    pub birth_date_text: String,
    pub is_birth_date_estimated: bool,
    pub vaccine: Option<String>,
    pub picture: Option<ImageBytes>,
}

/// Values of an existing participant used when the wizard is entered in update mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantPrefill {
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    pub is_birth_date_estimated: bool,
    pub nin: Option<String>,
    pub mother_name: Option<String>,
    pub father_name: Option<String>,
    pub child_name: Option<String>,
    pub birth_weight: Option<String>,
    pub home_location: Option<Address>,
    pub home_location_label: Option<String>,
    pub child_category: Option<String>,
}

/// Arguments the wizard is entered with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationArgs {
    pub participant_id: Option<String>,
    pub is_manual_set_participant_id: bool,
    pub left_eye_scanned: bool,
    pub right_eye_scanned: bool,
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
    /// Present only when editing an existing participant
    pub participant_uuid: Option<String>,
    pub prefill: Option<ParticipantPrefill>,
}

impl RegistrationArgs {
    pub fn is_update(&self) -> bool {
        self.participant_uuid.is_some()
    }
}

/// First dosing visit scheduled together with a registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleFirstVisit {
    pub visit_type: String,
    pub start_datetime: DateTime<Utc>,
    pub location_uuid: String,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterParticipant {
    pub participant_id: String,
    pub nin: Option<String>,
    pub gender: Gender,
    pub is_birth_date_estimated: bool,
    pub birth_date: NaiveDate,
    pub address: Address,
    pub attributes: BTreeMap<String, String>,
    pub image: Option<ImageBytes>,
    pub biometrics_template: Option<BiometricsTemplateBytes>,
    pub schedule_first_visit: ScheduleFirstVisit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateParticipant {
    pub participant_uuid: String,
    pub participant_id: String,
    pub nin: Option<String>,
    pub gender: Gender,
    pub is_birth_date_estimated: bool,
    pub birth_date: NaiveDate,
    pub address: Address,
    pub attributes: BTreeMap<String, String>,
    pub image: Option<ImageBytes>,
    pub schedule_first_visit: ScheduleFirstVisit,
}

/// Participant as stored locally after register/update, pending sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftParticipant {
    pub participant_uuid: String,
    pub participant_id: String,
    pub registration_date: DateTime<Utc>,
}

/// What identifies a participant when looking for existing records. At least one
/// criterion must be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticipantIdentificationCriteria {
    pub participant_id: Option<String>,
    pub phone: Option<String>,
    pub biometrics_template: Option<BiometricsTemplateBytes>,
}

impl ParticipantIdentificationCriteria {
    pub fn is_empty(&self) -> bool {
        self.participant_id.is_none() && self.phone.is_none() && self.biometrics_template.is_none()
    }
}

/// An existing participant found for a set of identification criteria
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantMatch {
    pub participant_uuid: String,
    pub participant_id: Option<String>,
    pub telephone: Option<String>,
    /// Iris matching score, present only for biometric matches
    pub matching_score: Option<u32>,
}

/// Text shown for an estimated birth date: days under a month, months under two years, else years.
/// A birth date after `today` reads as "0 days".
pub fn calculate_age_from_date(birth_date: NaiveDate, today: NaiveDate) -> String {
    let birth_date = birth_date.min(today);
    let total_days = (today - birth_date).num_days();
    let mut total_months = (today.year() - birth_date.year()) * 12
        + today.month() as i32
        - birth_date.month() as i32;
    if today.day() < birth_date.day() {
        total_months -= 1;
    }

    if total_days < 30 {
        format!("{} days", total_days)
    } else if total_months < 24 {
        format!("{} months", total_months)
    } else {
        format!("{} years", total_months / 12)
    }
}

pub fn format_birth_date(birth_date: NaiveDate) -> String {
    birth_date.format(BIRTH_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_buckets() {
        let today = date(2024, 3, 10);
        assert_eq!(calculate_age_from_date(date(2024, 3, 1), today), "9 days");
        assert_eq!(calculate_age_from_date(date(2023, 11, 15), today), "3 months");
        assert_eq!(calculate_age_from_date(date(2022, 3, 11), today), "23 months");
        assert_eq!(calculate_age_from_date(date(2022, 3, 10), today), "2 years");
        assert_eq!(calculate_age_from_date(date(2014, 6, 1), today), "9 years");
    }

    #[test]
    fn test_future_birth_date_reads_as_zero_days() {
        let today = date(2024, 3, 10);
        assert_eq!(calculate_age_from_date(date(2024, 3, 15), today), "0 days");
        assert_eq!(calculate_age_from_date(date(2026, 1, 1), today), "0 days");
    }

    #[test]
    fn test_address_emptiness() {
        assert!(Address::new().is_empty());
        assert!(Address::new().with_field("village", "  ").is_empty());
        assert!(!Address::new().with_field("village", "Kawempe").is_empty());
    }

    #[test]
    fn test_gender_parsing() {
        assert_eq!("male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("F".parse::<Gender>().unwrap(), Gender::Female);
        assert!("x".parse::<Gender>().is_err());
    }

    #[test]
    fn test_display_value_localization() {
        let mut loc = TranslationMap::new();
        loc.insert("Refugee".to_string(), "Mkimbizi".to_string());
        assert_eq!(DisplayValue::localized("Refugee", &loc).display, "Mkimbizi");
        assert_eq!(DisplayValue::localized("National", &loc).display, "National");
    }

    #[test]
    fn test_image_bytes_serialize_as_base64() {
        let json = serde_json::to_string(&ImageBytes(vec![1, 2, 3])).unwrap();
        assert_eq!(json, "\"AQID\"");
        let back: ImageBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ImageBytes(vec![1, 2, 3]));
    }
}
