use crate::errors::{DomainError, DomainResult, ValidationError};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;

/// A single-field format check. Implementations are pure and never perform I/O.
pub trait FieldValidator {
    fn validate(&self, value: &str) -> bool;
}

const PARTICIPANT_ID_MIN_LENGTH: usize = 4;
const PARTICIPANT_ID_MAX_LENGTH: usize = 20;

// Common regex patterns
fn participant_id_regex() -> &'static Regex {
    static PARTICIPANT_ID_REGEX: OnceLock<Regex> = OnceLock::new();
    PARTICIPANT_ID_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*$").unwrap())
}

fn full_phone_regex() -> &'static Regex {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    PHONE_REGEX.get_or_init(|| Regex::new(r"^\+[1-9][0-9]{7,14}$").unwrap())
}

fn text_input_regex() -> &'static Regex {
    static TEXT_REGEX: OnceLock<Regex> = OnceLock::new();
    TEXT_REGEX.get_or_init(|| Regex::new(r"^[\p{L}\s'.\-]*$").unwrap())
}

fn nin_regex() -> &'static Regex {
    static NIN_REGEX: OnceLock<Regex> = OnceLock::new();
    NIN_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{14}$").unwrap())
}

/// Participant IDs are alphanumeric groups optionally joined by single dashes.
/// An empty value is malformed here; callers report "missing" separately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParticipantIdValidator;

impl FieldValidator for ParticipantIdValidator {
    fn validate(&self, value: &str) -> bool {
        (PARTICIPANT_ID_MIN_LENGTH..=PARTICIPANT_ID_MAX_LENGTH).contains(&value.len())
            && participant_id_regex().is_match(value)
    }
}

/// Validates a fully qualified number (`+<country code><local number>`)
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneValidator;

impl FieldValidator for PhoneValidator {
    fn validate(&self, value: &str) -> bool {
        full_phone_regex().is_match(value)
    }
}

/// Names: letters, whitespace, apostrophes, dots and dashes. Empty is accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextInputValidator;

impl FieldValidator for TextInputValidator {
    fn validate(&self, value: &str) -> bool {
        text_input_regex().is_match(value)
    }
}

/// Format check only; uniqueness is [`nin_already_exists`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NinValidator;

impl FieldValidator for NinValidator {
    fn validate(&self, value: &str) -> bool {
        nin_regex().is_match(value)
    }
}

/// Case-insensitive lookup of a NIN among the identifiers already known to the backend
pub fn nin_already_exists<'a, I>(value: &str, known_identifiers: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    known_identifiers
        .into_iter()
        .any(|known| known.to_lowercase() == value.to_lowercase())
}

/// Combines a country calling code and a local number into `+<cc><local>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullPhoneFormatter;

impl FullPhoneFormatter {
    /// Returns `None` when either part has no digits.
    pub fn to_full_phone_number_or_none(&self, phone: &str, country_code: &str) -> Option<String> {
        let phone = phone.trim();
        if phone.starts_with('+') {
            let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
            return (!digits.is_empty()).then(|| format!("+{}", digits));
        }

        let country_digits: String = country_code.chars().filter(|c| c.is_ascii_digit()).collect();
        let local_digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        // trunk prefix is dropped once the country code is in front
        let local_digits = local_digits.trim_start_matches('0');

        if country_digits.is_empty() || local_digits.is_empty() {
            return None;
        }
        Some(format!("+{}{}", country_digits, local_digits))
    }
}

/// Parses a birth weight entered as text. Must be a positive number.
pub fn parse_birth_weight(value: &str) -> Result<Decimal, ValidationError> {
    let weight = Decimal::from_str(value.trim())
        .map_err(|_| ValidationError::format("birth_weight", "must be a number"))?;
    if weight <= Decimal::ZERO {
        return Err(ValidationError::invalid_value("birth_weight", "must be a positive number"));
    }
    Ok(weight)
}

/// Struct for configuring validations in a fluent style
#[derive(Default)]
pub struct ValidationBuilder<T> {
    field_name: String,
    value: Option<T>,
    errors: Vec<ValidationError>,
}

impl<T> ValidationBuilder<T> {
    pub fn new(field_name: &str, value: Option<T>) -> Self {
        Self {
            field_name: field_name.to_string(),
            value,
            errors: Vec::new(),
        }
    }

    /// Complete validation and return result
    pub fn validate(self) -> DomainResult<()> {
        match self.errors.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(DomainError::Validation(first)),
        }
    }
}

/// String-specific validations
impl ValidationBuilder<String> {
    /// Missing, empty and whitespace-only values all fail
    pub fn required(mut self) -> Self {
        let missing = self.value.as_deref().map_or(true, |v| v.trim().is_empty());
        if missing {
            self.errors.push(ValidationError::required(&self.field_name));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_id_validation() {
        let validator = ParticipantIdValidator;
        assert!(validator.validate("ABC123"));
        assert!(validator.validate("TAB01-000042"));
        assert!(!validator.validate(""));
        assert!(!validator.validate("AB"));
        assert!(!validator.validate("ABC 123"));
        assert!(!validator.validate("ABC--123"));
        assert!(!validator.validate("-ABC123"));
        assert!(!validator.validate("A123456789012345678901"));
    }

    #[test]
    fn test_phone_validation() {
        let validator = PhoneValidator;
        assert!(validator.validate("+256712345678"));
        assert!(validator.validate("+3212345678"));
        assert!(!validator.validate("0712345678"));
        assert!(!validator.validate("+0712345678"));
        assert!(!validator.validate("+256"));
        assert!(!validator.validate(""));
    }

    #[test]
    fn test_text_input_validation() {
        let validator = TextInputValidator;
        assert!(validator.validate(""));
        assert!(validator.validate("Jane"));
        assert!(validator.validate("Mary-Jane O'Neil"));
        assert!(validator.validate("Akélló"));
        assert!(!validator.validate("Jane2"));
        assert!(!validator.validate("Jane@home"));
    }

    #[test]
    fn test_nin_validation_and_uniqueness() {
        let validator = NinValidator;
        assert!(validator.validate("CM12345678ABCD"));
        assert!(!validator.validate("CM1234"));
        assert!(!validator.validate("CM12345678ABC!"));

        let known = vec!["CM12345678ABCD", "CF00000000XYZW"];
        assert!(nin_already_exists("cm12345678abcd", known.iter().copied()));
        assert!(!nin_already_exists("CM99999999ABCD", known.iter().copied()));
        assert!(!nin_already_exists("CM12345678ABCD", std::iter::empty()));
    }

    #[test]
    fn test_full_phone_formatting() {
        let formatter = FullPhoneFormatter;
        assert_eq!(
            formatter.to_full_phone_number_or_none("0712 345 678", "256"),
            Some("+256712345678".to_string())
        );
        assert_eq!(
            formatter.to_full_phone_number_or_none("712345678", "+256"),
            Some("+256712345678".to_string())
        );
        assert_eq!(
            formatter.to_full_phone_number_or_none("+32 123 45 67 8", ""),
            Some("+3212345678".to_string())
        );
        assert_eq!(formatter.to_full_phone_number_or_none("", "256"), None);
        assert_eq!(formatter.to_full_phone_number_or_none("712345678", ""), None);
    }

    #[test]
    fn test_birth_weight_parsing() {
        assert!(parse_birth_weight("3").is_ok());
        assert!(parse_birth_weight(" 3.25 ").is_ok());
        assert!(parse_birth_weight("0").is_err());
        assert!(parse_birth_weight("-1").is_err());
        assert!(parse_birth_weight("heavy").is_err());
    }

    #[test]
    fn test_validation_builder() {
        let result = ValidationBuilder::new("clinic", Some("  ".to_string()))
            .required()
            .validate();
        assert!(matches!(
            result,
            Err(DomainError::Validation(ValidationError::Required { .. }))
        ));

        let result = ValidationBuilder::new("clinic", None::<String>).required().validate();
        assert!(result.is_err());

        let result = ValidationBuilder::new("clinic", Some("Mulago".to_string()))
            .required()
            .validate();
        assert!(result.is_ok());
    }
}
