use chrono::NaiveDate;

use crate::domains::registration::observable::Observable;
use crate::domains::registration::types::{
    calculate_age_from_date, format_birth_date, Address, DisplayValue, Gender, NinIdentifier,
};
use crate::validation::FullPhoneFormatter;

/// Per-field validation messages. `None` means the field currently shows no error.
#[derive(Clone, Default)]
pub struct ValidationMessages {
    pub participant_id: Observable<Option<String>>,
    pub nin: Observable<Option<String>>,
    pub gender: Observable<Option<String>>,
    pub birth_date: Observable<Option<String>>,
    pub birth_weight: Observable<Option<String>>,
    pub phone: Observable<Option<String>>,
    pub home_location: Observable<Option<String>>,
    pub language: Observable<Option<String>>,
    pub mother_name: Observable<Option<String>>,
    pub father_name: Observable<Option<String>>,
    pub child_name: Observable<Option<String>>,
    pub child_category: Observable<Option<String>>,
}

impl ValidationMessages {
    pub fn reset(&self) {
        for message in self.all() {
            message.set(None);
        }
    }

    /// True when at least one field shows an error
    pub fn any(&self) -> bool {
        self.all().iter().any(|m| m.with(Option::is_some))
    }

    fn all(&self) -> [&Observable<Option<String>>; 12] {
        [
            &self.participant_id,
            &self.nin,
            &self.gender,
            &self.birth_date,
            &self.birth_weight,
            &self.phone,
            &self.home_location,
            &self.language,
            &self.mother_name,
            &self.father_name,
            &self.child_name,
            &self.child_category,
        ]
    }
}

/// Every value collected for one registration or update attempt.
///
/// Fields are observable so the presentation layer can render them; all writes go
/// through the owning service. Background validation tasks hold clones of the cells
/// they need.
#[derive(Clone, Default)]
pub struct RegistrationDraft {
    pub participant_id: Observable<Option<String>>,
    pub scanned_participant_id: Observable<Option<String>>,
    pub is_manual_set_participant_id: Observable<bool>,
    pub is_auto_generated_participant_id: Observable<bool>,
    /// Set when editing an existing participant
    pub participant_uuid: Observable<Option<String>>,

    pub nin: Observable<Option<String>>,
    pub gender: Observable<Option<Gender>>,
    pub birth_date: Observable<Option<NaiveDate>>,
    pub birth_date_text: Observable<Option<String>>,
    pub is_birth_date_estimated: Observable<bool>,

    pub phone: Observable<Option<String>>,
    pub phone_country_code: Observable<Option<String>>,
    pub default_phone_country_code: Observable<Option<String>>,

    pub home_location: Observable<Option<Address>>,
    pub home_location_label: Observable<Option<String>>,

    pub mother_name: Observable<Option<String>>,
    pub father_name: Observable<Option<String>>,
    pub child_name: Observable<Option<String>>,
    pub birth_weight: Observable<Option<String>>,
    pub child_category: Observable<Option<DisplayValue>>,
    pub language: Observable<Option<DisplayValue>>,
    pub vaccine: Observable<Option<DisplayValue>>,

    pub left_iris_scanned: Observable<bool>,
    pub right_iris_scanned: Observable<bool>,

    pub vaccine_names: Observable<Vec<DisplayValue>>,
    pub child_category_names: Observable<Vec<DisplayValue>>,
    pub languages: Observable<Vec<DisplayValue>>,
    pub nin_identifiers: Observable<Vec<NinIdentifier>>,

    pub loading: Observable<bool>,
    pub messages: ValidationMessages,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl RegistrationDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_update_mode(&self) -> bool {
        self.participant_uuid.with(Option::is_some)
    }

    /// Returns false when the value is unchanged or identity fields are locked (update mode).
    pub fn set_gender(&self, gender: Gender) -> bool {
        if self.is_update_mode() {
            log::warn!("Ignoring gender change while updating an existing participant");
            return false;
        }
        if !self.gender.set_if_changed(Some(gender)) {
            return false;
        }
        self.messages.gender.set(None);
        true
    }

    pub fn set_participant_id(&self, participant_id: &str) -> bool {
        if self.is_update_mode() {
            log::warn!("Ignoring participant ID change while updating an existing participant");
            return false;
        }
        if !self.participant_id.set_if_changed(Some(participant_id.to_string())) {
            return false;
        }
        // typing the scanned value back in makes the ID count as scanned again
        let matches_scanned = self
            .scanned_participant_id
            .with(|scanned| scanned.as_deref() == Some(participant_id));
        if matches_scanned {
            self.is_manual_set_participant_id.set(false);
        }
        self.messages.participant_id.set(None);
        true
    }

    pub fn on_participant_id_scanned(&self, barcode: &str) -> bool {
        if self.is_update_mode() {
            log::warn!("Ignoring scanned participant ID while updating an existing participant");
            return false;
        }
        self.is_manual_set_participant_id.set(false);
        self.scanned_participant_id.set(Some(barcode.to_string()));
        self.set_participant_id(barcode)
    }

    pub fn set_nin(&self, nin: &str) -> bool {
        let changed = self.nin.set_if_changed(non_empty(nin));
        if changed {
            self.messages.nin.set(None);
        }
        changed
    }

    pub fn set_mother_name(&self, name: &str) -> bool {
        let changed = self.mother_name.set_if_changed(non_empty(name));
        if changed {
            self.messages.mother_name.set(None);
        }
        changed
    }

    pub fn set_father_name(&self, name: &str) -> bool {
        let changed = self.father_name.set_if_changed(non_empty(name));
        if changed {
            self.messages.father_name.set(None);
        }
        changed
    }

    pub fn set_child_name(&self, name: &str) -> bool {
        let changed = self.child_name.set_if_changed(non_empty(name));
        if changed {
            self.messages.child_name.set(None);
        }
        changed
    }

    pub fn set_birth_weight(&self, birth_weight: &str) -> bool {
        let changed = self.birth_weight.set_if_changed(non_empty(birth_weight.trim()));
        if changed {
            self.messages.birth_weight.set(None);
        }
        changed
    }

    /// The display text is the date itself, or an age bucket when the date is estimated.
    pub fn set_birth_date(&self, birth_date: Option<NaiveDate>, is_estimated: bool, today: NaiveDate) -> bool {
        let unchanged = self.birth_date.with(|d| *d == birth_date)
            && self.is_birth_date_estimated.with(|e| *e == is_estimated);
        if unchanged {
            return false;
        }

        let text = birth_date.map(|date| {
            if is_estimated {
                calculate_age_from_date(date, today)
            } else {
                format_birth_date(date)
            }
        });
        self.birth_date.set(birth_date);
        self.birth_date_text.set(text);
        self.is_birth_date_estimated.set(is_estimated);
        self.messages.birth_date.set(None);
        true
    }

    pub fn set_phone(&self, phone: &str) -> bool {
        let changed = self.phone.set_if_changed(non_empty(phone.trim()));
        if changed {
            self.messages.phone.set(None);
        }
        changed
    }

    pub fn set_phone_country_code(&self, country_code: &str) -> bool {
        let changed = self.phone_country_code.set_if_changed(non_empty(country_code.trim()));
        if changed {
            self.messages.phone.set(None);
        }
        changed
    }

    pub fn set_child_category(&self, category: DisplayValue) -> bool {
        let changed = self.child_category.set_if_changed(Some(category));
        if changed {
            self.messages.child_category.set(None);
        }
        changed
    }

    pub fn set_language(&self, language: DisplayValue) -> bool {
        let changed = self.language.set_if_changed(Some(language));
        if changed {
            self.messages.language.set(None);
        }
        changed
    }

    pub fn set_vaccine(&self, vaccine: DisplayValue) -> bool {
        self.vaccine.set_if_changed(Some(vaccine))
    }

    pub fn set_home_location(&self, address: Address, label: &str) {
        self.home_location.set(Some(address));
        self.home_location_label.set(non_empty(label));
        self.messages.home_location.set(None);
    }

    /// `+<cc><local>` or an empty string when phone or country code is missing
    pub fn full_phone(&self, formatter: &FullPhoneFormatter) -> String {
        let phone = match self.phone.get() {
            Some(phone) => phone,
            None => return String::new(),
        };
        let country_code = match self.phone_country_code.get() {
            Some(code) => code,
            None => return String::new(),
        };
        formatter
            .to_full_phone_number_or_none(&phone, &country_code)
            .unwrap_or_default()
    }

    pub fn has_phone(&self) -> bool {
        self.phone.with(|p| p.as_deref().map_or(false, |p| !p.is_empty()))
    }
}
