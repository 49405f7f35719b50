use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::domains::registration::debounce::{DebouncedField, FieldDebouncer};
use crate::domains::registration::draft::RegistrationDraft;
use crate::domains::registration::manager::{ParticipantManager, ParticipantSubmission};
use crate::domains::registration::observable::EventChannel;
use crate::domains::registration::picture::compress_raw_image;
use crate::domains::registration::providers::RegistrationDependencies;
use crate::domains::registration::types::{
    format_birth_date, Address, BiometricsTemplateBytes, Configuration, DisplayValue, Gender, ImageBytes, IrisPosition, IrisScans,
    ParticipantPrefill, ParticipantSummary, RegistrationArgs, Site, TranslationMap,
};
use crate::domains::settings::{RegistrationMessages, RegistrationSettings};
use crate::errors::{ServiceError, ServiceResult, ValidationError};
use crate::validation::{
    nin_already_exists, parse_birth_weight, FieldValidator, FullPhoneFormatter, NinValidator,
    ParticipantIdValidator, PhoneValidator, TextInputValidator,
};

/// One-shot events for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RegistrationEvent {
    /// Ask whether the participant really has no phone
    ConfirmMissingPhone,
    /// Ask whether the child is a newborn before registering
    ConfirmNewbornStatus,
    /// A manually entered ID does not match the scanned or generated one
    ParticipantIdMismatch,
    RegistrationFailed(String),
    RegistrationSucceeded(ParticipantSummary),
    RegistrationSucceededWithDialog(ParticipantSummary),
}

/// Which gate stopped a submit, or how the register call ended
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// A submit or load is already in flight
    Busy,
    NoSiteSelected,
    ParticipantIdMismatch,
    AwaitingPhoneConfirmation,
    InvalidPhone,
    /// Field errors are shown on the draft
    InvalidInput,
    AwaitingNewbornConfirmation,
    Registered(ParticipantSummary),
    SessionExpired,
    Failed(String),
}

/// Owns one registration draft: loads it, applies field edits, and gates submission.
pub struct RegistrationService {
    settings: RegistrationSettings,
    messages: RegistrationMessages,
    deps: RegistrationDependencies,
    manager: ParticipantManager,
    draft: RegistrationDraft,
    events: EventChannel<RegistrationEvent>,
    debouncer: FieldDebouncer<DebouncedField>,
    iris_scans: IrisScans,

    participant_id_validator: ParticipantIdValidator,
    phone_validator: PhoneValidator,
    text_validator: TextInputValidator,
    nin_validator: NinValidator,
    phone_formatter: FullPhoneFormatter,

    can_skip_phone: bool,
    is_child_newborn_question_already_asked: bool,
    should_open_success_dialog: bool,
}

impl RegistrationService {
    /// Inline validations run on the current tokio runtime, if any
    pub fn new(settings: RegistrationSettings, deps: RegistrationDependencies) -> Self {
        Self::with_runtime(settings, deps, Handle::try_current().ok())
    }

    /// Inline validations run on `runtime`, so field setters may be called from any thread
    pub fn with_runtime(settings: RegistrationSettings, deps: RegistrationDependencies, runtime: Option<Handle>) -> Self {
        let manager = ParticipantManager::new(
            deps.registrar.clone(),
            deps.matcher.clone(),
            deps.operator.clone(),
            deps.site_settings.clone(),
        );
        Self {
            messages: settings.messages.clone(),
            debouncer: FieldDebouncer::with_runtime(settings.inline_validation_delay(), runtime),
            settings,
            deps,
            manager,
            draft: RegistrationDraft::new(),
            events: EventChannel::new(),
            iris_scans: IrisScans::new(),
            participant_id_validator: ParticipantIdValidator,
            phone_validator: PhoneValidator,
            text_validator: TextInputValidator,
            nin_validator: NinValidator,
            phone_formatter: FullPhoneFormatter,
            can_skip_phone: false,
            is_child_newborn_question_already_asked: false,
            should_open_success_dialog: false,
        }
    }

    pub fn draft(&self) -> &RegistrationDraft {
        &self.draft
    }

    /// Receiver of the one-shot events. Only the first call gets it.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<RegistrationEvent>> {
        self.events.take_receiver()
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Applies the wizard arguments and loads site and configuration data.
    /// Failures are logged; the draft stays editable.
    pub async fn load(&mut self, args: RegistrationArgs) {
        log::info!(
            "Loading registration draft (update: {}, manual id: {})",
            args.is_update(),
            args.is_manual_set_participant_id
        );
        self.draft.loading.set(true);
        if let Err(e) = self.try_load(args).await {
            log::error!("Failed to load registration configuration: {}", e);
        }
        self.draft.loading.set(false);
    }

    async fn try_load(&mut self, args: RegistrationArgs) -> ServiceResult<()> {
        let configuration = self.deps.configuration.get_configuration().await?;
        let is_update = args.is_update();
        self.draft.participant_uuid.set(args.participant_uuid.clone());

        let auto_generate = configuration.is_auto_generate_participant_id && !is_update;
        self.draft.is_auto_generated_participant_id.set(auto_generate);
        if auto_generate {
            let generated = self.deps.id_generator.generate_unique_participant_id().await?;
            self.draft.is_manual_set_participant_id.set(false);
            self.draft.scanned_participant_id.set(Some(generated.clone()));
            self.draft.participant_id.set(Some(generated));
        } else if is_update {
            // the stored ID is locked and cannot be rescanned, so it counts as scanned
            self.draft.is_manual_set_participant_id.set(false);
            self.draft.scanned_participant_id.set(args.participant_id.clone());
            self.draft.participant_id.set(args.participant_id.clone());
        } else {
            self.draft.is_manual_set_participant_id.set(args.is_manual_set_participant_id);
            self.draft.participant_id.set(args.participant_id.clone());
            if !args.is_manual_set_participant_id {
                self.draft.scanned_participant_id.set(args.participant_id.clone());
            }
        }

        self.draft.left_iris_scanned.set(args.left_eye_scanned);
        self.draft.right_iris_scanned.set(args.right_eye_scanned);
        self.iris_scans.insert(IrisPosition::Left, args.left_eye_scanned);
        self.iris_scans.insert(IrisPosition::Right, args.right_eye_scanned);

        if let Some(phone) = args.phone_number.as_deref() {
            self.draft.set_phone(phone);
        }
        if let Some(country_code) = args.country_code.as_deref() {
            self.draft.set_phone_country_code(country_code);
        }
        if let Some(prefill) = args.prefill {
            self.apply_prefill(prefill);
        }

        let site_uuid = self
            .deps
            .site_settings
            .get_site_uuid()
            .ok_or_else(|| ServiceError::Configuration("No site selected".to_string()))?;
        let site = self
            .deps
            .configuration
            .get_site_by_uuid(&site_uuid)
            .await?
            .ok_or_else(|| ServiceError::Configuration(format!("Unknown site {}", site_uuid)))?;
        let localization = self.deps.configuration.get_localization().await?;
        self.on_site_and_configuration_loaded(site, configuration, &localization);

        let nin_identifiers = self.deps.configuration.get_nin_identifiers().await?;
        self.draft.nin_identifiers.set(nin_identifiers);
        Ok(())
    }

    /// Existing participant values bypass the update-mode lock on identity fields.
    fn apply_prefill(&self, prefill: ParticipantPrefill) {
        let draft = &self.draft;
        draft.gender.set(prefill.gender);
        draft.birth_date.set(prefill.birth_date);
        draft.is_birth_date_estimated.set(prefill.is_birth_date_estimated);
        draft.birth_date_text.set(prefill.birth_date.map(format_birth_date));
        draft.nin.set(prefill.nin);
        draft.mother_name.set(prefill.mother_name);
        draft.father_name.set(prefill.father_name);
        draft.child_name.set(prefill.child_name);
        draft.birth_weight.set(prefill.birth_weight);
        draft.home_location.set(prefill.home_location);
        draft.home_location_label.set(prefill.home_location_label);
        draft
            .child_category
            .set(prefill.child_category.map(|c| DisplayValue { display: c.clone(), value: c }));
    }

    fn on_site_and_configuration_loaded(&mut self, site: Site, configuration: Configuration, loc: &TranslationMap) {
        self.draft.default_phone_country_code.set(Some(site.country_code.clone()));
        if self.draft.phone_country_code.with(Option::is_none) {
            self.draft.phone_country_code.set(Some(site.country_code));
        }

        self.draft.vaccine_names.set(
            configuration
                .vaccines
                .iter()
                .map(|v| DisplayValue::localized(&v.name, loc))
                .collect(),
        );
        self.draft.child_category_names.set(
            self.settings
                .child_categories
                .iter()
                .map(|c| DisplayValue::localized(c, loc))
                .collect(),
        );
        self.draft.languages.set(
            configuration
                .person_languages
                .iter()
                .map(|l| DisplayValue::localized(&l.name, loc))
                .collect(),
        );
        self.messages = self.settings.messages.localized(loc);
    }

    // ------------------------------------------------------------------
    // Field edits
    // ------------------------------------------------------------------

    pub fn set_gender(&self, gender: Gender) {
        self.draft.set_gender(gender);
    }

    pub fn set_participant_id(&mut self, participant_id: &str) {
        if self.draft.set_participant_id(participant_id) {
            self.schedule_participant_id_validation();
        }
    }

    pub fn on_participant_id_scanned(&mut self, barcode: &str) {
        log::info!("onParticipantIdScanned: {}", barcode);
        if self.draft.on_participant_id_scanned(barcode) {
            self.schedule_participant_id_validation();
        }
    }

    pub fn set_nin(&self, nin: &str) {
        self.draft.set_nin(nin);
    }

    pub fn set_mother_name(&self, name: &str) {
        self.draft.set_mother_name(name);
    }

    pub fn set_father_name(&self, name: &str) {
        self.draft.set_father_name(name);
    }

    pub fn set_child_name(&self, name: &str) {
        self.draft.set_child_name(name);
    }

    pub fn set_birth_weight(&self, birth_weight: &str) {
        self.draft.set_birth_weight(birth_weight);
    }

    pub fn set_birth_date(&self, birth_date: Option<NaiveDate>, is_estimated: bool) {
        self.draft
            .set_birth_date(birth_date, is_estimated, Local::now().date_naive());
    }

    pub fn set_phone(&mut self, phone: &str) {
        if self.draft.set_phone(phone) {
            self.schedule_phone_validation();
        }
    }

    pub fn set_phone_country_code(&mut self, country_code: &str) {
        if self.draft.set_phone_country_code(country_code) {
            self.schedule_phone_validation();
        }
    }

    pub fn set_child_category(&self, category: DisplayValue) {
        self.draft.set_child_category(category);
    }

    pub fn set_language(&self, language: DisplayValue) {
        self.draft.set_language(language);
    }

    pub fn set_vaccine(&self, vaccine: DisplayValue) {
        self.draft.set_vaccine(vaccine);
    }

    pub fn set_home_location(&self, address: Address, label: &str) {
        self.draft.set_home_location(address, label);
    }

    // ------------------------------------------------------------------
    // Confirmation answers
    // ------------------------------------------------------------------

    /// Operator confirmed the participant has no phone
    pub fn confirm_no_telephone(&mut self) {
        self.can_skip_phone = true;
    }

    /// Newborn question answered; a success dialog is shown instead of the vaccines screen
    pub fn continue_registration_with_success_dialog(&mut self) {
        self.is_child_newborn_question_already_asked = true;
        self.should_open_success_dialog = true;
    }

    /// Newborn question answered; continue to the vaccines screen after registering
    pub fn continue_registration_with_capture_vaccines(&mut self) {
        self.is_child_newborn_question_already_asked = true;
    }

    // ------------------------------------------------------------------
    // Inline validation
    // ------------------------------------------------------------------

    fn schedule_participant_id_validation(&mut self) {
        self.draft.messages.participant_id.set(None);
        let participant_id = self.draft.participant_id.clone();
        let message = self.draft.messages.participant_id.clone();
        let invalid_text = self.messages.invalid_participant_id.clone();
        let validator = self.participant_id_validator;

        self.debouncer.schedule(DebouncedField::ParticipantId, async move {
            let invalid = participant_id.with(|id| {
                id.as_deref()
                    .map_or(false, |id| !id.is_empty() && !validator.validate(id))
            });
            if invalid {
                message.set(Some(invalid_text));
            }
        });
    }

    fn schedule_phone_validation(&mut self) {
        self.draft.messages.phone.set(None);
        let draft = self.draft.clone();
        let invalid_text = self.messages.invalid_phone.clone();
        let validator = self.phone_validator;
        let formatter = self.phone_formatter;

        self.debouncer.schedule(DebouncedField::Phone, async move {
            let full_phone = draft.full_phone(&formatter);
            if !full_phone.is_empty() && !validator.validate(&full_phone) {
                draft.messages.phone.set(Some(invalid_text));
            }
        });
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Runs every gate in order and registers (or updates) the participant once all pass.
    /// Emits at most one event per call.
    pub async fn submit_registration(&mut self, picture: Option<ImageBytes>) -> SubmitOutcome {
        if self.draft.loading.get() {
            log::warn!("Ignoring submit: registration already in progress");
            return SubmitOutcome::Busy;
        }

        let site_uuid = match self.deps.site_settings.get_site_uuid() {
            Some(site_uuid) => site_uuid,
            None => {
                log::warn!("Cannot submit registration: no site UUID known");
                return SubmitOutcome::NoSiteSelected;
            }
        };

        // submit revalidates everything itself
        self.debouncer.cancel_all();
        let are_inputs_valid = self.validate_input();
        let is_nin_valid = self.validate_nin();

        if self.is_participant_id_mismatch() {
            log::info!("participantId: {:?} does not match the scanned value", self.draft.participant_id.get());
            self.events.emit(RegistrationEvent::ParticipantIdMismatch);
            return SubmitOutcome::ParticipantIdMismatch;
        }

        let phone_to_submit = if !self.draft.has_phone() {
            if are_inputs_valid && !self.can_skip_phone {
                self.events.emit(RegistrationEvent::ConfirmMissingPhone);
                return SubmitOutcome::AwaitingPhoneConfirmation;
            }
            None
        } else {
            let full_phone = self.draft.full_phone(&self.phone_formatter);
            if !self.phone_validator.validate(&full_phone) {
                self.draft.messages.phone.set(Some(self.messages.invalid_phone.clone()));
                return SubmitOutcome::InvalidPhone;
            }
            Some(full_phone)
        };

        if !are_inputs_valid || !is_nin_valid {
            return SubmitOutcome::InvalidInput;
        }

        if !self.is_child_newborn_question_already_asked {
            self.events.emit(RegistrationEvent::ConfirmNewbornStatus);
            return SubmitOutcome::AwaitingNewbornConfirmation;
        }

        self.draft.loading.set(true);
        let result = self.register(site_uuid, phone_to_submit, picture).await;
        self.draft.loading.set(false);

        match result {
            Ok(summary) => {
                if self.should_open_success_dialog {
                    self.events
                        .emit(RegistrationEvent::RegistrationSucceededWithDialog(summary.clone()));
                } else {
                    self.events.emit(RegistrationEvent::RegistrationSucceeded(summary.clone()));
                }
                SubmitOutcome::Registered(summary)
            }
            Err(e) => self.on_registration_failed(e),
        }
    }

    fn is_participant_id_mismatch(&self) -> bool {
        !self.draft.is_update_mode()
            && self.draft.is_manual_set_participant_id.get()
            && self.draft.participant_id.get() != self.draft.scanned_participant_id.get()
    }

    async fn register(
        &self,
        site_uuid: String,
        telephone: Option<String>,
        picture: Option<ImageBytes>,
    ) -> ServiceResult<ParticipantSummary> {
        let compressed = match picture.filter(|p| !p.is_empty()) {
            Some(picture) => Some(
                compress_raw_image(
                    picture,
                    self.settings.picture_max_dimension,
                    self.settings.picture_jpeg_quality,
                )
                .await?,
            ),
            None => None,
        };
        let biometrics_template = self.deps.biometrics.get_biometrics_template(&self.iris_scans).await?;

        let submission = self.build_submission(site_uuid, telephone, compressed, biometrics_template)?;
        let participant_id = submission.participant_id.clone();
        let gender = submission.gender;
        let birth_date = submission.birth_date;
        let is_birth_date_estimated = submission.is_birth_date_estimated;
        let picture = submission.picture.clone();

        let result = self.manager.register_participant(submission).await?;

        Ok(ParticipantSummary {
            participant_uuid: result.participant_uuid,
            participant_id,
            gender,
            birth_date_text: format_birth_date(birth_date),
            is_birth_date_estimated,
            vaccine: self.draft.vaccine.get().map(|v| v.value),
            picture,
        })
    }

    fn build_submission(
        &self,
        site_uuid: String,
        telephone: Option<String>,
        picture: Option<ImageBytes>,
        biometrics_template: Option<BiometricsTemplateBytes>,
    ) -> ServiceResult<ParticipantSubmission> {
        let draft = &self.draft;
        Ok(ParticipantSubmission {
            participant_id: draft
                .participant_id
                .get()
                .ok_or_else(|| ValidationError::required("participant_id"))?,
            nin: draft.nin.get(),
            birth_weight: draft.birth_weight.get(),
            gender: draft.gender.get().ok_or_else(|| ValidationError::required("gender"))?,
            birth_date: draft
                .birth_date
                .get()
                .ok_or_else(|| ValidationError::required("birth_date"))?,
            is_birth_date_estimated: draft.is_birth_date_estimated.get(),
            telephone,
            site_uuid,
            language: draft
                .language
                .get()
                .map(|l| l.value)
                .unwrap_or_else(|| self.settings.default_language.clone()),
            address: draft
                .home_location
                .get()
                .ok_or_else(|| ValidationError::required("home_location"))?,
            picture,
            biometrics_template,
            mother_name: draft
                .mother_name
                .get()
                .ok_or_else(|| ValidationError::required("mother_name"))?,
            father_name: draft.father_name.get(),
            participant_name: draft.child_name.get(),
            child_category: draft.child_category.get().map(|c| c.value),
            participant_uuid: draft.participant_uuid.get(),
        })
    }

    fn on_registration_failed(&self, error: ServiceError) -> SubmitOutcome {
        log::error!("Failed to register participant: {}", error);
        match error {
            ServiceError::ParticipantAlreadyExists(_) => {
                let message = self.messages.participant_already_exists.clone();
                self.draft.messages.participant_id.set(Some(message.clone()));
                self.events.emit(RegistrationEvent::RegistrationFailed(message.clone()));
                SubmitOutcome::Failed(message)
            }
            ServiceError::SessionExpired => {
                self.deps.session_expiry.notify_session_expired();
                SubmitOutcome::SessionExpired
            }
            _ => {
                let message = self.messages.general_error.clone();
                self.events.emit(RegistrationEvent::RegistrationFailed(message.clone()));
                SubmitOutcome::Failed(message)
            }
        }
    }

    /// Checks every required field and sets its message; never stops at the first failure.
    fn validate_input(&self) -> bool {
        let draft = &self.draft;
        let messages = &draft.messages;
        let text = &self.messages;
        let mut is_valid = true;
        messages.reset();

        match draft.participant_id.get().filter(|id| !id.is_empty()) {
            None => {
                is_valid = false;
                messages.participant_id.set(Some(text.no_participant_id.clone()));
            }
            Some(id) if !self.participant_id_validator.validate(&id) => {
                is_valid = false;
                messages.participant_id.set(Some(text.invalid_participant_id.clone()));
            }
            Some(_) => {}
        }

        if draft.gender.with(Option::is_none) {
            is_valid = false;
            messages.gender.set(Some(text.no_gender.clone()));
        }

        match draft.birth_weight.get() {
            None if self.settings.require_birth_weight => {
                is_valid = false;
                messages.birth_weight.set(Some(text.no_birth_weight.clone()));
            }
            Some(weight) if parse_birth_weight(&weight).is_err() => {
                is_valid = false;
                messages.birth_weight.set(Some(text.no_birth_weight.clone()));
            }
            _ => {}
        }

        if draft.home_location.with(|h| h.as_ref().map_or(true, Address::is_empty)) {
            is_valid = false;
            messages.home_location.set(Some(text.no_home_location.clone()));
        }

        if draft.birth_date.with(Option::is_none) {
            is_valid = false;
            messages.birth_date.set(Some(text.no_birth_date.clone()));
        }

        match draft.mother_name.get().filter(|n| !n.is_empty()) {
            None => {
                is_valid = false;
                messages.mother_name.set(Some(text.no_mother_name.clone()));
            }
            Some(name) if !self.text_validator.validate(&name) => {
                is_valid = false;
                messages.mother_name.set(Some(text.letters_only.clone()));
            }
            Some(_) => {}
        }

        if let Some(name) = draft.father_name.get() {
            if !self.text_validator.validate(&name) {
                is_valid = false;
                messages.father_name.set(Some(text.letters_only.clone()));
            }
        }

        if let Some(name) = draft.child_name.get() {
            if !self.text_validator.validate(&name) {
                is_valid = false;
                messages.child_name.set(Some(text.letters_only.clone()));
            }
        }

        is_valid
    }

    /// Format and uniqueness of the optional national ID number
    fn validate_nin(&self) -> bool {
        let nin = match self.draft.nin.get().filter(|n| !n.is_empty()) {
            Some(nin) => nin,
            None => return true,
        };

        if !self.nin_validator.validate(&nin) {
            self.draft.messages.nin.set(Some(self.messages.nin_wrong_format.clone()));
            return false;
        }

        let exists = self.draft.nin_identifiers.with(|known| {
            nin_already_exists(&nin, known.iter().map(|k| k.identifier_value.as_str()))
        });
        if exists {
            self.draft.messages.nin.set(Some(self.messages.nin_already_exists.clone()));
            return false;
        }
        true
    }
}
