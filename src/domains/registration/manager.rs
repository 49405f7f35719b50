use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domains::registration::providers::{OperatorProvider, ParticipantMatcher, ParticipantRegistrar, SiteSettings};
use crate::domains::registration::types::{
    Address, BiometricsTemplateBytes, DraftParticipant, Gender, ImageBytes, ParticipantIdentificationCriteria,
    ParticipantMatch, RegisterParticipant, ScheduleFirstVisit, UpdateParticipant,
};
use crate::errors::{ServiceError, ServiceResult, ValidationError};

pub const ATTRIBUTE_LOCATION: &str = "LocationAttribute";
pub const ATTRIBUTE_LANGUAGE: &str = "personLanguage";
pub const ATTRIBUTE_OPERATOR: &str = "operatorUuid";
pub const ATTRIBUTE_TELEPHONE: &str = "telephone";
pub const ATTRIBUTE_MOTHER_NAME: &str = "motherName";
pub const ATTRIBUTE_FATHER_NAME: &str = "fatherName";
pub const ATTRIBUTE_PARTICIPANT_NAME: &str = "participantName";
pub const ATTRIBUTE_BIRTH_WEIGHT: &str = "birthWeight";
pub const ATTRIBUTE_CHILD_CATEGORY: &str = "childCategory";

pub const VISIT_TYPE_DOSING: &str = "Dosing";
pub const ATTRIBUTE_VISIT_STATUS: &str = "visitStatus";
pub const ATTRIBUTE_VISIT_DOSE_NUMBER: &str = "doseNumber";
pub const VISIT_STATUS_SCHEDULED: &str = "SCHEDULED";

/// Fully validated draft values handed to the register/update use case
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantSubmission {
    pub participant_id: String,
    pub nin: Option<String>,
    pub birth_weight: Option<String>,
    pub gender: Gender,
    pub birth_date: NaiveDate,
    pub is_birth_date_estimated: bool,
    pub telephone: Option<String>,
    pub site_uuid: String,
    pub language: String,
    pub address: Address,
    pub picture: Option<ImageBytes>,
    pub biometrics_template: Option<BiometricsTemplateBytes>,
    pub mother_name: String,
    pub father_name: Option<String>,
    pub participant_name: Option<String>,
    pub child_category: Option<String>,
    /// Present when updating an existing participant
    pub participant_uuid: Option<String>,
}

/// Turns a submission into a register or update request, attaching operator identity
/// and the first scheduled dosing visit. Also finds existing participants.
pub struct ParticipantManager {
    registrar: Arc<dyn ParticipantRegistrar>,
    matcher: Arc<dyn ParticipantMatcher>,
    operator: Arc<dyn OperatorProvider>,
    site_settings: Arc<dyn SiteSettings>,
}

impl ParticipantManager {
    pub fn new(
        registrar: Arc<dyn ParticipantRegistrar>,
        matcher: Arc<dyn ParticipantMatcher>,
        operator: Arc<dyn OperatorProvider>,
        site_settings: Arc<dyn SiteSettings>,
    ) -> Self {
        Self {
            registrar,
            matcher,
            operator,
            site_settings,
        }
    }

    /// Existing participants matching any of the given identifiers. Blank identifiers are
    /// ignored; at least one identifier is required.
    pub async fn match_participants(
        &self,
        participant_id: Option<&str>,
        phone: Option<&str>,
        biometrics_template: Option<BiometricsTemplateBytes>,
    ) -> ServiceResult<Vec<ParticipantMatch>> {
        let non_blank = |value: Option<&str>| value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        let criteria = ParticipantIdentificationCriteria {
            participant_id: non_blank(participant_id),
            phone: non_blank(phone),
            biometrics_template: biometrics_template.filter(|t| !t.0.is_empty()),
        };
        if criteria.is_empty() {
            return Err(ValidationError::custom("At least one identification criterion is required").into());
        }

        log::debug!(
            "Matching participants (id: {:?}, phone: {:?}, biometrics: {})",
            criteria.participant_id,
            criteria.phone,
            criteria.biometrics_template.is_some()
        );
        let matches = self.matcher.match_participants(criteria).await?;
        log::info!("Found {} matching participants", matches.len());
        Ok(matches)
    }

    fn operator_uuid(&self) -> ServiceResult<String> {
        self.operator.get_operator_uuid().ok_or_else(|| {
            log::warn!("Trying to register participant without stored operator uuid");
            ServiceError::SessionExpired
        })
    }

    fn create_schedule_first_visit(&self, operator_uuid: &str) -> ServiceResult<ScheduleFirstVisit> {
        let location_uuid = self.site_settings.get_site_uuid().ok_or_else(|| {
            ServiceError::Configuration("Trying to register scheduled visit without a selected site".to_string())
        })?;

        let mut attributes = BTreeMap::new();
        attributes.insert(ATTRIBUTE_VISIT_STATUS.to_string(), VISIT_STATUS_SCHEDULED.to_string());
        attributes.insert(ATTRIBUTE_OPERATOR.to_string(), operator_uuid.to_string());
        attributes.insert(ATTRIBUTE_VISIT_DOSE_NUMBER.to_string(), "1".to_string());

        Ok(ScheduleFirstVisit {
            visit_type: VISIT_TYPE_DOSING.to_string(),
            start_datetime: Utc::now(),
            location_uuid,
            attributes,
        })
    }

    fn person_attributes(submission: &ParticipantSubmission, operator_uuid: &str) -> BTreeMap<String, String> {
        let mut attributes = BTreeMap::new();
        attributes.insert(ATTRIBUTE_LOCATION.to_string(), submission.site_uuid.clone());
        attributes.insert(ATTRIBUTE_LANGUAGE.to_string(), submission.language.clone());
        attributes.insert(ATTRIBUTE_OPERATOR.to_string(), operator_uuid.to_string());
        attributes.insert(ATTRIBUTE_MOTHER_NAME.to_string(), submission.mother_name.clone());

        let optional = [
            (ATTRIBUTE_PARTICIPANT_NAME, &submission.participant_name),
            (ATTRIBUTE_TELEPHONE, &submission.telephone),
            (ATTRIBUTE_BIRTH_WEIGHT, &submission.birth_weight),
            (ATTRIBUTE_FATHER_NAME, &submission.father_name),
            (ATTRIBUTE_CHILD_CATEGORY, &submission.child_category),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                attributes.insert(key.to_string(), value.clone());
            }
        }
        attributes
    }

    /// Registers a new participant, or updates one when `participant_uuid` is set.
    pub async fn register_participant(&self, submission: ParticipantSubmission) -> ServiceResult<DraftParticipant> {
        let operator_uuid = self.operator_uuid()?;
        let attributes = Self::person_attributes(&submission, &operator_uuid);
        let schedule_first_visit = self.create_schedule_first_visit(&operator_uuid)?;

        match submission.participant_uuid {
            None => {
                log::info!("Registering participant {}", submission.participant_id);
                let request = RegisterParticipant {
                    participant_id: submission.participant_id,
                    nin: submission.nin,
                    gender: submission.gender,
                    is_birth_date_estimated: submission.is_birth_date_estimated,
                    birth_date: submission.birth_date,
                    address: submission.address,
                    attributes,
                    image: submission.picture,
                    biometrics_template: submission.biometrics_template,
                    schedule_first_visit,
                };
                self.registrar.register_participant(request).await
            }
            Some(participant_uuid) => {
                log::info!("Updating participant {} ({})", submission.participant_id, participant_uuid);
                let request = UpdateParticipant {
                    participant_uuid,
                    participant_id: submission.participant_id,
                    nin: submission.nin,
                    gender: submission.gender,
                    is_birth_date_estimated: submission.is_birth_date_estimated,
                    birth_date: submission.birth_date,
                    address: submission.address,
                    attributes,
                    image: submission.picture,
                    schedule_first_visit,
                };
                self.registrar.update_participant(request).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRegistrar {
        registered: Mutex<Vec<RegisterParticipant>>,
        updated: Mutex<Vec<UpdateParticipant>>,
    }

    #[async_trait]
    impl ParticipantRegistrar for RecordingRegistrar {
        async fn register_participant(&self, request: RegisterParticipant) -> ServiceResult<DraftParticipant> {
            let draft = DraftParticipant {
                participant_uuid: "new-uuid".to_string(),
                participant_id: request.participant_id.clone(),
                registration_date: Utc::now(),
            };
            self.registered.lock().unwrap().push(request);
            Ok(draft)
        }

        async fn update_participant(&self, request: UpdateParticipant) -> ServiceResult<DraftParticipant> {
            let draft = DraftParticipant {
                participant_uuid: request.participant_uuid.clone(),
                participant_id: request.participant_id.clone(),
                registration_date: Utc::now(),
            };
            self.updated.lock().unwrap().push(request);
            Ok(draft)
        }
    }

    #[derive(Default)]
    struct RecordingMatcher {
        criteria: Mutex<Vec<ParticipantIdentificationCriteria>>,
    }

    #[async_trait]
    impl ParticipantMatcher for RecordingMatcher {
        async fn match_participants(
            &self,
            criteria: ParticipantIdentificationCriteria,
        ) -> ServiceResult<Vec<ParticipantMatch>> {
            let found = criteria.participant_id.as_deref() == Some("ABC123");
            self.criteria.lock().unwrap().push(criteria);
            Ok(found
                .then(|| ParticipantMatch {
                    participant_uuid: "existing-uuid".to_string(),
                    participant_id: Some("ABC123".to_string()),
                    telephone: None,
                    matching_score: None,
                })
                .into_iter()
                .collect())
        }
    }

    struct Operator(Option<&'static str>);

    impl OperatorProvider for Operator {
        fn get_operator_uuid(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    struct SiteSetting(Option<&'static str>);

    impl SiteSettings for SiteSetting {
        fn get_site_uuid(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn submission() -> ParticipantSubmission {
        ParticipantSubmission {
            participant_id: "ABC123".to_string(),
            nin: None,
            birth_weight: Some("3.1".to_string()),
            gender: Gender::Female,
            birth_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            is_birth_date_estimated: false,
            telephone: None,
            site_uuid: "site-1".to_string(),
            language: "English".to_string(),
            address: Address::new().with_field("village", "Kawempe"),
            picture: None,
            biometrics_template: None,
            mother_name: "Jane".to_string(),
            father_name: None,
            participant_name: Some("Amina".to_string()),
            child_category: None,
            participant_uuid: None,
        }
    }

    fn manager(
        registrar: Arc<RecordingRegistrar>,
        operator: Option<&'static str>,
        site: Option<&'static str>,
    ) -> ParticipantManager {
        ParticipantManager::new(
            registrar,
            Arc::new(RecordingMatcher::default()),
            Arc::new(Operator(operator)),
            Arc::new(SiteSetting(site)),
        )
    }

    fn matching_manager(matcher: Arc<RecordingMatcher>) -> ParticipantManager {
        ParticipantManager::new(
            Arc::new(RecordingRegistrar::default()),
            matcher,
            Arc::new(Operator(Some("op-1"))),
            Arc::new(SiteSetting(Some("site-1"))),
        )
    }

    #[tokio::test]
    async fn test_match_participants_forwards_criteria() {
        let matcher = Arc::new(RecordingMatcher::default());
        let manager = matching_manager(matcher.clone());
        let template = BiometricsTemplateBytes(vec![1, 2, 3]);

        let matches = manager
            .match_participants(Some(" ABC123 "), Some(""), Some(template.clone()))
            .await
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].participant_uuid, "existing-uuid");
        let criteria = matcher.criteria.lock().unwrap();
        assert_eq!(
            criteria[0],
            ParticipantIdentificationCriteria {
                participant_id: Some("ABC123".to_string()),
                phone: None,
                biometrics_template: Some(template),
            }
        );
    }

    #[tokio::test]
    async fn test_match_participants_by_phone_only_finds_nothing() {
        let matcher = Arc::new(RecordingMatcher::default());
        let manager = matching_manager(matcher.clone());

        let matches = manager.match_participants(None, Some("+256712345678"), None).await.unwrap();

        assert!(matches.is_empty());
        assert_eq!(matcher.criteria.lock().unwrap()[0].phone.as_deref(), Some("+256712345678"));
    }

    #[tokio::test]
    async fn test_match_participants_requires_a_criterion() {
        let matcher = Arc::new(RecordingMatcher::default());
        let manager = matching_manager(matcher.clone());

        let err = manager
            .match_participants(Some("  "), None, Some(BiometricsTemplateBytes(Vec::new())))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Domain(_)));
        assert!(matcher.criteria.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_builds_attributes_and_first_visit() {
        let registrar = Arc::new(RecordingRegistrar::default());
        let manager = manager(registrar.clone(), Some("op-1"), Some("site-1"));

        let result = manager.register_participant(submission()).await.unwrap();
        assert_eq!(result.participant_uuid, "new-uuid");

        let registered = registrar.registered.lock().unwrap();
        let request = &registered[0];
        assert_eq!(request.attributes[ATTRIBUTE_OPERATOR], "op-1");
        assert_eq!(request.attributes[ATTRIBUTE_MOTHER_NAME], "Jane");
        assert_eq!(request.attributes[ATTRIBUTE_BIRTH_WEIGHT], "3.1");
        assert_eq!(request.attributes[ATTRIBUTE_PARTICIPANT_NAME], "Amina");
        assert!(!request.attributes.contains_key(ATTRIBUTE_TELEPHONE));
        assert_eq!(request.schedule_first_visit.visit_type, VISIT_TYPE_DOSING);
        assert_eq!(request.schedule_first_visit.location_uuid, "site-1");
        assert_eq!(request.schedule_first_visit.attributes[ATTRIBUTE_VISIT_DOSE_NUMBER], "1");
    }

    #[tokio::test]
    async fn test_update_when_uuid_present() {
        let registrar = Arc::new(RecordingRegistrar::default());
        let manager = manager(registrar.clone(), Some("op-1"), Some("site-1"));

        let mut update = submission();
        update.participant_uuid = Some("existing-uuid".to_string());
        let result = manager.register_participant(update).await.unwrap();

        assert_eq!(result.participant_uuid, "existing-uuid");
        assert!(registrar.registered.lock().unwrap().is_empty());
        assert_eq!(registrar.updated.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_operator_is_session_expired() {
        let registrar = Arc::new(RecordingRegistrar::default());
        let manager = manager(registrar.clone(), None, Some("site-1"));

        let err = manager.register_participant(submission()).await.unwrap_err();
        assert!(err.is_session_expired());
        assert!(registrar.registered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_site_is_configuration_error() {
        let registrar = Arc::new(RecordingRegistrar::default());
        let manager = manager(registrar, Some("op-1"), None);

        let err = manager.register_participant(submission()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }
}
