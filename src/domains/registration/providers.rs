//! Collaborators the registration workflow depends on but does not implement:
//! configuration and session state, the register/update use case, biometrics and images.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domains::registration::types::{
    BiometricsTemplateBytes, Configuration, DraftParticipant, ImageBytes, IrisScans, NinIdentifier,
    ParticipantIdentificationCriteria, ParticipantMatch, RegisterParticipant, Site, TranslationMap,
    UpdateParticipant,
};
use crate::errors::ServiceResult;

#[async_trait]
pub trait ConfigurationProvider: Send + Sync {
    async fn get_configuration(&self) -> ServiceResult<Configuration>;

    async fn get_site_by_uuid(&self, uuid: &str) -> ServiceResult<Option<Site>>;

    async fn get_sites(&self) -> ServiceResult<Vec<Site>>;

    async fn get_localization(&self) -> ServiceResult<TranslationMap>;

    /// National ID numbers already known to the backend
    async fn get_nin_identifiers(&self) -> ServiceResult<Vec<NinIdentifier>>;
}

/// Site the device is currently working for
pub trait SiteSettings: Send + Sync {
    fn get_site_uuid(&self) -> Option<String>;
}

/// Identity of the logged-in operator
pub trait OperatorProvider: Send + Sync {
    fn get_operator_uuid(&self) -> Option<String>;
}

/// The register-or-update use case. Fails with `ServiceError::ParticipantAlreadyExists`
/// when the participant ID is taken.
#[async_trait]
pub trait ParticipantRegistrar: Send + Sync {
    async fn register_participant(&self, request: RegisterParticipant) -> ServiceResult<DraftParticipant>;

    async fn update_participant(&self, request: UpdateParticipant) -> ServiceResult<DraftParticipant>;
}

/// Looks up existing participants by ID, phone or iris template
#[async_trait]
pub trait ParticipantMatcher: Send + Sync {
    async fn match_participants(&self, criteria: ParticipantIdentificationCriteria) -> ServiceResult<Vec<ParticipantMatch>>;
}

#[async_trait]
pub trait ParticipantIdGenerator: Send + Sync {
    async fn generate_unique_participant_id(&self) -> ServiceResult<String>;
}

#[async_trait]
pub trait BiometricsTemplateProvider: Send + Sync {
    async fn get_biometrics_template(&self, iris_scans: &IrisScans) -> ServiceResult<Option<BiometricsTemplateBytes>>;
}

#[async_trait]
pub trait ParticipantImageProvider: Send + Sync {
    async fn get_person_image(&self, participant_uuid: &str) -> ServiceResult<Option<ImageBytes>>;
}

pub trait SessionExpiryObserver: Send + Sync {
    fn notify_session_expired(&self);
}

/// Everything `RegistrationService` needs from the outside world
#[derive(Clone)]
pub struct RegistrationDependencies {
    pub configuration: Arc<dyn ConfigurationProvider>,
    pub site_settings: Arc<dyn SiteSettings>,
    pub operator: Arc<dyn OperatorProvider>,
    pub registrar: Arc<dyn ParticipantRegistrar>,
    pub matcher: Arc<dyn ParticipantMatcher>,
    pub id_generator: Arc<dyn ParticipantIdGenerator>,
    pub biometrics: Arc<dyn BiometricsTemplateProvider>,
    pub session_expiry: Arc<dyn SessionExpiryObserver>,
}
