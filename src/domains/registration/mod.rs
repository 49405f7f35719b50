pub mod types;
pub mod observable;
pub mod draft;
pub mod navigator;
pub mod flow;
pub mod providers;
pub mod manager;
pub mod id_generator;
pub mod picture;
pub mod debounce;
pub mod service;

pub use types::{
    Address, Configuration, DisplayValue, Gender, ImageBytes, IrisPosition, NinIdentifier,
    ParticipantIdentificationCriteria, ParticipantMatch, ParticipantPrefill, ParticipantSummary,
    RegistrationArgs, Site, TranslationMap,
};
pub use observable::{EventChannel, Observable};
pub use draft::{RegistrationDraft, ValidationMessages};
pub use navigator::{NavigationDirection, Screen, WizardNavigator};
pub use flow::{RegistrationFlow, WizardResult};
pub use providers::{ParticipantMatcher, RegistrationDependencies};
pub use manager::{ParticipantManager, ParticipantSubmission};
pub use id_generator::{InMemorySequenceStore, SequenceParticipantIdGenerator, SequenceStore};
pub use service::{RegistrationEvent, RegistrationService, SubmitOutcome};
