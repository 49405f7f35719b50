//! Shared core of the participant registration wizard: field validation, draft state,
//! wizard navigation and the submission pipeline, plus visit referral.
//! The presentation layer renders the observable state and forwards user input.

// Public modules
pub mod domains;
pub mod errors;
pub mod validation;

pub use domains::registration::{
    RegistrationArgs, RegistrationDependencies, RegistrationEvent, RegistrationFlow, RegistrationService,
    SubmitOutcome,
};
pub use domains::settings::RegistrationSettings;
pub use errors::{DomainError, DomainResult, ServiceError, ServiceResult, ValidationError};

/// Install `env_logger` as the `log` backend. `RUST_LOG` wins when set; otherwise debug
/// builds log at debug level and release builds at info. Safe to call more than once.
pub fn init_logging() {
    #[cfg(debug_assertions)]
    let default_level = "debug";
    #[cfg(not(debug_assertions))]
    let default_level = "info";

    let env = env_logger::Env::default().default_filter_or(default_level);
    if env_logger::Builder::from_env(env).try_init().is_ok() {
        log::info!("Registration core logging initialized");
    }
}
