pub mod referral;
pub mod registration;
pub mod settings;

pub use referral::{ReferralService, ReferralServiceImpl};
pub use registration::{RegistrationFlow, RegistrationService};
pub use settings::RegistrationSettings;
