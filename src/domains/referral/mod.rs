pub mod types;
pub mod service;

pub use types::{NewReferral, ReferralMessages, ReferralOutcome};
pub use service::{ReferralService, ReferralServiceImpl, VisitObservationUpdater};
