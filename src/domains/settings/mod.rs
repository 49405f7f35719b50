pub mod types;

pub use types::{RegistrationMessages, RegistrationSettings};
