use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domains::registration::providers::ParticipantIdGenerator;
use crate::errors::{DomainError, ServiceError, ServiceResult};
use crate::validation::{FieldValidator, ParticipantIdValidator};

const MAX_DEVICE_PREFIX_LENGTH: usize = 8;
const MAX_GENERATION_ATTEMPTS: u32 = 1000;

/// Persists the last sequence number handed out per device
pub trait SequenceStore: Send + Sync {
    fn get_sequence(&self, device_name: &str) -> u32;

    fn store_sequence(&self, device_name: &str, counter: u32);
}

#[derive(Default)]
pub struct InMemorySequenceStore {
    sequences: Mutex<HashMap<String, u32>>,
}

impl InMemorySequenceStore {
    fn key(device_name: &str) -> String {
        format!("sequence_{}", device_name)
    }
}

impl SequenceStore for InMemorySequenceStore {
    fn get_sequence(&self, device_name: &str) -> u32 {
        self.sequences
            .lock()
            .map(|s| s.get(&Self::key(device_name)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn store_sequence(&self, device_name: &str, counter: u32) {
        log::info!("storeSequence: {} {}", device_name, counter);
        if let Ok(mut sequences) = self.sequences.lock() {
            sequences.insert(Self::key(device_name), counter);
        }
    }
}

/// Tells the generator whether an ID is already in use locally or remotely
#[async_trait]
pub trait ParticipantIdLookup: Send + Sync {
    async fn participant_id_exists(&self, participant_id: &str) -> ServiceResult<bool>;
}

/// Generates `<DEVICE>-<NNNNNN>` IDs from a per-device counter, skipping taken values.
pub struct SequenceParticipantIdGenerator {
    device_name: String,
    store: Arc<dyn SequenceStore>,
    lookup: Arc<dyn ParticipantIdLookup>,
}

impl SequenceParticipantIdGenerator {
    pub fn new(device_name: &str, store: Arc<dyn SequenceStore>, lookup: Arc<dyn ParticipantIdLookup>) -> Self {
        Self {
            device_name: device_name.to_string(),
            store,
            lookup,
        }
    }

    fn device_prefix(&self) -> String {
        let prefix: String = self
            .device_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(MAX_DEVICE_PREFIX_LENGTH)
            .collect::<String>()
            .to_uppercase();
        if prefix.is_empty() {
            "DEV".to_string()
        } else {
            prefix
        }
    }

    fn format_id(&self, counter: u32) -> String {
        format!("{}-{:06}", self.device_prefix(), counter)
    }
}

#[async_trait]
impl ParticipantIdGenerator for SequenceParticipantIdGenerator {
    async fn generate_unique_participant_id(&self) -> ServiceResult<String> {
        let mut counter = self.store.get_sequence(&self.device_name);

        for _ in 0..MAX_GENERATION_ATTEMPTS {
            counter = counter.checked_add(1).ok_or_else(|| {
                ServiceError::Domain(DomainError::Internal("Participant ID sequence exhausted".to_string()))
            })?;
            let candidate = self.format_id(counter);
            if !ParticipantIdValidator.validate(&candidate) {
                return Err(ServiceError::Domain(DomainError::Internal(format!(
                    "Generated participant ID '{}' is not valid",
                    candidate
                ))));
            }
            if self.lookup.participant_id_exists(&candidate).await? {
                log::debug!("Generated participant ID {} already taken, skipping", candidate);
                continue;
            }
            self.store.store_sequence(&self.device_name, counter);
            return Ok(candidate);
        }

        Err(ServiceError::Domain(DomainError::Internal(format!(
            "No free participant ID found after {} attempts",
            MAX_GENERATION_ATTEMPTS
        ))))
    }
}
