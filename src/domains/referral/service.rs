use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domains::referral::types::{NewReferral, ReferralMessages, ReferralOutcome, FIELD_CLINIC, FIELD_REASON};
use crate::domains::registration::observable::Observable;
use crate::domains::registration::providers::ConfigurationProvider;
use crate::errors::ServiceResult;

/// Records observations on the encounter of a visit
#[async_trait]
pub trait VisitObservationUpdater: Send + Sync {
    async fn update_encounter_observations_by_visit(
        &self,
        visit_uuid: &str,
        observations: BTreeMap<String, String>,
    ) -> ServiceResult<()>;
}

/// Trait defining referral service operations
#[async_trait]
pub trait ReferralService: Send + Sync {
    /// Names of the clinics a participant can be referred to
    async fn list_clinics(&self) -> ServiceResult<Vec<String>>;

    async fn refer(&self, referral: NewReferral) -> ReferralOutcome;
}

pub struct ReferralServiceImpl {
    configuration: Arc<dyn ConfigurationProvider>,
    updater: Arc<dyn VisitObservationUpdater>,
    messages: ReferralMessages,
    pub clinic_error: Observable<Option<String>>,
    pub reason_error: Observable<Option<String>>,
}

impl ReferralServiceImpl {
    pub fn new(
        configuration: Arc<dyn ConfigurationProvider>,
        updater: Arc<dyn VisitObservationUpdater>,
        messages: ReferralMessages,
    ) -> Self {
        Self {
            configuration,
            updater,
            messages,
            clinic_error: Observable::default(),
            reason_error: Observable::default(),
        }
    }

    /// Builds the service with `messages` overridden from the translation map.
    /// A failed localization fetch keeps the given messages.
    pub async fn localized(
        configuration: Arc<dyn ConfigurationProvider>,
        updater: Arc<dyn VisitObservationUpdater>,
        messages: ReferralMessages,
    ) -> Self {
        let messages = match configuration.get_localization().await {
            Ok(loc) => messages.localized(&loc),
            Err(e) => {
                log::warn!("Localization fetching failed, using default referral texts: {}", e);
                messages
            }
        };
        Self::new(configuration, updater, messages)
    }

    /// Sets the per-field messages; returns whether the referral may be sent
    fn validate(&self, referral: &NewReferral) -> bool {
        self.clinic_error.set(None);
        self.reason_error.set(None);
        let errors = referral.field_errors();
        for error in &errors {
            match error.field() {
                Some(FIELD_CLINIC) => self.clinic_error.set(Some(self.messages.clinic_required.clone())),
                Some(FIELD_REASON) => self.reason_error.set(Some(self.messages.reason_required.clone())),
                _ => {}
            }
        }
        errors.is_empty()
    }
}

#[async_trait]
impl ReferralService for ReferralServiceImpl {
    async fn list_clinics(&self) -> ServiceResult<Vec<String>> {
        let sites = self.configuration.get_sites().await.map_err(|e| {
            log::error!("Locations fetching failed: {}", e);
            e
        })?;
        Ok(sites.into_iter().map(|site| site.name).collect())
    }

    async fn refer(&self, referral: NewReferral) -> ReferralOutcome {
        if !self.validate(&referral) {
            return ReferralOutcome::InvalidInput;
        }

        match self
            .updater
            .update_encounter_observations_by_visit(&referral.visit_uuid, referral.observations())
            .await
        {
            Ok(()) => {
                log::info!("Visit {} referred to {}", referral.visit_uuid, referral.clinic);
                ReferralOutcome::Referred(self.messages.success_text(&referral.clinic))
            }
            Err(e) => {
                log::error!("Something went wrong during referring: {}", e);
                ReferralOutcome::Failed(self.messages.failed.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::referral::types::{REFERRAL_ADDITIONAL_INFO_CONCEPT_NAME, REFERRAL_CLINIC_CONCEPT_NAME};
    use crate::domains::registration::types::{Configuration, NinIdentifier, Site, TranslationMap};
    use crate::errors::ServiceError;
    use std::sync::Mutex;

    struct Sites(ServiceResult<Vec<Site>>);

    struct Translations(ServiceResult<TranslationMap>);

    #[async_trait]
    impl ConfigurationProvider for Translations {
        async fn get_configuration(&self) -> ServiceResult<Configuration> {
            Ok(Configuration::default())
        }

        async fn get_site_by_uuid(&self, _uuid: &str) -> ServiceResult<Option<Site>> {
            Ok(None)
        }

        async fn get_sites(&self) -> ServiceResult<Vec<Site>> {
            Ok(Vec::new())
        }

        async fn get_localization(&self) -> ServiceResult<TranslationMap> {
            self.0.clone()
        }

        async fn get_nin_identifiers(&self) -> ServiceResult<Vec<NinIdentifier>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl ConfigurationProvider for Sites {
        async fn get_configuration(&self) -> ServiceResult<Configuration> {
            Ok(Configuration::default())
        }

        async fn get_site_by_uuid(&self, _uuid: &str) -> ServiceResult<Option<Site>> {
            Ok(None)
        }

        async fn get_sites(&self) -> ServiceResult<Vec<Site>> {
            self.0.clone()
        }

        async fn get_localization(&self) -> ServiceResult<TranslationMap> {
            Ok(TranslationMap::new())
        }

        async fn get_nin_identifiers(&self) -> ServiceResult<Vec<NinIdentifier>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingUpdater {
        fail: bool,
        calls: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    }

    #[async_trait]
    impl VisitObservationUpdater for RecordingUpdater {
        async fn update_encounter_observations_by_visit(
            &self,
            visit_uuid: &str,
            observations: BTreeMap<String, String>,
        ) -> ServiceResult<()> {
            if self.fail {
                return Err(ServiceError::Network("offline".to_string()));
            }
            self.calls.lock().unwrap().push((visit_uuid.to_string(), observations));
            Ok(())
        }
    }

    fn site(name: &str) -> Site {
        Site {
            uuid: format!("{}-uuid", name),
            name: name.to_string(),
            country_code: "256".to_string(),
        }
    }

    fn service(updater: Arc<RecordingUpdater>) -> ReferralServiceImpl {
        let sites = Sites(Ok(vec![site("Mulago"), site("Kawempe")]));
        ReferralServiceImpl::new(Arc::new(sites), updater, ReferralMessages::default())
    }

    #[tokio::test]
    async fn test_list_clinics_returns_site_names() {
        let service = service(Arc::new(RecordingUpdater::default()));
        assert_eq!(service.list_clinics().await.unwrap(), vec!["Mulago", "Kawempe"]);
    }

    #[tokio::test]
    async fn test_list_clinics_propagates_failure() {
        let sites = Sites(Err(ServiceError::Network("offline".to_string())));
        let service = ReferralServiceImpl::new(
            Arc::new(sites),
            Arc::new(RecordingUpdater::default()),
            ReferralMessages::default(),
        );
        assert!(service.list_clinics().await.is_err());
    }

    #[tokio::test]
    async fn test_refer_records_observations() {
        let updater = Arc::new(RecordingUpdater::default());
        let service = service(updater.clone());

        let outcome = service.refer(NewReferral::new("visit-1", "Mulago", "High fever")).await;

        assert_eq!(outcome, ReferralOutcome::Referred("Participant referred to Mulago".to_string()));
        let calls = updater.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "visit-1");
        assert_eq!(calls[0].1[REFERRAL_CLINIC_CONCEPT_NAME], "Mulago");
        assert_eq!(calls[0].1[REFERRAL_ADDITIONAL_INFO_CONCEPT_NAME], "High fever");
    }

    #[tokio::test]
    async fn test_missing_fields_block_referral() {
        let updater = Arc::new(RecordingUpdater::default());
        let service = service(updater.clone());

        let outcome = service.refer(NewReferral::new("visit-1", "", "")).await;

        assert_eq!(outcome, ReferralOutcome::InvalidInput);
        assert_eq!(service.clinic_error.get(), Some(ReferralMessages::default().clinic_required));
        assert_eq!(service.reason_error.get(), Some(ReferralMessages::default().reason_required));
        assert!(updater.calls.lock().unwrap().is_empty());

        service.refer(NewReferral::new("visit-1", "Mulago", "")).await;
        assert_eq!(service.clinic_error.get(), None);
        assert!(service.reason_error.get().is_some());
    }

    #[tokio::test]
    async fn test_update_failure_reports_failure_text() {
        let updater = Arc::new(RecordingUpdater {
            fail: true,
            ..Default::default()
        });
        let service = service(updater);

        let outcome = service.refer(NewReferral::new("visit-1", "Mulago", "High fever")).await;

        assert_eq!(outcome, ReferralOutcome::Failed(ReferralMessages::default().failed));
    }

    #[tokio::test]
    async fn test_localized_texts_reach_outcomes_and_messages() {
        let mut loc = TranslationMap::new();
        loc.insert("referral_page_success_referral_text".to_string(), "Imetumwa kwa".to_string());
        loc.insert(
            "referral_page_referral_reason_cannot_be_empty".to_string(),
            "Sababu inahitajika".to_string(),
        );
        let service = ReferralServiceImpl::localized(
            Arc::new(Translations(Ok(loc))),
            Arc::new(RecordingUpdater::default()),
            ReferralMessages::default(),
        )
        .await;

        let outcome = service.refer(NewReferral::new("visit-1", "Mulago", "")).await;
        assert_eq!(outcome, ReferralOutcome::InvalidInput);
        assert_eq!(service.reason_error.get(), Some("Sababu inahitajika".to_string()));

        let outcome = service.refer(NewReferral::new("visit-1", "Mulago", "fever")).await;
        assert_eq!(outcome, ReferralOutcome::Referred("Imetumwa kwa Mulago".to_string()));
    }

    #[tokio::test]
    async fn test_localization_failure_keeps_default_texts() {
        let service = ReferralServiceImpl::localized(
            Arc::new(Translations(Err(ServiceError::Network("offline".to_string())))),
            Arc::new(RecordingUpdater::default()),
            ReferralMessages::default(),
        )
        .await;

        let outcome = service.refer(NewReferral::new("visit-1", "Mulago", "fever")).await;
        assert_eq!(outcome, ReferralOutcome::Referred("Participant referred to Mulago".to_string()));
    }
}
