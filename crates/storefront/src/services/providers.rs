//! Provider onboarding: application submission and admin review.
//!
//! Approval is best-effort beyond the status change: a payout account and a
//! geocoded service area are attached when the processor and the places API
//! cooperate, and left for a later approval otherwise.

use chrono::Utc;
use tracing::{info, instrument, warn};

use brnno_core::wizard::provider::{ProviderApplicationDraft, ProviderApplicationRecord};
use brnno_core::{ApplicationStatus, ProviderId};

use crate::db::providers::ProviderRepository;
use crate::db::users::UserRepository;
use crate::db::{DocumentStore, RepositoryError};
use crate::models::{ProviderApplication, ProviderListing, SessionContext};
use crate::services::payments::PaymentGateway;
use crate::services::places::{LatLng, PlacesService, geo};

/// Provider onboarding over borrowed collaborators.
pub struct ProviderService<'a> {
    providers: ProviderRepository<'a>,
    users: UserRepository<'a>,
}

impl<'a> ProviderService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            providers: ProviderRepository::new(store),
            users: UserRepository::new(store),
        }
    }

    /// Persist a completed application and turn the applicant's profile
    /// into a provider account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if either write fails. The application is
    /// kept if only the profile update fails.
    #[instrument(skip(self, draft, user), fields(uid = %user.uid))]
    pub async fn submit(
        &self,
        draft: &ProviderApplicationDraft,
        user: &SessionContext,
    ) -> Result<ProviderApplication, RepositoryError> {
        let record = ProviderApplicationRecord::new(draft, user.uid.clone());
        let application = self.providers.create(&record).await?;
        self.users
            .mark_provider(&user.uid, &application.id, draft.business_name.as_deref())
            .await?;
        info!(application = %application.id, "provider application submitted");
        Ok(application)
    }

    /// Approve an application.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown application.
    #[instrument(skip(self, payments, places))]
    pub async fn approve(
        &self,
        id: &ProviderId,
        payments: &dyn PaymentGateway,
        places: Option<&PlacesService>,
    ) -> Result<ProviderApplication, RepositoryError> {
        let application = self.review(id, ApplicationStatus::Approved).await?;
        let details = &application.record.application;

        if application.payout_account_id.is_none() {
            let email = details.email.as_deref().unwrap_or_default();
            match payments.create_connected_account(email).await {
                Ok(account) => {
                    self.providers.set_payout_account(id, &account.id).await?;
                }
                Err(e) => warn!(error = %e, "payout account not created"),
            }
        }

        if application.location.is_none()
            && let (Some(places), Some(area)) = (places, details.service_area.as_deref())
        {
            match places.geocode(area).await {
                Ok(Some(location)) => self.providers.set_location(id, location).await?,
                Ok(None) => info!(area, "service area not found"),
                Err(e) => warn!(error = %e, "service area not geocoded"),
            }
        }

        info!("provider approved");
        self.providers.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Reject an application.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown application.
    #[instrument(skip(self))]
    pub async fn reject(&self, id: &ProviderId) -> Result<ProviderApplication, RepositoryError> {
        let application = self.review(id, ApplicationStatus::Rejected).await?;
        info!("provider rejected");
        Ok(application)
    }

    /// Approved providers, optionally limited to those within `radius_km`
    /// of `near` and sorted nearest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn listings(
        &self,
        near: Option<(LatLng, f64)>,
    ) -> Result<Vec<ProviderListing>, RepositoryError> {
        let approved = self.providers.with_status(ApplicationStatus::Approved).await?;
        Ok(match near {
            Some((origin, radius_km)) => geo::providers_within_radius(origin, &approved, radius_km),
            None => approved.iter().map(ProviderListing::from).collect(),
        })
    }

    /// Applications in `status`, bank details masked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn applications(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ProviderApplication>, RepositoryError> {
        Ok(self
            .providers
            .with_status(status)
            .await?
            .iter()
            .map(ProviderApplication::masked)
            .collect())
    }

    async fn review(
        &self,
        id: &ProviderId,
        status: ApplicationStatus,
    ) -> Result<ProviderApplication, RepositoryError> {
        if self.providers.get(id).await?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.providers.set_status(id, status, Utc::now()).await?;
        self.providers.get(id).await?.ok_or(RepositoryError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use brnno_core::{AccountType, Role, UserId};

    use super::*;
    use crate::db::MemoryDocumentStore;
    use crate::models::UserProfileRecord;
    use crate::services::payments::SimulatedPayments;
    use crate::services::places::{
        AutocompleteOptions, PlaceDetails, PlacePrediction, PlacesError, PlacesProvider,
    };

    struct FixedGeocoder;

    #[async_trait]
    impl PlacesProvider for FixedGeocoder {
        async fn autocomplete(
            &self,
            _text: &str,
            _options: &AutocompleteOptions,
        ) -> Result<Vec<PlacePrediction>, PlacesError> {
            Ok(Vec::new())
        }

        async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, PlacesError> {
            Err(PlacesError::NotFound(place_id.to_owned()))
        }

        async fn geocode(&self, _address: &str) -> Result<Option<LatLng>, PlacesError> {
            Ok(Some(LatLng {
                lat: 40.2338,
                lng: -111.6585,
            }))
        }
    }

    fn draft() -> ProviderApplicationDraft {
        ProviderApplicationDraft {
            business_name: Some("Shine Co".to_owned()),
            email: Some("shine@example.com".to_owned()),
            service_area: Some("Provo, UT".to_owned()),
            services: vec![
                "Full Detail".to_owned(),
                "Interior Detail".to_owned(),
                "Ceramic Coating".to_owned(),
            ],
            bank_account: Some("000123456789".to_owned()),
            background_check: true,
            ..Default::default()
        }
    }

    async fn applicant(store: &MemoryDocumentStore) -> SessionContext {
        let users = UserRepository::new(store);
        let profile = users
            .create(&UserProfileRecord::customer(
                UserId::new("u-shine"),
                "shine@example.com".to_owned(),
                None,
            ))
            .await
            .unwrap();
        SessionContext::from(&profile)
    }

    #[tokio::test]
    async fn test_submit_marks_profile_as_provider() {
        let store = MemoryDocumentStore::new();
        let user = applicant(&store).await;
        let application = ProviderService::new(&store)
            .submit(&draft(), &user)
            .await
            .unwrap();
        assert_eq!(application.status(), ApplicationStatus::Pending);
        assert_eq!(application.record.user_id, user.uid);

        let profile = UserRepository::new(&store).get(&user.uid).await.unwrap().unwrap();
        assert_eq!(profile.record.account_type, AccountType::Provider);
        assert_eq!(profile.record.role, Role::User);
        assert_eq!(
            profile.record.provider_application_id.as_ref(),
            Some(&application.id)
        );
        assert_eq!(profile.record.business_name.as_deref(), Some("Shine Co"));
    }

    #[tokio::test]
    async fn test_approve_attaches_payout_and_location() {
        let store = MemoryDocumentStore::new();
        let user = applicant(&store).await;
        let service = ProviderService::new(&store);
        let application = service.submit(&draft(), &user).await.unwrap();

        let places = PlacesService::new(Arc::new(FixedGeocoder), Duration::from_secs(60));
        let approved = service
            .approve(&application.id, &SimulatedPayments::new(), Some(&places))
            .await
            .unwrap();
        assert_eq!(approved.status(), ApplicationStatus::Approved);
        assert!(approved.reviewed_at.is_some());
        assert!(approved.payout_account_id.unwrap().starts_with("acct_"));
        assert!(approved.location.is_some());

        let listings = service.listings(None).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].name, "Shine Co");

        let provo = LatLng {
            lat: 40.2969,
            lng: -111.6946,
        };
        assert_eq!(service.listings(Some((provo, 25.0))).await.unwrap().len(), 1);
        let boise = LatLng {
            lat: 43.6150,
            lng: -116.2023,
        };
        assert!(service.listings(Some((boise, 25.0))).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reject_and_masked_listing() {
        let store = MemoryDocumentStore::new();
        let user = applicant(&store).await;
        let service = ProviderService::new(&store);
        let application = service.submit(&draft(), &user).await.unwrap();

        let pending = service.applications(ApplicationStatus::Pending).await.unwrap();
        assert_eq!(
            pending[0].record.application.bank_account.as_deref(),
            Some("********6789")
        );

        let rejected = service.reject(&application.id).await.unwrap();
        assert_eq!(rejected.status(), ApplicationStatus::Rejected);
        assert!(service.listings(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_unknown_application() {
        let store = MemoryDocumentStore::new();
        let err = ProviderService::new(&store)
            .reject(&ProviderId::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
