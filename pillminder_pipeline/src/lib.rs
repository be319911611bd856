pub mod auth;
pub mod extraction;
pub mod factory;
pub mod fetch;
pub mod pharmacy;

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use thiserror::Error;

use pillminder_models::user::UserId;
use pillminder_storage::ReminderStorage;

use auth::{AuthError, TokenSource};
use extraction::{DosageExtractionClient, TextExtractionClient};
use factory::build_reminders;
use fetch::{NetworkError, ResilientClient, RetryPolicy};
use pharmacy::{GeoPoint, PharmacySearchClient, PharmacySearchResults};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Endpoints of the three upstream services the pipeline talks to.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub ocr_url: String,
    pub extractor_url: String,
    pub pharmacy_url: String,
}

/// Outcome of one prescription→reminders run. Creation is not atomic:
/// partial success is reported by count, never rolled back.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CreationReport {
    pub created: usize,
    pub failed: usize,
    pub skipped_entries: usize,
}

/// The prescription workflow: raw text (or an uploaded image, via OCR) in,
/// persisted daily reminders out. All upstream calls share one retrying
/// client; the scheduler keeps polling independently while any of this is
/// in flight.
pub struct PrescriptionPipeline {
    text_client: TextExtractionClient,
    dosage_client: DosageExtractionClient,
    pharmacy_client: PharmacySearchClient,
    storage: Arc<dyn ReminderStorage>,
}

impl PrescriptionPipeline {
    pub fn new(
        endpoints: ServiceEndpoints,
        auth: Arc<dyn TokenSource>,
        storage: Arc<dyn ReminderStorage>,
    ) -> Self {
        let fetch = Arc::new(ResilientClient::new(RetryPolicy::default()));
        Self::with_fetch(fetch, endpoints, auth, storage)
    }

    pub fn with_fetch(
        fetch: Arc<ResilientClient>,
        endpoints: ServiceEndpoints,
        auth: Arc<dyn TokenSource>,
        storage: Arc<dyn ReminderStorage>,
    ) -> Self {
        Self {
            text_client: TextExtractionClient::new(
                Arc::clone(&fetch),
                Arc::clone(&auth),
                endpoints.ocr_url,
            ),
            dosage_client: DosageExtractionClient::new(
                Arc::clone(&fetch),
                Arc::clone(&auth),
                endpoints.extractor_url,
            ),
            pharmacy_client: PharmacySearchClient::new(fetch, auth, endpoints.pharmacy_url),
            storage,
        }
    }

    /// Runs an uploaded prescription image through the OCR service and
    /// returns the raw text for the user to review or edit.
    pub async fn extract_text(&self, image_base64: &str) -> Result<String, PipelineError> {
        self.text_client.extract_text(image_base64).await
    }

    /// Derives reminders from free-form prescription text and persists
    /// them, one insert per dose slot.
    pub async fn create_reminders_from_text(
        &self,
        raw_text: &str,
        user_id: UserId,
    ) -> Result<CreationReport, PipelineError> {
        self.create_reminders_at(raw_text, user_id, Local::now().naive_local())
            .await
    }

    pub async fn create_reminders_at(
        &self,
        raw_text: &str,
        user_id: UserId,
        reference: NaiveDateTime,
    ) -> Result<CreationReport, PipelineError> {
        let entries = self.dosage_client.extract_dosages(raw_text).await?;
        if entries.is_empty() {
            log::info!("No dosage codes found in text. [user_id = {user_id}]");
            return Ok(CreationReport::default());
        }

        let factory = build_reminders(&entries, reference, user_id);
        let mut report = CreationReport {
            skipped_entries: factory.skipped.len(),
            ..Default::default()
        };

        for reminder in factory.reminders {
            match self.storage.insert(reminder).await {
                Ok(_) => report.created += 1,
                Err(error) => {
                    // One lost insert must not sink the rest of the batch.
                    log::warn!(
                        "Failed to persist reminder. [user_id = {user_id}, error = {error}]"
                    );
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Created reminders from prescription text. [user_id = {}, created = {}, failed = {}, skipped = {}]",
            user_id,
            report.created,
            report.failed,
            report.skipped_entries
        );
        Ok(report)
    }

    /// Looks up nearby pharmacies stocking the medicines mentioned in the
    /// extracted text.
    pub async fn search_pharmacies(
        &self,
        raw_text: &str,
        location: Option<GeoPoint>,
        radius_meters: Option<u32>,
    ) -> Result<PharmacySearchResults, PipelineError> {
        self.pharmacy_client
            .search(raw_text, location, radius_meters)
            .await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;

    use pillminder_models::reminder::{Reminder, ReminderId};
    use pillminder_storage::{
        InMemoryReminderStorage, NewReminder, StoreError, UpdateReminder,
    };

    use crate::auth::StaticTokenSource;
    use crate::fetch::testing::ScriptedExecutor;
    use crate::fetch::RawResponse;

    use super::*;

    const USER: UserId = 1;

    fn endpoints() -> ServiceEndpoints {
        ServiceEndpoints {
            ocr_url: "http://localhost:8000/ocr/handwritten-text".to_owned(),
            extractor_url: "http://localhost:3001/api/extract-reminders".to_owned(),
            pharmacy_url: "http://localhost:3001/api/pharmacies/search".to_owned(),
        }
    }

    fn authed() -> Arc<dyn TokenSource> {
        Arc::new(StaticTokenSource::new(Some("id-token".to_owned())))
    }

    fn pipeline_with(
        outcomes: Vec<Result<RawResponse, NetworkError>>,
        storage: Arc<dyn ReminderStorage>,
    ) -> PrescriptionPipeline {
        let executor = ScriptedExecutor::new(outcomes);
        let fetch = Arc::new(ResilientClient::with_executor(
            Box::new(executor),
            RetryPolicy::default(),
        ));
        PrescriptionPipeline::with_fetch(fetch, endpoints(), authed(), storage)
    }

    fn extraction_response() -> Result<RawResponse, NetworkError> {
        Ok(RawResponse {
            status: 200,
            body: json!([{ "medicineName": "Amoxicillin", "dosageCode": "1 0 1" }]),
        })
    }

    #[tokio::test]
    async fn prescription_text_becomes_two_daily_reminders() {
        let storage = Arc::new(InMemoryReminderStorage::new());
        let pipeline = pipeline_with(vec![extraction_response()], storage.clone());

        let reference = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap();
        let report = pipeline
            .create_reminders_at("Amoxicillin 1 0 1", USER, reference)
            .await
            .unwrap();

        assert_eq!(
            report,
            CreationReport {
                created: 2,
                failed: 0,
                skipped_entries: 0,
            }
        );

        let reminders = storage.get_all_user_reminders(USER).await.unwrap();
        assert_eq!(reminders.len(), 2);
        // Ordered by due instant: night today comes before morning tomorrow.
        assert_eq!(
            reminders[0].due_at.instant(),
            NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(20, 0, 0)
                .unwrap()
        );
        assert_eq!(
            reminders[1].due_at.instant(),
            NaiveDate::from_ymd_opt(2025, 1, 2)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap()
        );
        for reminder in &reminders {
            assert_eq!(reminder.title, "Medication: Amoxicillin");
            assert!(!reminder.acknowledged);
        }
    }

    #[tokio::test]
    async fn no_dosages_found_is_a_clean_no_op() {
        let storage = Arc::new(InMemoryReminderStorage::new());
        let pipeline = pipeline_with(
            vec![Ok(RawResponse {
                status: 200,
                body: json!([]),
            })],
            storage.clone(),
        );

        let report = pipeline
            .create_reminders_from_text("nothing medical here", USER)
            .await
            .unwrap();

        assert_eq!(report, CreationReport::default());
        assert!(storage.get_all_user_reminders(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn extraction_failure_surfaces_as_a_network_error() {
        let storage = Arc::new(InMemoryReminderStorage::new());
        let pipeline = pipeline_with(
            vec![Ok(RawResponse {
                status: 400,
                body: json!({ "message": "rawText is required" }),
            })],
            storage,
        );

        let result = pipeline.create_reminders_from_text("", USER).await;
        match result {
            Err(PipelineError::Network(NetworkError::Status { status, message })) => {
                assert_eq!(status, 400);
                assert_eq!(message, "rawText is required");
            }
            other => panic!("expected a surfaced network error, got {other:?}"),
        }
    }

    /// Store that admits a fixed number of inserts and then fails, for
    /// exercising partial batch success.
    struct QuotaStorage {
        inner: InMemoryReminderStorage,
        admitted: std::sync::Mutex<usize>,
    }

    #[async_trait]
    impl ReminderStorage for QuotaStorage {
        async fn insert(&self, reminder: NewReminder) -> Result<Reminder, StoreError> {
            {
                let mut admitted = self.admitted.lock().unwrap();
                if *admitted == 0 {
                    return Err(StoreError::Unavailable("write quota exhausted".to_owned()));
                }
                *admitted -= 1;
            }
            self.inner.insert(reminder).await
        }

        async fn update(
            &self,
            id: ReminderId,
            fields: UpdateReminder,
        ) -> Result<Reminder, StoreError> {
            self.inner.update(id, fields).await
        }

        async fn delete(&self, id: ReminderId) -> Result<(), StoreError> {
            self.inner.delete(id).await
        }

        async fn get(&self, id: ReminderId) -> Result<Option<Reminder>, StoreError> {
            self.inner.get(id).await
        }

        async fn get_all_user_reminders(
            &self,
            user_id: UserId,
        ) -> Result<Vec<Reminder>, StoreError> {
            self.inner.get_all_user_reminders(user_id).await
        }

        async fn subscribe(
            &self,
            user_id: UserId,
        ) -> tokio::sync::watch::Receiver<Vec<Reminder>> {
            self.inner.subscribe(user_id).await
        }
    }

    #[tokio::test]
    async fn partial_persistence_failure_is_reported_not_rolled_back() {
        let storage = Arc::new(QuotaStorage {
            inner: InMemoryReminderStorage::new(),
            admitted: std::sync::Mutex::new(1),
        });
        let pipeline = pipeline_with(vec![extraction_response()], storage.clone());

        let reference = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap();
        let report = pipeline
            .create_reminders_at("Amoxicillin 1 0 1", USER, reference)
            .await
            .unwrap();

        assert_eq!(
            report,
            CreationReport {
                created: 1,
                failed: 1,
                skipped_entries: 0,
            }
        );
        // The successful insert stays.
        assert_eq!(
            storage.get_all_user_reminders(USER).await.unwrap().len(),
            1
        );
    }
}
