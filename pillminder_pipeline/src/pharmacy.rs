use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::PipelineError;
use super::auth::TokenSource;
use super::fetch::ResilientClient;

pub const DEFAULT_SEARCH_RADIUS_METERS: u32 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryInfo {
    pub quantity: Option<u32>,
    pub arrived_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyMatch {
    pub pharmacy_name: String,
    pub address: String,
    pub distance_meters: Option<f64>,
    pub inventory: Option<InventoryInfo>,
}

/// Per-medicine match lists, keyed by the medicine name the search service
/// recognized in the submitted text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PharmacySearchResults {
    #[serde(default)]
    pub medicines: BTreeMap<String, Vec<PharmacyMatch>>,
}

/// Client for the pharmacy inventory search. Takes the raw extracted text
/// (medicine recognition happens server-side) and an optional location to
/// rank matches by distance.
pub struct PharmacySearchClient {
    fetch: Arc<ResilientClient>,
    auth: Arc<dyn TokenSource>,
    endpoint: String,
}

impl PharmacySearchClient {
    pub fn new(fetch: Arc<ResilientClient>, auth: Arc<dyn TokenSource>, endpoint: String) -> Self {
        Self {
            fetch,
            auth,
            endpoint,
        }
    }

    pub async fn search(
        &self,
        raw_text: &str,
        location: Option<GeoPoint>,
        radius_meters: Option<u32>,
    ) -> Result<PharmacySearchResults, PipelineError> {
        let token = self.auth.bearer_token()?;
        let body = json!({
            "medicines": raw_text,
            "location": location,
            "radiusMeters": radius_meters.unwrap_or(DEFAULT_SEARCH_RADIUS_METERS),
        });

        let results = self
            .fetch
            .post_json(&self.endpoint, &body, Some(&token))
            .await?;
        Ok(results)
    }
}
