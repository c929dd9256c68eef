use async_trait::async_trait;
use labtrend_core::ConceptMetadata;
use serde_json::Value;

use crate::wire::{parse_concept, parse_latest_id, parse_search_bundle};
use crate::{ClientConfig, FetchError, LabSource, ObservationPage};

/// HTTP client for the OpenMRS FHIR and REST endpoints.
pub struct OpenMrsClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl OpenMrsClient {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| FetchError::Transport {
                url: config.base_url.clone(),
                message: err.to_string(),
            })?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> Result<Self, FetchError> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|err| {
                let message = if err.is_timeout() {
                    format!("Request timed out after {}s", self.config.timeout_secs)
                } else {
                    err.to_string()
                };
                FetchError::Transport {
                    url: url.to_string(),
                    message,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))
    }
}

/// Query string for the laboratory observation search, newest first.
pub(crate) fn search_query(patient: &str, offset: usize, count: usize) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("subject:Patient", patient.to_string()),
        ("category", "laboratory".to_string()),
        ("_sort", "-date".to_string()),
        ("_summary", "data".to_string()),
        ("_format", "json".to_string()),
        ("_count", count.to_string()),
    ];
    if offset > 0 {
        query.push(("_getpagesoffset", offset.to_string()));
    }
    query
}

#[async_trait]
impl LabSource for OpenMrsClient {
    async fn search_page(
        &self,
        patient: &str,
        offset: usize,
        count: usize,
    ) -> Result<ObservationPage, FetchError> {
        let url = self.config.fhir_url("Observation");
        let bundle = self
            .get_json(&url, &search_query(patient, offset, count))
            .await?;
        parse_search_bundle(&bundle)
    }

    async fn fetch_concept(&self, uuid: &str) -> Result<ConceptMetadata, FetchError> {
        let url = self.config.rest_url(&format!("concept/{uuid}"));
        let concept = self.get_json(&url, &[("v", "full".to_string())]).await?;
        parse_concept(&concept)
    }

    async fn latest_observation_id(&self, patient: &str) -> Result<Option<String>, FetchError> {
        let url = self.config.fhir_url("Observation");
        let bundle = self.get_json(&url, &search_query(patient, 0, 1)).await?;
        parse_latest_id(&bundle)
    }
}
