use async_trait::async_trait;
use labtrend_core::{ConceptMetadata, RawObservation};

use crate::FetchError;

/// One page of the laboratory observation search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObservationPage {
    /// Total matches reported by the server, across all pages.
    pub total: usize,
    pub entries: Vec<RawObservation>,
}

/// The three remote calls the engine depends on.
#[async_trait]
pub trait LabSource: Send + Sync {
    /// Laboratory observations for `patient`, newest first.
    async fn search_page(
        &self,
        patient: &str,
        offset: usize,
        count: usize,
    ) -> Result<ObservationPage, FetchError>;

    async fn fetch_concept(&self, uuid: &str) -> Result<ConceptMetadata, FetchError>;

    /// Id of the newest laboratory observation, used as the freshness indicator.
    async fn latest_observation_id(&self, patient: &str) -> Result<Option<String>, FetchError>;
}
