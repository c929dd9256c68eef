use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::try_join_all;
use labtrend_core::{ConceptMetadata, RawObservation};
use tokio::sync::OnceCell;

use crate::{FetchError, LabSource};

/// Concept metadata memo, shared by every request an engine serves.
///
/// Each uuid owns one cell: concurrent lookups of the same uuid wait on a single
/// fetch, and a failed fetch leaves the cell empty so a later request retries.
#[derive(Default)]
pub struct ConceptResolver {
    memo: Mutex<HashMap<String, Arc<OnceCell<ConceptMetadata>>>>,
}

impl ConceptResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for every distinct concept referenced by `observations`,
    /// lab or not, in uuid order.
    pub async fn resolve(
        &self,
        source: &dyn LabSource,
        observations: &[RawObservation],
    ) -> Result<Vec<ConceptMetadata>, FetchError> {
        let uuids: BTreeSet<&str> = observations
            .iter()
            .filter_map(RawObservation::concept_uuid)
            .collect();
        try_join_all(uuids.into_iter().map(|uuid| self.lookup(source, uuid))).await
    }

    pub async fn lookup(
        &self,
        source: &dyn LabSource,
        uuid: &str,
    ) -> Result<ConceptMetadata, FetchError> {
        let cell = self.cell(uuid);
        let concept = cell
            .get_or_try_init(|| async move {
                tracing::debug!(uuid, "Fetching concept metadata");
                source.fetch_concept(uuid).await
            })
            .await?;
        Ok(concept.clone())
    }

    /// Number of concepts already resolved.
    pub fn resolved_count(&self) -> usize {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    fn cell(&self, uuid: &str) -> Arc<OnceCell<ConceptMetadata>> {
        let mut memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        memo.entry(uuid.to_string()).or_default().clone()
    }
}
