use std::collections::HashSet;
use std::sync::Arc;

use labtrend_core::{
    build_timeline, reconstruct, ConceptMetadata, LabConfig, PatientAggregate, RawObservation,
    RequestState, TimelineOutcome,
};
use tracing::Instrument;

use crate::pages::fetch_all_pages;
use crate::{ConceptResolver, FetchError, FreshnessCache, LabSource};

/// Entry point for laboratory data: owns the concept memo and the freshness cache.
///
/// Build one per process and share it; tests build a fresh one each.
pub struct LabEngine {
    source: Arc<dyn LabSource>,
    config: LabConfig,
    concepts: ConceptResolver,
    cache: FreshnessCache,
}

impl LabEngine {
    pub fn new(source: Arc<dyn LabSource>, config: LabConfig) -> Result<Self, FetchError> {
        config.validate()?;
        Ok(Self {
            source,
            cache: FreshnessCache::new(config.cache_capacity),
            concepts: ConceptResolver::new(),
            config,
        })
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    /// All laboratory results for `patient`, grouped by test or panel name.
    pub async fn aggregate(&self, patient: &str) -> Result<Arc<PatientAggregate>, FetchError> {
        let span = tracing::info_span!("lab_aggregate", patient = %patient);
        self.load_aggregate(patient).instrument(span).await
    }

    /// Timeline of one panel, or `PanelMissing` if the patient has no such panel.
    pub async fn timeline(
        &self,
        patient: &str,
        panel: &str,
    ) -> Result<TimelineOutcome, FetchError> {
        let aggregate = self.aggregate(patient).await?;
        Ok(build_timeline(&aggregate, panel))
    }

    /// Same as [`LabEngine::timeline`], with the failure folded into the state.
    pub async fn timeline_state(
        &self,
        patient: &str,
        panel: &str,
    ) -> RequestState<TimelineOutcome> {
        let result = self.timeline(patient, panel).await;
        if let Err(err) = &result {
            tracing::warn!(patient, panel, "Timeline request failed: {err}");
        }
        result.into()
    }

    /// Drop the cached aggregate for `patient`; returns whether one was held.
    pub fn invalidate(&self, patient: &str) -> bool {
        self.cache.invalidate(patient)
    }

    /// Patients currently cached, oldest first.
    pub fn cached_patients(&self) -> Vec<String> {
        self.cache.patients()
    }

    pub fn resolved_concepts(&self) -> usize {
        self.concepts.resolved_count()
    }

    async fn load_aggregate(
        &self,
        patient: &str,
    ) -> Result<Arc<PatientAggregate>, FetchError> {
        let source = self.source.as_ref();

        if let Some(aggregate) = self.cache.get(patient, source).await? {
            tracing::debug!("Serving cached aggregate");
            return Ok(aggregate);
        }

        let observations = fetch_all_pages(source, patient, &self.config).await?;
        let concepts = self.concepts.resolve(source, &observations).await?;
        let labs: Vec<ConceptMetadata> = concepts
            .into_iter()
            .filter(|concept| concept.class.is_lab())
            .collect();

        let dropped = count_unrecognized(&observations, &labs);
        if dropped > 0 {
            tracing::debug!(dropped, "Skipping observations without a lab concept");
        }

        let aggregate = Arc::new(reconstruct(&observations, &labs));
        let indicator = observations.first().map(|observation| observation.id.clone());
        self.cache.put(patient, Arc::clone(&aggregate), indicator);

        tracing::info!(
            observations = observations.len(),
            groups = aggregate.len(),
            "Lab aggregate rebuilt"
        );
        Ok(aggregate)
    }
}

fn count_unrecognized(observations: &[RawObservation], labs: &[ConceptMetadata]) -> usize {
    let known: HashSet<&str> = labs.iter().map(|concept| concept.uuid.as_str()).collect();
    observations
        .iter()
        .filter(|observation| {
            observation
                .concept_uuid()
                .map_or(true, |uuid| !known.contains(uuid))
        })
        .count()
}
