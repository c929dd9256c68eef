#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use labtrend_core::{ConceptClass, ConceptMetadata, RawObservation, ReferenceRange};
use labtrend_openmrs::{FetchError, LabSource, ObservationPage};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn concept(uuid: &str, display: &str, class: ConceptClass) -> ConceptMetadata {
    ConceptMetadata {
        uuid: uuid.to_string(),
        display: display.to_string(),
        class,
        range: ReferenceRange {
            low_normal: Some(12.0),
            hi_normal: Some(16.0),
            units: Some("g/dL".to_string()),
            ..ReferenceRange::default()
        },
    }
}

/// Numbered single tests `obs-0000`, `obs-0001`, ... all under `hgb`.
pub fn numbered_observations(total: usize) -> Vec<RawObservation> {
    (0..total)
        .map(|index| {
            RawObservation::new(&format!("obs-{index:04}"), "hgb", "2024-01-05T08:00")
                .with_value(index as f64)
        })
        .collect()
}

/// In-memory server that records every call.
pub struct MockSource {
    observations: Vec<RawObservation>,
    reported_total: usize,
    /// Keep serving full pages past the reported total.
    over_serve: bool,
    concepts: HashMap<String, ConceptMetadata>,
    latest_override: Mutex<Option<Option<String>>>,
    failing_offsets: Mutex<HashSet<usize>>,
    fail_probe: Mutex<bool>,
    failing_concept_fetches: Mutex<usize>,
    concept_delay: Duration,
    pub page_calls: AtomicUsize,
    pub probe_calls: AtomicUsize,
    pub concept_calls: Mutex<HashMap<String, usize>>,
}

impl MockSource {
    pub fn new(observations: Vec<RawObservation>, concepts: Vec<ConceptMetadata>) -> Self {
        Self {
            reported_total: observations.len(),
            observations,
            over_serve: false,
            concepts: concepts
                .into_iter()
                .map(|concept| (concept.uuid.clone(), concept))
                .collect(),
            latest_override: Mutex::new(None),
            failing_offsets: Mutex::new(HashSet::new()),
            fail_probe: Mutex::new(false),
            failing_concept_fetches: Mutex::new(0),
            concept_delay: Duration::from_millis(0),
            page_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            concept_calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_hemoglobin(total: usize) -> Self {
        Self::new(
            numbered_observations(total),
            vec![concept("hgb", "Hemoglobin", ConceptClass::Test)],
        )
    }

    /// Report `total` but serve full pages for every offset.
    pub fn over_serving(mut self, reported_total: usize) -> Self {
        self.reported_total = reported_total;
        self.over_serve = true;
        self
    }

    pub fn with_concept_delay(mut self, delay: Duration) -> Self {
        self.concept_delay = delay;
        self
    }

    pub fn fail_offset(&self, offset: usize) {
        self.failing_offsets.lock().unwrap().insert(offset);
    }

    pub fn heal(&self) {
        self.failing_offsets.lock().unwrap().clear();
        *self.fail_probe.lock().unwrap() = false;
    }

    pub fn fail_probe(&self) {
        *self.fail_probe.lock().unwrap() = true;
    }

    /// The next `count` concept fetches answer 500.
    pub fn fail_next_concept_fetches(&self, count: usize) {
        *self.failing_concept_fetches.lock().unwrap() = count;
    }

    pub fn set_latest(&self, latest: Option<&str>) {
        *self.latest_override.lock().unwrap() = Some(latest.map(str::to_string));
    }

    pub fn pages(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn concept_fetches(&self, uuid: &str) -> usize {
        self.concept_calls
            .lock()
            .unwrap()
            .get(uuid)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl LabSource for MockSource {
    async fn search_page(
        &self,
        _patient: &str,
        offset: usize,
        count: usize,
    ) -> Result<ObservationPage, FetchError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if self.failing_offsets.lock().unwrap().contains(&offset) {
            return Err(FetchError::Status {
                url: format!("mock://Observation?offset={offset}"),
                status: 503,
            });
        }

        let entries = if self.over_serve {
            (offset..offset + count)
                .map(|index| {
                    RawObservation::new(&format!("extra-{index:04}"), "hgb", "2024-01-05T08:00")
                })
                .collect()
        } else {
            self.observations
                .iter()
                .skip(offset)
                .take(count)
                .cloned()
                .collect()
        };

        Ok(ObservationPage {
            total: self.reported_total,
            entries,
        })
    }

    async fn fetch_concept(&self, uuid: &str) -> Result<ConceptMetadata, FetchError> {
        *self
            .concept_calls
            .lock()
            .unwrap()
            .entry(uuid.to_string())
            .or_insert(0) += 1;
        tokio::time::sleep(self.concept_delay).await;

        {
            let mut failing = self.failing_concept_fetches.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(FetchError::Status {
                    url: format!("mock://concept/{uuid}"),
                    status: 500,
                });
            }
        }

        self.concepts
            .get(uuid)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: format!("mock://concept/{uuid}"),
                status: 404,
            })
    }

    async fn latest_observation_id(&self, _patient: &str) -> Result<Option<String>, FetchError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_probe.lock().unwrap() {
            return Err(FetchError::Transport {
                url: "mock://Observation?_count=1".to_string(),
                message: "connection refused".to_string(),
            });
        }
        if let Some(latest) = self.latest_override.lock().unwrap().clone() {
            return Ok(latest);
        }
        Ok(self.observations.first().map(|observation| observation.id.clone()))
    }
}
