use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use labtrend_core::PatientAggregate;

use crate::{FetchError, LabSource};

/// A reconstructed aggregate plus what it takes to tell whether it is still current.
#[derive(Debug, Clone)]
pub struct CacheRecord {
    pub aggregate: Arc<PatientAggregate>,
    pub created_at: DateTime<Utc>,
    /// Id of the newest observation when the aggregate was built.
    pub indicator: Option<String>,
    sequence: u64,
}

#[derive(Default)]
struct CacheState {
    records: HashMap<String, CacheRecord>,
    next_sequence: u64,
}

/// Per-patient aggregates, bounded by creation order.
///
/// A hit is only returned after the server confirms the newest observation id
/// has not changed. There is no time-based expiry.
pub struct FreshnessCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl FreshnessCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Cached aggregate for `patient`, if present and confirmed fresh by the probe.
    pub async fn get(
        &self,
        patient: &str,
        source: &dyn LabSource,
    ) -> Result<Option<Arc<PatientAggregate>>, FetchError> {
        let Some(record) = self.record(patient) else {
            return Ok(None);
        };

        let latest = source.latest_observation_id(patient).await?;
        if latest == record.indicator {
            Ok(Some(record.aggregate))
        } else {
            tracing::debug!(
                patient,
                cached = ?record.indicator,
                latest = ?latest,
                "Cached aggregate is stale"
            );
            Ok(None)
        }
    }

    /// Store `aggregate` for `patient`, then evict the oldest records beyond capacity.
    pub fn put(&self, patient: &str, aggregate: Arc<PatientAggregate>, indicator: Option<String>) {
        let mut state = self.lock();
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.records.insert(
            patient.to_string(),
            CacheRecord {
                aggregate,
                created_at: Utc::now(),
                indicator,
                sequence,
            },
        );

        while state.records.len() > self.capacity {
            let Some(oldest) = state
                .records
                .iter()
                .min_by_key(|(_, record)| record.sequence)
                .map(|(patient, _)| patient.clone())
            else {
                break;
            };
            state.records.remove(&oldest);
            tracing::debug!(patient = %oldest, "Evicted cached aggregate");
        }
    }

    /// Snapshot of the stored record, without consulting the server.
    pub fn record(&self, patient: &str) -> Option<CacheRecord> {
        self.lock().records.get(patient).cloned()
    }

    pub fn invalidate(&self, patient: &str) -> bool {
        self.lock().records.remove(patient).is_some()
    }

    /// Cached patients, oldest first.
    pub fn patients(&self) -> Vec<String> {
        let state = self.lock();
        let mut records: Vec<_> = state.records.iter().collect();
        records.sort_by_key(|(_, record)| record.sequence);
        records
            .into_iter()
            .map(|(patient, _)| patient.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
