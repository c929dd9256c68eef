//! Logic lõi tổng hợp kết quả xét nghiệm: tái dựng panel, đánh giá ngưỡng và timeline.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub mod model;
pub mod range;
pub mod reconstruct;
pub mod timeline;

pub use model::{
    parse_effective, CodeableConcept, Coding, ConceptClass, ConceptMetadata, LabEntry,
    LabEntryKind, LabGroup, MemberReference, PatientAggregate, Quantity, RawObservation,
    ReferenceRange,
};
pub use range::{assess, RangeAssessment};
pub use reconstruct::reconstruct;
pub use timeline::{
    build_timeline, bucketize, DayBucket, TimelineOutcome, TimelineRow, TimelineView,
    YearBucket,
};

/// Cấu hình phân trang và bộ nhớ đệm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabConfig {
    /// Số observation trên mỗi trang.
    pub page_size: usize,
    /// Số trang được gửi đồng thời trước khi biết tổng số bản ghi.
    pub prefetch_pages: usize,
    /// Số bệnh nhân tối đa giữ trong bộ nhớ đệm.
    pub cache_capacity: usize,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            prefetch_pages: 6,
            cache_capacity: 3,
        }
    }
}

impl LabConfig {
    pub fn validate(&self) -> Result<(), LabError> {
        if self.page_size == 0 {
            return Err(LabError::InvalidConfig("page_size phải lớn hơn 0".into()));
        }
        if self.prefetch_pages == 0 {
            return Err(LabError::InvalidConfig(
                "prefetch_pages phải lớn hơn 0".into(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(LabError::InvalidConfig(
                "cache_capacity phải lớn hơn 0".into(),
            ));
        }
        Ok(())
    }

    /// Số trang cần để chứa `total` bản ghi.
    pub fn pages_for(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }
}

/// Lỗi chung của phần lõi.
#[derive(Debug, thiserror::Error)]
pub enum LabError {
    #[error("Cấu hình không hợp lệ: {0}")]
    InvalidConfig(String),
}

/// Ba trạng thái mà lớp hiển thị quan sát được cho mỗi yêu cầu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum RequestState<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> RequestState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, RequestState::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            RequestState::Ready(value) => Some(value),
            _ => None,
        }
    }
}

impl<T, E: Display> From<Result<T, E>> for RequestState<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => RequestState::Ready(value),
            Err(err) => RequestState::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_remote_paging() {
        let config = LabConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pages_for(0), 0);
        assert_eq!(config.pages_for(100), 1);
        assert_eq!(config.pages_for(101), 2);
        assert_eq!(config.pages_for(650), 7);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let config = LabConfig {
            page_size: 0,
            ..LabConfig::default()
        };
        assert!(matches!(config.validate(), Err(LabError::InvalidConfig(_))));
    }

    #[test]
    fn zero_cache_capacity_is_rejected() {
        let config = LabConfig {
            cache_capacity: 0,
            ..LabConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache_capacity"));
    }

    #[test]
    fn request_state_from_result() {
        let ok: RequestState<u8> = Ok::<u8, LabError>(3).into();
        assert_eq!(ok.ready(), Some(&3));

        let failed: RequestState<u8> =
            Err::<u8, _>(LabError::InvalidConfig("x".into())).into();
        assert_eq!(
            failed,
            RequestState::Failed("Cấu hình không hợp lệ: x".to_string())
        );
        assert!(RequestState::<u8>::Loading.is_loading());
    }

    #[test]
    fn end_to_end_panel_reconstruction() {
        let raw = vec![
            RawObservation::new("a", "panelCat", "2024-01-05T08:00").with_members(&["b"]),
            RawObservation::new("b", "singleCat", "2024-01-05T08:00").with_value(7.2),
        ];
        let concepts = vec![
            ConceptMetadata {
                uuid: "panelCat".to_string(),
                display: "CBC".to_string(),
                class: ConceptClass::LabSet,
                range: ReferenceRange::default(),
            },
            ConceptMetadata {
                uuid: "singleCat".to_string(),
                display: "Hgb".to_string(),
                class: ConceptClass::Test,
                range: ReferenceRange::default(),
            },
        ];
        let aggregate = reconstruct(&raw, &concepts);

        let json = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(json["CBC"]["concept_class"], "LabSet");
        assert_eq!(json["CBC"]["entries"][0]["kind"]["members"][0]["name"], "Hgb");
        assert_eq!(json["CBC"]["entries"][0]["kind"]["members"][0]["value"], 7.2);

        match build_timeline(&aggregate, "CBC") {
            TimelineOutcome::Ready(view) => {
                assert_eq!(view.rows["Hgb"].values, vec![Some(7.2)]);
            }
            other => panic!("mong đợi timeline, nhận {other:?}"),
        }
    }
}
