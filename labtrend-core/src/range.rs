//! Phân loại giá trị xét nghiệm theo ngưỡng tham chiếu.

use serde::{Deserialize, Serialize};

use crate::model::ReferenceRange;

/// Mức đánh giá, liệt kê theo thứ tự được kiểm tra.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RangeAssessment {
    OffScaleHigh,
    CriticallyHigh,
    High,
    OffScaleLow,
    CriticallyLow,
    Low,
    Normal,
}

/// Kiểm tra từ nặng nhất xuống, phía cao trước phía thấp; ngưỡng đầu tiên khớp sẽ thắng.
/// So sánh nghiêm ngặt, ngưỡng vắng mặt bị bỏ qua.
pub fn assess(value: f64, range: &ReferenceRange) -> RangeAssessment {
    let above = |bound: Option<f64>| bound.is_some_and(|bound| value > bound);
    let below = |bound: Option<f64>| bound.is_some_and(|bound| value < bound);

    if above(range.hi_absolute) {
        RangeAssessment::OffScaleHigh
    } else if above(range.hi_critical) {
        RangeAssessment::CriticallyHigh
    } else if above(range.hi_normal) {
        RangeAssessment::High
    } else if below(range.low_absolute) {
        RangeAssessment::OffScaleLow
    } else if below(range.low_critical) {
        RangeAssessment::CriticallyLow
    } else if below(range.low_normal) {
        RangeAssessment::Low
    } else {
        RangeAssessment::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn high_side() -> ReferenceRange {
        ReferenceRange {
            hi_absolute: Some(100.0),
            hi_critical: Some(90.0),
            hi_normal: Some(80.0),
            ..ReferenceRange::default()
        }
    }

    fn full_range() -> ReferenceRange {
        ReferenceRange {
            low_absolute: Some(0.0),
            low_critical: Some(5.0),
            low_normal: Some(10.0),
            ..high_side()
        }
    }

    #[test]
    fn critical_bound_checked_before_normal_bound() {
        assert_eq!(assess(95.0, &high_side()), RangeAssessment::CriticallyHigh);
    }

    #[test]
    fn exact_bound_is_not_exceeded() {
        let range = full_range();
        assert_eq!(assess(100.0, &range), RangeAssessment::CriticallyHigh);
        assert_eq!(assess(90.0, &range), RangeAssessment::High);
        assert_eq!(assess(80.0, &range), RangeAssessment::Normal);
        assert_eq!(assess(10.0, &range), RangeAssessment::Normal);
        assert_eq!(assess(5.0, &range), RangeAssessment::Low);
        assert_eq!(assess(0.0, &range), RangeAssessment::CriticallyLow);
    }

    #[test]
    fn every_category_reachable() {
        let range = full_range();
        assert_eq!(assess(150.0, &range), RangeAssessment::OffScaleHigh);
        assert_eq!(assess(85.0, &range), RangeAssessment::High);
        assert_eq!(assess(-1.0, &range), RangeAssessment::OffScaleLow);
        assert_eq!(assess(3.0, &range), RangeAssessment::CriticallyLow);
        assert_eq!(assess(7.0, &range), RangeAssessment::Low);
        assert_eq!(assess(50.0, &range), RangeAssessment::Normal);
    }

    #[test]
    fn missing_bounds_are_skipped() {
        let range = ReferenceRange {
            hi_normal: Some(80.0),
            low_normal: Some(10.0),
            ..ReferenceRange::default()
        };
        assert_eq!(assess(1_000.0, &range), RangeAssessment::High);
        assert_eq!(assess(-1_000.0, &range), RangeAssessment::Low);
        assert_eq!(assess(1_000.0, &ReferenceRange::default()), RangeAssessment::Normal);
    }

    #[test]
    fn inverted_bounds_resolve_high_first() {
        // Dữ liệu bẩn: ngưỡng cao nhỏ hơn ngưỡng thấp.
        let range = ReferenceRange {
            hi_normal: Some(5.0),
            low_normal: Some(10.0),
            ..ReferenceRange::default()
        };
        assert_eq!(assess(7.0, &range), RangeAssessment::High);
    }
}
