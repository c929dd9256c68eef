//! Bridge WASM <-> JavaScript trung lập framework cho các phép chiếu thuần.

use labtrend_core::{PatientAggregate, RangeAssessment, ReferenceRange, TimelineOutcome};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Ngưỡng gửi từ JavaScript; nhận cả tên trường kiểu OpenMRS (camelCase).
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct JsReferenceRange {
    #[serde(default, alias = "hi_absolute")]
    hi_absolute: Option<f64>,
    #[serde(default, alias = "hi_critical")]
    hi_critical: Option<f64>,
    #[serde(default, alias = "hi_normal")]
    hi_normal: Option<f64>,
    #[serde(default, alias = "low_absolute")]
    low_absolute: Option<f64>,
    #[serde(default, alias = "low_critical")]
    low_critical: Option<f64>,
    #[serde(default, alias = "low_normal")]
    low_normal: Option<f64>,
}

impl From<JsReferenceRange> for ReferenceRange {
    fn from(range: JsReferenceRange) -> Self {
        ReferenceRange {
            hi_absolute: range.hi_absolute,
            hi_critical: range.hi_critical,
            hi_normal: range.hi_normal,
            low_absolute: range.low_absolute,
            low_critical: range.low_critical,
            low_normal: range.low_normal,
            ..ReferenceRange::default()
        }
    }
}

/// Dựng timeline cho `panel` từ aggregate đã serialize bởi engine.
#[wasm_bindgen]
pub fn build_timeline(aggregate: JsValue, panel: String) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let aggregate = from_value::<PatientAggregate>(aggregate)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được aggregate: {err}")))?;

    to_value(&timeline_for(&aggregate, &panel))
        .map_err(|err| JsValue::from_str(&format!("Không serialize timeline: {err}")))
}

/// Phân loại `value` theo ngưỡng; trả về chuỗi snake_case như `critically_high`.
#[wasm_bindgen]
pub fn assess_value(value: f64, range: JsValue) -> Result<JsValue, JsValue> {
    let range = if range.is_undefined() || range.is_null() {
        JsReferenceRange::default()
    } else {
        from_value::<JsReferenceRange>(range)
            .map_err(|err| JsValue::from_str(&format!("Không đọc được ngưỡng: {err}")))?
    };

    to_value(&assessment_for(value, range.into()))
        .map_err(|err| JsValue::from_str(&format!("Không serialize kết quả: {err}")))
}

fn timeline_for(aggregate: &PatientAggregate, panel: &str) -> TimelineOutcome {
    labtrend_core::build_timeline(aggregate, panel)
}

fn assessment_for(value: f64, range: ReferenceRange) -> RangeAssessment {
    labtrend_core::assess(value, &range)
}
