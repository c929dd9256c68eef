//! Mô hình dữ liệu: observation thô từ server, concept và kết quả đã tái dựng.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::range::{assess, RangeAssessment};

/// Observation thô như server FHIR trả về (chế độ `_summary=data`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawObservation {
    pub id: String,
    #[serde(default)]
    pub code: CodeableConcept,
    #[serde(default)]
    pub effective_date_time: Option<String>,
    #[serde(default)]
    pub value_quantity: Option<Quantity>,
    /// Có mặt (kể cả rỗng) nghĩa là observation này là một panel.
    #[serde(default)]
    pub has_member: Option<Vec<MemberReference>>,
}

impl RawObservation {
    /// Dựng observation tối thiểu (id, concept, thời điểm) để lắp ráp dữ liệu trong bộ nhớ,
    /// chẳng hạn fixture hoặc nguồn giả lập; dữ liệu từ server đi qua `Deserialize`.
    pub fn new(id: &str, concept_uuid: &str, effective: &str) -> Self {
        Self {
            id: id.to_string(),
            code: CodeableConcept {
                coding: vec![Coding {
                    system: None,
                    code: Some(concept_uuid.to_string()),
                    display: None,
                }],
                text: None,
            },
            effective_date_time: Some(effective.to_string()),
            value_quantity: None,
            has_member: None,
        }
    }

    /// Gắn `valueQuantity` không kèm đơn vị.
    pub fn with_value(mut self, value: f64) -> Self {
        self.value_quantity = Some(Quantity {
            value: Some(value),
            unit: None,
        });
        self
    }

    /// Đánh dấu là panel với các thành viên `Observation/<id>` theo thứ tự cho trước.
    pub fn with_members(mut self, member_ids: &[&str]) -> Self {
        self.has_member = Some(
            member_ids
                .iter()
                .map(|id| MemberReference {
                    reference: format!("Observation/{id}"),
                })
                .collect(),
        );
        self
    }

    /// Uuid của concept phân loại observation (coding đầu tiên).
    pub fn concept_uuid(&self) -> Option<&str> {
        self.code
            .coding
            .first()
            .and_then(|coding| coding.code.as_deref())
    }

    pub fn numeric_value(&self) -> Option<f64> {
        self.value_quantity.as_ref().and_then(|quantity| quantity.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CodeableConcept {
    #[serde(default)]
    pub coding: Vec<Coding>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Coding {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Quantity {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Tham chiếu tới observation thành viên, dạng `Observation/<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberReference {
    pub reference: String,
}

impl MemberReference {
    pub fn target_id(&self) -> &str {
        self.reference
            .rsplit('/')
            .next()
            .unwrap_or(self.reference.as_str())
    }
}

/// Lớp concept. Chỉ `Test` và `LabSet` được coi là xét nghiệm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConceptClass {
    Test,
    LabSet,
    Other(String),
}

impl ConceptClass {
    pub fn is_lab(&self) -> bool {
        matches!(self, ConceptClass::Test | ConceptClass::LabSet)
    }
}

impl From<String> for ConceptClass {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Test" => ConceptClass::Test,
            "LabSet" => ConceptClass::LabSet,
            _ => ConceptClass::Other(value),
        }
    }
}

impl From<ConceptClass> for String {
    fn from(value: ConceptClass) -> Self {
        match value {
            ConceptClass::Test => "Test".to_string(),
            ConceptClass::LabSet => "LabSet".to_string(),
            ConceptClass::Other(other) => other,
        }
    }
}

/// Ngưỡng tham chiếu của một concept xét nghiệm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReferenceRange {
    pub hi_absolute: Option<f64>,
    pub hi_critical: Option<f64>,
    pub hi_normal: Option<f64>,
    pub low_absolute: Option<f64>,
    pub low_critical: Option<f64>,
    pub low_normal: Option<f64>,
    pub units: Option<String>,
    pub datatype: Option<String>,
    /// Khoảng bình thường dạng chữ, ví dụ `"12 – 16 g/dL"`.
    pub normal_range: Option<String>,
}

impl ReferenceRange {
    /// Dựng chuỗi khoảng bình thường khi biết cả hai ngưỡng.
    pub fn describe_normal(&self) -> Option<String> {
        let (low, high) = (self.low_normal?, self.hi_normal?);
        Some(match self.units.as_deref() {
            Some(units) if !units.is_empty() => format!("{low} – {high} {units}"),
            _ => format!("{low} – {high}"),
        })
    }
}

/// Metadata của một concept, lấy một lần cho mỗi uuid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptMetadata {
    pub uuid: String,
    pub display: String,
    pub class: ConceptClass,
    pub range: ReferenceRange,
}

/// Một kết quả xét nghiệm hoặc tiêu đề panel sau khi tái dựng.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabEntry {
    pub id: String,
    pub concept_uuid: String,
    pub name: String,
    pub effective: Option<String>,
    pub value: Option<f64>,
    pub kind: LabEntryKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LabEntryKind {
    /// Mỗi slot giữ đúng vị trí khai báo; `None` là thành viên không tìm thấy.
    Panel { members: Vec<Option<LabEntry>> },
    Test { range: ReferenceRange },
}

impl LabEntry {
    pub fn members(&self) -> &[Option<LabEntry>] {
        match &self.kind {
            LabEntryKind::Panel { members } => members,
            LabEntryKind::Test { .. } => &[],
        }
    }

    pub fn range(&self) -> Option<&ReferenceRange> {
        match &self.kind {
            LabEntryKind::Test { range } => Some(range),
            LabEntryKind::Panel { .. } => None,
        }
    }

    /// Đánh giá giá trị so với ngưỡng; `None` với panel hoặc khi không có giá trị.
    pub fn assessment(&self) -> Option<RangeAssessment> {
        Some(assess(self.value?, self.range()?))
    }

    pub(crate) fn effective_at(&self) -> Option<NaiveDateTime> {
        self.effective.as_deref().and_then(parse_effective)
    }
}

/// Một nhóm kết quả cùng concept, đã sắp xếp mới nhất trước.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabGroup {
    pub entries: Vec<LabEntry>,
    pub concept_class: ConceptClass,
    pub concept_uuid: String,
}

/// Toàn bộ kết quả xét nghiệm của một bệnh nhân, khoá theo tên hiển thị.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct PatientAggregate {
    pub groups: BTreeMap<String, LabGroup>,
}

impl PatientAggregate {
    pub fn get(&self, name: &str) -> Option<&LabGroup> {
        self.groups.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Đọc `effectiveDateTime` ở các dạng FHIR thường gặp.
pub fn parse_effective(value: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
