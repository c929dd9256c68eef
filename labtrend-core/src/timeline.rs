//! Chia kết quả một panel thành cột năm/ngày/giờ và xoay thành các hàng giá trị.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{LabEntry, LabEntryKind, LabGroup, PatientAggregate};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct YearBucket {
    pub year: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayBucket {
    pub year: String,
    /// Nhãn `MM/DD`.
    pub day: String,
    pub size: usize,
}

/// Một hàng giá trị, mỗi slot ứng với một cột thời gian.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineRow {
    pub name: String,
    pub units: Option<String>,
    pub normal_range: Option<String>,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineView {
    pub panel: String,
    pub concept_uuid: String,
    pub years: Vec<YearBucket>,
    pub days: Vec<DayBucket>,
    pub times: Vec<String>,
    pub rows: BTreeMap<String, TimelineRow>,
}

/// Kết quả tra cứu timeline: có dữ liệu, hoặc panel không tồn tại.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TimelineOutcome {
    Ready(TimelineView),
    PanelMissing { panel: String },
}

/// Dựng timeline cho panel có tên hiển thị `panel`.
pub fn build_timeline(aggregate: &PatientAggregate, panel: &str) -> TimelineOutcome {
    match aggregate.get(panel) {
        Some(group) => TimelineOutcome::Ready(bucketize(panel, group)),
        None => TimelineOutcome::PanelMissing {
            panel: panel.to_string(),
        },
    }
}

/// Giữ nguyên thứ tự entry đầu vào; mọi cột và hàng đều căn theo chỉ số entry.
pub fn bucketize(panel: &str, group: &LabGroup) -> TimelineView {
    let entries = &group.entries;
    let mut years: Vec<YearBucket> = Vec::new();
    let mut days: Vec<DayBucket> = Vec::new();
    let mut times = Vec::with_capacity(entries.len());
    let mut rows: BTreeMap<String, TimelineRow> = BTreeMap::new();

    for (index, entry) in entries.iter().enumerate() {
        let parts = TimestampParts::split(entry.effective.as_deref().unwrap_or_default());

        match years.last_mut() {
            Some(bucket) if bucket.year == parts.year => bucket.size += 1,
            _ => years.push(YearBucket {
                year: parts.year.to_string(),
                size: 1,
            }),
        }

        let day = parts.day_label();
        match days.last_mut() {
            Some(bucket) if bucket.year == parts.year && bucket.day == day => bucket.size += 1,
            _ => days.push(DayBucket {
                year: parts.year.to_string(),
                day,
                size: 1,
            }),
        }

        times.push(parts.time_label());

        match &entry.kind {
            LabEntryKind::Panel { members } => {
                for member in members.iter().flatten() {
                    place_value(&mut rows, member, index, entries.len());
                }
            }
            LabEntryKind::Test { .. } => place_value(&mut rows, entry, index, entries.len()),
        }
    }

    TimelineView {
        panel: panel.to_string(),
        concept_uuid: group.concept_uuid.clone(),
        years,
        days,
        times,
        rows,
    }
}

fn place_value(
    rows: &mut BTreeMap<String, TimelineRow>,
    entry: &LabEntry,
    index: usize,
    width: usize,
) {
    let row = rows.entry(entry.name.clone()).or_insert_with(|| {
        let range = entry.range();
        TimelineRow {
            name: entry.name.clone(),
            units: range.and_then(|range| range.units.clone()),
            normal_range: range.and_then(|range| {
                range.normal_range.clone().or_else(|| range.describe_normal())
            }),
            values: vec![None; width],
        }
    });
    row.values[index] = entry.value;
}

/// Các thành phần của `effectiveDateTime` sau khi tách theo `-`, `T`, `:`.
struct TimestampParts<'a> {
    year: &'a str,
    month: &'a str,
    day: &'a str,
    hour: &'a str,
    minute: &'a str,
}

impl<'a> TimestampParts<'a> {
    fn split(raw: &'a str) -> Self {
        let mut pieces = raw.split(['-', 'T', ':']);
        let mut next = || pieces.next().unwrap_or_default();
        Self {
            year: next(),
            month: next(),
            day: next(),
            hour: next(),
            minute: next(),
        }
    }

    fn day_label(&self) -> String {
        if self.month.is_empty() && self.day.is_empty() {
            return String::new();
        }
        format!("{}/{}", self.month, self.day)
    }

    fn time_label(&self) -> String {
        if self.hour.is_empty() && self.minute.is_empty() {
            return String::new();
        }
        format!("{}:{}", self.hour, take_digits(self.minute))
    }
}

fn take_digits(value: &str) -> &str {
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    &value[..end]
}
