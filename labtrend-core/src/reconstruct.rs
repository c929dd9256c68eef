//! Tái dựng quan hệ panel/thành viên từ danh sách observation phẳng.

use std::collections::{BTreeMap, HashMap};

use crate::model::{
    ConceptMetadata, LabEntry, LabEntryKind, LabGroup, PatientAggregate, RawObservation,
};

/// Panel đang chờ điền slot thành viên.
struct PendingPanel<'a> {
    concept: &'a ConceptMetadata,
    entry: LabEntry,
    members: Vec<Option<LabEntry>>,
}

/// Ghép observation thô với metadata xét nghiệm thành `PatientAggregate`.
///
/// Observation có concept không nằm trong `concepts` bị loại bỏ. Thứ tự đầu vào
/// không ảnh hưởng kết quả: mọi tham chiếu thành viên được ghi vào bảng trước khi
/// đặt bất kỳ xét nghiệm đơn nào.
pub fn reconstruct(raw: &[RawObservation], concepts: &[ConceptMetadata]) -> PatientAggregate {
    let recognized: HashMap<&str, &ConceptMetadata> = concepts
        .iter()
        .filter(|concept| concept.class.is_lab())
        .map(|concept| (concept.uuid.as_str(), concept))
        .collect();

    let mut panels: Vec<PendingPanel<'_>> = Vec::new();
    let mut singles: Vec<(&ConceptMetadata, LabEntry)> = Vec::new();
    // id thành viên -> (chỉ số panel, chỉ số slot)
    let mut pending: HashMap<&str, Vec<(usize, usize)>> = HashMap::new();

    for observation in raw {
        let Some(concept) = observation
            .concept_uuid()
            .and_then(|uuid| recognized.get(uuid).copied())
        else {
            continue;
        };

        match &observation.has_member {
            Some(references) => {
                let panel_index = panels.len();
                for (slot, reference) in references.iter().enumerate() {
                    pending
                        .entry(reference.target_id())
                        .or_default()
                        .push((panel_index, slot));
                }
                let placeholder = LabEntryKind::Panel {
                    members: Vec::new(),
                };
                panels.push(PendingPanel {
                    concept,
                    entry: base_entry(observation, concept, placeholder),
                    members: vec![None; references.len()],
                });
            }
            None => {
                let range = concept.range.clone();
                singles.push((
                    concept,
                    base_entry(observation, concept, LabEntryKind::Test { range }),
                ));
            }
        }
    }

    let mut groups: HashMap<&str, (&ConceptMetadata, Vec<LabEntry>)> = HashMap::new();

    for (concept, entry) in singles {
        match pending.get(entry.id.as_str()) {
            Some(targets) => {
                for &(panel_index, slot) in targets {
                    panels[panel_index].members[slot] = Some(entry.clone());
                }
            }
            None => groups
                .entry(concept.uuid.as_str())
                .or_insert_with(|| (concept, Vec::new()))
                .1
                .push(entry),
        }
    }

    for panel in panels {
        let PendingPanel {
            concept,
            mut entry,
            members,
        } = panel;
        entry.kind = LabEntryKind::Panel { members };
        groups
            .entry(concept.uuid.as_str())
            .or_insert_with(|| (concept, Vec::new()))
            .1
            .push(entry);
    }

    let mut named: BTreeMap<String, LabGroup> = BTreeMap::new();
    for (concept, entries) in groups.into_values() {
        if entries.is_empty() {
            continue;
        }
        // Hai concept trùng tên hiển thị được gộp vào một nhóm.
        let group = named
            .entry(concept.display.clone())
            .or_insert_with(|| LabGroup {
                entries: Vec::new(),
                concept_class: concept.class.clone(),
                concept_uuid: concept.uuid.clone(),
            });
        if concept.uuid < group.concept_uuid {
            group.concept_class = concept.class.clone();
            group.concept_uuid = concept.uuid.clone();
        }
        group.entries.extend(entries);
    }

    for group in named.values_mut() {
        sort_newest_first(&mut group.entries);
    }

    PatientAggregate { groups: named }
}

fn base_entry(
    observation: &RawObservation,
    concept: &ConceptMetadata,
    kind: LabEntryKind,
) -> LabEntry {
    LabEntry {
        id: observation.id.clone(),
        concept_uuid: concept.uuid.clone(),
        name: concept.display.clone(),
        effective: observation.effective_date_time.clone(),
        value: observation.numeric_value(),
        kind,
    }
}

/// Mới nhất trước; cùng thời điểm thì theo id để thứ tự luôn xác định.
fn sort_newest_first(entries: &mut [LabEntry]) {
    entries.sort_by(|a, b| {
        b.effective_at()
            .cmp(&a.effective_at())
            .then_with(|| b.effective.cmp(&a.effective))
            .then_with(|| a.id.cmp(&b.id))
    });
}
