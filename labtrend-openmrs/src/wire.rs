//! Decoding of the FHIR search bundle and the OpenMRS concept representation.

use labtrend_core::{ConceptClass, ConceptMetadata, RawObservation, ReferenceRange};
use serde::Deserialize;
use serde_json::Value;

use crate::{FetchError, ObservationPage};

/// Decode one page of an `Observation` searchset bundle.
pub fn parse_search_bundle(bundle: &Value) -> Result<ObservationPage, FetchError> {
    let bundle_type = bundle
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::Decode("missing resourceType".to_string()))?;

    if bundle_type != "Bundle" {
        return Err(FetchError::Decode(format!(
            "Expected resourceType Bundle, received {bundle_type}"
        )));
    }

    let total = bundle.get("total").and_then(Value::as_u64).unwrap_or(0) as usize;

    let Some(entries) = bundle.get("entry").and_then(Value::as_array) else {
        return Ok(ObservationPage {
            total,
            entries: Vec::new(),
        });
    };

    let mut observations = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(resource) = entry.get("resource") else {
            continue;
        };
        if resource.get("resourceType").and_then(Value::as_str) != Some("Observation") {
            continue;
        }
        let observation = RawObservation::deserialize(resource)
            .map_err(|err| FetchError::Decode(format!("Observation: {err}")))?;
        observations.push(observation);
    }

    Ok(ObservationPage {
        total,
        entries: observations,
    })
}

/// Id of the first observation in a `_count=1` bundle, if any.
pub fn parse_latest_id(bundle: &Value) -> Result<Option<String>, FetchError> {
    let page = parse_search_bundle(bundle)?;
    Ok(page.entries.into_iter().next().map(|observation| observation.id))
}

/// Decode a `concept/{uuid}?v=full` response.
pub fn parse_concept(concept: &Value) -> Result<ConceptMetadata, FetchError> {
    let uuid = concept
        .get("uuid")
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::Decode("concept without uuid".to_string()))?;

    let display = concept
        .get("display")
        .and_then(Value::as_str)
        .unwrap_or(uuid)
        .to_string();

    let class = nested_display(concept, "conceptClass")
        .map(ConceptClass::from)
        .unwrap_or_else(|| ConceptClass::Other(String::new()));

    let mut range = ReferenceRange {
        hi_absolute: number(concept, "hiAbsolute"),
        hi_critical: number(concept, "hiCritical"),
        hi_normal: number(concept, "hiNormal"),
        low_absolute: number(concept, "lowAbsolute"),
        low_critical: number(concept, "lowCritical"),
        low_normal: number(concept, "lowNormal"),
        units: concept
            .get("units")
            .and_then(Value::as_str)
            .filter(|units| !units.is_empty())
            .map(str::to_string),
        datatype: nested_display(concept, "datatype"),
        normal_range: None,
    };
    range.normal_range = range.describe_normal();

    Ok(ConceptMetadata {
        uuid: uuid.to_string(),
        display,
        class,
        range,
    })
}

fn number(value: &Value, field: &str) -> Option<f64> {
    value.get(field).and_then(Value::as_f64)
}

fn nested_display(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(|nested| nested.get("display"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
