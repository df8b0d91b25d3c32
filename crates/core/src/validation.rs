//! Validation of externally produced structured records.
//!
//! A candidate passes in two stages. The structural check is strict and fails closed: any
//! missing, extra, or mistyped top-level field rejects the whole candidate. The reference check
//! then drops every evidence id that does not resolve in the current snapshot; unresolved ids
//! never cause rejection.

use crate::evidence::{normalize_references, EvidenceIdSet};
use crate::{EmrError, EmrResult};
use emr_types::EvidenceId;
use serde::{Deserialize, Serialize};

const ROOT_PATH: &str = "<root>";

const ITEM_FIELDS: [&str; 4] = [
    "chief_complaint",
    "present_illness",
    "past_history",
    "diagnostic_assessment",
];

/// Field text plus the evidence blocks it cites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceItem {
    pub text: String,
    pub evidence_ids: Vec<EvidenceId>,
}

/// The four-field clinical draft plus summary, with references resolved against one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredRecord {
    pub chief_complaint: EvidenceItem,
    pub present_illness: EvidenceItem,
    pub past_history: EvidenceItem,
    pub diagnostic_assessment: EvidenceItem,
    pub summary: String,
}

/// Wire shape of one field in the extraction envelope.
#[derive(Debug, Deserialize)]
struct CandidateItem {
    text: String,
    #[serde(rename = "evidenceIds")]
    evidence_ids: Vec<String>,
}

/// Wire shape of the extraction envelope. Exactly these keys are accepted.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CandidateRecord {
    chief_complaint: CandidateItem,
    present_illness: CandidateItem,
    past_history: CandidateItem,
    diagnostic_assessment: CandidateItem,
    summary: String,
}

/// Strip a surrounding Markdown code fence (```` ``` ```` or ```` ```json ````) if present.
pub fn extract_json(content: &str) -> &str {
    let cleaned = content.trim();
    let Some(rest) = cleaned.strip_prefix("```") else {
        return cleaned;
    };

    let rest = match rest.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
        _ => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse raw model content as JSON.
///
/// # Errors
///
/// Returns `EmrError::UpstreamMalformed` carrying the raw content (for logs only) when the
/// content is not valid JSON.
pub fn parse_candidate(content: &str) -> EmrResult<serde_json::Value> {
    serde_json::from_str(extract_json(content)).map_err(|e| {
        tracing::error!(raw = %content, error = %e, "extraction response is not valid JSON");
        EmrError::UpstreamMalformed {
            reason: format!("response is not valid JSON: {e}"),
            raw: content.to_string(),
        }
    })
}

/// Validate a parsed candidate and resolve its references against `valid_ids`.
///
/// # Errors
///
/// Returns `EmrError::ShapeInvalid` naming the failing path when the candidate does not match
/// the extraction envelope. No partially accepted record is ever produced.
pub fn validate_candidate(
    candidate: &serde_json::Value,
    valid_ids: &EvidenceIdSet,
) -> EmrResult<StructuredRecord> {
    if let Some(path) = non_object_path(candidate) {
        return Err(shape_invalid(path, "expected a JSON object".into(), candidate));
    }

    let parsed: CandidateRecord = match serde_path_to_error::deserialize(candidate) {
        Ok(parsed) => parsed,
        Err(err) => {
            let path = err.path().to_string();
            let path = if path.is_empty() || path == "." {
                ROOT_PATH.to_string()
            } else {
                path
            };
            return Err(shape_invalid(path, err.into_inner().to_string(), candidate));
        }
    };

    Ok(StructuredRecord {
        chief_complaint: resolve_item("chief_complaint", parsed.chief_complaint, valid_ids),
        present_illness: resolve_item("present_illness", parsed.present_illness, valid_ids),
        past_history: resolve_item("past_history", parsed.past_history, valid_ids),
        diagnostic_assessment: resolve_item(
            "diagnostic_assessment",
            parsed.diagnostic_assessment,
            valid_ids,
        ),
        summary: parsed.summary,
    })
}

/// Serde also fills structs from sequences, so objects are checked explicitly.
fn non_object_path(candidate: &serde_json::Value) -> Option<String> {
    if !candidate.is_object() {
        return Some(ROOT_PATH.to_string());
    }
    ITEM_FIELDS
        .iter()
        .find(|field| candidate.get(**field).is_some_and(|item| !item.is_object()))
        .map(|field| field.to_string())
}

fn shape_invalid(path: String, reason: String, candidate: &serde_json::Value) -> EmrError {
    tracing::error!(path = %path, reason = %reason, payload = %candidate, "invalid structured record shape");
    EmrError::ShapeInvalid {
        path,
        reason,
        payload: candidate.clone(),
    }
}

/// Parse, structurally validate, and resolve references in one step.
pub fn validate_content(content: &str, valid_ids: &EvidenceIdSet) -> EmrResult<StructuredRecord> {
    let candidate = parse_candidate(content)?;
    validate_candidate(&candidate, valid_ids)
}

fn resolve_item(field: &str, item: CandidateItem, valid_ids: &EvidenceIdSet) -> EvidenceItem {
    let references = normalize_references(&item.evidence_ids);
    let evidence_ids: Vec<EvidenceId> = references
        .iter()
        .filter_map(|r| valid_ids.resolves(r))
        .collect();

    let dropped = references.len() - evidence_ids.len();
    if dropped > 0 {
        tracing::debug!(field, dropped, "dropped unresolved evidence references");
    }

    EvidenceItem {
        text: item.text,
        evidence_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(ordinals: &[u32]) -> EvidenceIdSet {
        ordinals
            .iter()
            .map(|n| EvidenceId::from_ordinal(*n).unwrap())
            .collect()
    }

    fn item(text: &str, refs: &[&str]) -> serde_json::Value {
        json!({ "text": text, "evidenceIds": refs })
    }

    fn well_formed() -> serde_json::Value {
        json!({
            "chief_complaint": item("咳嗽五天", &["E2", "E4"]),
            "present_illness": item("患者五天前出现咳嗽", &["E2"]),
            "past_history": item("颈椎病数年", &["E31"]),
            "diagnostic_assessment": item("仅供医生参考", &["E1", "E9"]),
            "summary": "本次就诊，主诉：咳嗽五天。"
        })
    }

    #[test]
    fn test_unknown_references_are_filtered_not_fatal() {
        let record = validate_candidate(&well_formed(), &ids(&[1, 2])).unwrap();
        let diagnostic: Vec<String> = record
            .diagnostic_assessment
            .evidence_ids
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(diagnostic, vec!["E1"]);
        assert_eq!(record.chief_complaint.evidence_ids.len(), 1);
        assert!(record.past_history.evidence_ids.is_empty());
        assert_eq!(record.past_history.text, "颈椎病数年");
    }

    #[test]
    fn test_known_references_are_preserved_in_order() {
        let record = validate_candidate(&well_formed(), &ids(&[1, 2, 4, 9, 31])).unwrap();
        let chief: Vec<String> = record
            .chief_complaint
            .evidence_ids
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(chief, vec!["E2", "E4"]);
        assert_eq!(record.diagnostic_assessment.evidence_ids.len(), 2);
    }

    #[test]
    fn test_missing_field_is_shape_invalid() {
        let mut candidate = well_formed();
        candidate.as_object_mut().unwrap().remove("past_history");

        let err = validate_candidate(&candidate, &ids(&[1])).unwrap_err();
        match err {
            EmrError::ShapeInvalid { reason, payload, .. } => {
                assert!(reason.contains("past_history"));
                assert_eq!(payload, candidate);
            }
            other => panic!("expected ShapeInvalid, got {other:?}"),
        }
    }

    #[test]
    fn test_each_required_field_is_enforced() {
        for field in [
            "chief_complaint",
            "present_illness",
            "past_history",
            "diagnostic_assessment",
            "summary",
        ] {
            let mut candidate = well_formed();
            candidate.as_object_mut().unwrap().remove(field);
            assert!(
                matches!(
                    validate_candidate(&candidate, &ids(&[1])),
                    Err(EmrError::ShapeInvalid { .. })
                ),
                "missing {field} accepted"
            );
        }
    }

    #[test]
    fn test_mistyped_fields_are_rejected_with_path() {
        let mut candidate = well_formed();
        candidate["present_illness"]["evidenceIds"] = json!([1, 2]);
        let err = validate_candidate(&candidate, &ids(&[1])).unwrap_err();
        assert!(matches!(err, EmrError::ShapeInvalid { path, .. } if path.starts_with("present_illness")));

        let mut candidate = well_formed();
        candidate["summary"] = json!({ "text": "nested" });
        assert!(validate_candidate(&candidate, &ids(&[1])).is_err());

        let mut candidate = well_formed();
        candidate["chief_complaint"]["text"] = serde_json::Value::Null;
        assert!(validate_candidate(&candidate, &ids(&[1])).is_err());
    }

    #[test]
    fn test_extra_top_level_field_is_rejected() {
        let mut candidate = well_formed();
        candidate["treatment_plan"] = json!("建议休息");
        assert!(matches!(
            validate_candidate(&candidate, &ids(&[1])),
            Err(EmrError::ShapeInvalid { .. })
        ));
    }

    #[test]
    fn test_non_object_candidate_is_rejected() {
        let err = validate_candidate(&json!(["not", "an", "object"]), &ids(&[1])).unwrap_err();
        assert!(matches!(err, EmrError::ShapeInvalid { path, .. } if path == "<root>"));
    }

    #[test]
    fn test_positional_envelope_is_rejected() {
        let item = item("咳嗽三天", &["E1"]);
        let candidate = json!([item.clone(), item.clone(), item.clone(), item, "summary"]);
        let err = validate_candidate(&candidate, &ids(&[1])).unwrap_err();
        assert!(matches!(err, EmrError::ShapeInvalid { path, .. } if path == "<root>"));
    }

    #[test]
    fn test_positional_item_is_rejected_with_field_path() {
        let mut candidate = well_formed();
        candidate["past_history"] = json!(["颈椎病数年", ["E1"]]);
        let err = validate_candidate(&candidate, &ids(&[1])).unwrap_err();
        assert!(matches!(err, EmrError::ShapeInvalid { path, .. } if path == "past_history"));
    }

    #[test]
    fn test_references_are_trimmed_and_deduplicated() {
        let mut candidate = well_formed();
        candidate["chief_complaint"]["evidenceIds"] = json!([" E2 ", "E2", "", "E1"]);
        let record = validate_candidate(&candidate, &ids(&[1, 2])).unwrap();
        let chief: Vec<String> = record
            .chief_complaint
            .evidence_ids
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(chief, vec!["E2", "E1"]);
    }

    #[test]
    fn test_extract_json_strips_code_fences() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("```JSON{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(extract_json("```\n{}\n```"), "{}");
        assert_eq!(extract_json("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(extract_json("```病历```"), "病历");
    }

    #[test]
    fn test_parse_candidate_reports_malformed_with_raw() {
        let err = parse_candidate("抱歉，我无法生成病历").unwrap_err();
        match err {
            EmrError::UpstreamMalformed { raw, .. } => assert_eq!(raw, "抱歉，我无法生成病历"),
            other => panic!("expected UpstreamMalformed, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_content_accepts_fenced_payload() {
        let content = format!("```json\n{}\n```", well_formed());
        let record = validate_content(&content, &ids(&[2])).unwrap();
        assert_eq!(record.summary, "本次就诊，主诉：咳嗽五天。");
        assert_eq!(record.present_illness.evidence_ids.len(), 1);
    }

    #[test]
    fn test_structured_record_serialises_camel_case() {
        let record = validate_candidate(&well_formed(), &ids(&[1])).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["diagnosticAssessment"]["evidenceIds"], json!(["E1"]));
        assert!(json.get("chiefComplaint").is_some());
    }
}
