//! Wire types for the EMR APIs.
//!
//! Core types stay free of transport concerns; these mirrors carry the OpenAPI schemas and the
//! camelCase JSON layout.

use emr_core::{
    EvidenceBlock, EvidenceItem, MedicalEmr, SemanticLabel, Speaker, StatementSource,
    StructuredRecord, Turn,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Opaque failure body. Never carries upstream payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ParseConversationReq {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TurnDto {
    pub turn_id: u32,
    /// `doctor` or `patient`.
    pub speaker: String,
    pub text: String,
}

impl From<&Turn> for TurnDto {
    fn from(turn: &Turn) -> Self {
        let speaker = match turn.speaker {
            Speaker::Doctor => "doctor",
            Speaker::Patient => "patient",
        };
        Self {
            turn_id: turn.turn_id,
            speaker: speaker.into(),
            text: turn.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParseConversationRes {
    pub turns: Vec<TurnDto>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatementSourceDto {
    #[default]
    Text,
    Voice,
    Image,
}

impl From<StatementSourceDto> for StatementSource {
    fn from(source: StatementSourceDto) -> Self {
        match source {
            StatementSourceDto::Text => StatementSource::Text,
            StatementSourceDto::Voice => StatementSource::Voice,
            StatementSourceDto::Image => StatementSource::Image,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatementDto {
    pub text: String,
    #[serde(default)]
    pub source: StatementSourceDto,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EvidenceReq {
    pub statements: Vec<StatementDto>,
    /// `zh` (default) or `en`; only affects display labels.
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBlockDto {
    pub id: String,
    pub timestamp: String,
    /// One of `chiefComplaint`, `pastHistory`, `symptom`, `evidence`.
    pub semantic_label: String,
    pub label: String,
    pub text: String,
}

impl From<&EvidenceBlock> for EvidenceBlockDto {
    fn from(block: &EvidenceBlock) -> Self {
        let semantic_label = match block.semantic_label {
            SemanticLabel::ChiefComplaint => "chiefComplaint",
            SemanticLabel::PastHistory => "pastHistory",
            SemanticLabel::Symptom => "symptom",
            SemanticLabel::Evidence => "evidence",
        };
        Self {
            id: block.id.to_string(),
            timestamp: block.timestamp.clone(),
            semantic_label: semantic_label.into(),
            label: block.label.into(),
            text: block.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRes {
    pub blocks: Vec<EvidenceBlockDto>,
    pub valid_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RewriteReq {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicalEmrDto {
    pub chief_complaint: String,
    pub present_illness: String,
    pub past_history: String,
    pub summary: String,
}

impl From<MedicalEmr> for MedicalEmrDto {
    fn from(emr: MedicalEmr) -> Self {
        Self {
            chief_complaint: emr.chief_complaint,
            present_illness: emr.present_illness,
            past_history: emr.past_history,
            summary: emr.summary,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvidenceLineDto {
    pub id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EmrDraftReq {
    pub conversation: String,
    #[serde(default)]
    pub history: Option<String>,
    /// Evidence timeline the draft may cite. References to ids not listed here are dropped.
    #[serde(default)]
    pub evidence: Option<Vec<EvidenceLineDto>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceItemDto {
    pub text: String,
    pub evidence_ids: Vec<String>,
}

impl From<EvidenceItem> for EvidenceItemDto {
    fn from(item: EvidenceItem) -> Self {
        Self {
            text: item.text,
            evidence_ids: item.evidence_ids.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StructuredRecordDto {
    pub chief_complaint: EvidenceItemDto,
    pub present_illness: EvidenceItemDto,
    pub past_history: EvidenceItemDto,
    pub diagnostic_assessment: EvidenceItemDto,
    pub summary: String,
}

impl From<StructuredRecord> for StructuredRecordDto {
    fn from(record: StructuredRecord) -> Self {
        Self {
            chief_complaint: record.chief_complaint.into(),
            present_illness: record.present_illness.into(),
            past_history: record.past_history.into(),
            diagnostic_assessment: record.diagnostic_assessment.into(),
            summary: record.summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emr_core::{parse_conversation, EvidenceId};

    #[test]
    fn test_turn_dto_uses_lowercase_speaker() {
        let turns = parse_conversation("医生：你好 患者：咳嗽");
        let dtos: Vec<TurnDto> = turns.iter().map(TurnDto::from).collect();
        assert_eq!(dtos[0].speaker, "doctor");
        assert_eq!(dtos[1].speaker, "patient");

        let json = serde_json::to_value(&dtos[1]).unwrap();
        assert_eq!(json["turnId"], 2);
    }

    #[test]
    fn test_statement_source_defaults_to_text() {
        let dto: StatementDto = serde_json::from_str(r#"{"text":"咳嗽"}"#).unwrap();
        assert_eq!(dto.source, StatementSourceDto::Text);
        let dto: StatementDto =
            serde_json::from_str(r#"{"text":"咳嗽","source":"voice"}"#).unwrap();
        assert_eq!(StatementSource::from(dto.source), StatementSource::Voice);
    }

    #[test]
    fn test_structured_record_dto_renders_ids() {
        let record = StructuredRecord {
            diagnostic_assessment: EvidenceItem {
                text: "仅供医生参考".into(),
                evidence_ids: vec![EvidenceId::from_ordinal(3).unwrap()],
            },
            ..Default::default()
        };
        let json = serde_json::to_value(StructuredRecordDto::from(record)).unwrap();
        assert_eq!(json["diagnosticAssessment"]["evidenceIds"][0], "E3");
        assert_eq!(json["pastHistory"]["evidenceIds"].as_array().unwrap().len(), 0);
    }
}
