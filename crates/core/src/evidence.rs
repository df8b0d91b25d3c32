//! Evidence indexing over the append-only statement log.
//!
//! Every captured statement becomes one citable [`EvidenceBlock`]. Ids, timestamps and labels are
//! a pure function of the statement and its position, so recomputing the index after the log
//! grows leaves every earlier block unchanged.

use crate::constants::{EVIDENCE_CLOCK_BASE_MINUTES, IMAGE_CAPTURE_PREFIX, TRANSCRIPT_SEPARATOR};
use crate::{EmrError, EmrResult};
use emr_types::{EvidenceId, Language, NonEmptyText, TypeError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, LazyLock};

const MINUTES_PER_DAY: u64 = 24 * 60;

/// How a statement was captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementSource {
    #[default]
    Text,
    Voice,
    Image,
}

/// One raw captured statement (typed, transcribed, or image-captured).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub text: NonEmptyText,
    #[serde(default)]
    pub source: StatementSource,
}

impl Statement {
    /// Blank input is rejected; the capture surface never records empty submissions.
    pub fn new(text: impl AsRef<str>, source: StatementSource) -> EmrResult<Self> {
        Ok(Self {
            text: NonEmptyText::new(text)?,
            source,
        })
    }

    /// Record an image capture by file name.
    pub fn image(file_name: &str) -> EmrResult<Self> {
        let file_name = NonEmptyText::new(file_name)?;
        Self::new(
            format!("{IMAGE_CAPTURE_PREFIX}{file_name}"),
            StatementSource::Image,
        )
    }
}

/// Append-only log of captured statements.
#[derive(Debug, Clone, Default)]
pub struct StatementLog {
    entries: Vec<Statement>,
}

impl StatementLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement and return the evidence id it will carry in every later snapshot.
    pub fn append(&mut self, statement: Statement) -> EmrResult<EvidenceId> {
        let ordinal = u32::try_from(self.entries.len() + 1)
            .map_err(|_| EmrError::InvalidValue(TypeError::InvalidEvidenceId("overflow".into())))?;
        let id = EvidenceId::from_ordinal(ordinal)?;
        self.entries.push(statement);
        tracing::debug!(evidence_id = %id, "statement appended");
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Capture the current contents. Later appends never affect the returned snapshot.
    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot(Arc::from(self.entries.as_slice()))
    }
}

/// Immutable view of the statement log taken at request start.
#[derive(Debug, Clone)]
pub struct LogSnapshot(Arc<[Statement]>);

impl LogSnapshot {
    pub fn from_statements(statements: Vec<Statement>) -> Self {
        Self(Arc::from(statements))
    }

    pub fn statements(&self) -> &[Statement] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All statement texts joined into one transcript.
    pub fn transcript(&self) -> String {
        self.0
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(TRANSCRIPT_SEPARATOR)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SemanticLabel {
    ChiefComplaint,
    PastHistory,
    Symptom,
    Evidence,
}

impl SemanticLabel {
    pub fn display(&self, language: Language) -> &'static str {
        match (self, language) {
            (Self::ChiefComplaint, Language::Zh) => "主诉相关",
            (Self::PastHistory, Language::Zh) => "既往史",
            (Self::Symptom, Language::Zh) => "症状",
            (Self::Evidence, Language::Zh) => "证据",
            (Self::ChiefComplaint, Language::En) => "Chief Complaint",
            (Self::PastHistory, Language::En) => "Past History",
            (Self::Symptom, Language::En) => "Symptoms",
            (Self::Evidence, Language::En) => "Evidence",
        }
    }

    /// Classify a statement with the ordered keyword table; the first matching category wins.
    pub fn classify(text: &str) -> Self {
        LABEL_RULES
            .iter()
            .find(|(_, pattern)| pattern.is_match(text))
            .map(|(label, _)| *label)
            .unwrap_or(Self::Evidence)
    }
}

static LABEL_RULES: LazyLock<Vec<(SemanticLabel, Regex)>> = LazyLock::new(|| {
    [
        (
            SemanticLabel::ChiefComplaint,
            r"主诉|不舒服|哪里不适|(?i:chief complaint|what brings you|uncomfortable)",
        ),
        (
            SemanticLabel::PastHistory,
            r"既往|病史|慢病|颈椎|(?i:past history|medical history|chronic)",
        ),
        (
            SemanticLabel::Symptom,
            r"咳|痰|发热|气短|胸闷|睡|(?i:cough|phlegm|sputum|fever|short(ness)? of breath|chest tightness|sleep)",
        ),
    ]
    .into_iter()
    .map(|(label, pattern)| {
        (
            label,
            Regex::new(pattern).expect("semantic label regex is valid"),
        )
    })
    .collect()
});

/// An indexed, timestamped, labelled unit derived from one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBlock {
    pub id: EvidenceId,
    /// Synthetic `HH:MM` display aid; not derived from wall-clock time.
    pub timestamp: String,
    pub semantic_label: SemanticLabel,
    /// `semantic_label` rendered in the requested language.
    pub label: &'static str,
    pub text: String,
}

/// Citation line sent to the extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLine {
    pub id: EvidenceId,
    pub text: String,
}

/// The set of evidence ids that resolve within one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceIdSet(BTreeSet<EvidenceId>);

impl EvidenceIdSet {
    pub fn contains(&self, id: &EvidenceId) -> bool {
        self.0.contains(id)
    }

    /// Whether a raw reference string resolves; malformed references never do.
    pub fn resolves(&self, reference: &str) -> Option<EvidenceId> {
        EvidenceId::parse(reference)
            .ok()
            .filter(|id| self.0.contains(id))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EvidenceId> {
        self.0.iter()
    }

    /// The ids cited by an externally supplied evidence list.
    pub fn from_lines(lines: &[EvidenceLine]) -> Self {
        lines.iter().map(|line| line.id).collect()
    }
}

impl FromIterator<EvidenceId> for EvidenceIdSet {
    fn from_iter<I: IntoIterator<Item = EvidenceId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Ordered evidence blocks plus the valid-id set for one snapshot.
#[derive(Debug, Clone)]
pub struct EvidenceIndex {
    blocks: Vec<EvidenceBlock>,
    valid_ids: EvidenceIdSet,
}

impl EvidenceIndex {
    pub fn build(snapshot: &LogSnapshot, language: Language) -> EmrResult<Self> {
        let mut blocks = Vec::with_capacity(snapshot.len());
        for (index, statement) in snapshot.statements().iter().enumerate() {
            let ordinal = u32::try_from(index + 1).map_err(|_| {
                EmrError::InvalidValue(TypeError::InvalidEvidenceId("overflow".into()))
            })?;
            let text = statement.text.as_str();
            let semantic_label = SemanticLabel::classify(text);

            blocks.push(EvidenceBlock {
                id: EvidenceId::from_ordinal(ordinal)?,
                timestamp: synthetic_timestamp(ordinal),
                semantic_label,
                label: semantic_label.display(language),
                text: text.to_string(),
            });
        }

        let valid_ids = blocks.iter().map(|block| block.id).collect();
        Ok(Self { blocks, valid_ids })
    }

    pub fn blocks(&self) -> &[EvidenceBlock] {
        &self.blocks
    }

    pub fn valid_ids(&self) -> &EvidenceIdSet {
        &self.valid_ids
    }

    pub fn evidence_lines(&self) -> Vec<EvidenceLine> {
        self.blocks
            .iter()
            .map(|block| EvidenceLine {
                id: block.id,
                text: block.text.clone(),
            })
            .collect()
    }
}

/// `HH:MM` for the statement at 1-based `ordinal`, wrapping at 24 hours.
fn synthetic_timestamp(ordinal: u32) -> String {
    let minutes = (u64::from(EVIDENCE_CLOCK_BASE_MINUTES) + u64::from(ordinal)) % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Trim references, drop blanks and repeats, keeping first-occurrence order.
pub fn normalize_references(references: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    references
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .filter(|r| seen.insert(r.to_string()))
        .map(str::to_string)
        .collect()
}
