//! Per-request composition of the record pipelines.
//!
//! Two independent pipelines run over the same snapshot:
//!
//! - the deterministic path parses the joined transcript and hands the turns to
//!   [`MedicalRewriteEngine`];
//! - the extraction path sends the transcript and evidence lines to an [`ExtractionClient`] and
//!   gates the response through the structured record validator.
//!
//! Neither supersedes the other. The orchestrator is stateless; the currently displayed record
//! and the request state live in a caller-owned [`DraftSession`].

use crate::constants::TRANSCRIPT_SEPARATOR;
use crate::conversation::parse_conversation;
use crate::evidence::{EvidenceIdSet, EvidenceIndex, EvidenceLine, LogSnapshot};
use crate::rewrite::{MedicalEmr, MedicalRewriteEngine};
use crate::validation::{validate_content, StructuredRecord};
use crate::{EmrError, EmrResult};
use async_trait::async_trait;
use emr_types::{Language, NonEmptyText};
use std::sync::Arc;

/// Input handed to the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    conversation_text: NonEmptyText,
    history_text: String,
    evidence: Vec<EvidenceLine>,
}

impl GenerationRequest {
    /// # Errors
    ///
    /// Returns `EmrError::InputMissing` when `conversation` is blank after trimming.
    pub fn new(conversation: &str, history: &str, evidence: Vec<EvidenceLine>) -> EmrResult<Self> {
        let conversation_text =
            NonEmptyText::new(conversation).map_err(|_| EmrError::InputMissing)?;
        Ok(Self {
            conversation_text,
            history_text: history.trim().to_string(),
            evidence,
        })
    }

    /// Request covering every block of `index`, with the block texts as the conversation.
    pub fn from_index(index: &EvidenceIndex, history: &str) -> EmrResult<Self> {
        let conversation = index
            .blocks()
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join(TRANSCRIPT_SEPARATOR);
        Self::new(&conversation, history, index.evidence_lines())
    }

    pub fn conversation_text(&self) -> &str {
        self.conversation_text.as_str()
    }

    pub fn history_text(&self) -> &str {
        &self.history_text
    }

    pub fn evidence(&self) -> &[EvidenceLine] {
        &self.evidence
    }
}

/// External structured-record extraction.
///
/// Implementations perform one non-streaming request and return the raw model content. They
/// impose no timeout of their own; callers wrap the future.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn extract(&self, request: &GenerationRequest) -> EmrResult<String>;
}

#[async_trait]
impl<T: ExtractionClient + ?Sized> ExtractionClient for Arc<T> {
    async fn extract(&self, request: &GenerationRequest) -> EmrResult<String> {
        (**self).extract(request).await
    }
}

/// Lifecycle of one generation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerationState {
    #[default]
    Idle,
    Requesting,
    Succeeded,
    Failed,
}

pub struct Orchestrator<C> {
    client: C,
    language: Language,
    engine: MedicalRewriteEngine,
}

impl<C: ExtractionClient> Orchestrator<C> {
    pub fn new(client: C, language: Language) -> Self {
        Self {
            client,
            language,
            engine: MedicalRewriteEngine::new(),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Run the extraction path for an assembled request.
    ///
    /// The result is all-or-nothing: either a fully validated record whose references all
    /// resolve in `valid_ids`, or an error.
    pub async fn generate_structured(
        &self,
        request: &GenerationRequest,
        valid_ids: &EvidenceIdSet,
    ) -> EmrResult<StructuredRecord> {
        tracing::debug!(
            conversation_chars = request.conversation_text().chars().count(),
            history_chars = request.history_text().chars().count(),
            evidence = request.evidence().len(),
            "dispatching extraction request"
        );

        let content = self.client.extract(request).await?;
        let record = validate_content(&content, valid_ids)?;

        tracing::info!("structured record accepted");
        Ok(record)
    }

    /// Index `snapshot` and run the extraction path over it.
    ///
    /// Blank snapshots fail with `InputMissing` before the client is called.
    pub async fn generate_from_snapshot(
        &self,
        snapshot: &LogSnapshot,
        history: &str,
    ) -> EmrResult<StructuredRecord> {
        let index = EvidenceIndex::build(snapshot, self.language)?;
        let request = GenerationRequest::from_index(&index, history)?;
        self.generate_structured(&request, index.valid_ids()).await
    }

    /// Deterministic path over the joined transcript of `snapshot`.
    pub fn rewrite_snapshot(&self, snapshot: &LogSnapshot) -> MedicalEmr {
        let turns = parse_conversation(&snapshot.transcript());
        self.engine.rewrite(&turns)
    }
}

/// Caller-owned holder of the displayed record and the state of the latest request.
///
/// Single-flight is the caller's discipline: `begin` does not refuse a second request.
#[derive(Debug, Clone, Default)]
pub struct DraftSession {
    record: Option<StructuredRecord>,
    state: GenerationState,
}

impl DraftSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) -> Option<&StructuredRecord> {
        self.record.as_ref()
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn begin(&mut self) {
        self.state = GenerationState::Requesting;
    }

    /// Apply the outcome of a request. The record is replaced wholesale on success and left
    /// untouched on failure.
    pub fn finish(&mut self, result: EmrResult<StructuredRecord>) -> EmrResult<&StructuredRecord> {
        match result {
            Ok(record) => {
                self.state = GenerationState::Succeeded;
                let record: &StructuredRecord = self.record.insert(record);
                Ok(record)
            }
            Err(err) => {
                self.state = GenerationState::Failed;
                tracing::warn!(error = %err, "draft generation failed; keeping previous record");
                Err(err)
            }
        }
    }
}
