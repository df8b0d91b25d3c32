//! # EMR Core
//!
//! Core logic for turning a doctor/patient conversation into an evidence-linked draft record.
//!
//! This crate contains pure transformations plus one seam for the external extraction call:
//! - Conversation parsing into role-attributed turns
//! - Evidence indexing over an append-only statement log
//! - Deterministic colloquial-to-clinical rewriting
//! - Strict validation of externally produced structured records
//! - Orchestration of both pipelines over a request-time snapshot
//!
//! **No API concerns**: HTTP servers, the concrete extraction client, and environment access
//! belong in `api-rest`, `extraction`, and the binaries.

pub mod config;
pub mod constants;
pub mod conversation;
pub mod error;
pub mod evidence;
pub mod orchestrator;
pub mod rewrite;
pub mod validation;

pub use config::{CoreConfig, ExtractionConfig};
pub use conversation::{parse_conversation, render_turns, Speaker, Turn};
pub use error::{EmrError, EmrResult, FailureClass};
pub use evidence::{
    EvidenceBlock, EvidenceIdSet, EvidenceIndex, EvidenceLine, LogSnapshot, SemanticLabel,
    Statement, StatementLog, StatementSource,
};
pub use orchestrator::{
    DraftSession, ExtractionClient, GenerationRequest, GenerationState, Orchestrator,
};
pub use rewrite::{MedicalEmr, MedicalRewriteEngine};
pub use validation::{EvidenceItem, StructuredRecord};

pub use emr_types::{EvidenceId, Language, NonEmptyText};
