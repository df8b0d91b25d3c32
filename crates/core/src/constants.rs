//! Constants used throughout the EMR core crate.
//!
//! Fixed clinical phrasing lives here so the generated text stays auditable in one place.

/// Minutes past midnight of the synthetic evidence clock before the first statement.
///
/// Statement `i` (1-based) is stamped `BASE + i`, so `E1` reads `09:10`.
pub const EVIDENCE_CLOCK_BASE_MINUTES: u32 = 9 * 60 + 9;

/// Prefix recorded for image-captured statements.
pub const IMAGE_CAPTURE_PREFIX: &str = "【图片采集】";

/// Separator used when joining statements into one transcript.
pub const TRANSCRIPT_SEPARATOR: &str = "\n";

/// Maximum number of symptom segments in a rule-engine chief complaint.
pub const MAX_CHIEF_COMPLAINT_SEGMENTS: usize = 2;

/// Separator between chief-complaint segments.
pub const CHIEF_COMPLAINT_SEPARATOR: &str = "、";

/// Time qualifier used when no duration is stated.
pub const DEFAULT_TIME_PHRASE: &str = "近期";

/// Body used when a patient utterance rewrites to nothing.
pub const DEFAULT_SYMPTOM: &str = "不适";

/// Past history placeholder. The rule engine never infers history content.
pub const PAST_HISTORY_NOT_MENTIONED: &str = "未提及既往史";

pub const SUMMARY_OPENING: &str = "本次就诊，";
pub const CHIEF_COMPLAINT_LABEL: &str = "主诉";
pub const PRESENT_ILLNESS_LABEL: &str = "现病史";
pub const PAST_HISTORY_LABEL: &str = "既往史";

/// Default OpenAI-compatible chat-completions endpoint.
pub const DEFAULT_LLM_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";

/// Default model name sent to the extraction service.
pub const DEFAULT_LLM_MODEL: &str = "deepseek-chat";

/// Default time budget callers give one extraction call.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
