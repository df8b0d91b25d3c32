//! Role-marked transcript parsing.
//!
//! A transcript such as `医生：哪里不舒服？患者：咳嗽三天` is split into attributed turns at each
//! explicit role marker. Text before the first marker is ignored and no diarization is attempted
//! for unmarked text.

use emr_types::Language;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static SPEAKER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(医生|患者|(?-u:\b)(?i:doctor|patient))[:：]")
        .expect("speaker marker regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Doctor,
    Patient,
}

impl Speaker {
    fn from_marker(label: &str) -> Option<Self> {
        match label {
            "医生" => Some(Self::Doctor),
            "患者" => Some(Self::Patient),
            other if other.eq_ignore_ascii_case("doctor") => Some(Self::Doctor),
            other if other.eq_ignore_ascii_case("patient") => Some(Self::Patient),
            _ => None,
        }
    }

    /// Marker text (including the separator) used when rendering turns back to a transcript.
    pub fn marker(&self, language: Language) -> &'static str {
        match (self, language) {
            (Self::Doctor, Language::Zh) => "医生：",
            (Self::Patient, Language::Zh) => "患者：",
            (Self::Doctor, Language::En) => "Doctor: ",
            (Self::Patient, Language::En) => "Patient: ",
        }
    }
}

/// One role-attributed statement from a marked-up transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    /// Ascending from 1 in encounter order.
    pub turn_id: u32,
    pub speaker: Speaker,
    pub text: String,
}

/// Split `raw_text` into turns at each role marker.
///
/// Each turn spans from just after its marker to just before the next marker (or the end of
/// the text). Spans that are empty after trimming are dropped without consuming a turn id.
/// Returns an empty sequence when no marker is present.
pub fn parse_conversation(raw_text: &str) -> Vec<Turn> {
    let text = raw_text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let markers: Vec<(Speaker, usize, usize)> = SPEAKER_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let speaker = Speaker::from_marker(caps.get(1)?.as_str())?;
            Some((speaker, whole.start(), whole.end()))
        })
        .collect();

    let mut turns = Vec::with_capacity(markers.len());
    for (i, (speaker, _, content_start)) in markers.iter().enumerate() {
        let content_end = markers
            .get(i + 1)
            .map(|(_, next_start, _)| *next_start)
            .unwrap_or(text.len());

        let content = text[*content_start..content_end].trim();
        if content.is_empty() {
            continue;
        }

        turns.push(Turn {
            turn_id: turns.len() as u32 + 1,
            speaker: *speaker,
            text: content.to_string(),
        });
    }

    tracing::debug!(turns = turns.len(), "parsed conversation");
    turns
}

/// Reconstruct a marked transcript, one `marker text` line per turn.
///
/// Reparsing the result with [`parse_conversation`] yields the same turns.
pub fn render_turns(turns: &[Turn], language: Language) -> String {
    turns
        .iter()
        .map(|turn| format!("{}{}", turn.speaker.marker(language), turn.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Texts of the patient turns, in order.
pub fn patient_utterances(turns: &[Turn]) -> impl Iterator<Item = &str> {
    turns
        .iter()
        .filter(|turn| turn.speaker == Speaker::Patient)
        .map(|turn| turn.text.as_str())
}
