//! Validated primitives shared by the EMR drafting crates.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated primitive types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypeError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input was not of the form `E<ordinal>` with an ordinal of 1 or more
    #[error("invalid evidence id: {0}")]
    InvalidEvidenceId(String),
    /// The input did not name a supported language
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText`, returning `TypeError::Empty` if the trimmed input is blank.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TypeError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypeError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Citation identifier for one evidence block: `"E"` followed by a 1-based ordinal.
///
/// Ids are stable within a snapshot and never reused for a different statement. Ordering
/// follows the ordinal, so `E2 < E10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvidenceId(u32);

impl EvidenceId {
    const PREFIX: char = 'E';

    /// Build the id for the statement at 1-based position `ordinal`.
    pub fn from_ordinal(ordinal: u32) -> Result<Self, TypeError> {
        if ordinal == 0 {
            return Err(TypeError::InvalidEvidenceId("E0".into()));
        }
        Ok(Self(ordinal))
    }

    /// Parse the canonical `E<n>` form. Leading zeros, signs and whitespace are rejected.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let invalid = || TypeError::InvalidEvidenceId(input.to_owned());

        let digits = input.strip_prefix(Self::PREFIX).ok_or_else(invalid)?;
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let ordinal = digits.parse::<u32>().map_err(|_| invalid())?;
        Self::from_ordinal(ordinal)
    }

    pub fn ordinal(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

impl FromStr for EvidenceId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for EvidenceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for EvidenceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EvidenceId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Display language for localised labels.
///
/// Core operations take this as an explicit parameter rather than reading shared UI state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
}

impl FromStr for Language {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" => Ok(Self::Zh),
            "en" => Ok(Self::En),
            other => Err(TypeError::UnsupportedLanguage(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_trims_input() {
        let text = NonEmptyText::new("  咳嗽三天  ").unwrap();
        assert_eq!(text.as_str(), "咳嗽三天");
    }

    #[test]
    fn test_non_empty_text_rejects_whitespace_only() {
        assert_eq!(NonEmptyText::new(" \n\t").unwrap_err(), TypeError::Empty);
    }

    #[test]
    fn test_non_empty_text_deserialize_rejects_blank() {
        let result: Result<NonEmptyText, _> = serde_json::from_str("\"   \"");
        assert!(result.is_err());
    }

    #[test]
    fn test_evidence_id_display_and_parse() {
        let id = EvidenceId::from_ordinal(12).unwrap();
        assert_eq!(id.to_string(), "E12");
        assert_eq!(EvidenceId::parse("E12").unwrap(), id);
    }

    #[test]
    fn test_evidence_id_rejects_malformed() {
        for bad in ["", "E", "E0", "E01", "e1", "1", "E-1", "E1a", " E1", "E99999999999"] {
            assert!(EvidenceId::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_evidence_id_orders_by_ordinal() {
        let e2 = EvidenceId::parse("E2").unwrap();
        let e10 = EvidenceId::parse("E10").unwrap();
        assert!(e2 < e10);
    }

    #[test]
    fn test_evidence_id_serde_uses_string_form() {
        let id = EvidenceId::from_ordinal(3).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"E3\"");
        let back: EvidenceId = serde_json::from_str("\"E3\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_language_parse() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert_eq!(" zh ".parse::<Language>().unwrap(), Language::Zh);
        assert!("fr".parse::<Language>().is_err());
        assert_eq!(Language::default(), Language::Zh);
    }
}
