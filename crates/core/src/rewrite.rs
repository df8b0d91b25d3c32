//! Deterministic rule-based medical rewriting.
//!
//! Converts colloquial patient language into standardised clinical phrasing using ordered,
//! data-driven substitution tables. No external service is called and the output is a pure
//! function of the input turns.
//!
//! The engine never emits a disease name, a treatment, or an uncertainty qualifier. Past history
//! is always the fixed "not mentioned" placeholder.

use crate::constants::{
    CHIEF_COMPLAINT_LABEL, CHIEF_COMPLAINT_SEPARATOR, DEFAULT_SYMPTOM, DEFAULT_TIME_PHRASE,
    MAX_CHIEF_COMPLAINT_SEGMENTS, PAST_HISTORY_LABEL, PAST_HISTORY_NOT_MENTIONED,
    PRESENT_ILLNESS_LABEL, SUMMARY_OPENING,
};
use crate::conversation::{parse_conversation, patient_utterances, Turn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// One `pattern -> replacement` substitution, applied to every match.
struct RewriteRule {
    pattern: Regex,
    replacement: &'static str,
}

fn compile_rules(table: &[(&str, &'static str)]) -> Vec<RewriteRule> {
    table
        .iter()
        .map(|&(pattern, replacement)| RewriteRule {
            pattern: Regex::new(pattern).expect("rewrite rule regex is valid"),
            replacement,
        })
        .collect()
}

/// Colloquial symptom expression -> standardised clinical term.
static PHRASE_RULES: LazyLock<Vec<RewriteRule>> = LazyLock::new(|| {
    compile_rules(&[
        ("睡不好|睡不着|睡眠差", "睡眠障碍"),
        ("老醒|容易醒|易醒", "夜间易醒"),
        ("白天有点困|白天困|白天疲劳|白天乏力", "日间嗜睡感"),
        ("心慌|心悸", "心悸"),
        ("出汗", "出汗"),
        ("不舒服|不适", "不适"),
        ("头晕", "头晕"),
        ("头痛|头疼", "头痛"),
        ("咳嗽", "咳嗽"),
        ("发烧|发热", "发热"),
        ("胸闷", "胸闷"),
        ("气短|呼吸不畅", "气短"),
        ("胃口不好|食欲差", "食欲减退"),
        ("肚子疼|腹痛", "腹痛"),
        ("拉肚子|腹泻", "腹泻"),
        ("便秘", "便秘"),
        ("失眠", "失眠"),
    ])
});

/// Hedging and intensity colloquialisms. The final rule collapses repeated qualifiers.
static HEDGING_RULES: LazyLock<Vec<RewriteRule>> = LazyLock::new(|| {
    compile_rules(&[
        ("可能是|可能|大概|好像|也许|应该", ""),
        ("吧|呢|嘛", ""),
        ("我(觉得|感觉)", ""),
        ("我([^们]|$)", "${1}"),
        ("有点|有些|一点|稍微", "轻度"),
        ("老是|总是", "易"),
        ("不明显", "轻度"),
        ("(轻度)+", "轻度"),
    ])
});

/// Colloquial recency phrases -> standardised durations, matched in declared order.
static TIME_RULES: LazyLock<Vec<RewriteRule>> = LazyLock::new(|| {
    compile_rules(&[
        ("这两天|近两天|近二天|最近两天", "两天"),
        ("最近一周|近一周|近七天", "一周"),
        ("最近|近期|近来", "近期"),
        ("半个月|近半个月", "半月"),
    ])
});

/// A numeral (digits or Chinese number words) followed by a day/week/month/year unit.
static NUMERIC_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([一二三四五六七八九十两\d]+)(天|日|周|个月|月|年)")
        .expect("duration regex is valid")
});

/// Disease, medication and treatment cues. A segment matching any of them is dropped whole.
static EXCLUSION_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        "感冒|肺炎|支气管炎|哮喘|高血压|糖尿病|颈椎病",
        "炎|癌|瘤|病毒|细菌|感染",
        "药|吃了|服用|抗生素",
        "治疗|输液|打针|挂水|手术|诊断|确诊",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("exclusion regex is valid"))
    .collect()
});

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[，。,.！？!?；;、]").expect("sentence regex is valid"));

static PUNCTUATION_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[，。,.]+").expect("punctuation regex is valid"));

/// Deterministic engine output. Plain strings; no evidence references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalEmr {
    pub chief_complaint: String,
    pub present_illness: String,
    pub past_history: String,
    pub summary: String,
}

/// A phrase after rewriting, remembering whether any symptom rule fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenPhrase {
    pub text: String,
    pub is_symptom: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MedicalRewriteEngine;

impl MedicalRewriteEngine {
    pub fn new() -> Self {
        Self
    }

    /// Parse a role-marked transcript and rewrite its patient turns.
    pub fn rewrite_transcript(&self, raw_text: &str) -> MedicalEmr {
        self.rewrite(&parse_conversation(raw_text))
    }

    /// Produce the rule-based record for `turns`.
    pub fn rewrite(&self, turns: &[Turn]) -> MedicalEmr {
        let utterances: Vec<&str> = patient_utterances(turns).collect();

        let time_phrase = extract_time_phrase(&utterances.join("，"))
            .unwrap_or_else(|| DEFAULT_TIME_PHRASE.to_string());

        let (chief_complaint, present_illness) = match utterances.first() {
            Some(first) => (
                build_chief_complaint(&utterances, first, &time_phrase),
                build_present_illness(first, &time_phrase),
            ),
            None => (String::new(), String::new()),
        };
        let past_history = PAST_HISTORY_NOT_MENTIONED.to_string();
        let summary = build_summary(&chief_complaint, &present_illness, &past_history);

        tracing::debug!(
            patient_turns = utterances.len(),
            time_phrase = %time_phrase,
            "rule-based rewrite complete"
        );

        MedicalEmr {
            chief_complaint,
            present_illness,
            past_history,
            summary,
        }
    }
}

fn apply_rules(text: &str, rules: &[RewriteRule]) -> (String, bool) {
    let mut matched = false;
    let mut result = text.to_string();
    for rule in rules {
        if rule.pattern.is_match(&result) {
            matched = true;
            result = rule
                .pattern
                .replace_all(&result, rule.replacement)
                .into_owned();
        }
    }
    (result, matched)
}

/// Rewrite one phrase: symptom terms first, then hedging, then punctuation cleanup.
pub fn rewrite_phrase(text: &str) -> RewrittenPhrase {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return RewrittenPhrase {
            text: String::new(),
            is_symptom: false,
        };
    }

    let (result, is_symptom) = apply_rules(trimmed, &PHRASE_RULES);
    let (result, _) = apply_rules(&result, &HEDGING_RULES);
    let result = PUNCTUATION_RUN.replace_all(&result, "，");
    let text = result.trim().trim_matches('，').trim().to_string();

    RewrittenPhrase { text, is_symptom }
}

/// The first stated duration, else the first colloquial recency phrase.
pub fn extract_time_phrase(text: &str) -> Option<String> {
    if let Some(caps) = NUMERIC_DURATION.captures(text) {
        return caps.get(0).map(|m| m.as_str().to_string());
    }

    TIME_RULES
        .iter()
        .find(|rule| rule.pattern.is_match(text))
        .map(|rule| rule.replacement.to_string())
}

/// Remove every recognised time expression so it is not duplicated in the rewritten body.
pub fn strip_time_phrase(text: &str) -> String {
    let mut result = text.to_string();
    for rule in TIME_RULES.iter() {
        result = rule.pattern.replace_all(&result, "").into_owned();
    }
    NUMERIC_DURATION.replace_all(&result, "").into_owned()
}

fn segment(text: &str) -> impl Iterator<Item = &str> {
    SENTENCE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn is_excluded(text: &str) -> bool {
    EXCLUSION_RULES.iter().any(|rule| rule.is_match(text))
}

/// Rewritten segments of `text`, without time expressions or excluded clinical content.
fn clinical_phrases(text: &str) -> impl Iterator<Item = RewrittenPhrase> + '_ {
    segment(text)
        .filter(|s| !is_excluded(s))
        .map(|s| rewrite_phrase(&strip_time_phrase(s)))
        .filter(|p| !p.text.is_empty() && !is_excluded(&p.text))
}

fn build_chief_complaint(utterances: &[&str], first: &str, time_phrase: &str) -> String {
    let phrases: Vec<RewrittenPhrase> = utterances
        .iter()
        .flat_map(|u| clinical_phrases(u))
        .collect();

    let symptoms: Vec<&str> = phrases
        .iter()
        .filter(|p| p.is_symptom)
        .map(|p| p.text.as_str())
        .collect();
    let candidates = if symptoms.is_empty() {
        phrases.iter().map(|p| p.text.as_str()).collect()
    } else {
        symptoms
    };

    let mut chosen: Vec<&str> = Vec::with_capacity(MAX_CHIEF_COMPLAINT_SEGMENTS);
    for candidate in candidates {
        if chosen.len() == MAX_CHIEF_COMPLAINT_SEGMENTS {
            break;
        }
        if !chosen.contains(&candidate) {
            chosen.push(candidate);
        }
    }

    if chosen.is_empty() {
        let body = rewrite_phrase(&strip_time_phrase(first)).text;
        let symptom = segment(&body)
            .find(|s| !is_excluded(s))
            .unwrap_or(DEFAULT_SYMPTOM);
        return format!("{symptom}{time_phrase}");
    }

    chosen
        .iter()
        .map(|s| format!("{s}{time_phrase}"))
        .collect::<Vec<_>>()
        .join(CHIEF_COMPLAINT_SEPARATOR)
}

fn build_present_illness(first: &str, time_phrase: &str) -> String {
    let body = clinical_phrases(first)
        .map(|p| p.text)
        .collect::<Vec<_>>()
        .join("，");
    let body = if body.is_empty() {
        DEFAULT_SYMPTOM
    } else {
        body.as_str()
    };
    format!("患者{time_phrase}出现{body}，目前症状仍在，需进一步问诊完善病史。")
}

fn build_summary(chief_complaint: &str, present_illness: &str, past_history: &str) -> String {
    let parts: Vec<String> = [
        (CHIEF_COMPLAINT_LABEL, chief_complaint),
        (PRESENT_ILLNESS_LABEL, present_illness),
        (PAST_HISTORY_LABEL, past_history),
    ]
    .iter()
    .map(|(label, value)| (label, value.trim().trim_end_matches('。')))
    .filter(|(_, value)| !value.is_empty())
    .map(|(label, value)| format!("{label}：{value}"))
    .collect();

    if parts.is_empty() {
        return String::new();
    }
    format!("{SUMMARY_OPENING}{}。", parts.join("。"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Speaker;

    fn patient(text: &str) -> Turn {
        Turn {
            turn_id: 1,
            speaker: Speaker::Patient,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_cough_three_days_scenario() {
        let emr = MedicalRewriteEngine::new().rewrite(&[patient("咳嗽三天，有点低热")]);

        assert_eq!(extract_time_phrase("咳嗽三天，有点低热").as_deref(), Some("三天"));
        assert_eq!(emr.chief_complaint, "咳嗽三天");
        assert!(emr.summary.contains("主诉：咳嗽三天"));
        assert_eq!(
            emr.present_illness,
            "患者三天出现咳嗽，轻度低热，目前症状仍在，需进一步问诊完善病史。"
        );
        assert_eq!(emr.past_history, "未提及既往史");
    }

    #[test]
    fn test_rewrite_is_byte_identical_across_runs() {
        let engine = MedicalRewriteEngine::new();
        let raw = "医生：哪里不舒服？患者：最近老是睡不着，白天有点困。医生：多久了？患者：半个月吧";
        let first = engine.rewrite_transcript(raw);
        let second = engine.rewrite_transcript(raw);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_chief_complaint_caps_at_two_segments_each_with_time() {
        let emr = MedicalRewriteEngine::new().rewrite(&[
            patient("这两天头痛，心慌"),
            patient("拉肚子，胃口不好"),
        ]);
        let segments: Vec<&str> = emr.chief_complaint.split(CHIEF_COMPLAINT_SEPARATOR).collect();
        assert_eq!(segments, vec!["头痛两天", "心悸两天"]);
        assert!(segments.len() <= MAX_CHIEF_COMPLAINT_SEGMENTS);
        assert!(segments.iter().all(|s| s.ends_with("两天")));
    }

    #[test]
    fn test_chief_complaint_skips_duplicate_segments() {
        let emr = MedicalRewriteEngine::new().rewrite(&[patient("咳嗽，咳嗽，发烧")]);
        assert_eq!(emr.chief_complaint, "咳嗽近期、发热近期");
    }

    #[test]
    fn test_non_symptom_segments_used_when_no_symptom_rule_fires() {
        let emr = MedicalRewriteEngine::new().rewrite(&[patient("喉咙干一周")]);
        assert_eq!(emr.chief_complaint, "喉咙干一周");
    }

    #[test]
    fn test_falls_back_to_first_utterance_when_segments_rewrite_empty() {
        let emr = MedicalRewriteEngine::new().rewrite(&[patient("我觉得。")]);
        assert_eq!(emr.chief_complaint, "不适近期");
        assert_eq!(
            emr.present_illness,
            "患者近期出现不适，目前症状仍在，需进一步问诊完善病史。"
        );
    }

    #[test]
    fn test_phrase_rules_compound_in_declared_order() {
        // The symptom rule fires before hedging drops the first-person lead-in.
        let phrase = rewrite_phrase("我觉得有点睡不好");
        assert_eq!(phrase.text, "轻度睡眠障碍");
        assert!(phrase.is_symptom);
    }

    #[test]
    fn test_hedging_collapses_repeated_qualifiers() {
        assert_eq!(rewrite_phrase("有点稍微头晕").text, "轻度头晕");
        assert_eq!(rewrite_phrase("老是出汗").text, "易出汗");
    }

    #[test]
    fn test_time_phrase_prefers_numeric_then_table_then_none() {
        assert_eq!(extract_time_phrase("咳了2周").as_deref(), Some("2周"));
        assert_eq!(extract_time_phrase("头痛三个月").as_deref(), Some("三个月"));
        assert_eq!(extract_time_phrase("最近一周头晕").as_deref(), Some("一周"));
        assert_eq!(extract_time_phrase("近来胸闷").as_deref(), Some("近期"));
        assert_eq!(extract_time_phrase("半个月了").as_deref(), Some("半月"));
        assert_eq!(extract_time_phrase("头晕"), None);
    }

    #[test]
    fn test_time_phrase_is_stripped_from_body() {
        let emr = MedicalRewriteEngine::new().rewrite(&[patient("最近一周老是头晕")]);
        assert_eq!(emr.chief_complaint, "易头晕一周");
        assert!(!emr.present_illness.contains("最近"));
        assert!(emr.present_illness.starts_with("患者一周出现易头晕"));
    }

    #[test]
    fn test_doctor_turns_are_ignored() {
        let engine = MedicalRewriteEngine::new();
        let emr = engine.rewrite_transcript("医生：咳嗽吗？发烧吗？患者：头痛两天");
        assert_eq!(emr.chief_complaint, "头痛两天");
    }

    #[test]
    fn test_no_patient_turns_yields_history_only_summary() {
        let emr = MedicalRewriteEngine::new().rewrite_transcript("没有角色标记的文字");
        assert!(emr.chief_complaint.is_empty());
        assert!(emr.present_illness.is_empty());
        assert_eq!(emr.summary, "本次就诊，既往史：未提及既往史。");
    }

    #[test]
    fn test_summary_has_no_doubled_full_stops() {
        let emr = MedicalRewriteEngine::new().rewrite(&[patient("咳嗽三天")]);
        assert!(!emr.summary.contains("。。"));
        assert!(emr.summary.starts_with("本次就诊，主诉：咳嗽三天。现病史：患者三天出现咳嗽"));
        assert!(emr.summary.ends_with("既往史：未提及既往史。"));
    }

    #[test]
    fn test_summary_empty_when_all_fields_empty() {
        assert_eq!(build_summary("", "  ", ""), "");
    }

    #[test]
    fn test_output_avoids_uncertainty_and_treatment_words() {
        let emr = MedicalRewriteEngine::new().rewrite(&[
            patient("可能是感冒吧，我觉得有点发烧"),
            patient("吃了感冒药"),
        ]);
        assert_eq!(emr.chief_complaint, "轻度发热近期");
        assert_eq!(
            emr.present_illness,
            "患者近期出现轻度发热，目前症状仍在，需进一步问诊完善病史。"
        );
        for field in [&emr.chief_complaint, &emr.present_illness, &emr.summary] {
            for word in ["可能", "考虑", "建议", "感冒", "药", "吃了"] {
                assert!(!field.contains(word), "{word} leaked into {field}");
            }
        }
    }

    #[test]
    fn test_disease_and_treatment_segments_are_dropped() {
        let emr = MedicalRewriteEngine::new().rewrite(&[
            patient("吃了感冒药，肺炎，头痛两天"),
            patient("在诊所输液治疗过"),
        ]);
        assert_eq!(emr.chief_complaint, "头痛两天");
        assert_eq!(
            emr.present_illness,
            "患者两天出现头痛，目前症状仍在，需进一步问诊完善病史。"
        );
        for field in [&emr.chief_complaint, &emr.present_illness, &emr.summary] {
            for word in ["感冒", "肺炎", "炎", "药", "吃了", "治疗", "输液"] {
                assert!(!field.contains(word), "{word} leaked into {field}");
            }
        }
    }

    #[test]
    fn test_only_excluded_content_falls_back_to_default_symptom() {
        let emr = MedicalRewriteEngine::new().rewrite(&[patient("高血压，一直在吃药")]);
        assert_eq!(emr.chief_complaint, "不适近期");
        assert!(emr.present_illness.starts_with("患者近期出现不适"));
    }

    #[test]
    fn test_first_person_plural_is_kept() {
        assert_eq!(rewrite_phrase("我们家里人都咳嗽").text, "我们家里人都咳嗽");
        assert_eq!(rewrite_phrase("我头痛").text, "头痛");
        assert_eq!(rewrite_phrase("我感觉心慌").text, "心悸");
    }
}
