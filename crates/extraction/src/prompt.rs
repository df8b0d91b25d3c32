//! Prompt assembly for structured record extraction.

use emr_core::{EvidenceLine, GenerationRequest};

/// Placeholder used for empty prompt sections.
const EMPTY_SECTION: &str = "无";

pub const SYSTEM_PROMPT: &str = "\
你是病历结构化助理（EMR Draft Generator）。
只能基于输入内容生成结果，不补充未出现的信息。
绝对禁止诊断、治疗建议、病因推测或不确定性判断词。
输入为原始就诊对话，不保证角色标注，请自行从语义中提取信息。
输出必须是严格 JSON，且仅包含以下字段：
{\"chief_complaint\":{\"text\":\"\",\"evidenceIds\":[]},\"present_illness\":{\"text\":\"\",\"evidenceIds\":[]},\"past_history\":{\"text\":\"\",\"evidenceIds\":[]},\"summary\":\"\",\"diagnostic_assessment\":{\"text\":\"\",\"evidenceIds\":[]}}
主诉必须是1到2个症状，每个症状格式为“症状词+时间”，不得超过3个症状。
现病史为围绕主诉的时间性经过描述，中文医学书面表达。
既往史为历史对话中的事实性整理，如未提及则写“未提及明确既往史”。
诊断分析需覆盖中医与西医视角，仅做初步推理与思路提示，必须写明“仅供医生参考”，不得给出治疗方案或处方。
summary 为客观概述，不诊断、不建议、不使用“可能/考虑”。
evidenceIds 为证据编号数组，如 [\"E1\",\"E2\"]，编号需与证据时间线一致。";

/// `id: text` lines, one per evidence block, or the empty-section marker.
pub fn evidence_section(lines: &[EvidenceLine]) -> String {
    if lines.is_empty() {
        return EMPTY_SECTION.to_string();
    }
    lines
        .iter()
        .map(|line| format!("{}: {}", line.id, line.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn user_prompt(request: &GenerationRequest) -> String {
    let history = match request.history_text() {
        "" => EMPTY_SECTION,
        text => text,
    };
    let evidence = evidence_section(request.evidence());

    [
        "当前就诊对话：",
        request.conversation_text(),
        "历史对话记录：",
        history,
        "证据时间线：",
        evidence.as_str(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use emr_core::EvidenceId;

    #[test]
    fn test_user_prompt_marks_empty_sections() {
        let request = GenerationRequest::new("患者：咳嗽三天", "", Vec::new()).unwrap();
        let prompt = user_prompt(&request);
        assert_eq!(
            prompt,
            "当前就诊对话：\n患者：咳嗽三天\n历史对话记录：\n无\n证据时间线：\n无"
        );
    }

    #[test]
    fn test_user_prompt_lists_evidence_in_order() {
        let evidence = vec![
            EvidenceLine {
                id: EvidenceId::from_ordinal(1).unwrap(),
                text: "医生：哪里不舒服？".into(),
            },
            EvidenceLine {
                id: EvidenceId::from_ordinal(2).unwrap(),
                text: "患者：咳嗽三天".into(),
            },
        ];
        let request = GenerationRequest::new("对话", "去年做过阑尾手术", evidence).unwrap();
        let prompt = user_prompt(&request);

        assert!(prompt.contains("历史对话记录：\n去年做过阑尾手术\n"));
        assert!(prompt.ends_with("E1: 医生：哪里不舒服？\nE2: 患者：咳嗽三天"));
    }

    #[test]
    fn test_system_prompt_fixes_envelope_keys() {
        for key in [
            "chief_complaint",
            "present_illness",
            "past_history",
            "diagnostic_assessment",
            "summary",
            "evidenceIds",
        ] {
            assert!(SYSTEM_PROMPT.contains(key), "{key} missing from system prompt");
        }
    }
}
