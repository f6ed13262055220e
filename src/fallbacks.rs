//! Fallback values substituted for missing model output.
//!
//! Empty or whitespace-only strings count as missing.
//!
//! | Field | Fallback |
//! |-------|----------|
//! | `answerEnglish` | [`ANSWER_ENGLISH`] |
//! | `answerChinese` | [`ANSWER_CHINESE`] |
//! | grounding title | [`GROUNDING_TITLE`] |
//! | stakeholder `name` | [`STAKEHOLDER_NAME`] |
//! | stakeholder `region` | [`STAKEHOLDER_REGION`] |
//! | stakeholder `department` | [`STAKEHOLDER_DEPARTMENT`] |
//! | stakeholder `role` | [`STAKEHOLDER_ROLE`] |
//! | stakeholder `detail` | [`STAKEHOLDER_DETAIL`] |
//! | stakeholder `source` | [`STAKEHOLDER_SOURCE`] |

pub const ANSWER_ENGLISH: &str =
    "Sorry, I couldn't generate an English answer from the provided context.";
pub const ANSWER_CHINESE: &str = "抱歉，無法從提供的內容中產生中文回答。";
pub const GROUNDING_TITLE: &str = "External Source";

pub const STAKEHOLDER_NAME: &str = "Unknown";
pub const STAKEHOLDER_REGION: &str = "Global";
pub const STAKEHOLDER_DEPARTMENT: &str = "Unknown";
pub const STAKEHOLDER_ROLE: &str = "Stakeholder";
pub const STAKEHOLDER_DETAIL: &str = "Contextually identified from KB.";
pub const STAKEHOLDER_SOURCE: &str = "KB Analysis";

/// `value` unless it is absent or blank, else `fallback`.
pub fn or_fallback(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_counts_as_missing() {
        assert_eq!(or_fallback(Some("  "), "x"), "x");
        assert_eq!(or_fallback(None, "x"), "x");
        assert_eq!(or_fallback(Some("v"), "x"), "v");
    }
}
