//! Size-tiered output retention

use crate::config::ExtractionConfig;
use crate::parser::common::{head_chars, stringify_value};
use serde_json::Value;

/// Output retained for one tool result
#[derive(Debug, Clone, PartialEq)]
pub struct TieredOutput {
    /// First `summary_chars` characters, always present
    pub summary: String,
    /// Verbatim payload when small enough or when the call failed
    pub full: Option<String>,
    /// Byte length of the stringified payload
    pub size: usize,
    pub truncated: bool,
}

/// Tier a result payload. Strings are used as-is, structures are serialized.
pub fn tier_output(payload: &Value, is_error: bool, config: &ExtractionConfig) -> TieredOutput {
    tier_text(stringify_value(payload), is_error, config)
}

pub fn tier_text(text: String, is_error: bool, config: &ExtractionConfig) -> TieredOutput {
    let size = text.len();
    let summary = head_chars(&text, config.summary_chars);

    if size <= config.full_output_threshold || is_error {
        TieredOutput {
            summary,
            full: Some(text),
            size,
            truncated: false,
        }
    } else {
        TieredOutput {
            summary,
            full: None,
            size,
            truncated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_at_threshold_is_kept() {
        let config = ExtractionConfig::default();
        let tier = tier_text("x".repeat(10240), false, &config);
        assert_eq!(tier.size, 10240);
        assert!(!tier.truncated);
        assert_eq!(tier.full.as_deref().map(str::len), Some(10240));
        assert_eq!(tier.summary.len(), 500);
    }

    #[test]
    fn test_over_threshold_drops_full() {
        let config = ExtractionConfig::default();
        let tier = tier_text("x".repeat(10241), false, &config);
        assert!(tier.truncated);
        assert!(tier.full.is_none());
        assert_eq!(tier.size, 10241);
        assert_eq!(tier.summary, "x".repeat(500));
    }

    #[test]
    fn test_errors_keep_full_regardless_of_size() {
        let config = ExtractionConfig::default();
        let tier = tier_text("e".repeat(50_000), true, &config);
        assert!(!tier.truncated);
        assert_eq!(tier.full.map(|f| f.len()), Some(50_000));
    }

    #[test]
    fn test_structured_payload_is_serialized() {
        let config = ExtractionConfig::default();
        let tier = tier_output(&json!([{"type": "text", "text": "ok"}]), false, &config);
        assert_eq!(tier.summary, r#"[{"text":"ok","type":"text"}]"#);
        assert_eq!(tier.size, tier.summary.len());
    }

    #[test]
    fn test_short_output_summary_is_whole_text() {
        let config = ExtractionConfig::default();
        let tier = tier_output(&json!("fn main() {}"), false, &config);
        assert_eq!(tier.summary, "fn main() {}");
        assert_eq!(tier.full.as_deref(), Some("fn main() {}"));
    }
}
