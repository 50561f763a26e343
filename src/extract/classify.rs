//! Keyword-based error classification

use crate::models::ErrorCategory;

/// Ordered rules; the first category with a matching keyword wins.
pub const ERROR_RULES: &[(&[&str], ErrorCategory)] = &[
    (
        &[
            "permission denied",
            "access denied",
            "operation not permitted",
            "eacces",
            "eperm",
            "forbidden",
            "unauthorized",
        ],
        ErrorCategory::Permission,
    ),
    (
        &[
            "not found",
            "no such file",
            "enoent",
            "does not exist",
            "cannot find",
        ],
        ErrorCategory::NotFound,
    ),
    (
        &["timed out", "timeout", "etimedout", "deadline exceeded"],
        ErrorCategory::Timeout,
    ),
    (
        &[
            "connection refused",
            "connection reset",
            "econnrefused",
            "econnreset",
            "network",
            "host unreachable",
            "socket hang up",
        ],
        ErrorCategory::Network,
    ),
    (
        &[
            "syntax error",
            "syntaxerror",
            "parse error",
            "parseerror",
            "unexpected token",
            "unexpected end of",
        ],
        ErrorCategory::Syntax,
    ),
    (
        &[
            "validation",
            "invalid",
            "malformed",
            "missing required",
            "required parameter",
        ],
        ErrorCategory::Validation,
    ),
];

/// Classify failed tool output, optionally combined with an error message.
pub fn classify_error(output: &str, error_message: Option<&str>) -> ErrorCategory {
    let mut text = output.to_lowercase();
    if let Some(message) = error_message {
        text.push('\n');
        text.push_str(&message.to_lowercase());
    }

    ERROR_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
        .map(|(_, category)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}
