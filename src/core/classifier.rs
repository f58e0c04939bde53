//! Map raw tool stderr onto user-facing error categories

use crate::error::ErrorCategory;

const MAX_MESSAGE_CHARS: usize = 100;

/// A category plus the message shown to users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub category: ErrorCategory,
    pub message: String,
}

struct Rule {
    category: ErrorCategory,
    markers: &'static [&'static str],
    message: &'static str,
}

// Markers are lowercase; first matching rule wins.
const RULES: &[Rule] = &[
    Rule {
        category: ErrorCategory::AuthOrRateLimit,
        markers: &[
            "sign in to confirm",
            "login required",
            "authentication required",
            "http error 429",
            "too many requests",
            "rate limit",
            "rate-limit",
        ],
        message: "The site requires sign-in or is rate limiting requests. Please try again later or try a different video.",
    },
    Rule {
        category: ErrorCategory::Unavailable,
        markers: &[
            "video unavailable",
            "is unavailable",
            "this video is not available",
            "content is not available",
            "no longer available",
        ],
        message: "This video is unavailable. It may have been removed or never existed.",
    },
    Rule {
        category: ErrorCategory::FormatNotice,
        markers: &["requested format is not available", "format is not available"],
        message: "The requested quality is not available for this video. Try \"best\" instead.",
    },
    Rule {
        category: ErrorCategory::Private,
        markers: &["private"],
        message: "This video is private and cannot be downloaded.",
    },
    Rule {
        category: ErrorCategory::Blocked,
        markers: &[
            "blocked",
            "forbidden",
            "http error 403",
            "available in your country",
        ],
        message: "Access to this video was blocked by the site. It may be region-locked.",
    },
];

/// Classify stderr text; the message is never empty
pub fn classify(stderr: &str) -> Classified {
    let lower = stderr.to_lowercase();

    for rule in RULES {
        if rule.markers.iter().any(|m| lower.contains(m)) {
            return Classified {
                category: rule.category,
                message: rule.message.to_string(),
            };
        }
    }

    Classified {
        category: ErrorCategory::Unknown,
        message: last_line_summary(stderr),
    }
}

/// Last non-blank line, truncated to 100 chars with an ellipsis
fn last_line_summary(stderr: &str) -> String {
    let Some(line) = stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()) else {
        return "Unknown error".into();
    };

    if line.chars().count() > MAX_MESSAGE_CHARS {
        let head: String = line.chars().take(MAX_MESSAGE_CHARS).collect();
        format!("{}...", head)
    } else {
        line.to_string()
    }
}
