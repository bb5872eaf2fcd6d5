//! Parsing of the command body `(x<N> )?<prompt>`.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::warn;

/// Upper bound on images per job; larger requests are capped, not rejected.
pub const MAX_IMAGE_COUNT: u32 = 4;

static COUNT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^x([0-9]+) (.*)$").expect("static regex"));

/// Result of parsing a command body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPrompt {
    pub prompt: String,
    /// The count the user asked for (1 without a prefix).
    pub requested_count: u64,
    /// `requested_count` clamped to `1..=MAX_IMAGE_COUNT`.
    pub image_count: u32,
}

impl ParsedPrompt {
    fn single(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            requested_count: 1,
            image_count: 1,
        }
    }

    pub fn was_clamped(&self) -> bool {
        self.requested_count > u64::from(self.image_count)
    }
}

/// Parse a command body into a prompt and image count.
///
/// A leading `x<N> ` is only treated as a repeat count when `N` is a positive
/// integer; otherwise the full text is the prompt and one image is produced.
/// An empty prompt after stripping the prefix is accepted as-is.
pub fn parse_prompt(text: &str) -> ParsedPrompt {
    let Some(captures) = COUNT_PREFIX.captures(text) else {
        return ParsedPrompt::single(text);
    };

    // The pattern guarantees ASCII digits, so the only parse failure is overflow.
    let requested = captures[1].parse::<u64>().unwrap_or(u64::MAX);
    if requested == 0 {
        return ParsedPrompt::single(text);
    }

    let image_count = requested.min(u64::from(MAX_IMAGE_COUNT)) as u32;
    if u64::from(image_count) < requested {
        crate::metrics::IMAGE_COUNT_CLAMPED.inc();
        warn!(
            requested,
            max = MAX_IMAGE_COUNT,
            "Image count above maximum, capping"
        );
    }

    ParsedPrompt {
        prompt: captures[2].to_string(),
        requested_count: requested,
        image_count,
    }
}
