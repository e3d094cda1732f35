//! Text helpers shared by the content modules.

use once_cell::sync::Lazy;
use regex::Regex;

pub mod messages;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new("[^a-z0-9]+").expect("valid slug pattern"));

const WORDS_PER_MINUTE: usize = 200;

/// URL-safe identifier derived from a title.
///
/// Lowercases, collapses every run of characters outside `[a-z0-9]` into a
/// single `-`, and strips leading and trailing separators. Accented letters
/// count as separators: "Mentoría" becomes "mentor-a".
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    NON_ALNUM
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Minutes needed to read `content`, rounded up, never less than one.
pub fn estimate_reading_time(content: &str) -> u32 {
    let words = content.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1) as u32
}

/// Empty or whitespace-only input becomes `None`; other values are trimmed.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
