use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Character used to mask a banned word.
pub const MASK: char = '*';

const BANNED_TERMS: &[&str] = &[
    "fuck", "fucker", "shit", "bitch", "cunt", "asshole", "bastard", "dick", "piss", "slut",
    "whore", "wanker", "twat", "prick",
];

static BANNED: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = BANNED_TERMS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("banned-term pattern is valid")
});

/// Family-friendly text normalisation.
///
/// Disabled: text passes through untouched. Enabled: every whole-word,
/// case-insensitive banned term is replaced by the same number of [`MASK`]
/// characters, so length and surrounding text are preserved.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentFilter {
    enabled: bool,
}

impl ContentFilter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if !self.enabled {
            return Cow::Borrowed(text);
        }
        BANNED.replace_all(text, |caps: &Captures<'_>| {
            MASK.to_string().repeat(caps[0].chars().count())
        })
    }
}
