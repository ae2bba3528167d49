use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static LANGUAGE_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<language>[A-Za-z]{2,3}|[A-Za-z]{5,8})(?:-(?P<script>[A-Za-z]{4}))?(?:-(?P<region>[A-Za-z]{2}|[0-9]{3}))?(?:-[A-Za-z0-9]{1,8})*$",
    )
    .unwrap()
});

/// A BCP 47 language tag, reduced to the subtags message selection cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguageTag {
    tag: String,
    language: String,
    script: Option<String>,
    region: Option<String>,
}

impl LanguageTag {
    /// Parses a tag such as `en`, `de-AT` or `zh-Hant-TW`; returns `None` for malformed input.
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        let captures = LANGUAGE_TAG_REGEX.captures(tag)?;

        Some(Self {
            tag: tag.to_string(),
            language: captures.name("language")?.as_str().to_ascii_lowercase(),
            script: captures.name("script").map(|m| m.as_str().to_string()),
            region: captures
                .name("region")
                .map(|m| m.as_str().to_ascii_uppercase()),
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tag)
    }
}
