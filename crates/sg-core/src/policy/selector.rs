//! Attribute-substring container selectors
//!
//! Only the tiny CSS subset ad-container conventions need is supported:
//! an optional tag name followed by one `[attr*="needle"]` clause, e.g.
//! `div[id*="google_ads"]` or `[class*="propeller"]`. As in CSS, tag and
//! attribute names are case-insensitive and the needle is case-sensitive.

use super::PolicyError;

/// A parsed `tag[attr*="needle"]` selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSelector {
    tag: Option<String>,
    attribute: String,
    needle: String,
}

impl ContainerSelector {
    /// Build a selector. Tag and attribute names are lower-cased; the needle
    /// is kept verbatim.
    pub fn new(tag: Option<&str>, attribute: &str, needle: &str) -> Self {
        Self {
            tag: tag.map(|t| t.to_ascii_lowercase()),
            attribute: attribute.to_ascii_lowercase(),
            needle: needle.to_string(),
        }
    }

    /// Parse selector text.
    pub fn parse(text: &str) -> Result<Self, PolicyError> {
        let invalid = || PolicyError::InvalidSelector(text.to_string());
        let text = text.trim();

        let open = text.find('[').ok_or_else(invalid)?;
        if !text.ends_with(']') {
            return Err(invalid());
        }

        let tag = &text[..open];
        if !tag.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(invalid());
        }

        let clause = &text[open + 1..text.len() - 1];
        let star = clause.find("*=").ok_or_else(invalid)?;
        let attribute = clause[..star].trim();
        if attribute.is_empty()
            || !attribute
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(invalid());
        }

        let raw_needle = clause[star + 2..].trim();
        let needle = strip_quotes(raw_needle).ok_or_else(invalid)?;
        if needle.is_empty() {
            return Err(invalid());
        }

        let tag = if tag.is_empty() { None } else { Some(tag) };
        Ok(Self::new(tag, attribute, needle))
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    /// Check an element described by its lower-cased tag and an attribute
    /// lookup. The needle must occur in the attribute value with exact case.
    pub fn matches<F>(&self, tag: &str, attribute: F) -> bool
    where
        F: FnOnce(&str) -> Option<String>,
    {
        if let Some(expected) = &self.tag {
            if expected != tag {
                return false;
            }
        }

        match attribute(&self.attribute) {
            Some(value) => value.contains(self.needle.as_str()),
            None => false,
        }
    }
}

impl std::fmt::Display for ContainerSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[{}*=\"{}\"]",
            self.tag.as_deref().unwrap_or(""),
            self.attribute,
            self.needle
        )
    }
}

fn strip_quotes(value: &str) -> Option<&str> {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' || first == b'\'') && first == last {
            return Some(&value[1..value.len() - 1]);
        }
        if first == b'"' || first == b'\'' || last == b'"' || last == b'\'' {
            return None;
        }
    }
    Some(value)
}
