//! Policy Store
//!
//! The immutable set of lists the classifier and sweeper consult: Allow
//! List, Block List, suspicious TLD suffixes, the random-hostname run
//! length, ad-container selectors and player-embed keywords.
//!
//! A store is built once from a [`PolicyConfig`] and shared read-only for
//! the lifetime of an engine.

pub mod parser;
pub mod selector;

use serde::{Deserialize, Serialize};

pub use parser::parse_filter_list;
pub use selector::ContainerSelector;

/// Error type for policy construction and loading.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Invalid container selector: {0}")]
    InvalidSelector(String),
    #[error("Random-host run length must be at least 1")]
    InvalidRunLength,
    #[error("Sweep interval must be greater than zero")]
    InvalidInterval,
    #[error("Invalid policy JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Built-in Policy
// =============================================================================

/// Partner domains and the page's own player hosts, always permitted.
pub const DEFAULT_ALLOW: &[&str] = &["admaven.com", "megaplay.buzz", "vidwish.live"];

/// Competing ad networks and video-player ad hosts.
pub const DEFAULT_BLOCK: &[&str] = &[
    "popcash.net",
    "propellerads.com",
    "adsterra.com",
    "exoclick.com",
    "juicyads.com",
    "popads.net",
    "clickadu.com",
    "bidvertiser.com",
    "claithfoiter.click",
    "cpmlink.net",
    "tsyndicate.com",
    "vidcloud.pro",
    "streamtape.com",
    "dood.watch",
    "filemoon.sx",
    "hilltopads.net",
    "trafficjunky.com",
    "adcash.com",
    "googleadservices.com",
    "googlesyndication.com",
    "doubleclick.net",
];

/// TLDs dominated by throwaway redirector domains.
pub const DEFAULT_SUSPICIOUS_TLDS: &[&str] = &[".click", ".top", ".xyz", ".icu"];

/// Minimum run of alphanumerics in a hostname that marks it machine-generated.
/// The heuristic is opt-in; the built-in policy leaves it off.
pub const DEFAULT_RANDOM_HOST_RUN: usize = 15;

/// Ad-container selectors.
pub const DEFAULT_CONTAINER_SELECTORS: &[&str] = &[
    r#"div[id*="google_ads"]"#,
    r#"div[class*="adsbygoogle"]"#,
    r#"[class*="propeller"]"#,
    r#"[class*="adsterra"]"#,
    r#"[class*="exoclick"]"#,
    r#"[class*="popcash"]"#,
];

/// Keywords identifying a legitimate video-player iframe.
pub const DEFAULT_PLAYER_KEYWORDS: &[&str] = &["player", "embed", "video"];

// =============================================================================
// Policy Config (serialized form)
// =============================================================================

/// Serialized policy, as found in JSON configuration files.
///
/// Missing fields fall back to the built-in policy. Setting
/// `random_host_run` enables the random-hostname heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub allow: Vec<String>,
    pub block: Vec<String>,
    pub suspicious_tlds: Vec<String>,
    pub random_host_run: Option<usize>,
    pub container_selectors: Vec<String>,
    pub player_keywords: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow: to_strings(DEFAULT_ALLOW),
            block: to_strings(DEFAULT_BLOCK),
            suspicious_tlds: to_strings(DEFAULT_SUSPICIOUS_TLDS),
            random_host_run: None,
            container_selectors: to_strings(DEFAULT_CONTAINER_SELECTORS),
            player_keywords: to_strings(DEFAULT_PLAYER_KEYWORDS),
        }
    }
}

impl PolicyConfig {
    /// A config with every list empty and no heuristic.
    pub fn empty() -> Self {
        Self {
            allow: Vec::new(),
            block: Vec::new(),
            suspicious_tlds: Vec::new(),
            random_host_run: None,
            container_selectors: Vec::new(),
            player_keywords: Vec::new(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Policy Store
// =============================================================================

/// Immutable, normalized policy.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    allow: Vec<String>,
    block: Vec<String>,
    suspicious_tlds: Vec<String>,
    random_host_run: Option<usize>,
    container_selectors: Vec<ContainerSelector>,
    player_keywords: Vec<String>,
}

impl PolicyStore {
    /// Build a store from config, normalizing every entry.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, PolicyError> {
        if config.random_host_run == Some(0) {
            return Err(PolicyError::InvalidRunLength);
        }

        let container_selectors = config
            .container_selectors
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| ContainerSelector::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            allow: normalize_entries(&config.allow),
            block: normalize_entries(&config.block),
            suspicious_tlds: normalize_entries(
                &config
                    .suspicious_tlds
                    .iter()
                    .map(|tld| normalize_tld(tld))
                    .collect::<Vec<_>>(),
            ),
            random_host_run: config.random_host_run,
            container_selectors: dedupe(container_selectors),
            player_keywords: normalize_entries(&config.player_keywords),
        })
    }

    /// Convert back into serialized form.
    pub fn to_config(&self) -> PolicyConfig {
        PolicyConfig {
            allow: self.allow.clone(),
            block: self.block.clone(),
            suspicious_tlds: self.suspicious_tlds.clone(),
            random_host_run: self.random_host_run,
            container_selectors: self.container_selectors.iter().map(|s| s.to_string()).collect(),
            player_keywords: self.player_keywords.clone(),
        }
    }

    pub fn allow_entries(&self) -> &[String] {
        &self.allow
    }

    pub fn block_entries(&self) -> &[String] {
        &self.block
    }

    pub fn suspicious_tlds(&self) -> &[String] {
        &self.suspicious_tlds
    }

    pub fn random_host_run(&self) -> Option<usize> {
        self.random_host_run
    }

    pub fn container_selectors(&self) -> &[ContainerSelector] {
        &self.container_selectors
    }

    pub fn player_keywords(&self) -> &[String] {
        &self.player_keywords
    }

    /// First Allow entry contained in the lower-cased `url`.
    #[inline]
    pub fn find_allow(&self, url_lower: &str) -> Option<&str> {
        self.allow
            .iter()
            .find(|entry| url_lower.contains(entry.as_str()))
            .map(|s| s.as_str())
    }

    /// First Block entry contained in the lower-cased `url`.
    #[inline]
    pub fn find_block(&self, url_lower: &str) -> Option<&str> {
        self.block
            .iter()
            .find(|entry| url_lower.contains(entry.as_str()))
            .map(|s| s.as_str())
    }

    /// First suspicious TLD the hostname ends with.
    #[inline]
    pub fn find_suspicious_tld(&self, host: &str) -> Option<&str> {
        self.suspicious_tlds
            .iter()
            .find(|tld| crate::url::host_has_suffix(host, tld))
            .map(|s| s.as_str())
    }

    /// Whether any of `values` carries a player-embed keyword.
    pub fn is_player_embed(&self, values: &[&str]) -> bool {
        values.iter().any(|value| {
            let lower = value.to_ascii_lowercase();
            self.player_keywords.iter().any(|kw| lower.contains(kw.as_str()))
        })
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self {
            allow: to_strings(DEFAULT_ALLOW),
            block: to_strings(DEFAULT_BLOCK),
            suspicious_tlds: to_strings(DEFAULT_SUSPICIOUS_TLDS),
            random_host_run: None,
            container_selectors: vec![
                ContainerSelector::new(Some("div"), "id", "google_ads"),
                ContainerSelector::new(Some("div"), "class", "adsbygoogle"),
                ContainerSelector::new(None, "class", "propeller"),
                ContainerSelector::new(None, "class", "adsterra"),
                ContainerSelector::new(None, "class", "exoclick"),
                ContainerSelector::new(None, "class", "popcash"),
            ],
            player_keywords: to_strings(DEFAULT_PLAYER_KEYWORDS),
        }
    }
}

/// Trim, lower-case, drop empties and duplicates (first occurrence wins).
fn normalize_entries(entries: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(entries.len());
    for entry in entries {
        let entry = entry.trim().to_lowercase();
        if entry.is_empty() || out.contains(&entry) {
            continue;
        }
        out.push(entry);
    }
    out
}

/// `*.click` and `.click` both mean "ends with .click".
fn normalize_tld(tld: &str) -> String {
    let tld = tld.trim();
    match tld.strip_prefix('*') {
        Some(rest) => rest.to_string(),
        None => tld.to_string(),
    }
}

fn dedupe(selectors: Vec<ContainerSelector>) -> Vec<ContainerSelector> {
    let mut out: Vec<ContainerSelector> = Vec::with_capacity(selectors.len());
    for sel in selectors {
        if !out.contains(&sel) {
            out.push(sel);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_store_matches_default_config() {
        let from_config = PolicyStore::from_config(&PolicyConfig::default()).unwrap();
        let built_in = PolicyStore::default();
        assert_eq!(from_config.to_config(), built_in.to_config());
    }

    #[test]
    fn test_normalization() {
        let config = PolicyConfig {
            allow: vec!["  AdMaven.com ".into(), "admaven.com".into(), "".into()],
            block: vec!["PopAds.net".into()],
            suspicious_tlds: vec!["*.click".into(), ".TOP".into()],
            ..PolicyConfig::empty()
        };
        let store = PolicyStore::from_config(&config).unwrap();
        assert_eq!(store.allow_entries(), &["admaven.com".to_string()]);
        assert_eq!(store.block_entries(), &["popads.net".to_string()]);
        assert_eq!(store.suspicious_tlds(), &[".click".to_string(), ".top".to_string()]);
        assert_eq!(store.random_host_run(), None);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = PolicyConfig {
            random_host_run: Some(0),
            ..PolicyConfig::default()
        };
        assert!(matches!(
            PolicyStore::from_config(&config),
            Err(PolicyError::InvalidRunLength)
        ));

        let config = PolicyConfig {
            container_selectors: vec![".ad-banner".into()],
            ..PolicyConfig::default()
        };
        assert!(matches!(
            PolicyStore::from_config(&config),
            Err(PolicyError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PolicyConfig = serde_json::from_str(r#"{"allow": ["partner.example"]}"#).unwrap();
        assert_eq!(config.allow, vec!["partner.example".to_string()]);
        assert_eq!(config.block.len(), DEFAULT_BLOCK.len());
        assert_eq!(config.random_host_run, None);

        let config: PolicyConfig = serde_json::from_str(r#"{"random_host_run": 20}"#).unwrap();
        assert_eq!(config.random_host_run, Some(20));
    }

    #[test]
    fn test_builtin_policy_spares_own_player_hosts() {
        let store = PolicyStore::default();
        assert_eq!(store.find_allow("https://megaplay.buzz/stream/s-2/12345/sub"), Some("megaplay.buzz"));
        assert_eq!(store.find_allow("https://vidwish.live/stream/s-2/12345/dub"), Some("vidwish.live"));
        assert_eq!(store.find_suspicious_tld("cdn.example.buzz"), None);
        assert_eq!(store.random_host_run(), None);
    }

    #[test]
    fn test_player_embed() {
        let store = PolicyStore::default();
        assert!(store.is_player_embed(&["https://cdn.example.com/EMBED/123", ""]));
        assert!(store.is_player_embed(&["", "video-frame"]));
        assert!(!store.is_player_embed(&["https://ads.example.com/x", "banner"]));
    }
}
