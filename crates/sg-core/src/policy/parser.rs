//! Filter-list compiler
//!
//! Turns ABP-style list text into policy entries. Only the subset a
//! substring policy can express is understood; everything else is skipped.
//!
//! | Line                        | Becomes                  |
//! |-----------------------------|--------------------------|
//! | `@@\|\|admaven.com^`        | allow `admaven.com`      |
//! | `\|\|popads.net^`, `popads.net` | block `popads.net`   |
//! | `0.0.0.0 popads.net`        | block `popads.net`       |
//! | `*.click`, `.click`         | suspicious TLD `.click`  |
//! | `##div[id*="google_ads"]`   | container selector       |

use std::net::IpAddr;

use super::{ContainerSelector, PolicyConfig};

/// Counts collected while compiling one list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    pub allow: usize,
    pub block: usize,
    pub suspicious: usize,
    pub selectors: usize,
    pub skipped: usize,
}

/// A single compiled line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    Allow(String),
    Block(String),
    SuspiciousTld(String),
    Container(String),
}

/// Compile list text into a policy config with empty defaults.
pub fn parse_filter_list(text: &str) -> (PolicyConfig, ParseStats) {
    let mut config = PolicyConfig::empty();
    let stats = merge_filter_list(&mut config, text);
    (config, stats)
}

/// Compile list text and append its entries to `config`.
pub fn merge_filter_list(config: &mut PolicyConfig, text: &str) -> ParseStats {
    let mut stats = ParseStats::default();

    for raw_line in text.lines() {
        stats.lines += 1;
        let line = raw_line.trim();
        if line.is_empty() || is_comment_line(line) {
            continue;
        }

        match parse_line(line) {
            Some(ListEntry::Allow(domain)) => {
                stats.allow += 1;
                config.allow.push(domain);
            }
            Some(ListEntry::Block(domain)) => {
                stats.block += 1;
                config.block.push(domain);
            }
            Some(ListEntry::SuspiciousTld(tld)) => {
                stats.suspicious += 1;
                config.suspicious_tlds.push(tld);
            }
            Some(ListEntry::Container(selector)) => {
                stats.selectors += 1;
                config.container_selectors.push(selector);
            }
            None => {
                log::debug!("skipping unsupported list line: {}", line);
                stats.skipped += 1;
            }
        }
    }

    stats
}

/// Compile one non-comment line.
pub fn parse_line(line: &str) -> Option<ListEntry> {
    let line = line.trim();

    // Generic cosmetic filter
    if let Some(selector) = line.strip_prefix("##") {
        return ContainerSelector::parse(selector)
            .ok()
            .map(|sel| ListEntry::Container(sel.to_string()));
    }
    if line.contains("##") || line.contains("#@#") || line.contains("#?#") {
        return None;
    }

    // Options are not expressible as substrings
    if line.contains('$') {
        return None;
    }

    if let Some(rest) = line.strip_prefix("@@") {
        return parse_domain_pattern(rest.trim_start()).map(ListEntry::Allow);
    }

    if let Some(tld) = parse_tld_rule(line) {
        return Some(ListEntry::SuspiciousTld(tld));
    }

    if let Some(domain) = parse_hosts_file_domain(line) {
        return Some(ListEntry::Block(domain));
    }

    parse_domain_pattern(line).map(ListEntry::Block)
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || (line.starts_with('#') && !line.starts_with("##"))
}

/// `||host^`, `|https://host/`, or a bare `host`.
fn parse_domain_pattern(line: &str) -> Option<String> {
    let mut rest = line.trim();
    if let Some(stripped) = rest.strip_prefix("||") {
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('|') {
        rest = stripped;
        if let Some(pos) = rest.find("://") {
            rest = &rest[pos + 3..];
        }
    }
    rest = rest.trim_start_matches('.');

    let mut end = rest.len();
    for (i, ch) in rest.char_indices() {
        if ch == '^' || ch == '|' || ch == '/' {
            end = i;
            break;
        }
        if ch == '*' || ch == '?' || ch == '#' || ch == ':' {
            return None;
        }
    }

    let host = normalize_domain(&rest[..end])?;
    // A single label is too broad for substring matching
    if !host.contains('.') {
        return None;
    }
    Some(host)
}

/// `*.click` or `.click`.
fn parse_tld_rule(line: &str) -> Option<String> {
    let rest = line.strip_prefix('*').unwrap_or(line);
    let label = rest.strip_prefix('.')?;
    if label.is_empty() || label.contains('.') || !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return None;
    }
    Some(format!(".{}", label.to_ascii_lowercase()))
}

fn parse_hosts_file_domain(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    let first = parts.next()?;
    let second = parts.next()?;

    if first.parse::<IpAddr>().is_ok() {
        let domain = normalize_domain(second)?;
        if domain == "localhost" || domain == "0.0.0.0" {
            return None;
        }
        return Some(domain);
    }

    None
}

fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
    {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_kinds() {
        assert_eq!(parse_line("@@||admaven.com^"), Some(ListEntry::Allow("admaven.com".into())));
        assert_eq!(parse_line("||PopAds.net^"), Some(ListEntry::Block("popads.net".into())));
        assert_eq!(parse_line("exoclick.com"), Some(ListEntry::Block("exoclick.com".into())));
        assert_eq!(parse_line("0.0.0.0 adcash.com"), Some(ListEntry::Block("adcash.com".into())));
        assert_eq!(parse_line("|https://juicyads.com/x"), Some(ListEntry::Block("juicyads.com".into())));
        assert_eq!(parse_line("*.click"), Some(ListEntry::SuspiciousTld(".click".into())));
        assert_eq!(parse_line(".XYZ"), Some(ListEntry::SuspiciousTld(".xyz".into())));
        assert_eq!(
            parse_line(r#"##div[id*="google_ads"]"#),
            Some(ListEntry::Container(r#"div[id*="google_ads"]"#.into()))
        );
    }

    #[test]
    fn test_parse_line_unsupported() {
        assert_eq!(parse_line("||ads.example.com^$third-party"), None);
        assert_eq!(parse_line("example.com##.banner"), None);
        assert_eq!(parse_line("/banner/*/img"), None);
        assert_eq!(parse_line("127.0.0.1 localhost"), None);
        assert_eq!(parse_line("ads"), None);
    }

    #[test]
    fn test_parse_filter_list() {
        let text = "\
! Title: partner list
[Adblock Plus 2.0]
# hosts comment
@@||admaven.com^
||popads.net^
0.0.0.0 exoclick.com
*.click
##[class*=\"propeller\"]
||tracker.example^$script
";
        let (config, stats) = parse_filter_list(text);
        assert_eq!(config.allow, vec!["admaven.com".to_string()]);
        assert_eq!(config.block, vec!["popads.net".to_string(), "exoclick.com".to_string()]);
        assert_eq!(config.suspicious_tlds, vec![".click".to_string()]);
        assert_eq!(config.container_selectors.len(), 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.lines, 9);
    }
}
