//! Fast URL helpers for the classifier hot path
//!
//! These functions avoid allocations and work directly on string slices.
//! None of them fail loudly: anything that does not look like a URL with an
//! authority simply has no host.

// =============================================================================
// Scheme
// =============================================================================

/// Get the position right after the authority marker.
///
/// Handles `scheme://` and protocol-relative `//host` URLs. Returns `None`
/// for relative paths and opaque schemes (`data:`, `javascript:`, ...).
#[inline]
pub fn get_authority_start(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    if bytes.len() >= 2 && bytes[0] == b'/' && bytes[1] == b'/' {
        return Some(2);
    }

    let colon_pos = bytes.iter().position(|&b| b == b':')?;
    if colon_pos == 0 {
        return None;
    }

    // Scheme must be ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
    let scheme = &bytes[..colon_pos];
    if !scheme[0].is_ascii_alphabetic()
        || !scheme
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.')
    {
        return None;
    }

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    None
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Get the start and end positions of the hostname in a URL.
#[inline]
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let authority_start = get_authority_start(url)?;
    let bytes = url.as_bytes();

    // Authority ends at the first of '/', '?', '#'
    let mut authority_end = bytes.len();
    for (i, &b) in bytes[authority_start..].iter().enumerate() {
        if b == b'/' || b == b'?' || b == b'#' || b == b'\\' {
            authority_end = authority_start + i;
            break;
        }
    }

    // Skip userinfo
    let mut host_start = authority_start;
    if let Some(at) = bytes[authority_start..authority_end].iter().rposition(|&b| b == b'@') {
        host_start = authority_start + at + 1;
    }

    // Strip port
    let mut host_end = authority_end;
    if let Some(colon) = bytes[host_start..authority_end].iter().position(|&b| b == b':') {
        host_end = host_start + colon;
    }

    if host_start >= host_end {
        return None;
    }

    Some((host_start, host_end))
}

/// Fast host extraction without allocations.
/// Returns a slice into the original URL, trailing dot removed.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (host_start, host_end) = get_host_position(url)?;
    let host = url[host_start..host_end].trim_end_matches('.');
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

// =============================================================================
// Hostname Heuristics
// =============================================================================

/// Length of the longest unbroken run of ASCII alphanumerics in `host`.
#[inline]
pub fn longest_alnum_run(host: &str) -> usize {
    let mut best = 0usize;
    let mut current = 0usize;

    for b in host.bytes() {
        if b.is_ascii_alphanumeric() {
            current += 1;
            if current > best {
                best = current;
            }
        } else {
            current = 0;
        }
    }

    best
}

/// Check whether `host` ends with the TLD suffix `tld` (e.g. `.click`).
///
/// A suffix without a leading dot is matched on a label boundary, so
/// `click` matches `ads.click` but not `quickclick`.
#[inline]
pub fn host_has_suffix(host: &str, tld: &str) -> bool {
    if tld.is_empty() || host.len() < tld.len() {
        return false;
    }

    let tail_start = host.len() - tld.len();
    if !host.as_bytes()[tail_start..].eq_ignore_ascii_case(tld.as_bytes()) {
        return false;
    }

    tld.starts_with('.') || tail_start == 0 || host.as_bytes()[tail_start - 1] == b'.'
}

// =============================================================================
// Meta Refresh
// =============================================================================

/// Extract the navigation target of a `<meta http-equiv="refresh">` content
/// value such as `0; url='https://example.com/'`.
///
/// Returns the whole trimmed content when there is no `url=` part.
pub fn extract_refresh_target(content: &str) -> &str {
    let bytes = content.as_bytes();

    let mut url_pos = None;
    if bytes.len() >= 4 {
        for i in 0..=bytes.len() - 4 {
            if bytes[i..i + 3].eq_ignore_ascii_case(b"url") {
                // Allow whitespace around '='
                let mut j = i + 3;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j < bytes.len() && bytes[j] == b'=' {
                    url_pos = Some(j + 1);
                    break;
                }
            }
        }
    }

    let target = match url_pos {
        Some(pos) => &content[pos..],
        None => content,
    };

    target.trim().trim_matches(|c| c == '\'' || c == '"').trim()
}
